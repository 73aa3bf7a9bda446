//! Abstract `Component` trait and the typed component sets used to describe buckets.

use std::any::Any;
use std::fmt;

use super::domain::Domain;
use super::factory::ComponentHandle;

/// Plain data attached to an entity. At most one instance of each type exists
/// per entity. `Default` is used when a component is added without a value and
/// `Clone` when an entity is cloned.
pub trait Component: Any + Clone + Default + 'static {}

/// Declare structs as components.
#[macro_export]
macro_rules! declare_component {
    ( $( $CMP:ty ),+ ) => {
        $( impl $crate::ecs::Component for $CMP {} )+
    };
}

/// The identifier of a registered component type, which is also the index of
/// its bit in the entity component mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ComponentId ({})", self.0)
    }
}

/// A compile-time list of component types, implemented for tuples. Buckets
/// are described by a pair of sets: the required and the optional components.
pub trait ComponentSet: 'static {
    /// References to every component of the set.
    type Refs<'a>;
    /// Possibly absent references to every component of the set.
    type OptionRefs<'a>;

    /// Number of component types in this set.
    const LEN: usize;

    #[doc(hidden)]
    fn register(domain: &mut Domain, ids: &mut Vec<ComponentId>);
    #[doc(hidden)]
    fn fetch<'a>(domain: &'a Domain, slots: &[Option<ComponentHandle>]) -> Option<Self::Refs<'a>>;
    #[doc(hidden)]
    fn fetch_optional<'a>(
        domain: &'a Domain,
        slots: &[Option<ComponentHandle>],
    ) -> Self::OptionRefs<'a>;
}

macro_rules! impl_component_set {
    ($len: expr; [$($tps: ident), *]) => (
        impl<$($tps: Component, )*> ComponentSet for ( $($tps,)* ) {
            type Refs<'a> = ( $(&'a $tps, )* );
            type OptionRefs<'a> = ( $(Option<&'a $tps>, )* );

            const LEN: usize = $len;

            #[allow(unused_variables)]
            fn register(domain: &mut Domain, ids: &mut Vec<ComponentId>) {
                $( ids.push(domain.register::<$tps>()); )*
            }

            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn fetch<'a>(domain: &'a Domain, slots: &[Option<ComponentHandle>]) -> Option<Self::Refs<'a>> {
                let mut cursor = slots.iter();
                $( let $tps = domain.fetch_slot::<$tps>((*cursor.next()?)?)?; )*
                Some(( $($tps, )* ))
            }

            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn fetch_optional<'a>(domain: &'a Domain, slots: &[Option<ComponentHandle>]) -> Self::OptionRefs<'a> {
                let mut cursor = slots.iter();
                $(
                    let $tps = cursor
                        .next()
                        .and_then(|v| *v)
                        .and_then(|v| domain.fetch_slot::<$tps>(v));
                )*
                ( $($tps, )* )
            }
        }
    );
}

impl_component_set!(0; []);
impl_component_set!(1; [T1]);
impl_component_set!(2; [T1, T2]);
impl_component_set!(3; [T1, T2, T3]);
impl_component_set!(4; [T1, T2, T3, T4]);
impl_component_set!(5; [T1, T2, T3, T4, T5]);
impl_component_set!(6; [T1, T2, T3, T4, T5, T6]);
impl_component_set!(7; [T1, T2, T3, T4, T5, T6, T7]);
impl_component_set!(8; [T1, T2, T3, T4, T5, T6, T7, T8]);
