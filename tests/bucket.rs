#[macro_use]
extern crate entity_domain;
extern crate env_logger;
extern crate rand;

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use entity_domain::ecs::bucket;
use entity_domain::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Default, PartialEq)]
struct A(u32);
#[derive(Debug, Clone, Default, PartialEq)]
struct B(u32);
#[derive(Debug, Clone, Default, PartialEq)]
struct C(u32);
#[derive(Debug, Clone, Default, PartialEq)]
struct D(u32);

declare_component!(A, B, C, D);

#[test]
fn clone_and_activate() {
    let _ = env_logger::try_init();

    let mut domain = Domain::new();
    let bucket = domain.bucket::<(A, B), ()>();
    let len = |domain: &Domain| domain.bucket_by_id(bucket).unwrap().len();

    let e1 = domain.create_entity();
    domain.add::<A>(e1);
    domain.add::<B>(e1);
    assert_eq!(len(&domain), 0);

    domain.activate(e1);
    assert_eq!(len(&domain), 1);

    let e2 = domain.clone_entity(e1, None).unwrap();
    assert_eq!(len(&domain), 1);

    domain.activate(e2);
    assert_eq!(len(&domain), 2);

    domain.deactivate(e1);
    assert_eq!(len(&domain), 1);

    domain.remove::<A>(e2);
    assert_eq!(len(&domain), 0);
}

#[test]
fn optional_slot() {
    let mut domain = Domain::new();
    domain.bucket::<(A,), (B,)>();

    let e1 = domain.create_entity();
    domain.activate(e1);

    domain.add_with(e1, B(7)).unwrap();
    assert_eq!(domain.view::<(A,), (B,)>().unwrap().len(), 0);

    domain.add_with(e1, A(1)).unwrap();
    {
        let view = domain.view::<(A,), (B,)>().unwrap();
        assert_eq!(view.len(), 1);

        let (ent, (a,), (b,)) = view.entries().next().unwrap();
        assert_eq!(ent, e1);
        assert_eq!(a, &A(1));
        assert_eq!(b, Some(&B(7)));
    }

    domain.remove::<B>(e1);
    {
        let view = domain.view::<(A,), (B,)>().unwrap();
        assert_eq!(view.len(), 1);

        let (_, (a,), (b,)) = view.entries().next().unwrap();
        assert_eq!(a, &A(1));
        assert_eq!(b, None);
    }

    domain.add_with(e1, B(8)).unwrap();
    {
        let view = domain.view::<(A,), (B,)>().unwrap();
        let (_, _, (b,)) = view.entries().next().unwrap();
        assert_eq!(b, Some(&B(8)));
    }

    domain.remove::<A>(e1);
    assert_eq!(domain.view::<(A,), (B,)>().unwrap().len(), 0);
}

#[test]
fn registered_after_entities() {
    let mut domain = Domain::new();

    let mut entities = Vec::new();
    for i in 0..6 {
        let e = domain.create_entity();
        domain.add_with(e, A(i)).unwrap();
        if i % 2 == 0 {
            domain.add_with(e, C(i)).unwrap();
        }

        if i != 4 {
            domain.activate(e);
        }

        entities.push(e);
    }

    domain.bucket::<(A, C), ()>();
    let view = domain.view::<(A, C), ()>().unwrap();
    let found: Vec<_> = view.entities().collect();
    assert_eq!(found, vec![entities[0], entities[2]]);

    for (ent, (a, c), ()) in view.entries() {
        assert_eq!(a.0, c.0);
        assert!(domain.is_active(ent));
    }
}

#[test]
fn insertion_order() {
    let mut domain = Domain::new();
    let bucket = domain.bucket::<(A,), ()>();

    let entities: Vec<_> = (0..5)
        .map(|i| {
            let e = domain.create_entity();
            domain.add_with(e, A(i)).unwrap();
            e
        }).collect();

    for &i in &[3, 1, 4, 0, 2] {
        domain.activate(entities[i]);
    }

    domain.deactivate(entities[4]);
    domain.activate(entities[4]);

    let order: Vec<_> = domain.bucket_by_id(bucket).unwrap().entities().collect();
    let expected: Vec<_> = [3, 1, 0, 2, 4].iter().map(|i| entities[*i]).collect();
    assert_eq!(order, expected);
}

#[test]
fn untyped_bucket() {
    let mut domain = Domain::new();
    let a = domain.register::<A>();
    let b = domain.register::<B>();
    let bucket = domain.register_bucket(BucketLayout::new().require(b).optional(a));

    let e1 = domain.create_entity();
    domain.add_with(e1, B(2)).unwrap();
    domain.activate(e1);

    let bucket = domain.bucket_by_id(bucket).unwrap();
    assert!(bucket.contains(e1));
    assert_eq!(bucket.layout().len(), 2);

    let slots = bucket.slots(e1).unwrap();
    assert_eq!(domain.fetch_slot::<B>(slots[0].unwrap()), Some(&B(2)));
    assert!(slots[1].is_none());
}

#[test]
fn optional_only() {
    let mut domain = Domain::new();
    domain.bucket::<(), (A, B)>();
    let len = |domain: &Domain| domain.view::<(), (A, B)>().unwrap().len();

    // Nothing is required, so every active entity is admitted.
    let e1 = domain.create_entity();
    domain.add::<C>(e1);
    domain.activate(e1);
    assert_eq!(len(&domain), 1);

    domain.add::<A>(e1);
    domain.add::<B>(e1);
    assert_eq!(len(&domain), 1);

    domain.remove::<A>(e1);
    assert_eq!(len(&domain), 1);

    // Emptying the last optional slot drops the entry.
    domain.remove::<B>(e1);
    assert_eq!(len(&domain), 0);

    domain.add::<B>(e1);
    assert_eq!(len(&domain), 1);

    domain.remove::<B>(e1);
    domain.deactivate(e1);
    domain.activate(e1);
    assert_eq!(len(&domain), 1);
}

#[test]
fn empty_layout() {
    let mut domain = Domain::new();
    let e1 = domain.create_entity();
    domain.add::<B>(e1);
    domain.activate(e1);

    let all = domain.register_bucket(BucketLayout::new());
    domain.bucket::<(), (A,)>();

    let e2 = domain.create_entity();
    domain.activate(e2);
    let e3 = domain.create_entity();

    let bucket = domain.bucket_by_id(all).unwrap();
    assert_eq!(bucket.entities().collect::<Vec<_>>(), vec![e1, e2]);
    assert!(!bucket.contains(e3));
    assert!(bucket.slots(e1).unwrap().is_empty());

    let view = domain.view::<(), (A,)>().unwrap();
    assert_eq!(view.len(), 2);
    assert!(view.entries().all(|(_, (), (a,))| a.is_none()));

    domain.deactivate(e1);
    assert_eq!(domain.bucket_by_id(all).unwrap().len(), 1);
    assert_eq!(domain.view::<(), (A,)>().unwrap().len(), 1);
}

#[test]
#[should_panic]
fn foreign_component_ids() {
    let mut other = Domain::new();
    other.register::<A>();
    let b = other.register::<B>();

    let mut domain = Domain::new();
    domain.register::<A>();
    domain.register_bucket(BucketLayout::new().require(b));
}

#[test]
fn listeners() {
    let mut domain = Domain::new();
    let bucket = domain.bucket::<(A,), ()>();

    let records = Rc::new(RefCell::new(Vec::new()));
    let shadow = records.clone();
    let handle = domain
        .add_bucket_listener(
            bucket,
            bucket::from_fn(move |domain, id, event| {
                // The removed component is still readable.
                let value = domain.get::<A>(event.entity()).map(|v| v.0);
                shadow.borrow_mut().push((id, event, value));
            }),
        ).unwrap();

    let e1 = domain.create_entity();
    domain.add_with(e1, A(3)).unwrap();
    assert!(records.borrow().is_empty());

    domain.activate(e1);
    domain.remove::<A>(e1);
    domain.add_with(e1, A(4)).unwrap();
    domain.deactivate(e1);

    assert_eq!(
        *records.borrow(),
        vec![
            (bucket, BucketEvent::Added(e1), Some(3)),
            (bucket, BucketEvent::Removed(e1), Some(3)),
            (bucket, BucketEvent::Added(e1), Some(4)),
            (bucket, BucketEvent::Removed(e1), Some(4)),
        ]
    );

    assert!(domain.remove_bucket_listener(bucket, handle));
    assert!(!domain.remove_bucket_listener(bucket, handle));
    domain.activate(e1);
    assert_eq!(records.borrow().len(), 4);
}

#[test]
fn deleted_entities_leave_buckets() {
    let mut domain = Domain::new();
    domain.bucket::<(A,), ()>();

    let e1 = domain.create_entity();
    domain.add::<A>(e1);
    domain.activate(e1);
    domain.delete(e1);

    assert_eq!(domain.view::<(A,), ()>().unwrap().len(), 0);
    assert!(domain.add::<B>(e1).is_none());
    assert!(!domain.remove::<A>(e1));
}

struct Layout {
    id: BucketId,
    required: Vec<ComponentId>,
    optional: Vec<ComponentId>,
}

impl Layout {
    fn has(&self, v: ComponentId) -> bool {
        self.required.contains(&v) || self.optional.contains(&v)
    }
}

enum Op {
    Activate,
    Deactivate,
    Add(ComponentId),
    Remove(ComponentId),
}

/// Expected members of every bucket, replayed from the operations.
struct Membership {
    members: Vec<HashSet<Entity>>,
}

impl Membership {
    fn new(layouts: &[Layout]) -> Self {
        Membership {
            members: layouts.iter().map(|_| HashSet::new()).collect(),
        }
    }

    /// Applies `op` on `e`. Must be called before the domain sees it.
    fn apply(&mut self, domain: &Domain, layouts: &[Layout], e: Entity, op: &Op) {
        let active = domain.is_active(e);
        let owns = |v: ComponentId| domain.factory(v).unwrap().contains(e);

        for (layout, members) in layouts.iter().zip(self.members.iter_mut()) {
            match *op {
                Op::Activate if !active => {
                    if layout.required.iter().all(|v| owns(*v)) {
                        members.insert(e);
                    }
                }
                Op::Deactivate if active => {
                    members.remove(&e);
                }
                Op::Add(c) if active && !owns(c) && layout.has(c) => {
                    if layout.required.iter().all(|v| *v == c || owns(*v)) {
                        members.insert(e);
                    }
                }
                Op::Remove(c) if active && owns(c) && members.contains(&e) && layout.has(c) => {
                    let lost = layout.required.contains(&c)
                        || (layout.required.is_empty()
                            && !layout.optional.iter().any(|v| *v != c && owns(*v)));

                    if lost {
                        members.remove(&e);
                    }
                }
                _ => {}
            }
        }
    }

    fn verify(&self, domain: &Domain, entities: &[Entity], layouts: &[Layout]) {
        for (layout, members) in layouts.iter().zip(self.members.iter()) {
            let bucket = domain.bucket_by_id(layout.id).unwrap();
            for &e in entities {
                assert_eq!(bucket.contains(e), members.contains(&e), "{} in {}", e, layout.id);
            }

            assert_eq!(bucket.len(), members.len());
            assert_eq!(bucket.entities().count(), bucket.len());
        }
    }
}

#[test]
fn fuzz_membership() {
    let mut generator = StdRng::seed_from_u64(0x5eed);
    let mut domain = Domain::new();

    let ids = vec![
        domain.register::<A>(),
        domain.register::<B>(),
        domain.register::<C>(),
        domain.register::<D>(),
    ];

    // Always cover the layouts without required components.
    let mut layouts = vec![
        Layout {
            id: domain.register_bucket(BucketLayout::new()),
            required: vec![],
            optional: vec![],
        },
        Layout {
            id: domain.register_bucket(BucketLayout::new().optional(ids[0]).optional(ids[2])),
            required: vec![],
            optional: vec![ids[0], ids[2]],
        },
    ];

    for _ in 0..8 {
        let mut layout = BucketLayout::new();
        let mut required = Vec::new();
        let mut optional = Vec::new();

        for &v in &ids {
            match generator.gen_range(0..3) {
                0 => {
                    layout = layout.require(v);
                    required.push(v);
                }
                1 => {
                    layout = layout.optional(v);
                    optional.push(v);
                }
                _ => {}
            }
        }

        layouts.push(Layout {
            id: domain.register_bucket(layout),
            required,
            optional,
        });
    }

    let entities: Vec<_> = (0..16).map(|_| domain.create_entity()).collect();
    let mut membership = Membership::new(&layouts);

    for _ in 0..2000 {
        let e = entities[generator.gen_range(0..entities.len())];
        let component = generator.gen_range(0..ids.len());

        let op = match generator.gen_range(0..6) {
            0 => Op::Activate,
            1 => Op::Deactivate,
            2 | 3 => Op::Add(ids[component]),
            _ => Op::Remove(ids[component]),
        };

        membership.apply(&domain, &layouts, e, &op);

        match op {
            Op::Activate => {
                domain.activate(e);
            }
            Op::Deactivate => {
                domain.deactivate(e);
            }
            Op::Add(_) => match component {
                0 => {
                    domain.add::<A>(e);
                }
                1 => {
                    domain.add::<B>(e);
                }
                2 => {
                    domain.add::<C>(e);
                }
                _ => {
                    domain.add::<D>(e);
                }
            },
            Op::Remove(v) => {
                domain.remove_by_id(e, v);
            }
        }

        membership.verify(&domain, &entities, &layouts);
    }
}

#[test]
fn fuzz_slots() {
    let mut generator = StdRng::seed_from_u64(0xb0c7);
    let mut domain = Domain::new();
    domain.bucket::<(A,), (B, C)>();

    let entities: Vec<_> = (0..8)
        .map(|_| {
            let e = domain.create_entity();
            domain.activate(e);
            e
        }).collect();

    for n in 0..500 {
        let e = entities[generator.gen_range(0..entities.len())];
        match generator.gen_range(0..6) {
            0 => {
                domain.add_with(e, A(n)).unwrap();
            }
            1 => {
                domain.add_with(e, B(n)).unwrap();
            }
            2 => {
                domain.add_with(e, C(n)).unwrap();
            }
            3 => {
                domain.remove::<A>(e);
            }
            4 => {
                domain.remove::<B>(e);
            }
            _ => {
                domain.remove::<C>(e);
            }
        }

        let view = domain.view::<(A,), (B, C)>().unwrap();
        assert_eq!(view.entries().count(), view.len());
        for (ent, (a,), (b, c)) in view.entries() {
            assert_eq!(Some(a), domain.get::<A>(ent));
            assert_eq!(b, domain.get::<B>(ent));
            assert_eq!(c, domain.get::<C>(ent));
        }
    }
}
