//! Entity references which are cleared when the entity is deleted.

use std::cell::Cell;
use std::rc::Rc;

use super::domain::Domain;
use super::event::{Event, EventHandler};
use super::Entity;

/// A reference to an entity that reads `None` once the entity is deleted.
/// Created by `Domain::downgrade`; every weak reference of an entity shares
/// one cell.
#[derive(Debug, Clone)]
pub struct WeakEntity {
    cell: Rc<Cell<Option<Entity>>>,
}

impl WeakEntity {
    pub(crate) fn new(cell: Rc<Cell<Option<Entity>>>) -> Self {
        WeakEntity { cell }
    }

    #[inline]
    pub fn get(&self) -> Option<Entity> {
        self.cell.get()
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Entity-scoped handler clearing the shared cell on deletion.
pub(crate) struct WeakListener {
    cell: Rc<Cell<Option<Entity>>>,
}

impl WeakListener {
    pub fn new(cell: Rc<Cell<Option<Entity>>>) -> Self {
        WeakListener { cell }
    }
}

impl EventHandler for WeakListener {
    fn on_entity_event(&mut self, _: &Domain, _: &Event) {}

    fn on_entity_deleted(&mut self, _: &Domain, ent: Entity) {
        if self.cell.get() == Some(ent) {
            self.cell.set(None);
        }
    }
}
