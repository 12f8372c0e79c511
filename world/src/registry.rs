//! Authoritative per-kind entity tables with sequential identifier allocation.

use std::collections::BTreeMap;

use network_defence_core::EntityId;

#[derive(Clone, Debug)]
struct Entry<T> {
    name: String,
    state: T,
}

/// Registry table mapping live identifiers of one entity kind to their state.
///
/// Identifiers double as the human-readable sequence numbers used in entity
/// names. The sequence only restarts through [`Table::reset`], so removing an
/// entity never causes its identifier to be handed out again within a level.
#[derive(Clone, Debug)]
pub(crate) struct Table<I, T> {
    entries: BTreeMap<I, Entry<T>>,
    sequence: u32,
}

impl<I: EntityId, T> Table<I, T> {
    /// Creates an empty table with a reset sequence counter.
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            sequence: 0,
        }
    }

    /// Stores a new entity and returns the identifier allocated for it.
    pub(crate) fn register<F>(&mut self, name: F, state: T) -> I
    where
        F: FnOnce(I) -> String,
    {
        self.sequence = self.sequence.saturating_add(1);
        let id = I::from_sequence(self.sequence);
        let entry = Entry {
            name: name(id),
            state,
        };
        let _ = self.entries.insert(id, entry);
        id
    }

    /// Removes an entity, returning its state. Absent identifiers are ignored.
    pub(crate) fn unregister(&mut self, id: I) -> Option<T> {
        self.entries.remove(&id).map(|entry| entry.state)
    }

    /// Removes every entity without touching the sequence counter.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes every entity and restarts the sequence counter.
    pub(crate) fn reset(&mut self) {
        self.entries.clear();
        self.sequence = 0;
    }

    pub(crate) fn get(&self, id: I) -> Option<&T> {
        self.entries.get(&id).map(|entry| &entry.state)
    }

    pub(crate) fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.entries.get_mut(&id).map(|entry| &mut entry.state)
    }

    pub(crate) fn contains(&self, id: I) -> bool {
        self.entries.contains_key(&id)
    }

    /// Diagnostic name assigned when the entity was registered.
    pub(crate) fn name(&self, id: I) -> Option<&str> {
        self.entries.get(&id).map(|entry| entry.name.as_str())
    }

    /// Identifiers of every live entity in ascending order.
    ///
    /// The returned vector is detached from the table, so callers may mutate
    /// or unregister entities while walking it.
    pub(crate) fn ids(&self) -> Vec<I> {
        self.entries.keys().copied().collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.entries.iter().map(|(id, entry)| (*id, &entry.state))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
