//! Ordered registry of triggers.
//!
//! Triggers are stored behind `Rc<RefCell<_>>` so the scroll loop can check
//! them from a snapshot while callbacks add or remove entries. The element of
//! each entry is kept alongside so lookups never borrow a trigger that may be
//! mid-check.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::element::TriggerElement;
use crate::trigger::Trigger;

/// Identity of a trigger inside its collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(u64);

impl TriggerId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

pub type SharedTrigger<E> = Rc<RefCell<Trigger<E>>>;

struct Entry<E> {
    id: TriggerId,
    element: E,
    trigger: SharedTrigger<E>,
}

/// Insertion-ordered set of triggers. The same element may be registered
/// more than once.
pub struct TriggerCollection<E> {
    entries: Vec<Entry<E>>,
    next_id: u64,
}

impl<E> Default for TriggerCollection<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<E: TriggerElement> TriggerCollection<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, trigger: Trigger<E>) -> TriggerId {
        let id = TriggerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            element: trigger.element().clone(),
            trigger: Rc::new(RefCell::new(trigger)),
        });
        id
    }

    pub fn extend(&mut self, triggers: impl IntoIterator<Item = Trigger<E>>) -> Vec<TriggerId> {
        triggers.into_iter().map(|t| self.add(t)).collect()
    }

    /// Remove one trigger. Returns whether it was present.
    pub fn remove(&mut self, id: TriggerId) -> bool {
        self.remove_many(&[id]) > 0
    }

    /// Remove every listed trigger, returning how many were dropped.
    pub fn remove_many(&mut self, ids: &[TriggerId]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !ids.contains(&entry.id));
        before - self.entries.len()
    }

    /// Triggers whose element is among `parent.querySelectorAll(selector)`.
    pub fn query(&self, selector: &str) -> Vec<TriggerId> {
        self.entries
            .iter()
            .filter(|entry| entry.element.matches_among_siblings(selector))
            .map(|entry| entry.id)
            .collect()
    }

    /// Triggers bound to `element`, in insertion order.
    pub fn search(&self, element: &E) -> Vec<TriggerId> {
        self.search_any(std::slice::from_ref(element))
    }

    /// Triggers bound to any of `elements`, in insertion order.
    pub fn search_any(&self, elements: &[E]) -> Vec<TriggerId> {
        self.entries
            .iter()
            .filter(|entry| elements.contains(&entry.element))
            .map(|entry| entry.id)
            .collect()
    }

    /// Run `f` on every trigger, active or not.
    ///
    /// Triggers already borrowed (a callback reaching back into its own
    /// trigger) are skipped.
    pub fn call(&self, mut f: impl FnMut(TriggerId, &mut Trigger<E>)) {
        for entry in &self.entries {
            if let Ok(mut trigger) = entry.trigger.try_borrow_mut() {
                f(entry.id, &mut *trigger);
            }
        }
    }

    /// Cheap copy of the current entries for iteration without holding the
    /// collection borrowed.
    pub fn snapshot(&self) -> Vec<(TriggerId, SharedTrigger<E>)> {
        self.entries
            .iter()
            .map(|entry| (entry.id, Rc::clone(&entry.trigger)))
            .collect()
    }

    pub fn get(&self, id: TriggerId) -> Option<SharedTrigger<E>> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| Rc::clone(&entry.trigger))
    }

    pub fn contains(&self, id: TriggerId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn ids(&self) -> Vec<TriggerId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<E> fmt::Debug for TriggerCollection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerCollection")
            .field("len", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
