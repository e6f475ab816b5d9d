//! Change tracking for field assignments.

use crate::model::change::Change;
use crate::model::entity::ContentType;
use std::collections::BTreeSet;
use std::fmt::Display;

/// Collects changes and the dirty fields they imply.
#[derive(Debug, Default)]
pub struct Tracker {
    changes: Vec<Change>,
    dirty: BTreeSet<String>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `value` when it differs, recording one update.
    pub fn set<T: PartialEq + Display>(
        &mut self,
        slot: &mut T,
        value: T,
        path: &str,
        name: &str,
    ) -> bool {
        self.set_with(slot, value, path, name, T::to_string)
    }

    /// Like `set`, with an explicit rendering for the change values.
    pub fn set_with<T: PartialEq>(
        &mut self,
        slot: &mut T,
        value: T,
        path: &str,
        name: &str,
        render: impl Fn(&T) -> String,
    ) -> bool {
        if *slot == value {
            return false;
        }
        self.changes
            .push(Change::update(path, name, render(slot), render(&value)));
        *slot = value;
        self.dirty.insert(path.to_string());
        true
    }

    /// Records a change for a mutation performed by the caller.
    pub fn record(&mut self, change: Change) {
        if change.is_valid() {
            self.dirty.insert(change.path.clone());
        }
        self.changes.push(change);
    }

    /// Records a change that was reported but not applied.
    pub fn report(&mut self, change: Change) {
        self.changes.push(change.invalid());
    }

    /// Transfers dirty fields onto `item` and returns the changes.
    pub fn finish(self, item: &mut ContentType) -> Vec<Change> {
        for field in self.dirty {
            item.mark_dirty(field);
        }
        self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::Tracker;
    use crate::model::change::{Change, ChangeKind};
    use crate::model::entity::{ContentType, EntityKind};
    use uuid::Uuid;

    #[test]
    fn equal_values_are_not_recorded() {
        let mut item = ContentType::new(EntityKind::ContentType, Uuid::new_v4(), "page").unwrap();
        item.id = Some(1);
        let mut tracker = Tracker::new();

        let mut icon = item.icon.clone();
        assert!(!tracker.set(&mut icon, String::new(), "Info/Icon", "Icon"));
        let changes = tracker.finish(&mut item);

        assert!(changes.is_empty());
        assert!(!item.is_dirty());
    }

    #[test]
    fn updates_mark_the_entity_dirty() {
        let mut item = ContentType::new(EntityKind::ContentType, Uuid::new_v4(), "page").unwrap();
        item.id = Some(1);
        let mut tracker = Tracker::new();

        assert!(tracker.set(&mut item.icon, "icon-home".to_string(), "Info/Icon", "Icon"));
        tracker.report(Change::fail("Compositions", "missing", "not found"));
        let changes = tracker.finish(&mut item);

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ChangeKind::Update);
        assert_eq!(changes[0].new_value.as_deref(), Some("icon-home"));
        assert_eq!(item.dirty_properties(), vec!["Info/Icon"]);
    }
}
