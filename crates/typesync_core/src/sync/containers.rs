//! Folder/container synchronizer.
//!
//! # Responsibility
//! - Map a document's folder path onto the per-kind container tree.
//! - Create missing containers on demand.
//!
//! # Invariants
//! - Containers are matched by key first, then by name within the parent.
//! - Containers are never deleted here.
//! - Parent walks stop on revisits, so corrupt parent chains cannot loop.

use crate::document::FolderRef;
use crate::model::container::EntityContainer;
use crate::model::entity::EntityKind;
use crate::repo::type_repo::{StoreResult, TypeStore};
use log::info;
use std::collections::HashSet;
use uuid::Uuid;

/// Container resolution for one entity kind.
pub struct ContainerSync<'a> {
    store: &'a dyn TypeStore,
    kind: EntityKind,
}

impl<'a> ContainerSync<'a> {
    pub fn new(store: &'a dyn TypeStore, kind: EntityKind) -> Self {
        Self { store, kind }
    }

    /// Slash-separated path from the root down to `key`.
    ///
    /// Returns `None` when the container does not exist.
    pub fn folder_path(&self, key: Uuid) -> StoreResult<Option<String>> {
        let mut segments = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(key);
        while let Some(current) = cursor {
            if !visited.insert(current) {
                break;
            }
            match self.store.container_by_key(current)? {
                Some(container) => {
                    segments.push(container.name);
                    cursor = container.parent;
                }
                None if current == key => return Ok(None),
                None => break,
            }
        }
        segments.reverse();
        Ok(Some(segments.join("/")))
    }

    /// Finds the container for `folder` without creating anything.
    pub fn resolve(&self, folder: &FolderRef) -> StoreResult<Option<Uuid>> {
        if let Some(found) = self.by_key(folder)? {
            return Ok(Some(found.key));
        }

        let mut parent = None;
        for segment in folder.segments() {
            match self.store.find_container(self.kind, parent, segment)? {
                Some(container) => parent = Some(container.key),
                None => return Ok(None),
            }
        }
        Ok(parent)
    }

    /// Finds or creates the container chain for `folder`.
    ///
    /// A container found by key is renamed when the path's leaf name differs.
    /// Returns `None` only for an empty path.
    pub fn ensure(&self, folder: &FolderRef) -> StoreResult<Option<Uuid>> {
        let segments = folder.segments();
        if let Some(mut found) = self.by_key(folder)? {
            if let Some(leaf) = segments.last() {
                if found.name != *leaf {
                    info!(
                        "event=container_rename module=sync status=ok kind={} from={} to={}",
                        self.kind, found.name, leaf
                    );
                    found.name = leaf.to_string();
                    self.store.save_container(&mut found)?;
                }
            }
            return Ok(Some(found.key));
        }

        let mut parent = None;
        for (index, segment) in segments.iter().enumerate() {
            let existing = self.store.find_container(self.kind, parent, segment)?;
            let container = match existing {
                Some(container) => container,
                None => {
                    let is_leaf = index + 1 == segments.len();
                    let key = match folder.key {
                        Some(key) if is_leaf => key,
                        _ => Uuid::new_v4(),
                    };
                    let mut created = EntityContainer::new(self.kind, key, *segment, parent);
                    self.store.save_container(&mut created)?;
                    info!(
                        "event=container_create module=sync status=ok kind={} name={} key={}",
                        self.kind, created.name, created.key
                    );
                    created
                }
            };
            parent = Some(container.key);
        }
        Ok(parent)
    }

    fn by_key(&self, folder: &FolderRef) -> StoreResult<Option<EntityContainer>> {
        let Some(key) = folder.key else {
            return Ok(None);
        };
        Ok(self
            .store
            .container_by_key(key)?
            .filter(|container| container.kind == self.kind))
    }
}
