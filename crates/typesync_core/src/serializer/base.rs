//! Shared serializer for every entity kind.
//!
//! # Responsibility
//! - Write the common document shape (identity, info, structure,
//!   properties, tabs, compositions) in a stable order.
//! - Apply documents in two passes, delegating kind-specific fields to a
//!   `KindFields` implementation.
//!
//! # Invariants
//! - Sections are sorted by alias (references) or by `(sort_order, alias)`
//!   (tabs, properties); in-memory order never leaks into output.
//! - Reference aliases are refreshed from live state by key on write.
//! - First pass never deletes; second pass runs only after the first pass
//!   finished for the whole batch.
//! - References are resolved by key first, then by alias.

use super::tracker::Tracker;
use super::{EntitySerializer, SerializerError, SerializerOptions, SyncAttempt, SyncContext};
use crate::document::{DocumentRef, Node, PropertySection, TabSection, TypeDocument};
use crate::model::change::{Change, ChangeKind};
use crate::model::entity::{ContentType, EntityKind, EntityRef};
use crate::model::property::{PropertyGroup, PropertyType};
use crate::repo::type_repo::{StoreResult, TypeStore};
use crate::sync::containers::ContainerSync;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

/// Kind-specific fields layered on the shared document shape.
///
/// Every hook defaults to "no extra fields".
pub trait KindFields: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Flag nodes written into `Info` after `AllowAtRoot`.
    fn info_flags(&self, _item: &ContentType) -> Vec<Node> {
        Vec::new()
    }

    /// Reference nodes appended to `Info` after `Compositions`.
    fn info_references(
        &self,
        _item: &ContentType,
        _ctx: &SyncContext<'_>,
    ) -> StoreResult<Vec<Node>> {
        Ok(Vec::new())
    }

    /// Flag nodes appended to each `GenericProperty`.
    fn property_flags(&self, _property: &PropertyType) -> Vec<Node> {
        Vec::new()
    }

    fn apply_info_flags(&self, _item: &mut ContentType, _doc: &TypeDocument, _tracker: &mut Tracker) {
    }

    /// Applies `Info` references during the first pass.
    fn apply_info_references(
        &self,
        _item: &mut ContentType,
        _doc: &TypeDocument,
        _ctx: &SyncContext<'_>,
        _tracker: &mut Tracker,
    ) -> StoreResult<()> {
        Ok(())
    }

    fn apply_property_flags(
        &self,
        _property: &mut PropertyType,
        _section: &PropertySection,
        _tracker: &mut Tracker,
    ) {
    }
}

/// Entity serializer parameterized by its kind-specific fields.
#[derive(Debug, Default)]
pub struct TypeSerializer<F> {
    fields: F,
}

impl<F: KindFields> TypeSerializer<F> {
    pub fn new(fields: F) -> Self {
        Self { fields }
    }

    fn read_document(&self, node: &Node) -> Result<TypeDocument, SerializerError> {
        let doc = TypeDocument::from_node(node)?;
        if doc.kind != self.fields.kind() {
            return Err(SerializerError::KindMismatch {
                expected: self.fields.kind(),
                actual: doc.kind,
            });
        }
        Ok(doc)
    }

    fn first_pass(
        &self,
        doc: &TypeDocument,
        ctx: &SyncContext<'_>,
    ) -> Result<SyncAttempt, SerializerError> {
        let mut tracker = Tracker::new();
        let mut item = match find_existing(doc, ctx, &mut tracker)? {
            Some(item) => item,
            None => {
                let item = ctx.types.create(doc.kind, doc.key, &doc.alias)?;
                tracker.record(Change::create("Item", &doc.alias, &doc.info.name));
                item
            }
        };
        let is_new = item.is_new();

        tracker.set(&mut item.alias, doc.alias.clone(), "Alias", "Alias");
        tracker.set(&mut item.name, doc.info.name.clone(), "Info/Name", "Name");
        tracker.set(&mut item.icon, doc.info.icon.clone(), "Info/Icon", "Icon");
        tracker.set(
            &mut item.description,
            doc.info.description.clone(),
            "Info/Description",
            "Description",
        );
        tracker.set(
            &mut item.allow_at_root,
            doc.info.allow_at_root,
            "Info/AllowAtRoot",
            "AllowAtRoot",
        );
        tracker.set(&mut item.is_element, doc.info.is_element, "Info/IsElement", "IsElement");
        self.fields.apply_info_flags(&mut item, doc, &mut tracker);
        self.fields
            .apply_info_references(&mut item, doc, ctx, &mut tracker)?;

        apply_tabs(&mut item, &doc.tabs, &mut tracker);
        self.apply_properties(&mut item, &doc.properties, &mut tracker);

        let details = tracker.finish(&mut item);
        debug!(
            "event=first_pass module=serializer status=ok kind={} alias={} new={} changes={}",
            doc.kind,
            doc.alias,
            is_new,
            details.len()
        );

        let mut attempt = SyncAttempt::succeed(doc.alias.clone(), item, details);
        if is_new {
            attempt.change = ChangeKind::Create;
        }
        Ok(attempt)
    }

    fn apply_properties(
        &self,
        item: &mut ContentType,
        sections: &[PropertySection],
        tracker: &mut Tracker,
    ) {
        let mut matched = HashSet::new();
        for section in sections {
            if let Some(tab) = &section.tab {
                ensure_group(item, tab, tracker);
            }

            let index = section
                .key
                .and_then(|key| item.properties.iter().position(|p| p.key == key))
                .or_else(|| {
                    item.properties
                        .iter()
                        .position(|p| !matched.contains(&p.key) && p.alias == section.alias)
                });

            let Some(index) = index else {
                let Some(data_type_key) = section.data_type_key else {
                    tracker.report(Change::fail(
                        "Property",
                        &section.alias,
                        "missing data type definition",
                    ));
                    continue;
                };
                let mut property = PropertyType::new(
                    section.key.unwrap_or_else(Uuid::new_v4),
                    &section.alias,
                    data_type_key,
                );
                property.name = section.name.clone();
                property.description = section.description.clone();
                property.editor_alias = section.editor_alias.clone();
                property.mandatory = section.mandatory;
                property.validation = section.validation.clone();
                property.sort_order = section.sort_order;
                property.group = section.tab.clone();
                // flags of a new property are covered by its Create record
                self.fields
                    .apply_property_flags(&mut property, section, &mut Tracker::new());

                matched.insert(property.key);
                tracker.record(Change::create("Property", &section.alias, &section.name));
                item.properties.push(property);
                continue;
            };

            let property = &mut item.properties[index];
            matched.insert(property.key);
            let name = section.alias.as_str();
            tracker.set(&mut property.alias, section.alias.clone(), "Property/Alias", name);
            tracker.set(&mut property.name, section.name.clone(), "Property/Name", name);
            tracker.set(
                &mut property.description,
                section.description.clone(),
                "Property/Description",
                name,
            );
            if let Some(data_type_key) = section.data_type_key {
                tracker.set(
                    &mut property.data_type_key,
                    data_type_key,
                    "Property/Definition",
                    name,
                );
            }
            tracker.set(
                &mut property.editor_alias,
                section.editor_alias.clone(),
                "Property/Type",
                name,
            );
            tracker.set(&mut property.mandatory, section.mandatory, "Property/Mandatory", name);
            tracker.set(
                &mut property.validation,
                section.validation.clone(),
                "Property/Validation",
                name,
            );
            tracker.set(&mut property.sort_order, section.sort_order, "Property/SortOrder", name);
            tracker.set_with(
                &mut property.group,
                section.tab.clone(),
                "Property/Tab",
                name,
                |group| group.clone().unwrap_or_default(),
            );
            self.fields.apply_property_flags(property, section, tracker);
        }
    }

    fn second_pass(
        &self,
        item: &mut ContentType,
        doc: &TypeDocument,
        ctx: &SyncContext<'_>,
        options: &SerializerOptions,
    ) -> Result<(Vec<Change>, bool), SerializerError> {
        let mut tracker = Tracker::new();
        resolve_compositions(item, doc, ctx, &mut tracker)?;
        resolve_structure(item, doc, ctx, &mut tracker)?;
        clean_tabs(item, doc, &mut tracker);
        delete_missing(item, doc, &mut tracker);
        place(item, doc, ctx, options, &mut tracker)?;

        let details = tracker.finish(item);
        item.validate_schema()
            .map_err(|err| SerializerError::Validation(err.to_string()))?;
        let saved = persist(item, ctx, options)?;
        Ok((details, saved))
    }

    fn property_node(&self, item: &ContentType, property: &PropertyType) -> Node {
        let mut node = Node::new("GenericProperty")
            .with_child(Node::leaf("Key", property.key))
            .with_child(Node::leaf("Name", &property.name))
            .with_child(Node::leaf("Alias", &property.alias))
            .with_child(Node::leaf("Definition", property.data_type_key))
            .with_child(Node::leaf("Type", &property.editor_alias))
            .with_child(Node::leaf("Mandatory", property.mandatory))
            .with_child(Node::leaf("Validation", &property.validation))
            .with_child(Node::leaf("Description", &property.description))
            .with_child(Node::leaf("SortOrder", property.sort_order));
        if let Some(group_alias) = &property.group {
            let caption = item
                .group(group_alias)
                .map(|group| group.name.as_str())
                .unwrap_or(group_alias);
            node.push(Node::leaf("Tab", caption).with_attr("Alias", group_alias));
        }
        node.with_children(self.fields.property_flags(property))
    }

    fn placement_node(&self, item: &ContentType, ctx: &SyncContext<'_>) -> StoreResult<Option<Node>> {
        if let Some(parent) = &item.parent {
            let alias = current_alias(ctx.types, item.kind, parent)?;
            return Ok(Some(Node::leaf("Parent", alias).with_attr("Key", parent.key)));
        }
        let Some(container) = item.container else {
            return Ok(None);
        };
        let path = ContainerSync::new(ctx.types, item.kind).folder_path(container)?;
        Ok(path.map(|path| Node::leaf("Folder", path).with_attr("Key", container)))
    }
}

impl<F: KindFields> EntitySerializer for TypeSerializer<F> {
    fn kind(&self) -> EntityKind {
        self.fields.kind()
    }

    fn serialize(&self, item: &ContentType, ctx: &SyncContext<'_>) -> Result<Node, SerializerError> {
        if item.kind != self.fields.kind() {
            return Err(SerializerError::KindMismatch {
                expected: self.fields.kind(),
                actual: item.kind,
            });
        }
        item.validate()
            .map_err(|err| SerializerError::Validation(err.to_string()))?;

        let mut info = Node::new("Info")
            .with_child(Node::leaf("Name", &item.name))
            .with_child(Node::leaf("Icon", &item.icon))
            .with_child(Node::leaf("Description", &item.description))
            .with_child(Node::leaf("AllowAtRoot", item.allow_at_root))
            .with_children(self.fields.info_flags(item))
            .with_child(Node::leaf("IsElement", item.is_element));
        if let Some(placement) = self.placement_node(item, ctx)? {
            info.push(placement);
        }
        info.push(
            Node::new("Compositions").with_children(reference_nodes(
                ctx.types,
                item.kind,
                &item.compositions,
                "Composition",
            )?),
        );
        for node in self.fields.info_references(item, ctx)? {
            info.push(node);
        }

        let structure = Node::new("Structure").with_children(reference_nodes(
            ctx.types,
            item.kind,
            &item.allowed_children,
            item.kind.root_tag(),
        )?);

        let mut properties = item.properties.iter().collect::<Vec<_>>();
        properties.sort_by(|a, b| (a.sort_order, &a.alias).cmp(&(b.sort_order, &b.alias)));
        let properties = Node::new("GenericProperties").with_children(
            properties
                .into_iter()
                .map(|property| self.property_node(item, property)),
        );

        let mut groups = item.groups.iter().collect::<Vec<_>>();
        groups.sort_by(|a, b| (a.sort_order, &a.alias).cmp(&(b.sort_order, &b.alias)));
        let tabs = Node::new("Tabs").with_children(groups.into_iter().map(|group| {
            Node::new("Tab")
                .with_child(Node::leaf("Key", group.key))
                .with_child(Node::leaf("Caption", &group.name))
                .with_child(Node::leaf("Alias", &group.alias))
                .with_child(Node::leaf("Type", group.group_type))
                .with_child(Node::leaf("SortOrder", group.sort_order))
        }));

        Ok(Node::new(item.kind.root_tag())
            .with_attr("Key", item.key)
            .with_attr("Alias", &item.alias)
            .with_child(info)
            .with_child(structure)
            .with_child(properties)
            .with_child(tabs))
    }

    fn deserialize(
        &self,
        node: &Node,
        ctx: &SyncContext<'_>,
        _options: &SerializerOptions,
    ) -> SyncAttempt {
        let label = node.attr("Alias").unwrap_or(node.name()).to_string();
        let result = self
            .read_document(node)
            .and_then(|doc| self.first_pass(&doc, ctx));
        result.unwrap_or_else(|err| {
            warn!(
                "event=first_pass module=serializer status=error kind={} alias={} error={}",
                self.fields.kind(),
                label,
                err
            );
            SyncAttempt::fail(label, err)
        })
    }

    fn deserialize_second_pass(
        &self,
        mut item: ContentType,
        node: &Node,
        ctx: &SyncContext<'_>,
        options: &SerializerOptions,
    ) -> SyncAttempt {
        let result = self
            .read_document(node)
            .and_then(|doc| self.second_pass(&mut item, &doc, ctx, options));
        match result {
            Ok((details, saved)) => {
                debug!(
                    "event=second_pass module=serializer status=ok kind={} alias={} changes={} saved={}",
                    item.kind,
                    item.alias,
                    details.len(),
                    saved
                );
                let mut attempt = SyncAttempt::succeed(item.alias.clone(), item, details);
                attempt.saved = saved;
                attempt
            }
            Err(err) => {
                warn!(
                    "event=second_pass module=serializer status=error kind={} alias={} error={}",
                    item.kind, item.alias, err
                );
                let mut attempt = SyncAttempt::fail(item.alias.clone(), err);
                attempt.item = Some(item);
                attempt
            }
        }
    }
}

/// Looks up one same-kind entity by key, then alias.
pub(crate) fn find_reference(
    store: &dyn TypeStore,
    kind: EntityKind,
    reference: &DocumentRef,
) -> StoreResult<Option<ContentType>> {
    if let Some(key) = reference.key {
        if let Some(found) = store.find_by_key(kind, key)? {
            return Ok(Some(found));
        }
    }
    if reference.alias.is_empty() {
        return Ok(None);
    }
    Ok(store.find_by_alias(kind, &reference.alias)?.into_iter().next())
}

fn current_alias(store: &dyn TypeStore, kind: EntityKind, reference: &EntityRef) -> StoreResult<String> {
    Ok(store
        .find_by_key(kind, reference.key)?
        .map(|found| found.alias)
        .unwrap_or_else(|| reference.alias.clone()))
}

fn reference_nodes(
    store: &dyn TypeStore,
    kind: EntityKind,
    references: &[EntityRef],
    tag: &str,
) -> StoreResult<Vec<Node>> {
    let mut refreshed = Vec::with_capacity(references.len());
    for reference in references {
        refreshed.push(EntityRef::new(reference.key, current_alias(store, kind, reference)?));
    }
    refreshed.sort_by(|a, b| (&a.alias, a.key).cmp(&(&b.alias, b.key)));
    Ok(refreshed
        .into_iter()
        .map(|reference| Node::leaf(tag, reference.alias).with_attr("Key", reference.key))
        .collect())
}

fn find_existing(
    doc: &TypeDocument,
    ctx: &SyncContext<'_>,
    tracker: &mut Tracker,
) -> StoreResult<Option<ContentType>> {
    if let Some(item) = ctx.types.find_by_key(doc.kind, doc.key)? {
        return Ok(Some(item));
    }

    // alias fallback is scoped to the document's container
    let scope = match (&doc.info.parent, &doc.info.folder) {
        (None, Some(folder)) => match ContainerSync::new(ctx.types, doc.kind).resolve(folder)? {
            Some(container) => Some(container),
            // a folder that does not exist yet holds nothing to match
            None => return Ok(None),
        },
        _ => None,
    };
    // another document of this run owns anything created during it
    let found = ctx
        .types
        .find_by_alias(doc.kind, &doc.alias)?
        .into_iter()
        .find(|candidate| {
            candidate.container == scope && !ctx.types.created_this_run(candidate.key)
        });
    if let Some(item) = &found {
        tracker.report(Change::update(
            "Key",
            &doc.alias,
            item.key.to_string(),
            doc.key.to_string(),
        ));
    }
    Ok(found)
}

fn apply_tabs(item: &mut ContentType, tabs: &[TabSection], tracker: &mut Tracker) {
    let mut matched = HashSet::new();
    for tab in tabs {
        let index = tab
            .key
            .and_then(|key| item.groups.iter().position(|g| g.key == key))
            .or_else(|| {
                item.groups
                    .iter()
                    .position(|g| !matched.contains(&g.key) && g.alias == tab.alias)
            });

        let Some(index) = index else {
            let mut group = PropertyGroup::new(
                tab.key.unwrap_or_else(Uuid::new_v4),
                &tab.alias,
                &tab.name,
            );
            group.group_type = tab.group_type;
            group.sort_order = tab.sort_order;
            matched.insert(group.key);
            tracker.record(Change::create("Tabs", &tab.alias, &tab.name));
            item.groups.push(group);
            continue;
        };

        let group = &mut item.groups[index];
        matched.insert(group.key);
        let old_alias = group.alias.clone();
        let renamed = tracker.set(&mut group.alias, tab.alias.clone(), "Tabs/Alias", &tab.alias);
        tracker.set(&mut group.name, tab.name.clone(), "Tabs/Caption", &tab.alias);
        tracker.set(&mut group.group_type, tab.group_type, "Tabs/Type", &tab.alias);
        tracker.set(&mut group.sort_order, tab.sort_order, "Tabs/SortOrder", &tab.alias);

        if renamed {
            // properties follow their group across renames
            for property in item
                .properties
                .iter_mut()
                .filter(|p| p.group.as_deref() == Some(old_alias.as_str()))
            {
                property.group = Some(tab.alias.clone());
            }
        }
    }
}

fn ensure_group(item: &mut ContentType, alias: &str, tracker: &mut Tracker) {
    if item.group(alias).is_some() {
        return;
    }
    let mut group = PropertyGroup::new(Uuid::new_v4(), alias, alias);
    group.sort_order = item
        .groups
        .iter()
        .map(|group| group.sort_order + 1)
        .max()
        .unwrap_or(0);
    tracker.record(Change::create("Tabs", alias, alias));
    item.groups.push(group);
}

fn resolve_compositions(
    item: &mut ContentType,
    doc: &TypeDocument,
    ctx: &SyncContext<'_>,
    tracker: &mut Tracker,
) -> StoreResult<()> {
    // lowercased alias -> inherited property key; `None` for own properties
    let mut taken = doc
        .properties
        .iter()
        .map(|property| (property.alias.to_ascii_lowercase(), None))
        .collect::<HashMap<_, _>>();

    let mut resolved: Vec<EntityRef> = Vec::new();
    for reference in &doc.info.compositions {
        let Some(target) = find_reference(ctx.types, item.kind, reference)? else {
            tracker.report(Change::fail(
                "Compositions",
                &reference.alias,
                "composition not found",
            ));
            continue;
        };
        if resolved.iter().any(|existing| existing.key == target.key) {
            continue;
        }
        match composed_aliases(ctx.types, item, &target, &taken)? {
            Ok(inherited) => {
                taken.extend(
                    inherited
                        .into_iter()
                        .map(|(alias, key)| (alias.to_ascii_lowercase(), Some(key))),
                );
                resolved.push(target.reference());
            }
            Err(reason) => {
                warn!(
                    "event=composition_rejected module=serializer status=error alias={} composition={} reason={}",
                    item.alias, target.alias, reason
                );
                tracker.report(Change::fail("Compositions", &target.alias, reason));
            }
        }
    }

    replace_references(&mut item.compositions, resolved, "Compositions", tracker);
    Ok(())
}

/// Properties `target` brings into `item` as `(alias, key)`, or why it
/// cannot be composed.
///
/// A property reached twice through a shared composition is not a collision.
fn composed_aliases(
    store: &dyn TypeStore,
    item: &ContentType,
    target: &ContentType,
    taken: &HashMap<String, Option<Uuid>>,
) -> StoreResult<Result<Vec<(String, Uuid)>, String>> {
    if target.key == item.key {
        return Ok(Err("entity cannot compose itself".to_string()));
    }

    let mut inherited = target
        .properties
        .iter()
        .map(|property| (property.alias.clone(), property.key))
        .collect::<Vec<_>>();
    let mut visited = HashSet::new();
    let mut pending = target
        .compositions
        .iter()
        .map(|composition| composition.key)
        .collect::<Vec<_>>();
    while let Some(key) = pending.pop() {
        if key == item.key {
            return Ok(Err("composition would create a cycle".to_string()));
        }
        if !visited.insert(key) {
            continue;
        }
        if let Some(composed) = store.find_by_key(item.kind, key)? {
            inherited.extend(composed.properties.iter().map(|p| (p.alias.clone(), p.key)));
            pending.extend(composed.compositions.iter().map(|c| c.key));
        }
    }

    let clash = inherited.iter().find(|(alias, key)| {
        taken
            .get(&alias.to_ascii_lowercase())
            .is_some_and(|holder| *holder != Some(*key))
    });
    if let Some((alias, _)) = clash {
        return Ok(Err(format!("property alias `{alias}` is already defined")));
    }
    Ok(Ok(inherited))
}

fn resolve_structure(
    item: &mut ContentType,
    doc: &TypeDocument,
    ctx: &SyncContext<'_>,
    tracker: &mut Tracker,
) -> StoreResult<()> {
    let mut resolved: Vec<EntityRef> = Vec::new();
    for reference in &doc.structure {
        match find_reference(ctx.types, item.kind, reference)? {
            Some(target) => {
                if !resolved.iter().any(|existing| existing.key == target.key) {
                    resolved.push(target.reference());
                }
            }
            None => tracker.report(Change::fail(
                "Structure",
                &reference.alias,
                "allowed child not found",
            )),
        }
    }
    replace_references(&mut item.allowed_children, resolved, "Structure", tracker);
    Ok(())
}

/// Replaces `slot` with `resolved` when membership or aliases differ.
///
/// Order alone is not a change.
pub(crate) fn replace_references(
    slot: &mut Vec<EntityRef>,
    resolved: Vec<EntityRef>,
    path: &str,
    tracker: &mut Tracker,
) {
    let mut changed = false;
    for new in &resolved {
        match slot.iter().find(|old| old.key == new.key) {
            None => {
                tracker.record(Change::create(path, &new.alias, &new.alias));
                changed = true;
            }
            Some(old) if old.alias != new.alias => {
                tracker.record(Change::update(path, &new.alias, &old.alias, &new.alias));
                changed = true;
            }
            Some(_) => {}
        }
    }
    for old in slot
        .iter()
        .filter(|old| !resolved.iter().any(|new| new.key == old.key))
    {
        tracker.record(Change::delete(path, &old.alias, &old.alias));
        changed = true;
    }
    if changed {
        *slot = resolved;
    }
}

/// Merges groups sharing one alias, keeping the one the document names.
fn clean_tabs(item: &mut ContentType, doc: &TypeDocument, tracker: &mut Tracker) {
    let mut seen = BTreeSet::new();
    let duplicates = item
        .groups
        .iter()
        .filter(|group| !seen.insert(group.alias.clone()))
        .map(|group| group.alias.clone())
        .collect::<BTreeSet<_>>();

    for alias in duplicates {
        let keep = doc
            .tabs
            .iter()
            .find(|tab| tab.alias == alias)
            .and_then(|tab| tab.key)
            .filter(|key| item.groups.iter().any(|group| group.key == *key))
            .or_else(|| {
                item.groups
                    .iter()
                    .find(|group| group.alias == alias)
                    .map(|group| group.key)
            });
        item.groups.retain(|group| {
            if group.alias != alias || Some(group.key) == keep {
                return true;
            }
            tracker.record(Change::delete("Tabs", &group.alias, &group.name));
            false
        });
    }
}

/// Deletes properties and unused groups the document no longer lists.
fn delete_missing(item: &mut ContentType, doc: &TypeDocument, tracker: &mut Tracker) {
    item.properties.retain(|property| {
        let listed = doc
            .properties
            .iter()
            .any(|section| section.key == Some(property.key) || section.alias == property.alias);
        if !listed {
            tracker.record(Change::delete("Property", &property.alias, &property.name));
        }
        listed
    });

    let used = item
        .properties
        .iter()
        .filter_map(|property| property.group.clone())
        .collect::<HashSet<_>>();
    item.groups.retain(|group| {
        let listed = doc
            .tabs
            .iter()
            .any(|tab| tab.key == Some(group.key) || tab.alias == group.alias);
        if !listed && !used.contains(&group.alias) {
            tracker.record(Change::delete("Tabs", &group.alias, &group.name));
            return false;
        }
        true
    });
}

/// Applies parent or folder placement from `Info`.
fn place(
    item: &mut ContentType,
    doc: &TypeDocument,
    ctx: &SyncContext<'_>,
    options: &SerializerOptions,
    tracker: &mut Tracker,
) -> StoreResult<()> {
    let render = |parent: &Option<EntityRef>| {
        parent
            .as_ref()
            .map(|parent| parent.alias.clone())
            .unwrap_or_default()
    };

    if let Some(reference) = &doc.info.parent {
        let Some(parent) = find_reference(ctx.types, item.kind, reference)? else {
            tracker.report(Change::fail("Info/Parent", &reference.alias, "parent not found"));
            return Ok(());
        };
        if parent.key == item.key || is_descendant(ctx.types, item, &parent)? {
            tracker.report(Change::fail(
                "Info/Parent",
                &parent.alias,
                "parent would create a cycle",
            ));
            return Ok(());
        }
        tracker.set_with(
            &mut item.parent,
            Some(parent.reference()),
            "Info/Parent",
            "Parent",
            render,
        );
        return Ok(());
    }

    tracker.set_with(&mut item.parent, None, "Info/Parent", "Parent", render);

    let sync = ContainerSync::new(ctx.types, item.kind);
    let target = match &doc.info.folder {
        Some(folder) if options.do_not_save => sync.resolve(folder)?,
        Some(folder) => sync.ensure(folder)?,
        None => None,
    };
    let new_path = doc
        .info
        .folder
        .as_ref()
        .map(|folder| folder.segments().join("/"))
        .unwrap_or_default();
    // report mode cannot create a missing folder
    let unresolved = target.is_none() && !new_path.is_empty();
    if item.container == target && !unresolved {
        return Ok(());
    }

    let old_path = match item.container {
        Some(key) => sync.folder_path(key)?.unwrap_or_default(),
        None => String::new(),
    };
    if unresolved {
        tracker.report(Change::update("Info/Folder", "Folder", old_path, new_path));
        return Ok(());
    }
    tracker.record(Change::update("Info/Folder", "Folder", old_path, new_path));
    item.container = target;
    Ok(())
}

/// Whether `candidate` sits below `item` in the parent tree.
fn is_descendant(
    store: &dyn TypeStore,
    item: &ContentType,
    candidate: &ContentType,
) -> StoreResult<bool> {
    let mut visited = HashSet::new();
    let mut cursor = candidate.parent.as_ref().map(|parent| parent.key);
    while let Some(current) = cursor {
        if current == item.key || !visited.insert(current) {
            return Ok(true);
        }
        cursor = store
            .find_by_key(item.kind, current)?
            .and_then(|found| found.parent.map(|parent| parent.key));
    }
    Ok(false)
}

/// Saves `item` under its identity lock when dirty or forced.
fn persist(
    item: &mut ContentType,
    ctx: &SyncContext<'_>,
    options: &SerializerOptions,
) -> StoreResult<bool> {
    if options.do_not_save {
        debug!(
            "event=entity_save module=serializer status=skip reason=do_not_save alias={}",
            item.alias
        );
        return Ok(false);
    }
    if !item.is_dirty() && !options.force {
        return Ok(false);
    }

    let key = item.key;
    ctx.locks.with_lock(key, || ctx.types.save(item))?;
    info!(
        "event=entity_save module=serializer status=ok kind={} alias={}",
        item.kind, item.alias
    );
    Ok(true)
}
