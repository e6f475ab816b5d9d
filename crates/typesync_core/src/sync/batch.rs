//! Dependency-deferred batch import.
//!
//! # Responsibility
//! - Run the first pass for every document before any second pass.
//! - Make first-pass results visible to second-pass resolution, also when
//!   nothing is written (report mode).
//!
//! # Invariants
//! - A document failing its first pass is excluded from the second pass;
//!   the rest of the batch continues.
//! - Cancellation is checked between documents only. Entities saved before
//!   cancellation stay saved; skipped second passes leave deletions
//!   un-applied until the next full import.
//! - With `do_not_save`, no store write happens at all.
//! - An entity created by one document is never matched by alias for a
//!   later document of the same run.

use crate::document::{Node, TypeDocument};
use crate::model::change::{Change, ChangeKind};
use crate::model::container::EntityContainer;
use crate::model::entity::{ContentType, EntityKey, EntityKind};
use crate::repo::type_repo::{StoreResult, TypeStore};
use crate::serializer::{
    EntitySerializer, SerializerOptions, SerializerRegistry, SyncAttempt, SyncContext,
};
use crate::sync::containers::ContainerSync;
use log::{info, warn};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Cooperative cancellation shared between a caller and a running import.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One document queued for import.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Where the document came from, used in reports.
    pub source: String,
    pub node: Node,
}

impl BatchItem {
    pub fn new(source: impl Into<String>, node: Node) -> Self {
        Self {
            source: source.into(),
            node,
        }
    }
}

/// Per-document result of a batch import.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub source: String,
    pub alias: String,
    pub key: Option<EntityKey>,
    pub kind: Option<EntityKind>,
    pub change: ChangeKind,
    pub success: bool,
    /// Changes from both passes, first pass first.
    pub details: Vec<Change>,
    pub error: Option<String>,
    /// Whether either pass wrote the entity.
    pub saved: bool,
    /// Whether the second pass ran to completion.
    pub completed: bool,
}

impl ImportOutcome {
    pub(crate) fn failed(source: impl Into<String>, alias: impl Into<String>, error: impl Display) -> Self {
        Self {
            source: source.into(),
            alias: alias.into(),
            key: None,
            kind: None,
            change: ChangeKind::Fail,
            success: false,
            details: Vec::new(),
            error: Some(error.to_string()),
            saved: false,
            completed: false,
        }
    }

    fn from_first_pass(source: &str, attempt: &SyncAttempt) -> Self {
        Self {
            source: source.to_string(),
            alias: attempt.name.clone(),
            key: attempt.item.as_ref().map(|item| item.key),
            kind: attempt.item.as_ref().map(|item| item.kind),
            change: attempt.change,
            success: attempt.success,
            details: attempt.details.clone(),
            error: attempt.error.clone(),
            saved: attempt.saved,
            completed: false,
        }
    }

    fn fail(&mut self, error: impl Display) {
        self.success = false;
        self.change = ChangeKind::Fail;
        self.error = Some(error.to_string());
    }

    fn merge_second_pass(&mut self, attempt: SyncAttempt) {
        self.details.extend(attempt.details);
        self.saved |= attempt.saved;
        if !attempt.success {
            self.fail(attempt.error.unwrap_or_default());
            return;
        }
        self.alias = attempt.name;
        self.completed = true;
        if self.change != ChangeKind::Create {
            self.change = self.change.max(attempt.change);
        }
    }
}

/// Outcomes of one import run, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ImportOutcome>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Outcomes that report at least one applied change.
    pub fn changed(&self) -> impl Iterator<Item = &ImportOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.success && outcome.change != ChangeKind::NoChange)
    }

    pub fn find(&self, alias: &str) -> Option<&ImportOutcome> {
        self.outcomes.iter().find(|outcome| outcome.alias == alias)
    }

    pub(crate) fn absorb(&mut self, other: BatchReport) {
        self.outcomes.extend(other.outcomes);
        self.cancelled |= other.cancelled;
    }
}

/// Store view layering first-pass results over the live store.
///
/// Staged entities shadow stored ones with the same key.
pub struct PendingOverlay<'a> {
    inner: &'a dyn TypeStore,
    staged: RefCell<BTreeMap<Uuid, ContentType>>,
    created: RefCell<HashSet<Uuid>>,
}

impl<'a> PendingOverlay<'a> {
    pub fn new(inner: &'a dyn TypeStore) -> Self {
        Self {
            inner,
            staged: RefCell::new(BTreeMap::new()),
            created: RefCell::new(HashSet::new()),
        }
    }

    /// Marks `key` as created by this run.
    pub fn mark_created(&self, key: Uuid) {
        self.created.borrow_mut().insert(key);
    }

    pub fn stage(&self, item: ContentType) {
        self.staged.borrow_mut().insert(item.key, item);
    }

    fn merge(&self, stored: Vec<ContentType>, keep: impl Fn(&ContentType) -> bool) -> Vec<ContentType> {
        let staged = self.staged.borrow();
        let mut merged = stored
            .into_iter()
            .map(|item| staged.get(&item.key).cloned().unwrap_or(item))
            .filter(|item| keep(item))
            .collect::<Vec<_>>();
        for item in staged.values() {
            if keep(item) && !merged.iter().any(|existing| existing.key == item.key) {
                merged.push(item.clone());
            }
        }
        merged.sort_by(|a, b| (&a.alias, a.key).cmp(&(&b.alias, b.key)));
        merged
    }
}

impl TypeStore for PendingOverlay<'_> {
    fn find_by_key(&self, kind: EntityKind, key: EntityKey) -> StoreResult<Option<ContentType>> {
        if let Some(item) = self.staged.borrow().get(&key) {
            return Ok((item.kind == kind).then(|| item.clone()));
        }
        self.inner.find_by_key(kind, key)
    }

    fn find_by_alias(&self, kind: EntityKind, alias: &str) -> StoreResult<Vec<ContentType>> {
        let stored = self.inner.find_by_alias(kind, alias)?;
        Ok(self.merge(stored, |item| item.kind == kind && item.alias == alias))
    }

    fn list(&self, kind: EntityKind) -> StoreResult<Vec<ContentType>> {
        let stored = self.inner.list(kind)?;
        Ok(self.merge(stored, |item| item.kind == kind))
    }

    fn created_this_run(&self, key: EntityKey) -> bool {
        self.created.borrow().contains(&key) || self.inner.created_this_run(key)
    }

    fn save(&self, item: &mut ContentType) -> StoreResult<()> {
        self.inner.save(item)?;
        self.stage(item.clone());
        Ok(())
    }

    fn container_by_id(&self, id: i64) -> StoreResult<Option<EntityContainer>> {
        self.inner.container_by_id(id)
    }

    fn container_by_key(&self, key: Uuid) -> StoreResult<Option<EntityContainer>> {
        self.inner.container_by_key(key)
    }

    fn find_container(
        &self,
        kind: EntityKind,
        parent: Option<Uuid>,
        name: &str,
    ) -> StoreResult<Option<EntityContainer>> {
        self.inner.find_container(kind, parent, name)
    }

    fn save_container(&self, container: &mut EntityContainer) -> StoreResult<()> {
        self.inner.save_container(container)
    }

    fn delete_container(&self, key: Uuid) -> StoreResult<()> {
        self.inner.delete_container(key)
    }

    fn list_containers(&self, kind: EntityKind) -> StoreResult<Vec<EntityContainer>> {
        self.inner.list_containers(kind)
    }
}

struct Pending<'n> {
    index: usize,
    serializer: Arc<dyn EntitySerializer>,
    item: ContentType,
    node: &'n Node,
}

/// Runs the two-pass protocol over one batch of documents.
pub struct BatchImporter<'a> {
    registry: &'a SerializerRegistry,
    ctx: SyncContext<'a>,
}

impl<'a> BatchImporter<'a> {
    pub fn new(registry: &'a SerializerRegistry, ctx: SyncContext<'a>) -> Self {
        Self { registry, ctx }
    }

    /// Imports `items`; every document gets one outcome unless cancelled
    /// before it was reached.
    pub fn import(
        &self,
        items: &[BatchItem],
        options: &SerializerOptions,
        cancel: &CancelFlag,
    ) -> BatchReport {
        let started_at = Instant::now();
        info!(
            "event=batch_import module=sync status=start documents={} do_not_save={}",
            items.len(),
            options.do_not_save
        );

        let overlay = PendingOverlay::new(self.ctx.types);
        let ctx = SyncContext::new(&overlay, self.ctx.templates, self.ctx.locks);
        let mut report = BatchReport::default();
        let mut pending = Vec::new();

        for entry in items {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let label = entry.node.attr("Alias").unwrap_or(entry.node.name());
            let serializer = match self.registry.for_node(&entry.node) {
                Ok(serializer) => serializer,
                Err(err) => {
                    report
                        .outcomes
                        .push(ImportOutcome::failed(&entry.source, label, err));
                    continue;
                }
            };

            let attempt = serializer.deserialize(&entry.node, &ctx, options);
            let mut outcome = ImportOutcome::from_first_pass(&entry.source, &attempt);
            let Some(mut item) = attempt.item.filter(|_| attempt.success) else {
                report.outcomes.push(outcome);
                continue;
            };

            if item.is_new() {
                overlay.mark_created(item.key);
            }
            if !options.do_not_save {
                // new entities are saved straight into their folder
                match ensure_home(&overlay, &entry.node) {
                    Ok(Some(home)) if item.is_new() => item.container = Some(home),
                    Ok(_) => {}
                    Err(err) => warn!(
                        "event=container_sync module=sync status=error alias={} error={}",
                        item.alias, err
                    ),
                }
            }
            if !options.do_not_save && item.is_dirty() {
                let key = item.key;
                if let Err(err) = self.ctx.locks.with_lock(key, || overlay.save(&mut item)) {
                    warn!(
                        "event=first_pass_save module=sync status=error alias={} error={}",
                        item.alias, err
                    );
                    outcome.fail(err);
                    report.outcomes.push(outcome);
                    continue;
                }
                outcome.saved = true;
            }
            overlay.stage(item.clone());
            pending.push(Pending {
                index: report.outcomes.len(),
                serializer,
                item,
                node: &entry.node,
            });
            report.outcomes.push(outcome);
        }

        for entry in pending {
            if report.cancelled || cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let attempt =
                entry
                    .serializer
                    .deserialize_second_pass(entry.item, entry.node, &ctx, options);
            if let Some(item) = &attempt.item {
                overlay.stage(item.clone());
            }
            report.outcomes[entry.index].merge_second_pass(attempt);
        }

        info!(
            "event=batch_import module=sync status=ok documents={} succeeded={} failed={} cancelled={} duration_ms={}",
            items.len(),
            report.succeeded(),
            report.failed(),
            report.cancelled,
            started_at.elapsed().as_millis()
        );
        report
    }
}

/// Creates the folder chain a document places its entity in.
fn ensure_home(store: &dyn TypeStore, node: &Node) -> StoreResult<Option<Uuid>> {
    let Ok(doc) = TypeDocument::from_node(node) else {
        return Ok(None);
    };
    match (&doc.info.parent, &doc.info.folder) {
        (None, Some(folder)) => ContainerSync::new(store, doc.kind).ensure(folder),
        _ => Ok(None),
    }
}
