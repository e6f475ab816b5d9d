//! Folder-level export, import and report.
//!
//! # Responsibility
//! - Export every registered kind to
//!   `<folder>/<KindFolder>/<container path>/<name>.<ext>`.
//! - Import or report a folder tree of documents, one batch per kind.
//!
//! # Invariants
//! - Export skips files that already hold identical bytes.
//! - Report runs never write to the live store.

use super::batch::{BatchImporter, BatchItem, BatchReport, CancelFlag, ImportOutcome};
use super::containers::ContainerSync;
use super::SyncResult;
use crate::config::SyncSettings;
use crate::io::file_service::SyncFileService;
use crate::model::entity::{ContentType, EntityKind};
use crate::repo::type_repo::StoreResult;
use crate::serializer::{
    RegistryError, SerializerError, SerializerOptions, SerializerRegistry, SyncContext,
};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

static UNSAFE_FILE_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\-]+").expect("valid file name regex"));

/// Result of exporting one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub kind: EntityKind,
    pub alias: String,
    pub path: PathBuf,
    /// Whether the file content changed on disk.
    pub written: bool,
    pub error: Option<String>,
}

/// Moves documents between a sync folder and the live store.
pub struct SyncHandler<'a> {
    settings: &'a SyncSettings,
    files: &'a SyncFileService,
    registry: &'a SerializerRegistry,
    ctx: SyncContext<'a>,
}

impl<'a> SyncHandler<'a> {
    pub fn new(
        settings: &'a SyncSettings,
        files: &'a SyncFileService,
        registry: &'a SerializerRegistry,
        ctx: SyncContext<'a>,
    ) -> Self {
        Self {
            settings,
            files,
            registry,
            ctx,
        }
    }

    /// File name for one entity, including the extension.
    pub fn file_name(&self, item: &ContentType) -> String {
        let stem = if self.settings.use_guid_names {
            item.key.to_string()
        } else {
            safe_file_name(&item.alias)
        };
        format!("{stem}.{}", self.settings.file_extension)
    }

    /// Document path below `folder`; folder placement becomes subdirectories.
    pub fn export_path(&self, folder: &Path, item: &ContentType) -> StoreResult<PathBuf> {
        let mut path = folder.join(item.kind.folder_name());
        if let (None, Some(container)) = (&item.parent, item.container) {
            let chain = ContainerSync::new(self.ctx.types, item.kind)
                .folder_path(container)?
                .unwrap_or_default();
            for segment in chain.split('/').filter(|segment| !segment.is_empty()) {
                path.push(safe_file_name(segment));
            }
        }
        Ok(path.join(self.file_name(item)))
    }

    /// Writes one document per entity of every registered kind.
    pub fn export_all(&self, folder: impl AsRef<Path>) -> SyncResult<Vec<ExportOutcome>> {
        let folder = folder.as_ref();
        let started_at = Instant::now();
        let mut outcomes = Vec::new();

        for kind in self.registry.kinds() {
            let Some(serializer) = self.registry.get(kind) else {
                continue;
            };
            for item in self.ctx.types.list(kind)? {
                let path = match self.export_path(folder, &item) {
                    Ok(path) => path,
                    Err(err) => {
                        warn!(
                            "event=export module=sync status=error kind={} alias={} error={}",
                            kind, item.alias, err
                        );
                        outcomes.push(ExportOutcome {
                            kind,
                            path: folder.join(kind.folder_name()).join(self.file_name(&item)),
                            alias: item.alias,
                            written: false,
                            error: Some(err.to_string()),
                        });
                        continue;
                    }
                };
                let result = serializer
                    .serialize(&item, &self.ctx)
                    .and_then(|node| node.to_xml().map_err(SerializerError::from))
                    .map_err(|err| err.to_string())
                    .and_then(|xml| {
                        self.files
                            .save_content_if_changed(&path, &xml)
                            .map_err(|err| err.to_string())
                    });
                if let Err(err) = &result {
                    warn!(
                        "event=export module=sync status=error kind={} alias={} error={}",
                        kind, item.alias, err
                    );
                }
                outcomes.push(ExportOutcome {
                    kind,
                    alias: item.alias,
                    path,
                    written: result.as_ref().is_ok_and(|written| *written),
                    error: result.err(),
                });
            }
        }

        info!(
            "event=export module=sync status=ok items={} written={} duration_ms={}",
            outcomes.len(),
            outcomes.iter().filter(|outcome| outcome.written).count(),
            started_at.elapsed().as_millis()
        );
        Ok(outcomes)
    }

    /// Imports every document under `folder`, one batch per kind.
    pub fn import_folder(
        &self,
        folder: impl AsRef<Path>,
        options: &SerializerOptions,
        cancel: &CancelFlag,
    ) -> SyncResult<BatchReport> {
        let files = self
            .files
            .get_files(folder, &self.settings.file_extension, true)?;
        let mut report = BatchReport::default();
        let mut batches: BTreeMap<EntityKind, Vec<BatchItem>> = BTreeMap::new();

        for path in files {
            let source = path.display().to_string();
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            match self.files.load_document(&path) {
                Ok(node) => match EntityKind::from_root_tag(node.name()) {
                    Some(kind) => batches
                        .entry(kind)
                        .or_default()
                        .push(BatchItem::new(source, node)),
                    None => report.outcomes.push(ImportOutcome::failed(
                        source,
                        stem,
                        RegistryError::UnknownRootTag(node.name().to_string()),
                    )),
                },
                Err(err) => report
                    .outcomes
                    .push(ImportOutcome::failed(source, stem, err)),
            }
        }

        let importer = BatchImporter::new(self.registry, self.ctx);
        for (kind, items) in batches {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            info!(
                "event=import_kind module=sync status=start kind={} documents={}",
                kind,
                items.len()
            );
            report.absorb(importer.import(&items, options, cancel));
        }
        Ok(report)
    }

    /// Import dry run: full change data, no writes.
    pub fn report_folder(&self, folder: impl AsRef<Path>, cancel: &CancelFlag) -> SyncResult<BatchReport> {
        self.import_folder(folder, &SerializerOptions::report(), cancel)
    }
}

/// Alias reduced to characters safe in file names on every platform.
pub fn safe_file_name(alias: &str) -> String {
    let safe = UNSAFE_FILE_CHARS_RE.replace_all(alias.trim(), "_");
    if safe.is_empty() {
        "_".to_string()
    } else {
        safe.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::safe_file_name;

    #[test]
    fn safe_file_name_replaces_separators() {
        assert_eq!(safe_file_name("blogPost"), "blogPost");
        assert_eq!(safe_file_name("a/b c"), "a_b_c");
        assert_eq!(safe_file_name(""), "_");
    }
}
