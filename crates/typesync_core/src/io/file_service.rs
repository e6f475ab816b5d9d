//! Rooted file service for document folders.
//!
//! # Responsibility
//! - Resolve relative paths against one sync root.
//! - Load/save canonical documents and serde objects.
//!
//! # Invariants
//! - Writes replace existing files and create missing parent folders.
//! - Writes are serialized through one lock per service.
//! - Missing files surface as `FileError::NotFound`, never as empty data.

use crate::document::{DocumentError, Node};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub type FileResult<T> = Result<T, FileError>;

/// Errors from file service operations.
#[derive(Debug)]
pub enum FileError {
    NotFound(PathBuf),
    Io { path: PathBuf, source: io::Error },
    Document { path: PathBuf, source: DocumentError },
    Json { path: PathBuf, source: serde_json::Error },
}

impl Display for FileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::Io { path, source } => write!(f, "io error at {}: {source}", path.display()),
            Self::Document { path, source } => {
                write!(f, "error while reading {}: {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "json error at {}: {source}", path.display())
            }
        }
    }
}

impl Error for FileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Io { source, .. } => Some(source),
            Self::Document { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

/// File access rooted at one sync folder.
#[derive(Debug)]
pub struct SyncFileService {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl SyncFileService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize(&root.into()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute, lexically normalized path for `path`.
    pub fn abs_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            return normalize(path);
        }
        normalize(&self.root.join(path))
    }

    /// Case-insensitive comparison of two resolved paths.
    pub fn path_matches(&self, a: impl AsRef<Path>, b: impl AsRef<Path>) -> bool {
        let a = self.abs_path(a).to_string_lossy().to_lowercase();
        let b = self.abs_path(b).to_string_lossy().to_lowercase();
        a == b
    }

    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.abs_path(path).is_file()
    }

    pub fn directory_exists(&self, path: impl AsRef<Path>) -> bool {
        self.abs_path(path).is_dir()
    }

    /// Removes a file; missing files are not an error.
    pub fn delete_file(&self, path: impl AsRef<Path>) -> FileResult<()> {
        let path = self.abs_path(path);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(FileError::Io { path, source }),
        }
    }

    pub fn create_folder(&self, path: impl AsRef<Path>) -> FileResult<()> {
        let path = self.abs_path(path);
        fs::create_dir_all(&path).map_err(|source| FileError::Io { path, source })
    }

    pub fn create_folders_for_file(&self, path: impl AsRef<Path>) -> FileResult<()> {
        match self.abs_path(path).parent() {
            Some(parent) => self.create_folder(parent),
            None => Ok(()),
        }
    }

    /// Removes a folder and all of its contents.
    pub fn clean_folder(&self, path: impl AsRef<Path>) -> FileResult<()> {
        let path = self.abs_path(path);
        if !path.is_dir() {
            return Ok(());
        }
        fs::remove_dir_all(&path).map_err(|source| FileError::Io { path, source })
    }

    /// Files in `folder` with `extension`, sorted by path.
    ///
    /// A missing folder yields an empty list.
    pub fn get_files(
        &self,
        folder: impl AsRef<Path>,
        extension: &str,
        recursive: bool,
    ) -> FileResult<Vec<PathBuf>> {
        let folder = self.abs_path(folder);
        let mut files = Vec::new();
        if folder.is_dir() {
            collect_files(&folder, extension, recursive, &mut files)?;
        }
        files.sort();
        Ok(files)
    }

    /// Direct child folders, sorted by path.
    pub fn get_directories(&self, folder: impl AsRef<Path>) -> FileResult<Vec<PathBuf>> {
        let folder = self.abs_path(folder);
        if !folder.is_dir() {
            return Ok(Vec::new());
        }
        let mut folders = Vec::new();
        for entry in read_dir(&folder)? {
            if entry.is_dir() {
                folders.push(entry);
            }
        }
        folders.sort();
        Ok(folders)
    }

    pub fn load_content(&self, path: impl AsRef<Path>) -> FileResult<String> {
        let path = self.abs_path(path);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(FileError::NotFound(path)),
            Err(source) => Err(FileError::Io { path, source }),
        }
    }

    /// Writes `content`, replacing any existing file.
    pub fn save_content(&self, path: impl AsRef<Path>, content: &str) -> FileResult<()> {
        let path = self.abs_path(path);
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.create_folders_for_file(&path)?;
        debug!(
            "event=file_save module=io status=ok path={} bytes={}",
            path.display(),
            content.len()
        );
        fs::write(&path, content).map_err(|source| FileError::Io { path, source })
    }

    /// Writes `content` only when the file is missing or differs.
    ///
    /// Returns whether a write happened.
    pub fn save_content_if_changed(&self, path: impl AsRef<Path>, content: &str) -> FileResult<bool> {
        match self.load_content(&path) {
            Ok(existing) if existing == content => Ok(false),
            Ok(_) | Err(FileError::NotFound(_)) => {
                self.save_content(path, content)?;
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }

    pub fn load_document(&self, path: impl AsRef<Path>) -> FileResult<Node> {
        let content = self.load_content(&path)?;
        Node::from_xml(&content).map_err(|source| {
            let path = self.abs_path(&path);
            warn!(
                "event=document_load module=io status=error path={} error={}",
                path.display(),
                source
            );
            FileError::Document { path, source }
        })
    }

    pub fn save_document(&self, path: impl AsRef<Path>, document: &Node) -> FileResult<()> {
        let content = document.to_xml().map_err(|source| FileError::Document {
            path: self.abs_path(&path),
            source,
        })?;
        self.save_content(path, &content)
    }

    /// Loads a serde object from JSON; `Ok(None)` when the file is missing.
    pub fn load_object<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> FileResult<Option<T>> {
        let content = match self.load_content(&path) {
            Ok(content) => content,
            Err(FileError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| FileError::Json {
                path: self.abs_path(&path),
                source,
            })
    }

    pub fn save_object<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> FileResult<()> {
        let content = serde_json::to_string_pretty(value).map_err(|source| FileError::Json {
            path: self.abs_path(&path),
            source,
        })?;
        self.save_content(path, &content)
    }
}

fn read_dir(folder: &Path) -> FileResult<Vec<PathBuf>> {
    let entries = fs::read_dir(folder).map_err(|source| FileError::Io {
        path: folder.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| FileError::Io {
            path: folder.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    Ok(paths)
}

fn collect_files(
    folder: &Path,
    extension: &str,
    recursive: bool,
    files: &mut Vec<PathBuf>,
) -> FileResult<()> {
    for path in read_dir(folder)? {
        if path.is_dir() {
            if recursive {
                collect_files(&path, extension, recursive, files)?;
            }
        } else if path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
