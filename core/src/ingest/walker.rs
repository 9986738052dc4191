use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

/// File name of a directory index
pub const INDEX_FILE_NAME: &str = "DICOMDIR";

/// What an ingestion run will read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanSource {
    /// A directory index; the filesystem walk is skipped entirely
    Index(PathBuf),
    /// Candidate files in walk order
    Files(Vec<PathBuf>),
}

/// Accepts either separator convention and drops trailing separators
pub fn normalize_path(raw: &str) -> PathBuf {
    let unified: String = raw
        .trim()
        .chars()
        .map(|c| if c == '\\' || c == '/' { MAIN_SEPARATOR } else { c })
        .collect();
    let trimmed = unified.trim_end_matches(MAIN_SEPARATOR);
    if trimmed.is_empty() && !unified.is_empty() {
        PathBuf::from(MAIN_SEPARATOR.to_string())
    } else {
        PathBuf::from(trimmed)
    }
}

/// Normalises a root and anchors it at the current directory
///
/// Stored file paths derive from the root, so a relative root would make
/// them depend on the working directory of the ingesting process.
pub fn absolute_root(raw: &Path) -> Result<PathBuf> {
    let normalized = normalize_path(&raw.to_string_lossy());
    Ok(std::path::absolute(normalized)?)
}

fn is_index_name(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.eq_ignore_ascii_case(INDEX_FILE_NAME))
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Finds a directory index directly inside `root`, matching the name
/// case-insensitively
pub fn find_index(root: &Path) -> Option<PathBuf> {
    let exact = root.join(INDEX_FILE_NAME);
    if exact.is_file() {
        return Some(exact);
    }

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {}: {}", root.display(), e);
            return None;
        }
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| path.is_file() && is_index_name(path))
}

/// Enumerates candidate files below a root
///
/// Traversal is recursive and lexicographic by file name within each
/// directory. Symbolic links are not followed.
pub struct DirectoryWalker {
    config: Arc<IngestConfig>,
}

impl DirectoryWalker {
    pub fn new(config: Arc<IngestConfig>) -> Self {
        Self { config }
    }

    /// Lazily yields every candidate file below `root`
    ///
    /// Unreadable entries are logged and skipped.
    pub fn walk<'a>(&'a self, root: &Path) -> impl Iterator<Item = PathBuf> + 'a {
        let skip_hidden = self.config.skip_hidden;
        WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !(skip_hidden && entry.depth() > 0 && is_hidden(entry)))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(DirEntry::into_path)
            .filter(move |path| self.accepts(path))
    }

    /// Whether a file passes the extension whitelist
    ///
    /// Files without an extension always pass; media written by modalities
    /// commonly carries none.
    fn accepts(&self, path: &Path) -> bool {
        let Some(extensions) = &self.config.extensions else {
            return true;
        };
        match path.extension() {
            None => true,
            Some(ext) => extensions
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed.trim_start_matches('.'))),
        }
    }

    /// Decides how a root is read
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::RootNotFound`] if `root` does not exist
    pub fn plan(&self, root: &Path) -> Result<ScanSource> {
        if !root.exists() {
            return Err(IngestError::RootNotFound(root.to_path_buf()));
        }

        if root.is_file() {
            if is_index_name(root) {
                info!("Reading directory index {}", root.display());
                return Ok(ScanSource::Index(root.to_path_buf()));
            }
            debug!("Root {} is a single file", root.display());
            return Ok(ScanSource::Files(vec![root.to_path_buf()]));
        }

        if let Some(index) = find_index(root) {
            info!("Found directory index {}, skipping filesystem walk", index.display());
            return Ok(ScanSource::Index(index));
        }

        Ok(ScanSource::Files(self.walk(root).collect()))
    }
}
