use ignore::WalkBuilder;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{SearchError, SearchResult};
use crate::filters::{should_include_file, PathFilter};
use crate::loader::ContentLoader;
use crate::results::Diagnostic;

/// Per-file state: the path plus a lazily filled content cache.
///
/// The content cell is locked at record granularity, so concurrent searches
/// can fill different records in parallel while two loaders of the same
/// record serialize: the second waits for the first fill and reuses it.
/// `mark_dirty` is the hook for an external refresh mechanism; a dirty
/// record is re-read on its next load.
#[derive(Debug)]
pub struct FileRecord {
    path: PathBuf,
    content: Mutex<Option<Arc<str>>>,
    dirty: AtomicBool,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content: Mutex::new(None),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether content is currently cached on this record.
    pub fn is_cached(&self) -> bool {
        self.content.lock().is_some()
    }

    /// Flags the cached content as stale. The next load re-reads the file.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub(crate) fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    pub(crate) fn content_cell(&self) -> &Mutex<Option<Arc<str>>> {
        &self.content
    }
}

/// Outcome of eagerly loading every record's content.
#[derive(Debug, Default)]
pub struct PrewarmReport {
    /// Number of records whose content is now cached
    pub loaded: usize,
    /// Records that could not be loaded, with the reason
    pub failures: Vec<Diagnostic>,
}

/// The ordered, in-memory set of files eligible for search.
///
/// Built once (per process or per explicit rebuild) and shared read-mostly
/// across concurrent searches. Paths are unique and held in lexicographic
/// order; that order is the canonical result order every search restores.
#[derive(Debug)]
pub struct FileRegistry {
    root: PathBuf,
    records: Vec<Arc<FileRecord>>,
}

impl FileRegistry {
    /// Walks `root` and collects every file accepted by `filter`.
    ///
    /// Subtrees that cannot be read are skipped with a warning; a root that
    /// cannot be read at all is a fatal configuration error. Symbolic links
    /// are not followed, so link cycles cannot cause non-termination.
    pub fn build(root: impl AsRef<Path>, filter: &PathFilter) -> SearchResult<Self> {
        let root = root.as_ref();
        let meta = std::fs::metadata(root).map_err(|e| {
            SearchError::config_error(format!("unreadable root {}: {e}", root.display()))
        })?;
        if !meta.is_dir() {
            return Err(SearchError::config_error(format!(
                "root is not a directory: {}",
                root.display()
            )));
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.into_path();
            if should_include_file(&path, filter) {
                paths.push(path);
            }
        }

        // Walk order is filesystem-dependent; sorting makes the registry
        // order canonical and rebuilds reproducible.
        paths.sort_unstable();
        paths.dedup();

        debug!("Registry built with {} files under {}", paths.len(), root.display());

        Ok(Self {
            root: root.to_path_buf(),
            records: paths.into_iter().map(|p| Arc::new(FileRecord::new(p))).collect(),
        })
    }

    /// Builds a registry over an explicit path list. Paths are sorted and
    /// deduplicated into canonical order.
    pub fn from_paths(root: impl Into<PathBuf>, mut paths: Vec<PathBuf>) -> Self {
        paths.sort_unstable();
        paths.dedup();
        Self {
            root: root.into(),
            records: paths.into_iter().map(|p| Arc::new(FileRecord::new(p))).collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records(&self) -> &[Arc<FileRecord>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<FileRecord>> {
        self.records.iter()
    }

    /// Eagerly loads every record's content, trading startup latency for
    /// per-query latency. Per-file failures are reported, never fatal.
    pub fn prewarm(&self, loader: &ContentLoader) -> PrewarmReport {
        let mut report = PrewarmReport::default();
        for record in &self.records {
            match loader.load(record) {
                Ok(_) => report.loaded += 1,
                Err(err) => {
                    warn!("Prewarm skipped {}: {err}", record.path().display());
                    report.failures.push(Diagnostic {
                        path: record.path().to_path_buf(),
                        message: err.to_string(),
                    });
                }
            }
        }
        report
    }
}
