use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::config::EncodingMode;
use crate::errors::{SearchError, SearchResult};
use crate::metrics::SearchMetrics;
use crate::registry::FileRecord;

/// Filesystem seam for content reads. The default implementation reads
/// through `std::fs`; tests inject counting or failing stubs to observe
/// cache behavior without touching real I/O.
pub trait ContentSource: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads file contents from the operating system.
#[derive(Debug, Default)]
pub struct OsContentSource;

impl ContentSource for OsContentSource {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Helper function to decode bytes into a String according to encoding mode
fn decode_bytes(bytes: &[u8], path: &Path, encoding_mode: EncodingMode) -> SearchResult<String> {
    match encoding_mode {
        EncodingMode::FailFast => {
            // Try converting to UTF-8 via from_utf8 first to avoid an extra copy if valid
            match std::str::from_utf8(bytes) {
                Ok(valid_str) => Ok(valid_str.to_owned()),
                Err(_utf8_err) => {
                    // Reattempt from a Vec only in the error path, so the
                    // exact error data is preserved for the caller.
                    let vec_copy = bytes.to_vec();
                    let from_utf8_err = match String::from_utf8(vec_copy) {
                        Ok(_) => unreachable!("We already know it's invalid"),
                        Err(e) => e,
                    };
                    Err(SearchError::encoding_error(path, from_utf8_err))
                }
            }
        }
        EncodingMode::Lossy => {
            let cow = String::from_utf8_lossy(bytes);
            // If it's Owned, at least one invalid sequence was replaced.
            if let std::borrow::Cow::Owned(_) = cow {
                warn!("Invalid UTF-8 replaced in file: {}", path.display());
            }
            Ok(cow.into_owned())
        }
    }
}

/// Loads file contents through each record's cache.
///
/// A cached, non-dirty record is returned without I/O. The record's lock is
/// held across a fill, so a concurrent load of the same record waits for the
/// first read and reuses its result instead of reading redundantly.
/// Unreadable or invalid files yield per-file errors that callers record as
/// diagnostics.
#[derive(Clone)]
pub struct ContentLoader {
    source: Arc<dyn ContentSource>,
    encoding: EncodingMode,
    metrics: SearchMetrics,
}

impl ContentLoader {
    pub fn new(encoding: EncodingMode) -> Self {
        Self::with_source(Arc::new(OsContentSource), encoding)
    }

    pub fn with_source(source: Arc<dyn ContentSource>, encoding: EncodingMode) -> Self {
        Self {
            source,
            encoding,
            metrics: SearchMetrics::new(),
        }
    }

    /// Gets the metrics handle shared by this loader
    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    /// Returns the record's content, reading the file only on a cache miss
    /// or when the record is marked dirty.
    pub fn load(&self, record: &FileRecord) -> SearchResult<Arc<str>> {
        let mut cell = record.content_cell().lock();

        if let Some(content) = cell.as_ref() {
            if !record.is_dirty() {
                trace!("Cache hit for {}", record.path().display());
                self.metrics.record_content_hit();
                return Ok(Arc::clone(content));
            }
        }

        let path = record.path();
        trace!("Loading {}", path.display());
        let bytes = self.source.read(path).map_err(|e| {
            self.metrics.record_load_failure();
            SearchError::from_file_io(path, e)
        })?;
        let text = decode_bytes(&bytes, path, self.encoding).map_err(|e| {
            self.metrics.record_load_failure();
            e
        })?;

        let content: Arc<str> = Arc::from(text);
        if let Some(previous) = cell.replace(Arc::clone(&content)) {
            self.metrics.record_content_evicted(previous.len() as u64);
        }
        self.metrics.record_content_miss(content.len() as u64);
        record.clear_dirty();
        Ok(content)
    }
}
