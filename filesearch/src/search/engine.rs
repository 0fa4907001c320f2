use crossbeam_channel::{bounded, select};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use super::cancel::CancellationToken;
use super::matcher::QueryMatcher;
use crate::config::SearchSettings;
use crate::errors::{SearchError, SearchResult};
use crate::filters::PathFilter;
use crate::loader::ContentLoader;
use crate::registry::{FileRecord, FileRegistry};
use crate::results::{FileResult, SearchOutput};

/// One search request: the query text plus per-query options.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    text: String,
    is_regex: bool,
    file_path_include: Option<String>,
}

impl SearchQuery {
    /// Creates a literal query. Blank text is rejected at this boundary.
    pub fn new(text: impl Into<String>) -> SearchResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        Ok(Self {
            text,
            is_regex: false,
            file_path_include: None,
        })
    }

    /// Treats the query text as a regular expression
    pub fn regex(mut self, is_regex: bool) -> Self {
        self.is_regex = is_regex;
        self
    }

    /// Narrows this query to registry paths matching `pattern`. An empty
    /// pattern leaves the registry unfiltered.
    pub fn with_path_include(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.file_path_include = if pattern.is_empty() {
            None
        } else {
            Some(pattern)
        };
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_regex(&self) -> bool {
        self.is_regex
    }

    pub fn path_include(&self) -> Option<&str> {
        self.file_path_include.as_deref()
    }
}

/// Exactly one of these is produced per dispatched record.
enum Outcome {
    Matched(usize, FileResult),
    NoMatch,
    Failed(PathBuf, SearchError),
}

/// Performs a concurrent search across the registry.
///
/// Equivalent to [`search_with_cancellation`] with a token nobody cancels.
pub fn search(
    registry: &FileRegistry,
    loader: &ContentLoader,
    query: &SearchQuery,
    settings: &SearchSettings,
) -> SearchResult<SearchOutput> {
    search_with_cancellation(registry, loader, query, settings, &CancellationToken::new())
}

/// Performs a concurrent search across the registry, observing `token`.
///
/// A single feeder streams position-tagged records into a bounded channel
/// (blocking on capacity, never buffering the whole registry); workers pull
/// records, load content through the per-record cache, match, and emit one
/// outcome each onto a bounded output channel. The drain loop restores the
/// registry's canonical order before returning, so output is deterministic
/// for any worker count.
///
/// Per-file failures become diagnostics on the output. Cancellation stops
/// the feeder, lets in-flight workers finish their current file, discards
/// the rest, and surfaces [`SearchError::Cancelled`] carrying the partial
/// output. All pool threads are joined before this function returns.
pub fn search_with_cancellation(
    registry: &FileRegistry,
    loader: &ContentLoader,
    query: &SearchQuery,
    settings: &SearchSettings,
    token: &CancellationToken,
) -> SearchResult<SearchOutput> {
    info!("Starting search for {:?}", query.text());

    // The boundary already rejects blank queries; guard anyway.
    if query.text().trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }

    let matcher =
        QueryMatcher::with_metrics(query.text(), query.is_regex(), loader.metrics().clone())?;
    let query_filter = match query.path_include() {
        Some(pattern) => Some(PathFilter::compile(Some(pattern), None)?),
        None => None,
    };

    // Query-filtered view of the registry, tagged with registry positions
    // so the drain can restore canonical order.
    let view: Vec<(usize, Arc<FileRecord>)> = registry
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            query_filter
                .as_ref()
                .map_or(true, |filter| filter.matches(record.path()))
        })
        .map(|(position, record)| (position, Arc::clone(record)))
        .collect();

    debug!(
        "Dispatching {} of {} registry files",
        view.len(),
        registry.len()
    );
    if view.is_empty() {
        return Ok(SearchOutput::new());
    }

    let total = view.len();
    let worker_count = settings.worker_count.get().min(total);
    let capacity = settings.buffering.get();

    let (record_tx, record_rx) = bounded::<(usize, Arc<FileRecord>)>(capacity);
    let (outcome_tx, outcome_rx) = bounded::<Outcome>(capacity);

    let (completed, dispatched, output) =
        thread::scope(|scope| -> SearchResult<(usize, usize, SearchOutput)> {
            for worker_idx in 0..worker_count {
                let record_rx = record_rx.clone();
                let outcome_tx = outcome_tx.clone();
                let matcher = &matcher;
                thread::Builder::new()
                    .name(format!("search-worker-{worker_idx}"))
                    .spawn_scoped(scope, move || {
                        for (position, record) in record_rx.iter() {
                            // A cancelled query drains remaining input
                            // without scanning it.
                            if token.is_cancelled() {
                                continue;
                            }
                            let outcome = scan_record(loader, matcher, position, &record);
                            if outcome_tx.send(outcome).is_err() {
                                break;
                            }
                        }
                    })
                    .map_err(|e| {
                        SearchError::config_error(format!("failed to spawn search worker: {e}"))
                    })?;
            }
            // Workers hold the only remaining clones; channel disconnection
            // now tracks their exits.
            drop(record_rx);
            drop(outcome_tx);

            let feeder = thread::Builder::new()
                .name("search-feeder".to_string())
                .spawn_scoped(scope, move || {
                    let mut dispatched = 0usize;
                    for item in view {
                        select! {
                            send(record_tx, item) -> res => {
                                if res.is_err() {
                                    break;
                                }
                                dispatched += 1;
                            }
                            recv(token.signal()) -> _ => break,
                        }
                    }
                    dispatched
                })
                .map_err(|e| {
                    SearchError::config_error(format!("failed to spawn search feeder: {e}"))
                })?;

            let mut output = SearchOutput::new();
            let mut matched: Vec<(usize, FileResult)> = Vec::new();
            let mut completed = 0usize;
            for outcome in outcome_rx.iter() {
                completed += 1;
                match outcome {
                    Outcome::Matched(position, file_result) => {
                        matched.push((position, file_result));
                    }
                    Outcome::NoMatch => output.record_no_match(),
                    Outcome::Failed(path, err) => {
                        warn!("Skipping {}: {err}", path.display());
                        output.add_diagnostic(path, err.to_string());
                    }
                }
            }

            let dispatched = feeder
                .join()
                .map_err(|_| SearchError::config_error("search feeder thread panicked"))?;

            matched.sort_unstable_by_key(|&(position, _)| position);
            for (_, file_result) in matched {
                output.add_file_result(file_result);
            }
            // Diagnostics arrive in worker-completion order; sort them so
            // repeated runs compare equal.
            output.diagnostics.sort_by(|a, b| a.path.cmp(&b.path));
            Ok((completed, dispatched, output))
        })?;

    loader.metrics().log_stats();

    if token.is_cancelled() {
        info!("Search cancelled after {completed} of {total} files");
        return Err(SearchError::Cancelled {
            completed,
            dispatched,
            partial: Box::new(output),
        });
    }

    debug_assert_eq!(completed, dispatched);
    info!(
        "Search complete. Found {} matches in {} files",
        output.total_matches, output.files_with_matches
    );
    Ok(output)
}

fn scan_record(
    loader: &ContentLoader,
    matcher: &QueryMatcher,
    position: usize,
    record: &FileRecord,
) -> Outcome {
    match loader.load(record) {
        Ok(content) => {
            let matches = matcher.find_matches(&content);
            if matches.is_empty() {
                Outcome::NoMatch
            } else {
                Outcome::Matched(
                    position,
                    FileResult {
                        path: record.path().to_path_buf(),
                        matches,
                    },
                )
            }
        }
        Err(err) => Outcome::Failed(record.path().to_path_buf(), err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncodingMode;
    use std::fs;
    use tempfile::tempdir;

    fn fixture() -> (tempfile::TempDir, FileRegistry, ContentLoader) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "import os\n\nclass PdfLoader:\n").unwrap();
        fs::write(dir.path().join("b.js"), "console.log('nothing here')\n").unwrap();
        fs::write(dir.path().join("c.py"), "loader = PdfLoader()\n").unwrap();

        let registry = FileRegistry::build(dir.path(), &PathFilter::accept_all()).unwrap();
        let loader = ContentLoader::new(EncodingMode::FailFast);
        (dir, registry, loader)
    }

    #[test]
    fn test_basic_search() {
        let (_dir, registry, loader) = fixture();
        let query = SearchQuery::new("PdfLoader").unwrap();
        let settings = SearchSettings::from_raw(2, 4).unwrap();

        let output = search(&registry, &loader, &query, &settings).unwrap();
        assert_eq!(output.files_with_matches, 2);
        assert_eq!(output.files_searched, 3);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_results_in_registry_order() {
        let (_dir, registry, loader) = fixture();
        let query = SearchQuery::new("PdfLoader").unwrap();
        let settings = SearchSettings::from_raw(3, 1).unwrap();

        let output = search(&registry, &loader, &query, &settings).unwrap();
        let names: Vec<_> = output
            .file_results
            .iter()
            .map(|fr| fr.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.py", "c.py"]);
    }

    #[test]
    fn test_blank_query_rejected_at_boundary() {
        assert!(matches!(
            SearchQuery::new("   "),
            Err(SearchError::EmptyQuery)
        ));
    }

    #[test]
    fn test_invalid_path_include_is_fatal() {
        let (_dir, registry, loader) = fixture();
        let query = SearchQuery::new("PdfLoader")
            .unwrap()
            .with_path_include("(");
        let settings = SearchSettings::default();

        let err = search(&registry, &loader, &query, &settings).unwrap_err();
        assert!(matches!(err, SearchError::InvalidPattern(_)));
    }

    #[test]
    fn test_path_include_narrows_view() {
        let (_dir, registry, loader) = fixture();
        let query = SearchQuery::new("PdfLoader")
            .unwrap()
            .with_path_include(r"a\.py$");
        let settings = SearchSettings::default();

        let output = search(&registry, &loader, &query, &settings).unwrap();
        assert_eq!(output.files_with_matches, 1);
        assert_eq!(output.files_searched, 1);
    }

    #[test]
    fn test_more_workers_than_files() {
        let (_dir, registry, loader) = fixture();
        let query = SearchQuery::new("PdfLoader").unwrap();
        let settings = SearchSettings::from_raw(64, 2).unwrap();

        let output = search(&registry, &loader, &query, &settings).unwrap();
        assert_eq!(output.files_with_matches, 2);
    }

    #[test]
    fn test_precancelled_token_surfaces_cancellation() {
        let (_dir, registry, loader) = fixture();
        let query = SearchQuery::new("PdfLoader").unwrap();
        let settings = SearchSettings::from_raw(2, 1).unwrap();

        let token = CancellationToken::new();
        token.cancel();

        let err =
            search_with_cancellation(&registry, &loader, &query, &settings, &token).unwrap_err();
        match err {
            SearchError::Cancelled {
                completed,
                dispatched,
                partial,
            } => {
                assert!(completed <= dispatched);
                assert!(partial.files_with_matches <= 2);
            }
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_view_returns_empty_output() {
        let (_dir, registry, loader) = fixture();
        let query = SearchQuery::new("PdfLoader")
            .unwrap()
            .with_path_include(r"\.nomatch$");
        let settings = SearchSettings::default();

        let output = search(&registry, &loader, &query, &settings).unwrap();
        assert_eq!(output, SearchOutput::new());
    }
}
