use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::errors::{SearchError, SearchResult};
use crate::metrics::SearchMetrics;
use crate::results::Match;

const SIMPLE_PATTERN_THRESHOLD: usize = 32;

static PATTERN_CACHE: Lazy<DashMap<String, MatchStrategy>> = Lazy::new(DashMap::new);

/// Strategy for query matching
#[derive(Debug, Clone)]
pub enum MatchStrategy {
    Simple(String),
    Regex(Arc<Regex>),
}

/// Matches one query against file contents.
///
/// Literal queries always use substring scanning. Regex queries compile
/// through a process-wide cache; a regex that is really just a short
/// literal falls back to substring scanning as well. Matching is pure
/// (no I/O, no shared mutable state) and case-sensitive in both modes.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    strategy: MatchStrategy,
    metrics: SearchMetrics,
}

impl QueryMatcher {
    /// Creates a matcher for a literal substring query
    pub fn literal(query: impl Into<String>) -> Self {
        Self {
            strategy: MatchStrategy::Simple(query.into()),
            metrics: SearchMetrics::new(),
        }
    }

    /// Creates a matcher for a regex query
    pub fn regex(pattern: &str) -> SearchResult<Self> {
        Self::with_metrics(pattern, true, SearchMetrics::new())
    }

    /// Creates a matcher with the specified metrics handle
    pub fn with_metrics(
        query: &str,
        is_regex: bool,
        metrics: SearchMetrics,
    ) -> SearchResult<Self> {
        if !is_regex {
            return Ok(Self {
                strategy: MatchStrategy::Simple(query.to_string()),
                metrics,
            });
        }

        let strategy = if let Some(entry) = PATTERN_CACHE.get(query) {
            metrics.record_pattern_cache(0, true);
            entry.clone()
        } else {
            let strategy = if Self::is_simple_pattern(query) {
                MatchStrategy::Simple(query.to_string())
            } else {
                let regex = Regex::new(query)
                    .map_err(|e| SearchError::invalid_pattern(format!("{query}: {e}")))?;
                MatchStrategy::Regex(Arc::new(regex))
            };

            metrics.record_pattern_cache(query.len() as i64, false);
            PATTERN_CACHE.insert(query.to_string(), strategy.clone());
            strategy
        };

        Ok(Self { strategy, metrics })
    }

    /// Gets the metrics handle
    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    /// Determines if a regex pattern can use plain substring matching
    fn is_simple_pattern(pattern: &str) -> bool {
        pattern.len() < SIMPLE_PATTERN_THRESHOLD
            && !pattern.contains(|c: char| c.is_ascii_punctuation() && c != '_' && c != '-')
    }

    /// Finds all match spans as byte offsets into `text`, ascending
    pub fn find_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans: Vec<(usize, usize)> = match &self.strategy {
            MatchStrategy::Simple(pattern) => text
                .match_indices(pattern.as_str())
                .map(|(start, matched)| (start, start + matched.len()))
                .collect(),
            MatchStrategy::Regex(regex) => {
                regex.find_iter(text).map(|m| (m.start(), m.end())).collect()
            }
        };
        spans.sort_unstable_by_key(|&(start, _)| start);
        spans
    }

    /// Finds all matches in `content`, lifted to line/column locations in
    /// ascending file order.
    pub fn find_matches(&self, content: &str) -> Vec<Match> {
        let spans = self.find_spans(content);
        if spans.is_empty() {
            return Vec::new();
        }

        let line_starts = line_starts(content);
        spans
            .into_iter()
            .map(|(start, end)| {
                let line_idx = line_starts.partition_point(|&s| s <= start) - 1;
                let line_start = line_starts[line_idx];
                let line_end = line_starts
                    .get(line_idx + 1)
                    .copied()
                    .unwrap_or(content.len());
                let line_content = content[line_start..line_end].trim_end_matches(['\n', '\r']);
                // A span reaching past the line (multi-line regex) is
                // clamped to the line it starts on.
                let end = end.min(line_start + line_content.len());
                Match {
                    line_number: line_idx + 1,
                    line_content: line_content.to_string(),
                    start: start - line_start,
                    end: end.saturating_sub(line_start),
                }
            })
            .collect()
    }
}

/// Byte offsets of each line start, always beginning with 0
fn line_starts(content: &str) -> Vec<usize> {
    let mut starts = Vec::with_capacity(64);
    starts.push(0);
    starts.extend(
        content
            .bytes()
            .enumerate()
            .filter(|&(_, b)| b == b'\n')
            .map(|(i, _)| i + 1),
    );
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_matching() {
        let matcher = QueryMatcher::literal("test");
        let text = "this is a test string with test pattern";
        let spans = matcher.find_spans(text);
        assert_eq!(spans.len(), 2);

        // Verify the exact positions by checking the matched text
        assert_eq!(&text[spans[0].0..spans[0].1], "test");
        assert_eq!(&text[spans[1].0..spans[1].1], "test");
    }

    #[test]
    fn test_regex_matching() {
        let matcher = QueryMatcher::regex(r"\btest\w+").unwrap();
        let spans = matcher.find_spans("testing tests tested");
        assert_eq!(spans.len(), 3);
    }

    #[test]
    fn test_literal_never_treated_as_regex() {
        // Punctuation in a literal query is matched verbatim
        let matcher = QueryMatcher::literal("foo(bar)");
        let spans = matcher.find_spans("call foo(bar) here");
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = QueryMatcher::regex("(unclosed").unwrap_err();
        assert!(matches!(err, SearchError::InvalidPattern(_)));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let matcher = QueryMatcher::literal("PdfLoader");
        assert_eq!(matcher.find_spans("pdfloader PDFLOADER").len(), 0);
        assert_eq!(matcher.find_spans("new PdfLoader()").len(), 1);
    }

    #[test]
    fn test_line_and_column_lifting() {
        let matcher = QueryMatcher::literal("PdfLoader");
        let content = "import os\n\nclass PdfLoader:\n    pass\n";
        let matches = matcher.find_matches(content);

        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.line_number, 3);
        assert_eq!(m.line_content, "class PdfLoader:");
        assert_eq!(&m.line_content[m.start..m.end], "PdfLoader");
    }

    #[test]
    fn test_matches_are_file_ordered() {
        let matcher = QueryMatcher::literal("x");
        let content = "x axis\nmax x\nxx\n";
        let matches = matcher.find_matches(content);

        assert_eq!(matches.len(), 6);
        let mut prev = (0, 0);
        for m in &matches {
            assert!((m.line_number, m.start) >= prev);
            prev = (m.line_number, m.start);
        }
    }

    #[test]
    fn test_no_trailing_newline() {
        let matcher = QueryMatcher::literal("end");
        let matches = matcher.find_matches("the end");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].line_number, 1);
        assert_eq!(matches[0].start, 4);
        assert_eq!(matches[0].end, 7);
    }

    #[test]
    fn test_crlf_lines_trimmed() {
        let matcher = QueryMatcher::literal("beta");
        let matches = matcher.find_matches("alpha\r\nbeta\r\n");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].line_number, 2);
        assert_eq!(matches[0].line_content, "beta");
    }

    #[test]
    fn test_simple_regex_falls_back_to_substring() {
        assert!(QueryMatcher::is_simple_pattern("test"));
        assert!(QueryMatcher::is_simple_pattern("hello_world"));
        assert!(!QueryMatcher::is_simple_pattern(r"\btest\w+"));
        assert!(!QueryMatcher::is_simple_pattern("test.*pattern"));
    }

    #[test]
    fn test_pattern_caching() {
        // Use a unique pattern for this test to avoid interference from
        // other tests sharing the process-wide cache.
        let unique_pattern = format!(
            "cache_probe_\\d+_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );

        let metrics = SearchMetrics::new();

        let _first = QueryMatcher::with_metrics(&unique_pattern, true, metrics.clone()).unwrap();
        assert_eq!(metrics.pattern_hits(), 0);
        assert_eq!(metrics.pattern_misses(), 1);

        let _second = QueryMatcher::with_metrics(&unique_pattern, true, metrics.clone()).unwrap();
        assert_eq!(metrics.pattern_hits(), 1);
        assert_eq!(metrics.pattern_misses(), 1);
    }
}
