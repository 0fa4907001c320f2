use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single occurrence of the query within a file.
///
/// `start` and `end` are byte offsets within `line_content`. This shape is
/// serialized as-is by the transport layer, so it is a stable contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// 1-based line number where the match was found
    pub line_number: usize,
    /// The content of the line containing the match
    pub line_content: String,
    /// The start position of the match within the line
    pub start: usize,
    /// The end position of the match within the line
    pub end: usize,
}

/// All matches found in a single file. Never constructed with an empty
/// `matches` list by the search pipeline: files with zero matches are
/// dropped before assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    /// The path to the file
    pub path: PathBuf,
    /// All matches found in the file, in ascending line/column order
    pub matches: Vec<Match>,
}

/// A non-fatal, per-file failure recorded during a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The file the failure is scoped to
    pub path: PathBuf,
    /// Human-readable description of what went wrong
    pub message: String,
}

/// The complete outcome of one search call.
///
/// `file_results` holds one entry per matching file, in the registry's
/// canonical path order. Files that could not be read appear in
/// `diagnostics` instead and are excluded from every counter except their
/// own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOutput {
    /// Results per matching file, in registry order
    pub file_results: Vec<FileResult>,
    /// Number of files scanned to completion (with or without matches)
    pub files_searched: usize,
    /// Number of files with at least one match
    pub files_with_matches: usize,
    /// Total number of matches across all files
    pub total_matches: usize,
    /// Per-file failures recovered during the search
    pub diagnostics: Vec<Diagnostic>,
}

impl SearchOutput {
    /// Creates a new empty search output
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a matching file's result and updates the counters.
    pub fn add_file_result(&mut self, file_result: FileResult) {
        debug_assert!(!file_result.matches.is_empty());
        self.files_searched += 1;
        self.files_with_matches += 1;
        self.total_matches += file_result.matches.len();
        self.file_results.push(file_result);
    }

    /// Records a file that was scanned and contained no matches.
    pub fn record_no_match(&mut self) {
        self.files_searched += 1;
    }

    /// Records a per-file failure. The file is excluded from results.
    pub fn add_diagnostic(&mut self, path: impl Into<PathBuf>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            path: path.into(),
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_at(line: usize) -> Match {
        Match {
            line_number: line,
            line_content: "Hello".to_string(),
            start: 0,
            end: 5,
        }
    }

    #[test]
    fn test_match_creation() {
        let m = Match {
            line_number: 42,
            line_content: "Hello, world!".to_string(),
            start: 0,
            end: 5,
        };

        assert_eq!(m.line_number, 42);
        assert_eq!(&m.line_content[m.start..m.end], "Hello");
    }

    #[test]
    fn test_add_file_result_updates_counters() {
        let mut output = SearchOutput::new();

        output.add_file_result(FileResult {
            path: PathBuf::from("test1.txt"),
            matches: vec![match_at(1), match_at(2)],
        });

        assert_eq!(output.files_searched, 1);
        assert_eq!(output.files_with_matches, 1);
        assert_eq!(output.total_matches, 2);
        assert_eq!(output.file_results.len(), 1);
    }

    #[test]
    fn test_no_match_counts_file_only() {
        let mut output = SearchOutput::new();
        output.record_no_match();
        output.record_no_match();

        assert_eq!(output.files_searched, 2);
        assert_eq!(output.files_with_matches, 0);
        assert_eq!(output.total_matches, 0);
        assert!(output.file_results.is_empty());
    }

    #[test]
    fn test_diagnostics_excluded_from_search_counters() {
        let mut output = SearchOutput::new();
        output.add_diagnostic("gone.txt", "File not found: gone.txt");

        assert_eq!(output.files_searched, 0);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].path, PathBuf::from("gone.txt"));
    }

    #[test]
    fn test_json_shape_is_stable() {
        let mut output = SearchOutput::new();
        output.add_file_result(FileResult {
            path: PathBuf::from("a.py"),
            matches: vec![Match {
                line_number: 3,
                line_content: "class PdfLoader:".to_string(),
                start: 6,
                end: 15,
            }],
        });

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["file_results"][0]["path"], "a.py");
        assert_eq!(json["file_results"][0]["matches"][0]["line_number"], 3);
        assert_eq!(json["total_matches"], 1);
    }
}
