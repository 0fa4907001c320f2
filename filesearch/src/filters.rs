use regex::Regex;
use std::path::Path;

use crate::errors::{SearchError, SearchResult};

/// Compiled path inclusion/exclusion filter.
///
/// Both patterns are regular expressions matched against the
/// slash-normalized path string. Compilation happens once, at registry
/// build time or query start; a pattern that fails to compile is a fatal
/// configuration error. An absent (or empty) include pattern accepts every
/// path; exclusion always wins over inclusion.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl PathFilter {
    /// Compiles include/exclude patterns. Empty strings are treated the
    /// same as absent patterns.
    pub fn compile(include: Option<&str>, exclude: Option<&str>) -> SearchResult<Self> {
        Ok(Self {
            include: compile_pattern(include)?,
            exclude: compile_pattern(exclude)?,
        })
    }

    /// An unfiltered instance that accepts every path.
    pub fn accept_all() -> Self {
        Self {
            include: None,
            exclude: None,
        }
    }

    /// Whether `path` passes the filter.
    pub fn matches(&self, path: &Path) -> bool {
        let normalized = normalize_path(path);

        if let Some(exclude) = &self.exclude {
            if exclude.is_match(&normalized) {
                return false;
            }
        }
        match &self.include {
            Some(include) => include.is_match(&normalized),
            None => true,
        }
    }
}

fn compile_pattern(pattern: Option<&str>) -> SearchResult<Option<Regex>> {
    match pattern {
        None => Ok(None),
        Some("") => Ok(None),
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|e| SearchError::invalid_pattern(format!("{p}: {e}"))),
    }
}

/// Converts a path to a forward-slash string so patterns behave the same
/// on every platform.
fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Checks if a file is likely to be binary
pub fn is_likely_binary(path: &Path) -> bool {
    // Common binary file extensions
    const BINARY_EXTENSIONS: &[&str] = &[
        "exe", "dll", "so", "dylib", "bin", "obj", "o", "class", "jar", "war", "ear", "png", "jpg",
        "jpeg", "gif", "bmp", "ico", "pdf", "doc", "docx", "xls", "xlsx", "zip", "tar", "gz", "7z",
        "rar",
    ];

    if let Some(ext) = path.extension() {
        if let Some(ext_str) = ext.to_str() {
            return BINARY_EXTENSIONS
                .iter()
                .any(|&bin_ext| bin_ext.eq_ignore_ascii_case(ext_str));
        }
    }
    false
}

/// Determines if a file is eligible for the registry
pub fn should_include_file(path: &Path, filter: &PathFilter) -> bool {
    !is_likely_binary(path) && filter.matches(path)
}
