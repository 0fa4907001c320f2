pub mod config;
pub mod errors;
pub mod filters;
pub mod loader;
pub mod metrics;
pub mod registry;
pub mod results;
pub mod search;

pub use config::{EncodingMode, SearchSettings};
pub use errors::{SearchError, SearchResult};
pub use filters::PathFilter;
pub use loader::{ContentLoader, ContentSource, OsContentSource};
pub use registry::{FileRecord, FileRegistry, PrewarmReport};
pub use results::{Diagnostic, FileResult, Match, SearchOutput};
pub use search::{search, search_with_cancellation, CancellationToken, SearchQuery};
