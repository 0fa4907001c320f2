//! Concurrent search pipeline.
//!
//! A search is one pass of a bounded producer/consumer pipeline: a single
//! feeder streams position-tagged registry records into a bounded channel,
//! a fixed pool of workers loads and matches them, and the coordinator
//! drains one outcome per record before restoring the registry's canonical
//! order. The channel capacity (`buffering`) bounds how far the feeder can
//! run ahead of the workers, so memory use stays flat however large the
//! registry is. A `workerCount` of 1 degrades to sequential scanning with
//! byte-identical output.

pub mod cancel;
pub mod engine;
pub mod matcher;

pub use cancel::CancellationToken;
pub use engine::{search, search_with_cancellation, SearchQuery};
pub use matcher::QueryMatcher;
