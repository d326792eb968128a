//! Scan orchestration
//!
//! A scan walks one repository through a fixed pipeline: fetch commits,
//! fetch merge requests, process user identities, resolve references,
//! persist. [`ScanCommandExecutor`] drives the pipeline and reports a
//! [`ScanResult`] for every requested repository, success or not.

pub mod executor;
pub mod fetcher;
pub mod persistence;
pub mod request;
pub mod status;
pub mod types;

#[cfg(test)]
mod tests;

pub use executor::ScanCommandExecutor;
pub use fetcher::{CommitFetcher, FetchStats, MergeRequestFetcher};
pub use persistence::{JsonExportPersistence, MemoryPersistence, PersistenceService};
pub use request::{FetchStrategy, ScanRequest, ScanRequestBuilder};
pub use status::ScanStatus;
pub use types::{derive_scan_id, ScanResult};
