//! User identity processing
//!
//! Turns the raw contributor identities on fetched records into persisted
//! users and resolved references.

pub mod processor;
pub mod references;

#[cfg(test)]
mod tests;

pub use processor::{ProcessedUsers, UserProcessor};
pub use references::DataReferenceUpdater;
