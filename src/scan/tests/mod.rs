//! Test modules for the scan pipeline
//!
//! The executor and fetchers run against a stub adapter serving canned
//! pages, so the full pipeline is exercised without any network.


pub mod executor;
