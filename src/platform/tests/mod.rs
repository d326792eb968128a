//! Test modules for the platform adapters
//!
//! Adapter conversions are pure functions over deserialized wire
//! payloads, so these tests run against static JSON with no network.
