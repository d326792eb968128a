//! Application layer: CLI parsing, startup wiring, and summary output

pub mod cli;
pub mod startup;
pub mod summary;
