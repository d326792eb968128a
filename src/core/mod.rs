//! Core services and infrastructure

pub mod config;
pub mod date_parser;
pub mod error_handling;
pub mod logging;
pub mod shutdown;
pub mod styles;
pub mod sync;
pub mod time;
pub mod validation;
pub mod version;
