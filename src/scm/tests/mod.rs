//! Test modules for the SCM domain model

pub mod tool;
