//! Test modules for user identity processing
