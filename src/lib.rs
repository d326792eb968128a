pub mod app;
pub mod core;
pub mod diff;
pub mod platform;
pub mod ratelimit;
pub mod scan;
pub mod scm;
pub mod users;
