//! Scheduling around the aggregation core.

pub mod scheduler;

pub use scheduler::spawn_scheduler;
