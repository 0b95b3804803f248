//! Infrastructure layer: job queue, record persistence, lifecycle wiring.

pub mod jobs;
pub mod lifecycle;
pub mod record_store;
