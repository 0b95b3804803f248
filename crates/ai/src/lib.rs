//! `dealbrief-ai`
//!
//! **Responsibility:** the LLM boundary.
//!
//! This crate is intentionally thin and side-effect free with respect to the
//! rest of the system:
//! - It must not touch the record store or the job queue.
//! - It exposes two request/response operations, each a single HTTP call.
//! - It emits insight **text**, not domain state.

pub mod client;
pub mod prompts;

pub use client::{GroqClient, LlmClient, LlmError};
