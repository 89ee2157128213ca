//! Triage Tasks Library
//!
//! Persistent task tracking for an email-triage pipeline: cross-batch
//! deduplication, lifecycle transitions and an append-only resolution history.

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod logging;
pub mod store;
pub mod tracker;
pub mod types;
