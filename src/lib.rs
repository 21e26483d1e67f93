//! Reelstitch - Media segment merge orchestrator
//!
//! This library crate exposes the core functionality for integration testing.

pub mod acquire;
pub mod assembly;
pub mod cleanup;
pub mod config;
pub mod delivery;
pub mod error;
pub mod history;
pub mod ids;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod transport;
pub mod trigger;
pub mod validate;

pub use error::{MergeError, Result};
pub use ids::{RequestId, RequesterId};
pub use pipeline::MergePipeline;
