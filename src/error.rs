//! Error taxonomy for the learning pipeline

use thiserror::Error;

/// Errors surfaced by the queue, engine, and knowledge store.
///
/// Sandbox failures are deliberately absent: the sandbox converts every
/// failure mode into outcome data and never raises past its boundary.
#[derive(Debug, Error)]
pub enum LearnError {
    /// Malformed enqueue request; rejected synchronously, never queued
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// External collaborator failed after retries were exhausted
    #[error("provider error during {phase}: {source}")]
    Provider {
        phase: crate::types::Phase,
        #[source]
        source: crate::providers::ProviderError,
    },

    /// Failed to persist a knowledge record; prior versions are untouched
    #[error("storage write failed: {0}")]
    Storage(String),

    /// Lookup for a technology with no stored records
    #[error("no knowledge recorded for '{0}'")]
    UnknownTechnology(String),
}
