//! Autodidact - autonomous technology-learning pipeline
//!
//! Drives a named technology through a fixed phase sequence:
//! - research: describe the technology, optionally augmented with
//!   external code examples
//! - code generation: produce a runnable example with self-checks
//! - execution: run it in a subprocess sandbox with a hard timeout
//! - quality analysis: score the code along fixed static dimensions
//! - storage: archive a versioned knowledge record
//!
//! # Example
//!
//! ```ignore
//! use autodidact::config::Config;
//! use autodidact::orchestrator::Orchestrator;
//! use autodidact::types::Depth;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let orchestrator = Orchestrator::from_config(&config)?;
//!     let result = orchestrator.learn_technology("json", Depth::Basic).await?;
//!     println!("{} -> {}", result.technology, result.quality_grade);
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod types;
pub mod error;
pub mod config;
pub mod secrets;
pub mod providers;
pub mod sandbox;
pub mod quality;
pub mod knowledge;
pub mod engine;
pub mod queue;
pub mod orchestrator;
pub mod cli;

// Re-export commonly used types for convenience
pub use error::LearnError;
pub use knowledge::{KnowledgeRecord, KnowledgeStore};
pub use orchestrator::{Orchestrator, StatusSnapshot};
pub use quality::{Grade, QualityAnalyzer};
pub use sandbox::{ExecutionOutcome, Language, SandboxExecutor};
pub use types::{Depth, LearningArtifact, LearningResult, LearningTask, TaskPriority, TaskStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - autonomous technology learner", NAME, VERSION)
}
