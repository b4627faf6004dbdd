//! Orchestrator - public facade over the queue, engine, and knowledge
//! store
//!
//! Exposes "learn one technology now" (synchronous, bypasses the queue)
//! and "queue + drain many" entry points, plus status snapshots and a
//! human-readable report. All collaborators are injected at construction;
//! there is no global state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::LearningEngine;
use crate::error::LearnError;
use crate::knowledge::{KnowledgeRecord, KnowledgeStore};
use crate::providers::{ExampleSource, GithubExamples, OpenRouterClient, TextGenerator};
use crate::queue::LearningQueue;
use crate::sandbox::{Language, SandboxExecutor};
use crate::types::{Depth, LearningResult, TaskPriority};

/// Read-only snapshot of the whole system
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub pipeline: PipelineStatus,
    pub knowledge: KnowledgeStatus,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub drain_active: bool,
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub recent_errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStatus {
    pub technologies: u32,
    pub records: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub success_rate: f64,
    pub average_proficiency: f64,
}

/// Public facade of the learning system
pub struct Orchestrator {
    engine: Arc<LearningEngine>,
    queue: LearningQueue,
    store: Arc<KnowledgeStore>,
}

impl Orchestrator {
    /// Wire up real collaborators from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let text: Arc<dyn TextGenerator> = Arc::new(OpenRouterClient::from_config(config)?);
        let examples: Option<Arc<dyn ExampleSource>> = if config.examples.enabled {
            Some(Arc::new(GithubExamples::new(config.examples.github_token.clone())))
        } else {
            None
        };
        let sandbox =
            SandboxExecutor::with_timeout(Duration::from_secs(config.pipeline.sandbox_timeout_secs));
        let language: Language = config
            .pipeline
            .language
            .parse()
            .map_err(|e: String| LearnError::InvalidTask(e))?;
        let store = Arc::new(KnowledgeStore::new()?);

        Ok(Self::with_collaborators(
            text,
            examples,
            sandbox,
            store,
            language,
            config.provider.max_tokens,
            config.examples.limit,
        ))
    }

    /// Wire up explicit collaborators (tests inject stubs here)
    pub fn with_collaborators(
        text: Arc<dyn TextGenerator>,
        examples: Option<Arc<dyn ExampleSource>>,
        sandbox: SandboxExecutor,
        store: Arc<KnowledgeStore>,
        language: Language,
        max_tokens: u32,
        example_limit: usize,
    ) -> Self {
        let engine = Arc::new(LearningEngine::new(
            text,
            examples,
            sandbox,
            Arc::clone(&store),
            language,
            max_tokens,
            example_limit,
        ));
        let queue = LearningQueue::new(Arc::clone(&engine));
        Self { engine, queue, store }
    }

    /// Learn one technology immediately, bypassing the queue
    pub async fn learn_technology(
        &self,
        technology: &str,
        depth: Depth,
    ) -> Result<LearningResult, LearnError> {
        let technology = technology.trim();
        if technology.is_empty() {
            return Err(LearnError::InvalidTask("technology must not be empty".to_string()));
        }
        Ok(self.engine.learn(technology, depth).await)
    }

    /// Enqueue a learning request without starting a drain
    pub fn queue_learning(
        &self,
        technology: &str,
        depth: Depth,
        priority: TaskPriority,
    ) -> Result<Uuid, LearnError> {
        self.queue.enqueue(technology, depth, priority)
    }

    /// Begin draining queued tasks in the background (idempotent)
    pub fn start_pipeline(&self) {
        self.queue.start();
    }

    /// Cooperatively stop the background drain
    pub fn stop_pipeline(&self) {
        self.queue.stop();
    }

    /// Drain all queued tasks and return when none remain
    pub async fn drain(&self) {
        self.queue.drain().await;
    }

    pub fn get_status(&self) -> Result<StatusSnapshot, LearnError> {
        let stats = self.queue.stats();
        Ok(StatusSnapshot {
            metrics: Metrics {
                success_rate: stats.success_rate(),
                average_proficiency: stats.average_proficiency,
            },
            pipeline: PipelineStatus {
                drain_active: self.queue.is_running(),
                pending: stats.pending,
                running: stats.running,
                completed: stats.completed,
                failed: stats.failed,
                recent_errors: stats.recent_errors,
            },
            knowledge: KnowledgeStatus {
                technologies: self.store.list_technologies()?.len() as u32,
                records: self.store.record_count()?,
            },
        })
    }

    /// Technologies with at least one stored record, alphabetical
    pub fn get_learned_technologies(&self) -> Result<Vec<String>, LearnError> {
        self.store.list_technologies()
    }

    /// Search stored knowledge; exact name matches rank first
    pub fn search_knowledge(&self, query: &str) -> Result<Vec<KnowledgeRecord>, LearnError> {
        self.store.search(query)
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.store
    }

    /// Human-readable summary: success rate, average proficiency, and
    /// per-technology grades
    pub fn generate_report(&self) -> Result<String, LearnError> {
        let status = self.get_status()?;
        let mut report = String::new();

        report.push_str("Learning Report\n");
        report.push_str("===============\n\n");
        report.push_str(&format!(
            "Tasks: {} completed, {} failed, {} pending\n",
            status.pipeline.completed, status.pipeline.failed, status.pipeline.pending
        ));
        report.push_str(&format!(
            "Success rate: {:.0}%\n",
            status.metrics.success_rate * 100.0
        ));
        report.push_str(&format!(
            "Average proficiency: {:.2}\n\n",
            status.metrics.average_proficiency
        ));

        let technologies = self.store.list_technologies()?;
        if technologies.is_empty() {
            report.push_str("No technologies learned yet.\n");
        } else {
            report.push_str("Learned technologies:\n");
            for technology in &technologies {
                let record = self.store.get_latest(technology)?;
                report.push_str(&format!(
                    "  {:<24} grade {:<3} proficiency {:.2} (v{})\n",
                    record.technology, record.quality_grade.to_string(), record.proficiency, record.version
                ));
            }
        }

        if !status.pipeline.recent_errors.is_empty() {
            report.push_str("\nRecent errors:\n");
            for error in &status.pipeline.recent_errors {
                report.push_str(&format!("  - {}\n", error));
            }
        }

        Ok(report)
    }
}
