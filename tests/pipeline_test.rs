//! End-to-end pipeline tests with stub collaborators
//!
//! The text generator is stubbed; execution uses the real subprocess
//! sandbox with shell programs, so sandbox semantics are covered too.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use autodidact::knowledge::KnowledgeStore;
use autodidact::orchestrator::Orchestrator;
use autodidact::providers::{CodeExample, ExampleSource, ProviderError, TextGenerator};
use autodidact::sandbox::{Language, SandboxExecutor};
use autodidact::types::{Depth, TaskPriority, TaskStatus};
use autodidact::{Grade, LearnError};

/// Stub generator: fixed description for research prompts, a canned
/// shell program for code-generation prompts. Records which
/// technologies it was asked about, in call order.
struct StubGenerator {
    /// Technology whose requests always fail with Unavailable
    flaky: Option<String>,
    program: String,
    seen: Mutex<Vec<String>>,
}

impl StubGenerator {
    fn good() -> Self {
        Self {
            flaky: None,
            program: GOOD_PROGRAM.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn with_program(program: &str) -> Self {
        Self {
            flaky: None,
            program: program.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn flaky_for(technology: &str) -> Self {
        Self {
            flaky: Some(technology.to_string()),
            program: GOOD_PROGRAM.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn research_order(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

/// A well-formed example: documented, error-handled, self-checking
const GOOD_PROGRAM: &str = r#"# demonstrates the technology end to end
set -e
[ "1" = "1" ] && echo "PASS: equality holds"
"#;

fn extract_technology(prompt: &str) -> String {
    // Prompts name the technology in single quotes
    prompt
        .split('\'')
        .nth(1)
        .unwrap_or("unknown")
        .to_string()
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
        let technology = extract_technology(prompt);
        if self.flaky.as_deref() == Some(technology.as_str()) {
            return Err(ProviderError::Unavailable("stubbed outage".to_string()));
        }
        if prompt.starts_with("Describe") {
            self.seen.lock().unwrap().push(technology.clone());
            Ok(format!("{} is a small library for testing pipelines.", technology))
        } else {
            Ok(format!("```sh\n{}```", self.program))
        }
    }
}

/// Generator that rate-limits its first N calls, then behaves like the
/// good stub. Counts every call it receives.
struct RecoveringGenerator {
    failures_left: Mutex<u32>,
    calls: Mutex<u32>,
}

impl RecoveringGenerator {
    fn rate_limited_for(failures: u32) -> Self {
        Self {
            failures_left: Mutex::new(failures),
            calls: Mutex::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TextGenerator for RecoveringGenerator {
    async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(ProviderError::RateLimited);
            }
        }
        if prompt.starts_with("Describe") {
            Ok("a small library for testing pipelines.".to_string())
        } else {
            Ok(format!("```sh\n{}```", GOOD_PROGRAM))
        }
    }
}

/// Example source that always fails; research must proceed regardless
struct BrokenExamples;

#[async_trait]
impl ExampleSource for BrokenExamples {
    async fn search_examples(
        &self,
        _technology: &str,
        _limit: usize,
    ) -> Result<Vec<CodeExample>, ProviderError> {
        Err(ProviderError::Unavailable("example source down".to_string()))
    }
}

fn orchestrator_with(generator: StubGenerator, dir: &TempDir) -> (Arc<StubGenerator>, Orchestrator) {
    let generator = Arc::new(generator);
    let store = Arc::new(KnowledgeStore::with_dir(dir.path()).unwrap());
    let orchestrator = Orchestrator::with_collaborators(
        Arc::clone(&generator) as Arc<dyn TextGenerator>,
        None,
        SandboxExecutor::with_timeout(Duration::from_secs(5)),
        store,
        Language::Shell,
        256,
        3,
    );
    (generator, orchestrator)
}

#[tokio::test]
async fn test_learn_technology_end_to_end() {
    let dir = TempDir::new().unwrap();
    let (_gen, orchestrator) = orchestrator_with(StubGenerator::good(), &dir);

    let result = orchestrator.learn_technology("json", Depth::Basic).await.unwrap();

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.tests_passed, 1);
    assert_eq!(result.tests_total, 1);
    assert!(matches!(result.quality_grade, Grade::APlus | Grade::A | Grade::B));
    assert_eq!(result.artifacts.len(), 5, "one artifact per phase");

    let record = orchestrator.knowledge().get_latest("json").unwrap();
    assert_eq!(record.version, 1);
    assert!(record.content.contains("PASS"));
}

#[tokio::test]
async fn test_relearning_bumps_version() {
    let dir = TempDir::new().unwrap();
    let (_gen, orchestrator) = orchestrator_with(StubGenerator::good(), &dir);

    orchestrator.learn_technology("json", Depth::Basic).await.unwrap();
    orchestrator.learn_technology("json", Depth::Intermediate).await.unwrap();

    let latest = orchestrator.knowledge().get_latest("json").unwrap();
    assert_eq!(latest.version, 2);
    // version 1 is still there, unchanged
    let v1 = orchestrator.knowledge().get_version("json", 1).unwrap().unwrap();
    assert_eq!(v1.version, 1);
}

#[tokio::test]
async fn test_learn_rejects_empty_technology() {
    let dir = TempDir::new().unwrap();
    let (_gen, orchestrator) = orchestrator_with(StubGenerator::good(), &dir);

    let err = orchestrator.learn_technology("   ", Depth::Basic).await.unwrap_err();
    assert!(matches!(err, LearnError::InvalidTask(_)));
}

#[tokio::test]
async fn test_enqueue_rejects_empty_technology() {
    let dir = TempDir::new().unwrap();
    let (_gen, orchestrator) = orchestrator_with(StubGenerator::good(), &dir);

    let err = orchestrator
        .queue_learning("", Depth::Basic, TaskPriority::Normal)
        .unwrap_err();
    assert!(matches!(err, LearnError::InvalidTask(_)));
}

#[tokio::test]
async fn test_drain_order_respects_priority_and_fifo() {
    let dir = TempDir::new().unwrap();
    let (generator, orchestrator) = orchestrator_with(StubGenerator::good(), &dir);

    orchestrator.queue_learning("a", Depth::Basic, TaskPriority::Critical).unwrap();
    orchestrator.queue_learning("b", Depth::Basic, TaskPriority::Normal).unwrap();
    orchestrator.queue_learning("c", Depth::Basic, TaskPriority::Critical).unwrap();
    orchestrator.drain().await;

    assert_eq!(generator.research_order(), vec!["a", "c", "b"]);

    let status = orchestrator.get_status().unwrap();
    assert_eq!(status.pipeline.completed, 3);
    assert_eq!(status.pipeline.failed, 0);
    assert_eq!(status.pipeline.pending, 0);
    assert_eq!(status.pipeline.running, 0);
}

#[tokio::test]
async fn test_partial_failure_does_not_stop_drain() {
    let dir = TempDir::new().unwrap();
    let (_gen, orchestrator) = orchestrator_with(StubGenerator::flaky_for("flaky"), &dir);

    orchestrator.queue_learning("first", Depth::Basic, TaskPriority::Normal).unwrap();
    orchestrator.queue_learning("flaky", Depth::Basic, TaskPriority::Normal).unwrap();
    orchestrator.queue_learning("third", Depth::Basic, TaskPriority::Normal).unwrap();
    orchestrator.drain().await;

    let status = orchestrator.get_status().unwrap();
    assert_eq!(status.pipeline.completed, 2);
    assert_eq!(status.pipeline.failed, 1);
    assert!(status
        .pipeline
        .recent_errors
        .iter()
        .any(|e| e.contains("flaky")));

    // the failed task never reached storage
    assert_eq!(
        orchestrator.get_learned_technologies().unwrap(),
        vec!["first", "third"]
    );
}

#[tokio::test]
async fn test_tasks_settle_after_drain() {
    let dir = TempDir::new().unwrap();
    let (_gen, orchestrator) = orchestrator_with(StubGenerator::flaky_for("flaky"), &dir);

    orchestrator.queue_learning("ok", Depth::Basic, TaskPriority::Low).unwrap();
    orchestrator.queue_learning("flaky", Depth::Basic, TaskPriority::High).unwrap();
    orchestrator.drain().await;

    let status = orchestrator.get_status().unwrap();
    // termination: nothing left pending or running
    assert_eq!(status.pipeline.pending, 0);
    assert_eq!(status.pipeline.running, 0);
    assert_eq!(status.pipeline.completed + status.pipeline.failed, 2);
}

#[tokio::test]
async fn test_crashing_example_fails_with_partial_artifacts() {
    let dir = TempDir::new().unwrap();
    let (_gen, orchestrator) =
        orchestrator_with(StubGenerator::with_program("echo boom >&2\nexit 1\n"), &dir);

    let result = orchestrator.learn_technology("broken", Depth::Basic).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.tests_passed, 0);
    assert_eq!(result.tests_total, 1);
    assert!(result.errors.iter().any(|e| e.contains("execution")));
    // research, code_generation, execution, quality_analysis, storage all ran
    assert_eq!(result.artifacts.len(), 5);
    assert!(result.tests_passed <= result.tests_total);
}

#[tokio::test]
async fn test_infinite_loop_times_out_instead_of_hanging() {
    let dir = TempDir::new().unwrap();
    let generator = Arc::new(StubGenerator::with_program("sleep 60\n"));
    let store = Arc::new(KnowledgeStore::with_dir(dir.path()).unwrap());
    let orchestrator = Orchestrator::with_collaborators(
        Arc::clone(&generator) as Arc<dyn TextGenerator>,
        None,
        SandboxExecutor::with_timeout(Duration::from_millis(300)),
        store,
        Language::Shell,
        256,
        3,
    );

    let start = std::time::Instant::now();
    let result = orchestrator.learn_technology("hang", Depth::Basic).await.unwrap();

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("timed out")));
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_example_source_failure_only_skips_augmentation() {
    let dir = TempDir::new().unwrap();
    let generator = Arc::new(StubGenerator::good());
    let store = Arc::new(KnowledgeStore::with_dir(dir.path()).unwrap());
    let orchestrator = Orchestrator::with_collaborators(
        Arc::clone(&generator) as Arc<dyn TextGenerator>,
        Some(Arc::new(BrokenExamples)),
        SandboxExecutor::with_timeout(Duration::from_secs(5)),
        store,
        Language::Shell,
        256,
        3,
    );

    let result = orchestrator.learn_technology("json", Depth::Basic).await.unwrap();
    assert!(result.success, "errors: {:?}", result.errors);

    let research = &result.artifacts[0];
    assert_eq!(research.metadata.get("examples_requested").map(String::as_str), Some("true"));
    assert_eq!(research.metadata.get("examples_found").map(String::as_str), Some("0"));
}

#[tokio::test]
async fn test_background_pipeline_start_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (_gen, orchestrator) = orchestrator_with(StubGenerator::good(), &dir);

    orchestrator.start_pipeline();
    orchestrator.start_pipeline(); // no-op

    orchestrator.queue_learning("json", Depth::Basic, TaskPriority::Normal).unwrap();

    // wait for the background loop to finish the task
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        let status = orchestrator.get_status().unwrap();
        if status.pipeline.completed + status.pipeline.failed >= 1 {
            // exactly one outcome: the second start did not double-claim
            assert_eq!(status.pipeline.completed + status.pipeline.failed, 1);
            break;
        }
        assert!(std::time::Instant::now() < deadline, "pipeline never drained the task");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    orchestrator.stop_pipeline();
}

#[tokio::test]
async fn test_enqueue_during_drain_is_picked_up() {
    let dir = TempDir::new().unwrap();
    let (_gen, orchestrator) = orchestrator_with(StubGenerator::good(), &dir);

    orchestrator.start_pipeline();
    orchestrator.queue_learning("one", Depth::Basic, TaskPriority::Normal).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    orchestrator.queue_learning("two", Depth::Basic, TaskPriority::Normal).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        let status = orchestrator.get_status().unwrap();
        if status.pipeline.completed + status.pipeline.failed >= 2 {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "second enqueue was never drained");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    orchestrator.stop_pipeline();
}

#[tokio::test]
async fn test_retryable_failure_recovers_within_attempt_budget() {
    let dir = TempDir::new().unwrap();
    // two rate-limited calls, then healthy: research succeeds on its
    // third (final) attempt, code generation on its first
    let generator = Arc::new(RecoveringGenerator::rate_limited_for(2));
    let store = Arc::new(KnowledgeStore::with_dir(dir.path()).unwrap());
    let orchestrator = Orchestrator::with_collaborators(
        Arc::clone(&generator) as Arc<dyn TextGenerator>,
        None,
        SandboxExecutor::with_timeout(Duration::from_secs(5)),
        store,
        Language::Shell,
        256,
        3,
    );

    let result = orchestrator.learn_technology("json", Depth::Basic).await.unwrap();

    assert!(result.success, "errors: {:?}", result.errors);
    assert!(result.errors.is_empty());
    assert_eq!(generator.call_count(), 4, "2 rate-limited + 1 research + 1 code generation");
    assert_eq!(orchestrator.knowledge().get_latest("json").unwrap().version, 1);
}

#[tokio::test]
async fn test_restart_after_stop_keeps_draining() {
    let dir = TempDir::new().unwrap();
    let (_gen, orchestrator) = orchestrator_with(StubGenerator::good(), &dir);

    orchestrator.start_pipeline();
    orchestrator.stop_pipeline();
    // immediate restart must win even if the old loop is still winding down
    orchestrator.start_pipeline();
    orchestrator.queue_learning("json", Depth::Basic, TaskPriority::Normal).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        let status = orchestrator.get_status().unwrap();
        if status.pipeline.completed + status.pipeline.failed >= 1 {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "restarted pipeline never drained the task");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    orchestrator.stop_pipeline();
}

#[tokio::test]
async fn test_report_includes_rates_and_grades() {
    let dir = TempDir::new().unwrap();
    let (_gen, orchestrator) = orchestrator_with(StubGenerator::flaky_for("flaky"), &dir);

    orchestrator.queue_learning("json", Depth::Basic, TaskPriority::Normal).unwrap();
    orchestrator.queue_learning("flaky", Depth::Basic, TaskPriority::Normal).unwrap();
    orchestrator.drain().await;

    let report = orchestrator.generate_report().unwrap();
    assert!(report.contains("Success rate: 50%"));
    assert!(report.contains("json"));
    assert!(report.contains("Recent errors"));
}
