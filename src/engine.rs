//! Learning engine - drives one technology through the fixed phase
//! sequence: research, code generation, execution, quality analysis,
//! storage.
//!
//! The pipeline is linear and terminal on the first unrecoverable
//! failure: later phases are skipped, artifacts produced so far are kept,
//! and the triggering error is recorded on the result.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::LearnError;
use crate::knowledge::KnowledgeStore;
use crate::providers::{ExampleSource, ProviderError, TextGenerator};
use crate::quality::{QualityAnalyzer, QualityReport};
use crate::sandbox::{ExecutionOutcome, Language, SandboxExecutor};
use crate::types::{Depth, LearningArtifact, LearningResult, Phase};

/// Proficiency blend: even weighting of static quality and test outcome
const QUALITY_WEIGHT: f64 = 0.5;
const TESTS_WEIGHT: f64 = 0.5;

/// Minimum proficiency for a run to count as successful
const MIN_PASSING_PROFICIENCY: f64 = 0.5;

/// Bounded retry policy for text-generation calls
const MAX_PROVIDER_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

static PASS_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*PASS\b").expect("valid regex"));
static FAIL_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*FAIL\b").expect("valid regex"));

/// Executes the five-phase pipeline for exactly one technology
pub struct LearningEngine {
    text: Arc<dyn TextGenerator>,
    /// Best-effort; research proceeds without augmentation when absent
    examples: Option<Arc<dyn ExampleSource>>,
    sandbox: SandboxExecutor,
    analyzer: QualityAnalyzer,
    store: Arc<KnowledgeStore>,
    language: Language,
    max_tokens: u32,
    example_limit: usize,
}

impl LearningEngine {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        examples: Option<Arc<dyn ExampleSource>>,
        sandbox: SandboxExecutor,
        store: Arc<KnowledgeStore>,
        language: Language,
        max_tokens: u32,
        example_limit: usize,
    ) -> Self {
        Self {
            text,
            examples,
            sandbox,
            analyzer: QualityAnalyzer::new(),
            store,
            language,
            max_tokens,
            example_limit,
        }
    }

    /// Run the full pipeline for one technology.
    ///
    /// Never returns an error: per-task failures populate
    /// `LearningResult::errors` with `success = false`.
    pub async fn learn(&self, technology: &str, depth: Depth) -> LearningResult {
        let start = std::time::Instant::now();
        info!(technology, %depth, "learning pipeline started");

        let mut artifacts: Vec<LearningArtifact> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut suggestions: Vec<String> = Vec::new();
        let mut tests_passed = 0u32;
        let mut tests_total = 0u32;
        let mut quality: Option<QualityReport> = None;
        let mut truncated = false;
        let mut code = String::new();

        // Phase 1: research
        match self.research(technology).await {
            Ok(artifact) => artifacts.push(artifact),
            Err(source) => {
                errors.push(LearnError::Provider { phase: Phase::Research, source }.to_string());
                truncated = true;
            }
        }

        // Phase 2: code generation
        if !truncated {
            match self.generate_code(technology, depth).await {
                Ok(artifact) => {
                    code = artifact.content.clone();
                    artifacts.push(artifact);
                }
                Err(source) => {
                    errors.push(
                        LearnError::Provider { phase: Phase::CodeGeneration, source }.to_string(),
                    );
                    truncated = true;
                }
            }
        }

        // Phase 3: execution (sandbox failures are data, not truncation)
        let mut outcome: Option<ExecutionOutcome> = None;
        if !truncated {
            let run = self.sandbox.execute(&code, self.language).await;
            let (passed, total) = count_test_markers(&run.output, run.success);
            tests_passed = passed;
            tests_total = total;

            if !run.success {
                errors.push(if run.timed_out {
                    format!("execution: {}", run.error)
                } else {
                    format!("execution: exited with {:?}: {}", run.exit_code, truncate(&run.error, 300))
                });
            }

            let mut artifact = LearningArtifact::new(
                Phase::Execution,
                truncate(&run.output, 4000),
                if run.success { 1.0 } else { 0.0 },
            )
            .with_meta("exit_code", format!("{:?}", run.exit_code))
            .with_meta("timed_out", run.timed_out.to_string())
            .with_meta("tests_passed", passed.to_string())
            .with_meta("tests_total", total.to_string());
            if !run.error.is_empty() {
                artifact = artifact.with_meta("stderr", truncate(&run.error, 1000));
            }
            artifacts.push(artifact);
            outcome = Some(run);
        }

        // Phase 4: quality analysis
        if let Some(run) = &outcome {
            let report = self.analyzer.analyze(&code, self.language, run);
            artifacts.push(
                LearningArtifact::new(
                    Phase::QualityAnalysis,
                    format!("score {:.2}, grade {}", report.score, report.grade),
                    report.score,
                )
                .with_meta("grade", report.grade.to_string()),
            );
            suggestions.extend(report.suggestions.clone());
            quality = Some(report);
        }

        let quality_score = quality.as_ref().map(|r| r.score).unwrap_or(0.0);
        let quality_grade = quality
            .as_ref()
            .map(|r| r.grade)
            .unwrap_or(crate::quality::Grade::F);
        let proficiency = compute_proficiency(quality_score, tests_passed, tests_total);

        // Phase 5: storage; a write failure marks the run failed but
        // leaves prior versions intact
        let mut stored = false;
        if !code.is_empty() {
            match self.store.put(technology, quality_grade, proficiency, &code) {
                Ok(record) => {
                    artifacts.push(
                        LearningArtifact::new(
                            Phase::Storage,
                            format!("stored {} v{}", record.technology, record.version),
                            1.0,
                        )
                        .with_meta("version", record.version.to_string()),
                    );
                    stored = true;
                }
                Err(e) => {
                    warn!(technology, error = %e, "knowledge write failed");
                    errors.push(format!("storage: {}", e));
                }
            }
        }

        let success =
            !truncated && stored && errors.is_empty() && proficiency >= MIN_PASSING_PROFICIENCY;
        let execution_time = start.elapsed().as_secs_f64();

        info!(
            technology,
            success,
            proficiency,
            grade = %quality_grade,
            tests = format!("{}/{}", tests_passed, tests_total),
            "learning pipeline finished"
        );

        LearningResult {
            technology: technology.to_string(),
            success,
            proficiency,
            quality_grade,
            tests_passed,
            tests_total,
            execution_time,
            errors,
            suggestions,
            artifacts,
        }
    }

    // --- Phases ---

    async fn research(&self, technology: &str) -> Result<LearningArtifact, ProviderError> {
        let prompt = format!(
            "Describe the '{}' library/technology in 3-5 sentences: what it is for, \
             its core concepts, and the most common usage pattern.",
            technology
        );
        let description = self.generate_with_retry(&prompt).await?;

        let length = description.len();
        let mut artifact = LearningArtifact::new(Phase::Research, description, 0.8)
            .with_meta("length", length.to_string());

        match &self.examples {
            None => {
                artifact = artifact.with_meta("examples_requested", "false");
            }
            Some(source) => {
                artifact = artifact.with_meta("examples_requested", "true");
                match source.search_examples(technology, self.example_limit).await {
                    Ok(found) => {
                        artifact = artifact.with_meta("examples_found", found.len().to_string());
                        if !found.is_empty() {
                            let mut augmented = String::from("\n\nExternal examples:\n");
                            for example in &found {
                                augmented.push_str(&format!("- {}: {}\n", example.source, example.content));
                            }
                            artifact.content.push_str(&augmented);
                        }
                    }
                    Err(e) => {
                        // Best-effort: augmentation failure never aborts research
                        debug!(technology, error = %e, "example lookup failed, continuing without");
                        artifact = artifact
                            .with_meta("examples_found", "0")
                            .with_meta("examples_error", e.to_string());
                    }
                }
            }
        }

        Ok(artifact)
    }

    async fn generate_code(&self, technology: &str, depth: Depth) -> Result<LearningArtifact, ProviderError> {
        let checks = depth.expected_checks();
        let prompt = format!(
            "Write a single runnable {language} program demonstrating {depth} usage of '{technology}'. \
             Include at least {checks} verification check(s); after each check passes, print a line \
             starting with 'PASS:' and on failure print a line starting with 'FAIL:'. \
             Use only the standard library plus '{technology}' itself. \
             Respond with the program only, no prose.",
            language = self.language,
            depth = depth,
            technology = technology,
            checks = checks,
        );
        let raw = self.generate_with_retry(&prompt).await?;
        let code = strip_code_fences(&raw);
        if code.trim().is_empty() {
            return Err(ProviderError::Parse("generated program was empty".to_string()));
        }

        Ok(LearningArtifact::new(Phase::CodeGeneration, code, 0.8)
            .with_meta("requested_checks", checks.to_string())
            .with_meta("language", self.language.to_string()))
    }

    /// Retry transient provider failures with exponential backoff and jitter
    async fn generate_with_retry(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.text.generate(prompt, self.max_tokens).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < MAX_PROVIDER_ATTEMPTS => {
                    let base = RETRY_BASE_DELAY_MS << (attempt - 1);
                    let jitter = rand::rng().random_range(0..=base / 2);
                    warn!(attempt, delay_ms = base + jitter, error = %e, "provider call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(base + jitter)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Weighted blend of static quality and sandbox test ratio, clamped to [0,1]
fn compute_proficiency(quality_score: f64, tests_passed: u32, tests_total: u32) -> f64 {
    let pass_ratio = if tests_total > 0 {
        tests_passed as f64 / tests_total as f64
    } else {
        0.0
    };
    (QUALITY_WEIGHT * quality_score + TESTS_WEIGHT * pass_ratio).clamp(0.0, 1.0)
}

/// Count self-reported PASS/FAIL markers on stdout.
///
/// No markers: a clean run counts as one passed check, a crash as one
/// failed check.
fn count_test_markers(stdout: &str, ran_clean: bool) -> (u32, u32) {
    let passed = PASS_MARKER_RE.find_iter(stdout).count() as u32;
    let failed = FAIL_MARKER_RE.find_iter(stdout).count() as u32;
    if passed + failed == 0 {
        if ran_clean {
            (1, 1)
        } else {
            (0, 1)
        }
    } else {
        (passed, passed + failed)
    }
}

/// Strip a Markdown code fence if the model wrapped the program in one
fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines = trimmed.lines();
    lines.next(); // opening fence, possibly with a language tag
    let body: Vec<&str> = lines.take_while(|line| !line.trim_start().starts_with("```")).collect();
    body.join("\n")
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_with_language_tag() {
        let raw = "```python\nprint('hi')\n```";
        assert_eq!(strip_code_fences(raw), "print('hi')");
    }

    #[test]
    fn test_strip_code_fences_passthrough() {
        assert_eq!(strip_code_fences("print('hi')\n"), "print('hi')");
    }

    #[test]
    fn test_count_markers() {
        let stdout = "PASS: roundtrip\nsome output\nPASS: types\nFAIL: edge case\n";
        assert_eq!(count_test_markers(stdout, true), (2, 3));
    }

    #[test]
    fn test_count_markers_none_clean_run() {
        assert_eq!(count_test_markers("hello\n", true), (1, 1));
    }

    #[test]
    fn test_count_markers_none_crash() {
        assert_eq!(count_test_markers("", false), (0, 1));
    }

    #[test]
    fn test_markers_case_insensitive_line_anchored() {
        assert_eq!(count_test_markers("pass: ok\n  FAIL: no\nbypass: not counted\n", true), (1, 2));
    }

    #[test]
    fn test_proficiency_blend() {
        assert_eq!(compute_proficiency(1.0, 1, 1), 1.0);
        assert_eq!(compute_proficiency(0.8, 1, 1), 0.9);
        assert_eq!(compute_proficiency(0.8, 0, 1), 0.4);
        assert_eq!(compute_proficiency(0.0, 0, 1), 0.0);
    }

    #[test]
    fn test_proficiency_invariant_never_exceeds_bounds() {
        for q in [0.0, 0.3, 0.7, 1.0] {
            for (p, t) in [(0, 1), (1, 1), (2, 5), (5, 5)] {
                let prof = compute_proficiency(q, p, t);
                assert!((0.0..=1.0).contains(&prof));
            }
        }
    }
}
