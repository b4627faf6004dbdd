//! Shared data model for the learning pipeline
//!
//! Tasks flow through the queue, artifacts are produced per phase, and a
//! `LearningResult` collects everything a run produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// How thorough the generated material should be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Basic,
    Intermediate,
    Advanced,
}

impl Depth {
    /// Number of self-checks the generated example is asked to include
    pub fn expected_checks(&self) -> u32 {
        match self {
            Depth::Basic => 1,
            Depth::Intermediate => 3,
            Depth::Advanced => 5,
        }
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Depth::Basic => write!(f, "basic"),
            Depth::Intermediate => write!(f, "intermediate"),
            Depth::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for Depth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(Depth::Basic),
            "intermediate" => Ok(Depth::Intermediate),
            "advanced" => Ok(Depth::Advanced),
            other => Err(format!("unknown depth '{}'", other)),
        }
    }
}

/// Dequeue priority; higher drains first, FIFO within a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Normal => write!(f, "normal"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "normal" => Ok(TaskPriority::Normal),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Pipeline phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Research,
    CodeGeneration,
    Execution,
    QualityAnalysis,
    Storage,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Research => write!(f, "research"),
            Phase::CodeGeneration => write!(f, "code_generation"),
            Phase::Execution => write!(f, "execution"),
            Phase::QualityAnalysis => write!(f, "quality_analysis"),
            Phase::Storage => write!(f, "storage"),
        }
    }
}

/// A queued learning request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningTask {
    pub id: Uuid,
    pub technology: String,
    pub depth: Depth,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    /// Enqueue order, used for FIFO within a priority tier
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}

impl LearningTask {
    pub fn new(
        technology: impl Into<String>,
        depth: Depth,
        priority: TaskPriority,
        seq: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            technology: technology.into(),
            depth,
            priority,
            status: TaskStatus::Pending,
            seq,
            created_at: Utc::now(),
        }
    }
}

/// Output of one pipeline phase, retained for inspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningArtifact {
    pub phase: Phase,
    pub content: String,
    /// Phase-local quality estimate in [0,1]
    pub quality_score: f64,
    pub metadata: BTreeMap<String, String>,
}

impl LearningArtifact {
    pub fn new(phase: Phase, content: impl Into<String>, quality_score: f64) -> Self {
        Self {
            phase,
            content: content.into(),
            quality_score: quality_score.clamp(0.0, 1.0),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Final outcome of one pipeline run for one technology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningResult {
    pub technology: String,
    pub success: bool,
    /// Normalized [0,1] measure of how well the example demonstrates
    /// correct, working usage
    pub proficiency: f64,
    pub quality_grade: crate::quality::Grade,
    pub tests_passed: u32,
    pub tests_total: u32,
    /// Wall-clock seconds for the whole run
    pub execution_time: f64,
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
    /// One artifact per completed phase, in phase order
    pub artifacts: Vec<LearningArtifact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Low < TaskPriority::Normal);
        assert!(TaskPriority::Normal < TaskPriority::High);
        assert!(TaskPriority::High < TaskPriority::Critical);
    }

    #[test]
    fn test_depth_round_trip() {
        for s in ["basic", "intermediate", "advanced"] {
            let d: Depth = s.parse().unwrap();
            assert_eq!(d.to_string(), s);
        }
        assert!("expert".parse::<Depth>().is_err());
    }

    #[test]
    fn test_priority_round_trip() {
        for s in ["low", "normal", "high", "critical"] {
            let p: TaskPriority = s.parse().unwrap();
            assert_eq!(p.to_string(), s);
        }
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn test_depth_expected_checks() {
        assert_eq!(Depth::Basic.expected_checks(), 1);
        assert_eq!(Depth::Advanced.expected_checks(), 5);
    }

    #[test]
    fn test_artifact_score_clamped() {
        let a = LearningArtifact::new(Phase::Research, "notes", 1.7);
        assert_eq!(a.quality_score, 1.0);
        let b = LearningArtifact::new(Phase::Research, "notes", -0.2);
        assert_eq!(b.quality_score, 0.0);
    }

    #[test]
    fn test_task_starts_pending() {
        let task = LearningTask::new("json", Depth::Basic, TaskPriority::Normal, 0);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.technology, "json");
    }
}
