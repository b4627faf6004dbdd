//! Quality analysis of generated code
//!
//! A pure function of the code and its execution outcome: the same inputs
//! always produce the same score and grade.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::sandbox::{ExecutionOutcome, Language};

/// Score contribution of a clean run; a crashed run keeps a small floor
const EXEC_SUCCESS_SCORE: f64 = 0.5;
const EXEC_FAILURE_SCORE: f64 = 0.1;

/// Per-signal contributions of the static checks
const DOCUMENTATION_SCORE: f64 = 0.15;
const ERROR_HANDLING_SCORE: f64 = 0.1;
const FUNCTIONS_SCORE: f64 = 0.1;
const SELF_CHECKS_SCORE: f64 = 0.15;
const TYPE_ANNOTATIONS_SCORE: f64 = 0.1;

static PY_ANNOTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"def\s+\w+\s*\([^)]*:\s*\w|->\s*\w").expect("valid regex"));
static FUNCTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(def\s+\w+|function\s+\w+|const\s+\w+\s*=\s*(\([^)]*\)|\w+)\s*=>|\w+\s*\(\)\s*\{)").expect("valid regex"));

/// Letter grade, a deterministic discretization of the quality score.
///
/// Thresholds are exact and cover all of [0,1]:
/// >=0.95 A+, >=0.85 A, >=0.75 B, >=0.65 C, >=0.5 D, else F.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.95 {
            Grade::APlus
        } else if score >= 0.85 {
            Grade::A
        } else if score >= 0.75 {
            Grade::B
        } else if score >= 0.65 {
            Grade::C
        } else if score >= 0.5 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grade::APlus => write!(f, "A+"),
            Grade::A => write!(f, "A"),
            Grade::B => write!(f, "B"),
            Grade::C => write!(f, "C"),
            Grade::D => write!(f, "D"),
            Grade::F => write!(f, "F"),
        }
    }
}

/// Which structural elements were found in the code
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StaticSignals {
    pub documentation: bool,
    pub error_handling: bool,
    pub functions: bool,
    pub self_checks: bool,
    pub type_annotations: bool,
}

/// Result of one analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    /// Score in [0,1]
    pub score: f64,
    pub grade: Grade,
    pub signals: StaticSignals,
    /// Improvement hints for the signals that were missing
    pub suggestions: Vec<String>,
}

/// Scores code along fixed static dimensions plus the execution outcome
#[derive(Debug, Clone, Default)]
pub struct QualityAnalyzer;

impl QualityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, code: &str, language: Language, outcome: &ExecutionOutcome) -> QualityReport {
        let signals = Self::static_signals(code, language);

        let mut score = if outcome.success {
            EXEC_SUCCESS_SCORE
        } else {
            EXEC_FAILURE_SCORE
        };
        if signals.documentation {
            score += DOCUMENTATION_SCORE;
        }
        if signals.error_handling {
            score += ERROR_HANDLING_SCORE;
        }
        if signals.functions {
            score += FUNCTIONS_SCORE;
        }
        if signals.self_checks {
            score += SELF_CHECKS_SCORE;
        }
        if signals.type_annotations {
            score += TYPE_ANNOTATIONS_SCORE;
        }
        let score = score.clamp(0.0, 1.0);

        QualityReport {
            score,
            grade: Grade::from_score(score),
            signals,
            suggestions: Self::suggestions(&signals, outcome),
        }
    }

    fn static_signals(code: &str, language: Language) -> StaticSignals {
        let documentation = match language {
            Language::Python => code.contains("\"\"\"") || code.contains("'''") || code.contains('#'),
            Language::JavaScript => code.contains("//") || code.contains("/*"),
            Language::Shell => code.lines().any(|l| l.trim_start().starts_with('#')),
        };

        let error_handling = match language {
            Language::Python => code.contains("try:") && code.contains("except"),
            Language::JavaScript => code.contains("try") && code.contains("catch"),
            Language::Shell => code.contains("set -e") || code.contains("||"),
        };

        let self_checks = match language {
            Language::Python => code.contains("assert"),
            Language::JavaScript => code.contains("assert") || code.contains("console.assert"),
            Language::Shell => code.contains("test ") || code.contains("[ "),
        };

        let type_annotations = match language {
            Language::Python => PY_ANNOTATION_RE.is_match(code),
            // Only meaningful for Python sources
            Language::JavaScript | Language::Shell => false,
        };

        StaticSignals {
            documentation,
            error_handling,
            functions: FUNCTION_RE.is_match(code),
            self_checks,
            type_annotations,
        }
    }

    fn suggestions(signals: &StaticSignals, outcome: &ExecutionOutcome) -> Vec<String> {
        let mut out = Vec::new();
        if !outcome.success {
            if outcome.timed_out {
                out.push("example did not finish within the sandbox timeout".to_string());
            } else {
                out.push("example exited with an error; fix the failing code path".to_string());
            }
        }
        if !signals.documentation {
            out.push("add documentation or comments explaining the example".to_string());
        }
        if !signals.error_handling {
            out.push("handle expected failure cases explicitly".to_string());
        }
        if !signals.self_checks {
            out.push("add assertions that verify the demonstrated behavior".to_string());
        }
        if !signals.functions {
            out.push("structure the example into named functions".to_string());
        }
        out
    }
}
