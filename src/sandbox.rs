//! Sandboxed execution of generated code
//!
//! Spawns one isolated subprocess per run, feeds the program on stdin,
//! enforces a hard timeout, and captures stdout/stderr/exit status. This
//! is a boundary: every failure mode (spawn failure, timeout, crash)
//! becomes outcome data, never a propagated error.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

/// Default timeout for a single execution
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum captured output per stream (1 MB)
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Languages the sandbox can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Python,
    JavaScript,
    Shell,
}

impl Language {
    /// Interpreter command; all three read the program from stdin
    fn interpreter(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Language::Python => ("python3", &["-"]),
            Language::JavaScript => ("node", &[]),
            Language::Shell => ("sh", &["-s"]),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::JavaScript => write!(f, "javascript"),
            Language::Shell => write!(f, "shell"),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "shell" | "sh" | "bash" => Ok(Language::Shell),
            other => Err(format!("unsupported language '{}'", other)),
        }
    }
}

/// Structured outcome of one sandboxed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Exit code 0 and no timeout
    pub success: bool,
    /// Captured stdout (size-capped)
    pub output: String,
    /// Captured stderr, or a description of the spawn failure/timeout
    pub error: String,
    /// Exit code (None if timed out, killed, or never spawned)
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Wall-clock seconds
    pub execution_time: f64,
}

impl ExecutionOutcome {
    fn failure(error: String, execution_time: f64, timed_out: bool) -> Self {
        Self {
            success: false,
            output: String::new(),
            error,
            exit_code: None,
            timed_out,
            execution_time,
        }
    }
}

/// Subprocess sandbox
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    timeout: Duration,
    max_output_size: usize,
}

impl SandboxExecutor {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_output_size: MAX_OUTPUT_SIZE,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            max_output_size: MAX_OUTPUT_SIZE,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `code` under the given language's interpreter.
    ///
    /// Never returns an error: spawn failure, timeout, and non-zero exit
    /// are all reported through the outcome.
    pub async fn execute(&self, code: &str, language: Language) -> ExecutionOutcome {
        let start = std::time::Instant::now();
        let (program, args) = language.interpreter();

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(%language, error = %e, "failed to spawn interpreter");
                return ExecutionOutcome::failure(
                    format!("failed to spawn {}: {}", program, e),
                    start.elapsed().as_secs_f64(),
                    false,
                );
            }
        };

        // Feed the program while the child runs. The write must happen
        // inside the timeout window: a program larger than the pipe
        // buffer blocks the writer until the interpreter reads it, and
        // an interpreter that never reads would otherwise stall us
        // before the clock even started.
        let stdin = child.stdin.take();
        let interaction = async move {
            let feed = async {
                if let Some(mut stdin) = stdin {
                    if let Err(e) = stdin.write_all(code.as_bytes()).await {
                        warn!(%language, error = %e, "failed to write program to stdin");
                    }
                    // stdin drops here, closing the pipe
                }
            };
            let (_, output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        let waited = timeout(self.timeout, interaction).await;
        let duration = start.elapsed().as_secs_f64();

        match waited {
            Ok(Ok(output)) => {
                let stdout = cap_output(&output.stdout, self.max_output_size);
                let stderr = cap_output(&output.stderr, self.max_output_size);
                let exit_code = output.status.code();
                let success = output.status.success();

                info!(
                    %language,
                    exit_code = ?exit_code,
                    duration_secs = duration,
                    "sandbox execution finished"
                );

                ExecutionOutcome {
                    success,
                    output: stdout,
                    error: stderr,
                    exit_code,
                    timed_out: false,
                    execution_time: duration,
                }
            }
            Ok(Err(e)) => ExecutionOutcome::failure(
                format!("failed to collect output: {}", e),
                duration,
                false,
            ),
            Err(_) => {
                // kill_on_drop reaps the process; the hard timeout is the
                // sandbox's own, independent of any queue stop signal
                warn!(%language, timeout = ?self.timeout, "sandbox execution timed out, process killed");
                ExecutionOutcome::failure(
                    format!("execution timed out after {:?}", self.timeout),
                    duration,
                    true,
                )
            }
        }
    }
}

impl Default for SandboxExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn cap_output(bytes: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated, total: {} bytes]", &text[..end], text.len())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing() {
        assert_eq!("py".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("node".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!("bash".parse::<Language>().unwrap(), Language::Shell);
        assert!("cobol".parse::<Language>().is_err());
    }

    #[test]
    fn test_cap_output() {
        let capped = cap_output(b"abcdef", 3);
        assert!(capped.starts_with("abc"));
        assert!(capped.contains("truncated"));
        assert_eq!(cap_output(b"short", 100), "short");
    }

    #[tokio::test]
    async fn test_execute_success() {
        let sandbox = SandboxExecutor::new();
        let outcome = sandbox.execute("echo hello", Language::Shell).await;
        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.output.contains("hello"));
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn test_execute_nonzero_exit() {
        let sandbox = SandboxExecutor::new();
        let outcome = sandbox.execute("exit 3", Language::Shell).await;
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_execute_timeout_is_data_not_error() {
        let sandbox = SandboxExecutor::with_timeout(Duration::from_millis(200));
        let start = std::time::Instant::now();
        let outcome = sandbox.execute("sleep 30", Language::Shell).await;
        assert!(!outcome.success);
        assert!(outcome.timed_out);
        assert!(outcome.error.contains("timed out"));
        // hard kill: well under the sleep duration
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_covers_stdin_feeding() {
        // A program far larger than the pipe buffer whose first line
        // stops reading stdin: the blocked write must not stall the
        // sandbox past its own timeout.
        let mut code = String::from("sleep 30\n");
        for _ in 0..40_000 {
            code.push_str("# padding so the writer cannot finish up front\n");
        }
        let sandbox = SandboxExecutor::with_timeout(Duration::from_millis(300));
        let start = std::time::Instant::now();
        let outcome = sandbox.execute(&code, Language::Shell).await;
        assert!(!outcome.success);
        assert!(outcome.timed_out);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_execute_stderr_captured() {
        let sandbox = SandboxExecutor::new();
        let outcome = sandbox.execute("echo oops >&2; exit 1", Language::Shell).await;
        assert!(!outcome.success);
        assert!(outcome.error.contains("oops"));
    }
}
