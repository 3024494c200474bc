use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Exit code reported for a process the engine had to kill.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    #[serde(rename = "javascript")]
    JavaScript,
    Java,
    Cpp,
    C,
}

/// Runtime coordinates understood by the remote execution API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemoteRuntime {
    pub language: &'static str,
    pub version: &'static str,
}

impl Language {
    /// Supported-language table, in display order
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::JavaScript,
        Language::Java,
        Language::Cpp,
        Language::C,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "python" => Some(Language::Python),
            "javascript" => Some(Language::JavaScript),
            "java" => Some(Language::Java),
            "cpp" => Some(Language::Cpp),
            "c" => Some(Language::C),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
        }
    }

    pub fn remote_runtime(&self) -> RemoteRuntime {
        let (language, version) = match self {
            Language::Python => ("python", "3.10"),
            Language::JavaScript => ("javascript", "18.15.0"),
            Language::Java => ("java", "15.0.2"),
            Language::Cpp => ("cpp", "10.2.0"),
            Language::C => ("c", "10.2.0"),
        };
        RemoteRuntime { language, version }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers of every supported language, e.g. `[python, javascript, java, cpp, c]`
pub fn supported_language_names() -> String {
    let names: Vec<&str> = Language::ALL.iter().map(Language::as_str).collect();
    format!("[{}]", names.join(", "))
}

fn default_visible() -> bool {
    true
}

/// Instructor-defined test case. Read-only from the engine's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub assignment_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stdin: String,
    #[serde(default)]
    pub expected_output: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub memory_limit_mb: Option<u32>,
    #[serde(default)]
    pub points: Option<f64>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub sort_order: i32,
}

impl TestCase {
    pub fn new(name: impl Into<String>, stdin: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            id: None,
            assignment_id: None,
            name: name.into(),
            description: None,
            stdin: stdin.into(),
            expected_output: expected_output.into(),
            timeout_ms: None,
            memory_limit_mb: None,
            points: None,
            visible: true,
            sort_order: 0,
        }
    }

    pub fn with_points(mut self, points: f64) -> Self {
        self.points = Some(points);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Points used for scoring: missing or negative values count as zero
    pub fn scoring_points(&self) -> f64 {
        self.points.filter(|p| p.is_finite() && *p > 0.0).unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("test case name must not be empty".to_string());
        }
        if let Some(points) = self.points {
            if !points.is_finite() || points < 0.0 {
                return Err(format!("test case '{}' has invalid points: {}", self.name, points));
            }
        }
        if self.timeout_ms == Some(0) {
            return Err(format!("test case '{}' has a zero timeout", self.name));
        }
        Ok(())
    }
}

/// One program execution, built per test case and discarded afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: Language,
    pub stdin: String,
    pub timeout_ms: u64,
    #[serde(default)]
    pub memory_limit_mb: Option<u32>,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, language: Language, stdin: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            code: code.into(),
            language,
            stdin: stdin.into(),
            timeout_ms,
            memory_limit_mb: None,
        }
    }

    pub fn with_memory_limit_mb(mut self, limit: Option<u32>) -> Self {
        self.memory_limit_mb = limit;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whole seconds of budget, rounded up
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_ms.div_ceil(1000).max(1)
    }
}

/// Tagged classification of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    ProgramFailure,
    InfrastructureFailure,
    TimedOut,
    UnsupportedLanguage,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::ProgramFailure => "program_failure",
            OutcomeKind::InfrastructureFailure => "infrastructure_failure",
            OutcomeKind::TimedOut => "timed_out",
            OutcomeKind::UnsupportedLanguage => "unsupported_language",
        }
    }
}

/// Result of running a program once.
///
/// Built only through the constructors below, which keep
/// `timed_out => !succeeded` and `succeeded <=> kind == Success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub kind: OutcomeKind,
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub runtime_ms: u64,
    pub timed_out: bool,
    #[serde(default)]
    pub backend: Option<String>,
}

impl ExecutionOutcome {
    /// A program that ran to completion; exit code decides success.
    pub fn completed(stdout: String, stderr: String, exit_code: i32, runtime_ms: u64) -> Self {
        let succeeded = exit_code == 0;
        Self {
            kind: if succeeded { OutcomeKind::Success } else { OutcomeKind::ProgramFailure },
            succeeded,
            stdout,
            stderr,
            exit_code,
            runtime_ms,
            timed_out: false,
            backend: None,
        }
    }

    pub fn timed_out(stdout: String, stderr: String, exit_code: i32, runtime_ms: u64) -> Self {
        Self {
            kind: OutcomeKind::TimedOut,
            succeeded: false,
            stdout,
            stderr,
            exit_code,
            runtime_ms,
            timed_out: true,
            backend: None,
        }
    }

    /// The engine could not run the program at all
    pub fn infrastructure(stderr: impl Into<String>, runtime_ms: u64) -> Self {
        Self {
            kind: OutcomeKind::InfrastructureFailure,
            succeeded: false,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: 1,
            runtime_ms,
            timed_out: false,
            backend: None,
        }
    }

    pub fn unsupported_language(stderr: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::UnsupportedLanguage,
            succeeded: false,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: 1,
            runtime_ms: 0,
            timed_out: false,
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: &str) -> Self {
        self.backend = Some(backend.to_string());
        self
    }
}

/// Per-test grading result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub passed: bool,
    pub actual_output: String,
    pub expected_output: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub runtime_ms: u64,
    pub timed_out: bool,
    pub visible: bool,
    pub points: Option<f64>,
    pub outcome: OutcomeKind,
}

/// How the submission owner should transition the submission after grading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionGrade {
    Graded,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingSummary {
    pub results: Vec<TestResult>,
    pub passed_count: usize,
    pub total_count: usize,
    pub earned_points: f64,
    pub total_points: f64,
    pub score: f64,
}

impl GradingSummary {
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            passed_count: 0,
            total_count: 0,
            earned_points: 0.0,
            total_points: 0.0,
            score: 0.0,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.total_count > 0 && self.passed_count == self.total_count
    }

    pub fn timed_out_count(&self) -> usize {
        self.results.iter().filter(|r| r.timed_out).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Errored,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Errored => "errored",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid sandbox job transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Advisory tracking record for one grading run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxJob {
    pub id: Uuid,
    pub submission_id: i64,
    pub status: JobStatus,
    pub timeout_seconds: u64,
    pub memory_limit_mb: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub passed_count: Option<usize>,
    pub score: Option<f64>,
}

impl SandboxJob {
    pub fn new(submission_id: i64, timeout_seconds: u64, memory_limit_mb: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            submission_id,
            status: JobStatus::Queued,
            timeout_seconds,
            memory_limit_mb,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            passed_count: None,
            score: None,
        }
    }

    fn transition(&mut self, expected: JobStatus, to: JobStatus) -> Result<(), InvalidTransition> {
        if self.status != expected {
            return Err(InvalidTransition { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }

    pub fn mark_running(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Queued, JobStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_completed(&mut self, summary: &GradingSummary) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Running, JobStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.passed_count = Some(summary.passed_count);
        self.score = Some(summary.score);
        Ok(())
    }

    pub fn mark_errored(&mut self, error_message: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Running, JobStatus::Errored)?;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(error_message.into());
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Errored)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}
