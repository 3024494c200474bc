/// Remote execution through a Piston-compatible API
///
/// **Failure classification:**
/// - Language outside the table: in-band failure, no request sent
/// - Non-2xx status or undecodable body: in-band failure, no fallback
/// - Connection error or client-side timeout: `TransportError`, caller may fall back
/// - Kill signal or "timed out" in stderr: `timed_out = true` whatever the exit code
use super::{ExecutionBackend, TransportError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use autograde_common::config::EngineConfig;
use autograde_common::types::{
    ExecutionOutcome, ExecutionRequest, Language, TIMEOUT_EXIT_CODE,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const BACKEND_NAME: &str = "remote";

#[derive(Debug, Serialize)]
struct SourceFile<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ExecutePayload<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<SourceFile<'a>>,
    stdin: &'a str,
    /// Milliseconds
    run_timeout: u64,
    /// Bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    run_memory_limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StageResult {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default, alias = "exit_code")]
    code: Option<i32>,
    #[serde(default)]
    signal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    compile: Option<StageResult>,
    #[serde(default)]
    run: Option<StageResult>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

pub struct RemoteExecutionAdapter {
    client: reqwest::Client,
    base_url: String,
    overhead: Duration,
    languages: Vec<Language>,
}

impl RemoteExecutionAdapter {
    pub fn new(base_url: impl Into<String>, overhead: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client for remote execution")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            overhead,
            languages: Language::ALL.to_vec(),
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(
            config.remote_url.clone(),
            Duration::from_secs(config.remote_overhead_secs),
        )
    }

    /// Restrict the runtimes this deployment offers
    pub fn with_languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = languages;
        self
    }

    fn supported_names(&self) -> String {
        let names: Vec<&str> = self.languages.iter().map(Language::as_str).collect();
        format!("[{}]", names.join(", "))
    }

    fn execute_url(&self) -> String {
        format!("{}/execute", self.base_url)
    }
}

#[async_trait]
impl ExecutionBackend for RemoteExecutionAdapter {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn supports(&self, language: Language) -> bool {
        self.languages.contains(&language)
    }

    async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, TransportError> {
        if !self.supports(request.language) {
            return Ok(ExecutionOutcome::unsupported_language(format!(
                "Language {} not supported. Supported: {}",
                request.language,
                self.supported_names()
            ))
            .with_backend(BACKEND_NAME));
        }

        let runtime = request.language.remote_runtime();
        let payload = ExecutePayload {
            language: runtime.language,
            version: runtime.version,
            files: vec![SourceFile { content: &request.code }],
            stdin: &request.stdin,
            run_timeout: request.timeout_ms,
            run_memory_limit: request.memory_limit_mb.map(|mb| u64::from(mb) * 1024 * 1024),
        };

        // Bounded wait: execution budget plus API round-trip margin
        let wait = request.timeout() + self.overhead;
        let start = Instant::now();

        debug!(
            language = %request.language,
            version = runtime.version,
            timeout_ms = request.timeout_ms,
            wait_ms = wait.as_millis() as u64,
            "Submitting code to remote execution API"
        );

        let response = self
            .client
            .post(self.execute_url())
            .timeout(wait)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, timed_out = e.is_timeout(), "Remote execution API unreachable");
                TransportError::new(BACKEND_NAME, e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!(error = %e, "Failed to read remote execution response");
            TransportError::new(BACKEND_NAME, e.to_string())
        })?;
        let runtime_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| format!(" ({})", b.message))
                .unwrap_or_default();
            warn!(status = status.as_u16(), "Remote execution API returned an error status");
            return Ok(ExecutionOutcome::infrastructure(
                format!("API error: {}{}", status.as_u16(), detail),
                runtime_ms,
            )
            .with_backend(BACKEND_NAME));
        }

        let outcome = match serde_json::from_str::<ExecuteResponse>(&body) {
            Ok(parsed) => map_response(parsed, runtime_ms),
            Err(e) => {
                warn!(error = %e, "Malformed remote execution response");
                ExecutionOutcome::infrastructure(format!("Malformed API response: {}", e), runtime_ms)
            }
        };

        Ok(outcome.with_backend(BACKEND_NAME))
    }
}

/// Whether the API reported that it had to stop the program
fn indicates_timeout(stage: &StageResult) -> bool {
    stage.signal.as_deref() == Some("SIGKILL") || stage.stderr.to_lowercase().contains("timed out")
}

fn map_response(response: ExecuteResponse, runtime_ms: u64) -> ExecutionOutcome {
    if let Some(compile) = response.compile {
        if indicates_timeout(&compile) {
            let exit_code = compile.code.unwrap_or(TIMEOUT_EXIT_CODE);
            return ExecutionOutcome::timed_out(compile.stdout, compile.stderr, exit_code, runtime_ms);
        }
        if compile.code.unwrap_or(0) != 0 || compile.signal.is_some() {
            let stderr = if compile.stderr.is_empty() { compile.stdout } else { compile.stderr };
            return ExecutionOutcome::completed(
                String::new(),
                stderr,
                compile.code.unwrap_or(TIMEOUT_EXIT_CODE),
                runtime_ms,
            );
        }
    }

    let Some(run) = response.run else {
        return ExecutionOutcome::infrastructure("Malformed API response: missing run result", runtime_ms);
    };

    if indicates_timeout(&run) {
        let exit_code = run.code.unwrap_or(TIMEOUT_EXIT_CODE);
        return ExecutionOutcome::timed_out(run.stdout, run.stderr, exit_code, runtime_ms);
    }

    // A missing exit code means the program was terminated by a signal
    let exit_code = run.code.unwrap_or(TIMEOUT_EXIT_CODE);
    ExecutionOutcome::completed(run.stdout, run.stderr, exit_code, runtime_ms)
}
