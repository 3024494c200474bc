/// Local process fallback
///
/// **Execution Rules:**
/// 1. Only Python runs locally; anything else is rejected without spawning
/// 2. Source is written to a uniquely named file inside the sandbox directory
/// 3. The interpreter runs with a sanitized environment, cwd = sandbox directory,
///    in its own process group
/// 4. stdout/stderr are drained while the process runs so partial output survives a kill
/// 5. On budget expiry the whole process group is SIGKILLed and reaped
/// 6. The source file is removed on every exit path
/// 7. Any failure to run at all becomes an in-band outcome, never an error
///
/// Coarse isolation only: this is not a security boundary.
use super::{ExecutionBackend, TransportError};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use autograde_common::config::EngineConfig;
use autograde_common::types::{ExecutionOutcome, ExecutionRequest, Language, TIMEOUT_EXIT_CODE};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

const BACKEND_NAME: &str = "local";

/// The one language runnable without the remote API
pub const LOCAL_LANGUAGE: Language = Language::Python;

/// Safety limits to prevent pathological inputs from reaching the interpreter
const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB
const MAX_TEST_INPUT_BYTES: usize = 10 * 1024 * 1024; // 10MB
/// Captured bytes per stream; the rest is drained and dropped
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// How long to wait for pipes to close after the process is gone
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

pub struct LocalProcessAdapter {
    interpreter: String,
    sandbox_dir: PathBuf,
}

impl LocalProcessAdapter {
    pub fn new(interpreter: impl Into<String>, sandbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            sandbox_dir: sandbox_dir.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.python_bin.clone(), config.sandbox_dir.clone())
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome> {
        if request.code.len() > MAX_SOURCE_CODE_BYTES {
            bail!("Source code exceeds maximum size of {} bytes", MAX_SOURCE_CODE_BYTES);
        }
        if request.stdin.len() > MAX_TEST_INPUT_BYTES {
            bail!("Test input exceeds maximum size of {} bytes", MAX_TEST_INPUT_BYTES);
        }

        tokio::fs::create_dir_all(&self.sandbox_dir)
            .await
            .with_context(|| format!("Failed to create sandbox directory {}", self.sandbox_dir.display()))?;
        // Absolute, so the artifact path stays valid from inside the sandbox cwd
        let sandbox_dir = tokio::fs::canonicalize(&self.sandbox_dir)
            .await
            .context("Failed to resolve sandbox directory")?;

        let artifact = SourceArtifact::create(&sandbox_dir, &request.code)?;

        let mut command = Command::new(&self.interpreter);
        command
            .arg(artifact.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(&sandbox_dir)
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_else(|_| FALLBACK_PATH.to_string()))
            .env("HOME", &sandbox_dir)
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PYTHONUNBUFFERED", "1")
            .env("PYTHONIOENCODING", "utf-8")
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let start = Instant::now();
        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to spawn interpreter '{}'", self.interpreter))?;
        let pid = child.id();

        debug!(pid = ?pid, timeout_ms = request.timeout_ms, "Spawned local process");

        let stdin_task = child.stdin.take().map(|mut pipe| {
            let input = request.stdin.clone().into_bytes();
            tokio::spawn(async move {
                // Programs that never read stdin close the pipe early
                if !input.is_empty() {
                    let _ = pipe.write_all(&input).await;
                }
                let _ = pipe.shutdown().await;
            })
        });
        let stdout_task = spawn_reader(child.stdout.take());
        let stderr_task = spawn_reader(child.stderr.take());

        let (status, timed_out) = match tokio::time::timeout(request.timeout(), child.wait()).await {
            Ok(status) => (Some(status.context("Failed to wait for child process")?), false),
            Err(_) => {
                warn!(pid = ?pid, timeout_ms = request.timeout_ms, "Local execution timed out - killing process group");
                (None, true)
            }
        };

        // Descendants may still hold the pipes open; the group goes either way
        kill_process_group(pid, timed_out);
        if timed_out {
            reap(&mut child).await;
        }

        let runtime_ms = start.elapsed().as_millis() as u64;

        if let Some(task) = stdin_task {
            task.abort();
        }
        let stdout = collect(stdout_task).await;
        let stderr = collect(stderr_task).await;

        artifact.cleanup();

        let outcome = match status {
            Some(status) => ExecutionOutcome::completed(stdout, stderr, exit_code_of(status), runtime_ms),
            None => ExecutionOutcome::timed_out(
                stdout,
                format!("Execution timed out after {}", describe_budget(request.timeout_ms)),
                TIMEOUT_EXIT_CODE,
                runtime_ms,
            ),
        };

        Ok(outcome)
    }
}

#[async_trait]
impl ExecutionBackend for LocalProcessAdapter {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn supports(&self, language: Language) -> bool {
        language == LOCAL_LANGUAGE
    }

    async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, TransportError> {
        if !self.supports(request.language) {
            return Ok(ExecutionOutcome::unsupported_language(format!(
                "Local execution only supports {}, got {}",
                LOCAL_LANGUAGE,
                request.language
            ))
            .with_backend(BACKEND_NAME));
        }

        let outcome = match self.execute(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %format!("{:#}", e), "Local execution failed before completion");
                ExecutionOutcome::infrastructure(format!("{:#}", e), 0)
            }
        };

        Ok(outcome.with_backend(BACKEND_NAME))
    }
}

/// Uniquely named source file, removed when dropped
struct SourceArtifact {
    path: TempPath,
}

impl SourceArtifact {
    fn create(dir: &Path, code: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("submission-")
            .suffix(".py")
            .rand_bytes(12)
            .tempfile_in(dir)
            .context("Failed to create source file in sandbox")?;
        file.write_all(code.as_bytes())
            .and_then(|_| file.flush())
            .context("Failed to write source file")?;

        // Close our handle before the interpreter opens the file
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn cleanup(self) {
        let path = self.path.to_path_buf();
        if let Err(e) = self.path.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove source file");
        }
    }
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut captured = Vec::new();
        let Some(mut pipe) = pipe else { return captured };
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = MAX_OUTPUT_BYTES.saturating_sub(captured.len());
                    captured.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        }
        captured
    })
}

async fn collect(task: JoinHandle<Vec<u8>>) -> String {
    let abort = task.abort_handle();
    match tokio::time::timeout(DRAIN_GRACE, task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            warn!(error = %e, "Output reader task failed");
            String::new()
        }
        Err(_) => {
            abort.abort();
            warn!("Output pipe still open after process exit - discarding");
            String::new()
        }
    }
}

/// SIGKILL the child's process group.
///
/// After a normal exit the leader is already reaped, so the group id is only
/// still ours while a descendant keeps the group alive. Check with signal 0
/// first; the window between check and kill is a reuse race we accept.
fn kill_process_group(pid: Option<u32>, leader_alive: bool) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        let pgid = pid as libc::pid_t;
        // SAFETY: plain syscalls on a group created with the child as leader.
        // ESRCH (group already gone) is expected and ignored.
        unsafe {
            if leader_alive || libc::killpg(pgid, 0) == 0 {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }
    #[cfg(not(unix))]
    let _ = (pid, leader_alive);
}

async fn reap(child: &mut Child) {
    let _ = child.start_kill();
    if tokio::time::timeout(DRAIN_GRACE, child.wait()).await.is_err() {
        warn!("Killed process did not exit within grace period");
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    TIMEOUT_EXIT_CODE
}

fn describe_budget(timeout_ms: u64) -> String {
    match timeout_ms {
        1000 => "1 second".to_string(),
        ms if ms % 1000 == 0 => format!("{} seconds", ms / 1000),
        ms => format!("{} ms", ms),
    }
}
