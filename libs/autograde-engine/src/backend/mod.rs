/// Execution Backends - Abstraction for Running Untrusted Code
///
/// **Core Responsibility:**
/// Run a program with some stdin under a time budget and report what happened.
///
/// **Critical Architectural Boundary:**
/// - A backend knows HOW to execute (remote API, local process)
/// - A backend does NOT compare outputs or compute scores
/// - Program failures are ordinary outcomes (`Ok` with `succeeded = false`)
/// - `Err` means only "this backend could not serve the request"
///
/// **Implementations:**
/// - `RemoteExecutionAdapter` (remote.rs): multi-language execution API
/// - `LocalProcessAdapter` (local.rs): child process fallback for one language
/// - `BackendRouter` (router.rs): remote first, local on transport failure

pub mod local;
pub mod remote;
pub mod router;

pub use local::LocalProcessAdapter;
pub use remote::RemoteExecutionAdapter;
pub use router::BackendRouter;

use async_trait::async_trait;
use autograde_common::types::{ExecutionOutcome, ExecutionRequest, Language};

/// The backend was unreachable; the program never ran (or its result was lost)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{backend} backend unavailable: {message}")]
pub struct TransportError {
    pub backend: String,
    pub message: String,
}

impl TransportError {
    pub fn new(backend: &str, message: impl Into<String>) -> Self {
        Self {
            backend: backend.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `run` can execute this language at all
    fn supports(&self, language: Language) -> bool;

    async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, TransportError>;
}
