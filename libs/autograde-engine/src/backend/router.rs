/// Backend selection and fallback policy
///
/// - Primary (remote) first when configured and it supports the language
/// - Any `Ok` outcome from the primary is final, including program failures
/// - A transport failure gets exactly one retry on the fallback, with the
///   full original time budget
/// - Nothing here returns an error: every path ends in an `ExecutionOutcome`
use super::{ExecutionBackend, LocalProcessAdapter, RemoteExecutionAdapter};
use anyhow::Result;
use autograde_common::config::EngineConfig;
use autograde_common::types::{supported_language_names, ExecutionOutcome, ExecutionRequest, Language};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct BackendRouter {
    primary: Option<Arc<dyn ExecutionBackend>>,
    fallback: Arc<dyn ExecutionBackend>,
}

impl BackendRouter {
    pub fn new(fallback: Arc<dyn ExecutionBackend>) -> Self {
        Self { primary: None, fallback }
    }

    /// Backend tried first; the fallback only runs after its transport failures
    pub fn with_primary(mut self, primary: Arc<dyn ExecutionBackend>) -> Self {
        self.primary = Some(primary);
        self
    }

    /// Remote API (when enabled) backed by the local process adapter
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let router = Self::local_only(config);
        if !config.remote_enabled {
            return Ok(router);
        }
        Ok(router.with_primary(Arc::new(RemoteExecutionAdapter::from_config(config)?)))
    }

    /// Local process only
    pub fn local_only(config: &EngineConfig) -> Self {
        Self::new(Arc::new(LocalProcessAdapter::from_config(config)))
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let primary = self
            .primary
            .as_ref()
            .filter(|backend| backend.supports(request.language));

        if let Some(primary) = primary {
            match primary.run(request).await {
                // Final whatever the program did
                Ok(outcome) => return outcome,
                Err(e) if !self.fallback.supports(request.language) => {
                    warn!(
                        backend = primary.name(),
                        language = %request.language,
                        error = %e,
                        "Transport failure, no fallback for language"
                    );
                    // Still an outage, not a language rejection
                    return ExecutionOutcome::infrastructure(
                        format!(
                            "{}; {} fallback does not support {}",
                            e,
                            self.fallback.name(),
                            request.language
                        ),
                        0,
                    )
                    .with_backend(primary.name());
                }
                Err(e) => warn!(
                    backend = primary.name(),
                    fallback = self.fallback.name(),
                    error = %e,
                    "Transport failure, falling back"
                ),
            }
        } else {
            debug!(
                backend = self.fallback.name(),
                language = %request.language,
                "No primary backend for language, using fallback directly"
            );
        }

        match self.fallback.run(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(backend = self.fallback.name(), error = %e, "Fallback backend unavailable");
                ExecutionOutcome::infrastructure(
                    format!("No execution backend available: {}", e),
                    0,
                )
                .with_backend(self.fallback.name())
            }
        }
    }

    /// Execute with a language identifier that has not been validated yet
    pub async fn run_source(&self, code: &str, language: &str, stdin: &str, timeout_ms: u64) -> ExecutionOutcome {
        match Language::parse(language) {
            Some(language) => {
                self.execute(&ExecutionRequest::new(code, language, stdin, timeout_ms))
                    .await
            }
            None => unsupported(language),
        }
    }
}

/// Outcome for an identifier outside the supported-language table
pub fn unsupported(language: &str) -> ExecutionOutcome {
    ExecutionOutcome::unsupported_language(format!(
        "Language {} not supported. Supported: {}",
        language,
        supported_language_names()
    ))
}
