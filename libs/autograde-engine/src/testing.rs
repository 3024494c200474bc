// In-process backends for router, runner and aggregator tests

use crate::backend::{ExecutionBackend, TransportError};
use async_trait::async_trait;
use autograde_common::types::{ExecutionOutcome, ExecutionRequest, Language, TIMEOUT_EXIT_CODE};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

type Respond = dyn Fn(&ExecutionRequest) -> Result<ExecutionOutcome, TransportError> + Send + Sync;

pub struct ScriptedBackend {
    name: &'static str,
    languages: Vec<Language>,
    respond: Box<Respond>,
    calls: AtomicUsize,
    last_timeout_ms: AtomicU64,
}

impl ScriptedBackend {
    pub fn new<F>(name: &'static str, respond: F) -> Self
    where
        F: Fn(&ExecutionRequest) -> Result<ExecutionOutcome, TransportError> + Send + Sync + 'static,
    {
        Self {
            name,
            languages: Language::ALL.to_vec(),
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            last_timeout_ms: AtomicU64::new(0),
        }
    }

    pub fn with_languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = languages;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn succeeding(name: &'static str, stdout: &str) -> Arc<Self> {
        let stdout = stdout.to_string();
        Self::new(name, move |_| {
            Ok(ExecutionOutcome::completed(stdout.clone(), String::new(), 0, 1))
        })
        .shared()
    }

    pub fn failing_program(name: &'static str, stderr: &str) -> Arc<Self> {
        let stderr = stderr.to_string();
        Self::new(name, move |_| {
            Ok(ExecutionOutcome::completed(String::new(), stderr.clone(), 1, 1))
        })
        .shared()
    }

    pub fn infrastructure(name: &'static str, stderr: &str) -> Arc<Self> {
        let stderr = stderr.to_string();
        Self::new(name, move |_| Ok(ExecutionOutcome::infrastructure(stderr.clone(), 1))).shared()
    }

    pub fn unreachable(name: &'static str) -> Arc<Self> {
        Self::new(name, move |_| Err(TransportError::new(name, "connection refused"))).shared()
    }

    /// Behaves like a program that prints its stdin, with a few magic inputs:
    /// `hang` times out, `crash` exits non-zero, `lost` is a transport failure.
    pub fn echo(name: &'static str) -> Arc<Self> {
        Self::new(name, move |request| match request.stdin.as_str() {
            "hang" => Ok(ExecutionOutcome::timed_out(
                "partial".to_string(),
                "Execution timed out".to_string(),
                TIMEOUT_EXIT_CODE,
                request.timeout_ms,
            )),
            "crash" => Ok(ExecutionOutcome::completed(
                String::new(),
                "Traceback (most recent call last)".to_string(),
                1,
                2,
            )),
            "lost" => Err(TransportError::new(name, "connection reset")),
            stdin => Ok(ExecutionOutcome::completed(stdin.to_string(), String::new(), 0, 2)),
        })
        .shared()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_timeout_ms(&self) -> Option<u64> {
        match self.last_timeout_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(ms),
        }
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, language: Language) -> bool {
        self.languages.contains(&language)
    }

    async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_timeout_ms.store(request.timeout_ms, Ordering::SeqCst);
        (self.respond)(request).map(|outcome| outcome.with_backend(self.name))
    }
}
