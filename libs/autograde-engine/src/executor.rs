/// Grading Aggregator - High-Level Orchestration
///
/// **Responsibility:**
/// Run every test case of a submission in order and fold the results into
/// one `GradingSummary`.
///
/// **Architecture:**
/// 1. Prepare the shared sandbox directory (the only fault that propagates)
/// 2. Run each test case through `TestRunner` (runner.rs), sequentially
/// 3. Score with the evaluator (evaluator.rs)
///
/// This module is the glue layer - it knows nothing about:
/// - How code executes (the backends' job)
/// - How outputs are compared (the evaluator's job)
/// - Where job records or submissions are stored (the caller's job)
use crate::backend::BackendRouter;
use crate::evaluator;
use crate::runner::TestRunner;
use anyhow::{Context, Result};
use autograde_common::config::EngineConfig;
use autograde_common::types::{GradingSummary, OutcomeKind, TestCase};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Clone)]
pub struct GradingAggregator {
    runner: TestRunner,
}

impl GradingAggregator {
    pub fn new(runner: TestRunner) -> Self {
        Self { runner }
    }

    /// Router and runner wired from configuration
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let router = BackendRouter::from_config(&config).context("Failed to build execution backends")?;
        Ok(Self::new(TestRunner::new(router, config)))
    }

    pub fn config(&self) -> &EngineConfig {
        self.runner.config()
    }

    /// Grade `code` against `test_cases`, preserving their order in the results.
    ///
    /// Per-test failures of any kind end up as data in the summary; only a
    /// sandbox directory that cannot be prepared returns `Err`.
    pub async fn run_all(&self, code: &str, language: &str, test_cases: &[TestCase]) -> Result<GradingSummary> {
        if test_cases.is_empty() {
            info!(language = language, "No test cases, nothing to grade");
            return Ok(GradingSummary::empty());
        }

        let sandbox_dir = &self.config().sandbox_dir;
        tokio::fs::create_dir_all(sandbox_dir)
            .await
            .with_context(|| format!("Failed to prepare sandbox directory {}", sandbox_dir.display()))?;

        info!(
            language = language,
            test_count = test_cases.len(),
            "Starting grading run"
        );
        let started = Instant::now();

        let mut results = Vec::with_capacity(test_cases.len());
        for test_case in test_cases {
            let result = self.runner.run(code, language, test_case).await;

            // Cross-layer guard: surface failures that are not wrong answers
            match result.outcome {
                OutcomeKind::TimedOut => warn!(
                    test = %result.test_name,
                    runtime_ms = result.runtime_ms,
                    "Execution timed out; test cannot pass"
                ),
                OutcomeKind::InfrastructureFailure => warn!(
                    test = %result.test_name,
                    stderr = %result.stderr,
                    "Execution infrastructure failed; test cannot pass"
                ),
                OutcomeKind::UnsupportedLanguage => warn!(
                    test = %result.test_name,
                    language = language,
                    "Unsupported language; test cannot pass"
                ),
                OutcomeKind::Success | OutcomeKind::ProgramFailure => {}
            }

            results.push(result);
        }

        let summary = evaluator::summarize(results, test_cases);
        info!(
            passed = summary.passed_count,
            total = summary.total_count,
            timed_out = summary.timed_out_count(),
            score = summary.score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Grading run complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use std::sync::Arc;

    fn aggregator_with(backend: Arc<ScriptedBackend>, config: EngineConfig) -> GradingAggregator {
        GradingAggregator::new(TestRunner::new(BackendRouter::new(backend), config))
    }

    fn sandbox_config(dir: &tempfile::TempDir) -> EngineConfig {
        EngineConfig::default().with_sandbox_dir(dir.path().join("sandbox"))
    }

    #[tokio::test]
    async fn test_order_preserved_and_failures_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = aggregator_with(ScriptedBackend::echo("local"), sandbox_config(&dir));
        let cases = vec![
            TestCase::new("first", "crash", "x"),
            TestCase::new("second", "hang", "partial"),
            TestCase::new("third", "ok", "ok"),
            TestCase::new("fourth", "lost", "lost"),
        ];

        let summary = aggregator.run_all("code", "python", &cases).await.unwrap();

        assert_eq!(summary.results.len(), cases.len());
        for (result, case) in summary.results.iter().zip(&cases) {
            assert_eq!(result.test_name, case.name);
        }
        assert_eq!(summary.results[1].outcome, OutcomeKind::TimedOut);
        assert!(!summary.results[1].passed);
        assert!(summary.results[2].passed);
        // Fallback had nothing else to try
        assert_eq!(summary.results[3].outcome, OutcomeKind::InfrastructureFailure);
        assert_eq!(summary.passed_count, 1);
        assert_eq!(summary.score, 25.0);
        assert!(dir.path().join("sandbox").is_dir());
    }

    #[tokio::test]
    async fn test_empty_test_cases() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::echo("local");
        let aggregator = aggregator_with(backend.clone(), sandbox_config(&dir));

        let summary = aggregator.run_all("code", "python", &[]).await.unwrap();

        assert_eq!(summary.score, 0.0);
        assert_eq!(summary.total_count, 0);
        assert!(summary.results.is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_grading_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = aggregator_with(ScriptedBackend::echo("local"), sandbox_config(&dir));
        let cases = vec![
            TestCase::new("a", "1", "1").with_points(30.0),
            TestCase::new("b", "2", "3").with_points(70.0),
        ];

        let first = aggregator.run_all("code", "python", &cases).await.unwrap();
        let second = aggregator.run_all("code", "python", &cases).await.unwrap();

        assert_eq!(first.score, 30.0);
        assert_eq!(first.score, second.score);
        let verdicts = |s: &GradingSummary| s.results.iter().map(|r| r.passed).collect::<Vec<_>>();
        assert_eq!(verdicts(&first), verdicts(&second));
    }

    #[tokio::test]
    async fn test_unsupported_language_graded_as_failures() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::echo("local");
        let aggregator = aggregator_with(backend.clone(), sandbox_config(&dir));

        let summary = aggregator
            .run_all("code", "cobol", &[TestCase::new("t", "", "")])
            .await
            .unwrap();

        assert_eq!(summary.passed_count, 0);
        assert_eq!(summary.score, 0.0);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_unusable_sandbox_dir_propagates() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = EngineConfig::default().with_sandbox_dir(file.path().join("sandbox"));
        let aggregator = aggregator_with(ScriptedBackend::echo("local"), config);

        let err = aggregator
            .run_all("code", "python", &[TestCase::new("t", "", "")])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to prepare sandbox directory"));
    }
}
