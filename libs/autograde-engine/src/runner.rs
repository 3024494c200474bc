// Runs one test case: build the request, execute through the router, evaluate.

use crate::backend::router::{unsupported, BackendRouter};
use crate::evaluator;
use autograde_common::config::EngineConfig;
use autograde_common::types::{ExecutionRequest, Language, TestCase, TestResult};
use tracing::debug;

#[derive(Clone)]
pub struct TestRunner {
    router: BackendRouter,
    config: EngineConfig,
}

impl TestRunner {
    pub fn new(router: BackendRouter, config: EngineConfig) -> Self {
        Self { router, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Test case limits win over the engine defaults
    pub fn build_request(&self, code: &str, language: Language, test_case: &TestCase) -> ExecutionRequest {
        let timeout_ms = test_case
            .timeout_ms
            .unwrap_or_else(|| self.config.default_timeout_ms());
        let memory_limit_mb = test_case.memory_limit_mb.unwrap_or(self.config.memory_limit_mb);

        ExecutionRequest::new(code, language, test_case.stdin.as_str(), timeout_ms)
            .with_memory_limit_mb(Some(memory_limit_mb))
    }

    pub async fn run(&self, code: &str, language: &str, test_case: &TestCase) -> TestResult {
        let outcome = match Language::parse(language) {
            Some(language) => {
                let request = self.build_request(code, language, test_case);
                self.router.execute(&request).await
            }
            None => unsupported(language),
        };

        let result = evaluator::evaluate_test(&outcome, test_case);
        debug!(
            test = %result.test_name,
            passed = result.passed,
            outcome = result.outcome.as_str(),
            backend = outcome.backend.as_deref().unwrap_or("none"),
            runtime_ms = result.runtime_ms,
            "Test case finished"
        );
        result
    }
}
