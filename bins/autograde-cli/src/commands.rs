// CLI commands for running and grading submissions
use anyhow::{bail, Context, Result};
use autograde_common::config::EngineConfig;
use autograde_common::types::{supported_language_names, GradingSummary, Language, TestCase};
use autograde_engine::backend::local::LOCAL_LANGUAGE;
use autograde_engine::{BackendRouter, GradingAggregator, TestRunner};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TestFile {
    List(Vec<TestCase>),
    Wrapped { test_cases: Vec<TestCase> },
}

/// Read and validate test cases, keeping file order
pub fn load_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_test_cases(&content).with_context(|| format!("Invalid test file {}", path.display()))
}

fn parse_test_cases(content: &str) -> Result<Vec<TestCase>> {
    let test_cases = match serde_json::from_str(content).context("Failed to parse test cases")? {
        TestFile::List(test_cases) => test_cases,
        TestFile::Wrapped { test_cases } => test_cases,
    };
    for test_case in &test_cases {
        if let Err(message) = test_case.validate() {
            bail!(message);
        }
    }
    Ok(test_cases)
}

fn engine_config(local_only: bool) -> EngineConfig {
    let config = EngineConfig::from_env();
    if local_only {
        config.with_remote(false)
    } else {
        config
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read source {}", path.display()))
}

pub async fn grade(source: &Path, tests: &Path, language: &str, local_only: bool, json: bool) -> Result<()> {
    let code = read_source(source)?;
    let test_cases = load_test_cases(tests)?;

    let config = engine_config(local_only);
    let router = BackendRouter::from_config(&config)?;
    let aggregator = GradingAggregator::new(TestRunner::new(router, config));

    if !json {
        println!("🚀 Grading {} ({}) against {} test case(s)\n", source.display(), language, test_cases.len());
    }

    let summary = aggregator
        .run_all(&code, language, &test_cases)
        .await
        .context("Grading aborted")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_summary(&summary));
    }
    Ok(())
}

pub async fn run(source: &Path, stdin: &str, language: &str, timeout_ms: Option<u64>, local_only: bool) -> Result<()> {
    let code = read_source(source)?;
    let config = engine_config(local_only);
    let timeout_ms = timeout_ms.unwrap_or_else(|| config.default_timeout_ms());
    if timeout_ms == 0 {
        bail!("--timeout-ms must be positive");
    }

    let router = BackendRouter::from_config(&config)?;
    let outcome = router.run_source(&code, language, stdin, timeout_ms).await;

    print!("{}", outcome.stdout);
    if !outcome.stderr.is_empty() {
        eprint!("{}", outcome.stderr);
        if !outcome.stderr.ends_with('\n') {
            eprintln!();
        }
    }
    eprintln!(
        "\n[{}] exit code {} in {} ms via {}",
        outcome.kind.as_str(),
        outcome.exit_code,
        outcome.runtime_ms,
        outcome.backend.as_deref().unwrap_or("no backend")
    );
    Ok(())
}

pub fn list_languages() {
    println!("📋 Supported Languages:\n");
    println!("{:<12} {:<10} {:<6}", "NAME", "VERSION", "LOCAL");
    println!("{}", "─".repeat(30));
    for language in Language::ALL {
        println!(
            "{:<12} {:<10} {:<6}",
            language.as_str(),
            language.remote_runtime().version,
            if language == LOCAL_LANGUAGE { "yes" } else { "no" }
        );
    }
    println!("\n✅ Total: {} language(s) {}", Language::ALL.len(), supported_language_names());
}

pub fn render_summary(summary: &GradingSummary) -> String {
    let mut out = String::new();
    for (idx, result) in summary.results.iter().enumerate() {
        let mark = if result.passed { "✅" } else { "❌" };
        out.push_str(&format!(
            "  {} Test {} '{}' ({} ms)\n",
            mark,
            idx + 1,
            result.test_name,
            result.runtime_ms
        ));
        if result.passed {
            continue;
        }
        if result.timed_out {
            out.push_str("    ⏱  Timed out\n");
        }
        out.push_str(&format!("    Expected: \"{}\"\n", result.expected_output));
        out.push_str(&format!("    Got:      \"{}\"\n", result.actual_output));
        if !result.stderr.trim().is_empty() {
            out.push_str(&format!("    Stderr:   {}\n", result.stderr.trim()));
        }
    }

    out.push_str(&format!(
        "\n📊 Passed {}/{} - score {:.2}",
        summary.passed_count, summary.total_count, summary.score
    ));
    if summary.total_points > 0.0 {
        out.push_str(&format!(" ({} / {} points)", summary.earned_points, summary.total_points));
    }
    let timed_out = summary.timed_out_count();
    if timed_out > 0 {
        out.push_str(&format!(", {} timed out", timed_out));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use autograde_common::types::{ExecutionOutcome, OutcomeKind, TestResult};

    fn result(name: &str, passed: bool, actual: &str, expected: &str) -> TestResult {
        let outcome = ExecutionOutcome::completed(actual.to_string(), String::new(), 0, 12);
        TestResult {
            test_name: name.to_string(),
            passed,
            actual_output: actual.to_string(),
            expected_output: expected.to_string(),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_code: 0,
            runtime_ms: 12,
            timed_out: false,
            visible: true,
            points: None,
            outcome: OutcomeKind::Success,
        }
    }

    #[test]
    fn test_parse_plain_list() {
        let cases = parse_test_cases(
            r#"[{"name": "a", "stdin": "1", "expected_output": "1"}, {"name": "b", "points": 5}]"#,
        )
        .unwrap();

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].name, "a");
        assert_eq!(cases[1].points, Some(5.0));
    }

    #[test]
    fn test_parse_wrapped_object() {
        let cases = parse_test_cases(r#"{"test_cases": [{"name": "only"}]}"#).unwrap();
        assert_eq!(cases[0].name, "only");
        assert!(cases[0].visible);
    }

    #[test]
    fn test_parse_rejects_invalid_case() {
        let err = parse_test_cases(r#"[{"name": "slow", "timeout_ms": 0}]"#).unwrap_err();
        assert!(err.to_string().contains("zero timeout"));
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tests.json");
        fs::write(&path, "not json").unwrap();

        let err = load_test_cases(&path).unwrap_err();
        assert!(err.to_string().contains("tests.json"));
    }

    #[test]
    fn test_render_summary() {
        let summary = GradingSummary {
            results: vec![result("first", true, "1", "1"), result("second", false, "2", "3")],
            passed_count: 1,
            total_count: 2,
            earned_points: 0.0,
            total_points: 0.0,
            score: 50.0,
        };

        let text = render_summary(&summary);

        assert!(text.contains("✅ Test 1 'first'"));
        assert!(text.contains("❌ Test 2 'second'"));
        assert!(text.contains("Expected: \"3\""));
        assert!(text.contains("Passed 1/2 - score 50.00"));
        assert!(!text.contains("points"));
        assert!(!text.contains("timed out"));
    }

    #[test]
    fn test_render_summary_counts_timeouts() {
        let mut slow = result("slow", false, "", "42");
        slow.timed_out = true;
        slow.exit_code = -1;
        slow.outcome = OutcomeKind::TimedOut;
        let summary = GradingSummary {
            results: vec![result("fast", true, "1", "1"), slow],
            passed_count: 1,
            total_count: 2,
            earned_points: 0.0,
            total_points: 0.0,
            score: 50.0,
        };

        let text = render_summary(&summary);

        assert!(text.contains("⏱  Timed out"));
        assert!(text.contains("Passed 1/2 - score 50.00, 1 timed out"));
    }
}
