/// Test Evaluator - Output Comparison and Scoring
///
/// **Core Responsibility:**
/// Compare an execution outcome against a test case and fold per-test
/// results into a `GradingSummary`.
///
/// **Critical Properties:**
/// - Knows nothing about backends, processes or HTTP
/// - Pure functions: (outcomes, test cases) → results → summary
///
/// **Scoring Rules:**
/// - Points mode when the test cases carry any positive points:
///   score = earned_points / total_points * 100
/// - Count mode otherwise: score = passed_count / total_count * 100
/// - No test cases: score = 0
/// - Scores are rounded to two decimals
///
/// **Normalization Rules:**
/// - Trim leading and trailing whitespace: YES
/// - Case sensitivity: YES (exact match required)
/// - Internal whitespace: preserved
use autograde_common::types::{ExecutionOutcome, GradingSummary, TestCase, TestResult};

/// Leading/trailing whitespace removed; nothing else touched
pub fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Decide pass/fail for one outcome.
///
/// A test passes only when the backend reported success, the run did not
/// time out, and the trimmed outputs are identical. Raw stdout/stderr are
/// copied through whatever the verdict.
pub fn evaluate_test(outcome: &ExecutionOutcome, test_case: &TestCase) -> TestResult {
    let actual = normalize_output(&outcome.stdout);
    let expected = normalize_output(&test_case.expected_output);
    let passed = outcome.succeeded && !outcome.timed_out && actual == expected;

    TestResult {
        test_name: test_case.name.clone(),
        passed,
        actual_output: actual.to_string(),
        expected_output: expected.to_string(),
        stdout: outcome.stdout.clone(),
        stderr: outcome.stderr.clone(),
        exit_code: outcome.exit_code,
        runtime_ms: outcome.runtime_ms,
        timed_out: outcome.timed_out,
        visible: test_case.visible,
        points: test_case.points,
        outcome: outcome.kind,
    }
}

/// Aggregate results (in test case order) into a summary
///
/// `results[i]` must belong to `test_cases[i]`; points come from the test
/// case so a missing value counts as zero for scoring but the test still
/// counts towards `passed_count`/`total_count`.
pub fn summarize(results: Vec<TestResult>, test_cases: &[TestCase]) -> GradingSummary {
    if results.is_empty() {
        return GradingSummary::empty();
    }

    let total_count = results.len();
    let passed_count = results.iter().filter(|r| r.passed).count();
    let total_points: f64 = test_cases.iter().map(TestCase::scoring_points).sum();
    let earned_points: f64 = results
        .iter()
        .zip(test_cases)
        .filter(|(result, _)| result.passed)
        .map(|(_, test_case)| test_case.scoring_points())
        .sum();

    let score = if total_points > 0.0 {
        earned_points / total_points * 100.0
    } else {
        passed_count as f64 / total_count as f64 * 100.0
    };

    GradingSummary {
        results,
        passed_count,
        total_count,
        earned_points,
        total_points,
        score: round2(score),
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use autograde_common::types::{OutcomeKind, TIMEOUT_EXIT_CODE};

    fn make_test_case(name: &str, expected_output: &str, points: Option<f64>) -> TestCase {
        let test_case = TestCase::new(name, "input", expected_output);
        match points {
            Some(p) => test_case.with_points(p),
            None => test_case,
        }
    }

    fn make_output(stdout: &str) -> ExecutionOutcome {
        ExecutionOutcome::completed(stdout.to_string(), String::new(), 0, 5)
    }

    fn graded(cases: &[TestCase], stdouts: &[&str]) -> GradingSummary {
        let results = cases
            .iter()
            .zip(stdouts)
            .map(|(tc, out)| evaluate_test(&make_output(out), tc))
            .collect();
        summarize(results, cases)
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output("hello"), "hello");
        assert_eq!(normalize_output("  hello  "), "hello");
        assert_eq!(normalize_output("\nhello\r\n"), "hello");
        assert_eq!(normalize_output("  hello   world  \n"), "hello   world");
        assert_eq!(normalize_output("   "), "");
    }

    #[test]
    fn test_evaluate_test_exact_match() {
        let result = evaluate_test(&make_output("120\n"), &make_test_case("fact", "120", None));

        assert!(result.passed);
        assert_eq!(result.test_name, "fact");
        assert_eq!(result.actual_output, "120");
        assert_eq!(result.stdout, "120\n");
        assert_eq!(result.runtime_ms, 5);
        assert_eq!(result.outcome, OutcomeKind::Success);
    }

    #[test]
    fn test_case_sensitivity() {
        let result = evaluate_test(&make_output("hello"), &make_test_case("t", "Hello", None));
        assert!(!result.passed);
    }

    #[test]
    fn test_internal_whitespace_matters() {
        let result = evaluate_test(&make_output("a  b"), &make_test_case("t", "a b", None));
        assert!(!result.passed);
    }

    #[test]
    fn test_program_failure_never_passes() {
        // Right output, wrong exit code
        let outcome = ExecutionOutcome::completed("42".into(), "warning".into(), 3, 5);
        let result = evaluate_test(&outcome, &make_test_case("t", "42", None));

        assert!(!result.passed);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stderr, "warning");
        assert_eq!(result.outcome, OutcomeKind::ProgramFailure);
    }

    #[test]
    fn test_timeout_never_passes() {
        let outcome = ExecutionOutcome::timed_out("42".into(), String::new(), TIMEOUT_EXIT_CODE, 1000);
        let result = evaluate_test(&outcome, &make_test_case("t", "42", None));

        assert!(!result.passed);
        assert!(result.timed_out);
        assert_eq!(result.stdout, "42");
    }

    #[test]
    fn test_points_mode() {
        let cases = vec![
            make_test_case("a", "yes", Some(50.0)),
            make_test_case("b", "yes", Some(50.0)),
        ];
        let summary = graded(&cases, &["yes", "no"]);

        assert_eq!(summary.score, 50.0);
        assert_eq!(summary.earned_points, 50.0);
        assert_eq!(summary.total_points, 100.0);
        assert_eq!(summary.passed_count, 1);
        assert_eq!(summary.total_count, 2);
    }

    #[test]
    fn test_count_mode_without_points() {
        let cases = vec![
            make_test_case("a", "1", None),
            make_test_case("b", "2", None),
            make_test_case("c", "3", None),
        ];
        let summary = graded(&cases, &["1", "x", "3"]);

        assert_eq!(summary.score, 66.67);
        assert_eq!(summary.passed_count, 2);
        assert_eq!(summary.total_points, 0.0);
    }

    #[test]
    fn test_zero_points_everywhere_uses_counts() {
        let cases = vec![
            make_test_case("a", "1", Some(0.0)),
            make_test_case("b", "2", Some(0.0)),
        ];
        let summary = graded(&cases, &["1", "2"]);

        assert_eq!(summary.score, 100.0);
    }

    #[test]
    fn test_missing_points_still_counted() {
        let cases = vec![
            make_test_case("weighted", "1", Some(10.0)),
            make_test_case("unweighted", "2", None),
        ];
        let summary = graded(&cases, &["wrong", "2"]);

        assert_eq!(summary.passed_count, 1);
        assert_eq!(summary.total_count, 2);
        assert_eq!(summary.earned_points, 0.0);
        assert_eq!(summary.score, 0.0);
    }

    #[test]
    fn test_no_test_cases() {
        let summary = summarize(Vec::new(), &[]);

        assert_eq!(summary.score, 0.0);
        assert_eq!(summary.total_count, 0);
        assert!(summary.results.is_empty());
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(round2(33.333_333), 33.33);
        assert_eq!(round2(100.0), 100.0);
    }
}
