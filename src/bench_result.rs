use enum_as_inner::EnumAsInner;
use serde::Serialize;

use crate::matrix::Matrix;
use crate::perf::{MatrixBenchmark, ReferenceComparison, ScalingAnalysis};
use crate::settings::Settings;

/// a decoded result that differs from the reference beyond tolerance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MismatchDetail {
    pub unit: usize,
    pub expected: Matrix,
    pub actual: Matrix,
}

/// a unit whose busy flag never cleared within the poll budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeoutDetail {
    pub unit: usize,
    pub cycles: u64,
}

/// outcome of one verification case. timeouts and mismatches are data,
/// never aborts: the suite runs every case and tallies at the end.
#[derive(Debug, Clone, PartialEq, Serialize, EnumAsInner)]
#[serde(tag = "kind")]
pub enum TestOutcome {
    Passed,
    ResultMismatch(MismatchDetail),
    TimedOut(TimeoutDetail),
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    /// poll cycles of the case, None when it never completed
    pub cycles: Option<u64>,
    pub outcome: TestOutcome,
}

/// one measured or modeled throughput figure
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub operation_count: u64,
    pub time_seconds: f64,
    pub ops_per_second: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationSummary {
    pub passed: usize,
    pub failed: usize,
    pub cases: Vec<CaseReport>,
}

impl VerificationSummary {
    pub fn new(cases: Vec<CaseReport>) -> Self {
        let passed = cases.iter().filter(|case| case.outcome.passed()).count();
        VerificationSummary {
            passed,
            failed: cases.len() - passed,
            cases,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// bundles every measured and analytic output of one run for rendering
/// elsewhere; assembles and forwards, no logic of its own
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub verification: VerificationSummary,
    pub benchmarks: Vec<BenchmarkResult>,
    pub matrix_benchmarks: Vec<MatrixBenchmark>,
    pub scaling: ScalingAnalysis,
    pub reference: ReferenceComparison,
}

#[derive(Debug, Serialize)]
pub struct HarnessRunResult {
    pub settings: Option<Settings>,
    pub report: Option<ComparisonReport>,
    pub simulation_time: String,
}

impl HarnessRunResult {
    pub fn new() -> Self {
        HarnessRunResult {
            settings: None,
            report: None,
            simulation_time: String::new(),
        }
    }
}

impl Default for HarnessRunResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_counts_failures() {
        let cases = vec![
            CaseReport {
                name: "a".into(),
                cycles: Some(10),
                outcome: TestOutcome::Passed,
            },
            CaseReport {
                name: "b".into(),
                cycles: None,
                outcome: TestOutcome::TimedOut(TimeoutDetail { unit: 1, cycles: 99 }),
            },
        ];
        let summary = VerificationSummary::new(cases);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json =
            serde_json::to_value(TestOutcome::TimedOut(TimeoutDetail { unit: 2, cycles: 7 }))
                .unwrap();
        assert_eq!(json["kind"], "TimedOut");
        assert_eq!(json["unit"], 2);
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = TestOutcome::TimedOut(TimeoutDetail { unit: 3, cycles: 5 });
        assert!(!outcome.passed());
        let detail = outcome.as_timed_out().unwrap();
        assert_eq!((detail.unit, detail.cycles), (3, 5));
    }
}
