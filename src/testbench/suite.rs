use itertools::izip;
use log::{debug, error, info};
use rand::Rng;

use super::{
    host::SimHost,
    system::{UnitAddresses, UnitHarness},
};
use crate::bench_result::{BenchmarkResult, CaseReport, TestOutcome, TimeoutDetail};
use crate::codec::ElementBits;
use crate::error::HarnessError;
use crate::matrix::Matrix;
use crate::perf::{MATRIX_DIM, OPS_PER_MATRIX};
use crate::settings::HarnessSettings;

/// # Description
/// the verification suite: one basic single unit case, one combined
/// start over several units, and a sequential throughput measurement.
/// every failure lands in a case report, the suite always runs through.
pub struct TestSuite {
    timeout_cycles: u64,
    parallel_timeout_cycles: u64,
    parallel_units: usize,
    performance_operations: usize,
    clock_period_ns: u64,
}

impl TestSuite {
    pub fn from_settings(settings: &HarnessSettings, clock_period_ns: u64) -> Self {
        TestSuite {
            timeout_cycles: settings.timeout_cycles,
            parallel_timeout_cycles: settings.parallel_timeout_cycles,
            parallel_units: settings.parallel_units,
            performance_operations: settings.performance_operations,
            clock_period_ns,
        }
    }

    /// basic functionality: A * I decoded back must equal A widened
    pub fn basic_case<H: SimHost, R: Rng>(
        &self,
        harness: &mut UnitHarness<H>,
        rng: &mut R,
    ) -> Result<CaseReport, HarnessError> {
        let a = Matrix::random_int8(MATRIX_DIM, MATRIX_DIM, rng)?;
        let eye = Matrix::identity(MATRIX_DIM)?;
        info!("basic multiply: A * I = A");

        harness.load_matrix(&a, 0x1000, ElementBits::Eight)?;
        harness.load_matrix(&eye, 0x1100, ElementBits::Eight)?;
        harness.program_unit(
            0,
            UnitAddresses {
                a: 0x1000,
                b: 0x1100,
                c: 0x1200,
            },
        );

        let name = String::from("basic_functionality");
        match harness.run_single_unit(0, self.timeout_cycles) {
            Ok(cycles) => {
                info!("operation completed in {} cycles", cycles);
                Ok(CaseReport {
                    name,
                    cycles: Some(cycles),
                    outcome: harness.check_exact(0, &a)?,
                })
            }
            Err(HarnessError::OperationTimeout { unit, cycles }) => {
                error!("operation timed out");
                Ok(CaseReport {
                    name,
                    cycles: None,
                    outcome: TestOutcome::TimedOut(TimeoutDetail { unit, cycles }),
                })
            }
            Err(other) => Err(other),
        }
    }

    /// every unit gets its own operand pair, one shared start word.
    /// stragglers never discard the finished units' results.
    pub fn parallel_case<H: SimHost, R: Rng>(
        &self,
        harness: &mut UnitHarness<H>,
        rng: &mut R,
    ) -> Result<Vec<CaseReport>, HarnessError> {
        let units: Vec<usize> = (0..self.parallel_units).collect();
        info!("parallel run over {} units", units.len());

        let mut expected = Vec::with_capacity(units.len());
        for &unit in &units {
            let a = Matrix::random_int8(MATRIX_DIM, MATRIX_DIM, rng)?;
            let b = Matrix::random_int8(MATRIX_DIM, MATRIX_DIM, rng)?;
            expected.push(a.multiply(&b)?);

            let base = 0x2000 + unit as u32 * 0x300;
            harness.load_matrix(&a, base, ElementBits::Eight)?;
            harness.load_matrix(&b, base + 0x100, ElementBits::Eight)?;
            harness.program_unit(
                unit,
                UnitAddresses {
                    a: base,
                    b: base + 0x100,
                    c: base + 0x200,
                },
            );
        }

        let run = harness.run_parallel(&units, self.parallel_timeout_cycles)?;
        info!("parallel run finished after {} cycles", run.elapsed_cycles);

        let mut reports = Vec::with_capacity(units.len());
        for (outcome, want) in izip!(&run.outcomes, &expected) {
            let name = format!("parallel_unit_{}", outcome.unit);
            let report = match outcome.completed_cycle {
                Some(cycles) => CaseReport {
                    name,
                    cycles: Some(cycles),
                    outcome: harness.check_close(outcome.unit, want)?,
                },
                None => {
                    error!("unit {} timed out", outcome.unit);
                    CaseReport {
                        name,
                        cycles: None,
                        outcome: TestOutcome::TimedOut(TimeoutDetail {
                            unit: outcome.unit,
                            cycles: run.elapsed_cycles,
                        }),
                    }
                }
            };
            reports.push(report);
        }
        Ok(reports)
    }

    /// sequential operations on unit 0; throughput falls out of the cycle
    /// count and the configured clock period
    pub fn performance_case<H: SimHost, R: Rng>(
        &self,
        harness: &mut UnitHarness<H>,
        rng: &mut R,
    ) -> Result<(CaseReport, BenchmarkResult), HarnessError> {
        info!(
            "performance run: {} matrix operations",
            self.performance_operations
        );
        let a = Matrix::random_int8(MATRIX_DIM, MATRIX_DIM, rng)?;
        let b = Matrix::random_int8(MATRIX_DIM, MATRIX_DIM, rng)?;
        harness.load_matrix(&a, 0x4000, ElementBits::Eight)?;
        harness.load_matrix(&b, 0x4100, ElementBits::Eight)?;
        harness.program_unit(
            0,
            UnitAddresses {
                a: 0x4000,
                b: 0x4100,
                c: 0x4200,
            },
        );

        let mut total_cycles = 0u64;
        let mut completed = 0u64;
        let mut outcome = TestOutcome::Passed;
        for op in 0..self.performance_operations {
            match harness.run_single_unit(0, self.timeout_cycles) {
                Ok(cycles) => {
                    // one extra edge for the start pulse itself
                    total_cycles += cycles + 1;
                    completed += 1;
                }
                Err(HarnessError::OperationTimeout { unit, cycles }) => {
                    error!("operation {} timed out", op);
                    outcome = TestOutcome::TimedOut(TimeoutDetail { unit, cycles });
                    break;
                }
                Err(other) => return Err(other),
            }
            if op % 10 == 0 {
                debug!("completed operation {}", op);
            }
        }

        let seconds = total_cycles as f64 * self.clock_period_ns as f64 * 1e-9;
        let mac_ops = completed * OPS_PER_MATRIX;
        let mac_per_second = mac_ops as f64 / seconds;
        info!("total time: {:.6} s", seconds);
        info!("operations/sec: {:.0}", completed as f64 / seconds);
        info!("MAC ops/sec: {:.0}", mac_per_second);
        info!("TOPS (single unit): {:.6}", mac_per_second / 1e12);

        let bench = BenchmarkResult {
            name: String::from("measured_single_unit"),
            operation_count: mac_ops,
            time_seconds: seconds,
            ops_per_second: mac_per_second,
        };
        let report = CaseReport {
            name: String::from("performance"),
            cycles: Some(total_cycles),
            outcome,
        };
        Ok((report, bench))
    }
}
