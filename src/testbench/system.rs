use itertools::Itertools;
use log::{debug, info, warn};

use super::{
    host::SimHost,
    signals::{bit, mask_of},
};
use crate::bench_result::{MismatchDetail, TestOutcome};
use crate::codec::{self, ElementBits};
use crate::error::HarnessError;
use crate::matrix::Matrix;

/// the three address registers programmed into a unit for one case
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitAddresses {
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

/// one accelerator unit as the harness sees it: an index into the flat
/// start/busy vectors plus the addresses of its current case
#[derive(Debug, Clone, Copy)]
pub struct AcceleratorUnit {
    pub index: usize,
    pub addrs: UnitAddresses,
}

/// comparison slack for parallel/stress checks. single operation checks
/// stay exact; the slack is configurable and deliberately loose to ride
/// out interleaving effects, the matrix math itself is exact integers.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    pub relative: f64,
    pub absolute: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance {
            relative: 0.1,
            absolute: 10.0,
        }
    }
}

/// result of one combined start over several units. polling never stops
/// early on partial completion, so every requested unit gets either its
/// completion cycle or a timeout flag.
#[derive(Debug, Clone)]
pub struct ParallelRun {
    pub elapsed_cycles: u64,
    pub outcomes: Vec<UnitOutcome>,
}

#[derive(Debug, Clone, Copy)]
pub struct UnitOutcome {
    pub unit: usize,
    /// poll cycle at which the busy bit was observed clear, None on timeout
    pub completed_cycle: Option<u64>,
}

impl ParallelRun {
    pub fn all_completed(&self) -> bool {
        self.outcomes.iter().all(|o| o.completed_cycle.is_some())
    }

    pub fn timed_out(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|o| o.completed_cycle.is_none())
            .map(|o| o.unit)
            .collect()
    }
}

/// # Description
/// drives the start/busy handshake of the accelerator units through the
/// host capability: issues start pulses, polls busy bits, detects
/// completion and timeout, and decodes results back through the codec.
pub struct UnitHarness<H: SimHost> {
    host: H,
    units: Vec<AcceleratorUnit>,
    tolerance: Tolerance,
}

impl<H: SimHost> UnitHarness<H> {
    pub fn new(host: H, tolerance: Tolerance) -> Self {
        let units = (0..host.num_units())
            .map(|index| AcceleratorUnit {
                index,
                addrs: UnitAddresses::default(),
            })
            .collect();
        UnitHarness {
            host,
            units,
            tolerance,
        }
    }

    /// reset sequence of the bench: hold reset for two clock periods,
    /// release, one edge to settle
    pub fn setup(&mut self) -> Result<(), HarnessError> {
        self.host.drive().reset_n = false;
        let hold = 2 * self.host.clock_period_ns();
        self.host.wait_ns(hold)?;
        self.host.drive().reset_n = true;
        self.host.clock_edge()?;
        info!("harness ready, {} units", self.units.len());
        Ok(())
    }

    /// preload a matrix image before starting a unit
    pub fn load_matrix(
        &mut self,
        matrix: &Matrix,
        addr: u32,
        bits: ElementBits,
    ) -> Result<(), HarnessError> {
        codec::pack(matrix, self.host.memory_mut(), addr, bits)
    }

    /// program the address registers of one unit for the next case
    pub fn program_unit(&mut self, unit: usize, addrs: UnitAddresses) {
        self.units[unit].addrs = addrs;
        let drive = self.host.drive();
        drive.unit_addr_a[unit] = addrs.a;
        drive.unit_addr_b[unit] = addrs.b;
        drive.unit_addr_c[unit] = addrs.c;
    }

    pub fn unit(&self, unit: usize) -> &AcceleratorUnit {
        &self.units[unit]
    }

    /// # Description
    /// pulse the unit's start bit for exactly one edge, then poll its busy
    /// bit every edge until it clears. returns the number of poll cycles.
    /// the timeout fires exactly at `timeout_cycles` elapsed.
    pub fn run_single_unit(
        &mut self,
        unit: usize,
        timeout_cycles: u64,
    ) -> Result<u64, HarnessError> {
        self.host.drive().unit_start = bit(unit);
        self.host.clock_edge()?;
        self.host.drive().unit_start = 0;

        let mut cycles = 0u64;
        while self.host.signals().unit_busy & bit(unit) != 0 {
            if cycles >= timeout_cycles {
                warn!("unit {} timed out after {} cycles", unit, cycles);
                return Err(HarnessError::OperationTimeout { unit, cycles });
            }
            self.host.clock_edge()?;
            cycles += 1;
        }
        debug!("unit {}: finished in {} cycles", unit, cycles);
        Ok(cycles)
    }

    /// # Description
    /// start all requested units in one start word and poll the combined
    /// busy mask until every requested bit clears or the timeout elapses.
    /// units finishing early are recorded but polling continues: the
    /// start/busy vectors are shared by every unit, and a straggler must
    /// not discard the finished units' results.
    pub fn run_parallel(
        &mut self,
        units: &[usize],
        timeout_cycles: u64,
    ) -> Result<ParallelRun, HarnessError> {
        let mask = mask_of(units);
        self.host.drive().unit_start = mask;
        self.host.clock_edge()?;
        self.host.drive().unit_start = 0;

        let mut outcomes: Vec<UnitOutcome> = units
            .iter()
            .map(|&unit| UnitOutcome {
                unit,
                completed_cycle: None,
            })
            .collect();
        let mut elapsed = 0u64;
        loop {
            let busy = self.host.signals().unit_busy & mask;
            for outcome in outcomes.iter_mut() {
                if outcome.completed_cycle.is_none() && busy & bit(outcome.unit) == 0 {
                    outcome.completed_cycle = Some(elapsed);
                }
            }
            if busy == 0 {
                break;
            }
            if elapsed >= timeout_cycles {
                warn!(
                    "parallel run timed out, still busy: {}",
                    outcomes
                        .iter()
                        .filter(|o| o.completed_cycle.is_none())
                        .map(|o| o.unit)
                        .join(", ")
                );
                break;
            }
            self.host.clock_edge()?;
            elapsed += 1;
            if elapsed % 100 == 0 {
                debug!(
                    "cycle {}: busy mask 0x{:02x}",
                    elapsed,
                    self.host.signals().unit_busy & mask
                );
            }
        }
        Ok(ParallelRun {
            elapsed_cycles: elapsed,
            outcomes,
        })
    }

    /// decode the result region of a unit through the codec
    pub fn read_result(
        &self,
        unit: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Matrix, HarnessError> {
        codec::unpack(
            self.host.memory(),
            self.units[unit].addrs.c,
            rows,
            cols,
            ElementBits::Sixteen,
        )
    }

    /// exact comparison against the host side reference, for single
    /// operation correctness checks
    pub fn check_exact(&self, unit: usize, expected: &Matrix) -> Result<TestOutcome, HarnessError> {
        let actual = self.read_result(unit, expected.rows(), expected.cols())?;
        if actual == *expected {
            Ok(TestOutcome::Passed)
        } else {
            warn!(
                "unit {}: result mismatch\nexpected:\n{}actual:\n{}",
                unit, expected, actual
            );
            Ok(TestOutcome::ResultMismatch(MismatchDetail {
                unit,
                expected: expected.clone(),
                actual,
            }))
        }
    }

    /// tolerance comparison for parallel/stress checks
    pub fn check_close(&self, unit: usize, expected: &Matrix) -> Result<TestOutcome, HarnessError> {
        let actual = self.read_result(unit, expected.rows(), expected.cols())?;
        if actual.allclose(expected, self.tolerance.relative, self.tolerance.absolute) {
            Ok(TestOutcome::Passed)
        } else {
            warn!(
                "unit {}: result outside tolerance\nexpected:\n{}actual:\n{}",
                unit, expected, actual
            );
            Ok(TestOutcome::ResultMismatch(MismatchDetail {
                unit,
                expected: expected.clone(),
                actual,
            }))
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testbench::gpu_model::GpuModel;
    use crate::testbench::host::CycleHost;
    use crate::testbench::mem_model::MemoryConfig;
    use rand::{rngs::StdRng, SeedableRng};

    fn harness(num_units: usize, gpu: GpuModel) -> UnitHarness<CycleHost> {
        let host = CycleHost::new(num_units, MemoryConfig::default(), gpu);
        let mut harness = UnitHarness::new(host, Tolerance::default());
        harness.setup().unwrap();
        harness
    }

    #[test]
    fn test_identity_multiply_decodes_to_widened_input() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut harness = harness(1, GpuModel::new(1));
        let a = Matrix::random_int8(4, 4, &mut rng).unwrap();
        let eye = Matrix::identity(4).unwrap();

        harness.load_matrix(&a, 0x1000, ElementBits::Eight).unwrap();
        harness.load_matrix(&eye, 0x1100, ElementBits::Eight).unwrap();
        harness.program_unit(
            0,
            UnitAddresses {
                a: 0x1000,
                b: 0x1100,
                c: 0x1200,
            },
        );
        let cycles = harness.run_single_unit(0, 1000).unwrap();
        assert!(cycles > 0);
        // A * I decoded from 0x1200 equals A widened to 16 bits
        let outcome = harness.check_exact(0, &a).unwrap();
        assert_eq!(outcome, TestOutcome::Passed);
    }

    #[test]
    fn test_timeout_fires_exactly_at_budget() {
        let mut harness = harness(1, GpuModel::new(1).with_stuck_units(bit(0)));
        harness.program_unit(0, UnitAddresses { a: 0, b: 0, c: 0x100 });
        let err = harness.run_single_unit(0, 50).unwrap_err();
        assert_eq!(
            err,
            HarnessError::OperationTimeout {
                unit: 0,
                cycles: 50
            }
        );
        // busy never cleared, the poll spent exactly the budget
    }

    #[test]
    fn test_unit_that_never_goes_busy_returns_zero_cycles() {
        // start bits above the model's unit count are ignored by the gpu,
        // the busy bit stays clear and the poll ends immediately
        let mut harness = harness(2, GpuModel::new(1));
        let cycles = harness.run_single_unit(1, 10).unwrap();
        assert_eq!(cycles, 0);
    }

    #[test]
    fn test_parallel_run_all_units_complete() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut harness = harness(4, GpuModel::new(4));
        let mut expected = Vec::new();
        for i in 0..4usize {
            let a = Matrix::random_int8(4, 4, &mut rng).unwrap();
            let b = Matrix::random_int8(4, 4, &mut rng).unwrap();
            expected.push(a.multiply(&b).unwrap());
            let base = 0x2000 + i as u32 * 0x300;
            harness.load_matrix(&a, base, ElementBits::Eight).unwrap();
            harness
                .load_matrix(&b, base + 0x100, ElementBits::Eight)
                .unwrap();
            harness.program_unit(
                i,
                UnitAddresses {
                    a: base,
                    b: base + 0x100,
                    c: base + 0x200,
                },
            );
        }
        let run = harness.run_parallel(&[0, 1, 2, 3], 2000).unwrap();
        assert!(run.all_completed());
        assert!(run.timed_out().is_empty());
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(harness.check_close(i, want).unwrap(), TestOutcome::Passed);
            assert_eq!(harness.check_exact(i, want).unwrap(), TestOutcome::Passed);
        }
    }

    #[test]
    fn test_parallel_run_keeps_results_of_live_units_when_one_hangs() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut harness = harness(4, GpuModel::new(4).with_stuck_units(bit(2)));
        let mut expected = Vec::new();
        for i in 0..4usize {
            let a = Matrix::random_int8(4, 4, &mut rng).unwrap();
            let b = Matrix::random_int8(4, 4, &mut rng).unwrap();
            expected.push(a.multiply(&b).unwrap());
            let base = 0x2000 + i as u32 * 0x300;
            harness.load_matrix(&a, base, ElementBits::Eight).unwrap();
            harness
                .load_matrix(&b, base + 0x100, ElementBits::Eight)
                .unwrap();
            harness.program_unit(
                i,
                UnitAddresses {
                    a: base,
                    b: base + 0x100,
                    c: base + 0x200,
                },
            );
        }
        let run = harness.run_parallel(&[0, 1, 2, 3], 2000).unwrap();
        assert_eq!(run.elapsed_cycles, 2000);
        assert_eq!(run.timed_out(), vec![2]);
        for outcome in &run.outcomes {
            if outcome.unit == 2 {
                assert!(outcome.completed_cycle.is_none());
            } else {
                let done = outcome.completed_cycle.expect("live unit completed");
                assert!(done > 0 && done < 2000);
                assert_eq!(
                    harness.check_close(outcome.unit, &expected[outcome.unit]).unwrap(),
                    TestOutcome::Passed
                );
            }
        }
    }

    #[test]
    fn test_program_unit_records_addresses() {
        let mut harness = harness(2, GpuModel::new(2));
        let addrs = UnitAddresses {
            a: 0x4000,
            b: 0x4100,
            c: 0x4200,
        };
        harness.program_unit(1, addrs);
        assert_eq!(harness.unit(1).addrs, addrs);
        assert_eq!(harness.host().signals().unit_addr_b[1], 0x4100);
    }
}
