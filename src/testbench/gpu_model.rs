//! behavioral model of the accelerator, standing in for the unit under
//! test behind the same signal interface.
//!
//! every unit runs its own fetch/compute/writeback job, but all memory
//! traffic funnels through one round robin bus master, so requests from
//! different units serialize exactly like the hardware's single bus.

use log::debug;

use super::{
    component::ClockedComponent,
    signals::{bit, SignalBus},
};
use crate::error::HarnessError;
use crate::perf::MATRIX_DIM;

/// int8 operand words per matrix (4 lanes per word)
const OPERAND_WORDS: usize = MATRIX_DIM * MATRIX_DIM / 4;
/// int16 result words per matrix (2 lanes per word)
const RESULT_WORDS: usize = MATRIX_DIM * MATRIX_DIM / 2;
/// fixed compute delay once both operands have arrived
const COMPUTE_EDGES: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobPhase {
    FetchA(usize),
    FetchB(usize),
    Compute(u64),
    WriteBack(usize),
}

#[derive(Debug)]
struct UnitJob {
    addr_a: u32,
    addr_b: u32,
    addr_c: u32,
    phase: JobPhase,
    a: [u32; OPERAND_WORDS],
    b: [u32; OPERAND_WORDS],
    c: [u32; RESULT_WORDS],
}

impl UnitJob {
    fn new(addr_a: u32, addr_b: u32, addr_c: u32) -> Self {
        UnitJob {
            addr_a,
            addr_b,
            addr_c,
            phase: JobPhase::FetchA(0),
            a: [0; OPERAND_WORDS],
            b: [0; OPERAND_WORDS],
            c: [0; RESULT_WORDS],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MasterState {
    Idle,
    Waiting(usize),
}

pub struct GpuModel {
    num_units: usize,
    jobs: Vec<Option<UnitJob>>,
    master: MasterState,
    next_grant: usize,
    stuck_mask: u32,
}

impl GpuModel {
    pub fn new(num_units: usize) -> Self {
        GpuModel {
            num_units,
            jobs: (0..num_units).map(|_| None).collect(),
            master: MasterState::Idle,
            next_grant: 0,
            stuck_mask: 0,
        }
    }

    /// fault injection: units in the mask accept a start and raise busy
    /// but never make progress, so their busy flag never clears
    pub fn with_stuck_units(mut self, mask: u32) -> Self {
        self.stuck_mask = mask;
        self
    }

    fn pick_requester(&mut self) -> Option<usize> {
        for offset in 0..self.num_units {
            let unit = (self.next_grant + offset) % self.num_units;
            if self.stuck_mask & bit(unit) != 0 {
                continue;
            }
            if let Some(job) = &self.jobs[unit] {
                if !matches!(job.phase, JobPhase::Compute(_)) {
                    self.next_grant = (unit + 1) % self.num_units;
                    return Some(unit);
                }
            }
        }
        None
    }
}

impl ClockedComponent for GpuModel {
    fn edge(&mut self, bus: &mut SignalBus) -> Result<(), HarnessError> {
        if !bus.sampled().reset_n {
            self.jobs.iter_mut().for_each(|job| *job = None);
            self.master = MasterState::Idle;
            self.next_grant = 0;
            let drive = bus.drive();
            drive.unit_busy = 0;
            drive.mem_req = false;
            drive.mem_we = false;
            return Ok(());
        }

        // launch every unit whose start bit was asserted
        let start = bus.sampled().unit_start;
        for unit in 0..self.num_units {
            if start & bit(unit) != 0 && self.jobs[unit].is_none() {
                let sampled = bus.sampled();
                let job = UnitJob::new(
                    sampled.unit_addr_a[unit],
                    sampled.unit_addr_b[unit],
                    sampled.unit_addr_c[unit],
                );
                debug!(
                    "unit {}: start a=0x{:08x} b=0x{:08x} c=0x{:08x}",
                    unit, job.addr_a, job.addr_b, job.addr_c
                );
                self.jobs[unit] = Some(job);
                bus.drive().unit_busy |= bit(unit);
            }
        }

        // compute countdown runs off the bus, every unit in parallel
        for unit in 0..self.num_units {
            if self.stuck_mask & bit(unit) != 0 {
                continue;
            }
            if let Some(job) = &mut self.jobs[unit] {
                if let JobPhase::Compute(left) = &mut job.phase {
                    if *left > 1 {
                        *left -= 1;
                    } else {
                        job.c = multiply_words(&job.a, &job.b);
                        job.phase = JobPhase::WriteBack(0);
                    }
                }
            }
        }

        // the one bus master shared by every unit
        match self.master {
            MasterState::Idle => {
                if let Some(unit) = self.pick_requester() {
                    let job = self.jobs[unit].as_ref().expect("granted unit has no job");
                    let (addr, we, wdata) = match job.phase {
                        JobPhase::FetchA(k) => (job.addr_a + 4 * k as u32, false, 0),
                        JobPhase::FetchB(k) => (job.addr_b + 4 * k as u32, false, 0),
                        JobPhase::WriteBack(k) => (job.addr_c + 4 * k as u32, true, job.c[k]),
                        JobPhase::Compute(_) => unreachable!("compute never requests the bus"),
                    };
                    let drive = bus.drive();
                    drive.mem_req = true;
                    drive.mem_we = we;
                    drive.mem_addr = addr;
                    drive.mem_wdata = wdata;
                    self.master = MasterState::Waiting(unit);
                }
            }
            MasterState::Waiting(unit) => {
                if bus.sampled().mem_ack {
                    let rdata = bus.sampled().mem_rdata;
                    let job = self.jobs[unit].as_mut().expect("granted unit has no job");
                    let mut finished = false;
                    job.phase = match job.phase {
                        JobPhase::FetchA(k) => {
                            job.a[k] = rdata;
                            if k + 1 == OPERAND_WORDS {
                                JobPhase::FetchB(0)
                            } else {
                                JobPhase::FetchA(k + 1)
                            }
                        }
                        JobPhase::FetchB(k) => {
                            job.b[k] = rdata;
                            if k + 1 == OPERAND_WORDS {
                                JobPhase::Compute(COMPUTE_EDGES)
                            } else {
                                JobPhase::FetchB(k + 1)
                            }
                        }
                        JobPhase::WriteBack(k) => {
                            if k + 1 == RESULT_WORDS {
                                finished = true;
                                JobPhase::WriteBack(k)
                            } else {
                                JobPhase::WriteBack(k + 1)
                            }
                        }
                        JobPhase::Compute(_) => unreachable!("compute never owns the bus"),
                    };
                    let drive = bus.drive();
                    drive.mem_req = false;
                    drive.mem_we = false;
                    self.master = MasterState::Idle;
                    if finished {
                        self.jobs[unit] = None;
                        bus.drive().unit_busy &= !bit(unit);
                        debug!("unit {}: done", unit);
                    }
                }
            }
        }
        Ok(())
    }
}

/// the 4x4 int8 multiply of the datapath: i16 accumulation with two's
/// complement wrapping, results packed two per word
fn multiply_words(a: &[u32; OPERAND_WORDS], b: &[u32; OPERAND_WORDS]) -> [u32; RESULT_WORDS] {
    let av = unpack_operand(a);
    let bv = unpack_operand(b);
    let mut words = [0u32; RESULT_WORDS];
    for row in 0..MATRIX_DIM {
        for col in 0..MATRIX_DIM {
            let mut acc: i16 = 0;
            for k in 0..MATRIX_DIM {
                acc = acc.wrapping_add(av[row * MATRIX_DIM + k].wrapping_mul(bv[k * MATRIX_DIM + col]));
            }
            let flat = row * MATRIX_DIM + col;
            words[flat / 2] |= u32::from(acc as u16) << ((flat % 2) * 16);
        }
    }
    words
}

fn unpack_operand(words: &[u32; OPERAND_WORDS]) -> [i16; MATRIX_DIM * MATRIX_DIM] {
    let mut values = [0i16; MATRIX_DIM * MATRIX_DIM];
    for (i, value) in values.iter_mut().enumerate() {
        *value = i16::from((words[i / 4] >> ((i % 4) * 8)) as u8 as i8);
    }
    values
}
