//! the clock/signal capability the harness runs against.
//!
//! re-expresses the hosting simulator's callback interface as an explicit
//! object handed to the harness constructor, so the harness has no hidden
//! dependency on any particular simulation loop.

use super::{
    component::ClockedComponent,
    gpu_model::GpuModel,
    mem_model::{MemoryConfig, MemoryModel},
    signals::{SignalBus, SignalSet},
};
use crate::codec::MemoryImage;
use crate::error::HarnessError;

pub trait SimHost {
    /// advance the simulation by one rising edge
    fn clock_edge(&mut self) -> Result<(), HarnessError>;

    /// suspend for a fixed virtual duration, rounded up to whole edges
    fn wait_ns(&mut self, ns: u64) -> Result<(), HarnessError>;

    /// the signal values as the bench side observes them between edges
    fn signals(&self) -> &SignalSet;

    /// drive side of the signal bus
    fn drive(&mut self) -> &mut SignalSet;

    fn memory(&self) -> &MemoryImage;

    fn memory_mut(&mut self) -> &mut MemoryImage;

    fn num_units(&self) -> usize;

    fn clock_period_ns(&self) -> u64;

    /// edges processed since the session started
    fn cycle(&self) -> u64;
}

/// # Description
/// the provided host: owns the signal bus plus the background tasks
/// (memory model and the accelerator model) and steps them one edge at a
/// time. all tasks sample the same latched snapshot before any update of
/// this edge becomes visible, and nothing advances outside `clock_edge`,
/// so dropping the host tears the session down deterministically.
pub struct CycleHost {
    bus: SignalBus,
    mem: MemoryModel,
    gpu: GpuModel,
    num_units: usize,
    period_ns: u64,
    cycle: u64,
}

impl CycleHost {
    pub fn new(num_units: usize, mem_config: MemoryConfig, gpu: GpuModel) -> Self {
        let period_ns = mem_config.clock_period_ns;
        CycleHost {
            bus: SignalBus::new(num_units),
            mem: MemoryModel::new(mem_config),
            gpu,
            num_units,
            period_ns,
            cycle: 0,
        }
    }
}

impl SimHost for CycleHost {
    fn clock_edge(&mut self) -> Result<(), HarnessError> {
        self.bus.latch();
        self.mem.edge(&mut self.bus)?;
        self.gpu.edge(&mut self.bus)?;
        self.cycle += 1;
        Ok(())
    }

    fn wait_ns(&mut self, ns: u64) -> Result<(), HarnessError> {
        let edges = (ns + self.period_ns - 1) / self.period_ns;
        for _ in 0..edges {
            self.clock_edge()?;
        }
        Ok(())
    }

    fn signals(&self) -> &SignalSet {
        self.bus.observed()
    }

    fn drive(&mut self) -> &mut SignalSet {
        self.bus.drive()
    }

    fn memory(&self) -> &MemoryImage {
        self.mem.image()
    }

    fn memory_mut(&mut self) -> &mut MemoryImage {
        self.mem.image_mut()
    }

    fn num_units(&self) -> usize {
        self.num_units
    }

    fn clock_period_ns(&self) -> u64 {
        self.period_ns
    }

    fn cycle(&self) -> u64 {
        self.cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_rounds_up_to_whole_edges() {
        let mut host = CycleHost::new(1, MemoryConfig::default(), GpuModel::new(1));
        host.wait_ns(25).unwrap();
        assert_eq!(host.cycle(), 3);
        host.wait_ns(20).unwrap();
        assert_eq!(host.cycle(), 5);
    }
}
