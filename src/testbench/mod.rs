//! # Description
//! - this module is the cycle driven test bench
//! - the harness in system.rs drives the start/busy handshake through the
//!   host capability and never talks to a simulation loop directly
//! - read system.rs and host.rs for more details
//!
//! # Components
//! - signals: the flat signal bus shared by every clocked task
//! - mem_model: the latency bearing memory bus emulator
//! - gpu_model: the behavioral accelerator standing in for the unit under test
//! - host: the clock/signal capability and its provided implementation
//! - system: the unit harness (start pulses, busy polling, timeouts)
//! - suite: the verification suite mirroring the hardware bench
//!

pub(self) mod component;
pub(self) mod gpu_model;
pub(self) mod host;
pub(self) mod mem_model;
pub(self) mod signals;
pub(self) mod suite;
pub(self) mod system;

pub use component::ClockedComponent;
pub use gpu_model::GpuModel;
pub use host::{CycleHost, SimHost};
pub use mem_model::{BusTransaction, MemoryConfig, MemoryModel};
pub use signals::{bit, mask_of, SignalBus, SignalSet, MAX_UNITS};
pub use suite::TestSuite;
pub use system::{
    AcceleratorUnit, ParallelRun, Tolerance, UnitAddresses, UnitHarness, UnitOutcome,
};
