//! the crate mac_harness is a verification and performance model harness
//! for a parallel matrix multiply-accumulate accelerator.
//! there are 5 parts in the crate:
//!
//! - testbench: the cycle driven bench (signal bus, memory model, behavioral accelerator, unit harness, suite).
//! - codec: the matrix to memory codec and the sparse word image.
//! - matrix: the host side matrix type and the reference multiply.
//! - perf: the analytic performance model and the scaling search.
//! - bench_result: the result records written out after a run.
//!
//!

pub mod bench_result;
pub mod cmd_args;
pub mod codec;
pub mod error;
pub mod matrix;
pub mod perf;
pub mod settings;
pub mod testbench;

pub use bench_result::{ComparisonReport, HarnessRunResult};
pub use error::HarnessError;
pub use matrix::Matrix;
pub use testbench::{CycleHost, GpuModel, TestSuite, UnitHarness};
