//! # Description
//! the analytic performance model: theoretical throughput under a fixed
//! precision, the four strategy search against a target figure, and the
//! comparison against a fixed reference accelerator profile.
//!
//! everything here is pure arithmetic over configuration values; nothing
//! touches the test bench.

use std::collections::HashMap;
use std::time::Instant;

use lazy_static::lazy_static;
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::matrix::Matrix;

/// operand matrices are this many rows and columns
pub const MATRIX_DIM: usize = 4;
/// MAC operations of one matrix multiply
pub const OPS_PER_MATRIX: u64 = (MATRIX_DIM * MATRIX_DIM * MATRIX_DIM) as u64;
/// cycles one matrix operation spends in a unit, memory access included
pub const CYCLES_PER_OPERATION: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Precision {
    Int8,
    Int4,
    Fp16,
    Fp32,
}

lazy_static! {
    /// lower precision packs more MACs per cycle, higher precision costs
    /// proportionally more
    static ref PRECISION_FACTORS: HashMap<Precision, f64> = HashMap::from([
        (Precision::Int8, 1.0),
        (Precision::Int4, 2.0),
        (Precision::Fp16, 0.8),
        (Precision::Fp32, 0.5),
    ]);

    /// published/estimated M1 Neural Engine figures, the default yardstick
    pub static ref M1_NEURAL_ENGINE: ReferenceProfile = ReferenceProfile {
        name: String::from("M1 Neural Engine"),
        tops: 11.5,
        frequency_hz: 1.0e9,
        num_units: 128,
        power_watts: 10.0,
        memory_bandwidth_bytes: 68.25e9,
    };
}

impl Precision {
    pub fn throughput_factor(self) -> f64 {
        PRECISION_FACTORS[&self]
    }
}

/// the accelerator configuration a benchmark run is scored against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuConfig {
    pub frequency_hz: f64,
    pub num_units: usize,
    pub precision: Precision,
}

/// theoretical TOPS: frequency / cycles-per-op * units * ops-per-matrix,
/// scaled by the precision factor
pub fn theoretical_tops(config: &GpuConfig) -> f64 {
    let per_unit = config.frequency_hz / CYCLES_PER_OPERATION as f64;
    let total = per_unit * config.num_units as f64 * OPS_PER_MATRIX as f64;
    total / 1e12 * config.precision.throughput_factor()
}

/// one candidate scaling strategy; feasibility is fixed at creation and
/// only ever reported, never enforced
#[derive(Debug, Clone, Serialize)]
pub struct ScalingOption {
    pub name: String,
    pub frequency_hz: f64,
    pub num_units: usize,
    pub feasible: bool,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScalingAnalysis {
    pub base_tops: f64,
    pub target_tops: f64,
    pub scale_factor: f64,
    pub options: Vec<ScalingOption>,
}

/// # Description
/// searches the small design space of ways to close the gap to
/// `target_tops`: frequency alone, unit count alone, a balanced split,
/// and a mixed precision variant assuming the 2x boost of the 4 bit
/// datapath. each option carries a fixed resource ceiling.
pub fn scaling_options(current: &GpuConfig, target_tops: f64) -> ScalingAnalysis {
    let base_tops = theoretical_tops(current);
    let scale = target_tops / base_tops;
    let base_freq = current.frequency_hz;
    let base_units = current.num_units;
    let mut options = Vec::with_capacity(4);

    let freq = base_freq * scale;
    options.push(ScalingOption {
        name: String::from("Frequency scaling only"),
        frequency_hz: freq,
        num_units: base_units,
        feasible: freq <= 500e6,
        description: format!("{:.0} MHz, {} units", freq / 1e6, base_units),
    });

    let units = (base_units as f64 * scale) as usize;
    options.push(ScalingOption {
        name: String::from("More GPU units only"),
        frequency_hz: base_freq,
        num_units: units,
        feasible: units <= 256,
        description: format!("{:.0} MHz, {} units", base_freq / 1e6, units),
    });

    let freq_scale = scale.sqrt().min(3.0);
    let unit_scale = scale / freq_scale;
    let balanced_freq = base_freq * freq_scale;
    let balanced_units = (base_units as f64 * unit_scale) as usize;
    options.push(ScalingOption {
        name: String::from("Balanced scaling"),
        frequency_hz: balanced_freq,
        num_units: balanced_units,
        feasible: balanced_freq <= 300e6 && balanced_units <= 128,
        description: format!("{:.0} MHz, {} units", balanced_freq / 1e6, balanced_units),
    });

    let mixed_scale = scale / 2.0;
    let mixed_freq = base_freq * mixed_scale.min(2.0);
    let mixed_units = (base_units as f64 * (mixed_scale / (mixed_freq / base_freq))) as usize;
    options.push(ScalingOption {
        name: String::from("Mixed precision (INT4/INT8)"),
        frequency_hz: mixed_freq,
        num_units: mixed_units,
        feasible: mixed_freq <= 200e6 && mixed_units <= 64,
        description: format!(
            "{:.0} MHz, {} units, INT4 precision",
            mixed_freq / 1e6,
            mixed_units
        ),
    });

    for option in &options {
        info!(
            "{}: {} [{}]",
            option.name,
            option.description,
            if option.feasible { "ok" } else { "infeasible" }
        );
    }
    ScalingAnalysis {
        base_tops,
        target_tops,
        scale_factor: scale,
        options,
    }
}

/// a fixed reference accelerator: every figure is a configured constant,
/// nothing is measured
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceProfile {
    pub name: String,
    pub tops: f64,
    pub frequency_hz: f64,
    pub num_units: usize,
    pub power_watts: f64,
    pub memory_bandwidth_bytes: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemSummary {
    pub tops: f64,
    pub frequency_hz: f64,
    pub num_units: usize,
    pub power_watts: f64,
    pub memory_bandwidth_bytes: f64,
}

/// reference over current ratios plus power normalized efficiency
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceComparison {
    pub current: SystemSummary,
    pub reference: ReferenceProfile,
    pub tops_ratio: f64,
    pub frequency_ratio: f64,
    pub units_ratio: f64,
    pub tops_per_watt_reference: f64,
    pub tops_per_watt_current: f64,
    pub efficiency_ratio: f64,
}

pub fn compare_to_reference(
    current: &GpuConfig,
    power_watts: f64,
    cache_line_bits: usize,
    reference: &ReferenceProfile,
) -> ReferenceComparison {
    let tops = theoretical_tops(current);
    let summary = SystemSummary {
        tops,
        frequency_hz: current.frequency_hz,
        num_units: current.num_units,
        power_watts,
        memory_bandwidth_bytes: cache_line_bits as f64 / 8.0 * current.frequency_hz,
    };
    let tops_per_watt_reference = reference.tops / reference.power_watts;
    let tops_per_watt_current = tops / power_watts;
    info!(
        "{}: {} TOPS @ {:.1} GHz, current: {:.3} TOPS @ {:.0} MHz, gap {:.1}x",
        reference.name,
        reference.tops,
        reference.frequency_hz / 1e9,
        tops,
        current.frequency_hz / 1e6,
        reference.tops / tops
    );
    ReferenceComparison {
        tops_ratio: reference.tops / tops,
        frequency_ratio: reference.frequency_hz / current.frequency_hz,
        units_ratio: reference.num_units as f64 / current.num_units as f64,
        tops_per_watt_reference,
        tops_per_watt_current,
        efficiency_ratio: tops_per_watt_reference / tops_per_watt_current,
        current: summary,
        reference: reference.clone(),
    }
}

/// host reference multiply wall clock against the modeled accelerator
/// time for a list of square sizes
#[derive(Debug, Clone, Serialize)]
pub struct MatrixBenchmark {
    pub size: usize,
    pub operation_count: u64,
    pub host_seconds: f64,
    pub modeled_seconds: f64,
    pub speedup: f64,
}

pub fn modeled_matrix_benchmark<R: Rng>(
    config: &GpuConfig,
    sizes: &[usize],
    rng: &mut R,
) -> Result<Vec<MatrixBenchmark>, HarnessError> {
    let modeled_ops_per_second = config.frequency_hz / CYCLES_PER_OPERATION as f64
        * config.num_units as f64
        * OPS_PER_MATRIX as f64;
    sizes
        .iter()
        .map(|&size| {
            let a = Matrix::random_int8(size, size, rng)?;
            let b = Matrix::random_int8(size, size, rng)?;
            let started = Instant::now();
            let _ = a.multiply(&b)?;
            let host_seconds = started.elapsed().as_secs_f64();
            let operation_count = (size * size * size) as u64;
            let modeled_seconds = operation_count as f64 / modeled_ops_per_second;
            info!(
                "{0}x{0}: host {1:.3} ms, modeled {2:.3} ms",
                size,
                host_seconds * 1e3,
                modeled_seconds * 1e3
            );
            Ok(MatrixBenchmark {
                size,
                operation_count,
                host_seconds,
                modeled_seconds,
                speedup: host_seconds / modeled_seconds,
            })
        })
        .collect()
}
