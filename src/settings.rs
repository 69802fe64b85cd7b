use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};

use crate::perf::{GpuConfig, Precision, ReferenceProfile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub gpu: GpuSettings,
    pub memory: MemorySettings,
    pub harness: HarnessSettings,
    pub analysis: AnalysisSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuSettings {
    pub base_frequency_hz: f64,
    pub num_units: usize,
    pub precision: Precision,
    pub clock_period_ns: u64,
    pub power_watts: f64,
    pub cache_line_bits: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    pub latency_ns: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessSettings {
    pub timeout_cycles: u64,
    pub parallel_timeout_cycles: u64,
    pub parallel_units: usize,
    pub performance_operations: usize,
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    pub target_tops: f64,
    pub benchmark_sizes: Vec<usize>,
    pub reference: ReferenceProfile,
}

impl Settings {
    pub fn new(config_paths: Vec<String>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        for path in config_paths {
            builder = builder.add_source(File::with_name(&path));
        }
        builder.build()?.try_deserialize()
    }

    /// the configuration slice the analytic model scores
    pub fn gpu_config(&self) -> GpuConfig {
        GpuConfig {
            frequency_hz: self.gpu.base_frequency_hz,
            num_units: self.gpu.num_units,
            precision: self.gpu.precision,
        }
    }
}
