//! Data models for remote host metrics

use serde::{Deserialize, Serialize};

/// CPU and memory utilization of one host.
///
/// The two values come from separate commands, so they are not sampled at
/// the same instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuMemSample {
    /// CPU usage (0–100), `100 - idle`
    pub cpu_percent: u8,
    /// Memory usage (0–100), `floor(100 * used / total)`
    pub memory_percent: u8,
}

impl CpuMemSample {
    /// Creates a sample from already validated percentages
    #[must_use]
    pub const fn new(cpu_percent: u8, memory_percent: u8) -> Self {
        Self {
            cpu_percent,
            memory_percent,
        }
    }
}

/// Utilization of a single GPU
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuSample {
    /// Position of the GPU in the query output, starting at 0
    pub index: usize,
    /// GPU core utilization (0–100)
    pub gpu_percent: u8,
    /// VRAM utilization (0–100)
    pub vram_percent: u8,
    /// Number of processes currently holding a context on this GPU
    pub active_process_count: usize,
}

impl GpuSample {
    /// Returns true if at least one process is running on the GPU
    #[must_use]
    pub const fn is_in_use(&self) -> bool {
        self.active_process_count != 0
    }
}

/// Everything collected from one host in a single poll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMetrics {
    /// CPU and memory utilization
    pub cpu_mem: CpuMemSample,
    /// GPUs in query order; empty on hosts without GPUs or `nvidia-smi`
    pub gpus: Vec<GpuSample>,
}

impl HostMetrics {
    /// Number of GPUs with at least one active process
    #[must_use]
    pub fn gpus_in_use(&self) -> usize {
        self.gpus.iter().filter(|g| g.is_in_use()).count()
    }
}

/// Computes `floor(100 * used / total)`.
///
/// Callers must reject `total == 0` and `used > total` before calling.
pub(super) fn floor_percent(used: u64, total: u64) -> u8 {
    debug_assert!(total > 0 && used <= total);
    u8::try_from(u128::from(used) * 100 / u128::from(total)).unwrap_or(100)
}
