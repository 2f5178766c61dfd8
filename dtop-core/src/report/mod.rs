//! Per-host results, their aggregation and their text rendering
//!
//! [`FleetPoller`] produces one [`HostReport`] per requested host, in input
//! order, and wraps them in a [`FleetReport`]. [`ReportFormatter`] turns a
//! report into the single line printed for its host.

mod formatter;
mod poller;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitoring::{CpuMemSample, GpuSample, HostMetrics};

pub use formatter::ReportFormatter;
pub use poller::FleetPoller;

/// Outcome of polling one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostReport {
    /// Host as requested by the caller (before alias resolution)
    pub host: String,
    /// CPU and memory usage, absent on failure
    pub cpu_mem: Option<CpuMemSample>,
    /// GPUs in query order; empty on failure or on hosts without GPUs
    pub gpus: Vec<GpuSample>,
    /// Failure reason, absent on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time spent on this host
    pub elapsed_ms: u64,
    /// When the poll finished
    pub collected_at: DateTime<Utc>,
}

impl HostReport {
    /// Creates a report for a host that was polled successfully
    #[must_use]
    pub fn success(host: impl Into<String>, metrics: HostMetrics, elapsed_ms: u64) -> Self {
        Self {
            host: host.into(),
            cpu_mem: Some(metrics.cpu_mem),
            gpus: metrics.gpus,
            error: None,
            elapsed_ms,
            collected_at: Utc::now(),
        }
    }

    /// Creates a report for a host whose poll failed
    #[must_use]
    pub fn failure(host: impl Into<String>, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            host: host.into(),
            cpu_mem: None,
            gpus: Vec::new(),
            error: Some(error.into()),
            elapsed_ms,
            collected_at: Utc::now(),
        }
    }

    /// Returns true if metrics were collected
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none() && self.cpu_mem.is_some()
    }

    /// Number of GPUs with at least one active process
    #[must_use]
    pub fn gpus_in_use(&self) -> usize {
        self.gpus.iter().filter(|g| g.is_in_use()).count()
    }
}

/// Reports of one run, in the order the hosts were requested
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetReport {
    /// Number of hosts polled
    pub total: usize,
    /// Hosts with metrics
    pub succeeded: usize,
    /// Hosts that failed
    pub failed: usize,
    /// One report per requested host
    pub reports: Vec<HostReport>,
}

impl FleetReport {
    /// Creates a fleet report from per-host reports, keeping their order
    #[must_use]
    pub fn from_reports(reports: Vec<HostReport>) -> Self {
        let total = reports.len();
        let succeeded = reports.iter().filter(|r| r.is_success()).count();

        Self {
            total,
            succeeded,
            failed: total - succeeded,
            reports,
        }
    }

    /// Returns true if every host succeeded
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Returns true if any host failed
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Returns a summary string
    #[must_use]
    pub fn summary_string(&self) -> String {
        format!(
            "Hosts: {}, Succeeded: {}, Failed: {}",
            self.total, self.succeeded, self.failed
        )
    }
}
