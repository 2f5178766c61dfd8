//! Single-line text rendering of a host report

use std::fmt::Write as _;

use crate::monitoring::{CpuMemSample, GpuSample};

use super::HostReport;

/// Renders [`HostReport`]s as the line printed for each host.
///
/// ```text
/// host1: CPU  7%, RAM 42% / GPU0: 55%, VRAM 10% / GPU1:  0%, VRAM  5% (1/2 GPU used)
/// host2: ERROR — Host host2 unreachable: Connection refused
/// ```
///
/// Percentages are right-aligned to a minimum width of three. Wider values
/// are printed in full, never cut.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportFormatter;

impl ReportFormatter {
    /// Formats one report
    #[must_use]
    pub fn format(report: &HostReport) -> String {
        match (&report.error, &report.cpu_mem) {
            (Some(reason), _) => Self::format_error(&report.host, reason),
            (None, Some(cpu_mem)) => Self::format_metrics(&report.host, cpu_mem, &report.gpus),
            (None, None) => Self::format_error(&report.host, "no metrics collected"),
        }
    }

    /// Formats a successful poll
    #[must_use]
    pub fn format_metrics(host: &str, cpu_mem: &CpuMemSample, gpus: &[GpuSample]) -> String {
        let mut line = format!(
            "{host}: CPU{:3}%, RAM{:3}%",
            cpu_mem.cpu_percent, cpu_mem.memory_percent
        );

        if gpus.is_empty() {
            return line;
        }

        for gpu in gpus {
            // Writing to a String cannot fail
            let _ = write!(
                line,
                " / GPU{}:{:3}%, VRAM{:3}%",
                gpu.index, gpu.gpu_percent, gpu.vram_percent
            );
        }
        let in_use = gpus.iter().filter(|g| g.is_in_use()).count();
        let _ = write!(line, " ({in_use}/{} GPU used)", gpus.len());
        line
    }

    /// Formats a failed poll
    #[must_use]
    pub fn format_error(host: &str, reason: &str) -> String {
        format!("{host}: ERROR — {reason}")
    }
}
