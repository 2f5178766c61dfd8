//! Runs the metric commands over a session and parses their output

use crate::connection::RemoteSession;
use crate::error::{DtopError, DtopResult};

use super::gpu::{GpuQueryParser, VramSource};
use super::metrics::{CpuMemSample, GpuSample, HostMetrics};
use super::parser::{CommandParser, FreeLayout, FreeParser, VmstatParser};

/// Collects [`HostMetrics`] from one host.
///
/// The collector is stateless apart from its parser selection and can be
/// shared by every host task of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricCollector {
    vmstat: VmstatParser,
    free: FreeParser,
    gpu: GpuQueryParser,
}

impl MetricCollector {
    /// Creates a collector with explicit `free` and VRAM formats
    #[must_use]
    pub const fn new(free_layout: FreeLayout, vram_source: VramSource) -> Self {
        Self {
            vmstat: VmstatParser,
            free: FreeParser::new(free_layout),
            gpu: GpuQueryParser::new(vram_source),
        }
    }

    /// Reads CPU usage from `vmstat` and memory usage from `free`.
    ///
    /// # Errors
    ///
    /// Returns a connection error if a command could not be run, or a
    /// monitoring error if its output does not have the expected shape.
    pub async fn collect_cpu_mem(&self, session: &dyn RemoteSession) -> DtopResult<CpuMemSample> {
        let cpu_percent = run_parser(session, &self.vmstat).await?;
        let memory = run_parser(session, &self.free).await?;
        Ok(CpuMemSample::new(cpu_percent, memory.percent()?))
    }

    /// Reads per-GPU usage from `nvidia-smi`.
    ///
    /// A host without GPUs or without `nvidia-smi` yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the command could not be run, or a
    /// monitoring error if the XML is malformed or incomplete.
    pub async fn collect_gpu(&self, session: &dyn RemoteSession) -> DtopResult<Vec<GpuSample>> {
        run_parser(session, &self.gpu).await
    }

    /// Collects CPU, memory and GPU metrics in that order.
    ///
    /// # Errors
    ///
    /// Returns the first error of [`Self::collect_cpu_mem`] or
    /// [`Self::collect_gpu`].
    pub async fn collect(&self, session: &dyn RemoteSession) -> DtopResult<HostMetrics> {
        let cpu_mem = self.collect_cpu_mem(session).await?;
        let gpus = self.collect_gpu(session).await?;
        tracing::debug!(
            host = session.host(),
            cpu = cpu_mem.cpu_percent,
            memory = cpu_mem.memory_percent,
            gpus = gpus.len(),
            "Collected host metrics"
        );
        Ok(HostMetrics { cpu_mem, gpus })
    }
}

async fn run_parser<P: CommandParser + Sync>(
    session: &dyn RemoteSession,
    parser: &P,
) -> DtopResult<P::Output> {
    let command = parser.command();
    let output = session.execute(command).await?;

    if !output.is_success() {
        // A missing tool still prints nothing; let the parser decide
        tracing::debug!(
            host = session.host(),
            command,
            status = ?output.exit_status,
            "Remote command exited with non-zero status"
        );
    }

    parser.parse(&output.stdout_lossy()).map_err(|e| {
        tracing::debug!(host = session.host(), command, error = %e, "Failed to parse output");
        DtopError::from(e)
    })
}
