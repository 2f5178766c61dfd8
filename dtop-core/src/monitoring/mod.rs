//! Remote host metrics collection
//!
//! Runs a fixed set of commands (`vmstat`, `free`, `nvidia-smi -q -x`) over a
//! [`RemoteSession`](crate::connection::RemoteSession) and parses their output
//! into typed samples.
//!
//! The text parsers read values at fixed line/field offsets. Those offsets are
//! tied to one tool's column layout, so every layout is an explicit parser
//! (see [`FreeLayout`] and [`VramSource`]) rather than something guessed from
//! the output.

pub mod collector;
mod gpu;
mod metrics;
mod parser;

pub use collector::MetricCollector;
pub use gpu::{GPU_QUERY_COMMAND, GpuQueryParser, VramSource};
pub use metrics::{CpuMemSample, GpuSample, HostMetrics};
pub use parser::{
    CommandParser, FREE_COMMAND, FreeLayout, FreeParser, MemoryUsage, MonitoringError,
    MonitoringResult, VMSTAT_COMMAND, VmstatParser,
};
