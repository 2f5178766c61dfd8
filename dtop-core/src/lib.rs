//! dtop Core Library
//!
//! Polls CPU, memory and GPU utilization of many hosts over SSH and renders
//! one status line per host.
//!
//! # Crate Structure
//!
//! - [`alias`] - Per-host overrides from an OpenSSH client config file
//! - [`connection`] - Connection targets, the `Connector` / `RemoteSession` seam, OpenSSH sessions
//! - [`monitoring`] - Remote commands, their parsers and the metric collector
//! - [`report`] - Host and fleet reports, the concurrent poller, line formatting
//! - [`config`] - Poll settings loaded from TOML
//! - [`tracing`] - Logging setup

// Enable missing_docs warning for public API documentation
#![warn(missing_docs)]

pub mod alias;
pub mod config;
pub mod connection;
pub mod error;
pub mod monitoring;
pub mod report;
pub mod tracing;

pub use alias::{AliasTable, HostAlias};
pub use config::{ConfigError, PollSettings};
pub use connection::{
    CommandOutput, ConnectionError, ConnectionTarget, Connector, RemoteSession,
    ScriptedConnector, ScriptedHost, SshConnector,
};
pub use error::{DtopError, DtopResult};
pub use monitoring::{
    CpuMemSample, FreeLayout, GpuSample, HostMetrics, MetricCollector, MonitoringError,
    VramSource,
};
pub use report::{FleetPoller, FleetReport, HostReport, ReportFormatter};
