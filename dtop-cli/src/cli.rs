//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use dtop_core::{FreeLayout, VramSource};

/// Show CPU, RAM and GPU utilization of remote hosts over SSH
#[derive(Debug, Parser)]
#[command(name = "dtop")]
#[command(author, version, about = "CPU, RAM and GPU status of remote hosts over SSH")]
pub struct Cli {
    /// Hosts to poll, printed in this order
    #[arg(long, required = true, num_args = 1.., value_name = "HOST")]
    pub hosts: Vec<String>,

    /// Login name used unless the SSH config names one
    #[arg(short, long)]
    pub user: String,

    /// SSH client config with per-host HostName/User/Port overrides
    #[arg(short = 'c', long, default_value = "~/.ssh/config", value_name = "PATH")]
    pub ssh_config: PathBuf,

    /// Number of hosts polled at the same time
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Time budget for one host in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// SSH connect timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Limit for a single remote command in seconds
    #[arg(long, value_name = "SECS")]
    pub command_timeout: Option<u64>,

    /// Which `free` column holds used memory
    #[arg(long, value_enum)]
    pub free_layout: Option<FreeLayoutArg>,

    /// Where the VRAM percentage comes from
    #[arg(long, value_enum)]
    pub vram_source: Option<VramSourceArg>,

    /// Settings file (default: <config dir>/dtop/config.toml)
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print host lines and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// `free` output layouts
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FreeLayoutArg {
    /// Used memory from the `-/+ buffers/cache` row (procps-ng before 3.3.10)
    BuffersCache,
    /// Used memory from the `Mem:` row
    MemRow,
}

impl From<FreeLayoutArg> for FreeLayout {
    fn from(arg: FreeLayoutArg) -> Self {
        match arg {
            FreeLayoutArg::BuffersCache => Self::BuffersCache,
            FreeLayoutArg::MemRow => Self::MemRow,
        }
    }
}

/// VRAM percentage sources
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum VramSourceArg {
    /// Allocated framebuffer memory over total
    FbMemoryUsage,
    /// Memory controller utilization as reported by nvidia-smi
    ReportedUtilization,
}

impl From<VramSourceArg> for VramSource {
    fn from(arg: VramSourceArg) -> Self {
        match arg {
            VramSourceArg::FbMemoryUsage => Self::FbMemoryUsage,
            VramSourceArg::ReportedUtilization => Self::ReportedUtilization,
        }
    }
}
