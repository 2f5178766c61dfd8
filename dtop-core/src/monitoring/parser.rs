//! Parsers for `vmstat` and `free` output
//!
//! Both tools print fixed-width tables, and the values are read by line and
//! whitespace-field position. The positions below are format assumptions
//! about procps-ng output, not something inferred at runtime.

use serde::{Deserialize, Serialize};

use super::metrics::floor_percent;

/// Errors that can occur during metrics parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonitoringError {
    /// The remote output did not have the expected shape
    #[error("Failed to parse monitoring output: {0}")]
    ParseError(String),
    /// A total used as a divisor was reported as zero
    #[error("Total {0} reported as zero")]
    ZeroTotal(&'static str),
}

/// Result type for monitoring operations
pub type MonitoringResult<T> = Result<T, MonitoringError>;

/// Virtual memory statistics command
pub const VMSTAT_COMMAND: &str = "vmstat";

/// Memory statistics command
pub const FREE_COMMAND: &str = "free";

/// A parser bound to the remote command whose output it understands.
pub trait CommandParser {
    /// Parsed value
    type Output;

    /// The shell command to run on the remote host
    fn command(&self) -> &'static str;

    /// Parses the command's standard output.
    ///
    /// # Errors
    ///
    /// Returns a [`MonitoringError`] when the output does not match the
    /// format this parser was built for.
    fn parse(&self, stdout: &str) -> MonitoringResult<Self::Output>;
}

/// Returns the whitespace-separated field at `line`/`field`, both 0-based.
fn field_at<'a>(
    output: &'a str,
    line: usize,
    field: usize,
    command: &str,
) -> MonitoringResult<&'a str> {
    let row = output.lines().nth(line).ok_or_else(|| {
        MonitoringError::ParseError(format!(
            "`{command}` printed fewer than {} lines",
            line + 1
        ))
    })?;
    row.split_whitespace().nth(field).ok_or_else(|| {
        MonitoringError::ParseError(format!(
            "`{command}` line {line} has fewer than {} fields",
            field + 1
        ))
    })
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> MonitoringResult<T> {
    value
        .parse()
        .map_err(|_| MonitoringError::ParseError(format!("{what} is not a number: {value:?}")))
}

/// Reads CPU usage from `vmstat`.
///
/// Format assumption: line 2 (the first sample row) holds the idle
/// percentage at field 14, the `id` column of
/// `r b swpd free buff cache si so bi bo in cs us sy id wa st`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VmstatParser;

impl VmstatParser {
    const SAMPLE_LINE: usize = 2;
    const IDLE_FIELD: usize = 14;
}

impl CommandParser for VmstatParser {
    /// CPU usage percentage
    type Output = u8;

    fn command(&self) -> &'static str {
        VMSTAT_COMMAND
    }

    fn parse(&self, stdout: &str) -> MonitoringResult<u8> {
        let raw = field_at(stdout, Self::SAMPLE_LINE, Self::IDLE_FIELD, VMSTAT_COMMAND)?;
        let idle: u8 = parse_number(raw, "vmstat idle")?;
        if idle > 100 {
            return Err(MonitoringError::ParseError(format!(
                "vmstat idle percentage out of range: {idle}"
            )));
        }
        Ok(100 - idle)
    }
}

/// Which `free` output layout to read used memory from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FreeLayout {
    /// procps-ng before 3.3.10: used memory from the
    /// `-/+ buffers/cache:` row (line 2, field 2)
    #[default]
    BuffersCache,
    /// Current procps-ng: the `used` column of the `Mem:` row
    /// (line 1, field 2)
    MemRow,
}

impl FreeLayout {
    /// Line and field of the used-memory value
    const fn used_position(self) -> (usize, usize) {
        match self {
            Self::BuffersCache => (2, 2),
            Self::MemRow => (1, 2),
        }
    }
}

impl std::fmt::Display for FreeLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BuffersCache => write!(f, "buffers-cache"),
            Self::MemRow => write!(f, "mem-row"),
        }
    }
}

/// Used and total memory, in whatever unit `free` printed (KiB by default)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Total physical memory
    pub total: u64,
    /// Used memory
    pub used: u64,
}

impl MemoryUsage {
    /// Returns `floor(100 * used / total)`.
    ///
    /// # Errors
    ///
    /// [`MonitoringError::ZeroTotal`] when `total` is zero and
    /// [`MonitoringError::ParseError`] when `used` exceeds `total`.
    pub fn percent(&self) -> MonitoringResult<u8> {
        if self.total == 0 {
            return Err(MonitoringError::ZeroTotal("memory"));
        }
        if self.used > self.total {
            return Err(MonitoringError::ParseError(format!(
                "used memory {} exceeds total {}",
                self.used, self.total
            )));
        }
        Ok(floor_percent(self.used, self.total))
    }
}

/// Reads total and used memory from `free`.
///
/// Total is always line 1 field 1 (`Mem:` row, `total` column); the used
/// value depends on [`FreeLayout`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeParser {
    layout: FreeLayout,
}

impl FreeParser {
    /// Creates a parser for the given layout
    #[must_use]
    pub const fn new(layout: FreeLayout) -> Self {
        Self { layout }
    }

    /// Layout this parser reads
    #[must_use]
    pub const fn layout(&self) -> FreeLayout {
        self.layout
    }
}

impl CommandParser for FreeParser {
    type Output = MemoryUsage;

    fn command(&self) -> &'static str {
        FREE_COMMAND
    }

    fn parse(&self, stdout: &str) -> MonitoringResult<MemoryUsage> {
        let total = parse_number(field_at(stdout, 1, 1, FREE_COMMAND)?, "free total")?;
        let (line, field) = self.layout.used_position();
        let used = parse_number(field_at(stdout, line, field, FREE_COMMAND)?, "free used")?;
        Ok(MemoryUsage { total, used })
    }
}
