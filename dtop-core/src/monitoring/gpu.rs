//! Parser for `nvidia-smi -q -x` output
//!
//! The XML report contains one `<gpu>` element per device. Only the fields
//! needed for the summary line are extracted; everything else is skipped.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};

use super::metrics::{GpuSample, floor_percent};
use super::parser::{CommandParser, MonitoringError, MonitoringResult};

/// GPU query command producing the structured XML report
pub const GPU_QUERY_COMMAND: &str = "nvidia-smi -q -x";

/// Where the VRAM percentage is read from.
///
/// The two sources measure different things and are never mixed:
/// `fb_memory_usage` is how much framebuffer memory is allocated, while
/// `utilization/memory_util` is the fraction of time the memory controller
/// was busy during the last sample period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VramSource {
    /// `floor(100 * fb_memory_usage/used / fb_memory_usage/total)`
    #[default]
    FbMemoryUsage,
    /// `utilization/memory_util` as reported
    ReportedUtilization,
}

impl std::fmt::Display for VramSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FbMemoryUsage => write!(f, "fb-memory-usage"),
            Self::ReportedUtilization => write!(f, "reported-utilization"),
        }
    }
}

/// Raw text values captured inside one `<gpu>` element
#[derive(Debug, Default)]
struct GpuNode {
    gpu_util: Option<String>,
    memory_util: Option<String>,
    fb_total: Option<String>,
    fb_used: Option<String>,
    process_count: usize,
}

/// Parses the XML GPU report into one [`GpuSample`] per `<gpu>` element.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpuQueryParser {
    vram_source: VramSource,
}

impl GpuQueryParser {
    /// Creates a parser reading VRAM usage from `vram_source`
    #[must_use]
    pub const fn new(vram_source: VramSource) -> Self {
        Self { vram_source }
    }

    /// VRAM source this parser reads
    #[must_use]
    pub const fn vram_source(&self) -> VramSource {
        self.vram_source
    }

    fn is_process_info(tag: &str, relative: &[String]) -> bool {
        tag == "process_info" && relative.len() == 1 && relative[0] == "processes"
    }

    fn tag_name(e: &BytesStart<'_>) -> String {
        String::from_utf8_lossy(e.name().as_ref()).to_string()
    }

    /// Scans the document and returns the raw values of every `<gpu>`
    fn collect_nodes(xml: &str) -> MonitoringResult<Vec<GpuNode>> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut nodes = Vec::new();
        let mut path: Vec<String> = Vec::new();
        let mut current: Option<(usize, GpuNode)> = None;
        let mut text_buf = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let tag = Self::tag_name(&e);
                    match &mut current {
                        Some((depth, node)) => {
                            if Self::is_process_info(&tag, &path[*depth + 1..]) {
                                node.process_count += 1;
                            }
                        }
                        None => {
                            if tag == "gpu" {
                                current = Some((path.len(), GpuNode::default()));
                            }
                        }
                    }
                    path.push(tag);
                    text_buf.clear();
                }
                Ok(Event::Empty(e)) => {
                    let tag = Self::tag_name(&e);
                    match current.as_mut() {
                        Some((depth, node)) => {
                            if Self::is_process_info(&tag, &path[*depth + 1..]) {
                                node.process_count += 1;
                            }
                        }
                        // A bare `<gpu/>` still counts as a device; its
                        // missing fields are reported by `to_sample`
                        None if tag == "gpu" => nodes.push(GpuNode::default()),
                        None => {}
                    }
                }
                Ok(Event::Text(e)) => {
                    text_buf = String::from_utf8_lossy(&e).to_string();
                }
                Ok(Event::End(_)) => {
                    let closing_depth = path.len().saturating_sub(1);
                    let closes_gpu = current
                        .as_ref()
                        .is_some_and(|(depth, _)| *depth == closing_depth);
                    if closes_gpu {
                        if let Some((_, node)) = current.take() {
                            nodes.push(node);
                        }
                    } else if let Some((depth, node)) = current.as_mut() {
                        let value = text_buf.trim().to_string();
                        let relative: Vec<&str> =
                            path[*depth + 1..].iter().map(String::as_str).collect();
                        match relative.as_slice() {
                            ["utilization", "gpu_util"] => node.gpu_util = Some(value),
                            ["utilization", "memory_util"] => node.memory_util = Some(value),
                            ["fb_memory_usage", "total"] => node.fb_total = Some(value),
                            ["fb_memory_usage", "used"] => node.fb_used = Some(value),
                            _ => {}
                        }
                    }
                    path.pop();
                    text_buf.clear();
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(MonitoringError::ParseError(format!(
                        "invalid GPU query XML at byte {}: {e}",
                        reader.error_position()
                    )));
                }
                _ => {} // Skip Decl, DocType, Comment, CData, PI
            }
        }

        if current.is_some() {
            return Err(MonitoringError::ParseError(
                "unterminated <gpu> element in GPU query output".into(),
            ));
        }

        Ok(nodes)
    }

    /// Converts one node into a sample, validating required fields
    fn to_sample(&self, index: usize, node: &GpuNode) -> MonitoringResult<GpuSample> {
        let gpu_percent = parse_percent(node.gpu_util.as_deref(), "utilization/gpu_util", index)?;

        let vram_percent = match self.vram_source {
            VramSource::FbMemoryUsage => {
                let total = parse_with_unit(
                    required(node.fb_total.as_deref(), "fb_memory_usage/total", index)?,
                    "MiB",
                    "fb_memory_usage/total",
                )?;
                let used = parse_with_unit(
                    required(node.fb_used.as_deref(), "fb_memory_usage/used", index)?,
                    "MiB",
                    "fb_memory_usage/used",
                )?;
                if total == 0 {
                    return Err(MonitoringError::ZeroTotal("VRAM"));
                }
                if used > total {
                    return Err(MonitoringError::ParseError(format!(
                        "GPU {index}: used VRAM {used} MiB exceeds total {total} MiB"
                    )));
                }
                floor_percent(used, total)
            }
            VramSource::ReportedUtilization => {
                parse_percent(node.memory_util.as_deref(), "utilization/memory_util", index)?
            }
        };

        Ok(GpuSample {
            index,
            gpu_percent,
            vram_percent,
            active_process_count: node.process_count,
        })
    }
}

impl CommandParser for GpuQueryParser {
    type Output = Vec<GpuSample>;

    fn command(&self) -> &'static str {
        GPU_QUERY_COMMAND
    }

    /// Empty output means no GPU or no `nvidia-smi`, which is not an error.
    fn parse(&self, stdout: &str) -> MonitoringResult<Vec<GpuSample>> {
        let xml = stdout.trim_start_matches('\u{feff}').trim();
        if xml.is_empty() {
            return Ok(Vec::new());
        }

        Self::collect_nodes(xml)?
            .iter()
            .enumerate()
            .map(|(index, node)| self.to_sample(index, node))
            .collect()
    }
}

fn required<'a>(value: Option<&'a str>, field: &str, index: usize) -> MonitoringResult<&'a str> {
    value.ok_or_else(|| MonitoringError::ParseError(format!("GPU {index}: missing <{field}>")))
}

/// Parses values like `24576 MiB` or `45 %`, stripping the unit suffix
fn parse_with_unit(raw: &str, unit: &str, field: &str) -> MonitoringResult<u64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix(unit).unwrap_or(trimmed).trim();
    number
        .parse()
        .map_err(|_| MonitoringError::ParseError(format!("<{field}> is not a number: {raw:?}")))
}

fn parse_percent(value: Option<&str>, field: &str, index: usize) -> MonitoringResult<u8> {
    let percent = parse_with_unit(required(value, field, index)?, "%", field)?;
    u8::try_from(percent)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| {
            MonitoringError::ParseError(format!("GPU {index}: <{field}> out of range: {percent}"))
        })
}
