//! Property-based tests for report line formatting

use proptest::prelude::*;

use dtop_core::{CpuMemSample, GpuSample, HostMetrics, HostReport, ReportFormatter};

fn gpu_strategy() -> impl Strategy<Value = (u8, u8, usize)> {
    (0u8..=100, 0u8..=100, 0usize..4)
}

fn metrics(cpu: u8, mem: u8, gpus: &[(u8, u8, usize)]) -> HostMetrics {
    HostMetrics {
        cpu_mem: CpuMemSample::new(cpu, mem),
        gpus: gpus
            .iter()
            .enumerate()
            .map(|(index, (gpu_percent, vram_percent, procs))| GpuSample {
                index,
                gpu_percent: *gpu_percent,
                vram_percent: *vram_percent,
                active_process_count: *procs,
            })
            .collect(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The line starts with the host and has one segment per GPU
    #[test]
    fn prop_line_shape(
        host in "[a-z][a-z0-9-]{0,20}",
        cpu in 0u8..=100,
        mem in 0u8..=100,
        gpus in prop::collection::vec(gpu_strategy(), 0..8),
    ) {
        let report = HostReport::success(host.clone(), metrics(cpu, mem, &gpus), 0);
        let line = ReportFormatter::format(&report);

        let expected_prefix = format!("{host}: CPU{cpu:3}%, RAM{mem:3}%");
        prop_assert!(line.starts_with(&expected_prefix));
        prop_assert_eq!(line.matches(" / GPU").count(), gpus.len());

        if gpus.is_empty() {
            prop_assert_eq!(line, expected_prefix);
        } else {
            let used = gpus.iter().filter(|(_, _, procs)| *procs != 0).count();
            let suffix = format!(" ({used}/{} GPU used)", gpus.len());
            prop_assert!(line.ends_with(&suffix));
        }
    }

    /// Percent fields are always at least three characters wide
    #[test]
    fn prop_fields_are_padded(cpu in 0u8..=100, mem in 0u8..=100) {
        let line = ReportFormatter::format_metrics("h", &CpuMemSample::new(cpu, mem), &[]);
        // "h: CPU" + 3 + "%, RAM" + 3 + "%"
        prop_assert_eq!(line.len(), 6 + 3 + 6 + 3 + 1);
    }

    /// Failed hosts always render as an error line
    #[test]
    fn prop_error_line(host in "[a-z][a-z0-9.-]{0,20}", reason in "[ -~]{1,60}") {
        let report = HostReport::failure(host.clone(), reason.clone(), 0);
        prop_assert_eq!(
            ReportFormatter::format(&report),
            format!("{host}: ERROR — {reason}")
        );
    }
}
