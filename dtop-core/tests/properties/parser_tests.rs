//! Property-based tests for the command output parsers

use proptest::prelude::*;

use dtop_core::monitoring::{
    CommandParser, FreeLayout, FreeParser, GpuQueryParser, MemoryUsage, MonitoringError,
    VmstatParser, VramSource,
};

fn vmstat_output(idle: u32) -> String {
    format!(
        "procs -----------memory---------- ---swap-- -----io---- -system-- ------cpu-----\n \
         r  b   swpd   free   buff  cache   si   so    bi    bo   in   cs us sy id wa st\n \
         0  0      0 812344  10232 402312    0    0     1     2   30   40  4  3 {idle}  0  0\n"
    )
}

fn free_output(total: u64, mem_used: u64, bc_used: u64) -> String {
    format!(
        "             total       used       free\n\
         Mem:  {total} {mem_used} 0\n\
         -/+ buffers/cache: {bc_used} 0\n"
    )
}

/// XML report with one `<gpu>` per entry of `gpus` (util, used MiB, total MiB, processes)
fn gpu_xml(gpus: &[(u8, u64, u64, usize)]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" ?>\n<nvidia_smi_log>\n");
    for (util, used, total, procs) in gpus {
        xml.push_str("<gpu id=\"x\">\n");
        xml.push_str(&format!(
            "<fb_memory_usage><total>{total} MiB</total><used>{used} MiB</used></fb_memory_usage>\n"
        ));
        xml.push_str(&format!(
            "<utilization><gpu_util>{util} %</gpu_util><memory_util>{util} %</memory_util></utilization>\n"
        ));
        xml.push_str("<processes>");
        for pid in 0..*procs {
            xml.push_str(&format!("<process_info><pid>{pid}</pid></process_info>"));
        }
        xml.push_str("</processes>\n</gpu>\n");
    }
    xml.push_str("</nvidia_smi_log>\n");
    xml
}

fn gpu_strategy() -> impl Strategy<Value = (u8, u64, u64, usize)> {
    (0u8..=100, 1u64..=81_920, 0usize..5)
        .prop_flat_map(|(util, total, procs)| (Just(util), 0..=total, Just(total), Just(procs)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// CPU usage is the complement of the idle column
    #[test]
    fn prop_vmstat_cpu_is_complement_of_idle(idle in 0u32..=100) {
        let cpu = VmstatParser.parse(&vmstat_output(idle)).unwrap();
        prop_assert_eq!(u32::from(cpu), 100 - idle);
    }

    /// Idle values above 100 are rejected, never wrapped
    #[test]
    fn prop_vmstat_rejects_idle_over_100(idle in 101u32..100_000) {
        let err = VmstatParser.parse(&vmstat_output(idle)).unwrap_err();
        prop_assert!(matches!(err, MonitoringError::ParseError(_)));
    }

    /// Truncated vmstat output is a parse error, not a panic
    #[test]
    fn prop_vmstat_truncated_output(lines in 0usize..3) {
        let output: String = vmstat_output(50).lines().take(lines).map(|l| format!("{l}\n")).collect();
        prop_assert!(VmstatParser.parse(&output).is_err());
    }

    /// Memory percentage is floor(100 * used / total) and stays in 0..=100
    #[test]
    fn prop_memory_percent_bounds(total in 1u64..=u64::MAX / 2, ratio in 0.0f64..=1.0) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let used = ((total as f64) * ratio) as u64;
        let used = used.min(total);
        let percent = MemoryUsage { total, used }.percent().unwrap();
        prop_assert!(percent <= 100);
        let expected = u128::from(used) * 100 / u128::from(total);
        prop_assert_eq!(u128::from(percent), expected);
    }

    /// Used above total is an error
    #[test]
    fn prop_memory_used_over_total(total in 1u64..1_000_000, extra in 1u64..1_000) {
        let usage = MemoryUsage { total, used: total + extra };
        prop_assert!(matches!(usage.percent(), Err(MonitoringError::ParseError(_))));
    }

    /// Each layout reads its own used column
    #[test]
    fn prop_free_layouts_read_their_column(
        total in 1u64..10_000_000,
        mem_pct in 0u64..=100,
        bc_pct in 0u64..=100,
    ) {
        let mem_used = total * mem_pct / 100;
        let bc_used = total * bc_pct / 100;
        let output = free_output(total, mem_used, bc_used);

        let legacy = FreeParser::new(FreeLayout::BuffersCache).parse(&output).unwrap();
        prop_assert_eq!(legacy, MemoryUsage { total, used: bc_used });

        let modern = FreeParser::new(FreeLayout::MemRow).parse(&output).unwrap();
        prop_assert_eq!(modern, MemoryUsage { total, used: mem_used });
    }

    /// One sample per <gpu>, indexed 0..n in document order
    #[test]
    fn prop_gpu_count_and_indices(gpus in prop::collection::vec(gpu_strategy(), 0..6)) {
        let samples = GpuQueryParser::default().parse(&gpu_xml(&gpus)).unwrap();
        prop_assert_eq!(samples.len(), gpus.len());

        for (i, (sample, (util, used, total, procs))) in samples.iter().zip(&gpus).enumerate() {
            prop_assert_eq!(sample.index, i);
            prop_assert_eq!(sample.gpu_percent, *util);
            prop_assert_eq!(u64::from(sample.vram_percent), used * 100 / total);
            prop_assert_eq!(sample.active_process_count, *procs);
        }
    }

    /// The reported source never looks at the framebuffer numbers
    #[test]
    fn prop_reported_vram_source(gpus in prop::collection::vec(gpu_strategy(), 1..4)) {
        let samples = GpuQueryParser::new(VramSource::ReportedUtilization)
            .parse(&gpu_xml(&gpus))
            .unwrap();
        for (sample, (util, ..)) in samples.iter().zip(&gpus) {
            prop_assert_eq!(sample.vram_percent, *util);
        }
    }

    /// Arbitrary text never panics the GPU parser
    #[test]
    fn prop_gpu_parser_never_panics(input in "\\PC{0,200}") {
        let _ = GpuQueryParser::default().parse(&input);
    }
}

#[test]
fn test_zero_vram_total_is_distinct_error() {
    let err = GpuQueryParser::default()
        .parse(&gpu_xml(&[(10, 0, 0, 0)]))
        .unwrap_err();
    assert_eq!(err, MonitoringError::ZeroTotal("VRAM"));
}
