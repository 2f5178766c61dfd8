//! Integration tests for concurrent fleet polling
//!
//! Every test runs the full resolve, connect, collect, release pipeline
//! against a `ScriptedConnector`.

use std::time::Duration;

use dtop_core::monitoring::{FREE_COMMAND, GPU_QUERY_COMMAND, VMSTAT_COMMAND};
use dtop_core::{
    AliasTable, ConnectionError, FleetPoller, PollSettings, ReportFormatter, ScriptedConnector,
    ScriptedHost,
};

/// `vmstat` output with the given idle percentage
fn vmstat(idle: u8) -> String {
    format!(
        "procs -----------memory---------- ---swap-- -----io---- -system-- ------cpu-----\n \
         r  b   swpd   free   buff  cache   si   so    bi    bo   in   cs us sy id wa st\n \
         1  0      0 7012345 123456 2345678    0    0     3    11   52   97  1  1 {idle}  0  0\n"
    )
}

/// Legacy `free` output with a `-/+ buffers/cache` row
fn free(total: u64, used: u64) -> String {
    format!(
        "             total       used       free     shared    buffers     cached\n\
         Mem:      {total}    {total}          0          0          0          0\n\
         -/+ buffers/cache:    {used}    0\n\
         Swap:            0          0          0\n"
    )
}

const TWO_GPU_XML: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE nvidia_smi_log SYSTEM "nvsmi_device_v12.dtd">
<nvidia_smi_log>
    <driver_version>550.54.14</driver_version>
    <attached_gpus>2</attached_gpus>
    <gpu id="00000000:3B:00.0">
        <product_name>NVIDIA A100-PCIE-40GB</product_name>
        <fb_memory_usage>
            <total>40960 MiB</total>
            <reserved>0 MiB</reserved>
            <used>4096 MiB</used>
            <free>36864 MiB</free>
        </fb_memory_usage>
        <utilization>
            <gpu_util>55 %</gpu_util>
            <memory_util>12 %</memory_util>
        </utilization>
        <processes>
            <process_info>
                <pid>4242</pid>
                <type>C</type>
                <process_name>python</process_name>
                <used_memory>4000 MiB</used_memory>
            </process_info>
        </processes>
    </gpu>
    <gpu id="00000000:AF:00.0">
        <product_name>NVIDIA A100-PCIE-40GB</product_name>
        <fb_memory_usage>
            <total>40960 MiB</total>
            <reserved>0 MiB</reserved>
            <used>2048 MiB</used>
            <free>38912 MiB</free>
        </fb_memory_usage>
        <utilization>
            <gpu_util>0 %</gpu_util>
            <memory_util>0 %</memory_util>
        </utilization>
        <processes>
        </processes>
    </gpu>
</nvidia_smi_log>
"#;

fn cpu_host(idle: u8, mem_used: u64) -> ScriptedHost {
    ScriptedHost::new()
        .with_output(VMSTAT_COMMAND, vmstat(idle))
        .with_output(FREE_COMMAND, free(1000, mem_used))
        // No nvidia-smi installed
        .with_exit_status(GPU_QUERY_COMMAND, "", 127)
}

fn hosts(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

fn refused(host: &str) -> ConnectionError {
    ConnectionError::Unreachable {
        host: host.to_string(),
        reason: "Connection refused".to_string(),
    }
}

#[tokio::test]
async fn test_five_hosts_third_fails_keeps_order() {
    let connector = ScriptedConnector::new()
        .with_host("h1", cpu_host(90, 100))
        .with_host("h2", cpu_host(80, 200))
        .with_host("h3", ScriptedHost::new().with_connect_error(refused("h3")))
        .with_host("h4", cpu_host(60, 400))
        .with_host("h5", cpu_host(50, 500));
    let poller = FleetPoller::new(connector, PollSettings::default());

    let requested = hosts(&["h1", "h2", "h3", "h4", "h5"]);
    let fleet = poller.poll(&AliasTable::new(), &requested, "ml").await;

    assert_eq!(fleet.total, 5);
    assert_eq!(fleet.succeeded, 4);
    assert_eq!(fleet.failed, 1);

    let order: Vec<&str> = fleet.reports.iter().map(|r| r.host.as_str()).collect();
    assert_eq!(order, ["h1", "h2", "h3", "h4", "h5"]);

    assert!(!fleet.reports[2].is_success());
    assert_eq!(
        fleet.reports[2].error.as_deref(),
        Some("Host h3 unreachable: Connection refused")
    );
    for (i, report) in fleet.reports.iter().enumerate().filter(|(i, _)| *i != 2) {
        assert!(report.is_success(), "host {i} should succeed");
        assert!(report.gpus.is_empty());
    }

    assert_eq!(
        ReportFormatter::format(&fleet.reports[0]),
        "h1: CPU 10%, RAM 10%"
    );
    assert_eq!(
        ReportFormatter::format(&fleet.reports[2]),
        "h3: ERROR — Host h3 unreachable: Connection refused"
    );

    // h3 never opened a session; the other four were all released
    assert_eq!(poller.connector().opened(), 4);
    assert_eq!(poller.connector().released(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_output_order_ignores_completion_order() {
    let connector = ScriptedConnector::new()
        .with_host(
            "slow",
            cpu_host(10, 100).with_connect_latency(Duration::from_secs(3)),
        )
        .with_host(
            "medium",
            cpu_host(20, 100).with_command_latency(Duration::from_millis(500)),
        )
        .with_host("fast", cpu_host(30, 100));
    let poller = FleetPoller::new(connector, PollSettings::default());

    let requested = hosts(&["slow", "medium", "fast"]);
    let fleet = poller.poll(&AliasTable::new(), &requested, "ml").await;

    let order: Vec<&str> = fleet.reports.iter().map(|r| r.host.as_str()).collect();
    assert_eq!(order, ["slow", "medium", "fast"]);
    assert!(fleet.all_succeeded());
    assert!(fleet.reports[0].elapsed_ms >= fleet.reports[2].elapsed_ms);
}

#[tokio::test(start_paused = true)]
async fn test_hosts_run_concurrently() {
    let mut connector = ScriptedConnector::new();
    let names: Vec<String> = (0..8).map(|i| format!("node{i}")).collect();
    for name in &names {
        connector = connector.with_host(
            name.as_str(),
            cpu_host(50, 500).with_connect_latency(Duration::from_secs(10)),
        );
    }
    let settings = PollSettings {
        concurrency: 8,
        host_timeout_secs: 15,
        ..PollSettings::default()
    };
    let poller = FleetPoller::new(connector, settings);

    let started = tokio::time::Instant::now();
    let fleet = poller.poll(&AliasTable::new(), &names, "ml").await;

    // Sequential polling would need 80 s and blow through the host timeout
    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(fleet.all_succeeded());
}

#[tokio::test(start_paused = true)]
async fn test_per_host_timeout_only_fails_that_host() {
    let connector = ScriptedConnector::new()
        .with_host("ok", cpu_host(75, 250))
        .with_host(
            "hung",
            cpu_host(75, 250).with_command_latency(Duration::from_secs(3600)),
        );
    let settings = PollSettings {
        host_timeout_secs: 2,
        ..PollSettings::default()
    };
    let poller = FleetPoller::new(connector, settings);

    let fleet = poller
        .poll(&AliasTable::new(), &hosts(&["hung", "ok"]), "ml")
        .await;

    assert_eq!(
        fleet.reports[0].error.as_deref(),
        Some("Host poll timed out after 2 seconds")
    );
    assert!(fleet.reports[1].is_success());

    // The abandoned session was dropped and therefore released
    assert_eq!(poller.connector().opened(), 2);
    assert_eq!(poller.connector().open_sessions(), 0);
}

#[tokio::test]
async fn test_parse_failure_releases_session() {
    let connector = ScriptedConnector::new().with_host(
        "broken",
        ScriptedHost::new()
            .with_output(VMSTAT_COMMAND, "vmstat: command not found\n")
            .with_output(FREE_COMMAND, free(1000, 10)),
    );
    let poller = FleetPoller::new(connector, PollSettings::default());

    let report = poller.poll_host(&AliasTable::new(), "broken", "ml").await;

    let error = report.error.unwrap_or_default();
    assert!(error.starts_with("Failed to parse monitoring output"), "{error}");
    assert_eq!(poller.connector().opened(), 1);
    assert_eq!(poller.connector().released(), 1);
}

#[tokio::test]
async fn test_gpu_host_line() {
    let connector = ScriptedConnector::new().with_host(
        "gpu1",
        ScriptedHost::new()
            .with_output(VMSTAT_COMMAND, vmstat(93))
            .with_output(FREE_COMMAND, free(1000, 420))
            .with_output(GPU_QUERY_COMMAND, TWO_GPU_XML),
    );
    let poller = FleetPoller::new(connector, PollSettings::default());

    let fleet = poller.poll(&AliasTable::new(), &hosts(&["gpu1"]), "ml").await;

    assert_eq!(
        ReportFormatter::format(&fleet.reports[0]),
        "gpu1: CPU  7%, RAM 42% / GPU0: 55%, VRAM 10% / GPU1:  0%, VRAM  5% (1/2 GPU used)"
    );
}

#[tokio::test]
async fn test_duplicate_hosts_polled_independently() {
    let connector = ScriptedConnector::new().with_host("dup", cpu_host(40, 300));
    let poller = FleetPoller::new(connector, PollSettings::default());

    let fleet = poller
        .poll(&AliasTable::new(), &hosts(&["dup", "dup"]), "ml")
        .await;

    assert_eq!(fleet.total, 2);
    assert!(fleet.all_succeeded());
    assert_eq!(poller.connector().opened(), 2);
    assert_eq!(poller.connector().released(), 2);
}

#[tokio::test]
async fn test_empty_host_list() {
    let poller = FleetPoller::new(ScriptedConnector::new(), PollSettings::default());
    let fleet = poller.poll(&AliasTable::new(), &[], "ml").await;
    assert_eq!(fleet.total, 0);
    assert!(fleet.all_succeeded());
}

#[tokio::test]
async fn test_aliases_route_to_real_hostname() {
    let aliases = AliasTable::parse(
        "Host trainer-*\n    HostName %h.cluster.internal\n    User svc\n",
    )
    .unwrap();
    let connector = ScriptedConnector::new()
        .with_host("trainer-1.cluster.internal", cpu_host(0, 1000))
        .with_host("trainer-2.cluster.internal", cpu_host(100, 0));
    let poller = FleetPoller::new(connector, PollSettings::default());

    let fleet = poller
        .poll(&aliases, &hosts(&["trainer-1", "trainer-2"]), "ml")
        .await;

    assert!(fleet.all_succeeded());
    assert_eq!(
        ReportFormatter::format(&fleet.reports[0]),
        "trainer-1: CPU100%, RAM100%"
    );
    assert_eq!(
        ReportFormatter::format(&fleet.reports[1]),
        "trainer-2: CPU  0%, RAM  0%"
    );
}
