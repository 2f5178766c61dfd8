//! Poll command: one status line per requested host

use std::io::Write;

use dtop_core::{AliasTable, FleetPoller, PollSettings, ReportFormatter, SshConnector};

use crate::cli::Cli;
use crate::error::CliError;

/// Polls every host named by `--hosts` and prints the results in order.
///
/// # Errors
///
/// Returns a configuration error when the settings file or SSH config cannot
/// be loaded, and [`CliError::HostsFailed`] when at least one host produced an
/// error line.
pub fn cmd_poll(cli: &Cli) -> Result<(), CliError> {
    let settings = load_settings(cli)?;
    let aliases = AliasTable::load(&cli.ssh_config)?;

    tracing::debug!(
        hosts = cli.hosts.len(),
        concurrency = settings.effective_concurrency(),
        timeout_secs = settings.effective_host_timeout().as_secs(),
        aliases = aliases.len(),
        "Starting poll"
    );

    // ssh reads the same config file the aliases came from
    let connector = SshConnector::new(settings.effective_connect_timeout())
        .with_config_file(aliases.source())
        .with_command_timeout(settings.effective_command_timeout());
    let poller = FleetPoller::new(connector, settings);

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| CliError::Runtime(e.to_string()))?;
    let fleet = runtime.block_on(poller.poll(&aliases, &cli.hosts, &cli.user));

    let mut stdout = std::io::stdout().lock();
    for report in &fleet.reports {
        writeln!(stdout, "{}", ReportFormatter::format(report))?;
    }
    stdout.flush()?;

    tracing::info!("{}", fleet.summary_string());

    if fleet.has_failures() {
        return Err(CliError::HostsFailed {
            failed: fleet.failed,
            total: fleet.total,
        });
    }
    Ok(())
}

/// Reads the settings file and applies command-line overrides on top.
///
/// An explicit `--settings` path must exist; the default location is
/// optional.
fn load_settings(cli: &Cli) -> Result<PollSettings, CliError> {
    let mut settings = match &cli.settings {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "Settings file not found: {}",
                    path.display()
                )));
            }
            PollSettings::load(path)?
        }
        None => match PollSettings::default_path() {
            Some(path) => PollSettings::load(path)?,
            None => PollSettings::default(),
        },
    };
    apply_overrides(&mut settings, cli);
    Ok(settings)
}

fn apply_overrides(settings: &mut PollSettings, cli: &Cli) {
    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(secs) = cli.timeout {
        settings.host_timeout_secs = secs;
    }
    if let Some(secs) = cli.connect_timeout {
        settings.connect_timeout_secs = secs;
    }
    if let Some(secs) = cli.command_timeout {
        settings.command_timeout_secs = Some(secs);
    }
    if let Some(layout) = cli.free_layout {
        settings.free_layout = layout.into();
    }
    if let Some(source) = cli.vram_source {
        settings.vram_source = source.into();
    }
}
