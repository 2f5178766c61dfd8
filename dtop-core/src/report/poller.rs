//! Concurrent, partial-failure tolerant polling of many hosts

use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::Instrument;

use crate::alias::AliasTable;
use crate::config::PollSettings;
use crate::connection::{ConnectionTarget, Connector};
use crate::error::{DtopError, DtopResult};
use crate::monitoring::{HostMetrics, MetricCollector};
use crate::tracing::span_names;

use super::{FleetReport, HostReport};

/// Polls a list of hosts with bounded concurrency.
///
/// Each host runs resolve, connect, collect and release as one pipeline
/// under the per-host timeout. A failing host becomes a failed
/// [`HostReport`] and never affects the others. A finished host frees its
/// slot immediately; reports are put back in the order the hosts were given.
#[derive(Debug)]
pub struct FleetPoller<C> {
    connector: C,
    collector: MetricCollector,
    settings: PollSettings,
}

impl<C: Connector> FleetPoller<C> {
    /// Creates a poller; parser formats are taken from `settings`
    #[must_use]
    pub fn new(connector: C, settings: PollSettings) -> Self {
        Self {
            collector: MetricCollector::new(settings.free_layout, settings.vram_source),
            connector,
            settings,
        }
    }

    /// Connector used to open sessions
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Settings this poller runs with
    #[must_use]
    pub const fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Polls every host and returns one report per entry of `hosts`.
    ///
    /// Duplicate entries are polled independently.
    pub async fn poll(&self, aliases: &AliasTable, hosts: &[String], username: &str) -> FleetReport {
        let concurrency = self.settings.effective_concurrency();
        let span = tracing::info_span!(span_names::FLEET_POLL, hosts = hosts.len(), concurrency);

        async {
            let mut indexed: Vec<(usize, HostReport)> = stream::iter(hosts.iter().enumerate())
                .map(|(index, host)| async move {
                    (index, self.poll_host(aliases, host, username).await)
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            // Completion order is arbitrary; print in the order requested
            indexed.sort_unstable_by_key(|(index, _)| *index);
            let reports = indexed.into_iter().map(|(_, report)| report).collect();

            let fleet = FleetReport::from_reports(reports);
            tracing::info!(
                succeeded = fleet.succeeded,
                failed = fleet.failed,
                "Fleet poll finished"
            );
            fleet
        }
        .instrument(span)
        .await
    }

    /// Polls a single host; never fails, errors end up in the report
    pub async fn poll_host(&self, aliases: &AliasTable, host: &str, username: &str) -> HostReport {
        let started = Instant::now();
        let target = ConnectionTarget::resolve(aliases, host, username);
        let limit = self.settings.effective_host_timeout();
        let span = tracing::info_span!(span_names::HOST_POLL, host, destination = %target);

        let result = async {
            match tokio::time::timeout(limit, self.run_pipeline(&target)).await {
                Ok(result) => result,
                Err(_) => Err(DtopError::HostTimeout(limit.as_secs())),
            }
        }
        .instrument(span.clone())
        .await;

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let _enter = span.enter();
        match result {
            Ok(metrics) => {
                tracing::info!(duration_ms = elapsed_ms, "Host poll succeeded");
                HostReport::success(host, metrics, elapsed_ms)
            }
            Err(e) => {
                tracing::warn!(duration_ms = elapsed_ms, error = %e, "Host poll failed");
                HostReport::failure(host, e.to_string(), elapsed_ms)
            }
        }
    }

    /// Open, collect, close. A timeout that cancels this future drops the
    /// session, which releases it as well.
    async fn run_pipeline(&self, target: &ConnectionTarget) -> DtopResult<HostMetrics> {
        let mut session = self.connector.open(target).await?;
        let result = self.collector.collect(session.as_ref()).await;
        session.close().await;
        tracing::debug!("Session released");
        result
    }
}
