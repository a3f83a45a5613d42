use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::config::{DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
use crate::feishu::Notifier;
use crate::kubernetes::{QuotaChecker, ResourceLister};
use crate::reconciler::Reconciler;
use crate::report::ReportSummary;
use crate::types::Config;

/// Loop behaviour that does not touch the reconcile decisions.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub fail_on_list_error: bool,
    pub send_empty_reports: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            fail_on_list_error: true,
            send_empty_reports: true,
        }
    }
}

impl From<&Config> for LoopSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            request_timeout: cfg.request_timeout,
            fail_on_list_error: cfg.fail_on_list_error,
            send_empty_reports: cfg.send_empty_reports,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// When the reconcile pass produced its report.
    pub generated_at: DateTime<Utc>,
    pub observed: usize,
    pub summary: ReportSummary,
    /// A message was handed to the notifier.
    pub sent: bool,
    pub delivered: bool,
}

pub struct Monitor<L, Q, N> {
    lister: L,
    quota: Q,
    notifier: N,
    reconciler: Reconciler,
    settings: LoopSettings,
}

impl<L, Q, N> Monitor<L, Q, N>
where
    L: ResourceLister,
    Q: QuotaChecker,
    N: Notifier,
{
    pub fn new(
        lister: L,
        quota: Q,
        notifier: N,
        reconciler: Reconciler,
        settings: LoopSettings,
    ) -> Self {
        Self {
            lister,
            quota,
            notifier,
            reconciler,
            settings,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// List, reconcile and notify once. Only a list failure is returned as an error.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let timeout = self.settings.request_timeout;
        let observations = tokio::time::timeout(timeout, self.lister.list_databases())
            .await
            .map_err(|_| anyhow!("Listing databases timed out after {:?}", timeout))??;

        let report = self.reconciler.reconcile(&observations, &self.quota).await;

        let mut outcome = CycleOutcome {
            generated_at: report.generated_at,
            observed: observations.len(),
            summary: report.summary.clone(),
            sent: false,
            delivered: false,
        };

        if !report.summary.has_issues() && !self.settings.send_empty_reports {
            info!("No abnormal databases, skipping notification");
            return Ok(outcome);
        }

        outcome.sent = true;
        let message = report.render();
        match tokio::time::timeout(timeout, self.notifier.notify(&message)).await {
            Ok(Ok(())) => {
                info!(rows = report.rows.len(), "Notification sent successfully");
                outcome.delivered = true;
            }
            Ok(Err(e)) => error!("Error sending notification: {:#}", e),
            Err(_) => error!("Error sending notification: timed out after {:?}", timeout),
        }
        Ok(outcome)
    }

    /// Poll forever. Returns only when a list failure is configured to be fatal.
    pub async fn run(mut self) -> Result<()> {
        info!(
            interval = ?self.settings.poll_interval,
            timeout = ?self.settings.request_timeout,
            "Starting database monitor"
        );
        loop {
            match self.run_cycle().await {
                Ok(outcome) => info!(
                    at = %outcome.generated_at.to_rfc3339(),
                    observed = outcome.observed,
                    reported = outcome.summary.reported,
                    pending = outcome.summary.grace_period,
                    suppressed = outcome.summary.debt_suppressed,
                    skipped = outcome.summary.skipped,
                    tracked = self.reconciler.tracked(),
                    flagged = self.reconciler.flagged_namespaces(),
                    "Poll cycle complete"
                ),
                Err(e) if self.settings.fail_on_list_error => return Err(e),
                Err(e) => error!("Poll cycle failed, retrying next cycle: {:#}", e),
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}
