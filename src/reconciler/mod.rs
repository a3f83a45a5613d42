use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::kubernetes::QuotaChecker;
use crate::parsing::{is_failed_phase, is_terminal_phase};
use crate::report::StatusReport;
use crate::types::{DatabaseObservation, DebtSuppression, QuotaStatus};

/// What the reconciler decided for a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Status could not be read; nothing touched.
    Skipped,
    /// Healthy phase; any recorded abnormality cleared.
    Resolved,
    /// First abnormal sighting; recorded, not reported.
    GracePeriod,
    /// Reported and the recorded phase refreshed.
    Reported,
    /// `Failed` outside any debt namespace; reported, recorded phase left as is.
    ReportedUnrecorded,
    /// Quota marker found; namespace flagged and the record cleared.
    DebtConfirmed,
    /// Abnormal in an already flagged namespace under sticky suppression.
    DebtSuppressed,
}

impl Verdict {
    pub fn is_reported(self) -> bool {
        matches!(self, Verdict::Reported | Verdict::ReportedUnrecorded)
    }
}

/// Tracks persistent abnormal phases across poll cycles.
///
/// `last_status` is keyed by database name and `debt_record` by namespace.
/// Both live for the lifetime of the process and are only touched from
/// [`Reconciler::reconcile`], one observation at a time.
#[derive(Debug, Default)]
pub struct Reconciler {
    last_status: HashMap<String, String>,
    debt_record: HashMap<String, bool>,
    suppression: DebtSuppression,
}

impl Reconciler {
    pub fn new(suppression: DebtSuppression) -> Self {
        Self {
            last_status: HashMap::new(),
            debt_record: HashMap::new(),
            suppression,
        }
    }

    pub fn last_status(&self, name: &str) -> Option<&str> {
        self.last_status.get(name).map(String::as_str)
    }

    pub fn is_in_debt(&self, namespace: &str) -> bool {
        self.debt_record.get(namespace).copied().unwrap_or(false)
    }

    pub fn tracked(&self) -> usize {
        self.last_status.len()
    }

    pub fn flagged_namespaces(&self) -> usize {
        self.debt_record.values().filter(|v| **v).count()
    }

    /// Run one pass over `observations` in order and collect the rows to report.
    pub async fn reconcile<Q>(
        &mut self,
        observations: &[DatabaseObservation],
        quota: &Q,
    ) -> StatusReport
    where
        Q: QuotaChecker + ?Sized,
    {
        let mut report = StatusReport::new();
        for obs in observations {
            let verdict = self.observe(obs, quota).await;
            if verdict.is_reported() {
                if let Ok(phase) = &obs.phase {
                    report.add_row(&obs.name, phase, &obs.namespace);
                }
            }
            report.record(verdict);
        }
        report
    }

    pub async fn observe<Q>(&mut self, obs: &DatabaseObservation, quota: &Q) -> Verdict
    where
        Q: QuotaChecker + ?Sized,
    {
        let phase = match &obs.phase {
            Ok(phase) => phase,
            Err(e) => {
                warn!(name = %obs.name, namespace = %obs.namespace, "Unable to get status: {}", e);
                return Verdict::Skipped;
            }
        };

        if is_terminal_phase(phase) {
            if self.last_status.remove(&obs.name).is_some() {
                info!(name = %obs.name, namespace = %obs.namespace, phase = %phase,
                    "Database recovered");
            }
            return Verdict::Resolved;
        }

        if !self.last_status.contains_key(&obs.name) {
            debug!(name = %obs.name, namespace = %obs.namespace, phase = %phase,
                "First abnormal observation");
            self.last_status.insert(obs.name.clone(), phase.clone());
            return Verdict::GracePeriod;
        }

        let in_debt = self.is_in_debt(&obs.namespace);

        if is_failed_phase(phase) && !in_debt {
            match quota.check_quota(&obs.namespace).await {
                QuotaStatus::HasMarker => {
                    info!(name = %obs.name, namespace = %obs.namespace,
                        "Namespace is in debt, suppressing");
                    self.debt_record.insert(obs.namespace.clone(), true);
                    self.last_status.remove(&obs.name);
                    return Verdict::DebtConfirmed;
                }
                QuotaStatus::NoMarker => {}
                // A failed lookup cannot confirm debt, so the database is reported.
                QuotaStatus::LookupFailed(reason) => {
                    warn!(namespace = %obs.namespace, "Error getting ResourceQuota: {}", reason);
                }
            }
            return Verdict::ReportedUnrecorded;
        }

        if in_debt && self.suppression == DebtSuppression::Sticky {
            debug!(name = %obs.name, namespace = %obs.namespace, phase = %phase,
                "Suppressed in debt namespace");
            self.last_status.insert(obs.name.clone(), phase.clone());
            return Verdict::DebtSuppressed;
        }

        self.last_status.insert(obs.name.clone(), phase.clone());
        Verdict::Reported
    }
}
