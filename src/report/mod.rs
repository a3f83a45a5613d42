use chrono::{DateTime, Utc};

use crate::reconciler::Verdict;
use crate::types::ReportRow;

const COLUMN_WIDTH: usize = 50;

/// Aggregated outcome of one reconcile pass
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
    pub summary: ReportSummary,
}

impl StatusReport {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            rows: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    pub fn add_row(&mut self, name: &str, status: &str, namespace: &str) {
        self.rows.push(ReportRow {
            name: name.to_string(),
            status: status.to_string(),
            namespace: namespace.to_string(),
        });
    }

    pub fn record(&mut self, verdict: Verdict) {
        self.summary.record(verdict);
    }

    /// Render the fixed-width table: a header line then one line per row.
    pub fn render(&self) -> String {
        let mut out = format_row("DatabaseName", "Status", "Namespace");
        for row in &self.rows {
            out.push_str(&format_row(&row.name, &row.status, &row.namespace));
        }
        out
    }
}

impl Default for StatusReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_row(name: &str, status: &str, namespace: &str) -> String {
    format!(
        "{:<w$} {:<w$} {:<w$}\n",
        name,
        status,
        namespace,
        w = COLUMN_WIDTH
    )
}

/// Per-verdict counts for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub reported: usize,
    pub grace_period: usize,
    pub resolved: usize,
    pub debt_suppressed: usize,
    pub skipped: usize,
}

impl ReportSummary {
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Reported | Verdict::ReportedUnrecorded => self.reported += 1,
            Verdict::GracePeriod => self.grace_period += 1,
            Verdict::Resolved => self.resolved += 1,
            Verdict::DebtConfirmed | Verdict::DebtSuppressed => self.debt_suppressed += 1,
            Verdict::Skipped => self.skipped += 1,
        }
    }

    pub fn total_observed(&self) -> usize {
        self.reported + self.grace_period + self.resolved + self.debt_suppressed + self.skipped
    }

    pub fn has_issues(&self) -> bool {
        self.reported > 0
    }
}
