use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::parsing::PhaseError;

#[derive(Debug, Clone)]
pub struct Config {
    pub webhook_url: String,
    pub kubeconfig_path: PathBuf,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub fail_on_list_error: bool,
    pub send_empty_reports: bool,
    pub debt_suppression: DebtSuppression,
}

/// How a namespace flagged as in debt affects later reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebtSuppression {
    /// Only the transition that confirmed the debt is suppressed. Later
    /// `Failed` observations in the namespace skip the quota check and are
    /// reported again.
    #[default]
    FirstTransition,
    /// Every abnormal observation in a flagged namespace is suppressed.
    Sticky,
}

impl FromStr for DebtSuppression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first-transition" | "first_transition" => Ok(DebtSuppression::FirstTransition),
            "sticky" => Ok(DebtSuppression::Sticky),
            other => Err(anyhow!("unknown debt suppression mode '{}'", other)),
        }
    }
}

impl fmt::Display for DebtSuppression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebtSuppression::FirstTransition => f.write_str("first-transition"),
            DebtSuppression::Sticky => f.write_str("sticky"),
        }
    }
}

/// One managed database as seen in a single poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseObservation {
    pub name: String,
    pub namespace: String,
    pub phase: Result<String, PhaseError>,
}

impl DatabaseObservation {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            phase: Ok(phase.into()),
        }
    }

    pub fn unreadable(
        name: impl Into<String>,
        namespace: impl Into<String>,
        err: PhaseError,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            phase: Err(err),
        }
    }
}

/// Result of looking up the debt quota marker in a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaStatus {
    HasMarker,
    NoMarker,
    LookupFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub name: String,
    pub status: String,
    pub namespace: String,
}

#[derive(Debug, Serialize)]
pub struct FeishuContent {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct FeishuMessage {
    pub msg_type: String,
    pub content: FeishuContent,
}
