use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::parsing::{parse_bool_flag, parse_seconds};
use crate::types::{Config, DebtSuppression};

pub const DEFAULT_KUBECONFIG_PATH: &str = "config/kubeconfig";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let webhook_url = env
        .get_var("FEISHU_WEBHOOK_URL")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("FEISHU_WEBHOOK_URL must be provided via Secret env"))?;

    let kubeconfig_path = env
        .get_var("KUBECONFIG_PATH")
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_KUBECONFIG_PATH));

    let poll_interval = duration_var(env, "POLL_INTERVAL_SECONDS", DEFAULT_POLL_INTERVAL)?;
    let request_timeout = duration_var(env, "REQUEST_TIMEOUT_SECONDS", DEFAULT_REQUEST_TIMEOUT)?;

    let fail_on_list_error = env
        .get_var("FAIL_ON_LIST_ERROR")
        .map(|v| parse_bool_flag(&v))
        .unwrap_or(true);

    let send_empty_reports = env
        .get_var("SEND_EMPTY_REPORTS")
        .map(|v| parse_bool_flag(&v))
        .unwrap_or(true);

    let debt_suppression = match env.get_var("DEBT_SUPPRESSION") {
        Some(v) => v.parse::<DebtSuppression>().context("Invalid DEBT_SUPPRESSION")?,
        None => DebtSuppression::default(),
    };

    Ok(Config {
        webhook_url,
        kubeconfig_path,
        poll_interval,
        request_timeout,
        fail_on_list_error,
        send_empty_reports,
        debt_suppression,
    })
}

fn duration_var<E: EnvironmentProvider>(env: &E, key: &str, default: Duration) -> Result<Duration> {
    match env.get_var(key) {
        Some(v) => parse_seconds(&v).ok_or_else(|| {
            anyhow!("Invalid {}: expected a positive number of seconds, got '{}'", key, v)
        }),
        None => Ok(default),
    }
}
