// Public modules
pub mod types;
pub mod config;
pub mod parsing;
pub mod feishu;
pub mod kubernetes;
pub mod reconciler;
pub mod report;
pub mod monitor;

// Re-export commonly used items
pub use types::*;
pub use config::{
    load_config, load_config_with_env, EnvironmentProvider, MockEnvironment, SystemEnvironment,
};
pub use parsing::{extract_phase, is_failed_phase, is_terminal_phase, PhaseError};
pub use feishu::{build_feishu_payload, send_to_feishu, Notifier, WebhookNotifier};
pub use kubernetes::{
    connect, ensure_cluster_reachable, ClusterLister, ClusterQuotaChecker, QuotaChecker,
    ResourceLister,
};
pub use reconciler::{Reconciler, Verdict};
pub use report::{ReportSummary, StatusReport};
pub use monitor::{CycleOutcome, LoopSettings, Monitor};
