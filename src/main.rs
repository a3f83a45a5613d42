use anyhow::Result;
use tracing::info;

use kube_database_monitor::config::load_config;
use kube_database_monitor::feishu::WebhookNotifier;
use kube_database_monitor::kubernetes::{
    connect, ensure_cluster_reachable, ClusterLister, ClusterQuotaChecker,
};
use kube_database_monitor::monitor::{LoopSettings, Monitor};
use kube_database_monitor::reconciler::Reconciler;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = load_config()?;
    info!(
        "kubeconfig = {}, debt suppression = {}",
        cfg.kubeconfig_path.display(),
        cfg.debt_suppression
    );

    // Fail fast if the cluster cannot be reached
    let client = connect(&cfg.kubeconfig_path).await?;
    ensure_cluster_reachable(&client, cfg.request_timeout).await?;

    let lister = ClusterLister::new(client.clone());
    let quota = ClusterQuotaChecker::new(client, cfg.request_timeout);
    let notifier = WebhookNotifier::new(cfg.webhook_url.clone(), cfg.request_timeout)?;
    let reconciler = Reconciler::new(cfg.debt_suppression);

    Monitor::new(lister, quota, notifier, reconciler, LoopSettings::from(&cfg))
        .run()
        .await
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
