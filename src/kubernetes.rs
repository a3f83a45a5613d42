use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ResourceQuota;
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::GroupVersionKind;
use kube::Client;
use tracing::{debug, warn};

use crate::parsing::extract_phase;
use crate::types::{DatabaseObservation, QuotaStatus};

pub const DATABASE_GROUP: &str = "apps.kubeblocks.io";
pub const DATABASE_VERSION: &str = "v1alpha1";
pub const DATABASE_KIND: &str = "Cluster";
pub const DATABASE_PLURAL: &str = "clusters";

/// ResourceQuota whose presence marks a namespace as suspended for billing.
pub const DEBT_QUOTA_NAME: &str = "debt-limit0";

/// Lists every managed database in the cluster.
#[async_trait]
pub trait ResourceLister: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<DatabaseObservation>>;
}

/// Reports whether a namespace carries the debt quota marker.
#[async_trait]
pub trait QuotaChecker: Send + Sync {
    async fn check_quota(&self, namespace: &str) -> QuotaStatus;
}

pub fn database_api_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(DATABASE_GROUP, DATABASE_VERSION, DATABASE_KIND);
    ApiResource::from_gvk_with_plural(&gvk, DATABASE_PLURAL)
}

/// Build a client from the kubeconfig file at `path`.
pub async fn connect(path: &Path) -> Result<Client> {
    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("Invalid kubeconfig")?;
    Client::try_from(config).context("Failed to build Kubernetes client")
}

pub async fn ensure_cluster_reachable(client: &Client, timeout: Duration) -> Result<()> {
    let version = tokio::time::timeout(timeout, client.apiserver_version())
        .await
        .map_err(|_| anyhow!("Kubernetes API server did not answer within {:?}", timeout))?
        .context("Kubernetes API server unreachable")?;
    debug!("Connected to Kubernetes {}", version.git_version);
    Ok(())
}

/// Convert a listed object into an observation. Objects without a name are dropped.
pub fn observation_from_object(obj: &DynamicObject) -> Option<DatabaseObservation> {
    let name = obj.metadata.name.clone()?;
    let namespace = obj.metadata.namespace.clone().unwrap_or_default();
    Some(DatabaseObservation {
        name,
        namespace,
        phase: extract_phase(&obj.data),
    })
}

pub struct ClusterLister {
    client: Client,
    resource: ApiResource,
}

impl ClusterLister {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resource: database_api_resource(),
        }
    }
}

#[async_trait]
impl ResourceLister for ClusterLister {
    async fn list_databases(&self) -> Result<Vec<DatabaseObservation>> {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &self.resource);
        let list = api
            .list(&ListParams::default())
            .await
            .with_context(|| {
                format!("Failed to list {}.{}", DATABASE_PLURAL, DATABASE_GROUP)
            })?;
        let mut observations = Vec::with_capacity(list.items.len());
        for obj in &list.items {
            match observation_from_object(obj) {
                Some(obs) => observations.push(obs),
                None => warn!("Skipping {} without a name", DATABASE_KIND),
            }
        }
        debug!(count = observations.len(), "Listed databases");
        Ok(observations)
    }
}

pub struct ClusterQuotaChecker {
    client: Client,
    timeout: Duration,
}

impl ClusterQuotaChecker {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl QuotaChecker for ClusterQuotaChecker {
    async fn check_quota(&self, namespace: &str) -> QuotaStatus {
        let api: Api<ResourceQuota> = Api::namespaced(self.client.clone(), namespace);
        match tokio::time::timeout(self.timeout, api.get_opt(DEBT_QUOTA_NAME)).await {
            Ok(Ok(Some(_))) => QuotaStatus::HasMarker,
            Ok(Ok(None)) => QuotaStatus::NoMarker,
            Ok(Err(e)) => QuotaStatus::LookupFailed(e.to_string()),
            Err(_) => QuotaStatus::LookupFailed(format!("timed out after {:?}", self.timeout)),
        }
    }
}
