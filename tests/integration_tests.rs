use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use kube_database_monitor::{
    build_feishu_payload, load_config_with_env, DatabaseObservation, DebtSuppression, LoopSettings,
    MockEnvironment, Monitor, Notifier, PhaseError, QuotaChecker, QuotaStatus, Reconciler,
    ResourceLister, Verdict, WebhookNotifier,
};
use mockito::Matcher;
use serde_json::json;

/// Returns one scripted list per call.
struct ScriptedLister {
    cycles: Mutex<VecDeque<Vec<DatabaseObservation>>>,
}

impl ScriptedLister {
    fn new(cycles: Vec<Vec<DatabaseObservation>>) -> Self {
        Self {
            cycles: Mutex::new(cycles.into()),
        }
    }
}

#[async_trait]
impl ResourceLister for ScriptedLister {
    async fn list_databases(&self) -> Result<Vec<DatabaseObservation>> {
        self.cycles
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no more scripted cycles"))
    }
}

#[derive(Default)]
struct MarkerQuota {
    markers: HashMap<String, QuotaStatus>,
    lookups: Mutex<usize>,
}

impl MarkerQuota {
    fn with_marker(namespace: &str) -> Self {
        let mut q = Self::default();
        q.markers.insert(namespace.to_string(), QuotaStatus::HasMarker);
        q
    }

    fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl QuotaChecker for MarkerQuota {
    async fn check_quota(&self, namespace: &str) -> QuotaStatus {
        *self.lookups.lock().unwrap() += 1;
        self.markers.get(namespace).cloned().unwrap_or(QuotaStatus::NoMarker)
    }
}

#[derive(Default)]
struct InboxNotifier {
    inbox: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Notifier for InboxNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        self.inbox.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

fn db(name: &str, ns: &str, phase: &str) -> DatabaseObservation {
    DatabaseObservation::new(name, ns, phase)
}

fn fast_settings() -> LoopSettings {
    LoopSettings {
        poll_interval: Duration::from_millis(1),
        request_timeout: Duration::from_secs(1),
        ..LoopSettings::default()
    }
}

fn data_lines(message: &str) -> Vec<String> {
    message.lines().skip(1).map(|l| l.to_string()).collect()
}

#[tokio::test]
async fn test_debt_namespace_scenario() {
    let quota = MarkerQuota::with_marker("ns1");
    let mut r = Reconciler::default();

    // cycle 1: first abnormal sighting
    assert_eq!(r.observe(&db("db1", "ns1", "Degraded"), &quota).await, Verdict::GracePeriod);
    assert_eq!(r.last_status("db1"), Some("Degraded"));

    // cycle 2: still abnormal
    assert_eq!(r.observe(&db("db1", "ns1", "Degraded"), &quota).await, Verdict::Reported);

    // cycle 3: failed while the namespace is not yet flagged
    assert_eq!(r.observe(&db("db1", "ns1", "Failed"), &quota).await, Verdict::DebtConfirmed);
    assert!(r.is_in_debt("ns1"));
    assert_eq!(r.last_status("db1"), None);
    assert_eq!(quota.lookups(), 1);

    // cycle 4: the record was cleared, so this is a fresh sighting
    assert_eq!(r.observe(&db("db1", "ns1", "Failed"), &quota).await, Verdict::GracePeriod);

    // cycle 5: flagged namespace bypasses the quota check and reports again
    assert_eq!(r.observe(&db("db1", "ns1", "Failed"), &quota).await, Verdict::Reported);
    assert_eq!(quota.lookups(), 1);
}

#[tokio::test]
async fn test_debt_scenario_with_known_record() {
    // db1 already tracked when the namespace is flagged by another database
    let quota = MarkerQuota::with_marker("ns1");
    let mut r = Reconciler::default();

    r.observe(&db("db1", "ns1", "Degraded"), &quota).await;
    r.observe(&db("db2", "ns1", "Failed"), &quota).await;
    assert_eq!(r.observe(&db("db2", "ns1", "Failed"), &quota).await, Verdict::DebtConfirmed);

    assert_eq!(r.observe(&db("db1", "ns1", "Failed"), &quota).await, Verdict::Reported);
    assert_eq!(quota.lookups(), 1);
}

#[tokio::test]
async fn test_monitor_cycles_end_to_end() {
    let lister = ScriptedLister::new(vec![
        vec![
            db("orders-pg", "shop", "Abnormal"),
            db("cache", "shop", "Running"),
            db("ledger", "billing", "Failed"),
        ],
        vec![
            db("orders-pg", "shop", "Abnormal"),
            db("cache", "shop", "Updating"),
            db("ledger", "billing", "Failed"),
            DatabaseObservation::unreadable("ghost", "shop", PhaseError::Missing),
        ],
        vec![
            db("orders-pg", "shop", "Running"),
            db("cache", "shop", "Updating"),
            db("ledger", "billing", "Failed"),
        ],
    ]);
    let quota = MarkerQuota::default();
    let mut monitor = Monitor::new(
        lister,
        quota,
        InboxNotifier::default(),
        Reconciler::default(),
        fast_settings(),
    );

    let first = monitor.run_cycle().await.unwrap();
    assert_eq!(first.summary.reported, 0);
    assert_eq!(first.summary.grace_period, 2);

    let second = monitor.run_cycle().await.unwrap();
    assert_eq!(second.summary.reported, 2);
    assert_eq!(second.summary.skipped, 1);

    let third = monitor.run_cycle().await.unwrap();
    assert_eq!(third.summary.reported, 2);
    assert_eq!(third.summary.resolved, 1);
    assert_eq!(monitor.reconciler().last_status("orders-pg"), None);
    assert_eq!(monitor.reconciler().last_status("ledger"), Some("Failed"));

    // Script exhausted behaves like a failed list
    assert!(monitor.run_cycle().await.is_err());
}

#[tokio::test]
async fn test_messages_sent_every_cycle() {
    let notifier = InboxNotifier::default();
    let inbox = Arc::clone(&notifier.inbox);
    let lister = ScriptedLister::new(vec![
        vec![db("a", "ns", "Abnormal")],
        vec![db("a", "ns", "Abnormal")],
        vec![],
    ]);
    let mut monitor = Monitor::new(
        lister,
        MarkerQuota::default(),
        notifier,
        Reconciler::default(),
        fast_settings(),
    );

    for _ in 0..3 {
        let outcome = monitor.run_cycle().await.unwrap();
        assert!(outcome.sent);
    }

    // Only the second cycle has a data row; the others are header-only
    let inbox = inbox.lock().unwrap();
    assert_eq!(inbox.len(), 3);
    assert!(data_lines(&inbox[0]).is_empty());
    assert_eq!(data_lines(&inbox[1]).len(), 1);
    assert!(inbox[1].contains("Abnormal"));
    assert!(data_lines(&inbox[2]).is_empty());
    assert!(inbox.iter().all(|m| m.starts_with("DatabaseName")));
}

#[tokio::test]
async fn test_sticky_suppression_end_to_end() {
    let lister = ScriptedLister::new(vec![
        vec![db("db1", "ns1", "Failed")],
        vec![db("db1", "ns1", "Failed")],
        vec![db("db1", "ns1", "Failed")],
        vec![db("db1", "ns1", "Failed")],
    ]);
    let reconciler = Reconciler::new(DebtSuppression::Sticky);
    let mut monitor = Monitor::new(
        lister,
        MarkerQuota::with_marker("ns1"),
        InboxNotifier::default(),
        reconciler,
        fast_settings(),
    );

    let mut reported = 0;
    for _ in 0..4 {
        reported += monitor.run_cycle().await.unwrap().summary.reported;
    }
    assert_eq!(reported, 0);
    assert_eq!(monitor.reconciler().flagged_namespaces(), 1);
}

#[tokio::test]
async fn test_webhook_delivery_through_monitor() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/open-apis/bot/v2/hook/token")
        .match_body(Matcher::PartialJson(json!({"msg_type": "text"})))
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let env = MockEnvironment::new()
        .with_var(
            "FEISHU_WEBHOOK_URL",
            format!("{}/open-apis/bot/v2/hook/token", server.url()),
        )
        .with_var("REQUEST_TIMEOUT_SECONDS", "5");
    let cfg = load_config_with_env(&env).unwrap();

    let notifier = WebhookNotifier::new(cfg.webhook_url.clone(), cfg.request_timeout).unwrap();
    let lister = ScriptedLister::new(vec![
        vec![db("a", "ns", "Abnormal")],
        vec![db("a", "ns", "Abnormal")],
    ]);
    let mut monitor = Monitor::new(
        lister,
        MarkerQuota::default(),
        notifier,
        Reconciler::new(cfg.debt_suppression),
        LoopSettings::from(&cfg),
    );

    assert!(monitor.run_cycle().await.unwrap().delivered);
    assert!(monitor.run_cycle().await.unwrap().delivered);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_webhook_server_error_is_reported_not_fatal() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/hook")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let url = format!("{}/hook", server.url());
    let notifier = WebhookNotifier::new(url, Duration::from_secs(5)).unwrap();
    let lister = ScriptedLister::new(vec![vec![]]);
    let mut monitor = Monitor::new(
        lister,
        MarkerQuota::default(),
        notifier,
        Reconciler::default(),
        fast_settings(),
    );

    let outcome = monitor.run_cycle().await.unwrap();
    assert!(outcome.sent);
    assert!(!outcome.delivered);
}

#[test]
fn test_payload_shape() {
    let payload = build_feishu_payload("line\n");
    assert_eq!(
        serde_json::to_value(&payload).unwrap(),
        json!({"msg_type": "text", "content": {"text": "line\n"}})
    );
}

#[test]
fn test_blocking_reconcile() {
    let quota = MarkerQuota::default();
    let mut r = Reconciler::default();
    let observations = vec![db("x", "ns", "Abnormal"), db("x", "ns", "Abnormal")];

    let report = tokio_test::block_on(r.reconcile(&observations, &quota));
    // Same name twice in one list: recorded then reported
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.summary.grace_period, 1);
}
