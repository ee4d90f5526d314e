use chrono::{DateTime, Duration, Utc};
use habits_core::boundary::CronSchedule;
use habits_core::checkpoint::CronCheckpoint;
use habits_core::client::{ClientConfig, Credentials, ErrorKind, HabiticaClient};
use habits_core::clock::FixedClock;
use habits_core::coordinator::{CronCoordinator, SyncError, SyncOutcome};
use habits_core::model::UserState;
use serde_json::json;
use tempfile::tempdir;
use url::Url;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).expect("timestamp should parse").with_timezone(&Utc)
}

fn client_for(server: &MockServer) -> HabiticaClient {
    let base_url = Url::parse(&format!("{}/api/v3", server.uri())).expect("mock uri should parse");
    HabiticaClient::new(ClientConfig::new(Credentials::new("user-1", "key-1")).with_base_url(base_url))
        .expect("client should build")
}

async fn mount_user(server: &MockServer, needs_cron: bool, last_cron: &str, calls: u64) {
    Mock::given(method("GET"))
        .and(path("/api/v3/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"needsCron": needs_cron, "lastCron": last_cron}
        })))
        .expect(calls)
        .mount(server)
        .await;
}

async fn mount_cron(server: &MockServer, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v3/cron"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": {}})))
        .expect(calls)
        .mount(server)
        .await;
}

// 05:00 EST on Jan 15; the last scheduled reset was 09:00Z the same day.
const NOW: &str = "2026-01-15T10:00:00Z";
const BOUNDARY: &str = "2026-01-15T09:00:00Z";

#[tokio::test]
async fn current_checkpoint_skips_the_network() {
    let server = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(500)).expect(0).mount(&server).await;

    let tmp = tempdir().expect("tempdir should be created");
    let checkpoint = CronCheckpoint::new(tmp.path().join("cron"));
    checkpoint.write(at(BOUNDARY)).expect("checkpoint should write");
    let client = client_for(&server);
    let clock = FixedClock::new(at(NOW));
    let coordinator = CronCoordinator::new(&client, &checkpoint, CronSchedule::default(), &clock);

    let outcome = coordinator.ensure_synced().await.expect("sync should succeed");

    assert_eq!(outcome, SyncOutcome::AlreadySynced { checkpoint: at(BOUNDARY) });
    let requests = server.received_requests().await.expect("recording is enabled");
    assert!(requests.is_empty());
}

#[tokio::test]
async fn server_side_reset_records_last_cron_without_posting() {
    let server = MockServer::start().await;
    mount_user(&server, false, "2026-01-15T09:00:30Z", 1).await;
    mount_cron(&server, 0).await;

    let tmp = tempdir().expect("tempdir should be created");
    let checkpoint = CronCheckpoint::new(tmp.path().join("cron"));
    checkpoint.write(at(BOUNDARY) - Duration::seconds(1)).expect("checkpoint should write");
    let client = client_for(&server);
    let clock = FixedClock::new(at(NOW));
    let coordinator = CronCoordinator::new(&client, &checkpoint, CronSchedule::default(), &clock);

    let outcome = coordinator.ensure_synced().await.expect("sync should succeed");

    assert_eq!(outcome, SyncOutcome::Recorded { last_cron: at("2026-01-15T09:00:30Z") });
    assert_eq!(checkpoint.read().expect("checkpoint should exist"), at("2026-01-15T09:00:30Z"));
}

#[tokio::test]
async fn cold_start_with_pending_reset_runs_cron_and_checkpoints_now() {
    let server = MockServer::start().await;
    mount_user(&server, true, "2026-01-14T09:02:00Z", 1).await;
    mount_cron(&server, 1).await;

    let tmp = tempdir().expect("tempdir should be created");
    let checkpoint = CronCheckpoint::new(tmp.path().join("cache").join("cron"));
    let client = client_for(&server);
    let clock = FixedClock::new(at(NOW));
    let coordinator = CronCoordinator::new(&client, &checkpoint, CronSchedule::default(), &clock);

    let outcome = coordinator.ensure_synced().await.expect("sync should succeed");

    assert!(matches!(outcome, SyncOutcome::CronRan { .. }));
    assert_eq!(checkpoint.read().expect("checkpoint should exist"), at(NOW));
}

#[tokio::test]
async fn force_cron_posts_even_when_synced() {
    let server = MockServer::start().await;
    mount_user(&server, false, "2026-01-15T09:00:30Z", 0).await;
    mount_cron(&server, 1).await;

    let tmp = tempdir().expect("tempdir should be created");
    let checkpoint = CronCheckpoint::new(tmp.path().join("cron"));
    checkpoint.write(at(BOUNDARY)).expect("checkpoint should write");
    let client = client_for(&server);
    let clock = FixedClock::new(at(NOW));
    let coordinator = CronCoordinator::new(&client, &checkpoint, CronSchedule::default(), &clock);

    let outcome = coordinator.force_cron().await.expect("forced cron should succeed");

    assert_eq!(outcome, SyncOutcome::CronRan { summary: json!({"success": true, "data": {}}) });
    assert_eq!(checkpoint.read().expect("checkpoint should exist"), at(NOW));
}

#[tokio::test]
async fn failed_user_fetch_leaves_checkpoint_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "NotAuthorized"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_cron(&server, 0).await;

    let tmp = tempdir().expect("tempdir should be created");
    let checkpoint = CronCheckpoint::new(tmp.path().join("cron"));
    let stale = at(BOUNDARY) - Duration::days(2);
    checkpoint.write(stale).expect("checkpoint should write");
    let client = client_for(&server);
    let clock = FixedClock::new(at(NOW));
    let coordinator = CronCoordinator::new(&client, &checkpoint, CronSchedule::default(), &clock);

    let error = coordinator.ensure_synced().await.expect_err("401 should abort sync");

    match &error {
        SyncError::Request(request) => assert_eq!(request.kind, ErrorKind::Client),
        other => panic!("expected request error, got {other:?}"),
    }
    assert_eq!(checkpoint.read().expect("checkpoint should exist"), stale);
}

#[tokio::test]
async fn failed_cron_post_leaves_checkpoint_absent() {
    let server = MockServer::start().await;
    mount_user(&server, true, "2026-01-14T09:02:00Z", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/v3/cron"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempdir().expect("tempdir should be created");
    let checkpoint = CronCheckpoint::new(tmp.path().join("cron"));
    let client = client_for(&server);
    let clock = FixedClock::new(at(NOW));
    let coordinator = CronCoordinator::new(&client, &checkpoint, CronSchedule::default(), &clock);

    let error = coordinator.ensure_synced().await.expect_err("500 should abort sync");

    assert_eq!(error.as_request().map(|request| request.kind), Some(ErrorKind::Server));
    assert!(!checkpoint.exists());
}

#[tokio::test]
async fn checkpoint_never_decreases_across_runs() {
    let server = MockServer::start().await;
    // The service keeps reporting the same cron and no pending reset, so
    // every run after the next day's boundary asks again.
    mount_user(&server, false, "2026-01-15T09:00:30Z", 3).await;
    mount_cron(&server, 0).await;

    let tmp = tempdir().expect("tempdir should be created");
    let checkpoint = CronCheckpoint::new(tmp.path().join("cron"));
    let client = client_for(&server);
    let clock = FixedClock::new(at(NOW));
    let coordinator = CronCoordinator::new(&client, &checkpoint, CronSchedule::default(), &clock);

    let mut previous = None;
    for step in [Duration::zero(), Duration::hours(12), Duration::hours(12), Duration::hours(1)] {
        clock.advance(step);
        coordinator.ensure_synced().await.expect("sync should succeed");
        let current = checkpoint.read().expect("checkpoint should exist");
        if let Some(previous) = previous {
            assert!(current >= previous, "checkpoint regressed from {previous} to {current}");
        }
        previous = Some(current);
    }
    assert_eq!(previous, Some(at("2026-01-15T09:00:30Z")));
}

#[tokio::test]
async fn observed_state_refreshes_checkpoint_without_network() {
    let server = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(500)).expect(0).mount(&server).await;

    let tmp = tempdir().expect("tempdir should be created");
    let checkpoint = CronCheckpoint::new(tmp.path().join("cron"));
    let client = client_for(&server);
    let clock = FixedClock::new(at(NOW));
    let coordinator = CronCoordinator::new(&client, &checkpoint, CronSchedule::default(), &clock);

    let pending = UserState { needs_cron: true, last_cron: at("2026-01-14T09:00:30Z") };
    assert_eq!(coordinator.observe(&pending).expect("observe should succeed"), None);
    assert!(!checkpoint.exists());

    let done = UserState { needs_cron: false, last_cron: at("2026-01-15T09:00:30Z") };
    assert_eq!(
        coordinator.observe(&done).expect("observe should succeed"),
        Some(at("2026-01-15T09:00:30Z"))
    );

    // A later fast-path check now succeeds without any request.
    let outcome = coordinator.ensure_synced().await.expect("sync should succeed");
    assert!(matches!(outcome, SyncOutcome::AlreadySynced { .. }));
}
