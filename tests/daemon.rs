//! Session daemon integration tests.

mod support;

use std::time::Duration;

use keyrack::core::daemon::DaemonRegistry;
use keyrack::core::domain::{Env, GrantSource, KeyGrant, Mechanism, Owner, VaultKind};
use keyrack::error::{DaemonError, Error};
use tempfile::TempDir;

use support::daemon::{FixedSession, RunningDaemon};

fn grant(slug: &str, secret: &str) -> KeyGrant {
    KeyGrant::new(
        slug.parse().unwrap(),
        secret,
        GrantSource {
            vault: VaultKind::OsDirect,
            mechanism: Mechanism::PermanentViaReplica,
        },
    )
}

fn slugs(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_grants_expire_after_ttl() {
    let dir = TempDir::new().unwrap();
    let daemon = RunningDaemon::start(dir.path(), "ttl", FixedSession::same("7")).await;
    let client = &daemon.client;

    client
        .unlock(vec![grant("acme.prod.A", "a")], Some(Duration::from_millis(300)))
        .await
        .unwrap();

    let status = client.status().await.unwrap();
    assert_eq!(status.len(), 1);
    assert!(status[0].ttl_left_ms <= 300);
    assert_eq!(client.get(&slugs(&["acme.prod.A"])).await.unwrap().len(), 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(client.get(&slugs(&["acme.prod.A"])).await.unwrap().is_empty());
    assert!(client.status().await.unwrap().is_empty());

    daemon.stop().await;
}

#[tokio::test]
async fn test_grant_expiry_caps_ttl() {
    let dir = TempDir::new().unwrap();
    let daemon = RunningDaemon::start(dir.path(), "cap", FixedSession::same("7")).await;

    let soon = chrono::Utc::now() + chrono::Duration::minutes(5);
    daemon
        .client
        .unlock(vec![grant("acme.prod.A", "a").with_expiry(soon)], Some(Duration::from_secs(3600)))
        .await
        .unwrap();

    let status = daemon.client.status().await.unwrap();
    assert_eq!(status[0].expires_at.timestamp_millis(), soon.timestamp_millis());

    daemon.stop().await;
}

#[tokio::test]
async fn test_relock_by_env_then_all() {
    let dir = TempDir::new().unwrap();
    let daemon = RunningDaemon::start(dir.path(), "relock", FixedSession::same("7")).await;
    let client = &daemon.client;

    client
        .unlock(
            vec![
                grant("acme.prod.A", "1"),
                grant("acme.prod.B", "2"),
                grant("acme.prep.A", "3"),
            ],
            None,
        )
        .await
        .unwrap();

    let mut relocked = client.relock(None, Some(Env::Prod)).await.unwrap();
    relocked.sort();
    assert_eq!(relocked, slugs(&["acme.prod.A", "acme.prod.B"]));

    let left = client.status().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].slug, "acme.prep.A");

    client.relock(None, None).await.unwrap();
    assert!(client.status().await.unwrap().is_empty());

    daemon.stop().await;
}

#[tokio::test]
async fn test_status_never_carries_secrets() {
    let dir = TempDir::new().unwrap();
    let daemon = RunningDaemon::start(dir.path(), "status", FixedSession::same("7")).await;

    daemon
        .client
        .unlock(vec![grant("acme.prod.A", "hunter2-secret")], None)
        .await
        .unwrap();

    let status = daemon.client.status().await.unwrap();
    let json = serde_json::to_string(&status).unwrap();
    assert!(!json.contains("hunter2-secret"));
    assert_eq!(status[0].env, Env::Prod);
    assert_eq!(status[0].org, "acme");

    daemon.stop().await;
}

#[tokio::test]
async fn test_owners_are_isolated_within_a_session() {
    let dir = TempDir::new().unwrap();
    let default = DaemonRegistry::new(dir.path(), "7", Owner::default());
    let mechanic = DaemonRegistry::new(dir.path(), "7", Owner::named("mechanic").unwrap());
    assert_ne!(default.socket_path(), mechanic.socket_path());

    let a = RunningDaemon::start_for(&default, FixedSession::same("7")).await;
    let b = RunningDaemon::start_for(&mechanic, FixedSession::same("7")).await;

    let (ra, rb) = tokio::join!(
        a.client.unlock(vec![grant("acme.prod.A", "default")], None),
        b.client.unlock(vec![grant("acme.prod.A", "mechanic")], None),
    );
    ra.unwrap();
    rb.unwrap();

    let wanted = slugs(&["acme.prod.A"]);
    let (ga, gb) = tokio::join!(a.client.get(&wanted), b.client.get(&wanted));
    assert_eq!(ga.unwrap()[0].key.secret(), "default");
    assert_eq!(gb.unwrap()[0].key.secret(), "mechanic");

    b.client.relock(None, None).await.unwrap();
    assert_eq!(a.client.get(&wanted).await.unwrap().len(), 1);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn test_foreign_session_is_rejected() {
    let dir = TempDir::new().unwrap();
    let daemon = RunningDaemon::start(dir.path(), "foreign", FixedSession::mismatched("7", "8")).await;

    for _ in 0..3 {
        let err = daemon.client.status().await.unwrap_err();
        assert!(
            matches!(err, Error::Daemon(DaemonError::Rejected(ref m)) if m.contains("session")),
            "unexpected error: {}",
            err
        );
    }

    let err = daemon
        .client
        .unlock(vec![grant("acme.prod.A", "a")], None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("session"));

    daemon.stop().await;
}

#[tokio::test]
async fn test_all_env_grant_rejected() {
    let dir = TempDir::new().unwrap();
    let daemon = RunningDaemon::start(dir.path(), "all", FixedSession::same("7")).await;

    assert!(daemon
        .client
        .unlock(vec![grant("acme.all.A", "a")], None)
        .await
        .is_err());
    assert!(daemon.client.status().await.unwrap().is_empty());

    daemon.stop().await;
}

#[tokio::test]
async fn test_second_bind_reports_already_running() {
    let dir = TempDir::new().unwrap();
    let registry = DaemonRegistry::new(dir.path(), "7", Owner::default());
    let daemon = RunningDaemon::start_for(&registry, FixedSession::same("7")).await;

    let err = keyrack::core::daemon::DaemonServer::bind(
        &registry.socket_path(),
        &registry.pid_path(),
        FixedSession::same("7"),
    )
    .await
    .err()
    .expect("second bind should fail");
    assert!(matches!(err, Error::Daemon(DaemonError::AlreadyRunning(_))));

    daemon.stop().await;
    assert!(!registry.socket_path().exists());
    assert!(!registry.pid_path().exists());
}

#[tokio::test]
async fn test_find_or_spawn_reuses_running_daemon() {
    let dir = TempDir::new().unwrap();
    let registry = DaemonRegistry::new(dir.path(), "7", Owner::default());
    let daemon = RunningDaemon::start_for(&registry, FixedSession::same("7")).await;

    let client = registry
        .find_or_spawn_with(
            || panic!("must not spawn while a daemon answers"),
            Duration::from_secs(1),
            Duration::from_millis(10),
        )
        .await
        .unwrap();
    assert_eq!(client.socket(), registry.socket_path());

    daemon.stop().await;
    assert!(registry.find().await.is_none());
}

#[tokio::test]
async fn test_foreign_daemon_is_found_not_respawned() {
    let dir = TempDir::new().unwrap();
    let registry = DaemonRegistry::new(dir.path(), "7", Owner::default());
    let daemon = RunningDaemon::start_for(&registry, FixedSession::mismatched("7", "8")).await;

    assert!(daemon.client.ping().await);
    let client = registry
        .find_or_spawn_with(
            || panic!("must not spawn next to a daemon that answers"),
            Duration::from_secs(1),
            Duration::from_millis(10),
        )
        .await
        .unwrap();

    let err = client.get(&slugs(&["acme.prod.A"])).await.unwrap_err();
    assert!(err.to_string().contains("session"), "unexpected error: {}", err);

    daemon.stop().await;
}
