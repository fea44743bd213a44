//! Integration tests wiring the store, readiness gate, provisioner, and
//! continuity together with a scripted gateway, the way `core::run` wires
//! the real thing.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::continuity::RestartContinuity;
use crate::provisioner::{ConfigProvisioner, Polled};
use crate::readiness::ReadinessGate;
use crate::store::ConfigStore;
use crate::testing::MockGateway;
use crate::traits::{Gateway, GuildSnapshot};

fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn fresh_process_provisions_every_known_entity_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ConfigStore::new(dir.path()));
    store.load().await.unwrap();

    let gate = Arc::new(ReadinessGate::new());
    let gateway = Arc::new(MockGateway::new(vec![
        GuildSnapshot {
            id: 1,
            member_ids: vec![10, 11],
        },
        GuildSnapshot {
            id: 2,
            member_ids: vec![10],
        },
        GuildSnapshot {
            id: 3,
            member_ids: vec![],
        },
    ]));
    let provisioner = ConfigProvisioner::new(
        Arc::clone(&store),
        Arc::clone(&gateway) as Arc<dyn Gateway>,
        Arc::clone(&gate),
        Duration::from_secs(5),
        CancellationToken::new(),
    );

    // Ticks before readiness defer without side effects.
    assert_eq!(provisioner.poll_once().await, Polled::NotReady);
    assert_eq!(file_count(&dir.path().join("guilds")), 0);

    gate.mark_ready();
    assert_eq!(provisioner.poll_once().await, Polled::Provisioned);

    // Three guild records, two distinct user records, all defaults.
    assert_eq!(file_count(&dir.path().join("guilds")), 3);
    assert_eq!(file_count(&dir.path().join("users")), 2);

    // A second tick creates nothing.
    assert_eq!(provisioner.poll_once().await, Polled::AlreadyDone);
    assert_eq!(file_count(&dir.path().join("guilds")), 3);
    assert_eq!(file_count(&dir.path().join("users")), 2);

    // A fresh process sees exactly what was provisioned.
    let reloaded = ConfigStore::new(dir.path());
    reloaded.load().await.unwrap();
    let snapshot = reloaded.snapshot().await;
    let mut guild_ids: Vec<u64> = snapshot.guilds.iter().map(|g| g.id).collect();
    guild_ids.sort_unstable();
    assert_eq!(guild_ids, vec![1, 2, 3]);
    let mut user_ids: Vec<u64> = snapshot.users.iter().map(|u| u.id).collect();
    user_ids.sort_unstable();
    assert_eq!(user_ids, vec![10, 11]);
}

#[tokio::test]
async fn restart_cycle_delivers_one_notice_and_preserves_records() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("restart.marker");

    // First process: records exist, a restart is armed, state is flushed.
    {
        let store = ConfigStore::new(dir.path());
        store.load().await.unwrap();
        store.ensure_guild(7).await;
        store.save().await.unwrap();
        RestartContinuity::new(&marker).arm(7, 42).unwrap();
    }

    // Second process: records reload, the marker is consumed exactly once.
    let store = ConfigStore::new(dir.path());
    store.load().await.unwrap();
    assert_eq!(store.snapshot().await.guilds.len(), 1);

    let gateway = MockGateway::new(vec![]).with_reachable(7, 42);
    let continuity = RestartContinuity::new(&marker);
    assert!(continuity.consume_if_present(&gateway).await.unwrap());
    assert_eq!(gateway.sent.lock().await.len(), 1);
    assert!(!marker.exists());

    // A third startup sees no marker and sends nothing.
    assert!(!continuity.consume_if_present(&gateway).await.unwrap());
    assert_eq!(gateway.sent.lock().await.len(), 1);
}
