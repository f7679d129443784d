//! Scheduler lifecycle.

mod common;

use artstore_core::SyncKind;
use artstore_sync::{LoopState, SyncScheduler};
use common::{TestEngine, remote_file, wait_for};
use std::time::Duration;
use uuid::Uuid;

fn disable_all(config: &mut artstore_core::config::SyncConfig) {
    config.storage_info.enabled = false;
    config.file_registry.enabled = false;
    config.service_accounts.enabled = false;
}

#[tokio::test]
async fn loops_run_passes_and_stop_cleanly() {
    let t = TestEngine::with_config(|c| {
        disable_all(c);
        c.file_registry.enabled = true;
        c.file_registry.interval_secs = 1;
    })
    .await;
    let element = t.register_node("node-a").await;
    let id = Uuid::new_v4();
    t.set_files(&element, vec![remote_file(id, "c1")]);

    let scheduler = SyncScheduler::new(t.engine.clone(), t.engine.config().clone());
    scheduler.start();
    let status = scheduler.status();
    assert_eq!(status.get(SyncKind::FileRegistry), LoopState::Running);
    assert_eq!(status.get(SyncKind::StorageInfo), LoopState::Disabled);

    let nodes = t.nodes.clone();
    assert!(wait_for(Duration::from_secs(5), || nodes.listing_calls() > 0).await);
    // The pass may still be applying; the fence tells us when it is done.
    let fence = t.engine.fence().clone();
    let key = element.element_id.to_string();
    assert!(wait_for(Duration::from_secs(5), || !fence.is_held(SyncKind::FileRegistry, &key)).await);

    scheduler.stop().await;
    assert_eq!(status.get(SyncKind::FileRegistry), LoopState::Stopped);

    let runs = t
        .engine
        .list_runs(Some(SyncKind::FileRegistry), None, None)
        .await
        .unwrap();
    assert!(!runs.is_empty());
    assert!(t.engine.files().get(id).await.is_ok());
}

#[tokio::test]
async fn database_failure_halts_only_that_loop() {
    let t = TestEngine::with_config(|c| {
        disable_all(c);
        c.storage_info.enabled = true;
        c.storage_info.interval_secs = 1;
        c.service_accounts.enabled = true;
        c.service_accounts.interval_secs = 3600;
    })
    .await;
    t.store.pool().close().await;

    let scheduler = SyncScheduler::new(t.engine.clone(), t.engine.config().clone());
    scheduler.start();
    let status = scheduler.status();

    let probe = status.clone();
    assert!(
        wait_for(Duration::from_secs(5), || matches!(
            probe.get(SyncKind::StorageInfo),
            LoopState::Halted { .. }
        ))
        .await,
        "storage info loop halts on a closed pool"
    );
    assert_eq!(status.get(SyncKind::ServiceAccounts), LoopState::Running);

    scheduler.stop().await;
    assert!(matches!(status.get(SyncKind::StorageInfo), LoopState::Halted { .. }));
    assert_eq!(status.get(SyncKind::ServiceAccounts), LoopState::Stopped);
}

#[tokio::test]
async fn account_loop_is_disabled_without_identity_provider() {
    let t = TestEngine::without_identity().await;
    let scheduler = SyncScheduler::new(t.engine.clone(), t.engine.config().clone());
    scheduler.start();

    let snapshot = scheduler.status().snapshot();
    assert_eq!(snapshot[&SyncKind::ServiceAccounts], LoopState::Disabled);
    assert_eq!(snapshot[&SyncKind::StorageInfo], LoopState::Running);

    scheduler.stop().await;
}
