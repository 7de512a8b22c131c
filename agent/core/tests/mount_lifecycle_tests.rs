// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the volume mount lifecycle
//!
//! These tests drive the isolator through full container lifecycles and
//! verify the central correctness property against the executor call log:
//! an external volume is mounted exactly once while at least one container
//! holds a claim on it, and unmounted exactly once when the last holder
//! exits.

use aegis_volume_agent_core::application::{StandardVolumeIsolator, VolumeIsolator};
use aegis_volume_agent_core::domain::config::IsolatorConfig;
use aegis_volume_agent_core::domain::mount::ContainerId;
use aegis_volume_agent_core::infrastructure::event_bus::EventBus;
use aegis_volume_agent_core::infrastructure::executor::{ExecutorCall, MockMountExecutor};
use aegis_volume_agent_core::infrastructure::snapshot::FileSnapshotStore;
use std::sync::Arc;
use tempfile::TempDir;

fn isolator_in(
    work_dir: &TempDir,
) -> (StandardVolumeIsolator, Arc<MockMountExecutor>) {
    let config = IsolatorConfig {
        work_dir: work_dir.path().to_path_buf(),
        ..IsolatorConfig::default()
    };
    let executor = Arc::new(MockMountExecutor::new());
    let isolator = StandardVolumeIsolator::new(
        config.clone(),
        executor.clone(),
        Arc::new(FileSnapshotStore::new(&config)),
        Arc::new(EventBus::with_default_capacity()),
    );
    (isolator, executor)
}

fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_two_containers_share_one_external_mount() {
    let work_dir = TempDir::new().unwrap();
    let (isolator, executor) = isolator_in(&work_dir);

    // Container a requests db1 on rexray: the tool mounts it.
    let info = isolator
        .prepare(
            ContainerId::new("a"),
            &env(&[
                ("LIBSTORAGE_VOLUME_NAME", "db1"),
                ("LIBSTORAGE_VOLUME_DRIVER", "rexray"),
            ]),
        )
        .await
        .unwrap()
        .expect("container a requested a volume");
    assert_eq!(info.volumes.len(), 1);
    assert_eq!(executor.mount_count("db1"), 1);
    assert_eq!(executor.mounted_volumes(), vec!["db1".to_string()]);

    // Container b requests the same volume: no second mount.
    isolator
        .prepare(
            ContainerId::new("b"),
            &env(&[
                ("LIBSTORAGE_VOLUME_NAME", "db1"),
                ("LIBSTORAGE_VOLUME_DRIVER", "rexray"),
            ]),
        )
        .await
        .unwrap();
    assert_eq!(executor.mount_count("db1"), 1);

    // First holder exits: the volume stays mounted.
    isolator.cleanup(&ContainerId::new("a")).await.unwrap();
    assert_eq!(executor.unmount_count("db1"), 0);
    assert_eq!(executor.mounted_volumes(), vec!["db1".to_string()]);

    // Last holder exits: exactly one unmount.
    isolator.cleanup(&ContainerId::new("b")).await.unwrap();
    assert_eq!(executor.unmount_count("db1"), 1);
    assert!(executor.mounted_volumes().is_empty());
}

#[tokio::test]
async fn test_mounted_state_tracks_holder_counts_across_sequences() {
    let work_dir = TempDir::new().unwrap();
    let (isolator, executor) = isolator_in(&work_dir);

    isolator
        .prepare(
            ContainerId::new("a"),
            &env(&[
                ("LIBSTORAGE_VOLUME_NAME", "db1"),
                ("LIBSTORAGE_VOLUME_NAME2", "logs"),
            ]),
        )
        .await
        .unwrap();
    isolator
        .prepare(ContainerId::new("b"), &env(&[("LIBSTORAGE_VOLUME_NAME", "logs")]))
        .await
        .unwrap();
    isolator
        .prepare(ContainerId::new("c"), &env(&[("LIBSTORAGE_VOLUME_NAME", "scratch")]))
        .await
        .unwrap();

    let mut mounted = executor.mounted_volumes();
    mounted.sort();
    assert_eq!(mounted, vec!["db1", "logs", "scratch"]);

    // a exits: db1 loses its only holder, logs is still held by b.
    isolator.cleanup(&ContainerId::new("a")).await.unwrap();
    let mut mounted = executor.mounted_volumes();
    mounted.sort();
    assert_eq!(mounted, vec!["logs", "scratch"]);

    isolator.cleanup(&ContainerId::new("c")).await.unwrap();
    assert_eq!(executor.mounted_volumes(), vec!["logs".to_string()]);

    isolator.cleanup(&ContainerId::new("b")).await.unwrap();
    assert!(executor.mounted_volumes().is_empty());

    // Each volume saw exactly one mount and one unmount.
    for volume in ["db1", "logs", "scratch"] {
        assert_eq!(executor.mount_count(volume), 1, "{volume}");
        assert_eq!(executor.unmount_count(volume), 1, "{volume}");
    }
}

#[tokio::test]
async fn test_prepare_is_all_or_nothing() {
    let work_dir = TempDir::new().unwrap();
    let (isolator, executor) = isolator_in(&work_dir);
    executor.fail_volume("broken");

    let result = isolator
        .prepare(
            ContainerId::new("a"),
            &env(&[
                ("LIBSTORAGE_VOLUME_NAME", "db1"),
                ("LIBSTORAGE_VOLUME_NAME2", "broken"),
            ]),
        )
        .await;
    assert!(result.is_err());
    assert!(executor.mounted_volumes().is_empty());

    // The failed prepare left no claims behind: cleanup has nothing to do.
    isolator.cleanup(&ContainerId::new("a")).await.unwrap();
    assert_eq!(executor.unmount_count("db1"), 1); // only the rollback unmount
}

#[tokio::test]
async fn test_options_pass_through_unrestricted() {
    let work_dir = TempDir::new().unwrap();
    let (isolator, executor) = isolator_in(&work_dir);

    isolator
        .prepare(
            ContainerId::new("a"),
            &env(&[
                ("LIBSTORAGE_VOLUME_NAME", "db1"),
                ("LIBSTORAGE_VOLUME_OPTS", "size=5;newfstype=xfs"),
            ]),
        )
        .await
        .unwrap();

    match &executor.calls()[0] {
        ExecutorCall::Mount { options, .. } => assert_eq!(options, "size=5;newfstype=xfs"),
        other => panic!("expected a mount call, got {other:?}"),
    }
}

#[tokio::test]
async fn test_injection_attempts_never_reach_the_tool() {
    let work_dir = TempDir::new().unwrap();
    let (isolator, executor) = isolator_in(&work_dir);

    for name in ["db1;reboot", "$(reboot)", "db1|tee", "db`1`"] {
        let result = isolator
            .prepare(
                ContainerId::new("attacker"),
                &env(&[("LIBSTORAGE_VOLUME_NAME", name)]),
            )
            .await;
        assert!(result.is_err(), "expected '{name}' to be rejected");
    }
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_claims_survive_agent_restart() {
    let work_dir = TempDir::new().unwrap();
    let (isolator, executor) = isolator_in(&work_dir);

    isolator
        .prepare(ContainerId::new("a"), &env(&[("LIBSTORAGE_VOLUME_NAME", "db1")]))
        .await
        .unwrap();
    assert_eq!(executor.mount_count("db1"), 1);

    // Restart: a new isolator instance recovers from the snapshot with a
    // still-live container.
    let (restarted, restarted_executor) = isolator_in(&work_dir);
    restarted
        .recover(&[ContainerId::new("a")], &[])
        .await
        .unwrap();

    // A second container can share the recovered mount without a new tool
    // invocation.
    restarted
        .prepare(ContainerId::new("b"), &env(&[("LIBSTORAGE_VOLUME_NAME", "db1")]))
        .await
        .unwrap();
    assert_eq!(restarted_executor.mount_count("db1"), 0);

    restarted.cleanup(&ContainerId::new("a")).await.unwrap();
    restarted.cleanup(&ContainerId::new("b")).await.unwrap();
    assert_eq!(restarted_executor.unmount_count("db1"), 1);
}

#[tokio::test]
async fn test_restart_without_live_containers_leaves_mounts_alone() {
    let work_dir = TempDir::new().unwrap();
    let (isolator, _executor) = isolator_in(&work_dir);

    isolator
        .prepare(ContainerId::new("gone"), &env(&[("LIBSTORAGE_VOLUME_NAME", "db1")]))
        .await
        .unwrap();

    let (restarted, restarted_executor) = isolator_in(&work_dir);
    restarted.recover(&[], &[]).await.unwrap();

    // The stale claim is dropped but no unmount is ever issued for it.
    assert!(restarted_executor.calls().is_empty());
    restarted.cleanup(&ContainerId::new("gone")).await.unwrap();
    assert!(restarted_executor.calls().is_empty());
}
