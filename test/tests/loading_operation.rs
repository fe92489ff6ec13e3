/// Loading operation scenarios: completion with progress, the single
/// outstanding join rule, cancellation and failure outcomes
use std::time::Duration;

use trellis_session::{
    JoinRequest, LoadingError, LoadingOperation, LoadingOutcome, LoadingSlot, Session,
    SessionConfig, SessionError,
};
use trellis_shared::WorldState;
use trellis_test::{
    assert_non_decreasing, assert_same_tree, sample_registry, test_address, LoadingEvent,
    LocalLink, RecordingListener,
};

fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        poll_interval: Duration::from_millis(1),
        ..SessionConfig::default()
    }
}

async fn wait_for_phase(operation: &LoadingOperation, phase: WorldState) {
    for _ in 0..1000 {
        if operation.phase() == phase {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("Join never reached {:?}", phase);
}

#[tokio::test]
async fn test_join_completes_with_monotonic_progress() {
    init_logging();
    let mut host = Session::host(SessionConfig::default(), sample_registry()).unwrap();
    let root = host.world().root();
    for index in 0..6 {
        let name = format!("Crate {}", index);
        host.world_mut().add_slot(&root, &name).unwrap();
    }
    host.world_mut().collect_outbound();
    let admission = host.admit_peer().unwrap();
    let (transport, _link) = LocalLink::builder()
        .connect_after(2)
        .admitted(admission, 4)
        .build();

    let listener = RecordingListener::new();
    let slot = LoadingSlot::new();
    let operation = slot
        .begin_join(
            JoinRequest::new(test_address(), transport, sample_registry())
                .with_config(fast_config())
                .with_listener(listener.clone()),
        )
        .unwrap();
    assert!(slot.is_active());

    let outcome = operation.outcome().await;
    assert!(outcome.is_completed(), "Expected completion, got {:?}", outcome);
    assert!(!slot.is_active());

    let session = outcome.session().unwrap();
    assert_eq!(session.state(), WorldState::Running);
    assert_same_tree(host.world(), session.world());

    let progress = listener.progress_values();
    assert_non_decreasing(&progress);
    assert_eq!(progress.last(), Some(&1.0));
    assert_eq!(
        listener.milestones(),
        vec![
            LoadingEvent::Started(test_address().to_string()),
            LoadingEvent::Completed,
        ]
    );
}

#[tokio::test]
async fn test_second_join_is_rejected_while_one_is_active() {
    let slot = LoadingSlot::new();
    let (stalled, _link) = LocalLink::builder().never_connect().build();
    let first = slot
        .begin_join(
            JoinRequest::new(test_address(), stalled, sample_registry()).with_config(fast_config()),
        )
        .unwrap();

    let (other, _other_link) = LocalLink::builder().never_connect().build();
    let second = slot.begin_join(JoinRequest::new(test_address(), other, sample_registry()));
    assert!(matches!(second, Err(LoadingError::AlreadyActive)));

    first.cancel();
    assert!(first.outcome().await.is_cancelled());
    assert!(!slot.is_active());

    // the slot is free again once the first join ended
    let (retry, _retry_link) = LocalLink::builder().never_connect().build();
    let third = slot
        .begin_join(
            JoinRequest::new(test_address(), retry, sample_registry()).with_config(fast_config()),
        )
        .unwrap();
    third.cancel();
    assert!(third.outcome().await.is_cancelled());
}

#[tokio::test]
async fn test_cancel_during_data_load_never_completes() {
    init_logging();
    let mut host = Session::host(SessionConfig::default(), sample_registry()).unwrap();
    let admission = host.admit_peer().unwrap();
    let (transport, link) = LocalLink::builder()
        .admitted(admission, 2)
        .withhold_complete()
        .build();
    let listener = RecordingListener::new();

    let slot = LoadingSlot::new();
    let operation = slot
        .begin_join(
            JoinRequest::new(test_address(), transport, sample_registry())
                .with_config(fast_config())
                .with_listener(listener.clone()),
        )
        .unwrap();
    wait_for_phase(&operation, WorldState::InitializingDataModel).await;
    assert!(operation.progress() >= 0.4);
    assert!(operation.status().starts_with("Loading world data"));

    operation.cancel();
    assert!(operation.is_cancel_requested());
    let outcome = operation.outcome().await;

    assert!(outcome.is_cancelled(), "Expected cancellation, got {:?}", outcome);
    // the partially built session was torn down
    assert!(link.is_disconnected());
    let milestones = listener.milestones();
    assert_eq!(milestones.last(), Some(&LoadingEvent::Cancelled));
    assert!(!milestones.contains(&LoadingEvent::Completed));
}

#[tokio::test]
async fn test_rejected_join_resolves_failed() {
    let (transport, _link) = LocalLink::builder().reject("banned").build();
    let listener = RecordingListener::new();
    let operation = LoadingSlot::new()
        .begin_join(
            JoinRequest::new(test_address(), transport, sample_registry())
                .with_config(fast_config())
                .with_listener(listener.clone()),
        )
        .unwrap();

    let outcome = operation.outcome().await;
    let expected = SessionError::Rejected {
        reason: "banned".to_string(),
    };
    assert_eq!(outcome.error(), Some(&expected));
    let failures = listener
        .milestones()
        .into_iter()
        .filter(|event| matches!(event, LoadingEvent::Failed(_)))
        .count();
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn test_watchdog_fails_a_stalled_join() {
    let (transport, link) = LocalLink::builder().never_connect().build();
    let config = SessionConfig {
        join_timeout: Duration::from_millis(1),
        ..fast_config()
    };
    let operation = LoadingSlot::new()
        .begin_join(
            JoinRequest::new(test_address(), transport, sample_registry()).with_config(config),
        )
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), operation.outcome())
        .await
        .expect("Watchdog did not fire in time");
    match outcome {
        LoadingOutcome::Failed(SessionError::Timeout { elapsed }) => {
            assert!(elapsed >= Duration::from_millis(1))
        }
        other => panic!("Expected a timeout, got {:?}", other),
    }
    assert!(link.is_disconnected());
}

#[test]
fn test_begin_join_needs_a_runtime() {
    let slot = LoadingSlot::new();
    let (transport, _link) = LocalLink::builder().build();
    let result = slot.begin_join(JoinRequest::new(test_address(), transport, sample_registry()));

    assert!(matches!(result, Err(LoadingError::NoRuntime)));
    assert!(!slot.is_active());
}
