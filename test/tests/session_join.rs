/// Session state machine scenarios: hosting, the full replica join, and
/// every way a join can fail
use std::time::Duration;

use trellis_session::{Session, SessionConfig, SessionError, TransportError};
use trellis_shared::{Float3, ReferenceId, WorldConfig, WorldState};
use trellis_test::{
    assert_fully_attached, assert_same_tree, sample_registry, test_address, Beacon, LocalLink,
};

fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

/// Host with a small scene: a room holding a table with a beacon aimed at
/// the room
fn populated_host() -> (Session, ReferenceId) {
    let mut host = Session::host(SessionConfig::default(), sample_registry()).unwrap();
    let world = host.world_mut();
    let root = world.root();
    let room = world.add_slot(&root, "Room").unwrap();
    let table = world.add_slot(&room, "Table").unwrap();
    world
        .slot_mut(&table)
        .unwrap()
        .position
        .set(Float3::new(0.0, 1.0, 0.0));
    let beacon = world.attach_component::<Beacon>(&table).unwrap();
    world
        .component_mut::<Beacon>(&beacon)
        .unwrap()
        .target
        .set_target(Some(room));
    // everything so far travels in the snapshot
    world.collect_outbound();
    (host, beacon)
}

fn poll_until_settled(session: &mut Session) -> Result<WorldState, SessionError> {
    for _ in 0..20 {
        let state = session.poll()?;
        if state == WorldState::Running || state == WorldState::Failed {
            return Ok(state);
        }
    }
    Ok(session.state())
}

#[test]
fn test_authority_reaches_running_without_round_trips() {
    init_logging();
    let mut host = Session::host(SessionConfig::default(), sample_registry()).unwrap();

    assert_eq!(host.state(), WorldState::Running);
    assert_eq!(
        host.state_history(),
        &[WorldState::Connecting, WorldState::Running]
    );
    assert_eq!(host.poll(), Ok(WorldState::Running));
}

#[test]
fn test_replica_passes_every_phase() {
    init_logging();
    let (mut host, beacon) = populated_host();
    let admission = host.admit_peer().unwrap();
    let (transport, link) = LocalLink::builder().admitted(admission, 3).build();

    let mut replica = Session::join(
        SessionConfig::default(),
        sample_registry(),
        test_address(),
        Box::new(transport),
    )
    .unwrap();
    assert_eq!(replica.state(), WorldState::Connecting);
    assert_eq!(link.address(), Some(test_address()));

    assert_eq!(replica.poll(), Ok(WorldState::WaitingForJoinGrant));
    assert_eq!(replica.poll(), Ok(WorldState::InitializingDataModel));
    assert_eq!(replica.poll(), Ok(WorldState::Running));
    assert_eq!(
        replica.state_history(),
        &[
            WorldState::Connecting,
            WorldState::WaitingForJoinGrant,
            WorldState::InitializingDataModel,
            WorldState::Running,
        ]
    );
    assert_eq!(replica.data_progress(), 1.0);
    assert_eq!(replica.world().authority_segment(), 2);

    assert_same_tree(host.world(), replica.world());
    assert_fully_attached(replica.world());
    let copy = replica.world().component::<Beacon>(&beacon).unwrap();
    let room = host.world().children(&host.world().root())[0];
    assert_eq!(copy.target.target(), Some(room));
}

#[test]
fn test_connection_waits_are_reported() {
    let (transport, link) = LocalLink::builder().connect_after(2).grant(2).build();
    let mut replica = Session::join(
        SessionConfig::default(),
        sample_registry(),
        test_address(),
        Box::new(transport),
    )
    .unwrap();

    assert_eq!(replica.poll(), Ok(WorldState::Connecting));
    assert_eq!(replica.poll(), Ok(WorldState::Connecting));
    assert_eq!(replica.poll(), Ok(WorldState::WaitingForJoinGrant));
    assert_eq!(link.connection_polls(), 2);
}

#[test]
fn test_rejected_join_fails_once() {
    let (transport, link) = LocalLink::builder().reject("session is full").build();
    let mut replica = Session::join(
        SessionConfig::default(),
        sample_registry(),
        test_address(),
        Box::new(transport),
    )
    .unwrap();

    let expected = SessionError::Rejected {
        reason: "session is full".to_string(),
    };
    assert_eq!(poll_until_settled(&mut replica), Err(expected.clone()));
    // surfaced once, then only the state remains
    assert_eq!(replica.poll(), Ok(WorldState::Failed));
    assert_eq!(replica.failure(), Some(&expected));
    assert_eq!(
        replica.state_history(),
        &[
            WorldState::Connecting,
            WorldState::WaitingForJoinGrant,
            WorldState::Failed,
        ]
    );
    assert!(link.is_disconnected());
}

#[test]
fn test_transport_failure_fails_session() {
    let (transport, _link) = LocalLink::builder().drop_connection("reset by peer").build();
    let mut replica = Session::join(
        SessionConfig::default(),
        sample_registry(),
        test_address(),
        Box::new(transport),
    )
    .unwrap();

    match replica.poll() {
        Err(SessionError::Transport(TransportError::ConnectionLost { reason })) => {
            assert_eq!(reason, "reset by peer")
        }
        other => panic!("Expected a transport failure, got {:?}", other),
    }
    assert_eq!(replica.state(), WorldState::Failed);
}

#[test]
fn test_refused_connect_is_reported_by_first_poll() {
    let (transport, _link) = LocalLink::builder().refuse_connect("no route").build();
    let mut replica = Session::join(
        SessionConfig::default(),
        sample_registry(),
        test_address(),
        Box::new(transport),
    )
    .unwrap();

    assert_eq!(replica.state(), WorldState::Failed);
    assert!(matches!(
        replica.poll(),
        Err(SessionError::Transport(TransportError::ConnectFailed { .. }))
    ));
    assert_eq!(replica.poll(), Ok(WorldState::Failed));
}

#[test]
fn test_watchdog_times_out_a_stalled_connect() {
    init_logging();
    let (transport, link) = LocalLink::builder().never_connect().build();
    let config = SessionConfig {
        join_timeout: Duration::from_millis(1),
        ..SessionConfig::default()
    };
    let mut replica =
        Session::join(config, sample_registry(), test_address(), Box::new(transport)).unwrap();

    std::thread::sleep(Duration::from_millis(5));
    match replica.poll() {
        Err(SessionError::Timeout { elapsed }) => {
            assert!(elapsed >= Duration::from_millis(1));
            assert!(elapsed < Duration::from_secs(5));
        }
        other => panic!("Expected a timeout, got {:?}", other),
    }
    assert_eq!(replica.state(), WorldState::Failed);
    assert!(link.is_disconnected());
}

#[test]
fn test_watchdog_does_not_apply_once_running() {
    let mut host = Session::host(SessionConfig::default(), sample_registry()).unwrap();
    let admission = host.admit_peer().unwrap();
    let (transport, _link) = LocalLink::builder().admitted(admission, 1).build();
    let config = SessionConfig {
        join_timeout: Duration::from_millis(200),
        ..SessionConfig::default()
    };
    let mut replica =
        Session::join(config, sample_registry(), test_address(), Box::new(transport)).unwrap();
    assert_eq!(poll_until_settled(&mut replica), Ok(WorldState::Running));

    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(replica.poll(), Ok(WorldState::Running));
}

#[test]
fn test_live_updates_flow_both_ways() {
    init_logging();
    let (mut host, beacon) = populated_host();
    let admission = host.admit_peer().unwrap();
    let (transport, link) = LocalLink::builder().admitted(admission, 2).build();
    let mut replica = Session::join(
        SessionConfig::default(),
        sample_registry(),
        test_address(),
        Box::new(transport),
    )
    .unwrap();
    assert_eq!(poll_until_settled(&mut replica), Ok(WorldState::Running));

    // authority -> replica
    let remote_changes = |session: &Session| {
        session
            .world()
            .component::<Beacon>(&beacon)
            .unwrap()
            .remote_changes
    };
    let baseline = remote_changes(&replica);
    let room = host.world().children(&host.world().root())[0];
    let world = host.world_mut();
    world.slot_mut(&room).unwrap().name.set("Hall".to_string());
    world
        .component_mut::<Beacon>(&beacon)
        .unwrap()
        .intensity
        .set(2.0);
    link.push_live(world.collect_outbound());

    assert_eq!(replica.poll(), Ok(WorldState::Running));
    assert_eq!(replica.world().slot(&room).unwrap().name.get(), "Hall");
    assert_eq!(remote_changes(&replica), baseline + 1);

    // replica -> authority: value writes need no structural permission
    replica
        .world_mut()
        .component_mut::<Beacon>(&beacon)
        .unwrap()
        .intensity
        .set(0.5);
    assert_eq!(replica.flush_outbound(), Ok(1));
    for batch in link.take_sent() {
        let report = host.world_mut().apply_batch(&batch).unwrap();
        assert_eq!(report.skipped, 0);
    }
    assert_eq!(
        *host
            .world()
            .component::<Beacon>(&beacon)
            .unwrap()
            .intensity
            .get(),
        0.5
    );
    assert_eq!(replica.flush_outbound(), Ok(0));
}

#[test]
fn test_replica_creation_uses_granted_segment() {
    let mut host = Session::host(SessionConfig::default(), sample_registry()).unwrap();
    host.admit_peer().unwrap();
    let admission = host.admit_peer().unwrap();
    let (transport, link) = LocalLink::builder().admitted(admission, 1).build();
    let config = SessionConfig {
        world: WorldConfig {
            allow_replica_creation: true,
            ..WorldConfig::default()
        },
        ..SessionConfig::default()
    };
    let mut replica =
        Session::join(config, sample_registry(), test_address(), Box::new(transport)).unwrap();
    assert_eq!(poll_until_settled(&mut replica), Ok(WorldState::Running));

    let root = replica.world().root();
    let own = replica.world_mut().add_slot(&root, "Mine").unwrap();
    assert_eq!(own.authority(), 3);
    assert_eq!(replica.flush_outbound(), Ok(9));
    assert_eq!(link.take_sent().len(), 1);
}

#[test]
fn test_data_failure_while_running() {
    let mut host = Session::host(SessionConfig::default(), sample_registry()).unwrap();
    let admission = host.admit_peer().unwrap();
    let (transport, link) = LocalLink::builder().admitted(admission, 1).build();
    let mut replica = Session::join(
        SessionConfig::default(),
        sample_registry(),
        test_address(),
        Box::new(transport),
    )
    .unwrap();
    assert_eq!(poll_until_settled(&mut replica), Ok(WorldState::Running));

    link.fail_data("stream closed");
    assert!(matches!(
        replica.poll(),
        Err(SessionError::Transport(TransportError::ConnectionLost { .. }))
    ));
    assert_eq!(replica.state(), WorldState::Failed);

    replica.destroy();
    assert_eq!(replica.state(), WorldState::Destroyed);
    assert!(replica.world().slots().is_empty());
}
