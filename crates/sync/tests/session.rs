use std::sync::atomic::{AtomicU16, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bridgelink::net::{NetworkEndpoint, Packet};
use bridgelink::{
    decode_payload, CadenceConfig, ListenerConfig, Payload, PrimarySession, SecondaryListener,
    SessionConfig, ShipModel,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(41000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(10, Ordering::SeqCst)
}

fn session_config() -> SessionConfig {
    SessionConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        connect_timeout: Duration::from_millis(500),
        poll_timeout: Duration::from_millis(5),
        ..Default::default()
    }
}

fn bind_listener(port: u16) -> SecondaryListener {
    SecondaryListener::bind(&ListenerConfig {
        bind_addr: format!("127.0.0.1:{}", port),
    })
    .unwrap()
}

/// Services the listener on a background thread until a primary connects.
fn accept_in_background(mut listener: SecondaryListener) -> JoinHandle<SecondaryListener> {
    thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(2);
        while listener.primary().is_none() && Instant::now() < deadline {
            listener.poll(Duration::from_millis(10)).unwrap();
        }
        listener
    })
}

fn connect_one(session: &mut PrimarySession) -> SecondaryListener {
    let port = next_port();
    let handle = accept_in_background(bind_listener(port));
    let connected = session.connect(&format!("127.0.0.1:{}", port)).unwrap();
    assert_eq!(connected, 1);
    handle.join().unwrap()
}

fn poll_until<F>(listener: &mut SecondaryListener, mut done: F) -> Vec<String>
where
    F: FnMut(&[String]) -> bool,
{
    let mut received = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(2);
    while !done(&received) && Instant::now() < deadline {
        received.extend(listener.poll(Duration::from_millis(10)).unwrap());
    }
    received
}

#[test]
fn test_repeated_host_connects_on_consecutive_ports() {
    let port = next_port();
    let first = accept_in_background(bind_listener(port));
    let second = accept_in_background(bind_listener(port + 1));

    let mut session = PrimarySession::new(
        SessionConfig {
            base_port: port,
            ..session_config()
        },
        CadenceConfig::default(),
    );
    assert_eq!(session.connect("127.0.0.1, 127.0.0.1").unwrap(), 2);

    let ports: Vec<u16> = session.peers().iter().map(|p| p.addr.port()).collect();
    assert_eq!(ports, vec![port, port + 1]);
    assert!(first.join().unwrap().primary().is_some());
    assert!(second.join().unwrap().primary().is_some());
}

#[test]
fn test_unreachable_secondary_is_skipped() {
    let dead_port = next_port();
    let live_port = next_port();
    let handle = accept_in_background(bind_listener(live_port));

    let mut session = PrimarySession::new(
        SessionConfig {
            connect_timeout: Duration::from_millis(100),
            ..session_config()
        },
        CadenceConfig::default(),
    );
    let list = format!("127.0.0.1:{},127.0.0.1:{}", dead_port, live_port);
    assert_eq!(session.connect(&list).unwrap(), 1);
    assert_eq!(session.peers()[0].addr.port(), live_port);
    assert!(session.is_networking());
    handle.join().unwrap();
}

#[test]
fn test_cadence_over_the_wire() {
    let mut session = PrimarySession::new(session_config(), CadenceConfig::default());
    let mut listener = connect_one(&mut session);
    let mut model = ShipModel::training_area(1_700_000_000);

    for _ in 0..11 {
        session.update(&mut model).unwrap();
        model.advance(0.1);
    }

    let received = poll_until(&mut listener, |r| r.len() >= 11);
    assert_eq!(received.len(), 11);
    assert!(received[0].starts_with("SC"));
    assert!(received[1..10].iter().all(|text| text.starts_with("OS")));
    assert!(received[10].starts_with("BC"));
}

#[test]
fn test_scenario_ack_clears_tracking() {
    let mut session = PrimarySession::new(session_config(), CadenceConfig::default());
    let mut listener = connect_one(&mut session);
    let mut model = ShipModel::training_area(0);

    session.update(&mut model).unwrap();
    assert_eq!(session.unacked_count(), 1);

    let received = poll_until(&mut listener, |r| !r.is_empty());
    assert!(received[0].starts_with("SC"));

    let deadline = Instant::now() + Duration::from_secs(2);
    while session.unacked_count() > 0 && Instant::now() < deadline {
        model.advance(0.1);
        session.update(&mut model).unwrap();
    }
    assert_eq!(session.unacked_count(), 0);
}

#[test]
fn test_unacked_scenario_is_resent_once_delivered() {
    let config = SessionConfig {
        resend_interval: Duration::ZERO,
        ..session_config()
    };
    let mut session = PrimarySession::new(config, CadenceConfig::default());
    let mut listener = connect_one(&mut session);
    let mut model = ShipModel::training_area(0);

    session.update(&mut model).unwrap();
    model.advance(0.1);
    session.update(&mut model).unwrap();
    model.advance(0.1);
    session.update(&mut model).unwrap();

    let stats = session.stats().unwrap();
    assert!(stats.reliable_resent >= 2);

    let received = poll_until(&mut listener, |r| r.len() >= 3);
    let scenarios = received.iter().filter(|text| text.starts_with("SC")).count();
    assert_eq!(scenarios, 1);
}

#[test]
fn test_secondary_command_edits_primary_model() {
    let mut session = PrimarySession::new(session_config(), CadenceConfig::default());
    let mut listener = connect_one(&mut session);
    let mut model = ShipModel::training_area(0);

    assert!(listener.send_command("MCCL,2,1,090.0,12.0,5.0#").unwrap());

    let deadline = Instant::now() + Duration::from_secs(2);
    while session.stats().unwrap().commands_applied == 0 && Instant::now() < deadline {
        session.update(&mut model).unwrap();
        model.advance(0.1);
    }

    let leg = model.contacts[1].legs[0];
    assert_eq!(leg.bearing, 90.0);
    assert_eq!(leg.speed, 12.0);
    let next_start = model.contacts[1].legs[1].start_time;
    assert!((next_start - leg.start_time - 1500.0).abs() < 0.01);
    assert_eq!(model.contacts[0].legs[0].bearing, 180.0);
}

#[test]
fn test_command_from_unknown_address_is_ignored() {
    let mut session = PrimarySession::new(session_config(), CadenceConfig::default());
    let _listener = connect_one(&mut session);
    let mut model = ShipModel::training_area(0);
    let before = model.contacts.clone();

    let primary_addr = session.local_addr().unwrap();
    let mut stranger = NetworkEndpoint::bind("127.0.0.1:0").unwrap();
    stranger
        .send_to(&Packet::best_effort("MCDL,1,1#"), primary_addr)
        .unwrap();

    thread::sleep(Duration::from_millis(50));
    session.update(&mut model).unwrap();

    assert_eq!(model.contacts, before);
    assert_eq!(session.stats().unwrap().commands_applied, 0);
}

#[test]
fn test_shutdown_reaches_secondaries() {
    let mut session = PrimarySession::new(session_config(), CadenceConfig::default());
    let mut listener = connect_one(&mut session);

    assert_eq!(session.shutdown_all_secondaries(), 1);

    let received = poll_until(&mut listener, |r| !r.is_empty());
    assert_eq!(decode_payload(&received[0]).unwrap(), Payload::Shutdown);
}

#[test]
fn test_disconnect_clears_primary_on_secondary() {
    let mut session = PrimarySession::new(session_config(), CadenceConfig::default());
    let mut listener = connect_one(&mut session);

    session.disconnect();
    assert!(!session.is_networking());

    let deadline = Instant::now() + Duration::from_secs(2);
    while listener.primary().is_some() && Instant::now() < deadline {
        listener.poll(Duration::from_millis(10)).unwrap();
    }
    assert!(listener.primary().is_none());
}
