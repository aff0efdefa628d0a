use mock_peer::{Exit, RelayBuilder, RelayError, ShutdownHandle};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener as StdTcpListener, TcpStream as StdTcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Running {
    control: StdTcpStream,
    peer_addr: SocketAddr,
    shutdown: ShutdownHandle,
    relay: JoinHandle<Result<Exit, RelayError>>,
}

fn start(configure: impl FnOnce(RelayBuilder) -> RelayBuilder) -> Running {
    let harness = StdTcpListener::bind("127.0.0.1:0").expect("bind harness");
    let builder = RelayBuilder::new(
        harness.local_addr().unwrap(),
        "127.0.0.1:0".parse().unwrap(),
    );

    let relay = configure(builder).build().expect("build relay");
    let (control, _) = harness.accept().expect("accept control");
    control.set_read_timeout(Some(TIMEOUT)).unwrap();

    let peer_addr = relay.local_addr().expect("local addr");
    let shutdown = relay.shutdown_handle();
    let relay = thread::spawn(move || relay.run());

    Running {
        control,
        peer_addr,
        shutdown,
        relay,
    }
}

fn connect_peer(addr: SocketAddr) -> StdTcpStream {
    let peer = StdTcpStream::connect(addr).expect("connect peer");
    peer.set_read_timeout(Some(TIMEOUT)).unwrap();
    peer
}

/// Reads until the relay closes the connection.
fn read_until_closed(peer: &mut StdTcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    peer.read_to_end(&mut received).expect("read_to_end");
    received
}

fn stop(running: Running) -> Exit {
    running.shutdown.shutdown();
    running.relay.join().unwrap().expect("relay result")
}

#[test]
fn control_payload_reaches_next_peer_then_peer_is_closed() {
    let mut running = start(|b| b);

    running.control.write_all(b"PING").unwrap();
    let mut peer = connect_peer(running.peer_addr);

    assert_eq!(read_until_closed(&mut peer), b"PING");
    assert_eq!(stop(running), Exit::Cancelled);
}

#[test]
fn peer_payload_reaches_control_then_peer_is_closed() {
    let mut running = start(|b| b);

    let mut peer = connect_peer(running.peer_addr);
    peer.write_all(b"PONG").unwrap();

    let mut buf = [0u8; 4];
    running.control.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"PONG");
    assert!(read_until_closed(&mut peer).is_empty());

    assert_eq!(stop(running), Exit::Cancelled);
}

#[test]
fn control_payload_survives_until_a_peer_arrives() {
    let mut running = start(|b| b);

    running.control.write_all(b"X").unwrap();
    thread::sleep(Duration::from_millis(500));

    let mut peer = connect_peer(running.peer_addr);
    assert_eq!(read_until_closed(&mut peer), b"X");

    assert_eq!(stop(running), Exit::Cancelled);
}

#[test]
fn consecutive_cycles_start_from_a_clean_slot() {
    let mut running = start(|b| b);

    running.control.write_all(b"FIRST").unwrap();
    let mut first = connect_peer(running.peer_addr);
    assert_eq!(read_until_closed(&mut first), b"FIRST");

    running.control.write_all(b"SECOND").unwrap();
    let mut second = connect_peer(running.peer_addr);
    assert_eq!(read_until_closed(&mut second), b"SECOND");

    let mut third = connect_peer(running.peer_addr);
    third.write_all(b"REPLY").unwrap();
    let mut buf = [0u8; 5];
    running.control.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"REPLY");
    assert!(read_until_closed(&mut third).is_empty());

    assert_eq!(stop(running), Exit::Cancelled);
}

#[test]
fn block_size_caps_a_single_payload() {
    let mut running = start(|b| b.read_block_size(4));

    // The second block finds the slot occupied and is dropped.
    running.control.write_all(b"ABCDEFGH").unwrap();
    thread::sleep(Duration::from_millis(200));

    let mut peer = connect_peer(running.peer_addr);
    assert_eq!(read_until_closed(&mut peer), b"ABCD");

    assert_eq!(stop(running), Exit::Cancelled);
}

#[test]
fn control_close_terminates_the_relay_and_releases_the_listener() {
    let running = start(|b| b);
    let peer_addr = running.peer_addr;

    let _idle_peer = connect_peer(peer_addr);
    drop(running.control);

    let exit = running.relay.join().unwrap().expect("relay result");
    assert_eq!(exit, Exit::ControlClosed);

    let err = StdTcpStream::connect(peer_addr).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
}

#[test]
fn peer_hangup_only_removes_that_peer() {
    let mut running = start(|b| b);

    let quitter = connect_peer(running.peer_addr);
    thread::sleep(Duration::from_millis(100));
    drop(quitter);
    thread::sleep(Duration::from_millis(100));

    running.control.write_all(b"AFTER").unwrap();
    let mut peer = connect_peer(running.peer_addr);
    assert_eq!(read_until_closed(&mut peer), b"AFTER");

    assert_eq!(stop(running), Exit::Cancelled);
}

#[test]
fn shutdown_closes_control_and_open_peers() {
    let mut running = start(|b| b);

    let mut peer = connect_peer(running.peer_addr);
    thread::sleep(Duration::from_millis(100));

    running.shutdown.shutdown();
    let exit = running.relay.join().unwrap().expect("relay result");
    assert_eq!(exit, Exit::Cancelled);

    let mut rest = Vec::new();
    running.control.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());
    assert!(read_until_closed(&mut peer).is_empty());
}

#[test]
fn extra_peers_beyond_the_bound_are_turned_away() {
    let mut running = start(|b| b.max_peers(1));

    let mut kept = connect_peer(running.peer_addr);
    thread::sleep(Duration::from_millis(100));

    let mut extra = connect_peer(running.peer_addr);
    assert!(read_until_closed(&mut extra).is_empty());

    running.control.write_all(b"Z").unwrap();
    assert_eq!(read_until_closed(&mut kept), b"Z");

    assert_eq!(stop(running), Exit::Cancelled);
}

#[test]
fn waiting_peer_is_served_by_the_next_cycle() {
    let mut running = start(|b| b);

    let mut talker = connect_peer(running.peer_addr);
    talker.write_all(b"HELLO").unwrap();
    let mut buf = [0u8; 5];
    running.control.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"HELLO");
    assert!(read_until_closed(&mut talker).is_empty());

    let mut listener = connect_peer(running.peer_addr);
    thread::sleep(Duration::from_millis(100));
    running.control.write_all(b"WORLD").unwrap();
    assert_eq!(read_until_closed(&mut listener), b"WORLD");

    assert_eq!(stop(running), Exit::Cancelled);
}

#[test]
fn two_waiting_peers_each_receive_one_control_payload() {
    let mut running = start(|b| b);

    let first = connect_peer(running.peer_addr);
    let second = connect_peer(running.peer_addr);
    thread::sleep(Duration::from_millis(100));

    let readers: Vec<_> = [first, second]
        .into_iter()
        .map(|mut peer| thread::spawn(move || read_until_closed(&mut peer)))
        .collect();

    running.control.write_all(b"A").unwrap();
    thread::sleep(Duration::from_millis(200));
    running.control.write_all(b"B").unwrap();

    let mut deliveries: Vec<Vec<u8>> = readers.into_iter().map(|r| r.join().unwrap()).collect();
    deliveries.sort();
    assert_eq!(deliveries, vec![b"A".to_vec(), b"B".to_vec()]);

    assert_eq!(stop(running), Exit::Cancelled);
}

#[test]
fn idle_peers_are_closed_after_the_timeout() {
    let running = start(|b| b.peer_idle_timeout(Duration::from_millis(200)));

    let mut idle = connect_peer(running.peer_addr);
    assert!(read_until_closed(&mut idle).is_empty());

    assert_eq!(stop(running), Exit::Cancelled);
}
