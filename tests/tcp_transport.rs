use mock_peer::net::tcp_listener::TcpListener;
use mock_peer::net::tcp_stream::TcpStream;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener as StdTcpListener, TcpStream as StdTcpStream};
use std::thread;
use std::time::Duration;

fn accept_blocking(listener: &TcpListener) -> TcpStream {
    for _ in 0..500 {
        if let Some((stream, _addr)) = listener.accept().expect("accept") {
            return stream;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("no connection arrived");
}

fn read_blocking(stream: &TcpStream, buf: &mut [u8]) -> usize {
    for _ in 0..500 {
        match stream.read(buf) {
            Ok(n) => return n,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(5))
            }
            Err(err) => panic!("read failed: {err}"),
        }
    }
    panic!("no data arrived");
}

#[test]
fn accept_returns_none_when_nothing_is_pending() {
    let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).expect("bind listener");

    assert!(listener.accept().expect("accept").is_none());
}

#[test]
fn accepted_stream_reads_and_writes() {
    let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).expect("bind listener");
    let addr = listener.local_addr().expect("local addr");

    let client_thread = thread::spawn(move || {
        let mut c = StdTcpStream::connect(addr).expect("connect");
        c.write_all(b"ping").expect("write");
        let mut buf = [0u8; 4];
        c.read_exact(&mut buf).expect("read_exact");
        buf.to_vec()
    });

    let stream = accept_blocking(&listener);
    let mut buf = [0u8; 4];
    let n = read_blocking(&stream, &mut buf);
    assert_eq!(&buf[..n], b"ping");
    assert_eq!(stream.write(b"pong").expect("write"), 4);

    let result = client_thread.join().unwrap();
    assert_eq!(&result[..], b"pong");
}

#[test]
fn accepted_stream_is_non_blocking() {
    let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).expect("bind listener");
    let _client = StdTcpStream::connect(listener.local_addr().unwrap()).expect("connect");

    let stream = accept_blocking(&listener);
    let mut buf = [0u8; 4];
    let err = stream.read(&mut buf).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WouldBlock);
}

#[test]
fn connect_reaches_a_listening_harness() {
    let harness = StdTcpListener::bind("127.0.0.1:0").expect("bind harness");
    let stream = TcpStream::connect(harness.local_addr().unwrap()).expect("connect");
    let (mut accepted, peer) = harness.accept().expect("accept");

    assert_eq!(stream.peer_addr().unwrap(), harness.local_addr().unwrap());
    assert_eq!(stream.write(b"hi").unwrap(), 2);

    let mut buf = [0u8; 2];
    accepted.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"hi");
    assert_eq!(peer.ip(), harness.local_addr().unwrap().ip());
}

#[test]
fn connect_fails_when_nobody_listens() {
    let addr = {
        let scratch = StdTcpListener::bind("127.0.0.1:0").unwrap();
        scratch.local_addr().unwrap()
    };

    let err = TcpStream::connect(addr).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
}

#[test]
fn bind_fails_on_an_address_in_use() {
    let taken = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let err = TcpListener::bind(taken.local_addr().unwrap()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AddrInUse);
}

#[test]
fn remote_close_reads_zero() {
    let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).expect("bind listener");
    let client = StdTcpStream::connect(listener.local_addr().unwrap()).expect("connect");

    let mut stream = accept_blocking(&listener);
    drop(client);

    let mut buf = [0u8; 4];
    assert_eq!(read_blocking(&stream, &mut buf), 0);

    stream.close();
    stream.close();
    assert!(stream.is_closed());
}
