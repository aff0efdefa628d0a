use mock_peer::reactor::event::{Interest, Token};
use mock_peer::reactor::poller::Poller;
use mock_peer::reactor::waker::Waker;

use libc::c_int;
use std::os::unix::io::{AsRawFd, RawFd};
use std::thread;
use std::time::Duration;

struct Pipe {
    read: RawFd,
    write: RawFd,
}

impl Pipe {
    fn new() -> Self {
        let mut fds = [0 as c_int; 2];
        let res = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(res, 0, "pipe() failed");
        Self {
            read: fds[0],
            write: fds[1],
        }
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read);
            libc::close(self.write);
        }
    }
}

#[test]
fn empty_pipe_times_out_without_events() {
    let pipe = Pipe::new();
    let mut poller = Poller::new();
    let mut events = Vec::new();

    poller.register(pipe.read, Token(1), Interest::READABLE);
    poller
        .wait(&mut events, Some(Duration::from_millis(10)))
        .unwrap();
    assert!(events.is_empty());
}

#[test]
fn written_pipe_reports_read_end_readable() {
    let pipe = Pipe::new();
    let mut poller = Poller::new();
    let mut events = Vec::new();

    let buf = [1u8; 1];
    let wrote = unsafe { libc::write(pipe.write, buf.as_ptr() as *const _, 1) };
    assert_eq!(wrote, 1);

    poller.register(pipe.read, Token(1), Interest::READABLE);
    poller.register(pipe.write, Token(2), Interest::READ_WRITE);
    poller
        .wait(&mut events, Some(Duration::from_secs(1)))
        .unwrap();

    let read_end = events.iter().find(|e| e.token() == Token(1)).unwrap();
    assert!(read_end.is_readable());

    let write_end = events.iter().find(|e| e.token() == Token(2)).unwrap();
    assert!(write_end.is_writable());
}

#[test]
fn closed_write_end_reports_read_end_readable() {
    let mut fds = [0 as c_int; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    unsafe { libc::close(fds[1]) };

    let mut poller = Poller::new();
    let mut events = Vec::new();
    poller.register(fds[0], Token(4), Interest::READABLE);
    poller
        .wait(&mut events, Some(Duration::from_secs(1)))
        .unwrap();

    assert_eq!(events.len(), 1);
    assert!(events[0].is_readable());
    unsafe { libc::close(fds[0]) };
}

#[test]
fn clear_forgets_registrations() {
    let mut poller = Poller::new();
    poller.register(0, Token(0), Interest::READABLE);
    assert_eq!(poller.len(), 1);

    poller.clear();
    assert!(poller.is_empty());
}

#[test]
fn handle_wakes_poller_from_another_thread() {
    let waker = Waker::new().unwrap();
    let handle = waker.handle();
    let mut poller = Poller::new();
    let mut events = Vec::new();

    let thread = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        handle.shutdown();
    });

    poller.register(waker.as_raw_fd(), Token(9), Interest::READABLE);
    poller
        .wait(&mut events, Some(Duration::from_secs(5)))
        .unwrap();
    thread.join().unwrap();

    assert_eq!(events.len(), 1);
    assert!(events[0].is_readable());
}

#[test]
fn drain_clears_readiness() {
    let waker = Waker::new().unwrap();
    let handle = waker.handle();
    handle.shutdown();
    handle.shutdown();
    waker.drain();

    let mut poller = Poller::new();
    let mut events = Vec::new();
    poller.register(waker.as_raw_fd(), Token(9), Interest::READABLE);
    poller.wait(&mut events, Some(Duration::ZERO)).unwrap();

    assert!(events.is_empty());
}
