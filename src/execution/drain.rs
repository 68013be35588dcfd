//! Draining a child's stdout and stderr without deadlocking.
//!
//! A child that fills one pipe blocks until the parent reads it. Reading
//! either pipe to completion first can therefore hang forever while the child
//! waits on the other one. Both pipes are drained together until each has
//! reported end-of-stream.

use std::io::{self, Read};
use std::process::{Child, ChildStderr, ChildStdout, ExitStatus};
#[cfg(unix)]
use std::time::Duration;

use tracing::{trace, warn};

/// Buffer size for a single pipe read.
const READ_BUFFER_SIZE: usize = 8192;

/// Idle passes that only yield before the loop starts sleeping.
#[cfg(unix)]
const IDLE_SPINS_BEFORE_SLEEP: u32 = 64;

/// Sleep between idle passes once the child has been quiet for a while.
#[cfg(unix)]
const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Bytes collected from both pipes.
#[derive(Debug, Default)]
pub(crate) struct Captured {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// One pipe being drained. The reader is dropped as soon as it closes.
struct Stream<R> {
    name: &'static str,
    reader: Option<R>,
    buf: Vec<u8>,
}

impl<R: Read> Stream<R> {
    fn new(name: &'static str, reader: R) -> Self {
        Self {
            name,
            reader: Some(reader),
            buf: Vec::new(),
        }
    }

    fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Read everything currently available. Returns whether any progress was
    /// made (bytes read or the stream closed).
    fn drain_available(&mut self, scratch: &mut [u8]) -> bool {
        let Some(reader) = self.reader.as_mut() else {
            return false;
        };

        let mut progressed = false;
        loop {
            match reader.read(scratch) {
                Ok(0) => {
                    trace!(stream = self.name, "end of stream");
                    self.reader = None;
                    return true;
                }
                Ok(n) => {
                    trace!(stream = self.name, bytes = n, "read");
                    self.buf.extend_from_slice(&scratch[..n]);
                    progressed = true;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return progressed,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // An unreadable pipe counts as closed
                    warn!(stream = self.name, error = %e, "pipe read failed");
                    self.reader = None;
                    return true;
                }
            }
        }
    }
}

#[cfg(unix)]
fn set_nonblocking(fd: std::os::unix::io::RawFd) -> io::Result<()> {
    // SAFETY: fcntl on a descriptor owned by a live ChildStdout/ChildStderr.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: same descriptor, only the O_NONBLOCK bit is added.
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Counts consecutive idle passes of the drain loop.
#[cfg(unix)]
#[derive(Debug, Default)]
struct IdleBackoff {
    passes: u32,
}

#[cfg(unix)]
impl IdleBackoff {
    fn reset(&mut self) {
        self.passes = 0;
    }

    /// Whether the next idle pass should sleep rather than yield.
    fn should_sleep(&self) -> bool {
        self.passes >= IDLE_SPINS_BEFORE_SLEEP
    }

    fn wait(&mut self) {
        if self.should_sleep() {
            std::thread::sleep(IDLE_SLEEP);
        } else {
            self.passes += 1;
            std::thread::yield_now();
        }
    }
}

/// Drain both pipes until each reports end-of-stream.
///
/// Both descriptors are switched to non-blocking mode and polled from the
/// calling thread. A pass that makes no progress yields the thread; after
/// enough consecutive idle passes the thread sleeps instead.
#[cfg(unix)]
pub(crate) fn drain(stdout: ChildStdout, stderr: ChildStderr) -> io::Result<Captured> {
    use std::os::unix::io::AsRawFd;

    set_nonblocking(stdout.as_raw_fd())?;
    set_nonblocking(stderr.as_raw_fd())?;

    let mut out = Stream::new("stdout", stdout);
    let mut err = Stream::new("stderr", stderr);
    let mut scratch = [0u8; READ_BUFFER_SIZE];
    let mut idle = IdleBackoff::default();

    while !(out.is_closed() && err.is_closed()) {
        let progressed_out = out.drain_available(&mut scratch);
        let progressed_err = err.drain_available(&mut scratch);

        if progressed_out || progressed_err {
            idle.reset();
        } else {
            idle.wait();
        }
    }

    Ok(Captured {
        stdout: out.buf,
        stderr: err.buf,
    })
}

/// Drain both pipes until each reports end-of-stream.
///
/// Without non-blocking pipe reads, each pipe gets its own scoped thread.
/// Both are joined before returning.
#[cfg(not(unix))]
pub(crate) fn drain(stdout: ChildStdout, stderr: ChildStderr) -> io::Result<Captured> {
    fn drain_to_end<R: Read>(mut stream: Stream<R>) -> Vec<u8> {
        let mut scratch = [0u8; READ_BUFFER_SIZE];
        while !stream.is_closed() {
            stream.drain_available(&mut scratch);
        }
        stream.buf
    }

    std::thread::scope(|scope| {
        let err_handle = scope.spawn(move || drain_to_end(Stream::new("stderr", stderr)));
        let stdout = drain_to_end(Stream::new("stdout", stdout));
        let stderr = err_handle
            .join()
            .map_err(|_| io::Error::other("stderr reader panicked"))?;
        Ok(Captured { stdout, stderr })
    })
}

/// Owns a spawned child and guarantees it is reaped.
///
/// Dropping the guard before [`ChildGuard::wait`] succeeded kills the child
/// and waits for it, so no process or descriptor outlives the invocation.
pub(crate) struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    pub fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Wait for the child to exit.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        warn!(pid = self.child.id(), "killing unreaped child");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that yields scripted results.
    struct Scripted(Vec<io::Result<Vec<u8>>>);

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Ok(0);
            }
            match self.0.remove(0) {
                Ok(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Err(e) => Err(e),
            }
        }
    }

    fn would_block() -> io::Result<Vec<u8>> {
        Err(io::Error::from(io::ErrorKind::WouldBlock))
    }

    #[test]
    fn test_stream_stops_at_would_block() {
        let reader = Scripted(vec![Ok(b"ab".to_vec()), would_block(), Ok(b"cd".to_vec())]);
        let mut stream = Stream::new("stdout", reader);
        let mut scratch = [0u8; 16];

        assert!(stream.drain_available(&mut scratch));
        assert_eq!(stream.buf, b"ab");
        assert!(!stream.is_closed());

        assert!(stream.drain_available(&mut scratch));
        assert_eq!(stream.buf, b"abcd");
        assert!(stream.is_closed());
    }

    #[test]
    fn test_stream_no_progress_when_nothing_available() {
        let mut stream = Stream::new("stderr", Scripted(vec![would_block()]));
        let mut scratch = [0u8; 16];
        assert!(!stream.drain_available(&mut scratch));
        assert!(!stream.is_closed());
    }

    #[test]
    fn test_stream_retries_interrupted() {
        let reader = Scripted(vec![
            Err(io::Error::from(io::ErrorKind::Interrupted)),
            Ok(b"x".to_vec()),
        ]);
        let mut stream = Stream::new("stdout", reader);
        let mut scratch = [0u8; 16];
        stream.drain_available(&mut scratch);
        assert_eq!(stream.buf, b"x");
        assert!(stream.is_closed());
    }

    #[test]
    fn test_stream_read_error_counts_as_closed() {
        let reader = Scripted(vec![
            Ok(b"partial".to_vec()),
            Err(io::Error::from(io::ErrorKind::BrokenPipe)),
        ]);
        let mut stream = Stream::new("stdout", reader);
        let mut scratch = [0u8; 16];
        assert!(stream.drain_available(&mut scratch));
        assert!(stream.is_closed());
        assert_eq!(stream.buf, b"partial");
        assert!(!stream.drain_available(&mut scratch));
    }

    #[test]
    #[cfg(unix)]
    fn test_idle_backoff_sleeps_after_spins() {
        let mut idle = IdleBackoff::default();
        for _ in 0..IDLE_SPINS_BEFORE_SLEEP {
            assert!(!idle.should_sleep());
            idle.wait();
        }
        assert!(idle.should_sleep());

        idle.reset();
        assert!(!idle.should_sleep());
    }

    #[test]
    #[cfg(unix)]
    fn test_quiet_child_output_is_still_captured() {
        use std::process::{Command, Stdio};

        let mut child = Command::new("/bin/sh")
            .args(["-c", "sleep 0.3; echo late; echo late-err >&2"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();
        let stderr = child.stderr.take().unwrap();

        let captured = drain(stdout, stderr).unwrap();
        child.wait().unwrap();

        assert_eq!(captured.stdout, b"late\n");
        assert_eq!(captured.stderr, b"late-err\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_guard_kills_unreaped_child() {
        use std::process::{Command, Stdio};

        let child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id() as libc::pid_t;
        drop(ChildGuard::new(child));

        // SAFETY: signal 0 only checks that the pid exists.
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive, "child should have been killed and reaped");
    }
}
