use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run an already-configured `Command` with a timeout. stdout and stderr are
/// drained on helper threads while the child runs, so a chatty process
/// cannot stall on a full pipe.
///
/// The timeout covers the whole call: a child that exits while a background
/// process keeps its pipes open still fails once the deadline passes. On
/// timeout the child is killed and an `ErrorKind::TimedOut` error is
/// returned.
pub fn run_command_with_timeout(cmd: &mut Command, timeout: Duration) -> std::io::Result<Output> {
    let deadline = Instant::now() + timeout;
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let Some(status) = wait_with_deadline(&mut child, deadline)? else {
        let _ = child.kill();
        let _ = child.wait();
        // Readers are left detached: a grandchild may still hold the
        // pipes open after the direct child is gone.
        return Err(timed_out(timeout));
    };

    Ok(Output {
        status,
        stdout: collect(stdout, deadline).ok_or_else(|| timed_out(timeout))?,
        stderr: collect(stderr, deadline).ok_or_else(|| timed_out(timeout))?,
    })
}

fn timed_out(timeout: Duration) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!("command timed out after {} seconds", timeout.as_secs()),
    )
}

fn wait_with_deadline(
    child: &mut Child,
    deadline: Instant,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut r| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            r.read_to_end(&mut buf).ok();
            let _ = tx.send(buf);
        });
        rx
    })
}

/// Wait for a reader until `deadline`. `None` means the pipe is still open.
fn collect(rx: Option<Receiver<Vec<u8>>>, deadline: Instant) -> Option<Vec<u8>> {
    let Some(rx) = rx else {
        return Some(Vec::new());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(buf) => Some(buf),
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}
