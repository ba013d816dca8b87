//! Helpers for running child processes with timeouts, cancellation and bounded output.

use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::cancel::{CancelToken, DeadlineExceeded};

/// How often a running child is checked for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output is still drained after the child was killed on timeout.
/// Descendants that inherited the pipes can keep them open indefinitely.
const KILL_DRAIN_GRACE: Duration = Duration::from_millis(200);

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl CommandOutput {
    /// Stdout followed by stderr, with truncation notices.
    pub fn combined_output(&self, label: &str) -> String {
        let mut buf = String::from_utf8_lossy(&self.stdout).into_owned();
        if self.stdout_truncated > 0 {
            buf.push_str(&format!(
                "\n[{label} stdout truncated {} bytes]\n",
                self.stdout_truncated
            ));
        }
        buf.push_str(&String::from_utf8_lossy(&self.stderr));
        if self.stderr_truncated > 0 {
            buf.push_str(&format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            ));
        }
        buf
    }
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Stdin is written and output is read on background threads while the child runs, so
/// neither a child that ignores its input nor a descendant that holds the output pipes
/// can block the caller past the timeout or cancellation. `output_limit_bytes` bounds the
/// amount of stdout/stderr stored in memory (bytes beyond this are discarded while still
/// draining the pipe).
///
/// When `timeout` elapses the child is killed and the output captured so far is returned
/// with `timed_out` set. When `cancel` fires the child is killed and [`DeadlineExceeded`]
/// is returned instead.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
    cancel: &CancelToken,
) -> Result<CommandOutput> {
    cancel.check()?;
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let started = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_reader = StreamReader::spawn("stdout", stdout, output_limit_bytes)?;
    let stderr_reader = StreamReader::spawn("stderr", stderr, output_limit_bytes)?;

    if let Some(input) = stdin {
        let child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        spawn_stdin_writer(child_stdin, input.to_vec())?;
    }

    let mut timed_out = false;
    let status = loop {
        if let Some(status) = child.wait_timeout(POLL_INTERVAL).context("wait for command")? {
            break status;
        }
        if cancel.is_cancelled() {
            warn!("run cancelled, killing child process");
            kill_and_reap(&mut child)?;
            return Err(DeadlineExceeded.into());
        }
        if started.elapsed() >= timeout {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            break kill_and_reap(&mut child)?;
        }
    };

    let drain_until = if timed_out {
        Instant::now().checked_add(KILL_DRAIN_GRACE)
    } else {
        started.checked_add(timeout)
    };
    let drained = wait_for_readers(&[&stdout_reader, &stderr_reader], drain_until, cancel);
    if !drained {
        if cancel.is_cancelled() {
            warn!("run cancelled while draining child output");
            return Err(DeadlineExceeded.into());
        }
        warn!("output pipes still held open by a descendant, keeping partial output");
    }

    let (stdout, stdout_truncated) = stdout_reader.finish().context("collect stdout")?;
    let (stderr, stderr_truncated) = stderr_reader.finish().context("collect stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
        elapsed: started.elapsed(),
    })
}

fn kill_and_reap(child: &mut Child) -> Result<ExitStatus> {
    child.kill().context("kill command")?;
    child.wait().context("wait command after kill")
}

/// The writer thread is never joined. It ends once the input is written or the read end
/// of the pipe closes, and dropping the handle delivers EOF.
fn spawn_stdin_writer(mut child_stdin: ChildStdin, input: Vec<u8>) -> Result<()> {
    thread::Builder::new()
        .name("child-stdin".to_string())
        .spawn(move || {
            if let Err(e) = child_stdin.write_all(&input) {
                // A child that exits without reading stdin is reported through its status.
                debug!(err = %e, "child stdin closed before input was written");
            }
        })
        .context("spawn stdin writer")?;
    Ok(())
}

#[derive(Debug, Default)]
struct Captured {
    buf: Vec<u8>,
    truncated: usize,
}

/// Background reader for one output pipe. Output is visible through `capture` while the
/// thread is still running.
struct StreamReader {
    handle: JoinHandle<Result<()>>,
    capture: Arc<Mutex<Captured>>,
}

impl StreamReader {
    fn spawn<R: Read + Send + 'static>(name: &str, reader: R, limit: usize) -> Result<Self> {
        let capture = Arc::new(Mutex::new(Captured::default()));
        let sink = Arc::clone(&capture);
        let handle = thread::Builder::new()
            .name(format!("child-{name}"))
            .spawn(move || read_stream_limited(reader, limit, &sink))
            .with_context(|| format!("spawn {name} reader"))?;
        Ok(Self { handle, capture })
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Output captured so far. A reader still blocked on the pipe is left detached.
    fn finish(self) -> Result<(Vec<u8>, usize)> {
        if self.handle.is_finished() {
            match self.handle.join() {
                Ok(result) => result?,
                Err(_) => return Err(anyhow!("output reader thread panicked")),
            }
        }
        let mut captured = self.capture.lock().unwrap_or_else(PoisonError::into_inner);
        let captured = std::mem::take(&mut *captured);
        Ok((captured.buf, captured.truncated))
    }
}

/// Wait until every reader hit EOF. Returns `false` if `until` passed or `cancel` fired
/// first. `None` waits without a time bound.
fn wait_for_readers(
    readers: &[&StreamReader],
    until: Option<Instant>,
    cancel: &CancelToken,
) -> bool {
    loop {
        if readers.iter().all(|reader| reader.is_finished()) {
            return true;
        }
        if cancel.is_cancelled() || until.is_some_and(|until| Instant::now() >= until) {
            return false;
        }
        thread::sleep(DRAIN_POLL_INTERVAL);
    }
}

fn read_stream_limited<R: Read>(
    mut reader: R,
    limit: usize,
    capture: &Mutex<Captured>,
) -> Result<()> {
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let mut captured = capture.lock().unwrap_or_else(PoisonError::into_inner);
        let remaining = limit.saturating_sub(captured.buf.len());
        let keep = n.min(remaining);
        captured.buf.extend_from_slice(&chunk[..keep]);
        captured.truncated += n - keep;
    }

    Ok(())
}
