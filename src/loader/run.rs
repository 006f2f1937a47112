use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use super::engine::{self, SIGKILL, SIGTERM};
use super::types::{CancelToken, LoaderCommand, OutputLine, ProcessResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const DRAIN_POLL: Duration = Duration::from_millis(20);
const MIN_DRAIN: Duration = Duration::from_millis(500);

/// Spawn the loader and return a channel that streams its output.
///
/// The caller receives [`OutputLine::Stdout`]/[`OutputLine::Stderr`] as
/// they arrive, followed by exactly one [`OutputLine::Done`] carrying the
/// final result.
pub fn spawn(cmd: LoaderCommand, cancel: CancelToken) -> Result<Receiver<OutputLine>> {
    let mut command = Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &cmd.work_dir {
        command.current_dir(dir);
    }
    engine::isolate(&mut command);

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to spawn `{}`", cmd.program))?;

    let stdout = child.stdout.take().context("loader stdout was not captured")?;
    let stderr = child.stderr.take().context("loader stderr was not captured")?;

    let (tx, rx) = mpsc::channel();
    let log_buf = Arc::new(Mutex::new(String::new()));

    let readers = [
        pump(stdout, tx.clone(), log_buf.clone(), OutputLine::Stdout),
        pump(stderr, tx.clone(), log_buf.clone(), OutputLine::Stderr),
    ];

    std::thread::spawn(move || {
        supervise(child, readers, tx, log_buf, cancel, cmd.timeout, cmd.grace_period);
    });

    Ok(rx)
}

/// Forward every line of `stream` to `tx`, also appending it to `log_buf`.
/// Invalid UTF-8 is replaced rather than ending the stream, so the pipe is
/// always drained.
fn pump<R>(
    stream: R,
    tx: Sender<OutputLine>,
    log_buf: Arc<Mutex<String>>,
    wrap: fn(String) -> OutputLine,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if let Ok(mut buf) = log_buf.lock() {
                        buf.push_str(&line);
                        buf.push('\n');
                    }
                    // Receiver may be dropped; keep draining regardless.
                    let _ = tx.send(wrap(line));
                }
            }
        }
    })
}

fn supervise(
    mut child: Child,
    readers: [JoinHandle<()>; 2],
    tx: Sender<OutputLine>,
    log_buf: Arc<Mutex<String>>,
    cancel: CancelToken,
    timeout: Option<Duration>,
    grace_period: Duration,
) {
    let start = Instant::now();
    let pgid = child.id();
    let mut cancelled = false;
    let mut timed_out = false;
    // Set once a termination signal was sent; the group is killed at this instant.
    let mut kill_at: Option<Instant> = None;

    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(_) => {
                engine::kill_group(&mut child);
                break child.wait().ok();
            }
        }

        match kill_at {
            Some(at) => {
                if Instant::now() >= at {
                    tracing::warn!(pid = child.id(), "loader ignored termination, killing it");
                    engine::kill_group(&mut child);
                    break child.wait().ok();
                }
            }
            None => {
                if let Some(signal) = cancel.signal() {
                    cancelled = true;
                    tracing::info!(pid = child.id(), signal, "forwarding signal to loader");
                    engine::signal_group(&mut child, signal);
                    kill_at = Some(Instant::now() + grace_period);
                } else if let Some(limit) = timeout
                    && start.elapsed() > limit
                {
                    timed_out = true;
                    tracing::warn!(pid = child.id(), timeout_secs = limit.as_secs(), "loader timed out");
                    engine::signal_group(&mut child, SIGTERM);
                    kill_at = Some(Instant::now() + grace_period);
                }
            }
        }

        std::thread::sleep(POLL_INTERVAL);
    };

    // Processes the loader left in its group may still hold the pipes.
    let drain = grace_period.max(MIN_DRAIN);
    if !readers_done(&readers, Instant::now() + drain) {
        tracing::warn!(pgid, "loader exited but its process group still holds the output, terminating it");
        engine::signal_pgid(pgid, SIGTERM);
        if !readers_done(&readers, Instant::now() + drain) {
            engine::signal_pgid(pgid, SIGKILL);
            if !readers_done(&readers, Instant::now() + drain) {
                tracing::warn!(pgid, "output pipes still open, abandoning readers");
            }
        }
    }
    for reader in readers {
        if reader.is_finished() {
            let _ = reader.join();
        }
    }

    let exit_code = exit_status.and_then(|s| s.code());
    let signal = exit_status.as_ref().and_then(engine::termination_signal);
    let log = log_buf.lock().map(|b| b.clone()).unwrap_or_default();

    let _ = tx.send(OutputLine::Done(ProcessResult {
        success: exit_code == Some(0) && !cancelled && !timed_out,
        exit_code,
        signal,
        log,
        cancelled,
        timed_out,
        elapsed: start.elapsed(),
    }));
}

/// Wait until every reader hit end of stream, or `deadline` passes.
fn readers_done(readers: &[JoinHandle<()>], deadline: Instant) -> bool {
    loop {
        if readers.iter().all(JoinHandle::is_finished) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(DRAIN_POLL);
    }
}
