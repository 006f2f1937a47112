//! Bridge from OS termination signals to a [`CancelToken`].
//!
//! The handler only stores the signal number in an atomic; a watcher
//! thread turns that into a cancellation the supervisor acts on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::loader::CancelToken;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

static RECEIVED: AtomicI32 = AtomicI32::new(0);

#[cfg(unix)]
extern "C" fn record(signal: nix::libc::c_int) {
    RECEIVED.store(signal, Ordering::SeqCst);
}

/// Install handlers for `SIGTERM`, `SIGINT` and `SIGHUP`.
pub fn install() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

        let action = SigAction::new(
            SigHandler::Handler(record),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        for signal in [Signal::SIGTERM, Signal::SIGINT, Signal::SIGHUP] {
            // SAFETY: `record` only performs an atomic store, which is
            // async-signal-safe.
            unsafe { sigaction(signal, &action) }.map_err(std::io::Error::from)?;
        }
    }
    Ok(())
}

/// Signal received since the last call, if any.
pub fn take_received() -> Option<i32> {
    match RECEIVED.swap(0, Ordering::SeqCst) {
        0 => None,
        sig => Some(sig),
    }
}

/// Background thread forwarding received signals into a token.
/// Stops when dropped.
pub struct SignalWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SignalWatcher {
    pub fn spawn(cancel: CancelToken) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::Acquire) {
                if let Some(signal) = take_received() {
                    tracing::info!(signal, "termination signal received");
                    cancel.cancel_with(signal);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
