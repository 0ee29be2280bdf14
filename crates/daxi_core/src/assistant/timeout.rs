//! Deadline for blocking assistant calls.

use crate::assistant::guard::InFlightTicket;
use crate::assistant::AssistantError;
use log::warn;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Runs `task` on a worker thread and waits at most `timeout` for it.
///
/// `ticket` moves into the worker and is released only when `task` returns.
/// A task that misses the deadline keeps running detached and keeps the slot;
/// its result is dropped, so it can never reach session state.
pub fn run_with_timeout<T, F>(
    timeout: Duration,
    ticket: InFlightTicket,
    task: F,
) -> Result<T, AssistantError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AssistantError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("daxi-assistant".to_string())
        .spawn(move || {
            let result = task();
            drop(ticket);
            let _ = tx.send(result);
        })
        .map_err(|err| AssistantError::Service(format!("failed to start assistant worker: {err}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                "event=assistant_call module=assistant status=timeout timeout_ms={}",
                timeout.as_millis()
            );
            Err(AssistantError::TimedOut(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => Err(AssistantError::Service(
            "assistant worker stopped without a reply".to_string(),
        )),
    }
}
