//! Single-slot in-flight guard for assistant calls.
//!
//! # Invariants
//! - At most one ticket exists per guard at any time.
//! - Dropping the ticket frees the slot, including on early return or panic.

use crate::assistant::{AssistantError, Operation};
use log::warn;
use std::sync::{Arc, Mutex, PoisonError};

/// Shared slot; clone the `Arc` to check it from other threads.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    slot: Mutex<Option<Operation>>,
}

impl InFlightGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims the slot for `operation`.
    ///
    /// # Errors
    /// - [`AssistantError::Busy`] naming the operation already holding it.
    pub fn try_acquire(self: &Arc<Self>, operation: Operation) -> Result<InFlightTicket, AssistantError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = *slot {
            warn!(
                "event=assistant_guard module=assistant status=rejected active={active} requested={operation}"
            );
            return Err(AssistantError::Busy(active));
        }
        *slot = Some(operation);
        Ok(InFlightTicket {
            guard: Arc::clone(self),
            operation,
        })
    }

    /// Operation currently holding the slot.
    pub fn active(&self) -> Option<Operation> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of holding the slot.
#[derive(Debug)]
pub struct InFlightTicket {
    guard: Arc<InFlightGuard>,
    operation: Operation,
}

impl InFlightTicket {
    pub fn operation(&self) -> Operation {
        self.operation
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        let mut slot = self.guard.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::InFlightGuard;
    use crate::assistant::{AssistantError, Operation};
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn second_acquire_is_rejected_until_ticket_drops() {
        let guard = InFlightGuard::new();
        let ticket = guard.try_acquire(Operation::Generate).unwrap();
        assert_eq!(ticket.operation(), Operation::Generate);

        let err = guard.try_acquire(Operation::ExportDdl).unwrap_err();
        assert!(matches!(err, AssistantError::Busy(Operation::Generate)));

        drop(ticket);
        assert_eq!(guard.active(), None);
        guard.try_acquire(Operation::ExportDdl).unwrap();
    }

    #[test]
    fn guard_rejects_callers_on_other_threads_while_held() {
        let guard = InFlightGuard::new();
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let guard = guard.clone();
            thread::spawn(move || {
                let _ticket = guard.try_acquire(Operation::Generate).unwrap();
                held_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        };

        held_rx.recv().unwrap();
        assert!(matches!(
            guard.try_acquire(Operation::ExportDocumentation),
            Err(AssistantError::Busy(Operation::Generate))
        ));

        release_tx.send(()).unwrap();
        holder.join().unwrap();
        assert!(guard.try_acquire(Operation::ExportDocumentation).is_ok());
    }
}
