//! Per-document debounce, built on [`TaskSlot`].
//!
//! Scheduling replaces (and cancels) any pending schedule. When the delay
//! elapses a message carrying the schedule's [`Ticket`] is posted back to the
//! owner, which must call [`Debouncer::fire`] before acting: a schedule that
//! was replaced or cancelled after its message was sent still loses.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::slot::{TaskSlot, Ticket};

#[derive(Debug, Default)]
pub struct Debouncer {
    slot: TaskSlot,
}

impl Debouncer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Post `message(ticket)` to `tx` after `delay` unless rescheduled first.
    pub fn schedule<M, F>(&self, delay: Duration, tx: &mpsc::UnboundedSender<M>, message: F)
    where
        M: Send + 'static,
        F: FnOnce(Ticket) -> M + Send + 'static,
    {
        let ticket = self.slot.begin();
        let token = ticket.token();
        let tx = tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = tx.send(message(ticket));
                }
            }
        });
    }

    /// Claim an elapsed schedule. Only the latest, uncancelled one wins.
    pub fn fire(&self, ticket: &Ticket) -> bool {
        !self.slot.settle(ticket, ()).is_stale()
    }

    pub fn cancel(&self) {
        self.slot.cancel();
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.is_occupied()
    }
}
