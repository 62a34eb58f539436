//! Cancellable Task Slot.
//!
//! A slot has at most one current occupant. Starting a new occupant cancels
//! the previous one without waiting for it, and only the occupant that is
//! still current when it finishes gets its result honored. Currency is
//! decided by the identity of the occupant record (`Arc::ptr_eq`), never by a
//! counter, so results arriving in any order are classified correctly.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Occupant {
    token: CancellationToken,
}

/// Proof of having started an operation in a slot.
#[derive(Debug, Clone)]
pub struct Ticket {
    occupant: Arc<Occupant>,
}

impl Ticket {
    /// Token signalled when this operation is superseded or cancelled.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.occupant.token.clone()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.occupant.token.is_cancelled()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome<T> {
    /// Still the current occupant; the value should be applied.
    Current(T),
    /// Superseded or cancelled before completion.
    Stale,
}

impl<T> SlotOutcome<T> {
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }

    pub fn current(self) -> Option<T> {
        match self {
            Self::Current(value) => Some(value),
            Self::Stale => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct TaskSlot {
    current: Mutex<Option<Arc<Occupant>>>,
}

impl TaskSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new occupant, cancelling whatever was there.
    pub fn begin(&self) -> Ticket {
        let occupant = Arc::new(Occupant {
            token: CancellationToken::new(),
        });
        let previous = self.lock().replace(Arc::clone(&occupant));
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        Ticket { occupant }
    }

    /// Whether `ticket` is still the current occupant.
    #[must_use]
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &ticket.occupant))
    }

    /// Finish `ticket`'s operation with `value`.
    ///
    /// A current ticket vacates the slot and gets its value back; any other
    /// ticket is stale and the value is dropped.
    pub fn settle<T>(&self, ticket: &Ticket, value: T) -> SlotOutcome<T> {
        let mut current = self.lock();
        match current.as_ref() {
            Some(occupant) if Arc::ptr_eq(occupant, &ticket.occupant) => {
                *current = None;
                SlotOutcome::Current(value)
            }
            _ => SlotOutcome::Stale,
        }
    }

    /// Start `operation` in this slot and settle its result.
    pub async fn run<F, Fut, T>(&self, operation: F) -> SlotOutcome<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self.begin();
        let value = operation(ticket.token()).await;
        self.settle(&ticket, value)
    }

    /// Cancel and clear the current occupant. No-op when empty.
    pub fn cancel(&self) {
        if let Some(occupant) = self.lock().take() {
            occupant.token.cancel();
        }
    }

    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<Occupant>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
