//! Cloneable handles for firing events from inside listeners.
//!
//! While the bus is dispatching it is mutably borrowed, so a listener cannot
//! reach it directly. An [`EventPublisher`] shares the bus's pending state
//! instead: the fire queue and a staging area for registrations. Nothing a
//! publisher does runs a listener; fired names wait for the next
//! [`EventBus::tick`] and staged listeners are merged by the bus at its next
//! merge point.
//!
//! Publishers hold a weak reference to that state. A publisher captured by a
//! listener therefore never keeps the bus's queue alive, and once the bus is
//! dropped every publisher call becomes a no-op.
//!
//! Publishers are `!Send`. The bus is meant to live in one update loop.
//!
//! [`EventBus::tick`]: crate::bus::EventBus::tick

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::action::BoundAction;
use crate::registry::ListenerMode;

/// A registration made through a publisher, waiting to be merged.
#[derive(Debug)]
pub(crate) struct StagedListener {
    pub(crate) event: String,
    pub(crate) action: BoundAction,
    pub(crate) mode: ListenerMode,
}

/// State shared between a bus and its publishers.
#[derive(Debug, Default)]
pub(crate) struct PendingState {
    fired: Vec<String>,
    staged: Vec<StagedListener>,
}

impl PendingState {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            fired: Vec::with_capacity(capacity),
            staged: Vec::new(),
        }
    }

    pub(crate) fn push_fired(&mut self, event: String) {
        self.fired.push(event);
    }

    /// Swap out the fire queue, leaving an empty one with `capacity`.
    pub(crate) fn take_fired(&mut self, capacity: usize) -> Vec<String> {
        std::mem::replace(&mut self.fired, Vec::with_capacity(capacity))
    }

    pub(crate) fn take_staged(&mut self) -> Vec<StagedListener> {
        std::mem::take(&mut self.staged)
    }

    pub(crate) const fn fired_len(&self) -> usize {
        self.fired.len()
    }

    pub(crate) const fn staged_len(&self) -> usize {
        self.staged.len()
    }
}

/// Cheap, cloneable handle that queues events and stages listeners.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    pending: Weak<RefCell<PendingState>>,
}

impl EventPublisher {
    pub(crate) fn new(pending: &Rc<RefCell<PendingState>>) -> Self {
        Self {
            pending: Rc::downgrade(pending),
        }
    }

    /// Queue `event` for the next tick.
    ///
    /// Called from a listener during a tick, the event is processed by the
    /// following tick, never by the current one. Does nothing once the bus
    /// is gone.
    pub fn fire_event(&self, event: impl Into<String>) {
        let event = event.into();
        let Some(pending) = self.pending.upgrade() else {
            debug!(event, "bus dropped, discarding fired event");
            return;
        };
        pending.borrow_mut().push_fired(event);
    }

    /// Stage a listener registration.
    ///
    /// The listener joins its registry at the bus's next merge point: the
    /// start of a tick, the end of each dispatch pass, a forced fire, or a
    /// direct registration on the bus. A listener staged from inside a pass is
    /// therefore not invoked by that same pass.
    ///
    /// Staging cannot fail, so nothing is reported back to the caller. If the
    /// target registry has run out of indices when the listener is merged,
    /// the bus logs a warning and drops the listener. Once the bus is gone the
    /// listener is dropped immediately.
    pub fn add_event_listener(
        &self,
        event: impl Into<String>,
        action: BoundAction,
        mode: ListenerMode,
    ) {
        let event = event.into();
        let Some(pending) = self.pending.upgrade() else {
            debug!(event, "bus dropped, discarding staged listener");
            return;
        };
        pending.borrow_mut().staged.push(StagedListener {
            event,
            action,
            mode,
        });
    }

    /// Number of event names waiting for the next tick. `0` once the bus is
    /// gone.
    pub fn pending_events(&self) -> usize {
        self.pending
            .upgrade()
            .map_or(0, |pending| pending.borrow().fired_len())
    }

    /// Whether the bus this publisher was taken from still exists.
    pub fn is_attached(&self) -> bool {
        self.pending.strong_count() > 0
    }
}
