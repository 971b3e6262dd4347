//! The deferred, tick-driven event bus.
//!
//! [`EventBus`] maps event names to [`ListenerRegistry`] values and keeps a
//! fire queue. Firing only queues a name; [`EventBus::tick`] drains the
//! queue and dispatches each name in FIFO order. Handlers therefore run at a
//! point the update loop chooses, never in the middle of the code that
//! signaled the event.
//!
//! # Per-name lifecycle
//!
//! ```text
//! ABSENT --add_event_listener--> REGISTERED --dispatch--> DISPATCHING
//!                                    ^                        |
//!                                    +---- listeners left ----+
//!                                  ABSENT <---- registry empty
//! ```
//!
//! A registry exists only while it holds at least one listener. It is created
//! on first registration and evicted by the dispatch that leaves it empty.
//!
//! # Same-tick cascades
//!
//! `tick` swaps the queue out before dispatching. Names fired by listeners
//! during the tick land in the fresh queue and run on the next tick, so a
//! listener that fires its own event cannot spin a single tick forever.
//!
//! # Failures
//!
//! A listener error stops the pass for its own event name only. Every other
//! queued name in the same tick is still dispatched. Failures come back in
//! the [`TickSummary`]; the bus does not retry, translate, or swallow them.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::action::BoundAction;
use crate::config::BusConfig;
use crate::error::{BusError, DispatchError};
use crate::publisher::{EventPublisher, PendingState};
use crate::registry::{DispatchPass, ListenerIndex, ListenerMode, ListenerRegistry};

/// Result of dispatching one event name once.
#[derive(Debug)]
pub struct DispatchReport {
    /// Event name that was dispatched.
    pub event: String,
    /// Listeners whose handler was called.
    pub invoked: usize,
    /// Listeners removed by the pass.
    pub removed: usize,
    /// Listeners still registered under `event`.
    pub remaining: usize,
    /// Whether the pass emptied the registry and it was evicted.
    pub evicted: bool,
    /// The listener failure that stopped the pass, if any.
    pub failure: Option<DispatchError>,
}

impl DispatchReport {
    fn from_pass(event: &str, pass: DispatchPass) -> Self {
        let evicted = !pass.has_listeners();
        Self {
            event: event.to_owned(),
            invoked: pass.invoked,
            removed: pass.removed,
            remaining: pass.remaining,
            evicted,
            failure: pass.failure.map(|failure| DispatchError {
                event: event.to_owned(),
                index: failure.index,
                source: failure.source,
            }),
        }
    }

    /// Turn a failed pass into an `Err`, for callers that want `?`.
    ///
    /// # Errors
    ///
    /// Returns the [`DispatchError`] if a listener failed during the pass.
    pub fn into_result(mut self) -> Result<Self, DispatchError> {
        self.failure.take().map_or(Ok(self), Err)
    }
}

/// Summary of a single [`EventBus::tick`].
#[derive(Debug, Default)]
pub struct TickSummary {
    /// Tick number (1 for the first tick of a bus).
    pub tick: u64,
    /// Names that were queued when the tick started.
    pub queued: usize,
    /// Queued names that had a registry and were dispatched.
    pub dispatched: usize,
    /// Queued names with no registry, dropped silently.
    pub skipped: usize,
    /// Total handler calls across all passes.
    pub invoked: usize,
    /// Total listeners removed across all passes.
    pub removed: usize,
    /// Names whose registry was evicted during this tick.
    pub evicted: Vec<String>,
    /// Listener failures, in dispatch order.
    pub failures: Vec<DispatchError>,
}

impl TickSummary {
    fn new(tick: u64, queued: usize) -> Self {
        Self {
            tick,
            queued,
            ..Self::default()
        }
    }

    fn absorb(&mut self, report: DispatchReport) {
        self.dispatched = self.dispatched.saturating_add(1);
        self.invoked = self.invoked.saturating_add(report.invoked);
        self.removed = self.removed.saturating_add(report.removed);
        if report.evicted {
            self.evicted.push(report.event);
        }
        if let Some(failure) = report.failure {
            self.failures.push(failure);
        }
    }

    /// `true` when no listener failed during the tick.
    pub const fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Deferred publish/subscribe dispatcher driven by [`tick`](Self::tick).
///
/// The bus is single-threaded (`!Send`). Separate subsystems that want
/// isolated event spaces should each own their own bus.
#[derive(Debug)]
pub struct EventBus {
    registries: BTreeMap<String, ListenerRegistry>,
    pending: Rc<RefCell<PendingState>>,
    config: BusConfig,
    ticks: u64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with default settings.
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a bus with the given settings.
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            registries: BTreeMap::new(),
            pending: Rc::new(RefCell::new(PendingState::with_capacity(
                config.queue_capacity,
            ))),
            config,
            ticks: 0,
        }
    }

    /// A handle that can fire events and stage listeners from inside
    /// handlers.
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher::new(&self.pending)
    }

    /// The settings this bus was built with.
    pub const fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Register `action` under `event`.
    ///
    /// The registry for `event` is created if this is its first listener.
    /// Registering under a name that already has listeners adds alongside
    /// them. Any listeners staged through publishers are merged first.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Registry`] if the registry for `event` has run
    /// out of listener indices.
    pub fn add_event_listener(
        &mut self,
        event: impl Into<String>,
        action: BoundAction,
        mode: ListenerMode,
    ) -> Result<ListenerIndex, BusError> {
        self.merge_staged();
        self.insert(event.into(), action, mode)
    }

    /// Queue `event` for the next tick.
    ///
    /// Never looks at the registries and never runs a listener. Names
    /// without listeners are accepted and dropped when the queue drains.
    pub fn fire_event(&self, event: impl Into<String>) {
        self.pending.borrow_mut().push_fired(event.into());
    }

    /// Dispatch `event` right now, bypassing the queue.
    ///
    /// Applies the same one-shot removal and eviction rules as a tick. This
    /// is an escape hatch: it runs handlers at the call site, which is
    /// exactly what the queue exists to avoid. Returns `None` when `event`
    /// has no listeners.
    pub fn fire_event_force(&mut self, event: &str) -> Option<DispatchReport> {
        self.merge_staged();
        let report = self.dispatch(event);
        self.merge_staged();
        report
    }

    /// Drain the fire queue, dispatching each queued name in order.
    ///
    /// The queue is swapped out before the first dispatch, so names fired
    /// while this tick runs are left for the next one. A name queued twice
    /// is dispatched twice, each pass seeing whatever listeners exist at
    /// that point.
    pub fn tick(&mut self) -> TickSummary {
        self.ticks = self.ticks.saturating_add(1);
        self.merge_staged();

        let queued = self
            .pending
            .borrow_mut()
            .take_fired(self.config.queue_capacity);
        if self.config.is_backlogged(queued.len()) {
            warn!(
                tick = self.ticks,
                queued = queued.len(),
                threshold = self.config.backlog_warn_threshold,
                "event queue backlog"
            );
        }

        let mut summary = TickSummary::new(self.ticks, queued.len());
        for event in &queued {
            match self.dispatch(event) {
                Some(report) => summary.absorb(report),
                None => summary.skipped = summary.skipped.saturating_add(1),
            }
            self.merge_staged();
        }

        debug!(
            tick = summary.tick,
            queued = summary.queued,
            dispatched = summary.dispatched,
            skipped = summary.skipped,
            invoked = summary.invoked,
            failures = summary.failures.len(),
            "tick complete"
        );
        summary
    }

    /// Whether `event` currently has a registry.
    ///
    /// Listeners still staged in a publisher are not counted.
    pub fn has_listeners(&self, event: &str) -> bool {
        self.registries.contains_key(event)
    }

    /// Number of listeners registered under `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.registries.get(event).map_or(0, ListenerRegistry::len)
    }

    /// Number of event names with at least one listener.
    pub fn event_count(&self) -> usize {
        self.registries.len()
    }

    /// Number of names waiting for the next tick.
    pub fn pending_events(&self) -> usize {
        self.pending.borrow().fired_len()
    }

    /// Number of publisher registrations not yet merged.
    pub fn staged_listeners(&self) -> usize {
        self.pending.borrow().staged_len()
    }

    /// Ticks run so far.
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// No listeners, nothing queued, nothing staged.
    pub fn is_idle(&self) -> bool {
        let pending = self.pending.borrow();
        self.registries.is_empty() && pending.fired_len() == 0 && pending.staged_len() == 0
    }

    fn insert(
        &mut self,
        event: String,
        action: BoundAction,
        mode: ListenerMode,
    ) -> Result<ListenerIndex, BusError> {
        if let Some(registry) = self.registries.get_mut(&event) {
            let index = registry
                .add(action, mode)
                .map_err(|source| BusError::Registry {
                    event: event.clone(),
                    source,
                })?;
            debug!(event, %index, ?mode, "listener registered");
            return Ok(index);
        }

        let mut registry = ListenerRegistry::new();
        let index = registry
            .add(action, mode)
            .map_err(|source| BusError::Registry {
                event: event.clone(),
                source,
            })?;
        debug!(event, %index, ?mode, "listener registered, registry created");
        self.registries.insert(event, registry);
        Ok(index)
    }

    fn merge_staged(&mut self) {
        let staged = self.pending.borrow_mut().take_staged();
        for listener in staged {
            if let Err(err) = self.insert(listener.event, listener.action, listener.mode) {
                warn!(error = %err, "dropping staged listener");
            }
        }
    }

    fn dispatch(&mut self, event: &str) -> Option<DispatchReport> {
        let registry = self.registries.get_mut(event)?;
        let pass = registry.dispatch_all();
        let report = DispatchReport::from_pass(event, pass);

        if let Some(failure) = &report.failure {
            warn!(
                event,
                index = %failure.index,
                error = %failure.source,
                "listener failed, pass aborted"
            );
        }
        if report.evicted {
            self.registries.remove(event);
            debug!(event, "registry empty, evicted");
        }
        Some(report)
    }
}
