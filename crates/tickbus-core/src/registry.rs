//! Per-event listener registry.
//!
//! A [`ListenerRegistry`] owns every listener registered under one event
//! name. Listeners are keyed by a monotonically increasing
//! [`ListenerIndex`] in a [`BTreeMap`], so a dispatch pass visits them in
//! registration order.
//!
//! # Removal during dispatch
//!
//! One-shot listeners must disappear in the same pass that runs them. The
//! pass never erases from the map it is walking: indices of spent listeners
//! go into a side list and are removed once the traversal is over.
//!
//! # Failure policy
//!
//! Dispatch is best-effort and not transactional. The first listener error
//! stops the pass. One-shot listeners that already completed are still
//! removed; the failing listener stays registered because it never completed.
//! Panics are not caught.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::action::{BoundAction, Invocation};
use crate::error::{ListenerError, RegistryError};

/// Registration index of a listener within its registry.
///
/// Unique for the lifetime of the registry and never reused. The value is
/// opaque; it exists for diagnostics and removal bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerIndex(u64);

impl ListenerIndex {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw index value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a listener survives being invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListenerMode {
    /// Removed right after its first successful invocation.
    #[default]
    OneShot,
    /// Invoked on every dispatch pass until its registry is dropped.
    Persistent,
}

impl ListenerMode {
    /// `true` for [`ListenerMode::Persistent`].
    pub const fn is_persistent(self) -> bool {
        matches!(self, Self::Persistent)
    }
}

impl From<bool> for ListenerMode {
    /// `true` maps to [`ListenerMode::Persistent`], `false` to one-shot.
    fn from(persistent: bool) -> Self {
        if persistent {
            Self::Persistent
        } else {
            Self::OneShot
        }
    }
}

#[derive(Debug)]
struct Listener {
    mode: ListenerMode,
    action: BoundAction,
}

/// The failing listener of an aborted pass.
#[derive(Debug)]
pub struct ListenerFailure {
    /// Index of the listener that failed.
    pub index: ListenerIndex,
    /// The error it returned.
    pub source: ListenerError,
}

/// What one call to [`ListenerRegistry::dispatch_all`] did.
#[derive(Debug)]
pub struct DispatchPass {
    /// Listeners whose handler was called (including a failing one).
    pub invoked: usize,
    /// Listeners removed after the pass (spent one-shots and expired
    /// instance bindings).
    pub removed: usize,
    /// Listeners still registered after the pass.
    pub remaining: usize,
    /// Set when a listener failed and the pass stopped early.
    pub failure: Option<ListenerFailure>,
}

impl DispatchPass {
    /// Whether any listener is left in the registry.
    pub const fn has_listeners(&self) -> bool {
        self.remaining > 0
    }
}

/// Ordered collection of listeners for one event name.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_index: u64,
    listeners: BTreeMap<ListenerIndex, Listener>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            next_index: 0,
            listeners: BTreeMap::new(),
        }
    }

    /// Insert a listener under the next free index.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::IndexExhausted`] once `u64::MAX` indices have
    /// been handed out.
    pub fn add(
        &mut self,
        action: BoundAction,
        mode: ListenerMode,
    ) -> Result<ListenerIndex, RegistryError> {
        let index = ListenerIndex::new(self.next_index);
        self.next_index = self
            .next_index
            .checked_add(1)
            .ok_or(RegistryError::IndexExhausted)?;
        self.listeners.insert(index, Listener { mode, action });
        Ok(index)
    }

    /// Invoke every registered listener once, in registration order.
    ///
    /// Spent one-shot listeners and listeners whose bound instance is gone
    /// are removed after the traversal. See the module docs for the failure
    /// policy.
    pub fn dispatch_all(&mut self) -> DispatchPass {
        let mut spent = Vec::new();
        let mut invoked: usize = 0;
        let mut failure = None;

        for (index, listener) in &mut self.listeners {
            match listener.action.invoke() {
                Ok(Invocation::Completed) => {
                    invoked = invoked.saturating_add(1);
                    if !listener.mode.is_persistent() {
                        spent.push(*index);
                    }
                }
                Ok(Invocation::Expired) => {
                    debug!(index = %index, "bound instance dropped, discarding listener");
                    spent.push(*index);
                }
                Err(source) => {
                    invoked = invoked.saturating_add(1);
                    failure = Some(ListenerFailure {
                        index: *index,
                        source,
                    });
                    break;
                }
            }
        }

        let removed = spent.len();
        for index in spent {
            self.listeners.remove(&index);
        }

        DispatchPass {
            invoked,
            removed,
            remaining: self.listeners.len(),
            failure,
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether the registry holds no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    #[cfg(test)]
    pub(crate) const fn with_next_index(next_index: u64) -> Self {
        Self {
            next_index,
            listeners: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    /// Action that appends `tag` to a shared log.
    fn record(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> BoundAction {
        let log = Rc::clone(log);
        BoundAction::new(move || log.borrow_mut().push(tag))
    }

    fn once(registry: &mut ListenerRegistry, action: BoundAction) -> ListenerIndex {
        registry.add(action, ListenerMode::OneShot).unwrap()
    }

    #[test]
    fn indices_are_monotonic() {
        let mut registry = ListenerRegistry::new();
        let a = once(&mut registry, BoundAction::new(|| ()));
        let b = once(&mut registry, BoundAction::new(|| ()));
        assert!(a < b);
        assert_eq!((a.get(), b.get()), (0, 1));

        registry.dispatch_all();
        assert!(registry.is_empty());

        let c = once(&mut registry, BoundAction::new(|| ()));
        assert!(c > b, "indices must not be reused after removal");
        assert_eq!(c.get(), 2);
    }

    #[test]
    fn one_shot_runs_once_and_is_removed() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        once(&mut registry, record(&log, "once"));

        let pass = registry.dispatch_all();
        assert_eq!(pass.invoked, 1);
        assert_eq!(pass.removed, 1);
        assert!(!pass.has_listeners());

        let pass = registry.dispatch_all();
        assert_eq!(pass.invoked, 0);
        assert_eq!(*log.borrow(), vec!["once"]);
    }

    #[test]
    fn mixed_registry_keeps_persistent_listener() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry
            .add(record(&log, "loop"), ListenerMode::Persistent)
            .unwrap();
        once(&mut registry, record(&log, "once"));

        let pass = registry.dispatch_all();
        assert_eq!(pass.invoked, 2);
        assert_eq!(pass.removed, 1);
        assert_eq!(pass.remaining, 1);

        registry.dispatch_all();
        assert_eq!(*log.borrow(), vec!["loop", "once", "loop"]);
    }

    #[test]
    fn adjacent_one_shots_are_all_removed() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        for tag in ["a", "b", "c"] {
            once(&mut registry, record(&log, tag));
        }

        let pass = registry.dispatch_all();
        assert_eq!(pass.invoked, 3);
        assert_eq!(pass.removed, 3);
        assert!(registry.is_empty());
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn failure_stops_pass_and_keeps_failing_listener() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        once(&mut registry, record(&log, "before"));
        let bad = once(
            &mut registry,
            BoundAction::new(|| -> Result<(), ListenerError> { Err("nope".into()) }),
        );
        once(&mut registry, record(&log, "after"));

        let pass = registry.dispatch_all();
        let failure = pass.failure.unwrap();
        assert_eq!(failure.index, bad);
        assert_eq!(pass.invoked, 2);
        assert_eq!(pass.removed, 1);
        assert_eq!(pass.remaining, 2);
        assert_eq!(*log.borrow(), vec!["before"]);
    }

    #[test]
    fn expired_instance_listener_is_discarded_without_running() {
        let target = Rc::new(RefCell::new(0_u32));
        let mut registry = ListenerRegistry::new();
        registry
            .add(
                BoundAction::for_instance(&target, |n: &mut u32| *n += 1),
                ListenerMode::Persistent,
            )
            .unwrap();
        drop(target);

        let pass = registry.dispatch_all();
        assert_eq!(pass.invoked, 0);
        assert_eq!(pass.removed, 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn exhausted_index_space_is_reported() {
        let mut registry = ListenerRegistry::with_next_index(u64::MAX);
        let err = registry
            .add(BoundAction::new(|| ()), ListenerMode::OneShot)
            .unwrap_err();
        assert_eq!(err, RegistryError::IndexExhausted);
        assert!(registry.is_empty());
    }

    #[test]
    fn mode_from_bool() {
        assert_eq!(ListenerMode::from(true), ListenerMode::Persistent);
        assert_eq!(ListenerMode::from(false), ListenerMode::OneShot);
        assert_eq!(ListenerMode::default(), ListenerMode::OneShot);
    }
}
