//! Bound actions: the zero-argument closures stored by listener registries.
//!
//! Every registration shape (free function, free function with arguments,
//! instance method, instance method with arguments) is reduced to a single
//! [`BoundAction`] when the listener is registered. Arguments are moved into
//! the closure at that moment and are never re-read; nothing supplied at fire
//! time can reach a handler.
//!
//! # Instance binding
//!
//! Instance-bound actions hold a [`Weak`] reference to the target. The bus
//! never keeps an instance alive: keeping it alive for as long as its
//! listeners should run is the caller's job. Once the instance is dropped the
//! action reports [`Invocation::Expired`] and its registry discards it.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::ListenerError;

/// Outcome of a single action invocation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// The handler ran to completion.
    Completed,
    /// The bound instance no longer exists; the handler was not called.
    Expired,
}

/// Conversion from a handler's return value into an invocation result.
///
/// Implemented for `()` (infallible handlers) and for `Result<(), E>` where
/// `E` converts into [`ListenerError`], so both plain and fallible closures
/// can be registered without wrapping.
pub trait IntoInvocation {
    /// Convert the handler's return value.
    fn into_invocation(self) -> Result<Invocation, ListenerError>;
}

impl IntoInvocation for () {
    fn into_invocation(self) -> Result<Invocation, ListenerError> {
        Ok(Invocation::Completed)
    }
}

impl<E> IntoInvocation for Result<(), E>
where
    E: Into<ListenerError>,
{
    fn into_invocation(self) -> Result<Invocation, ListenerError> {
        self.map(|()| Invocation::Completed).map_err(Into::into)
    }
}

/// How an action was bound, kept for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// A free callable, possibly with bound arguments.
    Free,
    /// A callable bound to a (non-owned) instance.
    Instance,
}

type ActionFn = Box<dyn FnMut() -> Result<Invocation, ListenerError>>;

/// A handler with everything it needs captured up front.
///
/// Registries only ever see this type; they cannot tell an instance method
/// from a free function.
pub struct BoundAction {
    call: ActionFn,
    kind: BindingKind,
}

impl BoundAction {
    /// Bind a free callable that takes no arguments.
    pub fn new<F, R>(mut handler: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: IntoInvocation,
    {
        Self {
            call: Box::new(move || handler().into_invocation()),
            kind: BindingKind::Free,
        }
    }

    /// Bind a free callable to a fixed set of arguments.
    ///
    /// `args` is moved into the action now. The handler receives a shared
    /// reference on every call, so a persistent listener sees the same frozen
    /// values each time.
    pub fn with_args<A, F, R>(args: A, mut handler: F) -> Self
    where
        A: 'static,
        F: FnMut(&A) -> R + 'static,
        R: IntoInvocation,
    {
        Self::new(move || handler(&args))
    }

    /// Bind a callable to an instance without taking ownership of it.
    pub fn for_instance<T, F, R>(instance: &Rc<RefCell<T>>, mut handler: F) -> Self
    where
        T: 'static,
        F: FnMut(&mut T) -> R + 'static,
        R: IntoInvocation,
    {
        let target = Rc::downgrade(instance);
        Self {
            call: Box::new(move || call_on_instance(&target, &mut handler)),
            kind: BindingKind::Instance,
        }
    }

    /// Bind a callable to an instance and a fixed set of arguments.
    pub fn for_instance_with_args<T, A, F, R>(
        instance: &Rc<RefCell<T>>,
        args: A,
        mut handler: F,
    ) -> Self
    where
        T: 'static,
        A: 'static,
        F: FnMut(&mut T, &A) -> R + 'static,
        R: IntoInvocation,
    {
        Self::for_instance(instance, move |target: &mut T| handler(target, &args))
    }

    /// How this action was bound.
    pub const fn kind(&self) -> BindingKind {
        self.kind
    }

    /// Run the action once.
    pub(crate) fn invoke(&mut self) -> Result<Invocation, ListenerError> {
        (self.call)()
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

fn call_on_instance<T, F, R>(
    target: &Weak<RefCell<T>>,
    handler: &mut F,
) -> Result<Invocation, ListenerError>
where
    F: FnMut(&mut T) -> R,
    R: IntoInvocation,
{
    let Some(instance) = target.upgrade() else {
        return Ok(Invocation::Expired);
    };
    let mut guard = instance
        .try_borrow_mut()
        .map_err(|_err| ListenerError::InstanceBusy {
            type_name: std::any::type_name::<T>(),
        })?;
    handler(&mut *guard).into_invocation()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }

    #[test]
    fn free_action_runs_handler() {
        let hits = Rc::new(Cell::new(0_u32));
        let seen = Rc::clone(&hits);
        let mut action = BoundAction::new(move || seen.set(seen.get() + 1));

        assert_eq!(action.invoke().unwrap(), Invocation::Completed);
        assert_eq!(action.invoke().unwrap(), Invocation::Completed);
        assert_eq!(hits.get(), 2);
        assert_eq!(action.kind(), BindingKind::Free);
    }

    #[test]
    fn bound_args_are_frozen_at_bind_time() {
        let mut label = String::from("first");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut action = BoundAction::with_args(label.clone(), move |text: &String| {
            sink.borrow_mut().push(text.clone());
        });

        label.push_str("-changed");
        action.invoke().unwrap();
        action.invoke().unwrap();

        assert_eq!(*seen.borrow(), vec!["first".to_owned(), "first".to_owned()]);
        assert_eq!(label, "first-changed");
    }

    #[test]
    fn fallible_handler_error_is_reported() {
        let mut action = BoundAction::new(|| -> Result<(), ListenerError> { Err("boom".into()) });
        let err = action.invoke().unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn instance_action_mutates_target() {
        let counter = Rc::new(RefCell::new(Counter::default()));
        let mut action =
            BoundAction::for_instance_with_args(&counter, 3_u32, |c: &mut Counter, n: &u32| {
                c.hits += n;
            });

        action.invoke().unwrap();
        action.invoke().unwrap();

        assert_eq!(counter.borrow().hits, 6);
        assert_eq!(action.kind(), BindingKind::Instance);
    }

    #[test]
    fn instance_action_does_not_keep_target_alive() {
        let counter = Rc::new(RefCell::new(Counter::default()));
        let mut action = BoundAction::for_instance(&counter, |c: &mut Counter| c.hits += 1);

        assert_eq!(Rc::strong_count(&counter), 1);
        drop(counter);

        assert_eq!(action.invoke().unwrap(), Invocation::Expired);
    }

    #[test]
    fn busy_instance_is_an_error_not_a_panic() {
        let counter = Rc::new(RefCell::new(Counter::default()));
        let mut action = BoundAction::for_instance(&counter, |c: &mut Counter| c.hits += 1);

        let _held = counter.borrow();
        let err = action.invoke().unwrap_err();
        assert!(matches!(err, ListenerError::InstanceBusy { .. }));
    }
}
