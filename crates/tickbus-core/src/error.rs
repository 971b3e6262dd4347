//! Error types for listener registration and dispatch.
//!
//! The bus itself never invents failures: unknown event names and repeated
//! registrations are not errors. What it does surface is what listeners
//! return ([`ListenerError`], wrapped with its event and index as a
//! [`DispatchError`]) and the single bookkeeping failure a registry can hit
//! ([`RegistryError`]).

use crate::registry::ListenerIndex;

/// Boxed error type carried by failing handlers.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by a listener invocation.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The handler itself returned an error.
    #[error("handler failed: {source}")]
    Handler {
        /// The error produced by the handler.
        source: BoxedError,
    },

    /// The bound instance was already mutably or immutably borrowed when the
    /// listener ran.
    #[error("bound instance of `{type_name}` is already borrowed")]
    InstanceBusy {
        /// Type name of the bound instance.
        type_name: &'static str,
    },
}

impl ListenerError {
    /// Wrap any error (or message) produced by a handler.
    pub fn handler(source: impl Into<BoxedError>) -> Self {
        Self::Handler {
            source: source.into(),
        }
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::handler(message)
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self::handler(message)
    }
}

impl From<BoxedError> for ListenerError {
    fn from(source: BoxedError) -> Self {
        Self::Handler { source }
    }
}

/// Errors raised by a listener registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The registry has handed out every possible index.
    #[error("listener index space exhausted")]
    IndexExhausted,
}

/// Errors raised by event bus registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The registry for `event` refused the listener.
    #[error("cannot register listener for `{event}`: {source}")]
    Registry {
        /// Event name the listener was registered under.
        event: String,
        /// The underlying registry error.
        source: RegistryError,
    },
}

/// A listener failure observed during a dispatch pass.
///
/// The pass that produced it stopped at `index`; listeners registered after
/// it under the same event name did not run in that pass.
#[derive(Debug, thiserror::Error)]
#[error("listener {index} for event `{event}` failed: {source}")]
pub struct DispatchError {
    /// Event name being dispatched.
    pub event: String,
    /// Index of the listener that failed.
    pub index: ListenerIndex,
    /// The listener's error.
    pub source: ListenerError,
}
