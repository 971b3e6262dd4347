//! Deferred, tick-driven publish/subscribe event dispatch.
//!
//! Listeners are registered under an event name. Firing an event only queues
//! its name; the handlers run when the owning update loop calls
//! [`EventBus::tick`]. This keeps handler side effects out of whatever code
//! signaled the event.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use tickbus_core::{BoundAction, EventBus, ListenerMode};
//!
//! let mut bus = EventBus::new();
//! let opened = Rc::new(Cell::new(0_u32));
//! let seen = Rc::clone(&opened);
//! bus.add_event_listener(
//!     "door.open",
//!     BoundAction::new(move || seen.set(seen.get() + 1)),
//!     ListenerMode::OneShot,
//! )?;
//!
//! bus.fire_event("door.open");
//! assert_eq!(opened.get(), 0);
//! bus.tick();
//! assert_eq!(opened.get(), 1);
//! assert!(!bus.has_listeners("door.open"));
//! # Ok::<(), tickbus_core::BusError>(())
//! ```
//!
//! # Modules
//!
//! - [`action`] -- [`BoundAction`], the frozen zero-argument closure every
//!   registration reduces to.
//! - [`registry`] -- [`ListenerRegistry`], the per-name listener collection
//!   and its dispatch pass.
//! - [`bus`] -- [`EventBus`], the name map, fire queue, and tick drain.
//! - [`publisher`] -- [`EventPublisher`], the handle listeners use to fire
//!   events and register listeners while the bus is busy.
//! - [`config`] -- [`BusConfig`] tunables.
//! - [`error`] -- Error types.

pub mod action;
pub mod bus;
pub mod config;
pub mod error;
pub mod publisher;
pub mod registry;

pub use action::{BindingKind, BoundAction, IntoInvocation, Invocation};
pub use bus::{DispatchReport, EventBus, TickSummary};
pub use config::BusConfig;
pub use error::{BusError, DispatchError, ListenerError, RegistryError};
pub use publisher::EventPublisher;
pub use registry::{DispatchPass, ListenerIndex, ListenerMode, ListenerRegistry};
