//! Event data model and wiring contracts.
//!
//! This module groups the **value types** traffic is made of and the
//! **traits** components are wired together with.
//!
//! ## Contents
//! - [`EventKey`] topic identifiers and wildcard-prefix matching
//! - [`Event`], [`Payload`], [`ControlEvent`] payloads and control signals
//! - [`Listener`], [`ManagedListener`], [`Producer`] the wiring contracts
//! - [`Outcome`] registry mutation results, [`NoopListener`]
//!
//! See `lib.rs` for the system-level wiring diagram.

mod event;
mod key;
mod listener;

pub use event::{ControlEvent, Event, Payload};
pub use key::{EventKey, DELIMITER, WILDCARD};
pub use listener::{Listener, ListenerRef, ManagedListener, NoopListener, Outcome, Producer};

pub(crate) use listener::same_listener;
