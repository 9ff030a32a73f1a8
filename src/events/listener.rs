//! # Core wiring contracts: listeners and producers.
//!
//! [`Listener`] is the single consumption contract of the crate: everything
//! that receives events — channels, managers, delay buffers, application
//! sinks — implements it. [`Producer`] is the matching upstream contract for
//! components that emit into a listener.
//!
//! ## Identity
//! Registries hold listeners as [`ListenerRef`] (`Arc<dyn Listener>`) and
//! compare them by `Arc` identity, not by value: registering two clones of
//! the same `Arc` is one membership, two separate `Arc`s of equal state are
//! two.
//!
//! ## Rules
//! - `Listener::consume` failures propagate to the immediate caller; whether
//!   they travel further depends on the layer (channels propagate, the
//!   manager's publish path and the dispatch loop log and swallow).
//! - `Producer::start` is non-blocking and returns immediately; the work
//!   happens on the producer's own worker task.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RouteError;
use crate::events::event::Event;
use crate::events::key::EventKey;

/// Shared handle to a listener; registry membership is by `Arc` identity.
pub type ListenerRef = Arc<dyn Listener>;

/// A consumer of keyed events.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Consumes one event published under `key`.
    ///
    /// Errors signal a delivery failure to the immediate caller.
    async fn consume(&self, key: &EventKey, event: Event) -> Result<(), RouteError>;
}

/// A listener that self-declares the keys it wants registered.
///
/// Used by [`ChannelManager::register_managed_listener`]
/// (crate::ChannelManager::register_managed_listener) to wire a component's
/// whole key set in one call.
#[async_trait]
pub trait ManagedListener: Listener {
    /// Returns the keys this listener consumes; `None` means "nothing to
    /// wire" and managed registration is a no-op.
    fn listener_keys(&self) -> Option<Vec<EventKey>>;
}

/// An upstream component that emits into a configured listener.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Sets the target that will consume this producer's output.
    fn set_listener(&self, listener: ListenerRef);

    /// Starts the producer. Non-blocking; returns immediately.
    fn start(&self) -> Result<(), RouteError>;

    /// Stops the producer and releases its workers. Terminal.
    async fn stop(&self);
}

/// Result of a registry mutation.
///
/// The closed replacement for OK/IGNORED-style sentinel singletons: `Applied`
/// when the operation changed state, `Ignored` when the registry was already
/// in the requested state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation changed registry state.
    Applied,
    /// The registry was already in the requested state.
    Ignored,
}

impl Outcome {
    /// True if the operation changed state.
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// A listener that discards everything and declares no keys.
///
/// Stateless stand-in for optional wiring points.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

#[async_trait]
impl Listener for NoopListener {
    async fn consume(&self, _key: &EventKey, _event: Event) -> Result<(), RouteError> {
        Ok(())
    }
}

#[async_trait]
impl ManagedListener for NoopListener {
    fn listener_keys(&self) -> Option<Vec<EventKey>> {
        None
    }
}

/// Compares two listener handles by identity.
pub(crate) fn same_listener(a: &ListenerRef, b: &ListenerRef) -> bool {
    Arc::ptr_eq(a, b)
}
