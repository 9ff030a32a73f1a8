//! # The per-key listener registry contract.
//!
//! A [`Channel`] owns the set of listeners interested in one concrete key
//! and fans incoming events out to them. Channels are **not** internally
//! synchronized: the [`ChannelManager`](crate::ChannelManager) worker is the
//! only thing that touches them, and that single-writer discipline is what
//! makes `&mut self` safe here.
//!
//! ## Variants
//! Concrete channels are selected by [`ChannelKind`] at manager construction
//! (not by subclassing):
//! - [`ChannelKind::Simple`] — plain fan-out registry.
//! - [`ChannelKind::Counting`] — additionally reference-counts subscriptions
//!   per key and forwards control signals only on the 0↔1 transitions.

use async_trait::async_trait;

use crate::channels::counting::CountingChannel;
use crate::channels::simple::SimpleChannel;
use crate::error::RouteError;
use crate::events::{Event, EventKey, ListenerRef, Outcome};

/// Listener registry bound to one concrete key.
#[async_trait]
pub trait Channel: Send {
    /// Adds `listener` if absent.
    ///
    /// Returns [`Outcome::Ignored`] if the listener is already registered,
    /// [`Outcome::Applied`] otherwise.
    fn register_listener(&mut self, listener: &ListenerRef) -> Outcome;

    /// Removes `listener` if present.
    ///
    /// Returns [`Outcome::Ignored`] if the listener was not registered,
    /// [`Outcome::Applied`] otherwise.
    fn unregister_listener(&mut self, listener: &ListenerRef) -> Outcome;

    /// Sets the manager listener that receives propagated control signals.
    fn set_manager(&mut self, manager: Option<ListenerRef>);

    /// Consumes one event.
    ///
    /// Subscribe/unsubscribe control signals are handled internally and
    /// propagated upstream to the manager listener; anything else fans out
    /// to every registered listener. A listener failure propagates to the
    /// caller — isolation happens one layer up, on the manager's publish
    /// path.
    async fn consume(&mut self, key: &EventKey, event: Event) -> Result<(), RouteError>;
}

/// Selects the channel variant a manager allocates per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelKind {
    /// Plain fan-out registry.
    #[default]
    Simple,
    /// Reference-counted subscriptions; control signals forwarded only on
    /// the 0↔1 transitions.
    Counting,
}

impl ChannelKind {
    /// Allocates a fresh, independent channel of this kind.
    pub fn allocate(&self) -> Box<dyn Channel> {
        match self {
            ChannelKind::Simple => Box::new(SimpleChannel::new()),
            ChannelKind::Counting => Box::new(CountingChannel::new()),
        }
    }
}
