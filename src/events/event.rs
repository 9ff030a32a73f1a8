//! # Event payloads and control signals.
//!
//! [`Event`] is the unit of traffic flowing through channels, managers, and
//! producers. Application payloads are opaque to the routing core and carried
//! as [`Payload`] (`Arc<dyn Any + Send + Sync>`); cloning an event is cheap.
//!
//! ## Variants
//! - [`Event::Data`] — an untimed application payload; routed immediately.
//! - [`Event::Timed`] — a payload with a scheduled moment; the only shape a
//!   [`BufferedProducer`](crate::BufferedProducer) accepts.
//! - [`Event::Subscribe`] / [`Event::Unsubscribe`] — control signals handled
//!   inside channels and propagated to the channel's manager listener, never
//!   fanned out as data.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::events::key::EventKey;
use crate::events::listener::ListenerRef;

/// Opaque application payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Subscription control signal carried by [`Event::Subscribe`] and
/// [`Event::Unsubscribe`].
///
/// The key names the topic being subscribed to; using a key here (rather
/// than binding a control event to one channel) lets a single control
/// channel serve many data channels. The optional requester identifies the
/// listener the signal originates from.
#[derive(Clone)]
pub struct ControlEvent {
    /// Topic the control signal applies to.
    pub key: EventKey,
    /// Listener the signal originates from, if known.
    pub requester: Option<ListenerRef>,
}

impl ControlEvent {
    /// Creates a control signal for `key` with no requester.
    pub fn new(key: EventKey) -> Self {
        ControlEvent {
            key,
            requester: None,
        }
    }

    /// Attaches the originating listener.
    pub fn with_requester(mut self, requester: ListenerRef) -> Self {
        self.requester = Some(requester);
        self
    }
}

impl fmt::Debug for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlEvent")
            .field("key", &self.key)
            .field("requester", &self.requester.is_some())
            .finish()
    }
}

/// The unit of traffic routed by the crate.
#[derive(Clone)]
pub enum Event {
    /// Untimed application payload.
    Data(Payload),
    /// Payload scheduled for a specific moment.
    Timed {
        /// The moment the payload is due.
        at: SystemTime,
        /// The application payload.
        payload: Payload,
    },
    /// Request to establish a subscription.
    Subscribe(ControlEvent),
    /// Request to tear down a subscription.
    Unsubscribe(ControlEvent),
}

impl Event {
    /// Wraps a value into an untimed data event.
    pub fn data<T: Any + Send + Sync>(value: T) -> Self {
        Event::Data(Arc::new(value))
    }

    /// Wraps a value into a time-stamped data event due at `at`.
    pub fn timed<T: Any + Send + Sync>(at: SystemTime, value: T) -> Self {
        Event::Timed {
            at,
            payload: Arc::new(value),
        }
    }

    /// Creates a subscribe control signal for `key`.
    pub fn subscribe(key: EventKey) -> Self {
        Event::Subscribe(ControlEvent::new(key))
    }

    /// Creates an unsubscribe control signal for `key`.
    pub fn unsubscribe(key: EventKey) -> Self {
        Event::Unsubscribe(ControlEvent::new(key))
    }

    /// Returns the scheduled moment for timed events, `None` otherwise.
    pub fn scheduled_at(&self) -> Option<SystemTime> {
        match self {
            Event::Timed { at, .. } => Some(*at),
            _ => None,
        }
    }

    /// Returns the carried payload for data-bearing events.
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Event::Data(payload) | Event::Timed { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Downcasts the carried payload to a concrete type.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payload().and_then(|p| p.downcast_ref::<T>())
    }

    /// True for subscribe/unsubscribe control signals.
    pub fn is_control(&self) -> bool {
        matches!(self, Event::Subscribe(_) | Event::Unsubscribe(_))
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Data(_) => f.write_str("Event::Data"),
            Event::Timed { at, .. } => write!(f, "Event::Timed({at:?})"),
            Event::Subscribe(ce) => write!(f, "Event::Subscribe({:?})", ce.key),
            Event::Unsubscribe(ce) => write!(f, "Event::Unsubscribe({:?})", ce.key),
        }
    }
}
