//! Error types used by the routing core.
//!
//! A single [`RouteError`] enum covers the whole crate. Variants fall into
//! three families:
//!
//! - **Lifecycle violations** (`Inactive`, `AlreadyStarted`, `ListenerMissing`):
//!   an operation was attempted outside its valid phase. Raised synchronously
//!   to the immediate caller.
//! - **Contract violations** (`NotTimed`, `WildcardPublish`): the wrong kind
//!   of key or event was presented to a typed boundary. Also synchronous.
//! - **Delivery failures** (`Delivery`): a listener failed while consuming.
//!   These propagate synchronously only out of channel fan-out; on the
//!   asynchronous paths (manager publish, dispatch loop) they are caught,
//!   logged, and swallowed.
//!
//! The type provides `as_label` / `as_message` helpers for logs and metrics.

use std::any::Any;

use thiserror::Error;

use crate::producer::Phase;

/// Errors produced by the event-routing core.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RouteError {
    /// `consume` was called on a producer that is not in the `Active` phase.
    #[error("producer is not active (phase: {phase:?})")]
    Inactive {
        /// The phase the producer was actually in.
        phase: Phase,
    },

    /// `start` was called on a producer that is already running.
    #[error("producer is already started")]
    AlreadyStarted,

    /// `start` was called before a downstream listener was set.
    #[error("no listener configured; call set_listener before start")]
    ListenerMissing,

    /// A non-time-stamped event was given to a time-ordered boundary.
    #[error("event carries no scheduled time")]
    NotTimed,

    /// A wildcard key was used to publish; publication targets one concrete topic.
    #[error("wildcard keys are not supported when publishing: {key}")]
    WildcardPublish {
        /// The offending key.
        key: String,
    },

    /// A listener failed while consuming an event.
    #[error("delivery failed: {message}")]
    Delivery {
        /// Description of the listener failure.
        message: String,
    },
}

impl RouteError {
    /// Wraps a listener failure description into a `Delivery` error.
    pub fn delivery(message: impl Into<String>) -> Self {
        RouteError::Delivery {
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use chronobus::RouteError;
    ///
    /// let err = RouteError::NotTimed;
    /// assert_eq!(err.as_label(), "not_timed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RouteError::Inactive { .. } => "inactive",
            RouteError::AlreadyStarted => "already_started",
            RouteError::ListenerMissing => "listener_missing",
            RouteError::NotTimed => "not_timed",
            RouteError::WildcardPublish { .. } => "wildcard_publish",
            RouteError::Delivery { .. } => "delivery_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RouteError::Inactive { phase } => format!("producer inactive: {phase:?}"),
            RouteError::AlreadyStarted => "already started".to_string(),
            RouteError::ListenerMissing => "listener missing".to_string(),
            RouteError::NotTimed => "event not time-stamped".to_string(),
            RouteError::WildcardPublish { key } => format!("wildcard publish: {key}"),
            RouteError::Delivery { message } => format!("delivery: {message}"),
        }
    }

    /// True for lifecycle-phase violations (the `IllegalState` family).
    ///
    /// # Example
    /// ```
    /// use chronobus::{Phase, RouteError};
    ///
    /// let err = RouteError::Inactive { phase: Phase::Stopped };
    /// assert!(err.is_illegal_state());
    /// assert!(!err.is_invalid_argument());
    /// ```
    pub fn is_illegal_state(&self) -> bool {
        matches!(
            self,
            RouteError::Inactive { .. } | RouteError::AlreadyStarted | RouteError::ListenerMissing
        )
    }

    /// True for type/key-contract violations (the `InvalidArgument` family).
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            RouteError::NotTimed | RouteError::WildcardPublish { .. }
        )
    }
}

/// Extracts a printable message from a caught listener panic.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
