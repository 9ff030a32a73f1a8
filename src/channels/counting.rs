//! # Reference-counted channel.
//!
//! [`CountingChannel`] wraps the plain fan-out channel with a per-key
//! subscription counter and filters redundant control signals: an upstream
//! feed only sees the first subscribe and the last unsubscribe for a key.
//!
//! ## Rules
//! - Subscribe increments the count; only the 0→1 transition is forwarded.
//! - Unsubscribe decrements when the count is positive; only the 1→0
//!   transition is forwarded.
//! - Unsubscribe for an unknown or zero-count key is a no-op.
//! - Data events pass through untouched.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::channels::channel::Channel;
use crate::channels::simple::SimpleChannel;
use crate::error::RouteError;
use crate::events::{Event, EventKey, ListenerRef, Outcome};

/// Channel that reference-counts subscriptions per key string.
pub struct CountingChannel {
    inner: SimpleChannel,
    counts: HashMap<String, u32>,
}

impl CountingChannel {
    /// Creates an empty counting channel.
    pub fn new() -> Self {
        CountingChannel {
            inner: SimpleChannel::new(),
            counts: HashMap::new(),
        }
    }

    /// Current subscription count for a key string.
    pub fn subscription_count(&self, key: &str) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }
}

impl Default for CountingChannel {
    fn default() -> Self {
        CountingChannel::new()
    }
}

#[async_trait]
impl Channel for CountingChannel {
    fn register_listener(&mut self, listener: &ListenerRef) -> Outcome {
        self.inner.register_listener(listener)
    }

    fn unregister_listener(&mut self, listener: &ListenerRef) -> Outcome {
        self.inner.unregister_listener(listener)
    }

    fn set_manager(&mut self, manager: Option<ListenerRef>) {
        self.inner.set_manager(manager);
    }

    async fn consume(&mut self, key: &EventKey, event: Event) -> Result<(), RouteError> {
        match event {
            Event::Subscribe(ce) => {
                let count = self.counts.entry(key.as_str().to_string()).or_insert(0);
                *count += 1;
                if *count == 1 {
                    self.inner.consume(key, Event::Subscribe(ce)).await
                } else {
                    // Subscription already live upstream.
                    Ok(())
                }
            }
            Event::Unsubscribe(ce) => match self.counts.get_mut(key.as_str()) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    if *count == 0 {
                        self.inner.consume(key, Event::Unsubscribe(ce)).await
                    } else {
                        // Other subscribers still interested.
                        Ok(())
                    }
                }
                _ => Ok(()),
            },
            other => self.inner.consume(key, other).await,
        }
    }
}
