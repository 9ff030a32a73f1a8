//! # Plain fan-out channel.
//!
//! [`SimpleChannel`] keeps a set of registered listeners (unique by `Arc`
//! identity, unordered) and forwards every data event to all of them.
//! Control signals are never fanned out: they go to the channel's manager
//! listener only, and are dropped when none is set.

use async_trait::async_trait;

use crate::channels::channel::Channel;
use crate::error::RouteError;
use crate::events::{same_listener, Event, EventKey, ListenerRef, Outcome};

/// Fan-out registry for one concrete key.
pub struct SimpleChannel {
    listeners: Vec<ListenerRef>,
    manager: Option<ListenerRef>,
}

impl SimpleChannel {
    /// Creates an empty channel.
    pub fn new() -> Self {
        SimpleChannel {
            listeners: Vec::new(),
            manager: None,
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    async fn forward_control(&self, key: &EventKey, event: Event) -> Result<(), RouteError> {
        match &self.manager {
            Some(manager) => manager.consume(key, event).await,
            None => Ok(()),
        }
    }

    async fn fan_out(&self, key: &EventKey, event: Event) -> Result<(), RouteError> {
        for listener in &self.listeners {
            listener.consume(key, event.clone()).await?;
        }
        Ok(())
    }
}

impl Default for SimpleChannel {
    fn default() -> Self {
        SimpleChannel::new()
    }
}

#[async_trait]
impl Channel for SimpleChannel {
    fn register_listener(&mut self, listener: &ListenerRef) -> Outcome {
        if self.listeners.iter().any(|l| same_listener(l, listener)) {
            Outcome::Ignored
        } else {
            self.listeners.push(ListenerRef::clone(listener));
            Outcome::Applied
        }
    }

    fn unregister_listener(&mut self, listener: &ListenerRef) -> Outcome {
        match self.listeners.iter().position(|l| same_listener(l, listener)) {
            Some(i) => {
                self.listeners.swap_remove(i);
                Outcome::Applied
            }
            None => Outcome::Ignored,
        }
    }

    fn set_manager(&mut self, manager: Option<ListenerRef>) {
        self.manager = manager;
    }

    async fn consume(&mut self, key: &EventKey, event: Event) -> Result<(), RouteError> {
        if event.is_control() {
            self.forward_control(key, event).await
        } else {
            self.fan_out(key, event).await
        }
    }
}
