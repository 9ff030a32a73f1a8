//! Serialized front door for the routing registry.
//!
//! ```text
//!                    ┌────────────────┐
//!  register / publish│ ChannelManager │ mpsc (unbounded)
//!  ─────────────────►│   (handle)     ├────────────────┐
//!                    └────────────────┘                ▼
//!                                             ┌────────────────┐
//!                                             │  worker task   │
//!                                             │  owns Registry │
//!                                             └────────────────┘
//! ```
//!
//! All registry mutation and delivery happens on one worker task, fed
//! through an unbounded command queue. Callers therefore never contend on a
//! lock, and listeners observe registrations and publishes in submission
//! order.
//!
//! ## Rules
//! - `register_listener` / `unregister_listener` / `consume` are
//!   fire-and-forget: they enqueue and return. Use [`flush`] to wait for
//!   everything enqueued so far to be applied.
//! - Publishing requires a concrete key; wildcard keys are rejected up
//!   front with [`RouteError::WildcardPublish`].
//! - Listener failures and panics during delivery are logged and swallowed;
//!   the worker keeps running.
//! - [`stop`] cancels the worker. Commands still queued at that point are
//!   dropped.
//!
//! [`flush`]: ChannelManager::flush
//! [`stop`]: ChannelManager::stop

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channels::ChannelKind;
use crate::error::RouteError;
use crate::events::{Event, EventKey, Listener, ListenerRef, ManagedListener};
use crate::producer::Phase;

use super::command::{Command, Completion};
use super::registry::Registry;

/// Routes events to per-key channels through a single worker task.
///
/// Cheap to share: the handle holds only the command queue sender. The
/// manager is itself a [`Listener`], so it can sit downstream of a producer
/// and fan its output into the registry.
pub struct ChannelManager {
    tx: mpsc::UnboundedSender<Command>,
    token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelManager {
    /// Starts a manager whose channels are allocated from `kind`.
    pub fn new(kind: ChannelKind) -> Self {
        Self::with_control_listener(kind, None)
    }

    /// Like [`new`](Self::new), but stamps `control` as the upstream
    /// recipient of control signals propagated by channels (subscribe and
    /// unsubscribe transitions from counting channels, for example).
    pub fn with_control_listener(kind: ChannelKind, control: Option<ListenerRef>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let registry = Registry::new(kind, control);
        let worker = tokio::spawn(run_worker(registry, rx, token.clone()));

        ChannelManager {
            tx,
            token,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueues a registration of `listener` under `key` (concrete or
    /// wildcard). No-op after [`stop`](Self::stop).
    pub fn register_listener(&self, key: EventKey, listener: ListenerRef) {
        let _ = self.tx.send(Command::Register { key, listener });
    }

    /// Enqueues removal of `listener` from `key`. The key must be the exact
    /// key used at registration; a wildcard registration is not found via
    /// its expansions, nor the reverse.
    pub fn unregister_listener(&self, key: EventKey, listener: ListenerRef) {
        let _ = self.tx.send(Command::Unregister { key, listener });
    }

    /// Registers `listener` under every key it advertises. A listener that
    /// advertises no keys is left alone.
    pub fn register_managed_listener(&self, listener: Arc<dyn ManagedListener>) {
        if let Some(keys) = listener.listener_keys() {
            let target: ListenerRef = listener;
            for key in keys {
                self.register_listener(key, target.clone());
            }
        }
    }

    /// Mirror of [`register_managed_listener`](Self::register_managed_listener).
    pub fn unregister_managed_listener(&self, listener: Arc<dyn ManagedListener>) {
        if let Some(keys) = listener.listener_keys() {
            let target: ListenerRef = listener;
            for key in keys {
                self.unregister_listener(key, target.clone());
            }
        }
    }

    /// Returns a handle that resolves once every command enqueued before
    /// this call has been applied by the worker.
    pub fn flush(&self) -> Completion {
        let (done, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Flush { done });
        Completion::new(rx)
    }

    /// Cancels the worker and waits for it to exit. Commands still queued
    /// are dropped, not applied. Idempotent.
    pub async fn stop(&self) {
        self.token.cancel();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[async_trait]
impl Listener for ChannelManager {
    /// Enqueues `event` for delivery to the channel under `key`.
    ///
    /// Rejects wildcard keys synchronously; returns
    /// [`RouteError::Inactive`] once the manager has been stopped.
    async fn consume(&self, key: &EventKey, event: Event) -> Result<(), RouteError> {
        if key.is_wildcard() {
            return Err(RouteError::WildcardPublish {
                key: key.to_string(),
            });
        }
        self.tx
            .send(Command::Publish {
                key: key.clone(),
                event,
            })
            .map_err(|_| RouteError::Inactive {
                phase: Phase::Stopped,
            })
    }
}

async fn run_worker(
    mut registry: Registry,
    mut rx: mpsc::UnboundedReceiver<Command>,
    token: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            _ = token.cancelled() => break,
            cmd = rx.recv() => match cmd {
                Some(cmd) => cmd,
                None => break,
            },
        };
        match command {
            Command::Register { key, listener } => registry.register(&key, listener),
            Command::Unregister { key, listener } => registry.unregister(&key, &listener),
            Command::Publish { key, event } => registry.publish(&key, event).await,
            Command::Flush { done } => {
                let _ = done.send(());
            }
        }
    }
}
