//! Commands submitted to the manager's serialization worker.
//!
//! Every mutating operation on a [`ChannelManager`](crate::ChannelManager)
//! becomes one [`Command`] on its queue and executes strictly in submission
//! order on the worker task. The default is fire-and-forget; [`Completion`]
//! is the explicit handle for callers who need to know that everything
//! submitted before it has taken effect.

use tokio::sync::oneshot;

use crate::events::{Event, EventKey, ListenerRef};

/// One serialized registry/publish operation.
pub(crate) enum Command {
    /// Register `listener` under `key` (concrete or wildcard).
    Register {
        key: EventKey,
        listener: ListenerRef,
    },
    /// Unregister `listener` from the exact original `key`.
    Unregister {
        key: EventKey,
        listener: ListenerRef,
    },
    /// Deliver `event` to the channel for concrete `key`.
    Publish { key: EventKey, event: Event },
    /// Barrier: acknowledge once every earlier command has executed.
    Flush { done: oneshot::Sender<()> },
}

/// Awaitable acknowledgement that previously submitted operations have been
/// applied by the worker.
///
/// Returned by [`ChannelManager::flush`](crate::ChannelManager::flush).
/// Dropping it keeps the fire-and-forget default.
pub struct Completion {
    rx: oneshot::Receiver<()>,
}

impl Completion {
    pub(crate) fn new(rx: oneshot::Receiver<()>) -> Self {
        Completion { rx }
    }

    /// Resolves once the barrier has executed.
    ///
    /// Also resolves when the manager stopped before reaching the barrier —
    /// there is nothing left for the caller to wait on either way.
    pub async fn wait(self) {
        let _ = self.rx.await;
    }
}
