//! Worker-local registry state: concrete channels and the wildcard index.
//!
//! Owned exclusively by the manager's worker task — nothing here is
//! synchronized, and nothing outside the worker may touch it. Both indexes
//! are key-ordered maps:
//!
//! - `channels`: concrete key → channel, created lazily on first traffic
//!   (publish or wildcard match) and never reclaimed;
//! - `wildcards`: wildcard root → listeners awaiting future matching
//!   channels.
//!
//! ## Matching
//! - Root → channels: keys sharing a prefix are contiguous in key order, so
//!   an ordered range scan from the root stops at the first non-match and
//!   costs only the matches found.
//! - Key → roots (at channel creation): the matching roots are exactly the
//!   prefixes of the new key, so each prefix is probed directly — bounded by
//!   the key length, not by the number of registrations.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::ops::Bound;

use futures::FutureExt;

use crate::channels::{Channel, ChannelKind};
use crate::error::panic_message;
use crate::events::{same_listener, Event, EventKey, ListenerRef};

pub(crate) struct Registry {
    kind: ChannelKind,
    /// Upstream listener stamped as manager on every allocated channel;
    /// receives the control signals channels propagate.
    control: Option<ListenerRef>,
    channels: BTreeMap<String, Box<dyn Channel>>,
    wildcards: BTreeMap<String, Vec<ListenerRef>>,
}

impl Registry {
    pub fn new(kind: ChannelKind, control: Option<ListenerRef>) -> Self {
        Registry {
            kind,
            control,
            channels: BTreeMap::new(),
            wildcards: BTreeMap::new(),
        }
    }

    /// Registers `listener` under a concrete key or a wildcard root.
    ///
    /// A wildcard registration lands on every existing matching channel and
    /// is recorded under its root so channels created later pick it up.
    pub fn register(&mut self, key: &EventKey, listener: ListenerRef) {
        match key.wildcard_root() {
            None => {
                self.channel_mut(key.as_str()).register_listener(&listener);
            }
            Some(root) => {
                let root = root.to_string();
                for channel in self.matching_channels(&root) {
                    channel.register_listener(&listener);
                }
                let pending = self.wildcards.entry(root).or_default();
                if !pending.iter().any(|l| same_listener(l, &listener)) {
                    pending.push(listener);
                }
            }
        }
    }

    /// Mirror of [`register`](Self::register); requires the exact original key.
    pub fn unregister(&mut self, key: &EventKey, listener: &ListenerRef) {
        match key.wildcard_root() {
            None => {
                self.channel_mut(key.as_str()).unregister_listener(listener);
            }
            Some(root) => {
                let root = root.to_string();
                for channel in self.matching_channels(&root) {
                    channel.unregister_listener(listener);
                }
                if let Entry::Occupied(mut pending) = self.wildcards.entry(root) {
                    pending.get_mut().retain(|l| !same_listener(l, listener));
                    if pending.get().is_empty() {
                        pending.remove();
                    }
                }
            }
        }
    }

    /// Delivers `event` to the channel for a concrete `key`, creating the
    /// channel on first traffic. Failures and panics are logged and
    /// swallowed: publish is fire-and-forget from the caller's perspective.
    pub async fn publish(&mut self, key: &EventKey, event: Event) {
        let channel = self.channel_mut(key.as_str());
        let delivery = channel.consume(key, event);
        match std::panic::AssertUnwindSafe(delivery).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(key = %key, error = %e, "publish delivery failed");
            }
            Err(panic) => {
                tracing::error!(
                    key = %key,
                    panic = %panic_message(panic.as_ref()),
                    "listener panicked during publish"
                );
            }
        }
    }

    /// Resolves the channel for a concrete key, creating it if needed.
    ///
    /// A new channel is pre-populated with every pending wildcard listener
    /// whose root is a prefix of the key.
    fn channel_mut(&mut self, key: &str) -> &mut Box<dyn Channel> {
        match self.channels.entry(key.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut channel = self.kind.allocate();
                channel.set_manager(self.control.clone());
                let prefixes = key
                    .char_indices()
                    .map(|(i, _)| &key[..i])
                    .chain(std::iter::once(key));
                for prefix in prefixes {
                    if let Some(pending) = self.wildcards.get(prefix) {
                        for listener in pending {
                            channel.register_listener(listener);
                        }
                    }
                }
                entry.insert(channel)
            }
        }
    }

    /// Existing channels whose concrete key starts with `root`, in key order.
    fn matching_channels(
        &mut self,
        root: &str,
    ) -> impl Iterator<Item = &mut Box<dyn Channel>> + '_ {
        let prefix = root.to_string();
        self.channels
            .range_mut::<str, _>((Bound::Included(root), Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(&prefix))
            .map(|(_, channel)| channel)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::error::RouteError;
    use crate::events::Listener;

    struct Recorder {
        keys: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn arc() -> Arc<Recorder> {
            Arc::new(Recorder {
                keys: Mutex::new(Vec::new()),
            })
        }

        fn keys(&self) -> Vec<String> {
            self.keys.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Listener for Recorder {
        async fn consume(&self, key: &EventKey, _event: Event) -> Result<(), RouteError> {
            self.keys.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_new_channel_attaches_every_matching_wildcard_root() {
        let mut registry = Registry::new(ChannelKind::Simple, None);
        let exact = Recorder::arc();
        let short = Recorder::arc();
        let unrelated = Recorder::arc();

        // Roots "2", "22", and "20" all exist; key "22" must pick up the
        // non-adjacent "2" and the exact "22", but never "20".
        registry.register(&EventKey::new("2>"), short.clone());
        registry.register(&EventKey::new("22>"), exact.clone());
        registry.register(&EventKey::new("20>"), unrelated.clone());

        registry.publish(&EventKey::new("22"), Event::data(1u32)).await;

        assert_eq!(short.keys(), vec!["22".to_string()]);
        assert_eq!(exact.keys(), vec!["22".to_string()]);
        assert!(unrelated.keys().is_empty());
    }

    #[tokio::test]
    async fn test_wildcard_registration_lands_on_existing_channels() {
        let mut registry = Registry::new(ChannelKind::Simple, None);
        let wild = Recorder::arc();

        // Traffic first: both channels already exist when the wildcard lands.
        registry.publish(&EventKey::new("fx.eur"), Event::data(0u8)).await;
        registry.publish(&EventKey::new("fx.gbp"), Event::data(0u8)).await;
        registry.publish(&EventKey::new("rates.us"), Event::data(0u8)).await;

        registry.register(&EventKey::new("fx.>"), wild.clone());
        registry.publish(&EventKey::new("fx.eur"), Event::data(1u8)).await;
        registry.publish(&EventKey::new("fx.gbp"), Event::data(2u8)).await;
        registry.publish(&EventKey::new("rates.us"), Event::data(3u8)).await;

        assert_eq!(
            wild.keys(),
            vec!["fx.eur".to_string(), "fx.gbp".to_string()]
        );
    }

    #[tokio::test]
    async fn test_wildcard_unregister_detaches_everywhere() {
        let mut registry = Registry::new(ChannelKind::Simple, None);
        let wild = Recorder::arc();
        let wild_ref: ListenerRef = wild.clone();

        registry.register(&EventKey::new("a.>"), wild_ref.clone());
        registry.publish(&EventKey::new("a.1"), Event::data(1u8)).await;

        registry.unregister(&EventKey::new("a.>"), &wild_ref);
        // Existing channel loses the listener; a fresh channel never gains it.
        registry.publish(&EventKey::new("a.1"), Event::data(2u8)).await;
        registry.publish(&EventKey::new("a.2"), Event::data(3u8)).await;

        assert_eq!(wild.keys(), vec!["a.1".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_wildcard_registration_is_one_membership() {
        let mut registry = Registry::new(ChannelKind::Simple, None);
        let wild = Recorder::arc();
        let wild_ref: ListenerRef = wild.clone();

        registry.register(&EventKey::new("a.>"), wild_ref.clone());
        registry.register(&EventKey::new("a.>"), wild_ref);
        registry.publish(&EventKey::new("a.1"), Event::data(1u8)).await;

        assert_eq!(wild.keys(), vec!["a.1".to_string()]);
    }
}
