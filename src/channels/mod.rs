//! Per-key listener registries.
//!
//! A channel is the registry bound to one concrete key: it owns the set of
//! interested listeners and fans events out to them. Channels are created
//! lazily by the [`ChannelManager`](crate::ChannelManager) (on first publish
//! or wildcard match) and touched only by its worker task, so they carry no
//! locking of their own.
//!
//! ## Contents
//! - [`Channel`] the registry contract
//! - [`ChannelKind`] variant selection (simple vs counting)
//! - [`SimpleChannel`] plain fan-out
//! - [`CountingChannel`] reference-counted control-signal filtering

mod channel;
mod counting;
mod simple;

pub use channel::{Channel, ChannelKind};
pub use counting::CountingChannel;
pub use simple::SimpleChannel;
