//! # chronobus
//!
//! **Chronobus** is a lightweight in-process event routing library for Rust.
//!
//! It provides primitives to register listeners under hierarchical keys
//! (with trailing-wildcard matching), publish events through a serialized
//! routing worker, and buffer time-stamped events until their scheduled
//! moment against a pluggable clock. The crate is designed as a building
//! block for simulation engines and time-driven pipelines.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   publisher                       register / unregister
//!      │                                     │
//!      ▼                                     ▼
//! ┌──────────────────┐  timed   ┌───────────────────────────────────┐
//! │ BufferedProducer │  events  │  ChannelManager (handle)          │
//! │  - min-heap by   ├─────────►│  - mpsc command queue (unbounded) │
//! │    (at, seq)     │          └────────────────┬──────────────────┘
//! │  - Clock-driven  │                           ▼
//! │    dispatch task │          ┌───────────────────────────────────┐
//! └──────────────────┘          │  worker task (owns Registry)      │
//!         ▲                     │  - channels: key -> Channel       │
//!         │ wait_until          │  - wildcards: root -> listeners   │
//!   ┌───────────┐               └──────┬─────────────┬──────────────┘
//!   │   Clock   │                      ▼             ▼
//!   │ real /    │               ┌────────────┐ ┌────────────┐
//!   │ offset /  │               │  Channel   │ │  Channel   │
//!   │ simulated │               │ (fan-out)  │ │ (fan-out)  │
//!   └───────────┘               └─────┬──────┘ └─────┬──────┘
//!                                     ▼              ▼
//!                                 listeners      listeners
//! ```
//!
//! ### Event flow
//! ```text
//! Event::timed(at, payload) ──► BufferedProducer::consume
//!   ├─► due within 100ms        ─► enqueue
//!   └─► due later               ─► wait (bounded, 100ms) for a delivery
//!                                  slot, then enqueue
//!
//! dispatch loop {
//!   ├─► peek earliest (at, seq)
//!   ├─► due?   ─► deliver to listener (failures/panics logged, loop lives)
//!   └─► early? ─► Clock::wait_until(at)  (simulated: woken by tick/set)
//! }
//!
//! delivered event ──► ChannelManager::consume ──► worker ──► Registry
//!   ├─► channel exists  ─► Channel::consume (fan out / count)
//!   └─► first traffic   ─► create channel, attach matching wildcard
//!                          listeners, then consume
//! ```
//!
//! ## Features
//! | Area           | Description                                                       | Key types / traits                  |
//! |----------------|-------------------------------------------------------------------|-------------------------------------|
//! | **Contracts**  | Consumption and emission seams everything plugs into.             | [`Listener`], [`Producer`]          |
//! | **Routing**    | Serialized per-key fan-out with wildcard registrations.           | [`ChannelManager`], [`ChannelKind`] |
//! | **Buffering**  | Time-ordered delay queue with bounded admission.                  | [`BufferedProducer`]                |
//! | **Time**       | Real, offset, and simulated time behind one seam.                 | [`Clock`]                           |
//! | **Errors**     | Typed errors for routing and lifecycle misuse.                    | [`RouteError`]                      |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::{Duration, UNIX_EPOCH};
//!
//! use chronobus::{
//!     BufferedProducer, ChannelKind, ChannelManager, Clock, Event, EventKey, Listener,
//!     NoopListener, Producer,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let start = UNIX_EPOCH + Duration::from_secs(1_000);
//!     let clock = Arc::new(Clock::simulated(start));
//!
//!     let manager = Arc::new(ChannelManager::new(ChannelKind::Simple));
//!     manager.register_listener(EventKey::new("sensor.>"), Arc::new(NoopListener));
//!
//!     let producer = BufferedProducer::new(clock.clone());
//!     producer.set_listener(manager.clone());
//!     producer.start()?;
//!
//!     // Due 50 simulated milliseconds from now; released by the tick below.
//!     let at = start + Duration::from_millis(50);
//!     producer
//!         .consume(&EventKey::new("sensor.temp"), Event::timed(at, 21.5f64))
//!         .await?;
//!     clock.tick(Duration::from_millis(50));
//!
//!     producer.stop().await;
//!     manager.stop().await;
//!     Ok(())
//! }
//! ```
mod channels;
mod clock;
mod error;
mod events;
mod manager;
mod producer;

// ---- Public re-exports ----

pub use channels::{Channel, ChannelKind, CountingChannel, SimpleChannel};
pub use clock::Clock;
pub use error::RouteError;
pub use events::{
    ControlEvent, Event, EventKey, Listener, ListenerRef, ManagedListener, NoopListener, Outcome,
    Payload, Producer, DELIMITER, WILDCARD,
};
pub use manager::{ChannelManager, Completion};
pub use producer::{BufferedProducer, Phase};
