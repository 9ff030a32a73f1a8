//! Delay-aware production: the time-ordered buffer between an upstream
//! publisher and one downstream listener.
//!
//! Internal modules:
//! - [`buffered`]: the producer itself — admission throttle, ordered heap,
//!   dispatch worker;
//! - [`delayed`]: the heap entry and its `(time, insertion)` ordering.

mod buffered;
mod delayed;

pub use buffered::{BufferedProducer, Phase};
