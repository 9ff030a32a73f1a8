//! # BufferedProducer: time-ordered delay buffer.
//!
//! Sits between an upstream publisher and one downstream listener (typically
//! a [`ChannelManager`](crate::ChannelManager)), holding time-stamped events
//! until the configured [`Clock`] reaches their scheduled moment, then
//! dispatching them in time order.
//!
//! ## Architecture
//! ```text
//! publisher ── consume(key, Timed{at}) ──► [ (at, seq)-ordered heap ] ──► dispatch worker
//!     │                                          ▲         │                    │
//!     │ due > 100ms: wait ≤ 100ms                │         │ earliest due       ▼
//!     └────────── not_full ◄────────────────── notify      └──► Clock::wait_until(at)
//!                                                                    │
//!                                                          listener.consume(key, event)
//! ```
//!
//! ## Rules
//! - **Lifecycle**: `Created → Active (start) → Stopped (stop)`; stop is
//!   terminal, there is no restart.
//! - **Admission throttle**: an event due more than 100 ms out makes the
//!   publishing call wait on the not-full signal for at most 100 ms before
//!   inserting — a throttle against unbounded buffering of far-future
//!   streams, not a head-of-line block.
//! - **Ordering**: dispatch is non-decreasing in `(scheduled time, insertion
//!   order)`, regardless of enqueue order.
//! - **Isolation**: a failing or panicking listener is logged; the loop and
//!   later events are unaffected.
//! - **Stop**: clears the queue and wakes every waiter; a publisher parked on
//!   admission returns promptly and its event is silently dropped.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::{panic_message, RouteError};
use crate::events::{Event, EventKey, Listener, ListenerRef, Producer};
use crate::producer::delayed::DelayedEvent;

/// Lifecycle phase of a [`BufferedProducer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, not yet started.
    Created,
    /// Dispatch worker running; `consume` accepted.
    Active,
    /// Stopped; terminal.
    Stopped,
}

/// Queue and lifecycle state, guarded by one lock shared between the
/// publisher side and the dispatch side.
struct State {
    phase: Phase,
    heap: BinaryHeap<Reverse<DelayedEvent>>,
    seq: u64,
}

struct Shared {
    clock: Arc<Clock>,
    state: Mutex<State>,
    /// Publishers wait here when throttled; raised after every dispatch.
    not_full: Notify,
    /// The dispatch worker waits here when idle; raised on earliest arrivals.
    not_empty: Notify,
    token: CancellationToken,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Delay-aware producer buffering events until their scheduled moment.
pub struct BufferedProducer {
    shared: Arc<Shared>,
    listener: Mutex<Option<ListenerRef>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BufferedProducer {
    /// Due-delay beyond which a publishing call is throttled, and the upper
    /// bound on how long it waits.
    pub const ADMISSION_WINDOW: Duration = Duration::from_millis(100);

    /// Creates a producer dispatching against `clock`.
    pub fn new(clock: Arc<Clock>) -> Self {
        BufferedProducer {
            shared: Arc::new(Shared {
                clock,
                state: Mutex::new(State {
                    phase: Phase::Created,
                    heap: BinaryHeap::new(),
                    seq: 0,
                }),
                not_full: Notify::new(),
                not_empty: Notify::new(),
                token: CancellationToken::new(),
            }),
            listener: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.shared.lock_state().phase
    }

    fn lock_listener(&self) -> MutexGuard<'_, Option<ListenerRef>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Producer for BufferedProducer {
    fn set_listener(&self, listener: ListenerRef) {
        *self.lock_listener() = Some(listener);
    }

    /// Spawns the dispatch worker. Non-blocking.
    ///
    /// Fails with [`RouteError::ListenerMissing`] if no listener is set,
    /// [`RouteError::AlreadyStarted`] on a second start, and
    /// [`RouteError::Inactive`] after a stop.
    fn start(&self) -> Result<(), RouteError> {
        let listener = self
            .lock_listener()
            .clone()
            .ok_or(RouteError::ListenerMissing)?;

        {
            let mut state = self.shared.lock_state();
            match state.phase {
                Phase::Created => state.phase = Phase::Active,
                Phase::Active => return Err(RouteError::AlreadyStarted),
                Phase::Stopped => {
                    return Err(RouteError::Inactive {
                        phase: Phase::Stopped,
                    })
                }
            }
        }

        let shared = Arc::clone(&self.shared);
        *self.lock_worker() = Some(tokio::spawn(dispatch(shared, listener)));
        Ok(())
    }

    /// Stops the producer: clears the queue, releases every waiter, and joins
    /// the dispatch worker. Terminal.
    async fn stop(&self) {
        {
            let mut state = self.shared.lock_state();
            state.phase = Phase::Stopped;
            state.heap.clear();
        }
        self.shared.token.cancel();
        self.shared.not_full.notify_waiters();
        self.shared.not_empty.notify_waiters();

        let handle = self.lock_worker().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[async_trait]
impl Listener for BufferedProducer {
    /// Enqueues a time-stamped event for dispatch at its scheduled moment.
    ///
    /// Fails with [`RouteError::Inactive`] outside the `Active` phase and
    /// [`RouteError::NotTimed`] for events without a schedule. An event due
    /// more than [`ADMISSION_WINDOW`](Self::ADMISSION_WINDOW) out throttles
    /// the call for at most that long; if the producer stops while the call
    /// is throttled, the event is silently dropped.
    async fn consume(&self, key: &EventKey, event: Event) -> Result<(), RouteError> {
        {
            let state = self.shared.lock_state();
            if state.phase != Phase::Active {
                return Err(RouteError::Inactive { phase: state.phase });
            }
        }
        let at = event.scheduled_at().ok_or(RouteError::NotTimed)?;

        let due = at
            .duration_since(self.shared.clock.now())
            .unwrap_or(Duration::ZERO);
        if due > Self::ADMISSION_WINDOW {
            let _ = time::timeout(Self::ADMISSION_WINDOW, self.shared.not_full.notified()).await;
        }

        let became_earliest;
        {
            let mut state = self.shared.lock_state();
            if state.phase != Phase::Active {
                // Stopped while throttled: drop without error.
                return Ok(());
            }
            let seq = state.seq;
            state.seq += 1;
            let entry = DelayedEvent::new(at, seq, key.clone(), event);
            became_earliest = match state.heap.peek() {
                Some(Reverse(head)) => entry < *head,
                None => true,
            };
            state.heap.push(Reverse(entry));
        }
        if became_earliest {
            self.shared.not_empty.notify_one();
        }
        Ok(())
    }
}

/// What the dispatch worker does next, decided under the state lock.
enum Step {
    /// Earliest entry is due: deliver it.
    Deliver(DelayedEvent),
    /// Earliest entry is pending: wait for the clock or a new arrival.
    WaitUntil(std::time::SystemTime),
    /// Queue empty: wait for an arrival.
    Idle,
    /// Producer stopped.
    Exit,
}

fn next_step(shared: &Shared) -> Step {
    let mut state = shared.lock_state();
    if state.phase != Phase::Active {
        return Step::Exit;
    }
    let due = match state.heap.peek() {
        None => return Step::Idle,
        Some(Reverse(head)) => {
            if head.due_in(&shared.clock).is_zero() {
                None
            } else {
                Some(head.at)
            }
        }
    };
    match due {
        Some(at) => Step::WaitUntil(at),
        None => match state.heap.pop() {
            Some(Reverse(entry)) => Step::Deliver(entry),
            None => Step::Idle,
        },
    }
}

/// Dispatch loop: releases the earliest-due entry once its delay has elapsed
/// and forwards it downstream. One failing delivery never halts the loop.
async fn dispatch(shared: Arc<Shared>, listener: ListenerRef) {
    loop {
        match next_step(&shared) {
            Step::Deliver(entry) => {
                let fut = listener.consume(&entry.key, entry.event);
                match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::error!(key = %entry.key, error = %e, "dispatch delivery failed");
                    }
                    Err(panic) => {
                        tracing::error!(
                            key = %entry.key,
                            panic = %panic_message(panic.as_ref()),
                            "listener panicked during dispatch"
                        );
                    }
                }
                shared.not_full.notify_waiters();
            }
            Step::WaitUntil(at) => {
                tokio::select! {
                    _ = shared.token.cancelled() => break,
                    _ = shared.clock.wait_until(at) => {}
                    _ = shared.not_empty.notified() => {}
                }
            }
            Step::Idle => {
                tokio::select! {
                    _ = shared.token.cancelled() => break,
                    _ = shared.not_empty.notified() => {}
                }
            }
            Step::Exit => break,
        }
    }
    tracing::debug!("dispatch worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::{SystemTime, UNIX_EPOCH};
    use tokio::sync::mpsc;

    /// Forwards every delivery onto a channel; fails the first
    /// `fail_first` deliveries.
    struct Recorder {
        tx: mpsc::UnboundedSender<Event>,
        fail_first: AtomicUsize,
        panic_first: AtomicUsize,
    }

    impl Recorder {
        fn wired() -> (Arc<Recorder>, mpsc::UnboundedReceiver<Event>) {
            Self::with_failures(0, 0)
        }

        fn with_failures(
            fail_first: usize,
            panic_first: usize,
        ) -> (Arc<Recorder>, mpsc::UnboundedReceiver<Event>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(Recorder {
                    tx,
                    fail_first: AtomicUsize::new(fail_first),
                    panic_first: AtomicUsize::new(panic_first),
                }),
                rx,
            )
        }
    }

    #[async_trait]
    impl Listener for Recorder {
        async fn consume(&self, _key: &EventKey, event: Event) -> Result<(), RouteError> {
            self.tx.send(event).ok();
            if self
                .panic_first
                .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                    n.checked_sub(1)
                })
                .is_ok()
            {
                panic!("listener blew up");
            }
            if self
                .fail_first
                .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                    n.checked_sub(1)
                })
                .is_ok()
            {
                return Err(RouteError::delivery("listener rejected event"));
            }
            Ok(())
        }
    }

    fn base() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn at_seconds(s: u64) -> SystemTime {
        base() + Duration::from_secs(s)
    }

    fn started(clock: &Arc<Clock>) -> (BufferedProducer, mpsc::UnboundedReceiver<Event>) {
        let producer = BufferedProducer::new(Arc::clone(clock));
        let (recorder, rx) = Recorder::wired();
        producer.set_listener(recorder);
        producer.start().unwrap();
        (producer, rx)
    }

    async fn expect_none(rx: &mut mpsc::UnboundedReceiver<Event>) {
        let premature = time::timeout(Duration::from_millis(10), rx.recv()).await;
        assert!(premature.is_err(), "event delivered before its time");
    }

    async fn expect_at(rx: &mut mpsc::UnboundedReceiver<Event>, at: SystemTime) {
        let got = time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no delivery within timeout")
            .expect("recorder channel closed");
        assert_eq!(got.scheduled_at(), Some(at));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_consume_before_start_is_illegal_state() {
        let producer = BufferedProducer::new(Arc::new(Clock::simulated(base())));
        let err = producer
            .consume(&EventKey::new("k"), Event::data(0u8))
            .await
            .unwrap_err();
        assert!(err.is_illegal_state());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_consume_after_stop_is_illegal_state() {
        let clock = Arc::new(Clock::simulated(base()));
        let (producer, _rx) = started(&clock);
        producer.stop().await;

        let err = producer
            .consume(&EventKey::new("k"), Event::timed(at_seconds(1), 0u8))
            .await
            .unwrap_err();
        assert!(err.is_illegal_state());
        assert_eq!(producer.phase(), Phase::Stopped);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_consume_untimed_event_is_invalid_argument() {
        let clock = Arc::new(Clock::simulated(base()));
        let (producer, _rx) = started(&clock);

        let err = producer
            .consume(&EventKey::new("k"), Event::data(0u8))
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
        producer.stop().await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_start_requires_listener_and_is_single_shot() {
        let producer = BufferedProducer::new(Arc::new(Clock::simulated(base())));
        assert_eq!(producer.start().unwrap_err().as_label(), "listener_missing");

        let (recorder, _rx) = Recorder::wired();
        producer.set_listener(recorder);
        producer.start().unwrap();
        assert_eq!(producer.start().unwrap_err().as_label(), "already_started");

        producer.stop().await;
        assert_eq!(producer.start().unwrap_err().as_label(), "inactive");
    }

    /// The end-to-end scenario: events arrive out of order, the clock is
    /// driven second by second, deliveries happen at +9s..+12s in time order.
    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_dispatch_in_time_order_as_clock_advances() {
        let clock = Arc::new(Clock::simulated(base()));
        let (producer, mut rx) = started(&clock);
        let key = EventKey::new("sim.tick");

        for s in [10u64, 11, 9] {
            producer
                .consume(&key, Event::timed(at_seconds(s), s))
                .await
                .unwrap();
        }
        producer
            .consume(&key, Event::timed(at_seconds(12), 12u64))
            .await
            .unwrap();

        for s in 1..=8u64 {
            clock.set(at_seconds(s));
            expect_none(&mut rx).await;
        }
        for s in 9..=12u64 {
            clock.set(at_seconds(s));
            expect_at(&mut rx, at_seconds(s)).await;
        }
        expect_none(&mut rx).await;
        producer.stop().await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_equal_times_dispatch_in_insertion_order() {
        let clock = Arc::new(Clock::simulated(base()));
        let (producer, mut rx) = started(&clock);
        let key = EventKey::new("k");

        for n in 0..3u32 {
            producer
                .consume(&key, Event::timed(at_seconds(5), n))
                .await
                .unwrap();
        }
        clock.set(at_seconds(5));

        for expected in 0..3u32 {
            let got = time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("no delivery")
                .expect("channel closed");
            assert_eq!(got.downcast_ref::<u32>(), Some(&expected));
        }
        producer.stop().await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_admission_wait_is_bounded() {
        let clock = Arc::new(Clock::simulated(base()));
        let (producer, _rx) = started(&clock);
        let key = EventKey::new("k");

        // Within the window: no throttle.
        let t0 = time::Instant::now();
        producer
            .consume(&key, Event::timed(base() + Duration::from_millis(50), 0u8))
            .await
            .unwrap();
        assert_eq!(t0.elapsed(), Duration::ZERO);

        // Far in the future: throttled for exactly the admission window.
        let t1 = time::Instant::now();
        producer
            .consume(&key, Event::timed(at_seconds(3600), 1u8))
            .await
            .unwrap();
        let waited = t1.elapsed();
        assert!(waited >= BufferedProducer::ADMISSION_WINDOW);
        assert!(waited < BufferedProducer::ADMISSION_WINDOW * 2);
        producer.stop().await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_stop_releases_throttled_publisher_and_drops_event() {
        let clock = Arc::new(Clock::simulated(base()));
        let producer = Arc::new(BufferedProducer::new(Arc::clone(&clock)));
        let (recorder, mut rx) = Recorder::wired();
        producer.set_listener(recorder);
        producer.start().unwrap();

        let publisher = {
            let producer = Arc::clone(&producer);
            tokio::spawn(async move {
                producer
                    .consume(&EventKey::new("k"), Event::timed(at_seconds(3600), 0u8))
                    .await
            })
        };
        tokio::task::yield_now().await;

        producer.stop().await;
        let result = time::timeout(Duration::from_secs(1), publisher)
            .await
            .expect("publisher did not return after stop")
            .expect("publisher task panicked");
        assert!(result.is_ok(), "throttled publish must not error on stop");
        expect_none(&mut rx).await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_failing_delivery_does_not_halt_dispatch() {
        let clock = Arc::new(Clock::simulated(base()));
        let producer = BufferedProducer::new(Arc::clone(&clock));
        let (recorder, mut rx) = Recorder::with_failures(1, 0);
        producer.set_listener(recorder);
        producer.start().unwrap();
        let key = EventKey::new("k");

        // Both due immediately; the first delivery fails.
        producer
            .consume(&key, Event::timed(base(), 1u8))
            .await
            .unwrap();
        producer
            .consume(&key, Event::timed(base(), 2u8))
            .await
            .unwrap();

        for expected in [1u8, 2] {
            let got = time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("dispatch halted")
                .expect("channel closed");
            assert_eq!(got.downcast_ref::<u8>(), Some(&expected));
        }
        producer.stop().await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_panicking_listener_is_contained() {
        let clock = Arc::new(Clock::simulated(base()));
        let producer = BufferedProducer::new(Arc::clone(&clock));
        let (recorder, mut rx) = Recorder::with_failures(0, 1);
        producer.set_listener(recorder);
        producer.start().unwrap();
        let key = EventKey::new("k");

        producer
            .consume(&key, Event::timed(base(), 1u8))
            .await
            .unwrap();
        producer
            .consume(&key, Event::timed(base(), 2u8))
            .await
            .unwrap();

        for expected in [1u8, 2] {
            let got = time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("dispatch halted by panic")
                .expect("channel closed");
            assert_eq!(got.downcast_ref::<u8>(), Some(&expected));
        }
        producer.stop().await;
    }
}
