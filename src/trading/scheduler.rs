//! 报价请求调度
//!
//! - [`QuoteGate`]: 同 key 的请求在途时直接丢弃；新 key 会中止旧请求
//! - [`Debouncer`]: 输入停顿一段时间（默认 800ms）后才放行
//! - [`RefreshScheduler`]: 固定间隔（默认 30s）自动刷新，上一轮没结束就跳过本轮
//!
//! 三者都靠代计数器（generation）判断自己是否已被取代，不依赖任何 UI 生命周期。

use crate::common::{RouterError, RouterResult, Venue};
use futures::future::{AbortHandle, Abortable};
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::debug;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// How the caller wants venues picked for a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VenueSelection {
    #[default]
    Auto,
    Only(Venue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuoteKey {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub selection: VenueSelection,
}

impl QuoteKey {
    pub fn new(input_mint: Pubkey, output_mint: Pubkey, amount: u64, selection: VenueSelection) -> Self {
        Self { input_mint, output_mint, amount, selection }
    }
}

struct InFlight {
    key: QuoteKey,
    generation: u64,
    abort: AbortHandle,
}

// ==================== QuoteGate ====================

/// At most one quote request in flight.
#[derive(Default)]
pub struct QuoteGate {
    current: Mutex<Option<InFlight>>,
    generation: AtomicU64,
}

/// Clears the slot when the request finishes or its future is dropped.
struct SlotGuard<'a> {
    gate: &'a QuoteGate,
    generation: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut current = self.gate.current.lock();
        if current.as_ref().is_some_and(|f| f.generation == self.generation) {
            *current = None;
        }
    }
}

impl QuoteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `request` under the gate.
    ///
    /// Returns `None` when an identical key is already in flight. A different key aborts
    /// the in-flight request, which then resolves to `Err(RouterError::Cancelled)`.
    pub async fn run<T, F>(&self, key: QuoteKey, request: F) -> Option<RouterResult<T>>
    where
        F: Future<Output = RouterResult<T>>,
    {
        let (abort, registration) = AbortHandle::new_pair();
        let generation = {
            let mut current = self.current.lock();
            if let Some(in_flight) = current.as_ref() {
                if in_flight.key == key {
                    debug!(amount = key.amount, "identical quote request in flight, dropped");
                    return None;
                }
                debug!(stale_amount = in_flight.key.amount, amount = key.amount, "superseding quote request");
                in_flight.abort.abort();
            }
            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            *current = Some(InFlight { key, generation, abort });
            generation
        };
        let _slot = SlotGuard { gate: self, generation };

        match Abortable::new(request, registration).await {
            Ok(result) => Some(result),
            Err(_) => Some(Err(RouterError::Cancelled)),
        }
    }

    /// Abort whatever is in flight.
    pub fn cancel(&self) {
        if let Some(in_flight) = self.current.lock().take() {
            in_flight.abort.abort();
        }
    }

    pub fn in_flight(&self) -> Option<QuoteKey> {
        self.current.lock().as_ref().map(|f| f.key)
    }
}

// ==================== Debouncer ====================

pub struct Debouncer {
    delay: Duration,
    generation: AtomicU64,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, generation: AtomicU64::new(0) }
    }

    /// Wait out the delay. `false` means a newer call (or `cancel`) arrived in the meantime.
    pub async fn settle(&self) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tokio::time::sleep(self.delay).await;
        self.generation.load(Ordering::Acquire) == generation
    }

    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

// ==================== RefreshScheduler ====================

struct FlagGuard(Arc<AtomicBool>);

impl Drop for FlagGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Fixed-interval refresh that never overlaps an in-flight cycle.
#[derive(Clone)]
pub struct RefreshScheduler {
    interval: Duration,
    in_flight: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
}

#[derive(Default)]
struct CycleSlot {
    closed: bool,
    running: Option<task::AbortHandle>,
}

/// Stops the refresh loop, and the cycle it is running, when dropped.
pub struct RefreshHandle {
    task: JoinHandle<()>,
    cycle: Arc<Mutex<CycleSlot>>,
}

impl RefreshHandle {
    pub fn stop(&self) {
        self.task.abort();
        let mut slot = self.cycle.lock();
        slot.closed = true;
        if let Some(running) = slot.running.take() {
            running.abort();
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_INTERVAL)
    }
}

impl RefreshScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            in_flight: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Cycles skipped because the previous one was still running.
    pub fn skipped_cycles(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Run one cycle now, or `None` if a cycle is already in flight.
    pub async fn run_cycle<T, F>(&self, cycle: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        if !try_acquire(&self.in_flight) {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let _guard = FlagGuard(self.in_flight.clone());
        Some(cycle.await)
    }

    /// Tick every interval (first tick immediately). Starting again invalidates older loops.
    pub fn spawn<F, Fut>(&self, mut cycle: F) -> RefreshHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let scheduler = self.clone();
        let current = Arc::new(Mutex::new(CycleSlot::default()));
        let cycle_slot = current.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if scheduler.generation.load(Ordering::Acquire) != generation {
                    break;
                }
                if !try_acquire(&scheduler.in_flight) {
                    scheduler.skipped.fetch_add(1, Ordering::Relaxed);
                    debug!("refresh cycle still in flight, tick skipped");
                    continue;
                }
                let guard = FlagGuard(scheduler.in_flight.clone());
                // 持锁启动，保证 stop 之后不会再漏出一个周期
                let mut slot = cycle_slot.lock();
                if slot.closed {
                    break;
                }
                let fut = cycle();
                let running = tokio::spawn(async move {
                    let _guard = guard;
                    fut.await;
                });
                slot.running = Some(running.abort_handle());
            }
        });
        RefreshHandle { task, cycle: current }
    }

    /// Invalidate running loops; they exit on their next tick.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

fn try_acquire(flag: &AtomicBool) -> bool {
    flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    fn key(amount: u64) -> QuoteKey {
        QuoteKey::new(Pubkey::new_from_array([1; 32]), Pubkey::new_from_array([2; 32]), amount, VenueSelection::Auto)
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_request_is_dropped() {
        let gate = QuoteGate::new();
        let (first, second) = tokio::join!(
            gate.run(key(100), async {
                sleep(Duration::from_millis(100)).await;
                Ok::<_, RouterError>(1)
            }),
            async {
                sleep(Duration::from_millis(10)).await;
                gate.run(key(100), async { Ok(2) }).await
            }
        );
        assert_eq!(first, Some(Ok(1)));
        assert!(second.is_none());
        assert!(gate.in_flight().is_none());

        // slot is free again once the first request finished
        assert_eq!(gate.run(key(100), async { Ok::<_, RouterError>(3) }).await, Some(Ok(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_key_supersedes_stale_request() {
        let gate = QuoteGate::new();
        let (stale, fresh) = tokio::join!(
            gate.run(key(100), async {
                sleep(Duration::from_millis(100)).await;
                Ok::<_, RouterError>(1)
            }),
            async {
                sleep(Duration::from_millis(10)).await;
                gate.run(key(200), async { Ok(2) }).await
            }
        );
        assert_eq!(stale, Some(Err(RouterError::Cancelled)));
        assert_eq!(fresh, Some(Ok(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_keeps_only_last_call() {
        let debouncer = Debouncer::default();
        let (first, second) = tokio::join!(debouncer.settle(), async {
            sleep(Duration::from_millis(300)).await;
            debouncer.settle().await
        });
        assert!(!first);
        assert!(second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cycle_never_overlaps() {
        let scheduler = RefreshScheduler::default();
        let (first, second) = tokio::join!(
            scheduler.run_cycle(async {
                sleep(Duration::from_secs(5)).await;
                "first"
            }),
            async {
                sleep(Duration::from_secs(1)).await;
                scheduler.run_cycle(async { "second" }).await
            }
        );
        assert_eq!(first, Some("first"));
        assert_eq!(second, None);
        assert_eq!(scheduler.skipped_cycles(), 1);
        assert!(!scheduler.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_ticks_on_interval() {
        let scheduler = RefreshScheduler::default();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let handle = scheduler.spawn(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        // ticks at 0, 30, 60, 90
        sleep(Duration::from_secs(95)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 4);

        handle.stop();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycle_skips_ticks() {
        let scheduler = RefreshScheduler::default();
        let started = Arc::new(AtomicUsize::new(0));
        let counter = started.clone();
        let _handle = scheduler.spawn(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_secs(45)).await;
            }
        });

        // 0: start, 30: skipped, 60: start, 90: skipped
        sleep(Duration::from_secs(95)).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.skipped_cycles(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels_running_cycle() {
        let scheduler = RefreshScheduler::default();
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (s, f) = (started.clone(), finished.clone());
        let handle = scheduler.spawn(move || {
            let (s, f) = (s.clone(), f.clone());
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_secs(10)).await;
                f.fetch_add(1, Ordering::SeqCst);
            }
        });

        sleep(Duration::from_secs(5)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_in_flight());

        drop(handle);
        sleep(Duration::from_secs(60)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_running_cycle() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(1));
        let finished = Arc::new(AtomicUsize::new(0));
        let f = finished.clone();
        let handle = scheduler.spawn(move || {
            let f = f.clone();
            async move {
                sleep(Duration::from_secs(3)).await;
                f.fetch_add(1, Ordering::SeqCst);
            }
        });

        sleep(Duration::from_millis(1_500)).await;
        handle.stop();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_in_flight());
    }
}
