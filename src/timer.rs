use std::{
    fmt::Debug,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::{
    handle::{Registration, TimerHandle},
    pool::{PoolHandle, WeakPoolHandle},
};

/// Function invoked on the pool's scheduling thread each time a timer fires.
///
/// The callback receives the handle of the timer that fired. Capturing that same
/// handle inside the callback creates a reference cycle which keeps the timer
/// registered until the callback is replaced.
pub type Callback = Arc<dyn Fn(&TimerHandle) + Send + Sync + 'static>;

/// Identifier under which a timer is stored in its pool's registry.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimerId(u64);

impl TimerId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// How [`Timer::start`] treats a timer that is already armed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StartMode {
    /// Arm the timer only if it is not running yet.
    StartOnly,
    /// Always (re)arm the timer.
    #[default]
    RestartIfRunning,
    /// Re-arm the timer only if it is already running.
    RestartOnly,
}

struct TimerState {
    /// `None` while the timer is disarmed.
    next_expiry: Option<Instant>,
    interval: Duration,
    repeated: bool,
    callback: Option<Callback>,
}

/// One schedule multiplexed onto a [`TimerPool`](crate::TimerPool) thread.
///
/// Timers are only ever reached through a [`TimerHandle`]: every configuration
/// method takes the timer's own lock for a short critical section, then wakes
/// the owning pool (if it still exists) so it re-evaluates its next deadline.
///
/// Reconfiguring an armed timer with [`set_interval`](Self::set_interval),
/// [`set_repeated`](Self::set_repeated) or [`set_callback`](Self::set_callback)
/// leaves its pending expiry untouched; the new interval applies from the next
/// fire or the next explicit [`start`](Self::start).
pub struct Timer {
    id: TimerId,
    name: String,
    pool: WeakPoolHandle,
    registration: Weak<Registration>,
    state: Mutex<TimerState>,
}

impl Timer {
    pub(crate) fn new(
        pool: WeakPoolHandle,
        name: impl Into<String>,
        registration: Weak<Registration>,
    ) -> Self {
        Self {
            id: TimerId::next(),
            name: name.into(),
            pool,
            registration,
            state: Mutex::new(TimerState {
                next_expiry: None,
                interval: Duration::ZERO,
                repeated: false,
                callback: None,
            }),
        }
    }

    /// Creates a timer registered with `pool`. Same as [`TimerPool::create_timer`](crate::TimerPool::create_timer).
    pub fn create(pool: &PoolHandle, name: impl Into<String>) -> TimerHandle {
        pool.create_timer(name)
    }

    pub(crate) fn id(&self) -> TimerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-owning reference to the pool this timer was created in.
    pub fn pool(&self) -> WeakPoolHandle {
        self.pool.clone()
    }

    pub fn set_callback(&self, callback: impl Fn(&TimerHandle) + Send + Sync + 'static) {
        self.install_callback(Arc::new(callback));
    }

    pub(crate) fn install_callback(&self, callback: Callback) {
        self.state.lock().callback = Some(callback);
        self.wake_pool();
    }

    pub fn clear_callback(&self) {
        self.state.lock().callback = None;
        self.wake_pool();
    }

    pub fn set_interval(&self, interval: Duration) {
        self.state.lock().interval = interval;
        self.wake_pool();
    }

    pub fn interval(&self) -> Duration {
        self.state.lock().interval
    }

    pub fn set_repeated(&self, repeated: bool) {
        self.state.lock().repeated = repeated;
        self.wake_pool();
    }

    pub fn repeated(&self) -> bool {
        self.state.lock().repeated
    }

    /// Arms the timer to expire one interval from now, subject to `mode`.
    ///
    /// An interval too large for [`Instant`] (such as [`Duration::MAX`]) arms the timer
    /// about thirty years out, so it stays running without ever becoming due.
    pub fn start(&self, mode: StartMode) {
        {
            let mut state = self.state.lock();
            let armed = state.next_expiry.is_some();
            match mode {
                StartMode::StartOnly if armed => return,
                StartMode::RestartOnly if !armed => return,
                _ => {}
            }
            state.next_expiry = Some(deadline_after(Instant::now(), state.interval));
        }
        self.wake_pool();
    }

    /// Disarms the timer. A callback already running on the pool thread completes.
    pub fn stop(&self) {
        self.state.lock().next_expiry = None;
        self.wake_pool();
    }

    pub fn running(&self) -> bool {
        self.state.lock().next_expiry.is_some()
    }

    /// Instant of the next firing, or `None` while the timer is disarmed.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.state.lock().next_expiry
    }

    /// Fires the timer as of `now` and returns how many periods were accounted for.
    ///
    /// A one-shot timer is disarmed and its callback invoked once. A repeating timer
    /// advances its expiry past `now` one interval at a time and invokes the callback
    /// once per advance. Nothing happens if the timer is disarmed or its last
    /// [`TimerHandle`] is being dropped.
    pub(crate) fn fire(&self, now: Instant) -> u64 {
        let Some(handle) = TimerHandle::resolve(&self.registration) else {
            return 0;
        };
        let (callback, count) = {
            let mut state = self.state.lock();
            let Some(expiry) = state.next_expiry else {
                return 0;
            };
            let count = if state.repeated {
                let (next_expiry, count) = catch_up(expiry, state.interval, now);
                state.next_expiry = Some(next_expiry);
                count
            } else {
                state.next_expiry = None;
                1
            };
            (state.callback.clone(), count)
        };

        if let Some(callback) = callback {
            for n in 0..count {
                if n > 0 && !self.running() {
                    break;
                }
                (*callback)(&handle);
            }
        }
        count
    }

    fn wake_pool(&self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.wake();
        }
    }
}

impl Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("next_expiry", &state.next_expiry)
            .field("interval", &state.interval)
            .field("repeated", &state.repeated)
            .finish()
    }
}

/// Stand-in for deadlines `Instant` cannot represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// `from + delay`, capped at [`FAR_FUTURE`] past `from` when the sum overflows.
pub(crate) fn deadline_after(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay).unwrap_or_else(|| from + FAR_FUTURE)
}

/// Advances `expiry` by whole `interval`s until it lies strictly after `now`.
///
/// Returns the new expiry and the number of intervals added, which is at least one.
/// A zero interval yields a single period and leaves the timer due at `now`.
/// When the advanced expiry cannot be represented it is capped as in [`deadline_after`].
pub(crate) fn catch_up(expiry: Instant, interval: Duration, now: Instant) -> (Instant, u64) {
    if interval.is_zero() {
        return (now.max(expiry), 1);
    }
    let behind = now.saturating_duration_since(expiry).as_nanos();
    let count = behind / interval.as_nanos() + 1;
    let total = interval.as_nanos() * count;
    let next_expiry = u64::try_from(total / NANOS_PER_SEC)
        .ok()
        .map(|secs| Duration::new(secs, (total % NANOS_PER_SEC) as u32))
        .and_then(|advance| expiry.checked_add(advance))
        .unwrap_or_else(|| now.max(expiry) + FAR_FUTURE);
    (next_expiry, u64::try_from(count).unwrap_or(u64::MAX))
}
