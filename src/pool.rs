use std::{
    fmt::Debug,
    sync::{Arc, Weak},
    thread::JoinHandle,
};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex, ReentrantMutex};

use crate::{
    config::PoolConfig,
    errors::TimerPoolError,
    handle::{TimerBuilder, TimerHandle},
    timer::{Timer, TimerId},
    timer_loop::TimerLoop,
};

pub type PoolHandle = Arc<TimerPool>;
pub type WeakPoolHandle = Weak<TimerPool>;

pub(crate) struct PoolState {
    pub(crate) running: bool,
}

/// State shared between a [`TimerPool`] and its scheduling thread.
///
/// Lock order is `structure`, then `state`, then the registry shards, then a
/// timer's own lock. A timer never calls back into the pool while holding its lock.
pub(crate) struct PoolShared {
    pub(crate) name: String,
    pub(crate) config: PoolConfig,
    pub(crate) state: Mutex<PoolState>,
    pub(crate) cond: Condvar,
    /// Serializes registry changes against a scan and its firing pass. Re-entrant so
    /// callbacks on the scheduling thread can create and drop timers of their own pool.
    pub(crate) structure: ReentrantMutex<()>,
    pub(crate) timers: DashMap<TimerId, Arc<Timer>>,
}

impl PoolShared {
    pub(crate) fn stop(&self) {
        let removed: Vec<Arc<Timer>>;
        {
            let mut state = self.state.lock();
            if state.running {
                log::debug!("timer pool [{}] stopping", self.name);
            }
            state.running = false;
            removed = self
                .timers
                .iter()
                .map(|entry| entry.value().clone())
                .collect();
            self.timers.clear();
        }
        self.cond.notify_all();
        // Dropped outside the lock: a timer's callback may own other handles.
        drop(removed);
    }

    pub(crate) fn wake(&self) {
        let _state = self.state.lock();
        self.cond.notify_all();
    }
}

/// A single scheduling thread serving any number of [`Timer`]s.
///
/// The thread is spawned when the pool is created and joined when the last
/// [`PoolHandle`] is dropped. Timers only hold a [`WeakPoolHandle`], so they never
/// keep their pool alive.
///
/// ### Example
/// ```rust
/// use std::time::Duration;
/// use timer_pool::{StartMode, TimerPool};
///
/// let pool = TimerPool::create("ui");
/// let blink = pool
///     .timer("blink")
///     .set_interval(Duration::from_millis(500))
///     .set_repeated(true)
///     .set_callback(|timer| println!("{}", timer.name()))
///     .start_with(StartMode::StartOnly)
///     .build()
///     .unwrap();
/// assert!(blink.running());
/// ```
pub struct TimerPool {
    this: WeakPoolHandle,
    shared: Arc<PoolShared>,
    thread: Option<JoinHandle<()>>,
}

impl TimerPool {
    /// Creates a pool with default settings and starts its scheduling thread.
    ///
    /// # Panics
    /// Panics if the operating system refuses to spawn the thread. Use
    /// [`try_create`](Self::try_create) to handle that case.
    pub fn create(name: impl Into<String>) -> PoolHandle {
        match Self::try_create(PoolConfig::new().name(name)) {
            Ok(pool) => pool,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn try_create(config: PoolConfig) -> Result<PoolHandle, TimerPoolError> {
        let shared = Arc::new(PoolShared {
            name: config.get_name().to_string(),
            config,
            state: Mutex::new(PoolState { running: true }),
            cond: Condvar::new(),
            structure: ReentrantMutex::new(()),
            timers: DashMap::new(),
        });
        let thread = TimerLoop::spawn(&shared)?;
        log::debug!("timer pool [{}] started", shared.name);

        Ok(Arc::new_cyclic(|this| TimerPool {
            this: this.clone(),
            shared,
            thread: Some(thread),
        }))
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Number of timers currently registered.
    pub fn timer_count(&self) -> usize {
        self.shared.timers.len()
    }

    /// Stops scheduling and discards every registered timer. Idempotent.
    ///
    /// Does not wait for a callback that is already running. Timers created
    /// afterwards are never registered and never fire.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Makes the scheduling loop re-evaluate expiries immediately.
    pub fn wake(&self) {
        self.shared.wake();
    }

    /// Creates a timer bound to this pool. It stays registered for as long as the
    /// returned handle, or a clone of it, is alive.
    pub fn create_timer(&self, name: impl Into<String>) -> TimerHandle {
        TimerHandle::new(self.this.clone(), name.into())
    }

    /// Starts configuring a timer bound to this pool.
    pub fn timer(&self, name: impl Into<String>) -> TimerBuilder {
        TimerBuilder::new(self.this.clone(), name.into())
    }

    pub(crate) fn register(&self, timer: &Arc<Timer>) {
        let replaced;
        {
            let _structure = self.shared.structure.lock();
            let state = self.shared.state.lock();
            if !state.running {
                return;
            }
            replaced = self.shared.timers.insert(timer.id(), timer.clone());
            log::trace!("timer pool [{}] registered [{}]", self.shared.name, timer.name());
        }
        self.shared.cond.notify_all();
        drop(replaced);
    }

    pub(crate) fn unregister(&self, timer: &Timer) {
        let removed;
        {
            let _structure = self.shared.structure.lock();
            let _state = self.shared.state.lock();
            removed = self.shared.timers.remove(&timer.id());
        }
        if removed.is_some() {
            log::trace!("timer pool [{}] unregistered [{}]", self.shared.name, timer.name());
        }
        self.shared.cond.notify_all();
        drop(removed);
    }
}

impl Drop for TimerPool {
    fn drop(&mut self) {
        self.shared.stop();

        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.thread().id() == std::thread::current().id() {
            // Last handle dropped from inside a callback: the loop exits on its own.
            log::debug!("timer pool [{}] dropped on its own thread, detaching", self.shared.name);
            return;
        }
        if thread.join().is_err() {
            log::warn!("timer pool [{}] scheduling thread panicked", self.shared.name);
        }
    }
}

impl Debug for TimerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerPool")
            .field("name", &self.shared.name)
            .field("running", &self.running())
            .field("timers", &self.timer_count())
            .finish()
    }
}
