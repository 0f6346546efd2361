pub use builder::TimerBuilder;
pub(crate) use registration::Registration;
pub use timer_handle::{TimerHandle, WeakTimerHandle};

mod registration {
    use std::sync::Arc;

    use crate::{pool::WeakPoolHandle, timer::Timer};

    /// Control object shared by every [`TimerHandle`](super::TimerHandle) issued for one timer.
    ///
    /// Building it registers the timer with its pool, dropping it stops the timer and
    /// removes it from the pool. The pool's registry holds the timer itself, never the
    /// registration, so the registry does not keep a timer alive on its own.
    pub struct Registration {
        timer: Arc<Timer>,
    }

    impl Registration {
        pub(super) fn issue(pool: WeakPoolHandle, name: String) -> Arc<Self> {
            let registration = Arc::new_cyclic(|registration| Self {
                timer: Arc::new(Timer::new(pool, name, registration.clone())),
            });
            if let Some(pool) = registration.timer.pool().upgrade() {
                pool.register(&registration.timer);
            }
            registration
        }

        pub(super) fn timer(&self) -> &Timer {
            &self.timer
        }
    }

    impl Drop for Registration {
        fn drop(&mut self) {
            self.timer.stop();
            if let Some(pool) = self.timer.pool().upgrade() {
                pool.unregister(&self.timer);
            }
        }
    }
}

mod timer_handle {
    use std::{
        fmt::Debug,
        ops::Deref,
        sync::{Arc, Weak},
    };

    use crate::{pool::WeakPoolHandle, timer::Timer};

    use super::registration::Registration;

    /// Owning handle to a [`Timer`].
    ///
    /// Clones share one registration: the timer stays registered with its pool for as
    /// long as any clone exists, and is stopped and unregistered when the last one is
    /// dropped. The handle dereferences to the [`Timer`] itself.
    ///
    /// ### Example
    /// ```rust
    /// use std::time::Duration;
    /// use timer_pool::{StartMode, TimerPool};
    ///
    /// let pool = TimerPool::create("io");
    /// let heartbeat = pool.create_timer("heartbeat");
    /// heartbeat.set_interval(Duration::from_millis(250));
    /// heartbeat.set_repeated(true);
    /// heartbeat.set_callback(|timer| println!("{} ticked", timer.name()));
    /// heartbeat.start(StartMode::default());
    /// ```
    #[derive(Clone)]
    pub struct TimerHandle {
        registration: Arc<Registration>,
    }

    impl TimerHandle {
        pub(crate) fn new(pool: WeakPoolHandle, name: String) -> Self {
            Self {
                registration: Registration::issue(pool, name),
            }
        }

        /// Resolves a registration back into a handle, failing once it is being torn down.
        pub(crate) fn resolve(registration: &Weak<Registration>) -> Option<Self> {
            registration
                .upgrade()
                .map(|registration| Self { registration })
        }

        pub fn downgrade(&self) -> WeakTimerHandle {
            WeakTimerHandle {
                registration: Arc::downgrade(&self.registration),
            }
        }

        /// `true` if both handles refer to the same timer.
        pub fn ptr_eq(&self, other: &Self) -> bool {
            Arc::ptr_eq(&self.registration, &other.registration)
        }
    }

    impl Deref for TimerHandle {
        type Target = Timer;
        fn deref(&self) -> &Self::Target {
            self.registration.timer()
        }
    }

    impl Debug for TimerHandle {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            Debug::fmt(&**self, f)
        }
    }

    /// Non-owning reference to a timer. Does not keep the timer registered.
    #[derive(Clone, Default)]
    pub struct WeakTimerHandle {
        registration: Weak<Registration>,
    }

    impl WeakTimerHandle {
        /// Returns `None` once every [`TimerHandle`] for the timer has been dropped.
        pub fn upgrade(&self) -> Option<TimerHandle> {
            TimerHandle::resolve(&self.registration)
        }
    }

    impl Debug for WeakTimerHandle {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("WeakTimerHandle")
                .field("alive", &(self.registration.strong_count() > 0))
                .finish()
        }
    }
}

mod builder {
    use std::{sync::Arc, time::Duration};

    use crate::{
        errors::TimerPoolError,
        pool::WeakPoolHandle,
        timer::{Callback, StartMode},
    };

    use super::TimerHandle;

    /// Configures a timer before it is created, see [`TimerPool::timer`](crate::TimerPool::timer).
    pub struct TimerBuilder {
        pool: WeakPoolHandle,
        name: String,
        callback: Option<Callback>,
        interval: Option<Duration>,
        repeated: bool,
        start_mode: Option<StartMode>,
    }

    impl TimerBuilder {
        pub(crate) fn new(pool: WeakPoolHandle, name: String) -> Self {
            Self {
                pool,
                name,
                callback: None,
                interval: None,
                repeated: false,
                start_mode: None,
            }
        }
        pub fn set_callback(
            &mut self,
            callback: impl Fn(&TimerHandle) + Send + Sync + 'static,
        ) -> &mut Self {
            self.callback = Some(Arc::new(callback));
            self
        }
        pub fn set_interval(&mut self, interval: Duration) -> &mut Self {
            self.interval = Some(interval);
            self
        }
        pub fn set_repeated(&mut self, repeated: bool) -> &mut Self {
            self.repeated = repeated;
            self
        }
        /// Starts the timer with `mode` as soon as it is built.
        pub fn start_with(&mut self, mode: StartMode) -> &mut Self {
            self.start_mode = Some(mode);
            self
        }
        /// Creates and registers the timer.
        ///
        /// Fails if no callback or no interval was set. The builder keeps its
        /// configuration, so it can be built again to create sibling timers.
        pub fn build(&mut self) -> Result<TimerHandle, TimerPoolError> {
            let Some(callback) = self.callback.clone() else {
                return Err(TimerPoolError::BuildErrorNoCallbackSet);
            };
            let Some(interval) = self.interval else {
                return Err(TimerPoolError::BuildErrorNoIntervalSet);
            };

            let timer = TimerHandle::new(self.pool.clone(), self.name.clone());
            timer.set_interval(interval);
            timer.set_repeated(self.repeated);
            timer.install_callback(callback);
            if let Some(mode) = self.start_mode {
                timer.start(mode);
            }
            Ok(timer)
        }
    }
}
