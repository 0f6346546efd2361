use std::time::Duration;

/// Settings applied to a [`TimerPool`](crate::TimerPool) when it is created.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    name: String,
    idle_recheck: Duration,
    isolate_callback_panics: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            idle_recheck: Duration::from_secs(60),
            isolate_callback_panics: true,
        }
    }
}
impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get_name(&self) -> &str {
        &self.name
    }
    /// Upper bound on how long the scheduling loop sleeps when no timer is armed.
    /// Values past what `Instant` can represent are treated as about thirty years.
    pub fn get_idle_recheck_duration(&self) -> Duration {
        self.idle_recheck
    }
    pub fn get_isolate_callback_panics(&self) -> bool {
        self.isolate_callback_panics
    }
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
    pub fn idle_recheck(mut self, idle_duration: Duration) -> Self {
        self.idle_recheck = idle_duration;
        self
    }
    /// When `true` (the default) a panicking callback is logged and the loop keeps
    /// running. When `false` the pool is stopped and the panic ends the scheduling thread.
    pub fn isolate_callback_panics(mut self, isolate: bool) -> Self {
        self.isolate_callback_panics = isolate;
        self
    }
}
