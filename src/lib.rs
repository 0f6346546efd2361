//! Many logical timers multiplexed onto one background scheduling thread per pool.
//!
//! A [`TimerPool`] owns the thread. Timers created through it are configured and
//! started via their [`TimerHandle`], and fire their callback on the pool thread,
//! once per elapsed interval even when the thread was delayed. A timer stays
//! registered exactly as long as some `TimerHandle` for it is alive.
mod config;
mod errors;
mod handle;
mod pool;
mod timer;
mod timer_loop;

pub use config::PoolConfig;
pub use errors::TimerPoolError;
pub use handle::{TimerBuilder, TimerHandle, WeakTimerHandle};
pub use pool::{PoolHandle, TimerPool, WeakPoolHandle};
pub use timer::{Callback, StartMode, Timer};

pub mod prelude {
    pub use super::{
        PoolConfig, PoolHandle, StartMode, TimerHandle, TimerPool, TimerPoolError,
        WeakPoolHandle, WeakTimerHandle,
    };
}
