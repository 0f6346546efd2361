use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimerPoolError {
    /// The scheduling thread of a new pool could not be spawned.
    #[error("Timer pool : failed to spawn scheduling thread [{0}]")]
    ThreadSpawn(#[from] std::io::Error),
    #[error("Timer build error : no callback set !")]
    BuildErrorNoCallbackSet,
    #[error("Timer build error : no interval set !")]
    BuildErrorNoIntervalSet,
}
