use std::{
    io,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::JoinHandle,
    time::Instant,
};

use crate::{
    pool::PoolShared,
    timer::{Timer, deadline_after},
};

pub(crate) struct TimerLoop {
    shared: Arc<PoolShared>,
    due: Vec<Arc<Timer>>,
}

impl TimerLoop {
    /// Spawns the scheduling thread of a pool.
    ///
    /// Each round scans every registered timer once: the due ones are collected, the
    /// earliest pending expiry becomes the wake deadline (or the configured idle recheck
    /// when nothing is armed). Due timers are fired with the state lock released, so
    /// callbacks may touch the pool, while the structural lock stays held so a timer
    /// cannot be unregistered from another thread in the middle of its callback.
    /// With nothing due the thread sleeps on the condition variable until the deadline
    /// or until woken.
    pub(crate) fn spawn(shared: &Arc<PoolShared>) -> io::Result<JoinHandle<()>> {
        let timer_loop = TimerLoop {
            shared: shared.clone(),
            due: vec![],
        };
        let thread_name = if shared.name.is_empty() {
            "timer-pool".to_string()
        } else {
            format!("timer-pool-{}", shared.name)
        };

        std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || timer_loop.run())
    }

    fn run(mut self) {
        let shared = self.shared.clone();
        loop {
            let structure = shared.structure.lock();
            let mut state = shared.state.lock();
            if !state.running {
                break;
            }

            let now = Instant::now();
            let mut wake_at = deadline_after(now, shared.config.get_idle_recheck_duration());
            for entry in shared.timers.iter() {
                match entry.value().next_expiry() {
                    Some(expiry) if expiry <= now => self.due.push(entry.value().clone()),
                    Some(expiry) if expiry < wake_at => wake_at = expiry,
                    _ => {}
                }
            }

            if self.due.is_empty() {
                drop(structure);
                shared.cond.wait_until(&mut state, wake_at);
                continue;
            }

            drop(state);
            self.fire_due(now);
            drop(structure);
        }
        log::debug!("timer pool [{}] scheduling thread exiting", shared.name);
    }

    fn fire_due(&mut self, now: Instant) {
        let isolate = self.shared.config.get_isolate_callback_panics();
        let mut due = std::mem::take(&mut self.due);
        for timer in due.drain(..) {
            if !self.shared.state.lock().running {
                break;
            }
            let fired = if isolate {
                panic::catch_unwind(AssertUnwindSafe(|| timer.fire(now)))
            } else {
                Ok(timer.fire(now))
            };
            match fired {
                Ok(count) => log::trace!(
                    "timer pool [{}] fired [{}] x{}",
                    self.shared.name,
                    timer.name(),
                    count
                ),
                Err(payload) => log::error!(
                    "timer pool [{}] callback of [{}] panicked: {}",
                    self.shared.name,
                    timer.name(),
                    panic_message(&*payload)
                ),
            }
        }
        self.due = due;
    }
}

impl Drop for TimerLoop {
    fn drop(&mut self) {
        // Reached by unwinding when a callback panic is not isolated.
        if std::thread::panicking() {
            self.shared.stop();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
