//! Real-time [`Sleeper`] for the monitor thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::application::Sleeper;

/// Granularity at which a sleep re-checks the shutdown flag.
const SLICE: Duration = Duration::from_millis(200);

/// Sleeps on the current thread, waking early once `running` is cleared.
///
/// The monitor's backoff is several seconds; sleeping in short slices keeps
/// Ctrl+C responsive without a separate wake-up channel.
#[derive(Debug, Clone)]
pub struct ShutdownAwareSleeper {
    running: Arc<AtomicBool>,
}

impl ShutdownAwareSleeper {
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self { running }
    }
}

impl Sleeper for ShutdownAwareSleeper {
    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(SLICE.min(deadline - now));
        }
    }
}
