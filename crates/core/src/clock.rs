//! Injectable sleep used by the bounded wait loops.
//!
//! Production code sleeps on the tokio timer via [`TokioSleeper`].
//! [`RecordingSleeper`] returns immediately and accumulates the
//! requested delays so tests can assert on simulated elapsed time.

#[cfg(any(test, feature = "test-util"))]
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Simulated clock: never blocks, records every requested delay.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sleeps requested so far.
    pub fn calls(&self) -> usize {
        self.slept.lock().map(|s| s.len()).unwrap_or_default()
    }

    /// Sum of all requested delays.
    pub fn elapsed(&self) -> Duration {
        self.slept
            .lock()
            .map(|s| s.iter().sum())
            .unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}
