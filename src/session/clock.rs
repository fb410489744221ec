use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-second ticker bound to one call session.
///
/// `start` spawns the tick task; `stop` cancels it and is idempotent. No tick
/// callback runs after `stop` returns: the cancellation branch wins the
/// select, and the callback is additionally gated on the token so a tick that
/// raced the cancel is dropped instead of delivered.
pub struct TimerClock {
    token: CancellationToken,
    started: AtomicBool,
}

impl TimerClock {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Begin emitting one `on_tick` call per elapsed second. A second `start`
    /// on the same clock is ignored; a session never has two tick tasks.
    pub fn start<F>(&self, on_tick: F)
    where
        F: Fn() + Send + 'static,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("timer clock already started");
            return;
        }
        let token = self.token.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // a tokio interval completes its first tick immediately, the
            // first callback must land one second after start
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if token.is_cancelled() {
                            break;
                        }
                        on_tick();
                    }
                }
            }
        });
    }

    /// Stop ticking. Safe to call any number of times, from any state.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for TimerClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerClock {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
