//! Burst collapsing for filesystem events.
//!
//! A burst starts with the first signal and ends once no signal arrived for
//! the debounce window, or once the maximum delay since its first signal
//! has elapsed, whichever comes first. Each burst fires exactly once.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Raw signal forwarded by the watch callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchSignal {
    /// A qualifying change under the watched root.
    Changed,
    /// Events were lost (backend overflow or rescan request).
    Overflow,
}

/// One collapsed burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Burst {
    pub started: Instant,
    pub last: Instant,
    pub signals: u64,
    pub overflowed: bool,
}

impl Burst {
    fn new(now: Instant) -> Self {
        Self {
            started: now,
            last: now,
            signals: 0,
            overflowed: false,
        }
    }

    fn deadline(&self, window: Duration, max_delay: Duration) -> Instant {
        (self.last + window).min(self.started + max_delay)
    }
}

/// Trailing-edge debouncer with an upper bound on delay.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    window: Duration,
    max_delay: Duration,
}

impl Debouncer {
    pub fn new(window: Duration, max_delay: Duration) -> Self {
        Self {
            window,
            max_delay: max_delay.max(window),
        }
    }

    /// Collapse `signals` into bursts and call `on_fire` once per burst.
    ///
    /// Returns when `cancel` fires or every sender is gone. A pending burst
    /// is dropped in both cases.
    pub async fn run<F>(
        self,
        mut signals: mpsc::Receiver<WatchSignal>,
        cancel: CancellationToken,
        mut on_fire: F,
    ) where
        F: FnMut(Burst) + Send,
    {
        let mut pending: Option<Burst> = None;

        loop {
            let deadline = pending
                .as_ref()
                .map(|b| b.deadline(self.window, self.max_delay));

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep_until(deadline) => {
                    if let Some(burst) = pending.take() {
                        on_fire(burst);
                    }
                }
                signal = signals.recv() => {
                    let Some(signal) = signal else { break };
                    let now = Instant::now();
                    let burst = pending.get_or_insert_with(|| Burst::new(now));
                    burst.last = now;
                    burst.signals += 1;
                    if signal == WatchSignal::Overflow {
                        burst.overflowed = true;
                    }
                }
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
