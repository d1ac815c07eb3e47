use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// How much usage a tick reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Accounting {
    /// Every tick reports exactly one period. Time spent suspended without
    /// ticks firing is not counted.
    #[default]
    Fixed,
    /// Every tick reports the whole seconds of monotonic time since the last
    /// report; sub-second remainders carry over.
    Measured,
}

/// Periodic tick source for the reporter.
///
/// The first tick fires one period after creation. A tick that came due
/// while the previous one was still being handled is dropped rather than
/// fired late, so ticks never queue up behind a slow one.
pub struct TickScheduler {
    interval: Interval,
    period: Duration,
    accounting: Accounting,
    last_report: Instant,
    remainder: Duration,
}

impl TickScheduler {
    pub fn new(period: Duration, accounting: Accounting) -> Self {
        let now = Instant::now();
        let mut interval = interval_at(now + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            interval,
            period,
            accounting,
            last_report: now,
            remainder: Duration::ZERO,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next tick and return the seconds it should report
    pub async fn next_tick(&mut self) -> u64 {
        let waiting_since = Instant::now();
        loop {
            let scheduled = self.interval.tick().await;
            if scheduled >= waiting_since {
                break;
            }
            tracing::debug!("Skipping tick that came due during the previous tick");
        }
        let quantum = self.quantum_at(Instant::now());
        tracing::debug!("Tick: reporting {}s ({:?} accounting)", quantum, self.accounting);
        quantum
    }

    fn quantum_at(&mut self, now: Instant) -> u64 {
        match self.accounting {
            Accounting::Fixed => self.period.as_secs(),
            Accounting::Measured => {
                let elapsed = now.saturating_duration_since(self.last_report) + self.remainder;
                let seconds = elapsed.as_secs();
                self.remainder = elapsed - Duration::from_secs(seconds);
                self.last_report = now;
                seconds
            }
        }
    }
}
