use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When the cool-down clock of a poller restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownPolicy {
    /// Any attempt, failed or not, waits a full interval before the next.
    AfterAttempt,
    /// Failures are retried on the next tick; only a success starts the wait.
    #[default]
    AfterSuccess,
}

/// Rate limit gate for an expensive source. At most one fetch in flight.
///
/// Under [`CooldownPolicy::AfterSuccess`] a failed fetch is retried after the
/// shorter `retry` back-off instead of the full interval.
#[derive(Debug, Clone)]
pub struct Cooldown {
    interval: TimeDelta,
    retry: TimeDelta,
    policy: CooldownPolicy,
    last: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    in_flight: bool,
}

fn delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>, wait: TimeDelta) -> bool {
    // clock stepped back past `since`
    now < since || now - since >= wait
}

impl Cooldown {
    pub fn new(interval: Duration, policy: CooldownPolicy) -> Self {
        Self {
            interval: delta(interval),
            retry: TimeDelta::zero(),
            policy,
            last: None,
            failed_at: None,
            in_flight: false,
        }
    }

    /// Minimum wait after a failed fetch. Capped at the interval.
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = delta(retry).min(self.interval);
        self
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.in_flight {
            return false;
        }
        if let Some(failed_at) = self.failed_at {
            if !elapsed(failed_at, now, self.retry) {
                return false;
            }
        }
        self.last.map_or(true, |last| elapsed(last, now, self.interval))
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.in_flight = true;
        if self.policy == CooldownPolicy::AfterAttempt {
            self.last = Some(now);
        }
    }

    pub fn finish(&mut self, now: DateTime<Utc>, success: bool) {
        self.in_flight = false;
        if success {
            self.failed_at = None;
            if self.policy == CooldownPolicy::AfterSuccess {
                self.last = Some(now);
            }
        } else {
            self.failed_at = Some(now);
        }
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HOUR: Duration = Duration::from_secs(3600);

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap() + TimeDelta::minutes(minutes)
    }

    #[test]
    fn test_due_initially_then_gated() {
        let mut gate = Cooldown::new(HOUR, CooldownPolicy::AfterSuccess);
        assert!(gate.is_due(t(0)));
        gate.start(t(0));
        assert!(!gate.is_due(t(0)), "in flight");
        gate.finish(t(1), true);
        assert!(!gate.is_due(t(30)));
        assert!(!gate.is_due(t(60)));
        assert!(gate.is_due(t(61)));
    }

    #[test]
    fn test_failure_retries_sooner_after_success_policy() {
        let mut gate = Cooldown::new(HOUR, CooldownPolicy::AfterSuccess);
        gate.start(t(0));
        gate.finish(t(0), false);
        assert!(gate.is_due(t(1)));
        assert_eq!(gate.last(), None);
    }

    #[test]
    fn test_failure_backoff_holds_retries() {
        let mut gate = Cooldown::new(HOUR, CooldownPolicy::AfterSuccess).with_retry(Duration::from_secs(300));
        gate.start(t(0));
        gate.finish(t(0), false);
        assert!(!gate.is_due(t(1)));
        assert!(!gate.is_due(t(4)));
        assert!(gate.is_due(t(5)));

        gate.start(t(5));
        gate.finish(t(5), true);
        assert!(!gate.is_due(t(11)), "success restarts the full interval");
        assert!(gate.is_due(t(65)));
    }

    #[test]
    fn test_retry_never_exceeds_interval() {
        let mut gate = Cooldown::new(HOUR, CooldownPolicy::AfterAttempt).with_retry(Duration::from_secs(7200));
        gate.start(t(0));
        gate.finish(t(0), false);
        assert!(!gate.is_due(t(59)));
        assert!(gate.is_due(t(60)));
    }

    #[test]
    fn test_failure_waits_under_after_attempt_policy() {
        let mut gate = Cooldown::new(HOUR, CooldownPolicy::AfterAttempt);
        gate.start(t(0));
        gate.finish(t(0), false);
        assert!(!gate.is_due(t(1)));
        assert!(gate.is_due(t(60)));
    }

    #[test]
    fn test_clock_going_backwards_is_due() {
        let mut gate = Cooldown::new(HOUR, CooldownPolicy::AfterSuccess);
        gate.start(t(120));
        gate.finish(t(120), true);
        assert!(gate.is_due(t(0)));
    }
}
