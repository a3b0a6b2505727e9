//! Blocking daily scheduler.
//!
//! A single timer wakes every `poll` interval and compares the wall clock to
//! the configured times of day. A due slot triggers one run, which is awaited
//! before the next poll, so runs never overlap. Slots missed while a run was
//! in progress collapse into a single run and are rescheduled for tomorrow.

use crate::error::ConfigError;
use chrono::{Days, Local, NaiveDateTime, NaiveTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// Parse a strict `HH:MM` time of day.
pub fn parse_time(raw: &str) -> Result<NaiveTime, ConfigError> {
    let raw = raw.trim();
    let well_formed = raw.len() == 5 && raw.as_bytes()[2] == b':';
    if !well_formed {
        return Err(ConfigError::InvalidTime(raw.to_string()));
    }
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| ConfigError::InvalidTime(raw.to_string()))
}

/// Which wall clock the slots refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    Utc,
    Local,
}

impl Clock {
    pub fn now(self) -> NaiveDateTime {
        match self {
            Clock::Utc => Utc::now().naive_utc(),
            Clock::Local => Local::now().naive_local(),
        }
    }
}

/// Times of day to run at, with the next due instant for each.
#[derive(Debug, Clone)]
pub struct DailySchedule {
    slots: Vec<NaiveTime>,
    next_due: Vec<NaiveDateTime>,
}

/// First occurrence of `slot` strictly after `now`.
fn next_occurrence(slot: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(slot);
    if today > now {
        today
    } else {
        today + Days::new(1)
    }
}

impl DailySchedule {
    /// A slot already passed today is first due tomorrow.
    pub fn new(mut slots: Vec<NaiveTime>, now: NaiveDateTime) -> Self {
        slots.sort();
        slots.dedup();
        let next_due = slots.iter().map(|s| next_occurrence(*s, now)).collect();
        Self { slots, next_due }
    }

    pub fn slots(&self) -> &[NaiveTime] {
        &self.slots
    }

    /// Earliest upcoming run.
    pub fn next_due(&self) -> Option<NaiveDateTime> {
        self.next_due.iter().min().copied()
    }

    /// True when at least one slot is due at `now`. Every due slot is moved
    /// to its next occurrence, so a slot fires at most once per day.
    pub fn poll_due(&mut self, now: NaiveDateTime) -> bool {
        let mut due = false;
        for (slot, next) in self.slots.iter().zip(self.next_due.iter_mut()) {
            if now >= *next {
                due = true;
                *next = next_occurrence(*slot, now);
            }
        }
        due
    }
}

/// Poll `schedule` until `shutdown` resolves, awaiting `job` for every due tick.
///
/// Returns the number of runs started. Shutdown is only observed between
/// runs; a run in progress is never cancelled.
pub async fn run_schedule<C, J, Fut>(
    mut schedule: DailySchedule,
    clock: C,
    poll: Duration,
    mut job: J,
    shutdown: impl Future<Output = ()>,
) -> usize
where
    C: Fn() -> NaiveDateTime,
    J: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut runs = 0;

    info!(
        slots = ?schedule.slots(),
        next = ?schedule.next_due(),
        poll_secs = poll.as_secs(),
        "Scheduler started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!(runs, "Scheduler stopping");
                return runs;
            }
        }

        let now = clock();
        if !schedule.poll_due(now) {
            continue;
        }
        debug!(%now, "Slot due");
        runs += 1;
        job().await;
        info!(next = ?schedule.next_due(), "Next run scheduled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::Cell;
    use std::rc::Rc;

    fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("09:00").unwrap(), t(9, 0));
        assert_eq!(parse_time(" 04:40 ").unwrap(), t(4, 40));
        for bad in ["9:00", "24:00", "12:60", "noon", "12:00:00", ""] {
            assert!(matches!(parse_time(bad), Err(ConfigError::InvalidTime(_))), "{bad}");
        }
    }

    #[test]
    fn test_fires_once_per_day() {
        let mut s = DailySchedule::new(vec![t(9, 0)], at(6, 8, 0, 0));
        assert!(!s.poll_due(at(6, 8, 59, 59)));
        assert!(s.poll_due(at(6, 9, 0, 5)));
        assert!(!s.poll_due(at(6, 9, 0, 15)));
        assert!(!s.poll_due(at(6, 23, 59, 0)));
        assert!(s.poll_due(at(7, 9, 0, 0)));
        assert_eq!(s.next_due(), Some(at(8, 9, 0, 0)));
    }

    #[test]
    fn test_start_after_slot_waits_for_tomorrow() {
        let mut s = DailySchedule::new(vec![t(9, 0)], at(6, 10, 0, 0));
        assert_eq!(s.next_due(), Some(at(7, 9, 0, 0)));
        assert!(!s.poll_due(at(6, 10, 0, 10)));
    }

    #[test]
    fn test_multiple_slots() {
        let mut s = DailySchedule::new(vec![t(14, 0), t(9, 0), t(9, 0)], at(6, 0, 0, 0));
        assert_eq!(s.slots(), &[t(9, 0), t(14, 0)]);
        assert!(s.poll_due(at(6, 9, 0, 0)));
        assert_eq!(s.next_due(), Some(at(6, 14, 0, 0)));
        assert!(s.poll_due(at(6, 14, 0, 1)));
        assert_eq!(s.next_due(), Some(at(7, 9, 0, 0)));
    }

    #[test]
    fn test_missed_slots_collapse_into_one_run() {
        let mut s = DailySchedule::new(vec![t(9, 0), t(9, 30)], at(6, 8, 0, 0));
        assert!(s.poll_due(at(6, 10, 0, 0)));
        assert!(!s.poll_due(at(6, 10, 0, 10)));
        assert_eq!(s.next_due(), Some(at(7, 9, 0, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_schedule_over_two_days() {
        let start = at(6, 8, 59, 0);
        let t0 = tokio::time::Instant::now();
        let clock = move || start + chrono::Duration::from_std(t0.elapsed()).unwrap();
        let schedule = DailySchedule::new(vec![t(9, 0)], start);

        let fired: Rc<Cell<Vec<NaiveDateTime>>> = Rc::default();
        let log = fired.clone();
        let runs = run_schedule(
            schedule,
            clock,
            Duration::from_secs(10),
            || {
                let log = log.clone();
                async move {
                    let mut v = log.take();
                    v.push(clock());
                    log.set(v);
                    // A run longer than the poll interval must not overlap the next tick.
                    tokio::time::sleep(Duration::from_secs(95)).await;
                }
            },
            tokio::time::sleep(Duration::from_secs(2 * 24 * 3600)),
        )
        .await;

        let fired = fired.take();
        assert_eq!(runs, 2);
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].date(), start.date());
        assert!(fired[0] >= at(6, 9, 0, 0) && fired[0] < at(6, 9, 0, 11));
        assert_eq!(fired[1].date(), at(7, 0, 0, 0).date());
    }
}
