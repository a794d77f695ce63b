//! Shared send schedule for all workers
//!
//! Slot `k` is due at `start + k / rate`. Slots are handed out in order to
//! whichever worker asks next, until a slot would fall at or after
//! `start + duration` or the duration has already elapsed. With enough
//! workers that yields exactly `ceil(rate × duration)` requests, independently
//! of the worker count. The schedule starts on the first request for a slot,
//! i.e. right after the start barrier releases.
//!
//! Workers that fall behind a slow service do not catch up in a burst: slots
//! overdue by more than one interval are skipped and the schedule resumes at
//! the latest due slot.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
struct Schedule {
    start: Instant,
    deadline: Instant,

    /// Position of the next slot in the schedule
    next: u64,

    issued: u64,
    skipped: u64,
}

#[derive(Debug)]
pub struct Pacer {
    rate: f64,
    duration: Duration,
    schedule: Mutex<Option<Schedule>>,
}

impl Pacer {
    pub fn new(rate: u32, duration: Duration) -> Self {
        Self {
            rate: f64::from(rate.max(1)),
            duration,
            schedule: Mutex::new(None),
        }
    }

    /// Most slots the whole run can hand out
    pub fn total_slots(&self) -> u64 {
        (self.duration.as_secs_f64() * self.rate).ceil() as u64
    }

    fn slot_time(&self, start: Instant, k: u64) -> Instant {
        start + Duration::from_nanos((k as f64 * 1e9 / self.rate).round() as u64)
    }

    /// Reserve the next slot
    ///
    /// Returns `None` once the run's duration is used up.
    fn reserve(&self, now: Instant) -> Option<Instant> {
        let mut schedule = self.schedule.lock();
        let schedule = schedule.get_or_insert_with(|| Schedule {
            start: now,
            deadline: now + self.duration,
            next: 0,
            issued: 0,
            skipped: 0,
        });

        if now >= schedule.deadline {
            return None;
        }

        let mut slot = self.slot_time(schedule.start, schedule.next);
        let interval = Duration::from_secs_f64(1.0 / self.rate);
        if now.saturating_duration_since(slot) > interval {
            let due = (now.duration_since(schedule.start).as_secs_f64() * self.rate).floor() as u64;
            let due = due.max(schedule.next);
            schedule.skipped += due - schedule.next;
            schedule.next = due;
            slot = self.slot_time(schedule.start, due);
        }

        if slot >= schedule.deadline {
            return None;
        }

        schedule.next += 1;
        schedule.issued += 1;
        Some(slot)
    }

    /// Wait for the next slot; `None` means the run is over
    pub async fn next_slot(&self) -> Option<Instant> {
        let slot = self.reserve(Instant::now())?;
        tokio::time::sleep_until(tokio::time::Instant::from_std(slot)).await;
        Some(slot)
    }

    /// Slots handed out so far
    pub fn issued(&self) -> u64 {
        self.schedule.lock().map_or(0, |schedule| schedule.issued)
    }

    /// Overdue slots dropped because every worker was busy
    pub fn skipped(&self) -> u64 {
        self.schedule.lock().map_or(0, |schedule| schedule.skipped)
    }
}
