//! Schedule policies.
//!
//! A policy maps the state of a task to its next fire time. Policies are pure: they read
//! the task state handed to them and never mutate it. The dispatcher calls
//! [`SchedulePolicy::next_fire`] once when a task is created and once after every
//! scheduled fire, with `count` already incremented.

use std::fmt;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, NaiveTime};

use super::task::TaskState;

/// Computes when a task fires next.
pub trait SchedulePolicy: Send + Sync + fmt::Debug + fmt::Display {
    /// Next fire time for `task`, or `None` when no further execution is planned.
    fn next_fire(&self, task: &TaskState) -> Option<SystemTime>;
}

fn nth_interval(start: SystemTime, interval: Duration, n: u32) -> Option<SystemTime> {
    start.checked_add(interval.checked_mul(n)?)
}

/// Fires every `interval`, measured from the time the task was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    /// Create the policy.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// The interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl SchedulePolicy for FixedInterval {
    fn next_fire(&self, task: &TaskState) -> Option<SystemTime> {
        nth_interval(task.add_time, self.interval, task.count.saturating_add(1))
    }
}

impl fmt::Display for FixedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {:?}", self.interval)
    }
}

/// Like [`FixedInterval`] but stops after `times` fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedInterval {
    interval: Duration,
    times: u32,
}

impl BoundedInterval {
    /// Create the policy.
    #[must_use]
    pub const fn new(interval: Duration, times: u32) -> Self {
        Self { interval, times }
    }

    /// Total number of fires.
    #[must_use]
    pub const fn times(&self) -> u32 {
        self.times
    }
}

impl SchedulePolicy for BoundedInterval {
    fn next_fire(&self, task: &TaskState) -> Option<SystemTime> {
        if task.count >= self.times {
            return None;
        }
        nth_interval(task.add_time, self.interval, task.count + 1)
    }
}

impl fmt::Display for BoundedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {:?}, {} times", self.interval, self.times)
    }
}

/// Fires once at each listed instant, in list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSchedule {
    plan: Vec<SystemTime>,
}

impl PlanSchedule {
    /// Create the policy. The list is used as given.
    #[must_use]
    pub fn new(plan: impl Into<Vec<SystemTime>>) -> Self {
        Self { plan: plan.into() }
    }

    /// The planned instants.
    #[must_use]
    pub fn plan(&self) -> &[SystemTime] {
        &self.plan
    }
}

impl SchedulePolicy for PlanSchedule {
    fn next_fire(&self, task: &TaskState) -> Option<SystemTime> {
        usize::try_from(task.count)
            .ok()
            .and_then(|index| self.plan.get(index))
            .copied()
    }
}

impl fmt::Display for PlanSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan of {} instants", self.plan.len())
    }
}

/// Fires every day at a fixed local time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
}

impl DailySchedule {
    /// Create the policy for `hour:minute:second.millis` local time.
    ///
    /// # Errors
    ///
    /// Returns a message when a field is out of range.
    pub fn new(hour: u32, minute: u32, second: u32, millis: u32) -> Result<Self, String> {
        if hour > 23 || minute > 59 || second > 59 || millis > 999 {
            return Err(format!(
                "invalid time of day {hour:02}:{minute:02}:{second:02}.{millis:03}"
            ));
        }
        NaiveTime::from_hms_milli_opt(hour, minute, second, millis)
            .map(|time| Self { time })
            .ok_or_else(|| format!("invalid time of day {hour}:{minute}:{second}.{millis}"))
    }

    /// The time of day.
    #[must_use]
    pub const fn time_of_day(&self) -> NaiveTime {
        self.time
    }

    /// First occurrence strictly after `reference`.
    ///
    /// A day on which the local time does not exist (DST gap) is skipped.
    #[must_use]
    pub fn next_after(&self, reference: SystemTime) -> Option<SystemTime> {
        let reference: DateTime<Local> = reference.into();
        let mut date = reference.date_naive();
        for _ in 0..3 {
            let candidate = date
                .and_time(self.time)
                .and_local_timezone(Local)
                .earliest()
                .filter(|candidate| *candidate > reference);
            if let Some(candidate) = candidate {
                return Some(candidate.into());
            }
            date = date.succ_opt()?;
        }
        None
    }
}

impl SchedulePolicy for DailySchedule {
    fn next_fire(&self, task: &TaskState) -> Option<SystemTime> {
        let reference = if task.count == 0 {
            SystemTime::now()
        } else {
            // Never earlier than the actual fire, so a late dispatch does not replay days.
            match (task.next_fire_time, task.last_fire_time) {
                (Some(scheduled), Some(fired)) => scheduled.max(fired),
                (Some(at), None) | (None, Some(at)) => at,
                (None, None) => SystemTime::now(),
            }
        };
        self.next_after(reference)
    }
}

impl fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every day at {}", self.time.format("%H:%M:%S%.3f"))
    }
}
