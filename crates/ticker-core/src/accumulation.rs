//! Person-seconds accumulation

use chrono::{DateTime, Local, SubsecRound};
use std::time::Duration;
use ticker_api::{CostDisplay, CostUnit};

/// Running total for the linked meeting.
///
/// Mutated only by [`tick`](Self::tick), count updates and [`reset`](Self::reset).
/// The total never decreases between resets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccumulationState {
    total_person_seconds: u64,
    start_time: Option<DateTime<Local>>,
    current_participant_count: u32,
    last_participant_update: Option<DateTime<Local>>,
    /// Wall-clock time of the latest tick, used to freeze the elapsed display
    last_tick: Option<DateTime<Local>>,
}

impl AccumulationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore persisted values.
    ///
    /// Without a recorded last tick the frozen display stops at the start time.
    pub fn restored(
        total_person_seconds: u64,
        start_time: Option<DateTime<Local>>,
        current_participant_count: u32,
        last_tick: Option<DateTime<Local>>,
    ) -> Self {
        Self {
            total_person_seconds,
            start_time,
            current_participant_count,
            last_participant_update: None,
            last_tick: last_tick.or(start_time),
        }
    }

    /// Advance by one tick period at `now`.
    ///
    /// Sets the start time if absent; adds the current count to the total when positive.
    /// Times are kept at millisecond precision so they survive persistence unchanged.
    pub fn tick(&mut self, now: DateTime<Local>) {
        let now = now.trunc_subsecs(3);
        if self.start_time.is_none() {
            self.start_time = Some(now);
        }
        if self.current_participant_count > 0 {
            self.total_person_seconds = self
                .total_person_seconds
                .saturating_add(u64::from(self.current_participant_count));
        }
        self.last_tick = Some(now);
    }

    /// Overwrite the count with a fresh observation. Returns whether it changed.
    pub fn observe_count(&mut self, count: u32, now: DateTime<Local>) -> bool {
        let changed = self.current_participant_count != count;
        self.current_participant_count = count;
        self.last_participant_update = Some(now);
        changed
    }

    /// Raise the count to at least one (the local user), never lowering it
    pub fn floor_count(&mut self) -> bool {
        if self.current_participant_count == 0 {
            self.current_participant_count = 1;
            true
        } else {
            false
        }
    }

    /// Zero everything for a new meeting
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn total_person_seconds(&self) -> u64 {
        self.total_person_seconds
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.start_time
    }

    pub fn current_participant_count(&self) -> u32 {
        self.current_participant_count
    }

    pub fn last_tick(&self) -> Option<DateTime<Local>> {
        self.last_tick
    }

    pub fn last_participant_update(&self) -> Option<DateTime<Local>> {
        self.last_participant_update
    }

    /// Elapsed meeting time. While frozen, measured to the last tick instead of `now`.
    pub fn elapsed(&self, now: DateTime<Local>, frozen: bool) -> Duration {
        let Some(start) = self.start_time else {
            return Duration::ZERO;
        };
        let end = match (frozen, self.last_tick) {
            (true, Some(last)) => last,
            _ => now,
        };
        ticker_util::elapsed_between(start, end)
    }

    pub fn cost_display(&self) -> CostDisplay {
        cost_display(self.total_person_seconds)
    }
}

/// Scale a person-seconds total into the unit shown to users.
///
/// Below 60: person-seconds. Below 3600: person-minutes. Otherwise
/// person-hours. Values are rounded to the nearest integer, halves up.
pub fn cost_display(total_person_seconds: u64) -> CostDisplay {
    if total_person_seconds >= 3600 {
        CostDisplay {
            value: (total_person_seconds + 1800) / 3600,
            unit: CostUnit::PersonHours,
        }
    } else if total_person_seconds >= 60 {
        CostDisplay {
            value: (total_person_seconds + 30) / 60,
            unit: CostUnit::PersonMinutes,
        }
    } else {
        CostDisplay {
            value: total_person_seconds,
            unit: CostUnit::PersonSeconds,
        }
    }
}
