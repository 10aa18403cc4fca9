use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::first_conflict;
use super::{Engine, EngineError, OpeningHours, hours};

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Why a request cannot be booked. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Unavailable {
    Closed {
        weekday: u8,
    },
    DurationOutOfRange {
        requested: u32,
    },
    BeforeOpening {
        open: ClockTime,
    },
    AfterClosing {
        close: ClockTime,
    },
    /// Start falls in the daytime gap of an overnight schedule.
    OutsideOpenHours {
        close: ClockTime,
        open: ClockTime,
    },
    ExceedsClosing {
        end: ClockTime,
        close: ClockTime,
    },
    Conflict {
        block_id: Ulid,
        block_window: TimeWindow,
        reason: String,
        setup_hours: u32,
        teardown_hours: u32,
    },
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::Closed { weekday } => {
                let day = WEEKDAYS.get(*weekday as usize).copied().unwrap_or("this day");
                write!(f, "The space is closed this day ({day})")
            }
            Unavailable::DurationOutOfRange { requested } => write!(
                f,
                "Duration must be between {MIN_DURATION_HOURS} and {MAX_DURATION_HOURS} hours (requested {requested})"
            ),
            Unavailable::BeforeOpening { open } => {
                write!(f, "Start time is before opening time ({open})")
            }
            Unavailable::AfterClosing { close } => {
                write!(f, "Start time is at or after closing time ({close})")
            }
            Unavailable::OutsideOpenHours { close, open } => {
                write!(f, "The space is closed between {close} and {open}")
            }
            Unavailable::ExceedsClosing { end, close } => {
                write!(f, "The event would end at {end}, after closing time ({close})")
            }
            Unavailable::Conflict {
                block_window,
                reason,
                setup_hours,
                teardown_hours,
                ..
            } => write!(
                f,
                "Conflicts with an existing booking {block_window} ({reason}); \
                 events need {setup_hours}h setup and {teardown_hours}h teardown around them"
            ),
        }
    }
}

/// Outcome of an availability check. Rejections are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub message: String,
    pub end_time: Option<ClockTime>,
    pub ends_next_day: bool,
    pub reason: Option<Unavailable>,
}

impl Availability {
    fn available(event: &TimeWindow) -> Self {
        let end = event.end_clock();
        let ends_next_day = event.ends_next_day();
        let message = if ends_next_day {
            format!("Available, ends at {end} the following day")
        } else {
            format!("Available, ends at {end}")
        };
        Self {
            available: true,
            message,
            end_time: Some(end),
            ends_next_day,
            reason: None,
        }
    }

    fn unavailable(reason: Unavailable) -> Self {
        Self {
            available: false,
            message: reason.to_string(),
            end_time: None,
            ends_next_day: false,
            reason: Some(reason),
        }
    }

    fn outcome_label(&self) -> &'static str {
        match &self.reason {
            None => "available",
            Some(Unavailable::Closed { .. }) => "closed",
            Some(Unavailable::DurationOutOfRange { .. }) => "invalid_duration",
            Some(Unavailable::Conflict { .. }) => "conflict",
            Some(_) => "outside_hours",
        }
    }
}

/// Check an event against one day's opening hours.
///
/// `next` is the following weekday's schedule; it only matters when a
/// same-day schedule closes at 23:59 and the event carries on into a day
/// that opens at midnight.
pub fn check_opening_hours(
    schedule: &OperatingSchedule,
    next: Option<&OperatingSchedule>,
    event: &TimeWindow,
) -> Result<(), Unavailable> {
    let open = schedule.window();
    if open.duration() == MINUTES_PER_DAY {
        return Ok(());
    }
    let exceeds = || Unavailable::ExceedsClosing {
        end: event.end_clock(),
        close: schedule.close,
    };

    if schedule.crosses_midnight() {
        // Closed from `close` until `open`; the hours after midnight belong
        // to the previous day's schedule.
        let start = event.start_clock();
        if start >= schedule.close && start < schedule.open {
            return Err(Unavailable::OutsideOpenHours {
                close: schedule.close,
                open: schedule.open,
            });
        }
        if event.start < open.start {
            return Err(Unavailable::BeforeOpening { open: schedule.open });
        }
        return if event.end > open.end { Err(exceeds()) } else { Ok(()) };
    }

    if event.start < open.start {
        return Err(Unavailable::BeforeOpening { open: schedule.open });
    }
    if event.start >= open.end {
        return Err(Unavailable::AfterClosing { close: schedule.close });
    }
    if event.end > open.end && !continues_into(schedule, next, event) {
        return Err(exceeds());
    }
    Ok(())
}

fn continues_into(schedule: &OperatingSchedule, next: Option<&OperatingSchedule>, event: &TimeWindow) -> bool {
    let Some(next) = next else { return false };
    schedule.close.minutes() >= MINUTES_PER_DAY - 1
        && next.open == ClockTime::MIDNIGHT
        && event.end - MINUTES_PER_DAY <= next.window().end
}

impl Engine {
    /// Can `space_id` host an event of `duration_hours` starting at `start_time` on `date`?
    pub async fn validate(
        &self,
        space_id: Ulid,
        date: NaiveDate,
        start_time: ClockTime,
        duration_hours: u32,
        event_type: &str,
    ) -> Result<Availability, EngineError> {
        let result = self.evaluate(space_id, date, start_time, duration_hours).await?;
        debug!(
            %space_id, %date, start = %start_time, duration_hours, event_type,
            "availability: {}", result.message
        );
        metrics::counter!(observability::AVAILABILITY_CHECKS_TOTAL, "outcome" => result.outcome_label())
            .increment(1);
        Ok(result)
    }

    async fn evaluate(
        &self,
        space_id: Ulid,
        date: NaiveDate,
        start_time: ClockTime,
        duration_hours: u32,
    ) -> Result<Availability, EngineError> {
        let weekday = self.calendar.weekday_of(date);
        let OpeningHours::Open(schedule) = self.resolve_hours(weekday).await? else {
            return Ok(Availability::unavailable(Unavailable::Closed { weekday }));
        };

        if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&duration_hours) {
            return Ok(Availability::unavailable(Unavailable::DurationOutOfRange {
                requested: duration_hours,
            }));
        }

        let event = TimeWindow::starting_at(start_time.minutes(), hours(duration_hours)?);
        let next = if !schedule.crosses_midnight() && event.ends_next_day() {
            self.resolve_hours((weekday + 1) % 7).await?
        } else {
            OpeningHours::Closed
        };
        if let Err(reason) = check_opening_hours(&schedule, next.schedule(), &event) {
            return Ok(Availability::unavailable(reason));
        }

        let buffers = self.buffers_for(space_id).await?;
        let buffered = buffers.around(&event);
        let blocks = self.blocks_around(space_id, date).await?;
        if let Some(block) = first_conflict(&buffered, &blocks) {
            return Ok(Availability::unavailable(Unavailable::Conflict {
                block_id: block.id,
                block_window: block.window,
                reason: block.reason.clone(),
                setup_hours: buffers.setup_hours,
                teardown_hours: buffers.teardown_hours,
            }));
        }

        Ok(Availability::available(&event))
    }
}
