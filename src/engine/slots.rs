use chrono::NaiveDate;
use tracing::debug;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::first_conflict;
use super::{Engine, EngineError, OpeningHours, hours};

impl Engine {
    /// Start times on `date` at which an event of `duration_hours` fits the
    /// opening hours and clears every block, buffers included. Ascending.
    ///
    /// Candidates step by the configured slot interval from opening time up
    /// to the last start that still ends by closing time. For overnight
    /// schedules only the starts before midnight are listed, since earlier
    /// starts fall before opening. A round-the-clock day lists every step.
    pub async fn list_available_starts(
        &self,
        space_id: Ulid,
        date: NaiveDate,
        duration_hours: u32,
    ) -> Result<Vec<ClockTime>, EngineError> {
        if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&duration_hours) {
            return Err(EngineError::Validation(format!(
                "duration must be between {MIN_DURATION_HOURS} and {MAX_DURATION_HOURS} hours, got {duration_hours}"
            )));
        }
        let OpeningHours::Open(schedule) = self.hours_on(date).await? else {
            return Ok(Vec::new());
        };

        let open = schedule.window();
        let length = hours(duration_hours)?;
        let last = if open.duration() == MINUTES_PER_DAY {
            MINUTES_PER_DAY - 1
        } else {
            (open.end - length).min(MINUTES_PER_DAY - 1)
        };
        let step = self.config.slot_step_minutes.max(1) as Minute;

        let buffers = self.buffers_for(space_id).await?;
        let blocks = self.blocks_around(space_id, date).await?;

        let mut starts = Vec::new();
        let mut candidate = open.start;
        while candidate <= last {
            let event = TimeWindow::starting_at(candidate, length);
            if first_conflict(&buffers.around(&event), &blocks).is_none() {
                starts.push(ClockTime::wrapping(candidate));
            }
            candidate += step;
        }
        debug!(%space_id, %date, duration_hours, "{} start(s) available", starts.len());
        Ok(starts)
    }
}
