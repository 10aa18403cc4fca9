use chrono::NaiveDate;
use tracing::debug;

use crate::model::OperatingSchedule;

use super::{Engine, EngineError};

/// A weekday's schedule after resolution. Missing and inactive rows are both `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpeningHours {
    Closed,
    Open(OperatingSchedule),
}

impl OpeningHours {
    pub fn schedule(&self) -> Option<&OperatingSchedule> {
        match self {
            OpeningHours::Open(s) => Some(s),
            OpeningHours::Closed => None,
        }
    }

    pub fn crosses_midnight(&self) -> bool {
        self.schedule().is_some_and(OperatingSchedule::crosses_midnight)
    }
}

impl Engine {
    pub async fn resolve_hours(&self, weekday: u8) -> Result<OpeningHours, EngineError> {
        let row = self.store.schedule(weekday).await?;
        Ok(match row {
            Some(schedule) if schedule.active => OpeningHours::Open(schedule),
            Some(_) => {
                debug!("weekday {weekday} schedule is inactive");
                OpeningHours::Closed
            }
            None => OpeningHours::Closed,
        })
    }

    /// Opening hours for a date, weekday taken in the configured timezone.
    pub async fn hours_on(&self, date: NaiveDate) -> Result<OpeningHours, EngineError> {
        self.resolve_hours(self.calendar.weekday_of(date)).await
    }
}
