use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

/// Resolves dates and weekdays in the single configured timezone.
///
/// Civil dates (`2026-03-14`) are taken as-is. Instants are converted into
/// the configured zone before their date is read, so a late-evening UTC
/// timestamp never lands on the wrong weekday because of the host's locale.
#[derive(Debug, Clone, Copy)]
pub struct Calendar {
    tz: Tz,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid date {0:?}, expected YYYY-MM-DD or an RFC 3339 timestamp")]
pub struct DateParseError(pub String);

impl Calendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// 0 = Sunday .. 6 = Saturday.
    pub fn weekday_of(&self, date: NaiveDate) -> u8 {
        date.weekday().num_days_from_sunday() as u8
    }

    pub fn parse_date(&self, raw: &str) -> Result<NaiveDate, DateParseError> {
        let raw = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(date);
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|instant| instant.with_timezone(&self.tz).date_naive())
            .map_err(|_| DateParseError(raw.to_string()))
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.date_of(Utc::now())
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
