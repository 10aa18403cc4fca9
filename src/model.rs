use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::money::Money;

/// Minutes on a day-relative line. `0` is midnight of the reference date;
/// negative values belong to the previous day, values `>= 1440` to the next.
pub type Minute = i32;

pub const MINUTES_PER_DAY: Minute = 1440;
pub const MINUTES_PER_HOUR: Minute = 60;

// ── TimeWindow ───────────────────────────────────────────────────

/// Half-open interval `[start, end)` on the day-relative minute line.
///
/// Windows that cross midnight keep growing past 1440 instead of folding
/// back, so every comparison happens on one absolute line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Minute,
    pub end: Minute,
}

impl TimeWindow {
    pub fn new(start: Minute, end: Minute) -> Self {
        debug_assert!(start < end, "TimeWindow start must be before end");
        Self { start, end }
    }

    /// Build from two wall-clock times. An `end` at or before `start` means
    /// the window runs into the next day.
    pub fn from_clock(start: ClockTime, end: ClockTime) -> Self {
        let (s, mut e) = (start.minutes(), end.minutes());
        if e <= s {
            e += MINUTES_PER_DAY;
        }
        Self::new(s, e)
    }

    pub fn starting_at(start: Minute, duration: Minute) -> Self {
        Self::new(start, start + duration)
    }

    pub fn duration(&self) -> Minute {
        self.end - self.start
    }

    /// True when any part of the window lies outside the reference day.
    pub fn wraps(&self) -> bool {
        self.start < 0 || self.end >= MINUTES_PER_DAY
    }

    /// Widen the window by `before` minutes at the start and `after` at the end.
    pub fn expand(&self, before: Minute, after: Minute) -> Self {
        Self::new(self.start - before, self.end + after)
    }

    /// Move the window by whole days, e.g. to place a neighbouring date's
    /// block onto this date's line.
    pub fn shift_days(&self, days: i32) -> Self {
        let delta = days * MINUTES_PER_DAY;
        Self::new(self.start + delta, self.end + delta)
    }

    /// Split at day boundaries. Windows no longer than a day yield at most two parts.
    pub fn segments(&self) -> impl Iterator<Item = TimeWindow> {
        let mut cursor = self.start;
        let end = self.end;
        std::iter::from_fn(move || {
            if cursor >= end {
                return None;
            }
            let boundary = (cursor.div_euclid(MINUTES_PER_DAY) + 1) * MINUTES_PER_DAY;
            let part = TimeWindow::new(cursor, boundary.min(end));
            cursor = part.end;
            Some(part)
        })
    }

    /// Half-open overlap: `a` and `b` are disjoint iff `a.end <= b.start || a.start >= b.end`.
    /// Both windows are split into their per-day segments first; the result is symmetric.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.segments().any(|a| {
            other
                .segments()
                .any(|b| !(a.end <= b.start || a.start >= b.end))
        })
    }

    pub fn contains_window(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn start_clock(&self) -> ClockTime {
        ClockTime::wrapping(self.start)
    }

    pub fn end_clock(&self) -> ClockTime {
        ClockTime::wrapping(self.end)
    }

    /// An end of exactly 24:00 reads as 00:00 of the following day.
    pub fn ends_next_day(&self) -> bool {
        self.end >= MINUTES_PER_DAY
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_clock(), self.end_clock())?;
        if self.start < 0 {
            write!(f, " (from previous day)")?;
        } else if self.ends_next_day() {
            write!(f, " (next day)")?;
        }
        Ok(())
    }
}

// ── ClockTime ────────────────────────────────────────────────────

/// Wall-clock time of day, `HH:mm` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime(0);

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(ClockTime(hour * 60 + minute))
    }

    /// Fold any minute on the day-relative line back onto the clock.
    pub fn wrapping(minute: Minute) -> Self {
        ClockTime(minute.rem_euclid(MINUTES_PER_DAY) as u16)
    }

    pub fn minutes(&self) -> Minute {
        Minute::from(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time of day {0:?}, expected HH:mm")]
pub struct ClockParseError(pub String);

impl FromStr for ClockTime {
    type Err = ClockParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ClockParseError(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(err)?;
        // tolerate a trailing seconds component ("18:00:00")
        let m = m.split(':').next().ok_or_else(err)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(err());
        }
        let hour: u16 = h.parse().map_err(|_| err())?;
        let minute: u16 = m.parse().map_err(|_| err())?;
        ClockTime::from_hm(hour, minute).ok_or_else(err)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ClockParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

// ── Reference data ───────────────────────────────────────────────

/// Membership tier that selects the rate card and add-on catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Member,
    NonMember,
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientType::Member => f.write_str("member"),
            ClientType::NonMember => f.write_str("non-member"),
        }
    }
}

/// Weekly opening hours, one row per weekday (0 = Sunday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingSchedule {
    pub weekday: u8,
    pub active: bool,
    pub open: ClockTime,
    pub close: ClockTime,
}

impl OperatingSchedule {
    pub fn crosses_midnight(&self) -> bool {
        self.close < self.open
    }

    /// Open hours on the weekday's minute line. `open == close` is round the clock.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::from_clock(self.open, self.close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceBuffers {
    pub space_id: Ulid,
    pub setup_hours: u32,
    pub teardown_hours: u32,
}

impl SpaceBuffers {
    /// Event window widened by the mandatory setup and teardown time.
    pub fn around(&self, event: &TimeWindow) -> TimeWindow {
        event.expand(
            self.setup_hours as Minute * MINUTES_PER_HOUR,
            self.teardown_hours as Minute * MINUTES_PER_HOUR,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCard {
    pub config_id: Ulid,
    pub client_type: ClientType,
    pub price_4h: Option<Money>,
    pub price_8h: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalHourRate {
    pub config_id: Ulid,
    pub client_type: ClientType,
    pub base_hours: u32,
    pub min_attendees: u32,
    /// `None` leaves the range open above.
    pub max_attendees: Option<u32>,
    pub price_per_hour: Money,
}

impl AdditionalHourRate {
    pub fn covers(&self, attendees: u32) -> bool {
        attendees >= self.min_attendees && self.max_attendees.is_none_or(|max| attendees <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnService {
    pub id: Ulid,
    pub name: String,
    pub client_type: ClientType,
    pub price: Money,
    pub active: bool,
}

// ── Calendar blocks ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    ConfirmedReservation,
    /// Entered by staff outside the quotation flow.
    Manual,
}

/// Reserved time on a space's calendar. `window` already includes setup and teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarBlock {
    pub id: Ulid,
    pub space_id: Ulid,
    pub date: NaiveDate,
    pub window: TimeWindow,
    pub quote_id: Option<Ulid>,
    pub block_type: BlockType,
    pub reason: String,
}

// ── Quotes ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteStatus::Pending => f.write_str("pending"),
            QuoteStatus::Confirmed => f.write_str("confirmed"),
            QuoteStatus::Rejected => f.write_str("rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    DepositPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    Base,
    AdditionalHours,
    NightSurcharge,
    AddOn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: LineItemKind,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl LineItem {
    pub fn new(kind: LineItemKind, description: impl Into<String>, quantity: u32, unit_price: Money) -> Self {
        Self {
            kind,
            description: description.into(),
            quantity,
            unit_price,
            line_total: unit_price * i64::from(quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: Ulid,
    pub number: String,
    pub space_id: Ulid,
    pub config_id: Ulid,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub duration_hours: u32,
    pub attendees: u32,
    pub event_type: String,
    pub client_type: ClientType,
    pub line_items: Vec<LineItem>,
    pub total: Money,
    pub deposit_amount: Money,
    pub status: QuoteStatus,
    pub payment_status: PaymentStatus,
    pub observations: String,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Quote {
    /// Unbuffered event time on the quote date's minute line.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::starting_at(
            self.start_time.minutes(),
            self.duration_hours as Minute * MINUTES_PER_HOUR,
        )
    }

    pub fn append_observation(&mut self, note: &str) {
        if !self.observations.is_empty() {
            self.observations.push('\n');
        }
        self.observations.push_str(note);
    }
}

/// A pending quote rejected because another quote took its time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub quote: Quote,
    pub reason: String,
}

// ── Change feed ──────────────────────────────────────────────────

/// Calendar changes published per space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    QuoteCreated {
        quote_id: Ulid,
        space_id: Ulid,
        date: NaiveDate,
    },
    QuoteConfirmed {
        quote_id: Ulid,
        space_id: Ulid,
        block_id: Ulid,
    },
    QuoteRejected {
        quote_id: Ulid,
        space_id: Ulid,
        superseded_by: Ulid,
    },
    BlockCreated {
        block_id: Ulid,
        space_id: Ulid,
        date: NaiveDate,
        window: TimeWindow,
    },
}

impl Event {
    pub fn space_id(&self) -> Ulid {
        match self {
            Event::QuoteCreated { space_id, .. }
            | Event::QuoteConfirmed { space_id, .. }
            | Event::QuoteRejected { space_id, .. }
            | Event::BlockCreated { space_id, .. } => *space_id,
        }
    }

    /// JSON body for subscribers that forward the feed over text channels.
    pub fn payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
