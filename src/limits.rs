//! Business constants and input bounds.

use crate::model::Minute;

/// Bookable duration range, inclusive.
pub const MIN_DURATION_HOURS: u32 = 4;
pub const MAX_DURATION_HOURS: u32 = 8;

/// Longest duration pricing accepts. Wider than the bookable range so
/// additional hours can still be quoted directly.
pub const MAX_PRICED_DURATION_HOURS: u32 = 24;

/// Rate card tiers.
pub const SHORT_TIER_HOURS: u32 = 4;
pub const LONG_TIER_HOURS: u32 = 8;

/// Hours already covered by the base price before additional hours apply.
pub const ADDITIONAL_HOUR_BASE_HOURS: u32 = 8;

pub const DEFAULT_SETUP_HOURS: u32 = 2;
pub const DEFAULT_TEARDOWN_HOURS: u32 = 2;

/// Events ending strictly after 22:00 pay the night surcharge.
pub const NIGHT_CUTOFF_MINUTE: Minute = 22 * 60;
pub const NIGHT_SURCHARGE_BPS: u32 = 1_500;

pub const DEFAULT_DEPOSIT_BPS: u32 = 5_000;
pub const DEFAULT_SLOT_STEP_MINUTES: u32 = 60;
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 10_000;

pub const MAX_ADD_ONS_PER_QUOTE: usize = 32;
pub const MAX_EVENT_TYPE_LEN: usize = 120;
pub const MAX_ATTENDEES: u32 = 100_000;
