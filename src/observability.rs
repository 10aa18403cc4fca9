// Metric names. The library records through the `metrics` facade and leaves
// exporter installation to the host.

/// Counter: availability checks. Labels: outcome.
pub const AVAILABILITY_CHECKS_TOTAL: &str = "venuebook_availability_checks_total";

/// Counter: quote requests. Labels: outcome.
pub const QUOTES_TOTAL: &str = "venuebook_quotes_total";

/// Counter: confirmation attempts. Labels: outcome.
pub const CONFIRMATIONS_TOTAL: &str = "venuebook_confirmations_total";

/// Counter: pending quotes rejected by a confirmation cascade.
pub const CASCADE_REJECTIONS_TOTAL: &str = "venuebook_cascade_rejections_total";

/// Counter: outbound notifications. Labels: kind, status.
pub const NOTIFICATIONS_TOTAL: &str = "venuebook_notifications_total";

/// Histogram: time spent holding the per-space confirmation lock, in seconds.
pub const CONFIRM_DURATION_SECONDS: &str = "venuebook_confirm_duration_seconds";
