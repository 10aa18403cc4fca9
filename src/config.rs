use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;
use tracing::warn;

use crate::limits::*;
use crate::model::ClockTime;

/// Engine settings. Every field has a default so a host can start from
/// `EngineConfig::default()` and override what it needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The one zone used to turn instants into calendar dates.
    pub timezone: Tz,
    /// Buffers applied when a space has no row of its own.
    pub default_setup_hours: u32,
    pub default_teardown_hours: u32,
    pub night_cutoff: ClockTime,
    pub night_surcharge_bps: u32,
    pub deposit_bps: u32,
    pub slot_step_minutes: u32,
    pub notify_timeout_ms: u64,
    pub quote_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            default_setup_hours: DEFAULT_SETUP_HOURS,
            default_teardown_hours: DEFAULT_TEARDOWN_HOURS,
            night_cutoff: ClockTime::wrapping(NIGHT_CUTOFF_MINUTE),
            night_surcharge_bps: NIGHT_SURCHARGE_BPS,
            deposit_bps: DEFAULT_DEPOSIT_BPS,
            slot_step_minutes: DEFAULT_SLOT_STEP_MINUTES,
            notify_timeout_ms: DEFAULT_NOTIFY_TIMEOUT_MS,
            quote_prefix: "Q".into(),
        }
    }
}

impl EngineConfig {
    /// Read `VENUEBOOK_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let cfg = Self {
            timezone: parsed(&lookup, "VENUEBOOK_TZ", d.timezone),
            default_setup_hours: parsed(&lookup, "VENUEBOOK_SETUP_HOURS", d.default_setup_hours),
            default_teardown_hours: parsed(&lookup, "VENUEBOOK_TEARDOWN_HOURS", d.default_teardown_hours),
            night_cutoff: parsed(&lookup, "VENUEBOOK_NIGHT_CUTOFF", d.night_cutoff),
            night_surcharge_bps: parsed(&lookup, "VENUEBOOK_NIGHT_SURCHARGE_BPS", d.night_surcharge_bps),
            deposit_bps: parsed(&lookup, "VENUEBOOK_DEPOSIT_BPS", d.deposit_bps),
            slot_step_minutes: parsed(&lookup, "VENUEBOOK_SLOT_STEP_MINUTES", d.slot_step_minutes),
            notify_timeout_ms: parsed(&lookup, "VENUEBOOK_NOTIFY_TIMEOUT_MS", d.notify_timeout_ms),
            quote_prefix: lookup("VENUEBOOK_QUOTE_PREFIX")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(d.quote_prefix),
        };
        if cfg.slot_step_minutes == 0 {
            warn!("VENUEBOOK_SLOT_STEP_MINUTES must be positive, using {DEFAULT_SLOT_STEP_MINUTES}");
            return Self {
                slot_step_minutes: DEFAULT_SLOT_STEP_MINUTES,
                ..cfg
            };
        }
        cfg
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("ignoring unparseable {key}={raw:?}, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = EngineConfig::from_lookup(|_| None);
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.night_cutoff.to_string(), "22:00");
        assert_eq!(cfg.notify_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn overrides_from_env() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("VENUEBOOK_TZ", "America/Mexico_City"),
            ("VENUEBOOK_SETUP_HOURS", "1"),
            ("VENUEBOOK_NIGHT_CUTOFF", "23:30"),
            ("VENUEBOOK_DEPOSIT_BPS", "3000"),
            ("VENUEBOOK_QUOTE_PREFIX", "COT"),
        ]));
        assert_eq!(cfg.timezone, chrono_tz::America::Mexico_City);
        assert_eq!(cfg.default_setup_hours, 1);
        assert_eq!(cfg.default_teardown_hours, DEFAULT_TEARDOWN_HOURS);
        assert_eq!(cfg.night_cutoff.to_string(), "23:30");
        assert_eq!(cfg.deposit_bps, 3000);
        assert_eq!(cfg.quote_prefix, "COT");
    }

    #[test]
    fn bad_values_fall_back() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("VENUEBOOK_TZ", "Mars/Olympus"),
            ("VENUEBOOK_SETUP_HOURS", "two"),
            ("VENUEBOOK_SLOT_STEP_MINUTES", "0"),
            ("VENUEBOOK_QUOTE_PREFIX", "  "),
        ]));
        assert_eq!(cfg.timezone, Tz::UTC);
        assert_eq!(cfg.default_setup_hours, DEFAULT_SETUP_HOURS);
        assert_eq!(cfg.slot_step_minutes, DEFAULT_SLOT_STEP_MINUTES);
        assert_eq!(cfg.quote_prefix, "Q");
    }

    #[test]
    fn deserializes_partial_json() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"timezone":"Europe/Madrid","night_cutoff":"21:00"}"#).unwrap();
        assert_eq!(cfg.timezone, chrono_tz::Europe::Madrid);
        assert_eq!(cfg.night_cutoff.to_string(), "21:00");
        assert_eq!(cfg.deposit_bps, DEFAULT_DEPOSIT_BPS);
    }
}
