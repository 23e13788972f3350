//! Local-time helpers for timezone-aware targets.

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;

/// Parse an IANA timezone name, falling back to UTC when unknown.
#[must_use]
pub fn resolve_timezone(name: &str) -> Tz {
    name.parse::<Tz>().unwrap_or(Tz::UTC)
}

/// Current time in the named timezone (UTC fallback on bad names).
#[must_use]
pub fn local_now(timezone_name: &str) -> DateTime<Tz> {
    Utc::now().with_timezone(&resolve_timezone(timezone_name))
}

/// Local calendar date as `YYYYMMDD`, used in impact cache keys.
#[must_use]
pub fn local_date_string(timezone_name: &str) -> String {
    local_now(timezone_name).format("%Y%m%d").to_string()
}

/// Meteorological season for a latitude at the current date.
///
/// Hemisphere is decided by the latitude sign; the tropics get a
/// wet/dry-agnostic label since the four-season framing misleads there.
#[must_use]
pub fn current_season(latitude: f64) -> &'static str {
    let month = Utc::now().month();
    if latitude.abs() < 23.5 {
        return "tropical";
    }
    let northern = latitude >= 0.0;
    match month {
        12 | 1 | 2 => {
            if northern {
                "winter"
            } else {
                "summer"
            }
        }
        3..=5 => {
            if northern {
                "spring"
            } else {
                "autumn"
            }
        }
        6..=8 => {
            if northern {
                "summer"
            } else {
                "winter"
            }
        }
        _ => {
            if northern {
                "autumn"
            } else {
                "spring"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        assert_eq!(resolve_timezone("Not/AZone"), Tz::UTC);
    }

    #[test]
    fn known_timezone_resolves() {
        assert_eq!(resolve_timezone("Pacific/Auckland"), Tz::Pacific__Auckland);
    }

    #[test]
    fn date_string_shape() {
        let date = local_date_string("UTC");
        assert_eq!(date.len(), 8);
        assert!(date.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn opposite_hemispheres_get_opposite_seasons() {
        let north = current_season(51.5);
        let south = current_season(-41.3);
        assert_ne!(north, south);
    }

    #[test]
    fn tropics_are_tropical() {
        assert_eq!(current_season(5.0), "tropical");
        assert_eq!(current_season(-10.0), "tropical");
    }
}
