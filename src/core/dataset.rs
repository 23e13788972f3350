//! Transform raw hourly forecast payloads into the day/hour/member
//! structure consumed by prompts, plus the deterministic dataset-preview
//! text used when generation degrades.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::{ResolvedUnits, SettingsBag};
use crate::core::thin::{member_labels, thin_indices};
use crate::sources::alerts::AlertSummary;
use crate::util::time::resolve_timezone;
use crate::util::{degrees_to_compass, round_windspeed, wmo_weather};

/// Derived values for a single member at one hour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberRecord {
    pub temperature: f64,
    pub precipitation: f64,
    pub snowfall: f64,
    pub weather: String,
    pub cloud_cover: i64,
    pub wind_direction: String,
    pub wind_speed: i64,
    pub wind_gust: i64,
    /// Probability of precipitation; usually only deterministic models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pop: Option<u8>,
}

/// All member values for one hour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HourBlock {
    /// Local hour label, e.g. `14:00`.
    pub hour: String,
    pub members: BTreeMap<String, MemberRecord>,
}

/// One forecast day in local time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedDay {
    /// Local date, `YYYY-MM-DD`.
    pub date: String,
    /// Human label, e.g. `Tomorrow, Monday`.
    pub day_label: String,
    pub hours: Vec<HourBlock>,
}

/// Build processed days from a raw Open-Meteo payload.
///
/// Hours already in the past are dropped, timestamps are regrouped by
/// local calendar day, and ensemble members are thinned to the settings'
/// `thin_select` via evenly-spaced selection. Returns an empty vec when
/// the payload has no usable future hours.
#[must_use]
pub fn build_processed_days(
    raw: &serde_json::Value,
    timezone_name: &str,
    settings: &SettingsBag,
) -> Vec<ProcessedDay> {
    build_processed_days_at(raw, timezone_name, settings, chrono::Utc::now())
}

/// As [`build_processed_days`] with an injected clock for tests.
#[must_use]
pub fn build_processed_days_at(
    raw: &serde_json::Value,
    timezone_name: &str,
    settings: &SettingsBag,
    now_utc: DateTime<chrono::Utc>,
) -> Vec<ProcessedDay> {
    let tz = resolve_timezone(timezone_name);
    let now = now_utc.with_timezone(&tz);

    let Some(hourly) = raw.get("hourly").and_then(|h| h.as_object()) else {
        return Vec::new();
    };
    let Some(timestamps) = hourly.get("time").and_then(|t| t.as_array()) else {
        return Vec::new();
    };

    let members = selected_members(raw, settings);
    let windspeed_unit = &settings.units.windspeed.primary;

    // date -> hour label -> member label -> record
    let mut grouped: BTreeMap<String, BTreeMap<String, BTreeMap<String, MemberRecord>>> =
        BTreeMap::new();

    for (idx, ts_value) in timestamps.iter().enumerate() {
        let Some(ts) = ts_value.as_str() else {
            continue;
        };
        let Some(dt) = parse_local_timestamp(ts, tz) else {
            continue;
        };
        if dt < now {
            continue;
        }

        let date_key = dt.format("%Y-%m-%d").to_string();
        let hour_key = dt.format("%H:00").to_string();

        for member in &members {
            if let Some(record) = build_member_record(hourly, member, idx, windspeed_unit) {
                grouped
                    .entry(date_key.clone())
                    .or_default()
                    .entry(hour_key.clone())
                    .or_default()
                    .insert(member.clone(), record);
            }
        }
    }

    grouped
        .into_iter()
        .filter_map(|(date, hours)| {
            let hour_blocks: Vec<HourBlock> = hours
                .into_iter()
                .filter(|(_, members)| !members.is_empty())
                .map(|(hour, members)| HourBlock { hour, members })
                .collect();
            if hour_blocks.is_empty() {
                return None;
            }
            let day_label = classify_day(&date, &now);
            Some(ProcessedDay {
                date,
                day_label,
                hours: hour_blocks,
            })
        })
        .collect()
}

/// Detect available members and apply thinning for ensemble models.
fn selected_members(raw: &serde_json::Value, settings: &SettingsBag) -> Vec<String> {
    if !settings.model.is_ensemble() {
        return vec!["member00".to_string()];
    }

    let mut count = 1; // member00 carries no suffix
    if let Some(units) = raw.get("hourly_units").and_then(|u| u.as_object()) {
        count += units
            .keys()
            .filter(|key| key.starts_with("temperature_2m_member"))
            .count();
    }
    member_labels(&thin_indices(count, settings.thin_select))
}

fn field_key(field: &str, member: &str) -> String {
    if member == "member00" {
        field.to_string()
    } else {
        format!("{field}_{member}")
    }
}

fn get_value(
    hourly: &serde_json::Map<String, serde_json::Value>,
    field: &str,
    member: &str,
    idx: usize,
) -> Option<f64> {
    hourly
        .get(&field_key(field, member))
        .and_then(|v| v.as_array())
        .and_then(|values| values.get(idx))
        .and_then(serde_json::Value::as_f64)
}

fn build_member_record(
    hourly: &serde_json::Map<String, serde_json::Value>,
    member: &str,
    idx: usize,
    windspeed_unit: &str,
) -> Option<MemberRecord> {
    let temperature = get_value(hourly, "temperature_2m", member, idx)?;
    let precipitation = get_value(hourly, "precipitation", member, idx)?;
    let snowfall = get_value(hourly, "snowfall", member, idx)?;
    let weather_code = get_value(hourly, "weather_code", member, idx)?;
    let cloud_cover = get_value(hourly, "cloud_cover", member, idx)?;
    let wind_speed = get_value(hourly, "wind_speed_10m", member, idx)?;
    let wind_direction = get_value(hourly, "wind_direction_10m", member, idx)?;
    let wind_gusts = get_value(hourly, "wind_gusts_10m", member, idx).unwrap_or(0.0);

    let pop = get_value(hourly, "precipitation_probability", member, idx)
        .map(|p| p.round())
        .filter(|p| (0.0..=100.0).contains(p))
        .map(|p| p as u8);

    Some(MemberRecord {
        temperature: round_to(temperature, 1),
        precipitation: round_to(precipitation, 1),
        snowfall: round_to(snowfall, 1),
        weather: wmo_weather(weather_code as i64).to_string(),
        cloud_cover: cloud_cover as i64,
        wind_direction: degrees_to_compass(wind_direction).to_string(),
        wind_speed: round_windspeed(wind_speed, windspeed_unit),
        wind_gust: round_windspeed(wind_gusts, windspeed_unit),
        pop,
    })
}

fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Parse an Open-Meteo local timestamp (`2026-03-10T14:00`) in `tz`.
fn parse_local_timestamp(value: &str, tz: Tz) -> Option<DateTime<Tz>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").ok()?;
    naive.and_local_timezone(tz).earliest()
}

/// Human-friendly label for a forecast day relative to now.
fn classify_day(date: &str, now: &DateTime<Tz>) -> String {
    let Ok(parsed) = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
        return date.to_string();
    };
    let day_name = parsed.format("%A").to_string();
    let today = now.date_naive();

    if parsed == today {
        let hour = now.hour();
        if hour >= 22 {
            format!("Rest of the evening, {day_name}")
        } else if hour > 15 {
            format!("This evening, {day_name}")
        } else if hour > 10 {
            format!("This afternoon and evening, {day_name}")
        } else if hour >= 6 {
            format!("Rest of today, {day_name}")
        } else {
            format!("Today, {day_name}")
        }
    } else if parsed == today.succ_opt().unwrap_or(today) {
        format!("Tomorrow, {day_name}")
    } else if parsed < today {
        "Past".to_string()
    } else {
        day_name
    }
}

/// Format the processed dataset as the text block the LLM consumes.
///
/// Member values are collapsed into ranges per hour; spelling out every
/// member would blow the context for nothing the model can use.
#[must_use]
pub fn format_dataset_text(
    days: &[ProcessedDay],
    alerts: &[AlertSummary],
    units: &ResolvedUnits,
) -> String {
    if days.is_empty() {
        return String::new();
    }

    let temp_unit = unit_symbol_temperature(&units.temperature.primary);
    let mut out = String::new();

    for day in days {
        out.push_str(&format!("=== {} ({}) ===\n", day.day_label, day.date));
        for hour in &day.hours {
            let Some(line) = format_hour_line(hour, temp_unit, units) else {
                continue;
            };
            out.push_str(&line);
            out.push('\n');
        }
        if let Some(summary) = day_range_summary(day, temp_unit, units) {
            out.push_str(&summary);
            out.push('\n');
        }
        out.push('\n');
    }

    if !alerts.is_empty() {
        out.push_str("ACTIVE ALERTS:\n");
        for alert in alerts {
            out.push_str(&format!(
                "- [{}] {}: {}\n",
                alert.source.as_deref().unwrap_or("Alert"),
                alert.title,
                truncate(&alert.description, 300),
            ));
        }
    }

    out.trim_end().to_string()
}

/// Combine per-location datasets into the block for area prompts.
#[must_use]
pub fn format_area_dataset_text(area_name: &str, locations: &[(String, String)]) -> String {
    let mut out = format!("AREA: {area_name}\n\n");
    for (name, text) in locations {
        out.push_str(&format!("--- Location: {name} ---\n{text}\n\n"));
    }
    out.trim_end().to_string()
}

fn format_hour_line(hour: &HourBlock, temp_unit: &str, units: &ResolvedUnits) -> Option<String> {
    let records: Vec<&MemberRecord> = hour.members.values().collect();
    let first = records.first()?;

    let (temp_min, temp_max) = min_max(records.iter().map(|r| r.temperature))?;
    let precip_max = records
        .iter()
        .map(|r| r.precipitation)
        .fold(0.0f64, f64::max);
    let snow_max = records.iter().map(|r| r.snowfall).fold(0.0f64, f64::max);
    let (wind_min, wind_max) = min_max(records.iter().map(|r| r.wind_speed as f64))?;
    let gust_max = records.iter().map(|r| r.wind_gust).max().unwrap_or(0);

    let mut line = format!(
        "{}: {} | temp {:.1}-{:.1}{} | wind {} {:.0}-{:.0} {}",
        hour.hour,
        first.weather,
        temp_min,
        temp_max,
        temp_unit,
        first.wind_direction,
        wind_min,
        wind_max,
        units.windspeed.primary,
    );
    if gust_max > wind_max as i64 {
        line.push_str(&format!(" gusting {gust_max}"));
    }
    if precip_max > 0.0 {
        line.push_str(&format!(
            " | precip up to {:.1} {}",
            precip_max, units.precipitation.primary
        ));
    }
    if snow_max > 0.0 {
        line.push_str(&format!(
            " | snow up to {:.1} {}",
            snow_max, units.snowfall.primary
        ));
    }
    if let Some(pop) = first.pop {
        line.push_str(&format!(" | pop {pop}%"));
    }
    Some(line)
}

fn day_range_summary(day: &ProcessedDay, temp_unit: &str, units: &ResolvedUnits) -> Option<String> {
    let all: Vec<&MemberRecord> = day
        .hours
        .iter()
        .flat_map(|h| h.members.values())
        .collect();
    let (low, high) = min_max(all.iter().map(|r| r.temperature))?;
    let precip_total_member00: f64 = day
        .hours
        .iter()
        .filter_map(|h| h.members.get("member00"))
        .map(|r| r.precipitation)
        .sum();
    Some(format!(
        "RANGE SUMMARY: low {:.0}{} high {:.0}{}; control-member precip total {:.1} {}",
        low, temp_unit, high, temp_unit, precip_total_member00, units.precipitation.primary,
    ))
}

/// Deterministic preview of the dataset, used as the degraded-result
/// text when LLM generation fails. Derived only from the processed
/// data so it is reproducible across runs.
#[must_use]
pub fn dataset_preview(days: &[ProcessedDay], alerts: &[AlertSummary]) -> String {
    let mut temps: Vec<f64> = Vec::new();
    let mut precip: Vec<f64> = Vec::new();
    let mut hour_count = 0usize;

    for day in days {
        for hour in &day.hours {
            if let Some(member) = hour.members.get("member00") {
                temps.push(member.temperature);
                precip.push(member.precipitation);
                hour_count += 1;
            }
        }
    }

    let mut lines = vec!["**Dataset preview**".to_string()];
    if let Some((min, max)) = min_max(temps.iter().copied()) {
        lines.push(format!("- Control member temps: {min:.1} – {max:.1}"));
    }
    if let Some(max) = precip.iter().copied().fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.max(v)))
    }) {
        lines.push(format!("- Max precip: {max:.1}"));
    }
    lines.push(format!("- Hours captured: {hour_count}"));

    lines.push(String::new());
    lines.push("**Alerts**".to_string());
    if alerts.is_empty() {
        lines.push("- No active alerts at fetch time.".to_string());
    } else {
        for alert in alerts.iter().take(3) {
            lines.push(format!(
                "- {}: {}",
                alert.source.as_deref().unwrap_or("Alert"),
                alert.title
            ));
        }
    }

    lines.join("\n")
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((min, max)) => Some((min.min(v), max.max(v))),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}

fn unit_symbol_temperature(unit: &str) -> &'static str {
    // Only two temperature units survive config validation.
    if unit == "fahrenheit" { "°F" } else { "°C" }
}
