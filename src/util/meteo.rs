//! Display helpers for meteorological values.

/// Translate a WMO weather interpretation code into short display text.
#[must_use]
pub fn wmo_weather(code: i64) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 => "fog",
        48 => "depositing rime fog",
        51 => "light drizzle",
        53 => "moderate drizzle",
        55 => "dense drizzle",
        56 => "light freezing drizzle",
        57 => "dense freezing drizzle",
        61 => "slight rain",
        63 => "moderate rain",
        65 => "heavy rain",
        66 => "light freezing rain",
        67 => "heavy freezing rain",
        71 => "slight snowfall",
        73 => "moderate snowfall",
        75 => "heavy snowfall",
        77 => "snow grains",
        80 => "slight rain showers",
        81 => "moderate rain showers",
        82 => "violent rain showers",
        85 => "slight snow showers",
        86 => "heavy snow showers",
        95 => "thunderstorm",
        96 => "thunderstorm with slight hail",
        99 => "thunderstorm with heavy hail",
        _ => "unknown",
    }
}

/// Convert wind direction in degrees into a 16-point compass label.
#[must_use]
pub fn degrees_to_compass(degrees: f64) -> &'static str {
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let normalized = degrees.rem_euclid(360.0);
    let index = ((normalized / 22.5) + 0.5).floor() as usize % 16;
    POINTS[index]
}

/// Round a wind speed for display.
///
/// Metric units round to the nearest 5 to avoid implying precision the
/// models do not have; imperial-style units round to whole numbers.
#[must_use]
pub fn round_windspeed(value: f64, unit: &str) -> i64 {
    match unit.to_lowercase().as_str() {
        "kph" | "kmh" | "km/h" => ((value / 5.0).round() * 5.0) as i64,
        _ => value.round() as i64,
    }
}
