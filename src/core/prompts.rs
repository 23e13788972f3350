//! System and user prompt builders for forecast, area, regional, and
//! translation calls.

use crate::config::{ResolvedUnits, UnitPair, Wordiness};

const SYSTEM_PROMPT_SPOT: &str = r"You are an expert meteorologist, skilled in evaluating and summarizing weather model information in terms of generally expected forecast conditions for a location, along with important forecast uncertainties or confidence.

#USE THE FORECAST DATA
The data below represents a range of possible outcomes for the exact same location, not different geographic areas. Avoid any phrasing that could be read as spatial variation (no 'locally heavy', 'scattered showers', 'in some areas').

#FORECAST DAYS
Always refer to the date and day of the week exactly as written in the data, as bold text starting a new paragraph, e.g. '**Rest of today, Monday (2026-03-10):**', followed immediately by the forecast text in the same paragraph. Use all the days provided.

#STYLE
- Use simple language a 12-year-old would understand.
- One paragraph per day; never bullet points.
- Authoritative, friendly radio style; no greetings, no exclamation points.
- Avoid the word 'forecasted'.
- Never add sentences whose only purpose is to say impacts will NOT happen.

#OUTPUT
Describe the most likely conditions and important alternative outcomes using natural likelihood language. For winds, use direction words (e.g. 'southwesterlies') with a speed range in the required units. Use the RANGE SUMMARY lines for low/high temperatures, always as 'low' and 'high', never 'lows' or 'highs'.

#ALERTS
If alerts are provided, work each one prominently into the relevant day's paragraph, citing the official source and title. Never mention the absence of alerts.

#UNITS
{unit_instructions}";

const SYSTEM_PROMPT_AREA: &str = r"You are an expert regional meteorologist, skilled in synthesizing weather information from multiple representative locations into one coherent forecast for a broader area.

#OUTPUT STRUCTURE
- Write the forecast day by day, starting each paragraph with the bolded date/day exactly as written in the data.
- Describe the most likely conditions across the whole area, highlighting important geographical variations and uncertainties.
- Never list the input locations individually; use broader regional descriptors ('northern districts', 'coastal areas').
- Authoritative, radio-ready style; no greetings, bullet points, or sign-offs.

#STYLE & CONTENT
- Simple, clear language. Mention precipitation timing, type, and likely amount ranges when wet weather is expected.
- Always give at least one wind direction (spelled out) with a speed range, and both low and high temperatures in the required units.
- Weave any provided alerts prominently into the relevant day, citing source and title; never state that no alerts exist.

#UNITS
{unit_instructions}";

const SYSTEM_PROMPT_REGIONAL: &str = r"You are an expert regional meteorologist. Use the supplied representative location datasets to produce a forecast explicitly broken down by sub-regions inside the named area.

#OUTPUT STRUCTURE
- For each day, start with the bolded date/day string exactly as provided.
- After the day header, write one paragraph per sub-region, each beginning with the bolded region name and a colon.
- Infer sensible region names from geography (coastal, inland, north, south); do not list the raw input locations.
- Cover weather, wind with a speed range, precipitation timing/amounts, and low/high temperatures per region in the required units.
- Authoritative and concise; no bullet points, greetings, or closing remarks.
- Weave provided alerts into the appropriate region/day paragraphs with source and title; never state that no alerts exist.

#UNITS
{unit_instructions}";

/// Build the unit-instruction block shared by the system prompts.
fn unit_instructions(units: &ResolvedUnits) -> String {
    let mut lines = vec![
        format!(
            "Temperature: {}",
            unit_label(&units.temperature, temperature_label)
        ),
        format!(
            "Rainfall: {}",
            unit_label(&units.precipitation, precipitation_label)
        ),
        format!("Snowfall: {}", unit_label(&units.snowfall, snowfall_label)),
        format!("Wind speed: {}", unit_label(&units.windspeed, wind_label)),
    ];
    if units.temperature.secondary.is_some()
        || units.precipitation.secondary.is_some()
        || units.snowfall.secondary.is_some()
        || units.windspeed.secondary.is_some()
    {
        lines.push(
            "Show the secondary unit in brackets after the primary (e.g. 18°C (64°F)). Round secondary values sensibly: mm/cm and temperatures to whole numbers, inches to one decimal, wind speeds to the nearest whole unit.".to_string(),
        );
    }
    lines.join("\n")
}

fn unit_label(pair: &UnitPair, label: fn(&str) -> String) -> String {
    match &pair.secondary {
        Some(secondary) => format!("{} ({})", label(&pair.primary), label(secondary)),
        None => label(&pair.primary),
    }
}

fn temperature_label(unit: &str) -> String {
    if unit == "fahrenheit" {
        "Degrees Fahrenheit (°F)".to_string()
    } else {
        "Degrees Celsius (°C)".to_string()
    }
}

fn precipitation_label(unit: &str) -> String {
    if unit == "inch" {
        "Inches (in)".to_string()
    } else {
        "Millimeters (mm)".to_string()
    }
}

fn snowfall_label(unit: &str) -> String {
    if unit == "inch" {
        "Inches (in)".to_string()
    } else {
        "Centimeters (cm)".to_string()
    }
}

fn wind_label(unit: &str) -> String {
    match unit {
        "mph" => "mph".to_string(),
        "kt" => "knots (kt)".to_string(),
        "mps" => "m/s".to_string(),
        _ => "km/h".to_string(),
    }
}

/// System prompt for a single-location forecast.
#[must_use]
pub fn spot_system_prompt(units: &ResolvedUnits) -> String {
    SYSTEM_PROMPT_SPOT.replace("{unit_instructions}", &unit_instructions(units))
}

/// System prompt for a combined area forecast.
#[must_use]
pub fn area_system_prompt(units: &ResolvedUnits) -> String {
    SYSTEM_PROMPT_AREA.replace("{unit_instructions}", &unit_instructions(units))
}

/// System prompt for a regional breakdown forecast.
#[must_use]
pub fn regional_system_prompt(units: &ResolvedUnits) -> String {
    SYSTEM_PROMPT_REGIONAL.replace("{unit_instructions}", &unit_instructions(units))
}

fn detail_instruction(wordiness: Wordiness, target: &str) -> String {
    match wordiness {
        Wordiness::Detailed => format!("Write a very detailed {target} for every day provided."),
        Wordiness::Brief => {
            format!("Write an extremely brief {target} with just the essential details.")
        }
        Wordiness::Normal => format!("Write a succinct {target}."),
    }
}

/// Instruction block enabling impact-based framing when context exists.
#[must_use]
pub fn impact_instruction() -> &'static str {
    "This is an impact-based forecast. Use the additional context to explain vulnerabilities, upcoming events, or thresholds only when the forecast meets or exceeds them. If conditions stay below thresholds, omit references to those impacts."
}

/// Warn the model when the first period covers only the day's last hours.
#[must_use]
pub fn short_period_instruction(first_day_label: &str, local_hour: u32) -> &'static str {
    let label_upper = first_day_label.to_uppercase();
    if (label_upper.contains("REST OF") || label_upper.contains("THIS EVENING")) && local_hour >= 22
    {
        "CRITICAL: The first forecast period covers only the last 1-2 hours of the day. Be extremely brief (1-2 sentences) and focus only on immediate conditions."
    } else {
        ""
    }
}

/// Parameters for the spot user prompt.
pub struct SpotPromptParams<'a> {
    pub formatted_dataset: &'a str,
    pub location_name: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub season: &'a str,
    pub wordiness: Wordiness,
    pub extra_instructions: Vec<&'a str>,
    pub impact_context: &'a str,
}

/// User prompt for a single-location forecast.
#[must_use]
pub fn spot_user_prompt(params: &SpotPromptParams<'_>) -> String {
    let instructions = join_instructions(&params.extra_instructions);
    let context_block = context_block(params.impact_context);
    format!(
        "Write a weather forecast in a friendly and authoritative style, based only on the following information. Write only the forecast, not your instructions.\n\n{dataset}\n<END>\n\n--- VARIABLE PARAMETERS ---\nDetail level: {detail}\n{instructions}Location: {name} at latitude {lat:.4} and longitude {lon:.4}\nSeason: {season}\n{context_block}",
        dataset = params.formatted_dataset,
        detail = detail_instruction(params.wordiness, "forecast"),
        instructions = instructions,
        name = params.location_name,
        lat = params.latitude,
        lon = params.longitude,
        season = params.season,
        context_block = context_block,
    )
}

/// Parameters for area/regional user prompts.
pub struct AreaPromptParams<'a> {
    pub formatted_dataset: &'a str,
    pub area_name: &'a str,
    pub location_names: Vec<&'a str>,
    pub wordiness: Wordiness,
    pub extra_instructions: Vec<&'a str>,
    pub impact_context: &'a str,
}

/// User prompt for a combined area forecast.
#[must_use]
pub fn area_user_prompt(params: &AreaPromptParams<'_>) -> String {
    let instructions = join_instructions(&params.extra_instructions);
    let context_block = context_block(params.impact_context);
    format!(
        "Synthesize a day-by-day weather forecast for the entire area named \"{area}\". Use only the data below.\n\nRepresentative locations: {locations}\n\n{dataset}\n<END>\n\n--- VARIABLE PARAMETERS ---\nDetail level: {detail}\n{instructions}Area: {area}\n{context_block}",
        area = params.area_name,
        locations = locations_line(&params.location_names),
        dataset = params.formatted_dataset,
        detail = detail_instruction(params.wordiness, "area forecast"),
        instructions = instructions,
        context_block = context_block,
    )
}

/// User prompt for a regional breakdown forecast.
#[must_use]
pub fn regional_user_prompt(params: &AreaPromptParams<'_>) -> String {
    let instructions = join_instructions(&params.extra_instructions);
    let context_block = context_block(params.impact_context);
    format!(
        "Produce a day-by-day regional breakdown forecast for \"{area}\". Use only the data below.\n\nRepresentative locations: {locations}\n\n{dataset}\n<END>\n\n--- VARIABLE PARAMETERS ---\nDetail level: {detail}\n{instructions}Area: {area}\nImportant: Identify sensible sub-regions (e.g., north vs south, inland vs coastal) implied by the representative locations, and write one paragraph per region for each day.\n{context_block}",
        area = params.area_name,
        locations = locations_line(&params.location_names),
        dataset = params.formatted_dataset,
        detail = detail_instruction(params.wordiness, "regional breakdown"),
        instructions = instructions,
        context_block = context_block,
    )
}

/// System prompt for translating a finished forecast.
#[must_use]
pub fn translation_system_prompt(target_language: &str) -> String {
    format!(
        "You are an expert translator specializing in meteorological texts. Translate the entire English forecast into {target_language}, preserving structure, section headers, blank lines, and all numbers/units exactly as provided.\n\nRules:\n- Translate every header and every paragraph; do not skip any content.\n- Keep the same number of sections and blank lines.\n- Preserve formatting markers such as **bold**.\n- Do not add commentary or explanations.\n- Output only the translated forecast."
    )
}

/// User prompt wrapping the forecast to translate.
#[must_use]
pub fn translation_user_prompt(forecast_text: &str) -> String {
    format!("Translate the following forecast:\n\n{forecast_text}")
}

fn join_instructions(instructions: &[&str]) -> String {
    let filtered: Vec<&str> = instructions
        .iter()
        .copied()
        .filter(|s| !s.is_empty())
        .collect();
    if filtered.is_empty() {
        String::new()
    } else {
        format!("{}\n", filtered.join("\n"))
    }
}

fn context_block(impact_context: &str) -> String {
    if impact_context.trim().is_empty() {
        String::new()
    } else {
        format!("\nADDITIONAL CONTEXT:\n{}\n", impact_context.trim())
    }
}

fn locations_line(names: &[&str]) -> String {
    if names.is_empty() {
        "not specified".to_string()
    } else {
        names.join(", ")
    }
}
