use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Second page: the schedule table follows the cover page in the registrar export.
const DEFAULT_PAGE_INDEX: usize = 1;
const ENV_PREFIX: &str = "SCHED2CAL";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Zero-based page holding the schedule table.
    pub page_index: usize,
    pub parser: ParserConfig,
    pub calendar: CalendarConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            page_index: DEFAULT_PAGE_INDEX,
            parser: ParserConfig::default(),
            calendar: CalendarConfig::default(),
        }
    }
}

/// Whether a continuation row may repeat the delivery-mode column after its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuationLayout {
    StatusLast,
    DeliveryModeLast,
    Either,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub header_token: String,
    pub campus_prefixes: Vec<String>,
    pub location_tokens: usize,
    pub section_pattern: String,
    pub continuation_layout: ContinuationLayout,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            header_token: "Course".to_string(),
            campus_prefixes: vec!["Nanaimo".to_string(), "Duncan".to_string()],
            location_tokens: 3,
            section_pattern: r"^[A-Za-z]\d{2}\w+$".to_string(),
            continuation_layout: ContinuationLayout::Either,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// IANA zone name attached to every event time.
    pub timezone: String,
    pub calendar_id: String,
    pub google_token: Option<String>,
    pub google_api_base: String,
    pub request_timeout_secs: u64,
    /// Campus name (first location token, lower-cased) to street address.
    pub campus_addresses: BTreeMap<String, String>,
    pub product_id: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        let mut campus_addresses = BTreeMap::new();
        campus_addresses.insert(
            "nanaimo".to_string(),
            "Vancouver Island University, 900 Fifth St, Nanaimo, BC V9R 5S5, Canada".to_string(),
        );
        CalendarConfig {
            timezone: "America/Vancouver".to_string(),
            calendar_id: "primary".to_string(),
            google_token: None,
            google_api_base: "https://www.googleapis.com/calendar/v3".to_string(),
            request_timeout_secs: 30,
            campus_addresses,
            product_id: "-//sched2cal//Course Schedule//EN".to_string(),
        }
    }
}

/// Defaults, then the optional settings file, then `SCHED2CAL_*` environment variables.
pub fn load(file: &Path) -> Result<Settings> {
    let mut settings: Settings = Config::builder()
        .add_source(File::from(file).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to load settings")?
        .try_deserialize()
        .context("Invalid settings")?;
    // config lower-cases keys from files but not from defaults
    let campuses = std::mem::take(&mut settings.calendar.campus_addresses);
    settings.calendar.campus_addresses = campuses
        .into_iter()
        .map(|(campus, address)| (campus.to_lowercase(), address))
        .collect();
    Ok(settings)
}
