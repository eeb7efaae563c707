//! Shared types for Nimbus.
//!
//! These types form the data model passed from the gateway through the
//! engine to the dashboard. Apart from the historical window held by the
//! session, every record here lives for one aggregation cycle.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic identifier of one aggregation cycle.
pub type CycleId = u64;

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// What the user asked for, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    /// Free text typed into the search field.
    Text(String),
    /// Device coordinates.
    Coordinates { latitude: f64, longitude: f64 },
    /// Derive a city from the caller's IP address.
    Ip,
}

impl LocationQuery {
    pub fn text(query: impl Into<String>) -> Self {
        LocationQuery::Text(query.into())
    }

    /// Device location flow: coordinates when the device produced them,
    /// otherwise fall back to IP lookup.
    pub fn from_device(coords: Option<(f64, f64)>) -> Self {
        match coords {
            Some((latitude, longitude)) => LocationQuery::Coordinates { latitude, longitude },
            None => LocationQuery::Ip,
        }
    }
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationQuery::Text(q) => write!(f, "text '{q}'"),
            LocationQuery::Coordinates { latitude, longitude } => {
                write!(f, "coordinates ({latitude:.4}, {longitude:.4})")
            }
            LocationQuery::Ip => write!(f, "ip lookup"),
        }
    }
}

/// A location as reported by the weather API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub name: String,
    pub region: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone id, e.g. "Europe/London".
    pub tz_id: String,
    pub localtime_epoch: i64,
    pub local_time: NaiveDateTime,
    /// Canonical query string reused for every follow-up call in a cycle.
    pub query: String,
}

impl ResolvedLocation {
    /// "Name, Country", or just the name when the API omits the country.
    pub fn canonical_query(name: &str, country: &str) -> String {
        if country.trim().is_empty() {
            name.to_string()
        } else {
            format!("{name}, {country}")
        }
    }
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query)
    }
}

/// One entry of the search-as-you-type dropdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSuggestion {
    pub id: Option<u64>,
    pub name: String,
    pub region: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationSuggestion {
    /// Text shown in the dropdown and reused as the search query.
    pub fn label(&self) -> String {
        ResolvedLocation::canonical_query(&self.name, &self.country)
    }
}

/// Result of the IP lookup endpoint. The city may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpLocation {
    pub ip: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

// ---------------------------------------------------------------------------
// Weather records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub text: String,
    pub icon: String,
    pub code: u32,
}

impl Condition {
    /// The API ships protocol-relative icon paths ("//cdn...").
    pub fn icon_url(&self) -> String {
        if self.icon.starts_with("//") {
            format!("https:{}", self.icon)
        } else {
            self.icon.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub last_updated: NaiveDateTime,
    pub temp_c: f64,
    pub temp_f: f64,
    pub feels_like_c: f64,
    pub is_day: bool,
    pub condition: Condition,
    pub wind_kph: f64,
    pub wind_dir: String,
    pub humidity: u8,
    pub uv: f64,
    pub pressure_mb: f64,
    pub precip_mm: f64,
    /// Cloud cover percentage.
    pub cloud: u8,
    pub heat_index_c: Option<f64>,
    pub air_quality: Option<AirQuality>,
}

/// Pollutant concentrations (μg/m³) and the two index scales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    pub co: f64,
    pub no2: f64,
    pub o3: f64,
    pub so2: f64,
    pub pm2_5: f64,
    pub pm10: f64,
    pub us_epa_index: u8,
    pub gb_defra_index: u8,
}

impl AirQuality {
    pub fn category(&self) -> AqiCategory {
        AqiCategory::from_epa_index(self.us_epa_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    /// Map the US EPA index (1..=6) to its category. Out-of-range values
    /// saturate to the nearest end of the scale.
    pub fn from_epa_index(index: u8) -> Self {
        match index {
            0 | 1 => AqiCategory::Good,
            2 => AqiCategory::Moderate,
            3 => AqiCategory::UnhealthyForSensitiveGroups,
            4 => AqiCategory::Unhealthy,
            5 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

/// Air quality readings with their EPA category, as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualitySummary {
    #[serde(flatten)]
    pub readings: AirQuality,
    pub category: AqiCategory,
    pub label: String,
}

impl From<AirQuality> for AirQualitySummary {
    fn from(readings: AirQuality) -> Self {
        let category = readings.category();
        Self {
            readings,
            category,
            label: category.label().to_string(),
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One forecast day, including its hourly breakdown and astronomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub avg_temp_c: f64,
    pub condition: Condition,
    pub avg_humidity: f64,
    pub max_wind_kph: f64,
    /// Daily chance of rain, percent.
    pub chance_of_rain: u8,
    pub total_precip_mm: f64,
    pub uv: f64,
    pub hours: Vec<HourlyForecast>,
    pub astronomy: Astronomy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub time: NaiveDateTime,
    pub temp_c: f64,
    pub condition: Condition,
    pub chance_of_rain: u8,
    pub wind_kph: f64,
    pub humidity: u8,
}

/// Sun and moon times are kept as the API's local "06:12 AM" strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Astronomy {
    pub sunrise: String,
    pub sunset: String,
    pub moonrise: String,
    pub moonset: String,
    pub moon_phase: String,
    /// Percent of the moon illuminated.
    pub moon_illumination: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub headline: String,
    pub event: String,
    pub severity: String,
    pub areas: String,
    pub description: String,
    pub instruction: String,
    pub effective: Option<String>,
    pub expires: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimezoneInfo {
    pub tz_id: String,
    pub local_time: NaiveDateTime,
    pub localtime_epoch: i64,
}

impl From<&ResolvedLocation> for TimezoneInfo {
    fn from(location: &ResolvedLocation) -> Self {
        Self {
            tz_id: location.tz_id.clone(),
            local_time: location.local_time,
            localtime_epoch: location.localtime_epoch,
        }
    }
}

/// One past day as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalDay {
    pub date: NaiveDate,
    pub avg_temp_c: f64,
    pub condition: Condition,
}

/// A decorative fixture for the sports panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SportsEvent {
    #[serde(rename = "type")]
    pub sport: String,
    #[serde(rename = "event")]
    pub matchup: String,
    #[serde(rename = "date")]
    pub date_label: String,
    pub description: String,
}

impl SportsEvent {
    pub fn new(sport: &str, matchup: &str, date_label: &str, description: &str) -> Self {
        Self {
            sport: sport.to_string(),
            matchup: matchup.to_string(),
            date_label: date_label.to_string(),
            description: description.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway reports
// ---------------------------------------------------------------------------

/// Decoded `current.json` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentReport {
    pub location: ResolvedLocation,
    pub conditions: CurrentConditions,
}

/// Decoded `forecast.json` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub location: ResolvedLocation,
    pub days: Vec<ForecastDay>,
    pub alerts: Vec<WeatherAlert>,
}

/// Parameters of a forecast request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastOptions {
    pub days: u8,
    pub alerts: bool,
    pub air_quality: bool,
    pub hourly: bool,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            days: 7,
            alerts: true,
            air_quality: true,
            hourly: true,
        }
    }
}

// ---------------------------------------------------------------------------
// View model
// ---------------------------------------------------------------------------

/// Named slices of the view model, independently renderable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    Current,
    Forecast,
    WeekForecast,
    Hourly,
    Historical,
    Astronomy,
    AirQuality,
    Alerts,
    Timezone,
    Sports,
}

impl Section {
    pub const ALL: &'static [Section] = &[
        Section::Current,
        Section::Forecast,
        Section::WeekForecast,
        Section::Hourly,
        Section::Historical,
        Section::Astronomy,
        Section::AirQuality,
        Section::Alerts,
        Section::Timezone,
        Section::Sports,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Section::Current => "current",
            Section::Forecast => "forecast",
            Section::WeekForecast => "week-forecast",
            Section::Hourly => "hourly",
            Section::Historical => "historical",
            Section::Astronomy => "astronomy",
            Section::AirQuality => "air-quality",
            Section::Alerts => "alerts",
            Section::Timezone => "timezone",
            Section::Sports => "sports",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a section name (case-insensitive, `-` or `_` separated).
impl std::str::FromStr for Section {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_lowercase().replace('_', "-");
        Section::ALL
            .iter()
            .copied()
            .find(|section| section.name() == normalised)
            .ok_or_else(|| anyhow::anyhow!("Unknown section: {s}"))
    }
}

/// Everything one cycle hands to the renderer. Absent sections are
/// omitted from the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ViewModel {
    pub cycle: CycleId,
    pub location: ResolvedLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Vec<ForecastDay>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_forecast: Option<Vec<ForecastDay>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly: Option<Vec<HourlyForecast>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical: Option<Vec<HistoricalDay>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub astronomy: Option<Astronomy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_quality: Option<AirQualitySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<WeatherAlert>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<TimezoneInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sports: Option<Vec<SportsEvent>>,
}

impl ViewModel {
    /// A view with only the location filled in.
    pub fn empty(cycle: CycleId, location: ResolvedLocation) -> Self {
        Self {
            cycle,
            location,
            current: None,
            forecast: None,
            week_forecast: None,
            hourly: None,
            historical: None,
            astronomy: None,
            air_quality: None,
            alerts: None,
            timezone: None,
            sports: None,
        }
    }

    /// JSON of a single section, or `None` when it is absent.
    pub fn section(&self, section: Section) -> Option<serde_json::Value> {
        fn to_json<T: Serialize>(value: &Option<T>) -> Option<serde_json::Value> {
            value.as_ref().and_then(|v| serde_json::to_value(v).ok())
        }

        match section {
            Section::Current => to_json(&self.current),
            Section::Forecast => to_json(&self.forecast),
            Section::WeekForecast => to_json(&self.week_forecast),
            Section::Hourly => to_json(&self.hourly),
            Section::Historical => to_json(&self.historical),
            Section::Astronomy => to_json(&self.astronomy),
            Section::AirQuality => to_json(&self.air_quality),
            Section::Alerts => to_json(&self.alerts),
            Section::Timezone => to_json(&self.timezone),
            Section::Sports => to_json(&self.sports),
        }
    }

    pub fn present_sections(&self) -> Vec<Section> {
        Section::ALL
            .iter()
            .copied()
            .filter(|s| self.section(*s).is_some())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failure of a single weather API (or sports feed) call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// Any non-success HTTP status.
    #[error("{endpoint} returned HTTP {status}: {message}")]
    NotFound {
        endpoint: &'static str,
        status: u16,
        message: String,
    },

    #[error("{endpoint} request failed: {message}")]
    Network {
        endpoint: &'static str,
        message: String,
    },

    /// The body was not the JSON shape we require.
    #[error("{endpoint} response could not be decoded: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },
}

impl GatewayError {
    pub fn endpoint(&self) -> &'static str {
        match self {
            GatewayError::NotFound { endpoint, .. }
            | GatewayError::Network { endpoint, .. }
            | GatewayError::Decode { endpoint, .. } => endpoint,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, GatewayError::Network { .. })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolutionError {
    #[error("Location not found: {query} ({reason})")]
    NotFound { query: String, reason: String },

    #[error("Weather service unreachable while resolving {query}: {reason}")]
    Network { query: String, reason: String },
}

impl ResolutionError {
    /// Transport failures stay network errors; a bad status or an unusable
    /// body both mean the location could not be found.
    pub fn from_gateway(query: &str, err: GatewayError) -> Self {
        let reason = err.to_string();
        let query = query.to_string();
        if err.is_network() {
            ResolutionError::Network { query, reason }
        } else {
            ResolutionError::NotFound { query, reason }
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ResolutionError::NotFound { .. } => {
                "Location not found. Please check the name and try again.".to_string()
            }
            ResolutionError::Network { .. } => {
                "Could not reach the weather service. Please try again.".to_string()
            }
        }
    }
}

/// Fatal failure of an aggregation cycle.
#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("Location could not be resolved: {0}")]
    LocationUnresolvable(#[from] ResolutionError),

    /// Current conditions or forecast failed for a resolved location.
    #[error("Location not found: {location}: {source}")]
    LocationNotFound {
        location: String,
        #[source]
        source: GatewayError,
    },

    #[error("Cycle {cycle} was superseded by a newer cycle")]
    Superseded { cycle: CycleId },
}

impl AggregationError {
    pub fn is_location_not_found(&self) -> bool {
        matches!(
            self,
            AggregationError::LocationNotFound { .. }
                | AggregationError::LocationUnresolvable(ResolutionError::NotFound { .. })
        )
    }

    pub fn is_network(&self) -> bool {
        matches!(
            self,
            AggregationError::LocationUnresolvable(ResolutionError::Network { .. })
        )
    }

    /// Text for the single blocking notification shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            AggregationError::LocationUnresolvable(e) => e.user_message(),
            AggregationError::LocationNotFound { .. } => {
                "Error fetching weather data. Please try again.".to_string()
            }
            AggregationError::Superseded { .. } => {
                "A newer search replaced this one.".to_string()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
