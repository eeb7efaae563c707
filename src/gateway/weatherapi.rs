//! weatherapi.com client.
//!
//! API: `https://api.weatherapi.com/v1/{current,forecast,history,search,ip}.json`
//! Auth: `key` query parameter.
//!
//! Responses are decoded into private raw structs that mirror the wire
//! format, then converted into the crate's records. Required fields are not
//! defaulted, so a response missing them fails with `GatewayError::Decode`
//! instead of producing half-empty records. Unknown fields are ignored.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{get_json, WeatherApi};
use crate::config::ApiConfig;
use crate::types::{
    AirQuality, Astronomy, Condition, CurrentConditions, CurrentReport, ForecastDay,
    ForecastOptions, ForecastReport, GatewayError, HistoricalDay, HourlyForecast, IpLocation,
    LocationSuggestion, ResolvedLocation, WeatherAlert,
};

const USER_AGENT: &str = concat!("nimbus/", env!("CARGO_PKG_VERSION"));

/// Format of `localtime`, `last_updated` and hourly `time` fields.
const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// `hour=24` asks for the full hourly breakdown of each day.
const ALL_HOURS: &str = "24";

const CURRENT: &str = "current.json";
const FORECAST: &str = "forecast.json";
const HISTORY: &str = "history.json";
const SEARCH: &str = "search.json";
const IP: &str = "ip.json";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawLocation {
    name: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
    lat: f64,
    lon: f64,
    tz_id: String,
    localtime_epoch: i64,
    localtime: String,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    text: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    code: u32,
}

#[derive(Debug, Deserialize)]
struct RawCurrent {
    last_updated: String,
    temp_c: f64,
    temp_f: f64,
    feelslike_c: f64,
    #[serde(default)]
    is_day: u8,
    condition: RawCondition,
    wind_kph: f64,
    #[serde(default)]
    wind_dir: String,
    humidity: u8,
    uv: f64,
    pressure_mb: f64,
    #[serde(default)]
    precip_mm: f64,
    cloud: u8,
    #[serde(default)]
    heatindex_c: Option<f64>,
    #[serde(default)]
    air_quality: Option<RawAirQuality>,
}

#[derive(Debug, Deserialize)]
struct RawAirQuality {
    #[serde(default)]
    co: f64,
    #[serde(default)]
    no2: f64,
    #[serde(default)]
    o3: f64,
    #[serde(default)]
    so2: f64,
    #[serde(default)]
    pm2_5: f64,
    #[serde(default)]
    pm10: f64,
    #[serde(rename = "us-epa-index")]
    us_epa_index: u8,
    #[serde(rename = "gb-defra-index")]
    gb_defra_index: u8,
}

#[derive(Debug, Deserialize)]
struct RawCurrentResponse {
    location: RawLocation,
    current: RawCurrent,
}

#[derive(Debug, Deserialize)]
struct RawForecastResponse {
    location: RawLocation,
    forecast: RawForecast,
    #[serde(default)]
    alerts: RawAlerts,
}

#[derive(Debug, Deserialize)]
struct RawForecast {
    forecastday: Vec<RawForecastDay>,
}

#[derive(Debug, Deserialize)]
struct RawForecastDay {
    date: NaiveDate,
    day: RawDay,
    astro: RawAstro,
    #[serde(default)]
    hour: Vec<RawHour>,
}

#[derive(Debug, Deserialize)]
struct RawDay {
    maxtemp_c: f64,
    mintemp_c: f64,
    avgtemp_c: f64,
    maxwind_kph: f64,
    avghumidity: f64,
    #[serde(default, deserialize_with = "lenient_percent")]
    daily_chance_of_rain: u8,
    #[serde(default)]
    totalprecip_mm: f64,
    #[serde(default)]
    uv: f64,
    condition: RawCondition,
}

#[derive(Debug, Deserialize)]
struct RawAstro {
    sunrise: String,
    sunset: String,
    moonrise: String,
    moonset: String,
    moon_phase: String,
    #[serde(default, deserialize_with = "lenient_percent")]
    moon_illumination: u8,
}

#[derive(Debug, Deserialize)]
struct RawHour {
    time: String,
    temp_c: f64,
    condition: RawCondition,
    #[serde(default, deserialize_with = "lenient_percent")]
    chance_of_rain: u8,
    wind_kph: f64,
    humidity: u8,
}

#[derive(Debug, Default, Deserialize)]
struct RawAlerts {
    #[serde(default)]
    alert: Vec<RawAlert>,
}

#[derive(Debug, Deserialize)]
struct RawAlert {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    event: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    areas: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    instruction: String,
    #[serde(default)]
    effective: Option<String>,
    #[serde(default)]
    expires: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHistoryResponse {
    forecast: RawHistoryForecast,
}

#[derive(Debug, Deserialize)]
struct RawHistoryForecast {
    forecastday: Vec<RawHistoryDay>,
}

#[derive(Debug, Deserialize)]
struct RawHistoryDay {
    date: NaiveDate,
    day: RawHistorySummary,
}

#[derive(Debug, Deserialize)]
struct RawHistorySummary {
    avgtemp_c: f64,
    condition: RawCondition,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    id: Option<u64>,
    name: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct RawIp {
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
}

/// Percentages the API has shipped both as numbers and as strings.
fn lenient_percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    let number = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| de::Error::custom(format!("expected a percentage, got {value}")))?;
    Ok(number.round().clamp(0.0, 100.0) as u8)
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn parse_local_time(endpoint: &'static str, value: &str) -> Result<NaiveDateTime, GatewayError> {
    NaiveDateTime::parse_from_str(value.trim(), LOCAL_TIME_FORMAT).map_err(|e| {
        GatewayError::Decode {
            endpoint,
            message: format!("invalid local time '{value}': {e}"),
        }
    })
}

impl From<RawCondition> for Condition {
    fn from(raw: RawCondition) -> Self {
        Self {
            text: raw.text,
            icon: raw.icon,
            code: raw.code,
        }
    }
}

impl From<RawAirQuality> for AirQuality {
    fn from(raw: RawAirQuality) -> Self {
        Self {
            co: raw.co,
            no2: raw.no2,
            o3: raw.o3,
            so2: raw.so2,
            pm2_5: raw.pm2_5,
            pm10: raw.pm10,
            us_epa_index: raw.us_epa_index,
            gb_defra_index: raw.gb_defra_index,
        }
    }
}

impl From<RawAlert> for WeatherAlert {
    fn from(raw: RawAlert) -> Self {
        Self {
            headline: raw.headline,
            event: raw.event,
            severity: raw.severity,
            areas: if raw.areas.trim().is_empty() {
                "Local Area".to_string()
            } else {
                raw.areas
            },
            description: raw.desc,
            instruction: raw.instruction,
            effective: raw.effective,
            expires: raw.expires,
        }
    }
}

impl RawLocation {
    fn into_resolved(self, endpoint: &'static str) -> Result<ResolvedLocation, GatewayError> {
        let local_time = parse_local_time(endpoint, &self.localtime)?;
        let query = ResolvedLocation::canonical_query(&self.name, &self.country);
        Ok(ResolvedLocation {
            name: self.name,
            region: self.region,
            country: self.country,
            latitude: self.lat,
            longitude: self.lon,
            tz_id: self.tz_id,
            localtime_epoch: self.localtime_epoch,
            local_time,
            query,
        })
    }
}

impl RawCurrent {
    fn into_conditions(self) -> Result<CurrentConditions, GatewayError> {
        Ok(CurrentConditions {
            last_updated: parse_local_time(CURRENT, &self.last_updated)?,
            temp_c: self.temp_c,
            temp_f: self.temp_f,
            feels_like_c: self.feelslike_c,
            is_day: self.is_day == 1,
            condition: self.condition.into(),
            wind_kph: self.wind_kph,
            wind_dir: self.wind_dir,
            humidity: self.humidity,
            uv: self.uv,
            pressure_mb: self.pressure_mb,
            precip_mm: self.precip_mm,
            cloud: self.cloud,
            heat_index_c: self.heatindex_c,
            air_quality: self.air_quality.map(AirQuality::from),
        })
    }
}

impl RawForecastDay {
    fn into_day(self, keep_hours: bool) -> Result<ForecastDay, GatewayError> {
        let hours = if keep_hours {
            self.hour
                .into_iter()
                .map(|h| {
                    Ok(HourlyForecast {
                        time: parse_local_time(FORECAST, &h.time)?,
                        temp_c: h.temp_c,
                        condition: h.condition.into(),
                        chance_of_rain: h.chance_of_rain,
                        wind_kph: h.wind_kph,
                        humidity: h.humidity,
                    })
                })
                .collect::<Result<Vec<_>, GatewayError>>()?
        } else {
            Vec::new()
        };

        Ok(ForecastDay {
            date: self.date,
            max_temp_c: self.day.maxtemp_c,
            min_temp_c: self.day.mintemp_c,
            avg_temp_c: self.day.avgtemp_c,
            condition: self.day.condition.into(),
            avg_humidity: self.day.avghumidity,
            max_wind_kph: self.day.maxwind_kph,
            chance_of_rain: self.day.daily_chance_of_rain,
            total_precip_mm: self.day.totalprecip_mm,
            uv: self.day.uv,
            hours,
            astronomy: Astronomy {
                sunrise: self.astro.sunrise,
                sunset: self.astro.sunset,
                moonrise: self.astro.moonrise,
                moonset: self.astro.moonset,
                moon_phase: self.astro.moon_phase,
                moon_illumination: self.astro.moon_illumination,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for weatherapi.com.
pub struct WeatherApiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl WeatherApiClient {
    /// Create a client. `timeout` of `None` leaves requests unbounded.
    pub fn new(base_url: &str, api_key: SecretString, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("Failed to build weather HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(cfg: &ApiConfig) -> Result<Self> {
        let key = cfg
            .api_key()
            .context("Weather API key is required")?;
        Self::new(&cfg.base_url, key, cfg.request_timeout())
    }

    fn url(&self, endpoint: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}/{endpoint}?key={}",
            self.base_url,
            urlencoding::encode(self.api_key.expose_secret())
        );
        for (name, value) in params {
            url.push('&');
            url.push_str(name);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        // Params never include the key, so they are safe to log.
        debug!(endpoint, ?params, "Calling weather API");
        get_json(&self.http, endpoint, &self.url(endpoint, params)).await
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

#[async_trait]
impl WeatherApi for WeatherApiClient {
    async fn current(&self, query: &str) -> Result<CurrentReport, GatewayError> {
        let raw: RawCurrentResponse = self.get(CURRENT, &[("q", query), ("aqi", "yes")]).await?;
        Ok(CurrentReport {
            location: raw.location.into_resolved(CURRENT)?,
            conditions: raw.current.into_conditions()?,
        })
    }

    async fn forecast(
        &self,
        query: &str,
        options: ForecastOptions,
    ) -> Result<ForecastReport, GatewayError> {
        let days = options.days.to_string();
        let mut params = vec![
            ("q", query),
            ("days", days.as_str()),
            ("aqi", yes_no(options.air_quality)),
            ("alerts", yes_no(options.alerts)),
        ];
        if options.hourly {
            params.push(("hour", ALL_HOURS));
        }

        let raw: RawForecastResponse = self.get(FORECAST, &params).await?;
        let days = raw
            .forecast
            .forecastday
            .into_iter()
            .map(|d| d.into_day(options.hourly))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ForecastReport {
            location: raw.location.into_resolved(FORECAST)?,
            days,
            alerts: raw.alerts.alert.into_iter().map(WeatherAlert::from).collect(),
        })
    }

    async fn history(&self, query: &str, date: NaiveDate) -> Result<HistoricalDay, GatewayError> {
        let dt = date.format("%Y-%m-%d").to_string();
        let raw: RawHistoryResponse = self.get(HISTORY, &[("q", query), ("dt", dt.as_str())]).await?;
        let day = raw
            .forecast
            .forecastday
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Decode {
                endpoint: HISTORY,
                message: format!("no day in history response for {dt}"),
            })?;

        Ok(HistoricalDay {
            date: day.date,
            avg_temp_c: day.day.avgtemp_c,
            condition: day.day.condition.into(),
        })
    }

    async fn search(&self, prefix: &str) -> Result<Vec<LocationSuggestion>, GatewayError> {
        let raw: Vec<RawSuggestion> = self.get(SEARCH, &[("q", prefix)]).await?;
        Ok(raw
            .into_iter()
            .map(|s| LocationSuggestion {
                id: s.id,
                name: s.name,
                region: s.region,
                country: s.country,
                latitude: s.lat,
                longitude: s.lon,
            })
            .collect())
    }

    async fn ip_lookup(&self) -> Result<IpLocation, GatewayError> {
        let raw: RawIp = self.get(IP, &[("q", "auto:ip")]).await?;
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Ok(IpLocation {
            ip: raw.ip,
            city: non_blank(raw.city),
            country: non_blank(raw.country_name),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
