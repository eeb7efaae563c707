//! In-memory gateways for integration testing.
//!
//! `FakeWeatherApi` answers from a fixed table of known places and can be
//! told to fail specific calls or to hold history responses until a test
//! releases them. `FakeSports` returns a canned result.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use nimbus::gateway::{SportsFeed, WeatherApi};
use nimbus::types::*;

#[derive(Clone)]
struct Place {
    name: &'static str,
    country: &'static str,
    tz_id: &'static str,
    avg_temp_c: f64,
}

pub struct FakeWeatherApi {
    places: Vec<Place>,
    ip: Mutex<Result<IpLocation, GatewayError>>,
    /// 1-based index of a `current` call that returns HTTP 404.
    fail_current_call: Mutex<Option<usize>>,
    /// 1-based index of a `history` call that fails.
    fail_history_call: Mutex<Option<usize>>,
    gates: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
    current_calls: AtomicUsize,
    history_calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl FakeWeatherApi {
    pub fn new() -> Self {
        Self {
            places: vec![
                Place { name: "London", country: "United Kingdom", tz_id: "Europe/London", avg_temp_c: 14.0 },
                Place { name: "Paris", country: "France", tz_id: "Europe/Paris", avg_temp_c: 20.0 },
                Place { name: "Lyon", country: "France", tz_id: "Europe/Paris", avg_temp_c: 10.0 },
                Place {
                    name: "New York",
                    country: "United States of America",
                    tz_id: "America/New_York",
                    avg_temp_c: 22.0,
                },
            ],
            ip: Mutex::new(Ok(IpLocation { ip: Some("203.0.113.7".into()), city: None, country: None })),
            fail_current_call: Mutex::new(None),
            fail_history_call: Mutex::new(None),
            gates: Mutex::new(HashMap::new()),
            current_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn set_ip(&self, ip: Result<IpLocation, GatewayError>) {
        *self.ip.lock().unwrap() = ip;
    }

    pub fn fail_current_call(&self, n: usize) {
        *self.fail_current_call.lock().unwrap() = Some(n);
    }

    pub fn fail_history_call(&self, n: usize) {
        *self.fail_history_call.lock().unwrap() = Some(n);
    }

    /// Hold history responses for `name` until `release` is called.
    pub fn gate_history(&self, name: &'static str) {
        self.gates.lock().unwrap().insert(name, Arc::new(Semaphore::new(0)));
    }

    pub fn release_history(&self, name: &str, permits: usize) {
        if let Some(gate) = self.gates.lock().unwrap().get(name) {
            gate.add_permits(permits);
        }
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    /// Every query string passed to `current`, in call order.
    pub fn current_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn find(&self, query: &str) -> Option<Place> {
        let query = query.trim().to_lowercase();
        if query.starts_with("48.") {
            return self.places.iter().find(|p| p.name == "Paris").cloned();
        }
        self.places
            .iter()
            .find(|p| query == p.name.to_lowercase() || query.starts_with(&format!("{}, ", p.name.to_lowercase())))
            .cloned()
    }

    fn lookup(&self, endpoint: &'static str, query: &str) -> Result<Place, GatewayError> {
        self.find(query).ok_or_else(|| GatewayError::NotFound {
            endpoint,
            status: 400,
            message: "No matching location found.".to_string(),
        })
    }
}

fn local_time() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-06-01 13:20", "%Y-%m-%d %H:%M").unwrap()
}

fn condition(text: &str) -> Condition {
    Condition {
        text: text.to_string(),
        icon: "//cdn.weatherapi.com/weather/64x64/day/116.png".to_string(),
        code: 1003,
    }
}

fn location(place: &Place) -> ResolvedLocation {
    ResolvedLocation {
        name: place.name.to_string(),
        region: String::new(),
        country: place.country.to_string(),
        latitude: 0.0,
        longitude: 0.0,
        tz_id: place.tz_id.to_string(),
        localtime_epoch: 1_717_248_000,
        local_time: local_time(),
        query: ResolvedLocation::canonical_query(place.name, place.country),
    }
}

fn forecast_day(date: NaiveDate, avg: f64) -> ForecastDay {
    ForecastDay {
        date,
        max_temp_c: avg + 5.0,
        min_temp_c: avg - 5.0,
        avg_temp_c: avg,
        condition: condition("Partly cloudy"),
        avg_humidity: 60.0,
        max_wind_kph: 14.0,
        chance_of_rain: 30,
        total_precip_mm: 0.2,
        uv: 5.0,
        hours: (0..24)
            .map(|h| HourlyForecast {
                time: date.and_hms_opt(h, 0, 0).unwrap(),
                temp_c: avg,
                condition: condition("Partly cloudy"),
                chance_of_rain: 30,
                wind_kph: 10.0,
                humidity: 60,
            })
            .collect(),
        astronomy: Astronomy {
            sunrise: "05:47 AM".to_string(),
            sunset: "09:43 PM".to_string(),
            moonrise: "02:19 AM".to_string(),
            moonset: "04:28 PM".to_string(),
            moon_phase: "Waning Crescent".to_string(),
            moon_illumination: 31,
        },
    }
}

#[async_trait]
impl WeatherApi for FakeWeatherApi {
    async fn current(&self, query: &str) -> Result<CurrentReport, GatewayError> {
        let call = self.current_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.queries.lock().unwrap().push(query.to_string());
        if *self.fail_current_call.lock().unwrap() == Some(call) {
            return Err(GatewayError::NotFound {
                endpoint: "current.json",
                status: 404,
                message: "Not Found".to_string(),
            });
        }

        let place = self.lookup("current.json", query)?;
        Ok(CurrentReport {
            location: location(&place),
            conditions: CurrentConditions {
                last_updated: local_time(),
                temp_c: place.avg_temp_c,
                temp_f: place.avg_temp_c * 9.0 / 5.0 + 32.0,
                feels_like_c: place.avg_temp_c,
                is_day: true,
                condition: condition("Partly cloudy"),
                wind_kph: 11.0,
                wind_dir: "W".to_string(),
                humidity: 60,
                uv: 5.0,
                pressure_mb: 1012.0,
                precip_mm: 0.0,
                cloud: 25,
                heat_index_c: None,
                air_quality: Some(AirQuality {
                    co: 200.0,
                    no2: 10.0,
                    o3: 70.0,
                    so2: 2.0,
                    pm2_5: 3.0,
                    pm10: 4.0,
                    us_epa_index: 1,
                    gb_defra_index: 1,
                }),
            },
        })
    }

    async fn forecast(&self, query: &str, options: ForecastOptions) -> Result<ForecastReport, GatewayError> {
        let place = self.lookup("forecast.json", query)?;
        let start = local_time().date();
        Ok(ForecastReport {
            location: location(&place),
            days: start
                .iter_days()
                .take(usize::from(options.days))
                .map(|d| forecast_day(d, place.avg_temp_c))
                .collect(),
            alerts: Vec::new(),
        })
    }

    async fn history(&self, query: &str, date: NaiveDate) -> Result<HistoricalDay, GatewayError> {
        let call = self.history_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let place = self.lookup("history.json", query)?;

        let gate = self.gates.lock().unwrap().get(place.name).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if *self.fail_history_call.lock().unwrap() == Some(call) {
            return Err(GatewayError::Network {
                endpoint: "history.json",
                message: "connection reset by peer".to_string(),
            });
        }
        Ok(HistoricalDay {
            date,
            avg_temp_c: place.avg_temp_c,
            condition: condition("Sunny"),
        })
    }

    async fn search(&self, prefix: &str) -> Result<Vec<LocationSuggestion>, GatewayError> {
        let prefix = prefix.to_lowercase();
        Ok(self
            .places
            .iter()
            .filter(|p| p.name.to_lowercase().starts_with(&prefix))
            .map(|p| LocationSuggestion {
                id: None,
                name: p.name.to_string(),
                region: String::new(),
                country: p.country.to_string(),
                latitude: 0.0,
                longitude: 0.0,
            })
            .collect())
    }

    async fn ip_lookup(&self) -> Result<IpLocation, GatewayError> {
        self.ip.lock().unwrap().clone()
    }
}

pub struct FakeSports {
    result: Result<Vec<SportsEvent>, GatewayError>,
}

impl FakeSports {
    pub fn returning(result: Result<Vec<SportsEvent>, GatewayError>) -> Self {
        Self { result }
    }
}

#[async_trait]
impl SportsFeed for FakeSports {
    async fn fixtures(&self) -> Result<Vec<SportsEvent>, GatewayError> {
        self.result.clone()
    }
}
