//! Full resolve → fetch → accumulate → commit cycles.

use std::sync::Arc;

use nimbus::engine::aggregator::AggregatorOptions;
use nimbus::engine::{Aggregator, Session};
use nimbus::gateway::{SportsFeed, WeatherApi};
use nimbus::types::{
    AggregationError, GatewayError, IpLocation, LocationQuery, Section, SportsEvent,
};

use crate::fake_api::{FakeSports, FakeWeatherApi};

fn build(api: Arc<FakeWeatherApi>, sports: Option<FakeSports>) -> Aggregator {
    Aggregator::new(
        api as Arc<dyn WeatherApi>,
        sports.map(|s| Arc::new(s) as Arc<dyn SportsFeed>),
        Arc::new(Session::new("New York", 7)),
        "New York",
        AggregatorOptions::default(),
    )
}

#[tokio::test]
async fn test_text_query_takes_gateway_location() {
    let api = Arc::new(FakeWeatherApi::new());
    let agg = build(api.clone(), None);

    let cycle = agg.aggregate(LocationQuery::text("london")).await.unwrap();
    assert_eq!(cycle.view.location.name, "London");
    assert_eq!(cycle.view.location.country, "United Kingdom");
    assert_eq!(cycle.view.location.query, "London, United Kingdom");

    // Resolution, then the cycle's own call with the canonical string.
    assert_eq!(api.current_queries(), vec!["london", "London, United Kingdom"]);
    cycle.pending.settle().await;
}

#[tokio::test]
async fn test_full_cycle_populates_every_section() {
    let api = Arc::new(FakeWeatherApi::new());
    let sports = FakeSports::returning(Ok(vec![SportsEvent::new(
        "Tennis",
        "Champions vs Challengers",
        "Today, 14:00",
        "Final",
    )]));
    let agg = build(api.clone(), Some(sports));

    let cycle = agg.aggregate(LocationQuery::text("Paris")).await.unwrap();
    cycle.pending.settle().await;

    let view = agg.session().latest_view().await.unwrap();
    assert_eq!(view.present_sections(), Section::ALL.to_vec());
    assert_eq!(view.hourly.as_ref().unwrap()[0].time.format("%H:%M").to_string(), "13:00");
    assert_eq!(view.air_quality.as_ref().unwrap().label, "Good");
    assert_eq!(api.history_calls(), 7);
}

#[tokio::test]
async fn test_current_failure_aborts_cycle() {
    let api = Arc::new(FakeWeatherApi::new());
    // Call 1 resolves the location, call 2 is the cycle's fetch.
    api.fail_current_call(2);
    let agg = build(api.clone(), None);

    let err = agg.aggregate(LocationQuery::text("Paris")).await.unwrap_err();
    assert!(err.is_location_not_found());
    assert!(matches!(
        err,
        AggregationError::LocationNotFound { source: GatewayError::NotFound { status: 404, .. }, .. }
    ));
    assert!(agg.session().latest_view().await.is_none());
    assert_eq!(agg.session().current_location().await, "New York");
    assert_eq!(api.history_calls(), 0);
}

#[tokio::test]
async fn test_failed_search_keeps_previous_view() {
    let api = Arc::new(FakeWeatherApi::new());
    let agg = build(api, None);

    let first = agg.aggregate(LocationQuery::text("Paris")).await.unwrap();
    first.pending.settle().await;

    let err = agg.aggregate(LocationQuery::text("Atlantis")).await.unwrap_err();
    assert!(matches!(err, AggregationError::LocationUnresolvable(_)));

    let view = agg.session().latest_view().await.unwrap();
    assert_eq!(view.location.name, "Paris");
    assert_eq!(agg.session().current_location().await, "Paris, France");
}

#[tokio::test]
async fn test_one_failed_history_day_leaves_six() {
    let api = Arc::new(FakeWeatherApi::new());
    api.fail_history_call(4);
    let agg = build(api.clone(), None);

    let cycle = agg.aggregate(LocationQuery::text("Paris")).await.unwrap();
    cycle.pending.settle().await;

    let window = agg.session().historical_window().await;
    assert_eq!(window.len(), 6);
    assert!(window.windows(2).all(|w| w[0].date > w[1].date));
    assert_eq!(api.history_calls(), 7);
}

#[tokio::test]
async fn test_sports_network_error_uses_single_fallback() {
    let api = Arc::new(FakeWeatherApi::new());
    let sports = FakeSports::returning(Err(GatewayError::Network {
        endpoint: "sports-feed",
        message: "connection refused".to_string(),
    }));
    let agg = build(api, Some(sports));

    let cycle = agg.aggregate(LocationQuery::text("Paris")).await.unwrap();
    cycle.pending.settle().await;

    let sports = agg.session().latest_view().await.unwrap().sports.unwrap();
    assert_eq!(
        sports,
        vec![SportsEvent::new(
            "Football",
            "Local Team vs Visitors",
            "This weekend",
            "Local league match"
        )]
    );
}

#[tokio::test]
async fn test_ip_without_city_resolves_default() {
    let api = Arc::new(FakeWeatherApi::new());
    api.set_ip(Ok(IpLocation { ip: Some("198.51.100.4".into()), city: None, country: None }));
    let agg = build(api, None);

    let cycle = agg.aggregate(LocationQuery::from_device(None)).await.unwrap();
    assert_eq!(cycle.view.location.name, "New York");
    cycle.pending.settle().await;
}

#[tokio::test]
async fn test_ip_lookup_failure_resolves_default() {
    let api = Arc::new(FakeWeatherApi::new());
    api.set_ip(Err(GatewayError::Network { endpoint: "ip.json", message: "unreachable".into() }));
    let agg = build(api, None);

    let cycle = agg.aggregate(LocationQuery::Ip).await.unwrap();
    assert_eq!(cycle.view.location.query, "New York, United States of America");
    cycle.pending.settle().await;
}

#[tokio::test]
async fn test_device_coordinates() {
    let api = Arc::new(FakeWeatherApi::new());
    let agg = build(api.clone(), None);

    let cycle = agg
        .aggregate(LocationQuery::from_device(Some((48.8566, 2.3522))))
        .await
        .unwrap();
    assert_eq!(cycle.view.location.name, "Paris");
    assert_eq!(api.current_queries()[0], "48.8566,2.3522");
    cycle.pending.settle().await;
}

#[tokio::test]
async fn test_late_results_from_superseded_cycle_are_discarded() {
    let api = Arc::new(FakeWeatherApi::new());
    api.gate_history("Paris");
    api.gate_history("Lyon");
    let agg = build(api.clone(), None);

    let paris = agg.aggregate(LocationQuery::text("Paris")).await.unwrap();
    let lyon = agg.aggregate(LocationQuery::text("Lyon")).await.unwrap();
    assert!(lyon.id() > paris.id());

    // Paris history arrives after Lyon committed.
    api.release_history("Paris", 7);
    paris.pending.settle().await;
    assert!(agg.session().historical_window().await.is_empty());

    api.release_history("Lyon", 7);
    lyon.pending.settle().await;
    let window = agg.session().historical_window().await;
    assert_eq!(window.len(), 7);
    assert!(window.iter().all(|d| d.avg_temp_c == 10.0));

    let view = agg.session().latest_view().await.unwrap();
    assert_eq!(view.location.name, "Lyon");
}

#[tokio::test]
async fn test_window_survives_location_change() {
    let api = Arc::new(FakeWeatherApi::new());
    let agg = build(api, None);

    let paris = agg.aggregate(LocationQuery::text("Paris")).await.unwrap();
    paris.pending.settle().await;

    let lyon = agg.aggregate(LocationQuery::text("Lyon")).await.unwrap();
    assert_eq!(lyon.view.historical.as_ref().map(Vec::len), Some(7));
    lyon.pending.settle().await;

    // Same dates already present: first write wins.
    let window = agg.session().historical_window().await;
    assert!(window.iter().all(|d| d.avg_temp_c == 20.0));
}

#[tokio::test]
async fn test_refresh_reuses_last_location() {
    let api = Arc::new(FakeWeatherApi::new());
    let agg = build(api.clone(), None);

    let first = agg.refresh().await.unwrap();
    assert_eq!(first.view.location.name, "New York");
    first.pending.settle().await;

    agg.aggregate(LocationQuery::text("Lyon")).await.unwrap().pending.settle().await;
    let again = agg.refresh().await.unwrap();
    assert_eq!(again.view.location.name, "Lyon");
    again.pending.settle().await;

    assert_eq!(agg.session().status().await.cycles_completed, 3);
}

#[tokio::test]
async fn test_suggestions() {
    let api = Arc::new(FakeWeatherApi::new());
    let agg = build(api, None);

    assert!(agg.suggest("Ly").await.unwrap().is_empty());
    let labels: Vec<String> = agg.suggest("Lyo").await.unwrap().iter().map(|s| s.label()).collect();
    assert_eq!(labels, vec!["Lyon, France"]);
}
