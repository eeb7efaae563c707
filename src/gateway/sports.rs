//! Placeholder sports feed.
//!
//! There is no real sports provider behind the dashboard: a generic JSON
//! list endpoint is fetched and each item is reshaped into a fixture. The
//! panel is decorative, so every failure ends in a fixed fallback list
//! rather than an empty section.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{get_json, SportsFeed};
use crate::config::SportsConfig;
use crate::types::{GatewayError, SportsEvent};

const ENDPOINT: &str = "sports-feed";

const SPORTS: [&str; 5] = ["Football", "Basketball", "Tennis", "Soccer", "Baseball"];

const MATCHUPS: [&str; 5] = [
    "Team A vs Team B",
    "Team X vs Team Y",
    "Champions vs Challengers",
    "Home vs Away",
    "Red Team vs Blue Team",
];

/// Any object with a title-like field will do.
#[derive(Debug, Deserialize)]
pub struct FeedItem {
    #[serde(alias = "name", alias = "headline")]
    pub title: String,
}

pub struct PlaceholderSportsFeed {
    http: Client,
    url: String,
    limit: u32,
}

impl PlaceholderSportsFeed {
    pub fn new(url: &str, limit: u32) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("nimbus/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build sports HTTP client")?;
        Ok(Self {
            http,
            url: url.to_string(),
            limit,
        })
    }

    pub fn from_config(cfg: &SportsConfig) -> Result<Self> {
        Self::new(&cfg.feed_url, cfg.limit)
    }
}

#[async_trait]
impl SportsFeed for PlaceholderSportsFeed {
    async fn fixtures(&self) -> Result<Vec<SportsEvent>, GatewayError> {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        let url = format!("{}{separator}_limit={}", self.url, self.limit);
        debug!(url = %url, "Fetching sports feed");

        let mut items: Vec<FeedItem> = get_json(&self.http, ENDPOINT, &url).await?;
        items.truncate(self.limit as usize);
        Ok(reshape(items))
    }
}

/// Turn feed items into fixtures. Sport, matchup and date label are chosen
/// by position; the item's title becomes the description.
pub fn reshape(items: Vec<FeedItem>) -> Vec<SportsEvent> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| SportsEvent {
            sport: SPORTS[i % SPORTS.len()].to_string(),
            matchup: MATCHUPS[i % MATCHUPS.len()].to_string(),
            date_label: date_label(i),
            description: item.title,
        })
        .collect()
}

fn date_label(i: usize) -> String {
    match i % 4 {
        0 => format!("Today, {}:00", 14 + i),
        1 => format!("Tomorrow, {}:00", 15 + i),
        2 => format!("In 2 days, {}:00", 16 + i),
        _ => "Next week, 14:00".to_string(),
    }
}

/// Shown when the feed cannot be reached or returns nothing usable.
pub fn offline_fixtures() -> Vec<SportsEvent> {
    vec![SportsEvent::new(
        "Football",
        "Local Team vs Visitors",
        "This weekend",
        "Local league match",
    )]
}

/// Shown when the feed answers with a non-success status.
pub fn unavailable_fixtures() -> Vec<SportsEvent> {
    vec![
        SportsEvent::new(
            "Football",
            "Manchester United vs Liverpool",
            "Today, 15:00",
            "Premier League Match",
        ),
        SportsEvent::new("Basketball", "Lakers vs Warriors", "Tomorrow, 19:30", "NBA Game"),
    ]
}

/// Never empty: a failed or empty fetch is replaced by a fixed list.
pub fn fixtures_or_fallback(result: Result<Vec<SportsEvent>, GatewayError>) -> Vec<SportsEvent> {
    match result {
        Ok(events) if !events.is_empty() => events,
        Ok(_) => {
            debug!("Sports feed returned no items, using fallback");
            offline_fixtures()
        }
        Err(e @ GatewayError::NotFound { .. }) => {
            warn!(error = %e, "Sports feed unavailable, using fallback");
            unavailable_fixtures()
        }
        Err(e) => {
            warn!(error = %e, "Sports feed failed, using fallback");
            offline_fixtures()
        }
    }
}
