use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Share of traffic per acquisition channel (0.0 to 1.0).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficSources {
    #[serde(default)]
    pub direct: f64,
    #[serde(default)]
    pub referral: f64,
    #[serde(default)]
    pub search: f64,
    #[serde(default)]
    pub social: f64,
    #[serde(default)]
    pub mail: f64,
    #[serde(default)]
    pub display: f64,
}

/// Whatever subset of traffic metrics a provider returned for a domain.
///
/// Every semantic field is independently optional; provider fields we do
/// not model land in `extra` so a new provider field needs no schema change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_visits: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_rank: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_rank: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounce_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_per_visit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_visit_duration_secs: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_sources: Option<TrafficSources>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
    pub fetched_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    pub fn new(fetched_at: DateTime<Utc>) -> Self {
        Self {
            monthly_visits: None,
            global_rank: None,
            country_rank: None,
            bounce_rate: None,
            pages_per_visit: None,
            avg_visit_duration_secs: None,
            traffic_sources: None,
            extra: Map::new(),
            fetched_at,
        }
    }

    pub fn with_monthly_visits(mut self, visits: i64) -> Self {
        self.monthly_visits = Some(visits);
        self
    }

    pub fn with_global_rank(mut self, rank: i64) -> Self {
        self.global_rank = Some(rank);
        self
    }
}
