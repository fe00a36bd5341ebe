use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A numeric field the provider sends either as a JSON number or as a
/// formatted string ("1,234,567", "45.2%").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlexNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FlexNumber {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FlexNumber::Int(v) => Some(*v as f64),
            FlexNumber::Float(v) => Some(*v),
            FlexNumber::Text(s) => {
                let cleaned: String = s
                    .trim()
                    .trim_end_matches('%')
                    .chars()
                    .filter(|c| *c != ',')
                    .collect();
                cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
            }
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FlexNumber::Int(v) => Some(*v),
            other => other.as_f64().map(|v| v.round() as i64),
        }
    }
}

/// Traffic source shares as reported by the provider.
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

/// Raw per-domain payload. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDomainData {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub monthly_visits: Option<FlexNumber>,
    #[serde(default)]
    pub global_rank: Option<FlexNumber>,
    #[serde(default)]
    pub country_rank: Option<FlexNumber>,
    #[serde(default)]
    pub bounce_rate: Option<FlexNumber>,
    #[serde(default)]
    pub pages_per_visit: Option<FlexNumber>,
    #[serde(default)]
    pub avg_visit_duration: Option<FlexNumber>,
    #[serde(default)]
    pub traffic_sources: Option<TrafficSources>,
    /// Set by the batch endpoint when a domain could not be resolved.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawDomainData {
    /// Many smaller sites only carry a rank, so either visits or rank counts
    /// as usable data.
    pub fn has_data(&self) -> bool {
        self.monthly_visits.as_ref().and_then(FlexNumber::as_i64).is_some()
            || self.global_rank.as_ref().and_then(FlexNumber::as_i64).is_some()
    }

    pub fn into_metrics(self) -> Option<DomainMetrics> {
        if !self.has_data() {
            return None;
        }
        Some(DomainMetrics {
            monthly_visits: self.monthly_visits.as_ref().and_then(FlexNumber::as_i64),
            global_rank: self.global_rank.as_ref().and_then(FlexNumber::as_i64),
            country_rank: self.country_rank.as_ref().and_then(FlexNumber::as_i64),
            bounce_rate: self.bounce_rate.as_ref().and_then(FlexNumber::as_f64),
            pages_per_visit: self.pages_per_visit.as_ref().and_then(FlexNumber::as_f64),
            avg_visit_duration: self.avg_visit_duration.as_ref().and_then(FlexNumber::as_i64),
            traffic_sources: self.traffic_sources,
            extra: self.extra,
        })
    }
}

/// Normalized metrics for one domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainMetrics {
    pub monthly_visits: Option<i64>,
    pub global_rank: Option<i64>,
    pub country_rank: Option<i64>,
    pub bounce_rate: Option<f64>,
    pub pages_per_visit: Option<f64>,
    /// Seconds.
    pub avg_visit_duration: Option<i64>,
    pub traffic_sources: Option<TrafficSources>,
    pub extra: Map<String, Value>,
}

/// One entry of a batch lookup.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub domain: String,
    pub data: Option<DomainMetrics>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SingleResponse {
    #[serde(default)]
    pub data: Option<RawDomainData>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BatchResponse {
    #[serde(default)]
    pub data: Option<Vec<RawDomainData>>,
    #[serde(default)]
    pub results: Option<Vec<RawDomainData>>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BatchRequest<'a> {
    pub domains: &'a [String],
    #[serde(rename = "maxAge")]
    pub max_age: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollectionPriority {
    High,
    #[default]
    Normal,
    Low,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CollectRequest<'a> {
    pub domains: &'a [String],
    pub priority: CollectionPriority,
}

/// Provider-side collection queue counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub processing: u64,
    #[serde(default)]
    pub completed: u64,
}
