//! Visit and analytics types
//!
//! Everything here except [`VisitOutcome`] is derived on read. [`PageStat`] and
//! [`TrafficSample`] are simulated figures and always serialize with
//! `"simulated": true`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::TagStat;

/// Name of the metrics record that holds the site-wide visit count
pub const VISITS_METRIC: &str = "visits";

/// Result of registering a visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitOutcome {
    Counted,
    AlreadyCounted,
}

/// Simulated per-page figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageStat {
    pub post_id: i64,
    pub title: String,
    pub views: u64,
    pub bounce_rate: u32,
    pub simulated: bool,
}

/// Simulated visits for one bucket of a traffic period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSample {
    pub label: String,
    pub visits: u64,
    pub percentage: u64,
    pub simulated: bool,
}

/// Granularity of a simulated traffic breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficPeriod {
    #[default]
    Week,
    Month,
    Year,
}

impl TrafficPeriod {
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Self::Week => &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"],
            Self::Month => &["Week 1", "Week 2", "Week 3", "Week 4"],
            Self::Year => &[
                "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
            ],
        }
    }
}

impl fmt::Display for TrafficPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
            Self::Year => write!(f, "year"),
        }
    }
}

impl FromStr for TrafficPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(format!("Invalid traffic period: {}", s)),
        }
    }
}

/// Tag frequency with its share of all posts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagShare {
    #[serde(flatten)]
    pub stat: TagStat,
    pub percentage: u64,
}

/// Dashboard overview
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub total_visits: u64,
    pub total_posts: u64,
    /// Estimated from total visits
    pub unique_visitors: u64,
    pub tags: Vec<TagShare>,
    pub top_pages: Vec<PageStat>,
    pub simulated: bool,
}
