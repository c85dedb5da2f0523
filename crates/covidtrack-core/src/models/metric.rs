use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three parallel time series published upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Infected,
    Dead,
    Recovered,
}

impl MetricKind {
    /// All kinds in feed order. INFECTED comes first because it anchors
    /// reconciliation.
    pub const ALL: [MetricKind; 3] = [MetricKind::Infected, MetricKind::Dead, MetricKind::Recovered];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Infected => "infected",
            MetricKind::Dead => "dead",
            MetricKind::Recovered => "recovered",
        }
    }

    /// Get the display title for this kind.
    pub fn title(&self) -> &'static str {
        match self {
            MetricKind::Infected => "Confirmed",
            MetricKind::Dead => "Deaths",
            MetricKind::Recovered => "Recovered",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "infected" | "confirmed" => Ok(MetricKind::Infected),
            "dead" | "deaths" => Ok(MetricKind::Dead),
            "recovered" => Ok(MetricKind::Recovered),
            other => Err(format!("unknown metric kind: {}", other)),
        }
    }
}
