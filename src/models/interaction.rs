use serde::{Deserialize, Serialize};

use super::enums::{InteractionType, RiskLevel, Severity};
use super::lenient::{
    count, interaction_type, null_to_default, risk_level, severity, skip_invalid, text,
};

/// One conflict between a medicine and one health-profile item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthProfileInteraction {
    #[serde(rename = "type", deserialize_with = "interaction_type")]
    pub interaction_type: InteractionType,
    #[serde(default, deserialize_with = "text")]
    pub item: String,
    #[serde(default, deserialize_with = "text")]
    pub description: String,
    #[serde(default = "default_severity", deserialize_with = "severity")]
    pub severity: Severity,
    #[serde(default, deserialize_with = "text")]
    pub recommendation: String,
}

fn default_severity() -> Severity {
    Severity::Info
}

/// Per-medicine rollup of interaction findings.
///
/// Counts always equal the tally of `interactions` by severity (`info` is
/// listed but not counted) and `overall_risk` is the highest counted
/// severity, `minimal` when there is none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionAnalysis {
    #[serde(default, deserialize_with = "null_to_default")]
    pub has_interactions: bool,
    #[serde(default, deserialize_with = "count")]
    pub critical_count: u32,
    #[serde(default, deserialize_with = "count")]
    pub high_count: u32,
    #[serde(default, deserialize_with = "count")]
    pub moderate_count: u32,
    #[serde(default, deserialize_with = "count")]
    pub low_count: u32,
    #[serde(default, deserialize_with = "skip_invalid")]
    pub interactions: Vec<HealthProfileInteraction>,
    #[serde(default = "default_risk", deserialize_with = "risk_level")]
    pub overall_risk: RiskLevel,
    #[serde(default, deserialize_with = "text")]
    pub summary: String,
}

fn default_risk() -> RiskLevel {
    RiskLevel::Minimal
}

impl InteractionAnalysis {
    /// An analysis with no findings and the given summary.
    pub fn empty(summary: &str) -> Self {
        Self {
            has_interactions: false,
            critical_count: 0,
            high_count: 0,
            moderate_count: 0,
            low_count: 0,
            interactions: Vec::new(),
            overall_risk: RiskLevel::Minimal,
            summary: summary.to_string(),
        }
    }

    pub fn counted_total(&self) -> u32 {
        self.critical_count + self.high_count + self.moderate_count + self.low_count
    }
}

impl Default for InteractionAnalysis {
    fn default() -> Self {
        Self::empty("")
    }
}
