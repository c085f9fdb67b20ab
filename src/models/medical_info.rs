use serde::{Deserialize, Serialize};

use super::enums::SearchStatus;
use super::interaction::InteractionAnalysis;
use super::lenient::{null_to_default, opt_bool, opt_lenient, opt_text, skip_invalid, text};
use super::medicine::ActiveIngredient;

/// Enrichment record for one medicine. Unavailable parts are represented
/// as empty lists or `None`, never as an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalInfo {
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "opt_text")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub uses: Vec<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub side_effects: SideEffects,
    #[serde(default, deserialize_with = "null_to_default")]
    pub warnings_and_precautions: Vec<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub interactions: Interactions,
    #[serde(default, deserialize_with = "null_to_default")]
    pub overdose_missed_dose: OverdoseMissedDose,
    #[serde(default, deserialize_with = "opt_lenient")]
    pub approximate_price: Option<Price>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub manufacturer: Vec<String>,
    #[serde(default, deserialize_with = "skip_invalid")]
    pub active_ingredients: Vec<ActiveIngredient>,
    #[serde(default, deserialize_with = "opt_text")]
    pub dosage_form: Option<String>,
    #[serde(default, deserialize_with = "opt_bool")]
    pub prescription_required: Option<bool>,
    #[serde(default, deserialize_with = "opt_bool")]
    pub generic_available: Option<bool>,
    #[serde(default, deserialize_with = "opt_bool")]
    pub fda_approved: Option<bool>,
    #[serde(default, deserialize_with = "opt_text")]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_status: Option<SearchStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub health_profile_interaction: InteractionAnalysis,
}

impl MedicalInfo {
    /// Placeholder used when enrichment has nothing for this medicine.
    pub fn placeholder(name: &str, status: SearchStatus, summary: &str) -> Self {
        Self {
            name: name.to_string(),
            search_status: Some(status),
            health_profile_interaction: InteractionAnalysis::empty(summary),
            ..Default::default()
        }
    }

    pub fn not_found(name: &str) -> Self {
        Self::placeholder(
            name,
            SearchStatus::NotFound,
            "No data available for this medication",
        )
    }

    pub fn failed(name: &str, error: &str) -> Self {
        let mut info = Self::placeholder(name, SearchStatus::Error, "Analysis failed due to error");
        info.error = Some(error.to_string());
        info
    }

    /// True unless the record is a not-found or error placeholder.
    pub fn is_found(&self) -> bool {
        !matches!(
            self.search_status,
            Some(SearchStatus::NotFound) | Some(SearchStatus::Error)
        )
    }

    pub fn ingredient_names(&self) -> Vec<String> {
        self.active_ingredients
            .iter()
            .map(|i| i.name.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideEffects {
    #[serde(default, deserialize_with = "null_to_default")]
    pub common: Vec<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub serious: Vec<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub rare: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interactions {
    #[serde(default, deserialize_with = "null_to_default")]
    pub drug_interactions: Vec<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub food_interactions: Vec<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub condition_interactions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdoseMissedDose {
    #[serde(default, deserialize_with = "opt_text")]
    pub overdose: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub missed_dose: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    #[serde(default, deserialize_with = "text")]
    pub currency: String,
    #[serde(default, deserialize_with = "text")]
    pub price_range: String,
    #[serde(default, deserialize_with = "text")]
    pub unit: String,
    #[serde(default, deserialize_with = "text")]
    pub last_updated: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::RiskLevel;

    #[test]
    fn partial_record_fills_defaults() {
        let info: MedicalInfo = serde_json::from_str(
            r#"{
                "name": "Pan-D",
                "uses": ["Acid reflux"],
                "sideEffects": null,
                "activeIngredients": [{"name": "Pantoprazole", "strength": "40mg"}],
                "prescriptionRequired": "true"
            }"#,
        )
        .unwrap();
        assert_eq!(info.name, "Pan-D");
        assert!(info.side_effects.common.is_empty());
        assert_eq!(info.ingredient_names(), vec!["Pantoprazole".to_string()]);
        assert_eq!(info.prescription_required, Some(true));
        assert_eq!(info.health_profile_interaction.overall_risk, RiskLevel::Minimal);
        assert!(info.is_found());
    }

    #[test]
    fn placeholders_carry_status() {
        let missing = MedicalInfo::not_found("Hexigel");
        assert_eq!(missing.search_status, Some(SearchStatus::NotFound));
        assert!(!missing.is_found());

        let failed = MedicalInfo::failed("Hexigel", "timeout");
        assert_eq!(failed.search_status, Some(SearchStatus::Error));
        assert_eq!(failed.error.as_deref(), Some("timeout"));
        assert!(failed.uses.is_empty());
    }

    #[test]
    fn search_status_omitted_when_absent() {
        let json = serde_json::to_value(MedicalInfo::default()).unwrap();
        assert!(json.get("searchStatus").is_none());
        assert!(json.get("error").is_none());
        assert!(json.get("approximatePrice").unwrap().is_null());
    }
}
