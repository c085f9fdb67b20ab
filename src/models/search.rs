use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Reliability, RiskLevel};
use super::lenient::{null_to_default, skip_invalid, text};
use super::medical_info::MedicalInfo;
use super::medicine::MedicineInput;

/// One OCR line paired with its enrichment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedMedicine {
    pub prescription: MedicineInput,
    pub medical_info: MedicalInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    #[serde(default = "Utc::now")]
    pub search_date: DateTime<Utc>,
    #[serde(default)]
    pub original_count: u32,
    #[serde(default)]
    pub found_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reliability: Option<Reliability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    #[serde(default)]
    pub total_interactions: u32,
    #[serde(default)]
    pub critical_interactions: u32,
    #[serde(default = "minimal")]
    pub overall_risk_level: RiskLevel,
}

fn minimal() -> RiskLevel {
    RiskLevel::Minimal
}

/// A grounding source cited by the enrichment service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub index: u32,
    #[serde(default, deserialize_with = "text")]
    pub title: String,
    #[serde(default, deserialize_with = "text")]
    pub url: String,
    #[serde(default, deserialize_with = "text")]
    pub domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citations {
    #[serde(default, deserialize_with = "skip_invalid")]
    pub sources: Vec<Source>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub queries: Vec<String>,
    #[serde(default)]
    pub has_grounding: bool,
}

/// Prescription-wide rollup across all medicines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallHealthAnalysis {
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_recommendations: Vec<String>,
    #[serde(default)]
    pub requires_immediate_attention: bool,
}

/// Everything produced by one scan, persisted as an opaque blob on the
/// prescription record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineSearchResult {
    pub medicines: Vec<CombinedMedicine>,
    pub search_metadata: SearchMetadata,
    #[serde(default)]
    pub citations: Citations,
    pub overall_health_analysis: OverallHealthAnalysis,
}

impl MedicineSearchResult {
    /// OCR lines flagged as low-confidence extractions.
    pub fn uncertain_medicines(&self) -> Vec<&MedicineInput> {
        self.medicines
            .iter()
            .map(|m| &m.prescription)
            .filter(|p| p.uncertain)
            .collect()
    }

    pub fn requires_immediate_attention(&self) -> bool {
        self.overall_health_analysis.requires_immediate_attention
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{InteractionType, SearchStatus, Severity};
    use crate::models::interaction::{HealthProfileInteraction, InteractionAnalysis};
    use crate::models::medicine::ActiveIngredient;

    fn sample_result() -> MedicineSearchResult {
        let mut info = MedicalInfo {
            name: "Augmentin 625 Duo".into(),
            uses: vec!["Bacterial infections".into()],
            active_ingredients: vec![
                ActiveIngredient::named("Amoxicillin"),
                ActiveIngredient::named("Clavulanic Acid"),
            ],
            search_status: Some(SearchStatus::Found),
            ..Default::default()
        };
        info.health_profile_interaction = InteractionAnalysis {
            has_interactions: true,
            critical_count: 1,
            high_count: 0,
            moderate_count: 0,
            low_count: 0,
            interactions: vec![HealthProfileInteraction {
                interaction_type: InteractionType::Allergy,
                item: "Cephalosporins".into(),
                description: "Cross-reactive beta-lactam".into(),
                severity: Severity::Critical,
                recommendation: "Do not take".into(),
            }],
            overall_risk: RiskLevel::Critical,
            summary: "critical".into(),
        };

        let mut uncertain = MedicineInput::named("Hexigel");
        uncertain.uncertain = true;
        uncertain.quantity = Some(1.5);

        MedicineSearchResult {
            medicines: vec![
                CombinedMedicine {
                    prescription: MedicineInput::named("Augmentin 625mg"),
                    medical_info: info,
                },
                CombinedMedicine {
                    prescription: uncertain,
                    medical_info: MedicalInfo::not_found("Hexigel"),
                },
            ],
            search_metadata: SearchMetadata {
                search_date: Utc::now(),
                original_count: 2,
                found_count: 1,
                sources_count: Some(3),
                reliability: Some(Reliability::High),
                error: None,
                parse_error: None,
                total_interactions: 1,
                critical_interactions: 1,
                overall_risk_level: RiskLevel::Critical,
            },
            citations: Citations {
                sources: vec![Source {
                    index: 1,
                    title: "Augmentin".into(),
                    url: "https://example.org/augmentin".into(),
                    domain: "example.org".into(),
                }],
                queries: vec!["augmentin interactions".into()],
                has_grounding: true,
            },
            overall_health_analysis: OverallHealthAnalysis {
                risk_level: RiskLevel::Critical,
                summary: "One medicine needs attention".into(),
                key_recommendations: vec!["Do not take".into()],
                requires_immediate_attention: true,
            },
        }
    }

    #[test]
    fn persisted_shape_round_trips() {
        let result = sample_result();
        let json = serde_json::to_string(&result).unwrap();
        let back: MedicineSearchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn persisted_shape_uses_camel_case_keys() {
        let json = serde_json::to_value(sample_result()).unwrap();
        assert!(json.get("overallHealthAnalysis").is_some());
        assert_eq!(json["searchMetadata"]["overallRiskLevel"], "critical");
        assert_eq!(json["medicines"][1]["medicalInfo"]["searchStatus"], "not_found");
        assert_eq!(json["citations"]["hasGrounding"], true);
    }

    #[test]
    fn uncertain_lines_are_listed() {
        let result = sample_result();
        let uncertain = result.uncertain_medicines();
        assert_eq!(uncertain.len(), 1);
        assert_eq!(uncertain[0].name, "Hexigel");
        assert!(result.requires_immediate_attention());
    }
}
