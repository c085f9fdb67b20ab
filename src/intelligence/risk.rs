//! Rolls findings up per medicine and across a prescription.

use std::collections::HashSet;

use chrono::Utc;

use crate::models::enums::{Reliability, RiskLevel, Severity};
use crate::models::{
    CombinedMedicine, HealthProfileInteraction, InteractionAnalysis, OverallHealthAnalysis,
    SearchMetadata,
};

use super::matching::normalize;
use super::messages::MessageTemplates;

/// Upper bound on prescription-level recommendations.
pub const MAX_KEY_RECOMMENDATIONS: usize = 5;

/// Aggregate findings for an unnamed medicine.
pub fn aggregate(findings: Vec<HealthProfileInteraction>) -> InteractionAnalysis {
    aggregate_for("This medicine", findings)
}

/// Tally findings by severity. `info` findings are kept in the list but
/// never counted and never raise the overall risk above minimal.
pub fn aggregate_for(medicine: &str, findings: Vec<HealthProfileInteraction>) -> InteractionAnalysis {
    let mut critical_count = 0;
    let mut high_count = 0;
    let mut moderate_count = 0;
    let mut low_count = 0;

    for finding in &findings {
        match finding.severity {
            Severity::Critical => critical_count += 1,
            Severity::High => high_count += 1,
            Severity::Moderate => moderate_count += 1,
            Severity::Low => low_count += 1,
            Severity::Info => {}
        }
    }

    let highest = findings
        .iter()
        .map(|f| f.severity)
        .filter(Severity::is_risk_contributing)
        .max();
    let overall_risk = RiskLevel::from_severity(highest);
    let counted = critical_count + high_count + moderate_count + low_count;

    InteractionAnalysis {
        has_interactions: !findings.is_empty(),
        critical_count,
        high_count,
        moderate_count,
        low_count,
        summary: MessageTemplates::medicine_summary(medicine, overall_risk, counted, findings.len()),
        interactions: findings,
        overall_risk,
    }
}

/// Merge two finding lists, keeping one finding per (type, item). When both
/// lists report the same item, the more severe finding wins; on a tie the
/// first list wins. Order of first appearance is preserved.
pub fn merge_findings(
    primary: Vec<HealthProfileInteraction>,
    secondary: Vec<HealthProfileInteraction>,
) -> Vec<HealthProfileInteraction> {
    let mut merged: Vec<HealthProfileInteraction> = Vec::new();

    for finding in primary.into_iter().chain(secondary) {
        let key = normalize(&finding.item);
        match merged
            .iter_mut()
            .find(|m| m.interaction_type == finding.interaction_type && normalize(&m.item) == key)
        {
            Some(existing) if finding.severity > existing.severity => *existing = finding,
            Some(_) => {}
            None => merged.push(finding),
        }
    }

    merged
}

/// Prescription-wide risk: the highest per-medicine risk, with immediate
/// attention required when any medicine is critical.
pub fn assess_prescription(medicines: &[CombinedMedicine]) -> OverallHealthAnalysis {
    let risk_level = overall_risk(medicines);
    let flagged = medicines
        .iter()
        .filter(|m| m.medical_info.health_profile_interaction.overall_risk > RiskLevel::Minimal)
        .count();

    OverallHealthAnalysis {
        risk_level,
        summary: MessageTemplates::prescription_summary(risk_level, flagged, medicines.len()),
        key_recommendations: key_recommendations(medicines),
        requires_immediate_attention: medicines
            .iter()
            .any(|m| m.medical_info.health_profile_interaction.overall_risk == RiskLevel::Critical),
    }
}

/// Distinct recommendations from critical and high findings, most severe first.
pub fn key_recommendations(medicines: &[CombinedMedicine]) -> Vec<String> {
    let mut findings: Vec<&HealthProfileInteraction> = medicines
        .iter()
        .flat_map(|m| &m.medical_info.health_profile_interaction.interactions)
        .filter(|f| f.severity >= Severity::High)
        .collect();
    findings.sort_by(|a, b| b.severity.cmp(&a.severity));

    let mut seen = HashSet::new();
    let mut recommendations: Vec<String> = findings
        .into_iter()
        .map(|f| f.recommendation.trim())
        .filter(|r| !r.is_empty() && seen.insert(normalize(r)))
        .take(MAX_KEY_RECOMMENDATIONS)
        .map(str::to_string)
        .collect();

    if recommendations.is_empty() {
        recommendations.push(MessageTemplates::default_recommendation());
    }
    recommendations
}

/// Metadata rollup for a reconciled prescription.
pub fn search_metadata(
    medicines: &[CombinedMedicine],
    sources_count: Option<u32>,
    reliability: Option<Reliability>,
) -> SearchMetadata {
    SearchMetadata {
        search_date: Utc::now(),
        original_count: medicines.len() as u32,
        found_count: medicines.iter().filter(|m| m.medical_info.is_found()).count() as u32,
        sources_count,
        reliability,
        error: None,
        parse_error: None,
        total_interactions: medicines
            .iter()
            .map(|m| m.medical_info.health_profile_interaction.interactions.len() as u32)
            .sum(),
        critical_interactions: medicines
            .iter()
            .map(|m| m.medical_info.health_profile_interaction.critical_count)
            .sum(),
        overall_risk_level: overall_risk(medicines),
    }
}

fn overall_risk(medicines: &[CombinedMedicine]) -> RiskLevel {
    medicines
        .iter()
        .map(|m| m.medical_info.health_profile_interaction.overall_risk)
        .max()
        .unwrap_or(RiskLevel::Minimal)
}
