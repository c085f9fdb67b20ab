use crate::models::enums::RiskLevel;

use super::matching::normalize;

/// User-facing text for findings and rollups.
/// Descriptions name the matched ingredient so every finding can be traced.
pub struct MessageTemplates;

impl MessageTemplates {
    /// ALLERGY: matched ingredient belongs to the allergen or a cross-reactive group.
    pub fn allergy(allergy: &str, medicine: &str, ingredient: &str, keyword: &str) -> String {
        let keyword = normalize(keyword);
        if keyword == normalize(ingredient) || keyword == normalize(allergy) {
            format!(
                "{} contains {}, which may trigger your {} allergy.",
                medicine, ingredient, allergy,
            )
        } else {
            format!(
                "{} contains {}, which may trigger your {} allergy (related to {}).",
                medicine, ingredient, allergy, keyword,
            )
        }
    }

    pub fn allergy_recommendation(primary: bool) -> String {
        if primary {
            "Do not take this medication. Consult your doctor immediately.".into()
        } else {
            "Check with your doctor or pharmacist before taking this medication.".into()
        }
    }

    /// CONDITION: contraindication from the condition table.
    pub fn condition(medicine: &str, condition: &str, ingredient: &str, reason: &str) -> String {
        if reason.is_empty() {
            format!(
                "{} ({}) may be contraindicated with {}.",
                medicine, ingredient, condition,
            )
        } else {
            format!(
                "{} ({}) may be contraindicated with {}: it {}.",
                medicine, ingredient, condition, reason,
            )
        }
    }

    pub fn condition_recommendation(condition: &str) -> String {
        format!(
            "Tell your doctor about your {} before taking this medication.",
            condition,
        )
    }

    /// DIET: food or drink interaction.
    pub fn dietary(medicine: &str, restriction: &str, reason: &str) -> String {
        if reason.is_empty() {
            format!("Avoid {} while taking {}.", restriction, medicine)
        } else {
            format!("Avoid {} while taking {}: {}.", restriction, medicine, reason)
        }
    }

    pub fn dietary_recommendation(restriction: &str) -> String {
        format!(
            "Limit or avoid {} consumption during treatment.",
            restriction.to_lowercase(),
        )
    }

    /// MEDICATION: known interacting pair.
    pub fn medication_interaction(medicine: &str, current: &str, effect: &str) -> String {
        format!("Taking {} with {} {}.", medicine, current, effect)
    }

    /// MEDICATION: same ingredient already taken.
    pub fn duplicate_therapy(medicine: &str, current: &str, ingredient: &str) -> String {
        format!(
            "{} and your current medication {} both contain {}. \
             Taking both may double the dose.",
            medicine, current, ingredient,
        )
    }

    pub fn medication_recommendation(severe: bool) -> String {
        if severe {
            "Do not combine these without talking to your doctor first.".into()
        } else {
            "Monitor for side effects and let your healthcare provider know you take both.".into()
        }
    }

    /// Per-medicine rollup.
    pub fn medicine_summary(medicine: &str, risk: RiskLevel, counted: u32, total: usize) -> String {
        if total == 0 {
            return format!(
                "No interactions with your health profile were found for {}.",
                medicine,
            );
        }
        if counted == 0 {
            return format!(
                "{} has {} informational note{} for your health profile.",
                medicine,
                total,
                plural(total),
            );
        }
        format!(
            "{} poses a {} risk due to {} finding{} against your health profile.",
            medicine,
            risk,
            counted,
            plural(counted as usize),
        )
    }

    /// Prescription-wide rollup.
    pub fn prescription_summary(risk: RiskLevel, flagged: usize, medicines: usize) -> String {
        if medicines == 0 {
            return "No medicines were found on this prescription.".into();
        }
        if flagged == 0 {
            return format!(
                "None of the {} medicine{} on this prescription conflict with your health profile.",
                medicines,
                plural(medicines),
            );
        }
        format!(
            "{} of {} medicine{} on this prescription interact with your health profile. \
             Overall risk is {}.",
            flagged,
            medicines,
            plural(medicines),
            risk,
        )
    }

    pub fn default_recommendation() -> String {
        "Consult your healthcare provider for a full review of this prescription.".into()
    }

    pub fn analysis_failed() -> String {
        "Health profile analysis failed due to an error. Please try again.".into()
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allergy_message_names_cross_reactive_group() {
        let msg = MessageTemplates::allergy("Cephalosporins", "Augmentin", "Amoxicillin", "penicillins");
        assert!(msg.contains("Amoxicillin"));
        assert!(msg.contains("Cephalosporins"));
        assert!(msg.contains("related to penicillins"));

        let direct = MessageTemplates::allergy("Penicillin", "Amoxil", "Penicillin", "penicillin");
        assert!(!direct.contains("related to"));
    }

    #[test]
    fn summary_echoes_risk_and_count() {
        let msg = MessageTemplates::medicine_summary("Enzoflam", RiskLevel::High, 2, 2);
        assert!(msg.contains("high"));
        assert!(msg.contains('2'));
        let none = MessageTemplates::medicine_summary("Crocin", RiskLevel::Minimal, 0, 0);
        assert!(none.contains("No interactions"));
    }

    #[test]
    fn prescription_summary_counts_flagged() {
        let msg = MessageTemplates::prescription_summary(RiskLevel::Critical, 1, 3);
        assert!(msg.starts_with("1 of 3"));
        assert!(msg.contains("critical"));
    }
}
