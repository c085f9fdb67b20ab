//! Per-category detection. Each function looks at one medicine and one
//! slice of the health profile and emits at most one finding per profile item.

use crate::models::enums::{InteractionType, Severity};
use crate::models::{HealthProfile, HealthProfileInteraction};

use super::matching::{names_match, normalize};
use super::messages::MessageTemplates;
use super::reference::InteractionRules;
use super::signal::PairwiseSignal;
use super::types::MedicineQuery;

// ---------------------------------------------------------------------------
// Medicine terms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TermRole {
    /// First declared (or alias-resolved) ingredient; the name when there is none.
    Primary,
    Secondary,
    /// Medicine name as a fallback after its ingredients.
    Name,
}

#[derive(Debug, Clone)]
pub(crate) struct Term {
    pub display: String,
    pub normalized: String,
    pub role: TermRole,
}

/// Everything a medicine is matched on, primary ingredient first.
pub(crate) fn medicine_terms(query: &MedicineQuery, rules: &InteractionRules) -> Vec<Term> {
    let mut ingredients: Vec<String> = query
        .ingredient_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    if ingredients.is_empty() {
        if let Some(resolved) = rules.resolve_ingredients(&query.name) {
            ingredients = resolved.to_vec();
        }
    }

    let mut terms: Vec<Term> = ingredients
        .into_iter()
        .enumerate()
        .map(|(i, name)| Term {
            normalized: normalize(&name),
            display: name,
            role: if i == 0 { TermRole::Primary } else { TermRole::Secondary },
        })
        .collect();

    let name_role = if terms.is_empty() { TermRole::Primary } else { TermRole::Name };
    let name = query.name.trim();
    if !name.is_empty() {
        terms.push(Term {
            display: name.to_string(),
            normalized: normalize(name),
            role: name_role,
        });
    }
    terms
}

/// First term matching any keyword, with the keyword it matched.
fn find_term<'t, 'k>(
    terms: &'t [Term],
    keywords: &'k [String],
    rules: &InteractionRules,
) -> Option<(&'t Term, &'k str)> {
    terms.iter().find_map(|term| {
        keywords
            .iter()
            .find(|k| rules.keyword_matches(&term.normalized, k))
            .map(|k| (term, k.as_str()))
    })
}

fn profile_items(items: &[String]) -> impl Iterator<Item = &str> {
    items.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn log_gap(category: InteractionType, item: &str) {
    tracing::debug!(
        category = %category,
        item = %item,
        "No reference entry for profile item"
    );
}

// ---------------------------------------------------------------------------
// Allergies
// ---------------------------------------------------------------------------

/// Allergy matches are critical on the primary ingredient, high otherwise.
pub fn detect_allergy_interactions(
    query: &MedicineQuery,
    profile: &HealthProfile,
    rules: &InteractionRules,
) -> Vec<HealthProfileInteraction> {
    let terms = medicine_terms(query, rules);
    let mut findings = Vec::new();

    for allergy in profile_items(&profile.allergies) {
        if rules.allergy_entries(allergy).is_empty() {
            log_gap(InteractionType::Allergy, allergy);
        }
        let keywords = rules.allergy_keywords(allergy);
        let Some((term, keyword)) = find_term(&terms, &keywords, rules) else {
            continue;
        };

        let primary = term.role == TermRole::Primary;
        findings.push(HealthProfileInteraction {
            interaction_type: InteractionType::Allergy,
            item: allergy.to_string(),
            description: MessageTemplates::allergy(allergy, &query.name, &term.display, keyword),
            severity: if primary { Severity::Critical } else { Severity::High },
            recommendation: MessageTemplates::allergy_recommendation(primary),
        });
    }

    findings
}

// ---------------------------------------------------------------------------
// Medical conditions
// ---------------------------------------------------------------------------

pub fn detect_condition_interactions(
    query: &MedicineQuery,
    profile: &HealthProfile,
    rules: &InteractionRules,
) -> Vec<HealthProfileInteraction> {
    let terms = medicine_terms(query, rules);
    let mut findings = Vec::new();

    for condition in profile_items(&profile.medical_conditions) {
        let entries = rules.condition_entries(condition);
        if entries.is_empty() {
            log_gap(InteractionType::MedicalCondition, condition);
            continue;
        }

        let matched = entries.iter().find_map(|entry| {
            let keywords: Vec<String> = entry
                .keywords
                .iter()
                .flat_map(|k| rules.expand_keyword(k))
                .collect();
            find_term(&terms, &keywords, rules).map(|(term, _)| (entry, term.display.clone()))
        });

        if let Some((entry, ingredient)) = matched {
            findings.push(HealthProfileInteraction {
                interaction_type: InteractionType::MedicalCondition,
                item: condition.to_string(),
                description: MessageTemplates::condition(
                    &query.name,
                    condition,
                    &ingredient,
                    &entry.reason,
                ),
                severity: Severity::High,
                recommendation: MessageTemplates::condition_recommendation(condition),
            });
        }
    }

    findings
}

// ---------------------------------------------------------------------------
// Dietary restrictions
// ---------------------------------------------------------------------------

pub fn detect_dietary_interactions(
    query: &MedicineQuery,
    profile: &HealthProfile,
    rules: &InteractionRules,
) -> Vec<HealthProfileInteraction> {
    let terms = medicine_terms(query, rules);
    let mut findings = Vec::new();

    for restriction in profile_items(&profile.dietary_restrictions) {
        let entries = rules.dietary_entries(restriction);
        if entries.is_empty() {
            log_gap(InteractionType::DietaryRestriction, restriction);
            continue;
        }

        let matched = entries.iter().find(|entry| {
            let keywords: Vec<String> = entry
                .keywords
                .iter()
                .flat_map(|k| rules.expand_keyword(k))
                .collect();
            find_term(&terms, &keywords, rules).is_some()
        });

        if let Some(entry) = matched {
            findings.push(HealthProfileInteraction {
                interaction_type: InteractionType::DietaryRestriction,
                item: restriction.to_string(),
                description: MessageTemplates::dietary(&query.name, restriction, &entry.reason),
                severity: Severity::Moderate,
                recommendation: MessageTemplates::dietary_recommendation(restriction),
            });
        }
    }

    findings
}

// ---------------------------------------------------------------------------
// Current medications
// ---------------------------------------------------------------------------

/// Static table and duplicate therapy give moderate findings; only an
/// external signal flagging a severe interaction raises it to high.
pub fn detect_medication_interactions(
    query: &MedicineQuery,
    profile: &HealthProfile,
    rules: &InteractionRules,
    signal: Option<&dyn PairwiseSignal>,
) -> Vec<HealthProfileInteraction> {
    let terms = medicine_terms(query, rules);
    let mut findings = Vec::new();

    for current in &profile.current_medications {
        let current_name = current.name.trim();
        if current_name.is_empty() {
            continue;
        }

        let mut current_terms = vec![current_name.to_string()];
        if let Some(resolved) = rules.resolve_ingredients(current_name) {
            current_terms.extend(resolved.iter().cloned());
        }

        // (severity, description, severe)
        let mut best: Option<(Severity, String, bool)> = None;
        let mut consider = |severity: Severity, description: String, severe: bool| {
            if best.as_ref().map_or(true, |(s, _, _)| severity > *s) {
                best = Some((severity, description, severe));
            }
        };

        if let Some(term) = terms
            .iter()
            .find(|t| current_terms.iter().any(|c| names_match(c, &t.display)))
        {
            consider(
                Severity::Moderate,
                MessageTemplates::duplicate_therapy(&query.name, current_name, &term.display),
                false,
            );
        }

        for current_term in &current_terms {
            let interacting = rules.interacting_keywords(current_term);
            let hit = terms.iter().find_map(|t| {
                interacting
                    .iter()
                    .find(|(k, _)| rules.keyword_matches(&t.normalized, k))
                    .map(|(_, effect)| *effect)
            });
            if let Some(effect) = hit {
                consider(
                    Severity::Moderate,
                    MessageTemplates::medication_interaction(&query.name, current_name, effect),
                    false,
                );
                break;
            }
        }

        if let Some(signal) = signal {
            for term in &terms {
                if let Some(verdict) = signal.check(&term.display, current_name) {
                    let severity = if verdict.severe { Severity::High } else { Severity::Moderate };
                    consider(severity, verdict.description, verdict.severe);
                }
            }
        }

        if let Some((severity, description, severe)) = best {
            findings.push(HealthProfileInteraction {
                interaction_type: InteractionType::CurrentMedication,
                item: current_name.to_string(),
                description,
                severity,
                recommendation: MessageTemplates::medication_recommendation(severe),
            });
        }
    }

    findings
}
