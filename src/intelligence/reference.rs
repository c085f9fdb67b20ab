use std::collections::HashSet;

use serde::Deserialize;

use super::matching::{names_match, normalize, term_matches_keyword};
use super::types::IntelligenceError;

const BUNDLED_RULES: &str = include_str!("../../resources/interaction_rules.json");

/// A named group of ingredients ("statins", "penicillins").
#[derive(Debug, Clone, Deserialize)]
pub struct DrugClass {
    pub name: String,
    pub members: Vec<String>,
}

/// Brand-to-ingredient mapping, used when a medicine arrives without ingredients.
#[derive(Debug, Clone, Deserialize)]
pub struct BrandAlias {
    pub brand: String,
    pub ingredients: Vec<String>,
}

/// One allergy, condition or dietary restriction and the ingredient or
/// class keywords it conflicts with.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub keywords: Vec<String>,
    /// Plain-language reason, completes "This medicine ..." for conditions.
    #[serde(default)]
    pub reason: String,
}

impl RuleEntry {
    /// Whether a profile item refers to this entry.
    pub fn applies_to(&self, item: &str) -> bool {
        std::iter::once(&self.name)
            .chain(&self.aliases)
            .any(|n| names_match(n, item))
    }
}

/// Known interacting ingredient groups. Symmetric.
#[derive(Debug, Clone, Deserialize)]
pub struct DrugPair {
    pub drugs: Vec<String>,
    pub interacts_with: Vec<String>,
    pub effect: String,
}

/// Items the onboarding flow offers; every one must resolve to a table entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CanonicalItems {
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
}

/// Static reference tables consulted by the rule engine.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionRules {
    pub version: u32,
    #[serde(default)]
    pub canonical: CanonicalItems,
    pub drug_classes: Vec<DrugClass>,
    #[serde(default)]
    pub brand_aliases: Vec<BrandAlias>,
    pub allergies: Vec<RuleEntry>,
    pub conditions: Vec<RuleEntry>,
    pub dietary_restrictions: Vec<RuleEntry>,
    #[serde(default)]
    pub drug_pairs: Vec<DrugPair>,
}

impl InteractionRules {
    /// Load and validate the rules compiled into the crate.
    pub fn bundled() -> Result<Self, IntelligenceError> {
        let rules = Self::from_json(BUNDLED_RULES)?;
        rules.validate()?;
        tracing::debug!(
            version = rules.version,
            classes = rules.drug_classes.len(),
            conditions = rules.conditions.len(),
            "Loaded bundled interaction rules"
        );
        Ok(rules)
    }

    /// Parse rules without validating them.
    pub fn from_json(json: &str) -> Result<Self, IntelligenceError> {
        serde_json::from_str(json).map_err(|e| {
            IntelligenceError::ReferenceDataParse("interaction_rules.json".into(), e.to_string())
        })
    }

    /// Check the tables for completeness against the canonical item lists
    /// and for structural problems. All problems are reported together.
    pub fn validate(&self) -> Result<(), IntelligenceError> {
        let mut problems = Vec::new();

        check_coverage(&mut problems, "allergy", &self.canonical.allergies, &self.allergies);
        check_coverage(&mut problems, "condition", &self.canonical.conditions, &self.conditions);
        check_coverage(
            &mut problems,
            "dietary restriction",
            &self.canonical.dietary_restrictions,
            &self.dietary_restrictions,
        );

        check_entries(&mut problems, "allergy", &self.allergies);
        check_entries(&mut problems, "condition", &self.conditions);
        check_entries(&mut problems, "dietary restriction", &self.dietary_restrictions);

        let mut seen = HashSet::new();
        for class in &self.drug_classes {
            if !seen.insert(normalize(&class.name)) {
                problems.push(format!("drug class '{}' declared twice", class.name));
            }
            if class.members.iter().all(|m| m.trim().is_empty()) {
                problems.push(format!("drug class '{}' has no members", class.name));
            }
        }

        for alias in &self.brand_aliases {
            if alias.brand.trim().is_empty() || alias.ingredients.iter().all(|i| i.trim().is_empty()) {
                problems.push(format!("brand alias '{}' has no ingredients", alias.brand));
            }
        }

        for (i, pair) in self.drug_pairs.iter().enumerate() {
            if pair.drugs.is_empty() || pair.interacts_with.is_empty() {
                problems.push(format!("drug pair #{} has an empty side", i + 1));
            }
            if pair.effect.trim().is_empty() {
                problems.push(format!("drug pair #{} has no effect", i + 1));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(IntelligenceError::ReferenceDataInvalid(problems))
        }
    }

    /// Ingredients of a known brand, matched on the medicine name.
    pub fn resolve_ingredients(&self, name: &str) -> Option<&[String]> {
        self.brand_aliases
            .iter()
            .find(|a| names_match(&a.brand, name))
            .map(|a| a.ingredients.as_slice())
    }

    /// Whether a normalized keyword names a drug class.
    pub fn is_class(&self, keyword: &str) -> bool {
        self.drug_classes.iter().any(|c| normalize(&c.name) == keyword)
    }

    /// Match a normalized medicine term against a normalized keyword. Class
    /// names are matched only through their members or literally.
    pub fn keyword_matches(&self, term: &str, keyword: &str) -> bool {
        term_matches_keyword(term, keyword, self.is_class(keyword))
    }

    /// The keyword itself followed by the members of the class it names, if any.
    pub fn expand_keyword(&self, keyword: &str) -> Vec<String> {
        let keyword = normalize(keyword);
        let mut expanded = vec![keyword.clone()];
        if let Some(class) = self
            .drug_classes
            .iter()
            .find(|c| normalize(&c.name) == keyword)
        {
            expanded.extend(class.members.iter().map(|m| normalize(m)));
        }
        expanded
    }

    pub fn allergy_entries(&self, allergy: &str) -> Vec<&RuleEntry> {
        self.allergies.iter().filter(|e| e.applies_to(allergy)).collect()
    }

    pub fn condition_entries(&self, condition: &str) -> Vec<&RuleEntry> {
        self.conditions.iter().filter(|e| e.applies_to(condition)).collect()
    }

    pub fn dietary_entries(&self, restriction: &str) -> Vec<&RuleEntry> {
        self.dietary_restrictions
            .iter()
            .filter(|e| e.applies_to(restriction))
            .collect()
    }

    /// Ingredient keywords conflicting with an allergy. Always includes the
    /// allergy itself, so undeclared allergens still match by name.
    pub fn allergy_keywords(&self, allergy: &str) -> Vec<String> {
        let mut keywords = self.expand_keyword(allergy);
        keywords.extend(self.expand_entries(&self.allergy_entries(allergy)));
        dedup(keywords)
    }

    /// Ingredient keywords contraindicated for a condition; empty when the
    /// condition has no table entry.
    pub fn condition_keywords(&self, condition: &str) -> Vec<String> {
        dedup(self.expand_entries(&self.condition_entries(condition)))
    }

    pub fn dietary_keywords(&self, restriction: &str) -> Vec<String> {
        dedup(self.expand_entries(&self.dietary_entries(restriction)))
    }

    /// Keywords known to interact with `drug`, each with the effect text.
    pub fn interacting_keywords(&self, drug: &str) -> Vec<(String, &str)> {
        let drug = normalize(drug);
        let mut found: Vec<(String, &str)> = Vec::new();

        for pair in &self.drug_pairs {
            for (side, other) in [
                (&pair.drugs, &pair.interacts_with),
                (&pair.interacts_with, &pair.drugs),
            ] {
                let on_side = side
                    .iter()
                    .flat_map(|k| self.expand_keyword(k))
                    .any(|k| self.keyword_matches(&drug, &k));
                if !on_side {
                    continue;
                }
                for keyword in other.iter().flat_map(|k| self.expand_keyword(k)) {
                    if !found.iter().any(|(k, _)| *k == keyword) {
                        found.push((keyword, pair.effect.as_str()));
                    }
                }
            }
        }
        found
    }

    fn expand_entries(&self, entries: &[&RuleEntry]) -> Vec<String> {
        entries
            .iter()
            .flat_map(|e| e.keywords.iter())
            .flat_map(|k| self.expand_keyword(k))
            .collect()
    }
}

fn check_coverage(problems: &mut Vec<String>, kind: &str, canonical: &[String], entries: &[RuleEntry]) {
    for item in canonical {
        if !entries.iter().any(|e| e.applies_to(item)) {
            problems.push(format!("no {} entry for '{}'", kind, item));
        }
    }
}

fn check_entries(problems: &mut Vec<String>, kind: &str, entries: &[RuleEntry]) {
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.name.trim().is_empty() {
            problems.push(format!("{} entry with blank name", kind));
            continue;
        }
        if !seen.insert(normalize(&entry.name)) {
            problems.push(format!("{} '{}' declared twice", kind, entry.name));
        }
        if entry.keywords.is_empty() {
            problems.push(format!("{} '{}' has no keywords", kind, entry.name));
        }
        if entry.keywords.iter().any(|k| k.trim().is_empty()) {
            problems.push(format!("{} '{}' has a blank keyword", kind, entry.name));
        }
    }
}

fn dedup(keywords: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}
