use thiserror::Error;

use crate::models::{ActiveIngredient, MedicalInfo, MedicineInput};

// ---------------------------------------------------------------------------
// IntelligenceError
// ---------------------------------------------------------------------------

/// Errors are limited to loading reference data. The analysis itself is total.
#[derive(Error, Debug)]
pub enum IntelligenceError {
    #[error("Reference data parse failed ({0}): {1}")]
    ReferenceDataParse(String, String),

    #[error("Reference data invalid: {}", .0.join("; "))]
    ReferenceDataInvalid(Vec<String>),
}

// ---------------------------------------------------------------------------
// MedicineQuery
// ---------------------------------------------------------------------------

/// The part of a medicine the rule engine looks at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MedicineQuery {
    pub name: String,
    /// Declared ingredients, primary first. May be empty.
    pub active_ingredients: Vec<ActiveIngredient>,
}

impl MedicineQuery {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            active_ingredients: Vec::new(),
        }
    }

    pub fn with_ingredients(name: &str, ingredients: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            active_ingredients: ingredients
                .iter()
                .map(|i| ActiveIngredient::named(i))
                .collect(),
        }
    }

    /// Query from an OCR line joined with its enrichment record.
    pub fn from_combined(prescription: &MedicineInput, info: &MedicalInfo) -> Self {
        Self {
            name: prescription.name.clone(),
            active_ingredients: info.active_ingredients.clone(),
        }
    }

    /// Declared ingredient names, blanks removed, in declaration order.
    pub fn ingredient_names(&self) -> Vec<&str> {
        self.active_ingredients
            .iter()
            .map(|i| i.name.trim())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ingredients_are_ignored() {
        let query = MedicineQuery::with_ingredients("Enzoflam", &["Diclofenac", "  ", "Paracetamol"]);
        assert_eq!(query.ingredient_names(), vec!["Diclofenac", "Paracetamol"]);
    }

    #[test]
    fn combined_query_uses_ocr_name() {
        let info = MedicalInfo {
            name: "Pan-D Capsule".into(),
            active_ingredients: vec![ActiveIngredient::named("Pantoprazole")],
            ..Default::default()
        };
        let query = MedicineQuery::from_combined(&MedicineInput::named("Pan-D 40mg"), &info);
        assert_eq!(query.name, "Pan-D 40mg");
        assert_eq!(query.ingredient_names(), vec!["Pantoprazole"]);

        let placeholder = MedicalInfo::not_found("Pan-D 40mg");
        let bare = MedicineQuery::from_combined(&MedicineInput::named("Pan-D 40mg"), &placeholder);
        assert!(bare.ingredient_names().is_empty());
    }

    #[test]
    fn invalid_reference_error_lists_problems() {
        let err = IntelligenceError::ReferenceDataInvalid(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Reference data invalid: a; b");
    }
}
