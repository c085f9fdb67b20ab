use serde::{Deserialize, Deserializer, Serialize};

use super::lenient::{null_to_default, opt_number, opt_text, text};

/// One medication line as extracted by OCR.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MedicineInput {
    pub name: String,
    pub dosage: Option<String>,
    pub quantity: Option<f64>,
    pub frequency: String,
    pub duration: String,
    pub instructions: String,
    /// Low-confidence extraction. Must be shown to the user, never dropped.
    pub uncertain: bool,
}

/// OCR output lists medications either as bare names or as objects.
impl<'de> Deserialize<'de> for MedicineInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Full {
            #[serde(default, deserialize_with = "text")]
            name: String,
            #[serde(default, deserialize_with = "opt_text")]
            dosage: Option<String>,
            #[serde(default, deserialize_with = "opt_number")]
            quantity: Option<f64>,
            #[serde(default, deserialize_with = "text")]
            frequency: String,
            #[serde(default, deserialize_with = "text")]
            duration: String,
            #[serde(default, deserialize_with = "text")]
            instructions: String,
            #[serde(default, deserialize_with = "null_to_default")]
            uncertain: bool,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Name(String),
            Full(Full),
        }

        Ok(match Shape::deserialize(deserializer)? {
            Shape::Name(name) => Self::named(name.trim()),
            Shape::Full(f) => Self {
                name: f.name,
                dosage: f.dosage,
                quantity: f.quantity,
                frequency: f.frequency,
                duration: f.duration,
                instructions: f.instructions,
                uncertain: f.uncertain,
            },
        })
    }
}

impl MedicineInput {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// "Name (dosage)" as used in prompts and logs.
    pub fn label(&self) -> String {
        format!(
            "\"{}\" ({})",
            self.name,
            self.dosage.as_deref().unwrap_or("standard dosage")
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveIngredient {
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub strength: String,
    #[serde(default, deserialize_with = "text")]
    pub purpose: String,
}

impl ActiveIngredient {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_line_tolerates_loose_types() {
        let med: MedicineInput = serde_json::from_str(
            r#"{"name": "Augmentin 625mg", "dosage": null, "quantity": "10", "frequency": null, "uncertain": true}"#,
        )
        .unwrap();
        assert_eq!(med.name, "Augmentin 625mg");
        assert_eq!(med.dosage, None);
        assert_eq!(med.quantity, Some(10.0));
        assert_eq!(med.frequency, "");
        assert!(med.uncertain);
    }

    #[test]
    fn bare_name_is_a_medicine_line() {
        let med: MedicineInput = serde_json::from_str(r#"" Augmentin 625 ""#).unwrap();
        assert_eq!(med, MedicineInput::named("Augmentin 625"));
        assert!(serde_json::from_str::<MedicineInput>("42").is_err());
    }

    #[test]
    fn label_falls_back_to_standard_dosage() {
        assert_eq!(MedicineInput::named("Pan-D").label(), "\"Pan-D\" (standard dosage)");
    }
}
