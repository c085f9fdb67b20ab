use serde::{Deserialize, Deserializer, Serialize};

use super::lenient::{skip_invalid, text};

/// User-declared health profile. Every list defaults to empty so matching
/// code can iterate without checking for absence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthProfile {
    #[serde(default, deserialize_with = "skip_invalid")]
    pub allergies: Vec<String>,
    #[serde(default, deserialize_with = "skip_invalid")]
    pub medical_conditions: Vec<String>,
    #[serde(default, deserialize_with = "skip_invalid")]
    pub current_medications: Vec<CurrentMedication>,
    #[serde(default, deserialize_with = "skip_invalid")]
    pub dietary_restrictions: Vec<String>,
    #[serde(default, deserialize_with = "text")]
    pub additional_notes: String,
}

impl HealthProfile {
    pub fn is_empty(&self) -> bool {
        self.allergies.is_empty()
            && self.medical_conditions.is_empty()
            && self.current_medications.is_empty()
            && self.dietary_restrictions.is_empty()
    }

    /// Total number of declared profile items the analyzer can match against.
    pub fn item_count(&self) -> usize {
        self.allergies.len()
            + self.medical_conditions.len()
            + self.current_medications.len()
            + self.dietary_restrictions.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrentMedication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
}

impl CurrentMedication {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dosage: String::new(),
            frequency: String::new(),
        }
    }
}

/// Older profiles stored current medications as bare names.
impl<'de> Deserialize<'de> for CurrentMedication {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Full {
            #[serde(default, deserialize_with = "text")]
            name: String,
            #[serde(default, deserialize_with = "text")]
            dosage: String,
            #[serde(default, deserialize_with = "text")]
            frequency: String,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Name(String),
            Full(Full),
        }

        Ok(match Shape::deserialize(deserializer)? {
            Shape::Name(name) => Self::named(&name),
            Shape::Full(f) => Self {
                name: f.name,
                dosage: f.dosage,
                frequency: f.frequency,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_null_lists_default_to_empty() {
        let profile: HealthProfile =
            serde_json::from_str(r#"{"allergies": null, "additionalNotes": null}"#).unwrap();
        assert!(profile.allergies.is_empty());
        assert!(profile.medical_conditions.is_empty());
        assert!(profile.current_medications.is_empty());
        assert!(profile.dietary_restrictions.is_empty());
        assert_eq!(profile.additional_notes, "");
        assert!(profile.is_empty());
    }

    #[test]
    fn current_medications_accept_names_and_objects() {
        let profile: HealthProfile = serde_json::from_str(
            r#"{"currentMedications": ["Warfarin", {"name": "Metformin", "dosage": "500mg", "frequency": "Twice a day"}, 42]}"#,
        )
        .unwrap();
        assert_eq!(profile.current_medications.len(), 2);
        assert_eq!(profile.current_medications[0].name, "Warfarin");
        assert_eq!(profile.current_medications[1].dosage, "500mg");
    }

    #[test]
    fn serializes_camel_case() {
        let profile = HealthProfile {
            medical_conditions: vec!["Asthma".into()],
            ..Default::default()
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["medicalConditions"][0], "Asthma");
        assert!(json["currentMedications"].as_array().unwrap().is_empty());
        assert_eq!(profile.item_count(), 1);
    }
}
