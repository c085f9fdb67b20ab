use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        $(#[$meta])*
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(
    /// Severity of a single interaction finding. Declared low to high so that
    /// `Ord` follows clinical weight.
    #[derive(PartialOrd, Ord)]
    Severity {
        Info => "info",
        Low => "low",
        Moderate => "moderate",
        High => "high",
        Critical => "critical",
    }
);

str_enum!(
    /// Rolled-up risk for one medicine or a whole prescription.
    #[derive(PartialOrd, Ord)]
    RiskLevel {
        Minimal => "minimal",
        Low => "low",
        Moderate => "moderate",
        High => "high",
        Critical => "critical",
    }
);

str_enum!(InteractionType {
    Allergy => "allergy",
    MedicalCondition => "medical_condition",
    CurrentMedication => "current_medication",
    DietaryRestriction => "dietary_restriction",
});

str_enum!(SearchStatus {
    Found => "found",
    NotFound => "not_found",
    Error => "error",
});

str_enum!(Reliability {
    High => "high",
    Medium => "medium",
    Low => "low",
    Failed => "failed",
});

str_enum!(PrescriptionStatus {
    Active => "active",
    Completed => "completed",
    Inactive => "inactive",
    Abandoned => "abandoned",
});

impl Severity {
    /// Parse free-form severity text coming from an external service.
    /// Accepts the drug-interaction vocabulary (minor/major/contraindicated)
    /// as well as our own. Phrases like "moderate to high" take their highest
    /// severity word; other unrecognised text is treated as moderate, so an
    /// unfamiliar label never hides a finding from the risk counts.
    pub fn parse_lenient(s: &str) -> Self {
        let text = s.trim().to_lowercase();
        if let Some(severity) = Self::from_word(&text) {
            return severity;
        }

        let graded = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .filter_map(Self::from_word)
            .max();
        graded.unwrap_or_else(|| {
            tracing::warn!(severity = %s, "Unrecognised severity, treating as moderate");
            Self::Moderate
        })
    }

    fn from_word(word: &str) -> Option<Self> {
        match word {
            "critical" | "contraindicated" | "life-threatening" | "life_threatening" => {
                Some(Self::Critical)
            }
            "high" | "major" | "severe" | "serious" => Some(Self::High),
            "moderate" | "medium" => Some(Self::Moderate),
            "low" | "minor" | "mild" => Some(Self::Low),
            "" | "info" | "informational" | "none" => Some(Self::Info),
            _ => None,
        }
    }

    /// Whether this severity contributes to the numeric risk counts.
    pub fn is_risk_contributing(&self) -> bool {
        !matches!(self, Self::Info)
    }
}

impl RiskLevel {
    /// Risk implied by the highest severity present; `info` carries no risk.
    pub fn from_severity(severity: Option<Severity>) -> Self {
        match severity {
            Some(Severity::Critical) => Self::Critical,
            Some(Severity::High) => Self::High,
            Some(Severity::Moderate) => Self::Moderate,
            Some(Severity::Low) => Self::Low,
            Some(Severity::Info) | None => Self::Minimal,
        }
    }

    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" | "major" | "severe" => Self::High,
            "moderate" | "medium" => Self::Moderate,
            "low" | "minor" => Self::Low,
            _ => Self::Minimal,
        }
    }
}

impl InteractionType {
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "allergy" | "drug_allergy" => Some(Self::Allergy),
            "medical_condition" | "condition" | "drug_condition" => Some(Self::MedicalCondition),
            "current_medication" | "medication" | "drug_drug" => Some(Self::CurrentMedication),
            "dietary_restriction" | "diet" | "food" | "drug_food" => {
                Some(Self::DietaryRestriction)
            }
            _ => None,
        }
    }
}

impl Reliability {
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" | "moderate" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn severity_round_trip() {
        for (variant, s) in [
            (Severity::Info, "info"),
            (Severity::Low, "low"),
            (Severity::Moderate, "moderate"),
            (Severity::High, "high"),
            (Severity::Critical, "critical"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Severity::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Moderate);
        assert!(Severity::Moderate < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn risk_level_ordering_and_mapping() {
        assert!(RiskLevel::Minimal < RiskLevel::Low);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert_eq!(RiskLevel::from_severity(None), RiskLevel::Minimal);
        assert_eq!(RiskLevel::from_severity(Some(Severity::Info)), RiskLevel::Minimal);
        assert_eq!(RiskLevel::from_severity(Some(Severity::High)), RiskLevel::High);
    }

    #[test]
    fn interaction_type_serializes_snake_case() {
        let json = serde_json::to_string(&InteractionType::MedicalCondition).unwrap();
        assert_eq!(json, "\"medical_condition\"");
        let parsed: InteractionType = serde_json::from_str("\"dietary_restriction\"").unwrap();
        assert_eq!(parsed, InteractionType::DietaryRestriction);
    }

    #[test]
    fn lenient_severity_vocabulary() {
        assert_eq!(Severity::parse_lenient("Contraindicated"), Severity::Critical);
        assert_eq!(Severity::parse_lenient("MAJOR"), Severity::High);
        assert_eq!(Severity::parse_lenient("minor"), Severity::Low);
        assert_eq!(Severity::parse_lenient(" "), Severity::Info);
        assert_eq!(Severity::parse_lenient("Informational"), Severity::Info);
    }

    #[test]
    fn unfamiliar_severity_is_never_downgraded_to_info() {
        assert_eq!(Severity::parse_lenient("High Risk"), Severity::High);
        assert_eq!(Severity::parse_lenient("moderate to high"), Severity::High);
        assert_eq!(Severity::parse_lenient("mild-to-moderate"), Severity::Moderate);
        assert_eq!(Severity::parse_lenient("significant"), Severity::Moderate);
        assert_eq!(Severity::parse_lenient("whatever"), Severity::Moderate);
    }

    #[test]
    fn lenient_interaction_type() {
        assert_eq!(
            InteractionType::parse_lenient("drug-food"),
            Some(InteractionType::DietaryRestriction)
        );
        assert_eq!(
            InteractionType::parse_lenient("Medical Condition"),
            Some(InteractionType::MedicalCondition)
        );
        assert_eq!(InteractionType::parse_lenient("unknown"), None);
    }

    #[test]
    fn prescription_status_round_trip() {
        for (variant, s) in [
            (PrescriptionStatus::Active, "active"),
            (PrescriptionStatus::Completed, "completed"),
            (PrescriptionStatus::Inactive, "inactive"),
            (PrescriptionStatus::Abandoned, "abandoned"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(PrescriptionStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(Severity::from_str("severe").is_err());
        assert!(PrescriptionStatus::from_str("").is_err());
        assert!(SearchStatus::from_str("missing").is_err());
    }
}
