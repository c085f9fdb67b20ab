use std::sync::Arc;

use crate::models::{HealthProfile, HealthProfileInteraction, InteractionAnalysis};

use super::detection::{
    detect_allergy_interactions, detect_condition_interactions, detect_dietary_interactions,
    detect_medication_interactions,
};
use super::reference::{BrandAlias, InteractionRules};
use super::risk::aggregate_for;
use super::signal::PairwiseSignal;
use super::types::MedicineQuery;

/// Rule engine over the static reference tables, with optional external
/// drug-drug signals. Holds no mutable state; cheap to clone and share.
#[derive(Clone)]
pub struct InteractionEngine {
    rules: Arc<InteractionRules>,
    signals: Vec<Arc<dyn PairwiseSignal>>,
}

impl InteractionEngine {
    pub fn new(rules: InteractionRules) -> Self {
        Self {
            rules: Arc::new(rules),
            signals: Vec::new(),
        }
    }

    /// Add a drug-drug signal. Signals are consulted in the order added and
    /// the first verdict for a pair wins.
    pub fn with_signal(mut self, signal: impl PairwiseSignal + 'static) -> Self {
        self.signals.push(Arc::new(signal));
        self
    }

    /// Extend the brand table, e.g. with ingredients looked up for names the
    /// bundled table does not know. Other clones of the engine are unaffected.
    pub fn with_aliases(mut self, aliases: Vec<BrandAlias>) -> Self {
        if !aliases.is_empty() {
            Arc::make_mut(&mut self.rules).brand_aliases.extend(aliases);
        }
        self
    }

    pub fn rules(&self) -> &InteractionRules {
        &self.rules
    }

    /// All findings for one medicine against the profile, in category order:
    /// allergies, current medications, conditions, diet.
    pub fn find_interactions(
        &self,
        medicine: &MedicineQuery,
        profile: &HealthProfile,
    ) -> Vec<HealthProfileInteraction> {
        if profile.is_empty() {
            return Vec::new();
        }

        let allergies = detect_allergy_interactions(medicine, profile, &self.rules);
        let signal = (!self.signals.is_empty()).then_some(&self.signals as &dyn PairwiseSignal);
        let medications = detect_medication_interactions(medicine, profile, &self.rules, signal);
        let conditions = detect_condition_interactions(medicine, profile, &self.rules);
        let dietary = detect_dietary_interactions(medicine, profile, &self.rules);

        tracing::debug!(
            medicine = %medicine.name,
            allergies = allergies.len(),
            medications = medications.len(),
            conditions = conditions.len(),
            dietary = dietary.len(),
            "Interaction rules evaluated"
        );

        allergies
            .into_iter()
            .chain(medications)
            .chain(conditions)
            .chain(dietary)
            .collect()
    }

    /// Findings rolled up into a per-medicine analysis.
    pub fn analyze(&self, medicine: &MedicineQuery, profile: &HealthProfile) -> InteractionAnalysis {
        aggregate_for(&medicine.name, self.find_interactions(medicine, profile))
    }
}

impl std::fmt::Debug for InteractionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionEngine")
            .field("rules_version", &self.rules.version)
            .field("signals", &self.signals.len())
            .finish()
    }
}
