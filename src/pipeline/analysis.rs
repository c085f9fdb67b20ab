use std::sync::Arc;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::intelligence::messages::MessageTemplates;
use crate::intelligence::reference::BrandAlias;
use crate::intelligence::{
    aggregate_for, assess_prescription, merge_findings, reconcile, search_metadata,
    InteractionEngine, MedicineQuery,
};
use crate::models::enums::{Reliability, RiskLevel};
use crate::models::{
    Citations, CombinedMedicine, HealthProfile, MedicalInfo, MedicineInput, MedicineSearchResult,
    OverallHealthAnalysis,
};

use super::enrichment::{EnrichmentResponse, EnrichmentService};
use super::openfda::{prefetch_pair_signals, AdverseEventSource};
use super::retry::call_with_retry;
use super::rxnorm::IngredientLookup;
use super::PipelineError;

/// Combine OCR lines with an enrichment response and the local rule engine.
///
/// Every line gets exactly one record. The engine's findings are merged with
/// whatever the service reported, then re-aggregated, so counts and risk
/// levels are always consistent with the findings actually listed.
pub fn analyze_prescription(
    original: &[MedicineInput],
    enrichment: &EnrichmentResponse,
    profile: &HealthProfile,
    engine: &InteractionEngine,
) -> MedicineSearchResult {
    let medicines: Vec<CombinedMedicine> = reconcile(original, &enrichment.medicines)
        .into_iter()
        .map(|mut combined| {
            let query = MedicineQuery::from_combined(&combined.prescription, &combined.medical_info);
            let local = engine.find_interactions(&query, profile);
            let reported = std::mem::take(&mut combined.medical_info.health_profile_interaction.interactions);
            combined.medical_info.health_profile_interaction =
                aggregate_for(&combined.prescription.name, merge_findings(local, reported));
            combined
        })
        .collect();

    let overall_health_analysis = assess_prescription(&medicines);
    let search_metadata = search_metadata(&medicines, enrichment.sources_count, enrichment.reliability);

    tracing::info!(
        medicines = medicines.len(),
        found = search_metadata.found_count,
        interactions = search_metadata.total_interactions,
        risk = %overall_health_analysis.risk_level,
        "Prescription analyzed"
    );

    MedicineSearchResult {
        medicines,
        search_metadata,
        citations: enrichment.citations.clone(),
        overall_health_analysis,
    }
}

/// Renderable result for a search that failed outright. Every line gets an
/// error placeholder and the prescription is reported as not assessable.
pub fn failed_result(original: &[MedicineInput], error: &PipelineError) -> MedicineSearchResult {
    let message = error.to_string();
    let medicines: Vec<CombinedMedicine> = original
        .iter()
        .map(|m| CombinedMedicine {
            prescription: m.clone(),
            medical_info: MedicalInfo::failed(&m.name, &message),
        })
        .collect();

    let mut metadata = search_metadata(&medicines, None, Some(Reliability::Failed));
    metadata.error = Some(message);
    if let PipelineError::ResponseParsing(detail) = error {
        metadata.parse_error = Some(detail.clone());
    }

    MedicineSearchResult {
        medicines,
        search_metadata: metadata,
        citations: Citations::default(),
        overall_health_analysis: OverallHealthAnalysis {
            risk_level: RiskLevel::Minimal,
            summary: MessageTemplates::analysis_failed(),
            key_recommendations: vec![MessageTemplates::default_recommendation()],
            requires_immediate_attention: false,
        },
    }
}

/// Runs the enrichment search under a timeout and retry policy and turns its
/// outcome into a result. Never fails: errors become [`failed_result`].
///
/// Optional drug-reference lookups run between the search and the rule
/// engine: ingredients for medicines nothing else resolves, and adverse-event
/// co-reports for each ingredient against the current medications.
pub struct PrescriptionAnalyzer {
    enrichment: Arc<dyn EnrichmentService>,
    engine: InteractionEngine,
    ingredients: Option<Arc<dyn IngredientLookup>>,
    adverse_events: Option<Arc<dyn AdverseEventSource>>,
    timeout: Duration,
    retries: usize,
}

impl PrescriptionAnalyzer {
    pub fn new(enrichment: Arc<dyn EnrichmentService>, engine: InteractionEngine) -> Self {
        let defaults = ServiceConfig::default();
        Self::from_config(enrichment, engine, &defaults)
    }

    pub fn from_config(
        enrichment: Arc<dyn EnrichmentService>,
        engine: InteractionEngine,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            enrichment,
            engine,
            ingredients: None,
            adverse_events: None,
            timeout: Duration::from_secs(config.request_timeout_secs),
            retries: config.max_retries,
        }
    }

    /// Resolve ingredients of medicines unknown to both the enrichment answer
    /// and the bundled brand table.
    pub fn with_ingredient_lookup(mut self, lookup: Arc<dyn IngredientLookup>) -> Self {
        self.ingredients = Some(lookup);
        self
    }

    /// Check adverse-event co-reports against the profile's current medications.
    pub fn with_adverse_events(mut self, source: Arc<dyn AdverseEventSource>) -> Self {
        self.adverse_events = Some(source);
        self
    }

    pub fn with_policy(mut self, timeout: Duration, retries: usize) -> Self {
        self.timeout = timeout;
        self.retries = retries;
        self
    }

    pub fn engine(&self) -> &InteractionEngine {
        &self.engine
    }

    /// Per-attempt timeout and retry count applied to service calls.
    pub fn policy(&self) -> (Duration, usize) {
        (self.timeout, self.retries)
    }

    pub async fn run(&self, medicines: &[MedicineInput], profile: &HealthProfile) -> MedicineSearchResult {
        if medicines.is_empty() {
            tracing::info!("No medications to search");
            return analyze_prescription(medicines, &EnrichmentResponse::default(), profile, &self.engine);
        }

        let outcome = call_with_retry("medicine search", self.timeout, self.retries, || {
            self.enrichment.search(medicines, profile)
        })
        .await;

        match outcome {
            Ok(enrichment) => {
                let engine = self.supplemented_engine(medicines, &enrichment, profile).await;
                analyze_prescription(medicines, &enrichment, profile, &engine)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    medicines = medicines.len(),
                    "Medicine search failed, returning placeholder result"
                );
                failed_result(medicines, &e)
            }
        }
    }

    /// The engine extended with whatever the drug-reference lookups found.
    /// Failed lookups are logged and leave the engine as it was.
    async fn supplemented_engine(
        &self,
        medicines: &[MedicineInput],
        enrichment: &EnrichmentResponse,
        profile: &HealthProfile,
    ) -> InteractionEngine {
        let wants_signals =
            self.adverse_events.is_some() && !profile.current_medications.is_empty();
        if self.ingredients.is_none() && !wants_signals {
            return self.engine.clone();
        }

        let mut aliases: Vec<BrandAlias> = Vec::new();
        let mut candidates: Vec<String> = Vec::new();

        for combined in reconcile(medicines, &enrichment.medicines) {
            let name = combined.prescription.name.trim();
            if name.is_empty() {
                continue;
            }

            let query = MedicineQuery::from_combined(&combined.prescription, &combined.medical_info);
            let mut ingredients: Vec<String> =
                query.ingredient_names().into_iter().map(str::to_string).collect();
            if ingredients.is_empty() {
                if let Some(resolved) = self.engine.rules().resolve_ingredients(name) {
                    ingredients = resolved.to_vec();
                }
            }
            if ingredients.is_empty() {
                if let Some(lookup) = &self.ingredients {
                    ingredients = self.look_up_ingredients(lookup.as_ref(), name).await;
                    if !ingredients.is_empty() {
                        aliases.push(BrandAlias {
                            brand: name.to_string(),
                            ingredients: ingredients.clone(),
                        });
                    }
                }
            }

            if ingredients.is_empty() {
                candidates.push(name.to_string());
            } else {
                candidates.extend(ingredients);
            }
        }

        let mut engine = self.engine.clone().with_aliases(aliases);

        if let Some(source) = self.adverse_events.as_ref().filter(|_| wants_signals) {
            let table = prefetch_pair_signals(
                source.as_ref(),
                &candidates,
                &profile.current_medications,
                self.timeout,
                self.retries,
            )
            .await;
            if !table.is_empty() {
                engine = engine.with_signal(table);
            }
        }

        engine
    }

    async fn look_up_ingredients(&self, lookup: &dyn IngredientLookup, name: &str) -> Vec<String> {
        match call_with_retry("ingredient lookup", self.timeout, self.retries, || lookup.ingredients(name)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(medicine = %name, error = %e, "Ingredient lookup failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intelligence::InteractionRules;
    use crate::models::enums::{InteractionType, SearchStatus, Severity};
    use crate::models::CurrentMedication;
    use crate::pipeline::enrichment::{parse_enrichment_response, MockEnrichmentService};
    use crate::pipeline::openfda::MockAdverseEvents;
    use crate::pipeline::rxnorm::MockIngredientLookup;

    const ANSWER: &str = r#"{
        "medicines": [
            {
                "name": "Pan-D",
                "activeIngredients": [{"name": "Pantoprazole"}, {"name": "Domperidone"}]
            },
            {
                "name": "Augmentin",
                "activeIngredients": [{"name": "Amoxicillin"}, {"name": "Clavulanic Acid"}],
                "healthProfileInteraction": {
                    "hasInteractions": true,
                    "criticalCount": 5,
                    "interactions": [
                        {"type": "allergy", "item": "penicillin", "severity": "high",
                         "description": "Penicillin class antibiotic", "recommendation": "Avoid"},
                        {"type": "medical_condition", "item": "Pregnancy", "severity": "info",
                         "description": "Generally considered safe", "recommendation": ""}
                    ],
                    "overallRisk": "low"
                }
            }
        ],
        "searchMetadata": {"sourcesCount": 4, "reliability": "high"}
    }"#;

    fn engine() -> InteractionEngine {
        InteractionEngine::new(InteractionRules::bundled().unwrap())
    }

    fn profile() -> HealthProfile {
        HealthProfile {
            allergies: vec!["Penicillin".into()],
            dietary_restrictions: vec!["Alcohol".into()],
            ..Default::default()
        }
    }

    fn lines() -> Vec<MedicineInput> {
        let mut hexigel = MedicineInput::named("Hexigel gum paint");
        hexigel.uncertain = true;
        vec![
            MedicineInput::named("Augmentin 625mg"),
            hexigel,
            MedicineInput::named("Pan-D 40mg"),
        ]
    }

    #[test]
    fn merges_engine_and_service_findings() {
        let enrichment = parse_enrichment_response(ANSWER).unwrap();
        let result = analyze_prescription(&lines(), &enrichment, &profile(), &engine());

        assert_eq!(result.medicines.len(), 3);

        let augmentin = &result.medicines[0].medical_info;
        assert_eq!(augmentin.name, "Augmentin");
        let analysis = &augmentin.health_profile_interaction;
        assert_eq!(analysis.interactions.len(), 2);
        assert_eq!(analysis.interactions[0].interaction_type, InteractionType::Allergy);
        assert_eq!(analysis.interactions[0].severity, Severity::Critical);
        assert_eq!(analysis.critical_count, 1);
        assert_eq!(analysis.counted_total(), 1);
        assert_eq!(analysis.overall_risk, RiskLevel::Critical);

        let hexigel = &result.medicines[1].medical_info;
        assert_eq!(hexigel.search_status, Some(SearchStatus::NotFound));
        assert_eq!(hexigel.health_profile_interaction.overall_risk, RiskLevel::Moderate);
        assert_eq!(
            hexigel.health_profile_interaction.interactions[0].interaction_type,
            InteractionType::DietaryRestriction
        );

        let pan_d = &result.medicines[2].medical_info;
        assert_eq!(pan_d.name, "Pan-D");
        assert_eq!(pan_d.health_profile_interaction.overall_risk, RiskLevel::Minimal);

        assert_eq!(result.overall_health_analysis.risk_level, RiskLevel::Critical);
        assert!(result.requires_immediate_attention());
        assert_eq!(result.search_metadata.original_count, 3);
        assert_eq!(result.search_metadata.found_count, 2);
        assert_eq!(result.search_metadata.total_interactions, 3);
        assert_eq!(result.search_metadata.critical_interactions, 1);
        assert_eq!(result.search_metadata.sources_count, Some(4));
        assert_eq!(result.search_metadata.reliability, Some(Reliability::High));
        assert_eq!(result.uncertain_medicines().len(), 1);
    }

    #[test]
    fn empty_enrichment_still_runs_local_rules() {
        let result = analyze_prescription(&lines(), &EnrichmentResponse::default(), &profile(), &engine());
        assert_eq!(result.medicines.len(), 3);
        assert!(result
            .medicines
            .iter()
            .all(|m| m.medical_info.search_status == Some(SearchStatus::NotFound)));
        assert_eq!(
            result.medicines[0].medical_info.health_profile_interaction.overall_risk,
            RiskLevel::Critical
        );
        assert_eq!(result.search_metadata.found_count, 0);
    }

    #[test]
    fn failure_result_is_complete_and_minimal() {
        let error = PipelineError::HttpClient("connection reset".into());
        let result = failed_result(&lines(), &error);

        assert_eq!(result.medicines.len(), 3);
        for (combined, line) in result.medicines.iter().zip(lines()) {
            assert_eq!(combined.prescription, line);
            assert_eq!(combined.medical_info.search_status, Some(SearchStatus::Error));
            assert!(combined.medical_info.error.as_deref().unwrap().contains("connection reset"));
        }
        assert_eq!(result.overall_health_analysis.risk_level, RiskLevel::Minimal);
        assert!(!result.requires_immediate_attention());
        assert_eq!(result.search_metadata.reliability, Some(Reliability::Failed));
        assert_eq!(result.search_metadata.found_count, 0);
        assert!(result.search_metadata.error.is_some());
        assert!(result.search_metadata.parse_error.is_none());
    }

    #[tokio::test]
    async fn malformed_answer_degrades_to_placeholders() {
        let mock = Arc::new(MockEnrichmentService::new("Here is what I found: Augmentin is..."));
        let analyzer = PrescriptionAnalyzer::new(mock.clone(), engine());

        let result = analyzer.run(&lines(), &profile()).await;
        assert_eq!(mock.call_count(), 1);
        assert_eq!(result.medicines.len(), 3);
        assert!(result.search_metadata.parse_error.is_some());
        assert_eq!(result.search_metadata.reliability, Some(Reliability::Failed));
        assert_eq!(result.overall_health_analysis.risk_level, RiskLevel::Minimal);
    }

    #[tokio::test]
    async fn transport_failure_is_retried_once() {
        let mock = Arc::new(MockEnrichmentService::failing("connection reset"));
        let analyzer =
            PrescriptionAnalyzer::new(mock.clone(), engine()).with_policy(Duration::from_secs(1), 1);

        let result = analyzer.run(&lines(), &profile()).await;
        assert_eq!(mock.call_count(), 2);
        assert!(result
            .medicines
            .iter()
            .all(|m| m.medical_info.search_status == Some(SearchStatus::Error)));
    }

    #[tokio::test]
    async fn empty_prescription_skips_search() {
        let mock = Arc::new(MockEnrichmentService::new(ANSWER));
        let analyzer = PrescriptionAnalyzer::new(mock.clone(), engine());

        let result = analyzer.run(&[], &profile()).await;
        assert_eq!(mock.call_count(), 0);
        assert!(result.medicines.is_empty());
        assert_eq!(result.overall_health_analysis.risk_level, RiskLevel::Minimal);
    }

    #[tokio::test]
    async fn successful_run_matches_direct_analysis() {
        let mock = Arc::new(MockEnrichmentService::new(ANSWER));
        let analyzer = PrescriptionAnalyzer::new(mock, engine());

        let result = analyzer.run(&lines(), &profile()).await;
        let direct = analyze_prescription(
            &lines(),
            &parse_enrichment_response(ANSWER).unwrap(),
            &profile(),
            analyzer.engine(),
        );
        assert_eq!(result.medicines, direct.medicines);
        assert_eq!(result.overall_health_analysis, direct.overall_health_analysis);
    }

    #[tokio::test]
    async fn adverse_event_reports_add_medication_findings() {
        let source = Arc::new(MockAdverseEvents::new(&[("pantoprazole", "metformin")]));
        let analyzer = PrescriptionAnalyzer::new(Arc::new(MockEnrichmentService::new(ANSWER)), engine())
            .with_adverse_events(source.clone());
        let profile = HealthProfile {
            current_medications: vec![CurrentMedication::named("Metformin")],
            ..Default::default()
        };

        let result = analyzer.run(&lines(), &profile).await;
        // amoxicillin, clavulanic acid, metronidazole, chlorhexidine, pantoprazole, domperidone
        assert_eq!(source.call_count(), 6);

        let pan_d = &result.medicines[2].medical_info.health_profile_interaction;
        assert_eq!(pan_d.interactions.len(), 1);
        assert_eq!(pan_d.interactions[0].interaction_type, InteractionType::CurrentMedication);
        assert_eq!(pan_d.interactions[0].severity, Severity::Moderate);
        assert_eq!(
            pan_d.interactions[0].description,
            "Potential interaction detected between Pantoprazole and Metformin"
        );
        assert!(result.medicines[1]
            .medical_info
            .health_profile_interaction
            .interactions
            .is_empty());
    }

    #[tokio::test]
    async fn adverse_events_skipped_without_current_medications() {
        let source = Arc::new(MockAdverseEvents::new(&[("pantoprazole", "metformin")]));
        let analyzer = PrescriptionAnalyzer::new(Arc::new(MockEnrichmentService::new(ANSWER)), engine())
            .with_adverse_events(source.clone());

        analyzer.run(&lines(), &profile()).await;
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn unreachable_adverse_events_leave_result_unchanged() {
        let source = Arc::new(MockAdverseEvents::unreachable("https://api.fda.gov"));
        let analyzer = PrescriptionAnalyzer::new(Arc::new(MockEnrichmentService::new(ANSWER)), engine())
            .with_adverse_events(source.clone())
            .with_policy(Duration::from_secs(1), 0);
        let profile = HealthProfile {
            current_medications: vec![CurrentMedication::named("Warfarin")],
            ..profile()
        };

        let result = analyzer.run(&lines(), &profile).await;
        let direct = analyze_prescription(
            &lines(),
            &parse_enrichment_response(ANSWER).unwrap(),
            &profile,
            &engine(),
        );
        assert_eq!(source.call_count(), 6);
        assert_eq!(result.medicines, direct.medicines);
    }

    #[tokio::test]
    async fn unknown_medicine_ingredients_come_from_lookup() {
        let lines = vec![
            MedicineInput::named("Augmentin 625mg"),
            MedicineInput::named("Moxikind-CV 625"),
            MedicineInput::named("Pan-D 40mg"),
        ];
        let lookup = Arc::new(
            MockIngredientLookup::new().with_medicine("Moxikind-CV", &["Amoxicillin", "Clavulanate"]),
        );
        let plain = PrescriptionAnalyzer::new(Arc::new(MockEnrichmentService::new(ANSWER)), engine());
        let analyzer = PrescriptionAnalyzer::new(Arc::new(MockEnrichmentService::new(ANSWER)), engine())
            .with_ingredient_lookup(lookup.clone());

        let before = plain.run(&lines, &profile()).await;
        assert_eq!(
            before.medicines[1].medical_info.health_profile_interaction.overall_risk,
            RiskLevel::Minimal
        );

        let result = analyzer.run(&lines, &profile()).await;
        assert_eq!(lookup.call_count(), 1);
        let moxikind = &result.medicines[1].medical_info;
        assert_eq!(moxikind.search_status, Some(SearchStatus::NotFound));
        assert_eq!(moxikind.health_profile_interaction.overall_risk, RiskLevel::Critical);
        assert_eq!(
            moxikind.health_profile_interaction.interactions[0].interaction_type,
            InteractionType::Allergy
        );
        assert!(analyzer
            .engine()
            .rules()
            .resolve_ingredients("Moxikind-CV 625")
            .is_none());
    }
}
