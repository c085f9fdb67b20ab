//! Scan flow: pick an image, confirm it, then extract and analyze.
//!
//! `Select -> Preview -> Results`, with `cancel` returning to `Select` from
//! anywhere. Only `analyze` touches the network; an OCR failure leaves the
//! session in `Preview` with a message so the user can try again.

use crate::models::{HealthProfile, MedicineSearchResult, NewPrescription, PrescriptionData};

use super::analysis::PrescriptionAnalyzer;
use super::ocr::{OcrService, ScanImage};
use super::retry::call_with_retry;
use super::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    Select,
    Preview,
    Results,
}

impl ScanStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Preview => "preview",
            Self::Results => "results",
        }
    }
}

#[derive(Debug)]
pub struct ScanSession {
    step: ScanStep,
    image: Option<ScanImage>,
    ocr_result: Option<PrescriptionData>,
    search_result: Option<MedicineSearchResult>,
    error: Option<String>,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            step: ScanStep::Select,
            image: None,
            ocr_result: None,
            search_result: None,
            error: None,
        }
    }

    pub fn step(&self) -> ScanStep {
        self.step
    }

    pub fn image(&self) -> Option<&ScanImage> {
        self.image.as_ref()
    }

    pub fn ocr_result(&self) -> Option<&PrescriptionData> {
        self.ocr_result.as_ref()
    }

    pub fn result(&self) -> Option<&MedicineSearchResult> {
        self.search_result.as_ref()
    }

    /// Message from the last failed extraction, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Choose an image to scan. Picking again in `Preview` replaces it.
    pub fn select_image(&mut self, image: ScanImage) -> Result<(), PipelineError> {
        if self.step == ScanStep::Results {
            return Err(self.invalid("select an image"));
        }
        self.clear_results();
        self.image = Some(image);
        self.step = ScanStep::Preview;
        Ok(())
    }

    /// Drop everything and return to image selection.
    pub fn cancel(&mut self) {
        if self.step != ScanStep::Select {
            tracing::debug!(from = self.step.as_str(), "Scan cancelled");
        }
        *self = Self::new();
    }

    /// Extract the prescription from the chosen image and analyze it against
    /// the profile. On OCR failure the session stays in `Preview`.
    pub async fn analyze(
        &mut self,
        ocr: &dyn OcrService,
        analyzer: &PrescriptionAnalyzer,
        profile: &HealthProfile,
    ) -> Result<&MedicineSearchResult, PipelineError> {
        if self.step != ScanStep::Preview {
            return Err(self.invalid("analyze"));
        }
        let Some(image) = self.image.as_ref() else {
            return Err(self.invalid("analyze"));
        };

        self.error = None;
        let (timeout, retries) = analyzer.policy();
        let extracted = call_with_retry("prescription extraction", timeout, retries, || {
            ocr.extract(image)
        })
        .await;

        let data = match extracted {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "Prescription extraction failed");
                self.error = Some(e.user_message());
                return Err(e);
            }
        };

        let result = analyzer.run(&data.medications, profile).await;
        self.ocr_result = Some(data);
        self.step = ScanStep::Results;
        Ok(self.search_result.insert(result))
    }

    /// Record for saving the finished scan.
    pub fn new_prescription(&self, user_id: &str, object_key: &str) -> Result<NewPrescription, PipelineError> {
        match (&self.step, &self.image, &self.ocr_result) {
            (ScanStep::Results, Some(image), Some(ocr_result)) => Ok(NewPrescription {
                user_id: user_id.to_string(),
                image: image.uri.clone(),
                object_key: object_key.to_string(),
                ocr_result: ocr_result.clone(),
                search_result: self.search_result.clone(),
            }),
            _ => Err(self.invalid("save")),
        }
    }

    fn clear_results(&mut self) {
        self.ocr_result = None;
        self.search_result = None;
        self.error = None;
    }

    fn invalid(&self, action: &'static str) -> PipelineError {
        PipelineError::InvalidTransition {
            action,
            step: self.step.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::intelligence::{InteractionEngine, InteractionRules};
    use crate::models::enums::{RiskLevel, SearchStatus};
    use crate::models::MedicineInput;
    use crate::pipeline::enrichment::MockEnrichmentService;
    use crate::pipeline::ocr::MockOcrService;

    fn analyzer(answer: &str) -> (Arc<MockEnrichmentService>, PrescriptionAnalyzer) {
        let mock = Arc::new(MockEnrichmentService::new(answer));
        let engine = InteractionEngine::new(InteractionRules::bundled().unwrap());
        let analyzer =
            PrescriptionAnalyzer::new(mock.clone(), engine).with_policy(Duration::from_secs(1), 1);
        (mock, analyzer)
    }

    fn prescription() -> PrescriptionData {
        PrescriptionData {
            medications: vec![
                MedicineInput::named("Enzoflam"),
                MedicineInput::named("Pan-D 40mg"),
            ],
            ..Default::default()
        }
    }

    fn profile() -> HealthProfile {
        HealthProfile {
            medical_conditions: vec!["Liver Disease".into()],
            ..Default::default()
        }
    }

    fn image() -> ScanImage {
        ScanImage::jpeg("file:///scan.jpg", vec![0xFF, 0xD8])
    }

    #[test]
    fn starts_in_select_and_previews_image() {
        let mut session = ScanSession::new();
        assert_eq!(session.step(), ScanStep::Select);
        session.select_image(image()).unwrap();
        assert_eq!(session.step(), ScanStep::Preview);
        assert_eq!(session.image().unwrap().file_name, "scan.jpg");

        session.select_image(ScanImage::jpeg("file:///other.jpg", Vec::new())).unwrap();
        assert_eq!(session.image().unwrap().file_name, "other.jpg");
    }

    #[tokio::test]
    async fn analyze_requires_preview() {
        let (mock, analyzer) = analyzer(r#"{"medicines": []}"#);
        let ocr = MockOcrService::new(prescription());
        let mut session = ScanSession::new();

        let err = session.analyze(&ocr, &analyzer, &profile()).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { step: "select", .. }));
        assert_eq!(ocr.call_count(), 0);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn full_scan_reaches_results() {
        let (mock, analyzer) = analyzer(r#"{"medicines": [{"name": "Pan-D"}]}"#);
        let ocr = MockOcrService::new(prescription());
        let mut session = ScanSession::new();
        session.select_image(image()).unwrap();

        let result = session.analyze(&ocr, &analyzer, &profile()).await.unwrap();
        assert_eq!(result.medicines.len(), 2);
        assert_eq!(result.overall_health_analysis.risk_level, RiskLevel::High);
        assert_eq!(
            result.medicines[0].medical_info.search_status,
            Some(SearchStatus::NotFound)
        );

        assert_eq!(session.step(), ScanStep::Results);
        assert_eq!(session.ocr_result().unwrap().medications.len(), 2);
        assert!(session.error().is_none());
        assert_eq!(mock.call_count(), 1);

        let record = session.new_prescription("user-1", "scans/1.jpg").unwrap();
        assert_eq!(record.image, "file:///scan.jpg");
        assert!(record.search_result.is_some());

        assert!(session.select_image(image()).is_err());
        session.cancel();
        assert_eq!(session.step(), ScanStep::Select);
        assert!(session.result().is_none());
        assert!(session.image().is_none());
    }

    #[tokio::test]
    async fn ocr_refusal_stays_in_preview() {
        let (mock, analyzer) = analyzer(r#"{"medicines": []}"#);
        let ocr = MockOcrService::refusing("Failed to extract prescription data");
        let mut session = ScanSession::new();
        session.select_image(image()).unwrap();

        assert!(session.analyze(&ocr, &analyzer, &profile()).await.is_err());
        assert_eq!(session.step(), ScanStep::Preview);
        assert_eq!(session.error(), Some("Failed to extract prescription data"));
        assert_eq!(ocr.call_count(), 1);
        assert_eq!(mock.call_count(), 0);
        assert!(session.new_prescription("user-1", "k").is_err());
    }

    #[tokio::test]
    async fn unreachable_ocr_is_retried_then_reported() {
        let (_, analyzer) = analyzer(r#"{"medicines": []}"#);
        let ocr = MockOcrService::unreachable("http://10.0.2.2:5000");
        let mut session = ScanSession::new();
        session.select_image(image()).unwrap();

        let err = session.analyze(&ocr, &analyzer, &profile()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Connection(_)));
        assert_eq!(ocr.call_count(), 2);
        assert_eq!(session.step(), ScanStep::Preview);
        assert!(session.error().unwrap().starts_with("Cannot connect to server"));

        let retry_ocr = MockOcrService::new(prescription());
        assert!(session.analyze(&retry_ocr, &analyzer, &profile()).await.is_ok());
        assert_eq!(session.step(), ScanStep::Results);
    }
}
