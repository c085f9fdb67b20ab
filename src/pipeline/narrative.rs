use async_trait::async_trait;

use crate::models::PrescriptionData;

use super::enrichment::GeminiClient;
use super::PipelineError;

/// Speaking rate used to estimate narration length.
const WORDS_PER_MINUTE: usize = 150;

const EMPTY_NARRATIVE: &str = "Unable to generate narrative from the provided prescription data.";

/// Turns a prescription into text meant to be read aloud.
#[async_trait]
pub trait NarrativeService: Send + Sync {
    async fn narrate(&self, data: &PrescriptionData, language: &str) -> Result<String, PipelineError>;
}

/// Prompt for a spoken explanation of the prescription. The raw OCR text is
/// never sent.
pub fn build_narrative_prompt(data: &PrescriptionData, language: &str) -> String {
    let cleaned = data.without_raw_response();
    let patient = cleaned.patient_name().unwrap_or("the patient").to_string();
    let clinic = cleaned
        .doctor
        .as_ref()
        .and_then(|d| d.clinic_name.as_deref())
        .unwrap_or("your clinic");
    let date = cleaned
        .patient
        .as_ref()
        .and_then(|p| p.prescription_date.as_deref())
        .unwrap_or("today");
    let prescription = serde_json::to_string_pretty(&cleaned).unwrap_or_default();

    format!(
        "You are a doctor explaining a prescription to {patient}.\n\n\
         Write a clear spoken explanation of the prescription below, entirely in {language}.\n\n\
         PRESCRIPTION:\n{prescription}\n\n\
         Cover, in this order: a greeting to {patient} mentioning {clinic} and the date ({date}); \
         the overall treatment plan; for each medication its purpose, strength, how often and for \
         how long to take it, timing relative to meals and any special instructions; a short \
         summary of the daily schedule; and encouragement to finish the full course and to ask \
         the doctor about anything unclear. Mention any information that is missing or unclear.\n\n\
         Output plain sentences only, suitable for text-to-speech: no markdown, no lists, no \
         symbols. Aim for 300 to 600 words.\n"
    )
}

/// Rough spoken length of `text` in seconds.
pub fn estimated_speech_secs(text: &str) -> u64 {
    let words = text.split_whitespace().count();
    ((words * 60).div_ceil(WORDS_PER_MINUTE)) as u64
}

/// Narrative generation on the generative language API, without search grounding.
pub struct GeminiNarrator {
    client: GeminiClient,
}

impl GeminiNarrator {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NarrativeService for GeminiNarrator {
    async fn narrate(&self, data: &PrescriptionData, language: &str) -> Result<String, PipelineError> {
        let prompt = build_narrative_prompt(data, language);
        let text = self.client.generate(&prompt, false).await?.text();
        let text = text.trim();

        if text.is_empty() {
            tracing::warn!(language, "Narrative model returned no text");
            return Ok(EMPTY_NARRATIVE.to_string());
        }

        tracing::info!(
            language,
            words = text.split_whitespace().count(),
            estimated_secs = estimated_speech_secs(text),
            "Narrative generated"
        );
        Ok(text.to_string())
    }
}

/// Narrative stand-in that echoes the patient and language.
pub struct MockNarrativeService;

#[async_trait]
impl NarrativeService for MockNarrativeService {
    async fn narrate(&self, data: &PrescriptionData, language: &str) -> Result<String, PipelineError> {
        Ok(format!(
            "[{language}] Hello {}, you have {} medications.",
            data.patient_name().unwrap_or("the patient"),
            data.medications.len()
        ))
    }
}
