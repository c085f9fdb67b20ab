use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::models::enums::Reliability;
use crate::models::lenient::{opt_number, opt_text, skip_invalid};
use crate::models::{Citations, HealthProfile, MedicalInfo, MedicineInput, Source};

use super::ocr::strip_json_fences;
use super::{http_client, PipelineError};

/// What the search service tells us about a prescription. Only the shape
/// is trusted; counts and risk are recomputed downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentResponse {
    pub medicines: Vec<MedicalInfo>,
    pub sources_count: Option<u32>,
    pub reliability: Option<Reliability>,
    pub citations: Citations,
}

/// Looks up descriptive and safety data for a list of medicines.
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    async fn search(
        &self,
        medicines: &[MedicineInput],
        profile: &HealthProfile,
    ) -> Result<EnrichmentResponse, PipelineError>;
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

const RESPONSE_SHAPE: &str = r#"{
  "medicines": [
    {
      "name": "exact medicine name",
      "imageUrl": "URL to an official product image, or null",
      "uses": ["primary use"],
      "sideEffects": {"common": [], "serious": [], "rare": []},
      "warningsAndPrecautions": ["warning or contraindication"],
      "interactions": {"drugInteractions": [], "foodInteractions": [], "conditionInteractions": []},
      "overdoseMissedDose": {"overdose": "what to do", "missedDose": "what to do"},
      "approximatePrice": {"currency": "USD", "priceRange": "low-high", "unit": "per tablet", "lastUpdated": "year"},
      "manufacturer": ["manufacturer"],
      "activeIngredients": [{"name": "ingredient", "strength": "amount", "purpose": "role"}],
      "dosageForm": "tablet/capsule/syrup/gel",
      "prescriptionRequired": true,
      "genericAvailable": true,
      "fdaApproved": true,
      "lastUpdated": "date searched",
      "healthProfileInteraction": {
        "hasInteractions": true,
        "criticalCount": 0,
        "highCount": 0,
        "moderateCount": 0,
        "lowCount": 0,
        "interactions": [
          {
            "type": "allergy|medical_condition|current_medication|dietary_restriction",
            "item": "the profile entry involved",
            "description": "what happens",
            "severity": "critical|high|moderate|low|info",
            "recommendation": "what to do"
          }
        ],
        "overallRisk": "critical|high|moderate|low|minimal",
        "summary": "one or two sentences"
      }
    }
  ],
  "searchMetadata": {"sourcesCount": 0, "reliability": "high|medium|low"}
}"#;

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}

/// Search prompt listing each medicine with its dosage and the whole
/// health profile, asking for exactly the JSON shape we parse.
pub fn build_search_prompt(medicines: &[MedicineInput], profile: &HealthProfile) -> String {
    let medicine_list = medicines
        .iter()
        .map(MedicineInput::label)
        .collect::<Vec<_>>()
        .join(", ");
    let current_medications = profile
        .current_medications
        .iter()
        .map(|m| {
            if m.dosage.trim().is_empty() {
                m.name.clone()
            } else {
                format!("{} ({})", m.name, m.dosage)
            }
        })
        .collect::<Vec<_>>();

    format!(
        "You are a clinical pharmacology assistant reviewing a prescription against a patient's health profile.\n\n\
         PRESCRIBED MEDICINES: {medicine_list}\n\n\
         PATIENT HEALTH PROFILE:\n\
         - Allergies: {allergies}\n\
         - Medical conditions: {conditions}\n\
         - Current medications: {current}\n\
         - Dietary restrictions: {diet}\n\
         - Additional notes: {notes}\n\n\
         For each prescribed medicine, search current authoritative sources and report its uses, \
         side effects, warnings, interactions, active ingredients and every interaction with the \
         profile above. Check every allergy, condition, current medication and dietary restriction, \
         including brand and generic names and duplicate therapeutic classes.\n\n\
         Severity: critical means life-threatening or an absolute contraindication; high needs \
         prompt medical consultation; moderate needs monitoring; low is minor; info is general \
         information.\n\n\
         Respond with ONLY this JSON object, no markdown:\n{RESPONSE_SHAPE}\n",
        allergies = join_or_none(&profile.allergies),
        conditions = join_or_none(&profile.medical_conditions),
        current = join_or_none(&current_medications),
        diet = join_or_none(&profile.dietary_restrictions),
        notes = if profile.additional_notes.trim().is_empty() {
            "None"
        } else {
            profile.additional_notes.trim()
        },
    )
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPayload {
    #[serde(default, deserialize_with = "skip_invalid")]
    medicines: Vec<MedicalInfo>,
    #[serde(default)]
    search_metadata: Option<ReportedMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportedMetadata {
    #[serde(default, deserialize_with = "opt_number")]
    sources_count: Option<f64>,
    #[serde(default, deserialize_with = "opt_text")]
    reliability: Option<String>,
}

/// Parse the model's text answer. Fenced or bare JSON is accepted;
/// anything else is a parse error.
pub fn parse_enrichment_response(text: &str) -> Result<EnrichmentResponse, PipelineError> {
    let cleaned = strip_json_fences(text);
    if cleaned.is_empty() {
        return Err(PipelineError::ResponseParsing(
            "No response text received from the search model".into(),
        ));
    }

    let payload: SearchPayload = serde_json::from_str(&cleaned)
        .map_err(|e| PipelineError::ResponseParsing(e.to_string()))?;
    let metadata = payload.search_metadata;

    Ok(EnrichmentResponse {
        medicines: payload.medicines,
        sources_count: metadata
            .as_ref()
            .and_then(|m| m.sources_count)
            .filter(|n| *n >= 0.0)
            .map(|n| n as u32),
        reliability: metadata
            .as_ref()
            .and_then(|m| m.reliability.as_deref())
            .and_then(Reliability::parse_lenient),
        citations: Citations::default(),
    })
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// Subset of a `generateContent` response we read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default, deserialize_with = "skip_invalid")]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default, deserialize_with = "skip_invalid")]
    pub web_search_queries: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebChunk {
    #[serde(default, deserialize_with = "opt_text")]
    pub uri: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub title: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

fn domain_of(uri: &str) -> Option<String> {
    reqwest::Url::parse(uri)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Sources and queries behind a grounded answer. Sources are numbered from 1.
pub fn extract_citations(response: &GenerateContentResponse) -> Citations {
    let Some(grounding) = response
        .candidates
        .first()
        .and_then(|c| c.grounding_metadata.as_ref())
    else {
        return Citations::default();
    };

    let sources = grounding
        .grounding_chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let web = chunk.web.as_ref();
            let uri = web.and_then(|w| w.uri.clone()).unwrap_or_default();
            Source {
                index: i as u32 + 1,
                title: web
                    .and_then(|w| w.title.clone())
                    .unwrap_or_else(|| "Unknown Source".to_string()),
                domain: domain_of(&uri).unwrap_or_else(|| "unknown".to_string()),
                url: uri,
            }
        })
        .collect();

    Citations {
        sources,
        queries: grounding.web_search_queries.clone(),
        has_grounding: true,
    }
}

/// Client for the generative language API.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, PipelineError> {
        if api_key.trim().is_empty() {
            return Err(PipelineError::MissingConfig("RXGUARD_GEMINI_API_KEY".into()));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: http_client(timeout_secs)?,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, PipelineError> {
        Self::new(
            &config.gemini_url,
            config.gemini_api_key.as_deref().unwrap_or_default(),
            &config.gemini_model,
            config.request_timeout_secs,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One `generateContent` call. `grounded` enables the search tool.
    pub async fn generate(
        &self,
        prompt: &str,
        grounded: bool,
    ) -> Result<GenerateContentResponse, PipelineError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
            tools: if grounded {
                vec![serde_json::json!({ "google_search": {} })]
            } else {
                Vec::new()
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(&self.base_url, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| PipelineError::ResponseParsing(e.to_string()))
    }
}

#[async_trait]
impl EnrichmentService for GeminiClient {
    async fn search(
        &self,
        medicines: &[MedicineInput],
        profile: &HealthProfile,
    ) -> Result<EnrichmentResponse, PipelineError> {
        tracing::info!(
            medicines = medicines.len(),
            profile_items = profile.item_count(),
            model = %self.model,
            "Searching medicine information"
        );

        let prompt = build_search_prompt(medicines, profile);
        let response = self.generate(&prompt, true).await?;

        let mut enrichment = parse_enrichment_response(&response.text())?;
        enrichment.citations = extract_citations(&response);
        Ok(enrichment)
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Search stand-in that parses a canned model answer on every call.
pub struct MockEnrichmentService {
    outcome: Result<String, String>,
    calls: AtomicUsize,
}

impl MockEnrichmentService {
    /// Answers with `text` as if the model had produced it.
    pub fn new(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails at the transport level.
    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnrichmentService for MockEnrichmentService {
    async fn search(
        &self,
        _medicines: &[MedicineInput],
        _profile: &HealthProfile,
    ) -> Result<EnrichmentResponse, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(text) => parse_enrichment_response(text),
            Err(message) => Err(PipelineError::HttpClient(message.clone())),
        }
    }
}
