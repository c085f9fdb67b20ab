use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::config::ServiceConfig;
use crate::models::{OcrApiResponse, PrescriptionData};

use super::{http_client, PipelineError};

const DEFAULT_FILE_NAME: &str = "prescription.jpg";
const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// An image picked or captured for scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanImage {
    /// Where the image lives on the device; kept as the prescription's image reference.
    pub uri: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ScanImage {
    pub fn jpeg(uri: &str, bytes: Vec<u8>) -> Self {
        let file_name = uri
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME);
        Self {
            uri: uri.to_string(),
            file_name: file_name.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            bytes,
        }
    }
}

/// Extracts structured prescription data from an image.
#[async_trait]
pub trait OcrService: Send + Sync {
    async fn extract(&self, image: &ScanImage) -> Result<PrescriptionData, PipelineError>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Client for the extraction server's `POST /api/extract`.
pub struct HttpOcrClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpOcrClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout_secs)?,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, PipelineError> {
        let url = config
            .ocr_url
            .as_deref()
            .ok_or_else(|| PipelineError::MissingConfig("RXGUARD_OCR_URL".into()))?;
        Self::new(url, config.request_timeout_secs)
    }
}

#[async_trait]
impl OcrService for HttpOcrClient {
    async fn extract(&self, image: &ScanImage) -> Result<PrescriptionData, PipelineError> {
        let url = format!("{}/api/extract", self.base_url);
        let part = reqwest::multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)
            .map_err(|e| PipelineError::HttpClient(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
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

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::ResponseParsing(e.to_string()))?;
        let data = parse_ocr_response(&body)?;

        tracing::info!(
            medications = data.medications.len(),
            uncertain = data.medications.iter().filter(|m| m.uncertain).count(),
            "Prescription extracted"
        );
        Ok(data)
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

static RE_JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\s*|\s*```").unwrap());

/// Remove markdown code fences around a JSON payload.
pub fn strip_json_fences(text: &str) -> String {
    RE_JSON_FENCE.replace_all(text, "").trim().to_string()
}

/// Decode the extraction envelope. A `success: false` envelope becomes a
/// service error carrying the server's message.
pub fn parse_ocr_response(body: &str) -> Result<PrescriptionData, PipelineError> {
    let envelope: OcrApiResponse = serde_json::from_str(body)
        .map_err(|e| PipelineError::ResponseParsing(e.to_string()))?;

    match envelope {
        OcrApiResponse {
            success: true,
            data: Some(data),
            ..
        } => Ok(recover_raw_response(data)),
        OcrApiResponse { error, .. } => Err(PipelineError::Service(
            error.unwrap_or_else(|| "Failed to extract prescription data".to_string()),
        )),
    }
}

/// When the server passes the model's raw text through, parse it and let it
/// take precedence over the envelope, keeping the raw text, the server note
/// and whichever extraction notes are present.
fn recover_raw_response(data: PrescriptionData) -> PrescriptionData {
    let Some(raw) = data.raw_response.as_deref() else {
        return data;
    };

    match serde_json::from_str::<PrescriptionData>(&strip_json_fences(raw)) {
        Ok(parsed) => PrescriptionData {
            extraction_notes: parsed.extraction_notes.or(data.extraction_notes),
            raw_response: data.raw_response,
            note: data.note,
            ..parsed
        },
        Err(e) => {
            tracing::warn!(error = %e, "Raw OCR response is not valid JSON, keeping envelope data");
            data
        }
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// OCR stand-in returning a fixed outcome and counting calls.
pub struct MockOcrService {
    outcome: MockOutcome,
    calls: AtomicUsize,
}

enum MockOutcome {
    Data(PrescriptionData),
    Refused(String),
    Unreachable(String),
}

impl MockOcrService {
    pub fn new(data: PrescriptionData) -> Self {
        Self::with_outcome(MockOutcome::Data(data))
    }

    /// Service answers with `success: false`.
    pub fn refusing(message: &str) -> Self {
        Self::with_outcome(MockOutcome::Refused(message.to_string()))
    }

    /// Service cannot be reached; retryable.
    pub fn unreachable(url: &str) -> Self {
        Self::with_outcome(MockOutcome::Unreachable(url.to_string()))
    }

    fn with_outcome(outcome: MockOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrService for MockOcrService {
    async fn extract(&self, _image: &ScanImage) -> Result<PrescriptionData, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            MockOutcome::Data(data) => Ok(data.clone()),
            MockOutcome::Refused(message) => Err(PipelineError::Service(message.clone())),
            MockOutcome::Unreachable(url) => Err(PipelineError::Connection(url.clone())),
        }
    }
}
