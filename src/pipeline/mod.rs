//! Async boundary around the analytical core: HTTP clients for the OCR,
//! enrichment, narrative, speech and drug-reference services, the
//! orchestration that feeds their output through the rule engine, and the
//! scan state machine.

pub mod analysis;
pub mod enrichment;
pub mod narrative;
pub mod ocr;
pub mod openfda;
pub mod retry;
pub mod rxnorm;
pub mod scan;
pub mod speech;

pub use analysis::{analyze_prescription, failed_result, PrescriptionAnalyzer};
pub use enrichment::{EnrichmentResponse, EnrichmentService, GeminiClient, MockEnrichmentService};
pub use narrative::{GeminiNarrator, MockNarrativeService, NarrativeService};
pub use ocr::{HttpOcrClient, MockOcrService, OcrService, ScanImage};
pub use openfda::{prefetch_pair_signals, AdverseEventSource, MockAdverseEvents, OpenFdaClient};
pub use retry::call_with_retry;
pub use rxnorm::{IngredientLookup, MockIngredientLookup, RxNormClient};
pub use scan::{ScanSession, ScanStep};
pub use speech::{AzureSpeechClient, MockSpeechSynthesizer, SpeechRequest, SpeechSynthesizer};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Service is not reachable at {0}")]
    Connection(String),

    #[error("{label} timed out after {secs}s")]
    Timeout { label: String, secs: u64 },

    #[error("Service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Service reported failure: {0}")]
    Service(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Cannot {action} while in the {step} step")]
    InvalidTransition { action: &'static str, step: &'static str },
}

impl PipelineError {
    /// Map a transport error the way every client in this module does.
    pub(crate) fn from_reqwest(base_url: &str, timeout_secs: u64, e: reqwest::Error) -> Self {
        if e.is_connect() {
            PipelineError::Connection(base_url.to_string())
        } else if e.is_timeout() {
            PipelineError::Timeout {
                label: base_url.to_string(),
                secs: timeout_secs,
            }
        } else if e.is_decode() {
            PipelineError::ResponseParsing(e.to_string())
        } else {
            PipelineError::HttpClient(e.to_string())
        }
    }

    /// Transient failures worth one more attempt. Parse failures and
    /// explicit service refusals are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Connection(_)
            | PipelineError::Timeout { .. }
            | PipelineError::HttpClient(_) => true,
            PipelineError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Timeout { .. } => {
                "Request timed out. Please check your connection and try again.".to_string()
            }
            PipelineError::Connection(_) => {
                "Cannot connect to server. Make sure the extraction service is running and accessible."
                    .to_string()
            }
            PipelineError::Service(message) => message.clone(),
            other => format!("Network error: {other}"),
        }
    }
}

/// Build the shared async client with a request timeout.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, PipelineError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PipelineError::HttpClient(e.to_string()))
}

/// GET a JSON document. Non-success statuses become [`PipelineError::Status`].
pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    base_url: &str,
    timeout_secs: u64,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T, PipelineError> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| PipelineError::from_reqwest(base_url, timeout_secs, e))?;

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
    serde_json::from_str(&body).map_err(|e| PipelineError::ResponseParsing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(PipelineError::Connection("http://x".into()).is_retryable());
        assert!(PipelineError::Timeout { label: "ocr".into(), secs: 1 }.is_retryable());
        assert!(PipelineError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(PipelineError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!PipelineError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!PipelineError::ResponseParsing("bad".into()).is_retryable());
        assert!(!PipelineError::MissingConfig("key".into()).is_retryable());
    }

    #[test]
    fn user_messages() {
        let timeout = PipelineError::Timeout { label: "ocr".into(), secs: 60 };
        assert!(timeout.user_message().starts_with("Request timed out"));
        let refused = PipelineError::Service("Failed to extract prescription data".into());
        assert_eq!(refused.user_message(), "Failed to extract prescription data");
        let status = PipelineError::Status { status: 500, body: "boom".into() };
        assert!(status.user_message().starts_with("Network error:"));
    }
}
