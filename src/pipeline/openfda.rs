use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::Deserialize;

use crate::config::ServiceConfig;
use crate::intelligence::{names_match, normalize, StaticInteractionTable};
use crate::models::CurrentMedication;

use super::retry::call_with_retry;
use super::{get_json, http_client, PipelineError};

/// Adverse-event reports are evidence of co-use, not of a severe interaction.
const CO_REPORTED_SEVERE: bool = false;

/// Reports looking for co-reported drugs in adverse-event data.
#[async_trait]
pub trait AdverseEventSource: Send + Sync {
    /// Whether any adverse-event report lists both drugs.
    async fn co_reported(&self, drug: &str, other: &str) -> Result<bool, PipelineError>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Client for the openFDA drug adverse-event endpoint.
pub struct OpenFdaClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct EventSearch {
    #[serde(default)]
    results: Option<Vec<IgnoredAny>>,
}

impl OpenFdaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout_secs)?,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, PipelineError> {
        Self::new(&config.openfda_url, config.request_timeout_secs)
    }
}

fn product_clause(drug: &str) -> String {
    format!("patient.drug.medicinalproduct:\"{}\"", drug.replace('"', "").trim())
}

#[async_trait]
impl AdverseEventSource for OpenFdaClient {
    async fn co_reported(&self, drug: &str, other: &str) -> Result<bool, PipelineError> {
        let url = format!("{}/drug/event.json", self.base_url);
        let search = format!("{} AND {}", product_clause(drug), product_clause(other));

        let outcome: Result<EventSearch, PipelineError> = get_json(
            &self.client,
            &self.base_url,
            self.timeout_secs,
            &url,
            &[("search", search.as_str()), ("limit", "10")],
        )
        .await;

        match outcome {
            Ok(found) => Ok(found.results.is_some_and(|r| !r.is_empty())),
            // openFDA answers a search without matches with 404.
            Err(PipelineError::Status { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Prefetch
// ---------------------------------------------------------------------------

/// Ask `source` about every (ingredient, current medication) pair up front and
/// keep the hits as a table the synchronous rule engine can consult.
///
/// Lookups that fail after retries are logged and skipped; the local rules
/// still cover the pair.
pub async fn prefetch_pair_signals(
    source: &dyn AdverseEventSource,
    ingredients: &[String],
    current: &[CurrentMedication],
    timeout: Duration,
    retries: usize,
) -> StaticInteractionTable {
    let mut seen: Vec<String> = Vec::new();
    let mut table = StaticInteractionTable::new();

    for ingredient in ingredients.iter().map(|i| i.trim()) {
        let key = normalize(ingredient);
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);

        for medication in current.iter().map(|m| m.name.trim()) {
            if medication.is_empty() || names_match(ingredient, medication) {
                continue;
            }

            let outcome = call_with_retry("adverse-event search", timeout, retries, || {
                source.co_reported(ingredient, medication)
            })
            .await;

            match outcome {
                Ok(true) => {
                    table = table.with_pair(
                        ingredient,
                        medication,
                        CO_REPORTED_SEVERE,
                        &format!("Potential interaction detected between {ingredient} and {medication}"),
                    );
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        ingredient,
                        medication,
                        error = %e,
                        "Adverse-event lookup failed, relying on local rules"
                    );
                }
            }
        }
    }

    tracing::debug!(pairs = table.len(), "Adverse-event signals prefetched");
    table
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Adverse-event stand-in answering from a fixed pair list and counting calls.
pub struct MockAdverseEvents {
    pairs: Vec<(String, String)>,
    unreachable: Option<String>,
    calls: AtomicUsize,
}

impl MockAdverseEvents {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            pairs: pairs
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            unreachable: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Source cannot be reached; retryable.
    pub fn unreachable(url: &str) -> Self {
        Self {
            unreachable: Some(url.to_string()),
            ..Self::new(&[])
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdverseEventSource for MockAdverseEvents {
    async fn co_reported(&self, drug: &str, other: &str) -> Result<bool, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(url) = &self.unreachable {
            return Err(PipelineError::Connection(url.clone()));
        }
        Ok(self.pairs.iter().any(|(a, b)| {
            (names_match(a, drug) && names_match(b, other))
                || (names_match(b, drug) && names_match(a, other))
        }))
    }
}
