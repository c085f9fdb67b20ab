use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ServiceConfig;
use crate::intelligence::names_match;

use super::{get_json, http_client, PipelineError};

/// Resolves a medicine name to its active ingredients.
#[async_trait]
pub trait IngredientLookup: Send + Sync {
    /// Ingredient names, empty when the name is unknown.
    async fn ingredients(&self, name: &str) -> Result<Vec<String>, PipelineError>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Client for the RxNav REST API: approximate match, then related ingredients.
pub struct RxNormClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ApproximateTerm {
    approximate_group: ApproximateGroup,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApproximateGroup {
    candidate: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Candidate {
    rxcui: String,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct Related {
    related_group: RelatedGroup,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RelatedGroup {
    concept_group: Vec<ConceptGroup>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ConceptGroup {
    tty: String,
    concept_properties: Vec<ConceptProperties>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ConceptProperties {
    name: String,
}

impl RxNormClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout_secs)?,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, PipelineError> {
        Self::new(&config.rxnorm_url, config.request_timeout_secs)
    }

    async fn best_rxcui(&self, name: &str) -> Result<Option<String>, PipelineError> {
        let url = format!("{}/approximateTerm.json", self.base_url);
        let found: ApproximateTerm = get_json(
            &self.client,
            &self.base_url,
            self.timeout_secs,
            &url,
            &[("term", name), ("maxEntries", "10")],
        )
        .await?;

        Ok(found
            .approximate_group
            .candidate
            .into_iter()
            .map(|c| c.rxcui)
            .find(|rxcui| !rxcui.trim().is_empty()))
    }
}

#[async_trait]
impl IngredientLookup for RxNormClient {
    async fn ingredients(&self, name: &str) -> Result<Vec<String>, PipelineError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Vec::new());
        }

        let Some(rxcui) = self.best_rxcui(name).await? else {
            tracing::debug!(medicine = %name, "No RxNorm concept");
            return Ok(Vec::new());
        };

        let url = format!("{}/rxcui/{}/related.json", self.base_url, rxcui.trim());
        let related: Related = get_json(
            &self.client,
            &self.base_url,
            self.timeout_secs,
            &url,
            &[("tty", "IN")],
        )
        .await?;

        let mut ingredients: Vec<String> = Vec::new();
        for concept in related
            .related_group
            .concept_group
            .into_iter()
            .filter(|g| g.tty == "IN")
            .flat_map(|g| g.concept_properties)
        {
            let ingredient = concept.name.trim();
            if !ingredient.is_empty() && !ingredients.iter().any(|i| i.eq_ignore_ascii_case(ingredient)) {
                ingredients.push(ingredient.to_string());
            }
        }

        tracing::debug!(medicine = %name, rxcui = %rxcui, ingredients = ingredients.len(), "RxNorm ingredients resolved");
        Ok(ingredients)
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Ingredient lookup over a fixed name table, counting calls.
#[derive(Default)]
pub struct MockIngredientLookup {
    entries: Vec<(String, Vec<String>)>,
    calls: AtomicUsize,
}

impl MockIngredientLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_medicine(mut self, name: &str, ingredients: &[&str]) -> Self {
        self.entries.push((
            name.to_string(),
            ingredients.iter().map(|i| i.to_string()).collect(),
        ));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IngredientLookup for MockIngredientLookup {
    async fn ingredients(&self, name: &str) -> Result<Vec<String>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .entries
            .iter()
            .find(|(known, _)| names_match(known, name))
            .map(|(_, ingredients)| ingredients.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// RxNav stand-in that only knows Moxikind-CV (rxcui 617993).
    fn rxnav() -> Router {
        Router::new()
            .route(
                "/approximateTerm.json",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    let term = params.get("term").cloned().unwrap_or_default().to_lowercase();
                    let candidate = if term.contains("moxikind") {
                        serde_json::json!([{"rxcui": "617993", "score": "8"}, {"rxcui": "723", "score": "5"}])
                    } else {
                        serde_json::json!([])
                    };
                    Json(serde_json::json!({
                        "approximateGroup": {"inputTerm": term, "candidate": candidate}
                    }))
                }),
            )
            .route(
                "/rxcui/:rxcui/related.json",
                get(
                    |Path(rxcui): Path<String>, Query(params): Query<HashMap<String, String>>| async move {
                        if rxcui != "617993" || params.get("tty").map(String::as_str) != Some("IN") {
                            return (StatusCode::BAD_REQUEST, Json(serde_json::json!({})));
                        }
                        (
                            StatusCode::OK,
                            Json(serde_json::json!({
                                "relatedGroup": {
                                    "rxcui": "617993",
                                    "conceptGroup": [{
                                        "tty": "IN",
                                        "conceptProperties": [
                                            {"rxcui": "723", "name": "amoxicillin", "tty": "IN"},
                                            {"rxcui": "48203", "name": "clavulanate", "tty": "IN"},
                                            {"rxcui": "723", "name": "Amoxicillin", "tty": "IN"}
                                        ]
                                    }]
                                }
                            })),
                        )
                    },
                ),
            )
    }

    #[tokio::test]
    async fn resolves_brand_to_ingredients() {
        let base = serve(rxnav()).await;
        let client = RxNormClient::new(&base, 5).unwrap();
        let ingredients = client.ingredients("Moxikind-CV 625").await.unwrap();
        assert_eq!(ingredients, vec!["amoxicillin", "clavulanate"]);
    }

    #[tokio::test]
    async fn unknown_name_has_no_ingredients() {
        let base = serve(rxnav()).await;
        let client = RxNormClient::new(&base, 5).unwrap();
        assert!(client.ingredients("Zyxolin").await.unwrap().is_empty());
        assert!(client.ingredients("  ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_concept_groups_are_tolerated() {
        let app = Router::new()
            .route(
                "/approximateTerm.json",
                get(|| async {
                    Json(serde_json::json!({"approximateGroup": {"candidate": [{"rxcui": "42"}]}}))
                }),
            )
            .route(
                "/rxcui/:rxcui/related.json",
                get(|| async {
                    Json(serde_json::json!({"relatedGroup": {"conceptGroup": [{"tty": "IN"}]}}))
                }),
            );
        let base = serve(app).await;
        let client = RxNormClient::new(&base, 5).unwrap();
        assert!(client.ingredients("Something").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mock_matches_names_loosely() {
        let mock = MockIngredientLookup::new().with_medicine("Moxikind-CV", &["Amoxicillin", "Clavulanate"]);
        assert_eq!(mock.ingredients("moxikind-cv 625").await.unwrap().len(), 2);
        assert!(mock.ingredients("Zyxolin").await.unwrap().is_empty());
        assert_eq!(mock.call_count(), 2);
    }
}
