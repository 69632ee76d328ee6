use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{FactCheckLookup, FactCheckReview, ensure_success};
use crate::SecretValue;
use crate::config::FactcheckConfig;
use crate::error::SourceError;

/// Google Fact Check Tools `claims:search` client.
pub struct FactCheckClient {
    client: reqwest::Client,
    base_url: String,
    key: Option<SecretValue>,
    key_env: String,
    language: String,
    max_results: usize,
}

impl FactCheckClient {
    pub fn new(client: reqwest::Client, config: &FactcheckConfig, key: Option<SecretValue>) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key,
            key_env: config.api_key_env.clone(),
            language: config.language.clone(),
            max_results: usize::from(config.max_results.clamp(1, 10)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsResponse {
    #[serde(default)]
    claims: Vec<ClaimRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRecord {
    #[serde(default)]
    text: String,
    #[serde(default)]
    claimant: Option<String>,
    #[serde(default)]
    claim_review: Vec<ReviewRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRecord {
    #[serde(default)]
    textual_rating: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    publisher: Option<PublisherRecord>,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct PublisherRecord {
    #[serde(default)]
    name: Option<String>,
}

/// Flatten claims into one entry per review, capped at `limit`.
fn flatten_reviews(response: ClaimsResponse, limit: usize) -> Vec<FactCheckReview> {
    response
        .claims
        .into_iter()
        .flat_map(|claim| {
            let text = claim.text;
            let claimant = claim.claimant.unwrap_or_else(|| "Unknown".to_string());
            claim
                .claim_review
                .into_iter()
                .map(move |review| FactCheckReview {
                    claim: text.clone(),
                    claimant: claimant.clone(),
                    rating: review
                        .textual_rating
                        .unwrap_or_else(|| "Unknown".to_string()),
                    url: review.url,
                    source: review
                        .publisher
                        .and_then(|publisher| publisher.name)
                        .unwrap_or_else(|| "Unknown".to_string()),
                    title: review.title,
                })
        })
        .take(limit)
        .collect()
}

#[async_trait]
impl FactCheckLookup for FactCheckClient {
    async fn lookup(&self, claim: &str) -> Result<Vec<FactCheckReview>, SourceError> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| SourceError::MissingCredential(self.key_env.clone()))?;

        let page_size = self.max_results.to_string();
        let resp = self
            .client
            .get(format!("{}/claims:search", self.base_url))
            .query(&[
                ("query", claim),
                ("key", key.expose()),
                ("pageSize", page_size.as_str()),
                ("languageCode", self.language.as_str()),
            ])
            .send()
            .await?;

        let body: ClaimsResponse = ensure_success(resp).await?.json().await?;
        let reviews = flatten_reviews(body, self.max_results);
        debug!(count = reviews.len(), "fact-check registry returned reviews");
        Ok(reviews)
    }
}
