//! External data-source capabilities and their HTTP implementations.

mod factcheck;
mod gnews;
mod perplexity;
mod virustotal;

pub use factcheck::FactCheckClient;
pub use gnews::GnewsClient;
pub use perplexity::PerplexityClient;
pub use virustotal::VirusTotalClient;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, Credentials};
use crate::error::SourceError;

/// One article returned by the news search capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_date: String,
    pub description: String,
}

/// One published review of a claim from a fact-check registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckReview {
    pub claim: String,
    pub claimant: String,
    pub rating: String,
    pub url: String,
    pub source: String,
    pub title: String,
}

/// Reputation scan of a single URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlScan {
    pub url: String,
    pub malicious_count: u32,
    pub suspicious_count: u32,
    pub total_scanners: u32,
    pub analysis_url: String,
    pub status: String,
}

/// Answer of the open research capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchAnswer {
    pub answer: String,
    pub citations: Vec<String>,
}

#[async_trait]
pub trait NewsSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<NewsArticle>, SourceError>;
}

#[async_trait]
pub trait FactCheckLookup: Send + Sync {
    async fn lookup(&self, claim: &str) -> Result<Vec<FactCheckReview>, SourceError>;
}

#[async_trait]
pub trait UrlReputation: Send + Sync {
    async fn scan(&self, url: &str) -> Result<UrlScan, SourceError>;
}

#[async_trait]
pub trait Research: Send + Sync {
    async fn research(&self, prompt: &str) -> Result<ResearchAnswer, SourceError>;
}

/// The four capabilities every lane draws from, plus the per-worker deadline.
#[derive(Clone)]
pub struct SourceSet {
    pub news: Arc<dyn NewsSearch>,
    pub factcheck: Arc<dyn FactCheckLookup>,
    pub reputation: Arc<dyn UrlReputation>,
    pub research: Arc<dyn Research>,
    pub worker_deadline: Duration,
}

impl SourceSet {
    pub fn new(
        news: Arc<dyn NewsSearch>,
        factcheck: Arc<dyn FactCheckLookup>,
        reputation: Arc<dyn UrlReputation>,
        research: Arc<dyn Research>,
    ) -> Self {
        Self {
            news,
            factcheck,
            reputation,
            research,
            worker_deadline: Duration::from_secs(90),
        }
    }

    pub fn with_worker_deadline(mut self, deadline: Duration) -> Self {
        self.worker_deadline = deadline;
        self
    }

    /// Build the HTTP-backed source set described by `config`.
    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self, SourceError> {
        let sources = &config.sources;
        let client = http_client(sources.request_timeout())?;
        let research_client = http_client(sources.research_timeout())?;

        Ok(Self::new(
            Arc::new(GnewsClient::new(
                client.clone(),
                &sources.gnews,
                credentials.gnews.clone(),
            )),
            Arc::new(FactCheckClient::new(
                client.clone(),
                &sources.factcheck,
                credentials.factcheck.clone(),
            )),
            Arc::new(VirusTotalClient::new(
                client,
                &sources.virustotal,
                credentials.virustotal.clone(),
            )),
            Arc::new(PerplexityClient::new(
                research_client,
                &sources.perplexity,
                credentials.perplexity.clone(),
            )),
        )
        .with_worker_deadline(sources.worker_deadline()))
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("claimcheck/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(SourceError::from)
}

/// Turn a non-2xx response into an `Api` error carrying the body text.
async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(SourceError::Api {
        status: status.as_u16(),
        message,
    })
}
