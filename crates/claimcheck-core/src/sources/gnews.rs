use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{NewsArticle, NewsSearch, ensure_success};
use crate::SecretValue;
use crate::config::GnewsConfig;
use crate::error::SourceError;

/// GNews `/search` client for licensed news coverage.
pub struct GnewsClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretValue>,
    token_env: String,
    language: String,
    max_results: u8,
}

impl GnewsClient {
    pub fn new(client: reqwest::Client, config: &GnewsConfig, token: Option<SecretValue>) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            token_env: config.api_key_env.clone(),
            language: config.language.clone(),
            max_results: config.max_results.clamp(1, 10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<ArticleRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticleRecord {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    source: Option<SourceRecord>,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceRecord {
    #[serde(default)]
    name: Option<String>,
}

impl From<ArticleRecord> for NewsArticle {
    fn from(record: ArticleRecord) -> Self {
        NewsArticle {
            title: record.title,
            url: record.url,
            source: record
                .source
                .and_then(|source| source.name)
                .unwrap_or_else(|| "Unknown".to_string()),
            published_date: record.published_at,
            description: record.description.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl NewsSearch for GnewsClient {
    async fn search(&self, query: &str) -> Result<Vec<NewsArticle>, SourceError> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| SourceError::MissingCredential(self.token_env.clone()))?;

        let max = self.max_results.to_string();
        let resp = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", query),
                ("token", token.expose()),
                ("lang", self.language.as_str()),
                ("max", max.as_str()),
                ("sortby", "relevance"),
            ])
            .send()
            .await?;

        let body: SearchResponse = ensure_success(resp).await?.json().await?;
        debug!(count = body.articles.len(), "gnews search returned articles");

        Ok(body.articles.into_iter().map(NewsArticle::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_article_records() {
        let raw = r#"{"articles":[
            {"title":"A","url":"https://a.example/1","source":{"name":"A Times"},"publishedAt":"2024-01-01T00:00:00Z","description":"d"},
            {"title":"B","url":"https://b.example/2","source":{},"publishedAt":"2024-01-02T00:00:00Z","description":null}
        ]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        let articles: Vec<NewsArticle> = parsed.articles.into_iter().map(Into::into).collect();

        assert_eq!(articles[0].source, "A Times");
        assert_eq!(articles[0].published_date, "2024-01-01T00:00:00Z");
        assert_eq!(articles[1].source, "Unknown");
        assert_eq!(articles[1].description, "");
    }

    #[tokio::test]
    async fn missing_token_is_configuration_error() {
        let client = GnewsClient::new(reqwest::Client::new(), &GnewsConfig::default(), None);
        let err = client.search("anything").await.unwrap_err();
        assert!(err.is_configuration());
    }
}
