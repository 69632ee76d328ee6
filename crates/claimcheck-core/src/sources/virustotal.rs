use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;

use super::{UrlReputation, UrlScan, ensure_success};
use crate::SecretValue;
use crate::config::VirusTotalConfig;
use crate::error::SourceError;

const GUI_ANALYSIS_BASE: &str = "https://www.virustotal.com/gui/url";

/// VirusTotal URL scanner: submits a URL, then polls the analysis job.
pub struct VirusTotalClient {
    client: reqwest::Client,
    base_url: String,
    key: Option<SecretValue>,
    key_env: String,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl VirusTotalClient {
    pub fn new(client: reqwest::Client, config: &VirusTotalConfig, key: Option<SecretValue>) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key,
            key_env: config.api_key_env.clone(),
            poll_attempts: config.poll_attempts.max(1),
            poll_interval: config.poll_interval(),
        }
    }

    async fn submit(&self, key: &SecretValue, url: &str) -> Result<String, SourceError> {
        let resp = self
            .client
            .post(format!("{}/urls", self.base_url))
            .header("x-apikey", key.expose())
            .form(&[("url", url)])
            .send()
            .await?;

        let body: SubmitResponse = ensure_success(resp).await?.json().await?;
        Ok(body.data.id)
    }

    async fn poll(&self, key: &SecretValue, analysis_id: &str) -> Result<AnalysisAttributes, SourceError> {
        let mut latest = AnalysisAttributes::default();
        for attempt in 1..=self.poll_attempts {
            sleep(self.poll_interval).await;

            let resp = self
                .client
                .get(format!("{}/analyses/{}", self.base_url, analysis_id))
                .header("x-apikey", key.expose())
                .send()
                .await?;
            let body: AnalysisResponse = ensure_success(resp).await?.json().await?;
            latest = body.data.attributes;

            debug!(analysis_id, attempt, status = %latest.status, "polled url analysis");
            if latest.status == "completed" {
                break;
            }
        }
        Ok(latest)
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    data: SubmitData,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    data: AnalysisData,
}

#[derive(Debug, Deserialize)]
struct AnalysisData {
    #[serde(default)]
    attributes: AnalysisAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisAttributes {
    #[serde(default)]
    status: String,
    #[serde(default)]
    stats: BTreeMap<String, u32>,
}

/// Collapse engine stats into the normalized per-URL record.
fn summarize(url: &str, analysis_id: &str, attributes: &AnalysisAttributes) -> UrlScan {
    let stats = &attributes.stats;
    let malicious = stats.get("malicious").copied().unwrap_or(0);
    let suspicious = stats.get("suspicious").copied().unwrap_or(0);
    let total = if stats.is_empty() {
        1
    } else {
        stats.values().sum()
    };

    let status = if malicious > 0 {
        "malicious"
    } else if suspicious > 0 {
        "suspicious"
    } else {
        "clean"
    };

    UrlScan {
        url: url.to_string(),
        malicious_count: malicious,
        suspicious_count: suspicious,
        total_scanners: total,
        analysis_url: format!("{GUI_ANALYSIS_BASE}/{analysis_id}"),
        status: status.to_string(),
    }
}

#[async_trait]
impl UrlReputation for VirusTotalClient {
    async fn scan(&self, url: &str) -> Result<UrlScan, SourceError> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| SourceError::MissingCredential(self.key_env.clone()))?;

        let analysis_id = self.submit(key, url).await?;
        let attributes = self.poll(key, &analysis_id).await?;
        Ok(summarize(url, &analysis_id, &attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(raw: &str) -> AnalysisAttributes {
        let parsed: AnalysisResponse = serde_json::from_str(raw).unwrap();
        parsed.data.attributes
    }

    #[test]
    fn malicious_counts_and_totals() {
        let attrs = attributes(
            r#"{"data":{"attributes":{"status":"completed","stats":{"malicious":8,"suspicious":1,"undetected":50,"harmless":11}}}}"#,
        );
        let scan = summarize("http://bad.example", "u-123", &attrs);

        assert_eq!(scan.malicious_count, 8);
        assert_eq!(scan.suspicious_count, 1);
        assert_eq!(scan.total_scanners, 70);
        assert_eq!(scan.status, "malicious");
        assert_eq!(scan.analysis_url, "https://www.virustotal.com/gui/url/u-123");
    }

    #[test]
    fn suspicious_then_clean_statuses() {
        let attrs = attributes(
            r#"{"data":{"attributes":{"status":"completed","stats":{"malicious":0,"suspicious":2,"harmless":60}}}}"#,
        );
        assert_eq!(summarize("u", "id", &attrs).status, "suspicious");

        let attrs = attributes(r#"{"data":{"attributes":{"status":"queued"}}}"#);
        let scan = summarize("u", "id", &attrs);
        assert_eq!(scan.status, "clean");
        assert_eq!(scan.total_scanners, 1);
    }
}
