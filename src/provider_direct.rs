//! Direct, unauthenticated fetch of the public profile.
//!
//! Tries three candidate URLs in order:
//!
//! 1. `{base}/api/v1/users/web_profile_info/?username={handle}`
//! 2. `{base}/{handle}/?__a=1&__d=dis`
//! 3. `{base}/{handle}/`
//!
//! A JSON response is parsed directly. Anything else is treated as markup
//! and scanned for an embedded JSON blob: first the early
//! `window._sharedData = {...};` assignment, then the later
//! `<script id="__NEXT_DATA__">` block. Any failure at one candidate moves on
//! to the next; exhausting all three yields no result.

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::config::DirectConfig;
use crate::models::{RawPayload, SubjectHandle};
use crate::traits::Provider;

pub struct DirectProvider {
    config: DirectConfig,
    client: reqwest::Client,
}

impl DirectProvider {
    pub fn new(config: DirectConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build HTTP client for direct fetch")?;
        Ok(Self { config, client })
    }

    fn candidate_urls(&self, handle: &SubjectHandle) -> [String; 3] {
        let base = self.config.base_url.trim_end_matches('/');
        [
            format!("{}/api/v1/users/web_profile_info/?username={}", base, handle),
            format!("{}/{}/?__a=1&__d=dis", base, handle),
            format!("{}/{}/", base, handle),
        ]
    }

    async fn fetch_candidate(&self, url: &str) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .header("X-IG-App-ID", &self.config.app_id)
            .header("Accept", "application/json, text/html;q=0.9")
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        if !resp.status().is_success() {
            bail!("GET {} returned HTTP {}", url, resp.status());
        }

        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));
        let body = resp.text().await?;

        if is_json {
            return serde_json::from_str(&body).context("malformed JSON body");
        }
        extract_embedded_json(&body)
    }
}

#[async_trait]
impl Provider for DirectProvider {
    fn name(&self) -> &str {
        "direct"
    }

    fn description(&self) -> &str {
        "Unauthenticated fetch of the public profile page"
    }

    async fn fetch_profile(&self, handle: &SubjectHandle) -> Result<Option<RawPayload>> {
        for url in self.candidate_urls(handle) {
            match self.fetch_candidate(&url).await {
                Ok(value) => {
                    let payload = RawPayload::new(value);
                    if !payload.is_empty() {
                        return Ok(Some(payload));
                    }
                    tracing::debug!(url = %url, "direct candidate returned an empty object");
                }
                Err(e) => tracing::debug!(url = %url, error = %e, "direct candidate failed"),
            }
        }
        Ok(None)
    }
}

fn shared_data_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)window\._sharedData\s*=\s*(\{.*?\});\s*</script>")
            .expect("static regex")
    })
}

fn next_data_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<script[^>]*id="__NEXT_DATA__"[^>]*>(.*?)</script>"#)
            .expect("static regex")
    })
}

/// Find and parse the first embedded JSON blob in `html`.
///
/// The shared-data assignment takes precedence over the next-data block.
pub fn extract_embedded_json(html: &str) -> Result<Value> {
    let blob = shared_data_re()
        .captures(html)
        .or_else(|| next_data_re().captures(html))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| anyhow::anyhow!("no embedded profile data in markup"))?;
    serde_json::from_str(blob.trim()).context("embedded profile data is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_shared_data() {
        let html = r#"<html><script>window._sharedData = {"entry_data":{"ProfilePage":[{"graphql":{"user":{"username":"ralph"}}}]}};</script></html>"#;
        let v = extract_embedded_json(html).unwrap();
        assert_eq!(
            v.pointer("/entry_data/ProfilePage/0/graphql/user/username"),
            Some(&Value::from("ralph"))
        );
    }

    #[test]
    fn test_extracts_next_data() {
        let html = r#"<body><script id="__NEXT_DATA__" type="application/json">{"props":{"user":{"username":"ralph"}}}</script></body>"#;
        let v = extract_embedded_json(html).unwrap();
        assert_eq!(v["props"]["user"]["username"], "ralph");
    }

    #[test]
    fn test_shared_data_wins_over_next_data() {
        let html = concat!(
            r#"<script>window._sharedData = {"from":"shared"};</script>"#,
            r#"<script id="__NEXT_DATA__" type="application/json">{"from":"next"}</script>"#
        );
        assert_eq!(extract_embedded_json(html).unwrap()["from"], "shared");
    }

    #[test]
    fn test_markup_without_markers_fails() {
        assert!(extract_embedded_json("<html><body>login required</body></html>").is_err());
    }

    #[test]
    fn test_malformed_blob_fails() {
        let html = r#"<script>window._sharedData = {"broken": };</script>"#;
        assert!(extract_embedded_json(html).is_err());
    }

    #[test]
    fn test_candidate_urls_in_order() {
        let provider = DirectProvider::new(DirectConfig {
            base_url: "https://ig.test/".to_string(),
            ..DirectConfig::default()
        })
        .unwrap();
        let urls = provider.candidate_urls(&SubjectHandle::parse("ralph").unwrap());
        assert_eq!(
            urls[0],
            "https://ig.test/api/v1/users/web_profile_info/?username=ralph"
        );
        assert_eq!(urls[1], "https://ig.test/ralph/?__a=1&__d=dis");
        assert_eq!(urls[2], "https://ig.test/ralph/");
    }
}
