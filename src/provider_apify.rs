//! Managed scraping service provider (Apify).
//!
//! Runs the profile-scraper actor synchronously and reads its dataset items
//! through the `run-sync-get-dataset-items` endpoint. A second actor (the
//! post scraper) supplies the standalone media list.
//!
//! # Configuration
//!
//! ```toml
//! [providers.apify]
//! token_env = "APIFY_API_TOKEN"
//! profile_actor = "apify~instagram-profile-scraper"
//! posts_actor = "apify~instagram-post-scraper"
//! results_limit = 50
//! posts_limit = 20
//! scrape_reels = true
//! ```
//!
//! # Credentials
//!
//! The bearer token is read from the environment variable named by
//! `token_env` when the provider is built. Without a token the provider
//! reports itself as unconfigured and the resolver skips it.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ApifyConfig;
use crate::models::{RawPayload, SubjectHandle};
use crate::traits::Provider;

/// Keys whose presence marks a dataset item as an aggregated profile.
const PROFILE_AGGREGATE_KEYS: &[&str] = &["latestPosts", "latestReels", "latest_posts"];

pub struct ApifyProvider {
    config: ApifyConfig,
    token: Option<String>,
    client: reqwest::Client,
}

impl ApifyProvider {
    /// Build the provider, reading the token from `config.token_env`.
    pub fn from_env(config: ApifyConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::with_token(config, token)
    }

    pub fn with_token(config: ApifyConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client for apify")?;
        Ok(Self {
            config,
            token,
            client,
        })
    }

    /// Run `actor` with `input` and return its dataset items.
    async fn run_actor(&self, actor: &str, input: Value) -> Result<Vec<Value>> {
        let Some(token) = &self.token else {
            bail!("{} is not set", self.config.token_env);
        };
        let url = format!(
            "{}/acts/{}/run-sync-get-dataset-items",
            self.config.base_url.trim_end_matches('/'),
            actor
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&input)
            .send()
            .await
            .with_context(|| format!("Apify actor {} request failed", actor))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Apify actor {} failed (HTTP {}): {}",
                actor,
                status,
                body.chars().take(300).collect::<String>()
            );
        }

        let items: Vec<Value> = resp
            .json()
            .await
            .with_context(|| format!("Apify actor {} returned malformed JSON", actor))?;

        if self.config.debug_dump {
            tracing::debug!(
                actor,
                dataset = %serde_json::to_string_pretty(&items).unwrap_or_default(),
                "apify dataset dump"
            );
        }
        Ok(items)
    }
}

#[async_trait]
impl Provider for ApifyProvider {
    fn name(&self) -> &str {
        "apify"
    }

    fn description(&self) -> &str {
        "Managed scraping service (Apify actors)"
    }

    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn fetch_profile(&self, handle: &SubjectHandle) -> Result<Option<RawPayload>> {
        if self.token.is_none() {
            return Ok(None);
        }
        let input = json!({
            "usernames": [handle.as_str()],
            "resultsLimit": self.config.results_limit,
            "scrapeReels": self.config.scrape_reels,
        });
        let items = self.run_actor(&self.config.profile_actor, input).await?;
        tracing::debug!(handle = %handle, items = items.len(), "apify profile dataset");
        Ok(select_profile_item(handle, items).map(RawPayload::new))
    }

    async fn fetch_media(&self, handle: &SubjectHandle, limit: usize) -> Result<Vec<Value>> {
        if self.token.is_none() {
            return Ok(Vec::new());
        }
        let input = json!({
            "directUrls": [format!("https://www.instagram.com/{}/", handle)],
            "resultsLimit": limit,
        });
        self.run_actor(&self.config.posts_actor, input).await
    }
}

/// Pick the dataset item that describes `handle`.
///
/// Preference: an item whose `username` (or `user.username`) matches the
/// handle case-insensitively, then the first item carrying aggregated media
/// lists, then the first item.
pub fn select_profile_item(handle: &SubjectHandle, items: Vec<Value>) -> Option<Value> {
    let username_of = |item: &Value| -> Option<String> {
        item.get("username")
            .and_then(Value::as_str)
            .or_else(|| item.pointer("/user/username").and_then(Value::as_str))
            .map(str::to_string)
    };

    if let Some(pos) = items
        .iter()
        .position(|item| username_of(item).is_some_and(|u| handle.matches(&u)))
    {
        return items.into_iter().nth(pos);
    }

    if let Some(pos) = items.iter().position(|item| {
        item.as_object()
            .is_some_and(|obj| PROFILE_AGGREGATE_KEYS.iter().any(|k| obj.contains_key(*k)))
    }) {
        return items.into_iter().nth(pos);
    }

    items.into_iter().next()
}
