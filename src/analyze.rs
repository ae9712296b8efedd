//! Per-item enrichment.
//!
//! Fetches the bytes behind a media item's visual reference, runs the three
//! classifiers over them, and stores the result on the item. A fetch
//! failure is treated like undecodable bytes: the item still gets the
//! fallback labels rather than an error.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::classify::{classify, Enrichment};
use crate::config::AnalysisConfig;
use crate::error::HarnessError;
use crate::store::Store;

/// Content type assumed when the upstream response does not declare one.
pub const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";

/// Enrichment result for one stored item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub id: i64,
    pub tags: Vec<String>,
    pub vibe: String,
    pub quality: String,
}

/// Raw image bytes with their declared content type.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// HTTP client for remote images, with a fixed timeout and a browser-like
/// user agent. Only `http` and `https` URLs are fetched, and bodies are
/// capped at `[analysis].max_image_bytes`.
#[derive(Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl ImageFetcher {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build HTTP client for image fetches")?;
        Ok(Self {
            client,
            max_bytes: config.max_image_bytes,
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        let url = parse_image_url(url)?;
        let mut resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        if !resp.status().is_success() {
            bail!("GET {} returned HTTP {}", url, resp.status());
        }
        if resp.content_length().is_some_and(|len| len > self.max_bytes) {
            bail!("GET {} exceeds {} bytes", url, self.max_bytes);
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_IMAGE_TYPE)
            .to_string();

        // content-length may be absent or wrong; enforce the cap while reading
        let mut bytes = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                bail!("GET {} exceeds {} bytes", url, self.max_bytes);
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

/// Parse a remote image reference. Only `http` and `https` are accepted.
pub fn parse_image_url(raw: &str) -> Result<reqwest::Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("media item has no visual reference");
    }
    let url = reqwest::Url::parse(raw).with_context(|| format!("invalid image URL '{}'", raw))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("unsupported image URL scheme '{}'", other),
    }
}

/// Classify `bytes` and store the labels on item `id`.
///
/// Decoding and the edge/sharpness passes run on the blocking pool.
pub async fn enrich_item(store: &dyn Store, id: i64, bytes: Vec<u8>) -> Result<AnalysisResult> {
    let enrichment = tokio::task::spawn_blocking(move || classify(&bytes))
        .await
        .context("image classification task failed")?;
    if !store.set_enrichment(id, &enrichment).await? {
        return Err(HarnessError::MediaNotFound(id).into());
    }
    let Enrichment {
        tags,
        vibe,
        quality,
    } = enrichment;
    Ok(AnalysisResult {
        id,
        tags,
        vibe,
        quality,
    })
}

/// Fetch, classify and persist enrichment for stored item `id`.
pub async fn analyze_media(
    fetcher: &ImageFetcher,
    store: &dyn Store,
    id: i64,
) -> Result<AnalysisResult> {
    let item = store
        .get_media(id)
        .await?
        .ok_or(HarnessError::MediaNotFound(id))?;

    let bytes = match fetcher.fetch(&item.visual_ref).await {
        Ok(image) => image.bytes,
        Err(e) => {
            tracing::warn!(id, error = %format!("{:#}", e), "image fetch failed, using fallback labels");
            Vec::new()
        }
    };

    let result = enrich_item(store, id, bytes).await?;
    tracing::info!(id, vibe = %result.vibe, quality = %result.quality, "media analyzed");
    Ok(result)
}

/// Classify an image file from disk without touching the store.
pub fn classify_file(path: &Path) -> Result<Enrichment> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(classify(&bytes))
}
