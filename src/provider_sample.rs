//! Bundled static fallback dataset.
//!
//! Last provider in the default chain. Serves the JSON file configured in
//! `[providers.sample].path`, or the dataset compiled into the binary when no
//! path is set or the file cannot be read. The same payload is returned for
//! every handle.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{RawPayload, SubjectHandle};
use crate::traits::Provider;

const BUNDLED_SAMPLE: &str = include_str!("../data/sample_profile.json");

pub struct SampleProvider {
    path: Option<PathBuf>,
}

impl SampleProvider {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<Value> {
        if let Some(path) = &self.path {
            match std::fs::read_to_string(path) {
                Ok(text) => {
                    return serde_json::from_str(&text)
                        .with_context(|| format!("invalid sample JSON: {}", path.display()));
                }
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "sample file unreadable, using bundled dataset"
                ),
            }
        }
        serde_json::from_str(BUNDLED_SAMPLE).context("bundled sample is not valid JSON")
    }
}

#[async_trait]
impl Provider for SampleProvider {
    fn name(&self) -> &str {
        "sample"
    }

    fn description(&self) -> &str {
        "Static sample dataset"
    }

    async fn fetch_profile(&self, _handle: &SubjectHandle) -> Result<Option<RawPayload>> {
        let payload = RawPayload::new(self.load()?);
        Ok((!payload.is_empty()).then_some(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bundled_sample_is_served() {
        let provider = SampleProvider::new(None);
        let handle = SubjectHandle::parse("anyone").unwrap();
        let payload = provider.fetch_profile(&handle).await.unwrap().unwrap();
        assert_eq!(payload.as_value()["user"]["username"], "ralph");
    }

    #[tokio::test]
    async fn test_configured_file_overrides_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        std::fs::write(&path, r#"{"fullName": "From File"}"#).unwrap();

        let provider = SampleProvider::new(Some(path));
        let handle = SubjectHandle::parse("anyone").unwrap();
        let payload = provider.fetch_profile(&handle).await.unwrap().unwrap();
        assert_eq!(payload.as_value()["fullName"], "From File");
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_bundle() {
        let provider = SampleProvider::new(Some(PathBuf::from("/nonexistent/sample.json")));
        let handle = SubjectHandle::parse("anyone").unwrap();
        assert!(provider.fetch_profile(&handle).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_object_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        std::fs::write(&path, "{}").unwrap();

        let provider = SampleProvider::new(Some(path));
        let handle = SubjectHandle::parse("anyone").unwrap();
        assert!(provider.fetch_profile(&handle).await.unwrap().is_none());
    }
}
