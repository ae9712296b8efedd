//! Source resolution across the provider chain.
//!
//! [`SourceResolver`] walks its providers strictly in priority order and
//! returns the first non-empty, well-formed payload. Provider errors never
//! escape: each one is logged and treated as "no result". Providers are never
//! run concurrently; later ones are only consulted when earlier ones come up
//! empty, and partial results are never merged.

use anyhow::Result;
use serde_json::Value;

use crate::config::Config;
use crate::models::{RawPayload, SubjectHandle};
use crate::traits::{Provider, ProviderRegistry};

pub struct SourceResolver {
    registry: ProviderRegistry,
}

impl SourceResolver {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Resolver over the built-in providers in configured order.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(ProviderRegistry::from_config(config)?))
    }

    pub fn providers(&self) -> &[Box<dyn Provider>] {
        self.registry.providers()
    }

    /// Resolve the profile payload for `handle`, or `None` when every
    /// provider came up empty.
    pub async fn resolve(&self, handle: &SubjectHandle) -> Option<RawPayload> {
        for provider in self.registry.providers() {
            if !provider.is_configured() {
                tracing::debug!(provider = provider.name(), "provider not configured, skipping");
                continue;
            }
            match provider.fetch_profile(handle).await {
                Ok(Some(payload)) if !payload.is_empty() => {
                    tracing::info!(provider = provider.name(), handle = %handle, "profile resolved");
                    return Some(payload);
                }
                Ok(_) => {
                    tracing::info!(provider = provider.name(), handle = %handle, "provider returned nothing");
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        handle = %handle,
                        error = %format!("{:#}", e),
                        "provider failed"
                    );
                }
            }
        }
        tracing::warn!(handle = %handle, "all providers exhausted");
        None
    }

    /// Resolve a standalone list of raw media entries for `handle`.
    ///
    /// Same ordering and failure rules as [`resolve`](Self::resolve); the
    /// first non-empty list wins. Exhaustion yields an empty list.
    pub async fn resolve_media(&self, handle: &SubjectHandle, limit: usize) -> Vec<Value> {
        for provider in self.registry.providers() {
            if !provider.is_configured() {
                continue;
            }
            match provider.fetch_media(handle, limit).await {
                Ok(items) if !items.is_empty() => {
                    tracing::info!(
                        provider = provider.name(),
                        handle = %handle,
                        items = items.len(),
                        "media list resolved"
                    );
                    return items;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        handle = %handle,
                        error = %format!("{:#}", e),
                        "media list fetch failed"
                    );
                }
            }
        }
        Vec::new()
    }
}
