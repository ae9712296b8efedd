//! Provider trait and the ordered provider registry.
//!
//! A [`Provider`] is one data source in the fallback chain. Built-in
//! providers are the managed scraping service ([`crate::provider_apify`]),
//! the direct public-page fetch ([`crate::provider_direct`]), and the bundled
//! sample dataset ([`crate::provider_sample`]). Custom providers can be
//! registered for tests or alternative sources.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            ProviderRegistry              │
//! │  ┌─────────┐ ┌─────────┐ ┌────────────┐ │
//! │  │ apify   │→│ direct  │→│  sample    │ │
//! │  └─────────┘ └─────────┘ └────────────┘ │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!        SourceResolver::resolve()
//! ```
//!
//! Registration order is priority order.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::models::{RawPayload, SubjectHandle};

// ═══════════════════════════════════════════════════════════════════════
// Provider Trait
// ═══════════════════════════════════════════════════════════════════════

/// A single data source that can attempt to fetch a subject's payload.
///
/// Implementations may fail freely: the resolver converts every error into
/// "no result" and moves on to the next provider.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use profile_harness::models::{RawPayload, SubjectHandle};
/// use profile_harness::traits::Provider;
///
/// struct FixtureProvider;
///
/// #[async_trait]
/// impl Provider for FixtureProvider {
///     fn name(&self) -> &str { "fixture" }
///     fn description(&self) -> &str { "Serves a canned payload" }
///
///     async fn fetch_profile(&self, _handle: &SubjectHandle) -> Result<Option<RawPayload>> {
///         Ok(Some(RawPayload::new(serde_json::json!({ "followersCount": 10 }))))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short identifier used in logs and `phx sources` (e.g. `"apify"`).
    fn name(&self) -> &str;

    /// One-line description of the source.
    fn description(&self) -> &str;

    /// Whether the provider has what it needs to run (credentials, files).
    ///
    /// An unconfigured provider is skipped without being called.
    fn is_configured(&self) -> bool {
        true
    }

    /// Fetch the profile payload for `handle`.
    ///
    /// `Ok(None)` means the source had nothing for this subject.
    async fn fetch_profile(&self, handle: &SubjectHandle) -> Result<Option<RawPayload>>;

    /// Fetch a standalone list of raw media entries for `handle`.
    ///
    /// Most sources only know the profile object; the default is an empty list.
    async fn fetch_media(&self, _handle: &SubjectHandle, _limit: usize) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ProviderRegistry
// ═══════════════════════════════════════════════════════════════════════

/// Ordered collection of providers.
pub struct ProviderRegistry {
    providers: Vec<Box<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Create a registry with the built-in providers in `providers.order`.
    pub fn from_config(config: &Config) -> Result<Self> {
        use crate::provider_apify::ApifyProvider;
        use crate::provider_direct::DirectProvider;
        use crate::provider_sample::SampleProvider;

        let mut registry = Self::new();
        for name in &config.providers.order {
            match name.as_str() {
                "apify" => registry.register(Box::new(ApifyProvider::from_env(
                    config.providers.apify.clone(),
                )?)),
                "direct" => registry.register(Box::new(DirectProvider::new(
                    config.providers.direct.clone(),
                )?)),
                "sample" => registry.register(Box::new(SampleProvider::new(
                    config.providers.sample.path.clone(),
                ))),
                // rejected by config validation
                _ => {}
            }
        }
        Ok(registry)
    }

    /// Append a provider at the lowest priority.
    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.push(provider);
    }

    pub fn providers(&self) -> &[Box<dyn Provider>] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
