//! End-to-end tests for the refresh pipeline.
//!
//! These run the resolver → normalizer → reconciler → store chain against
//! stub providers and both store backends, without touching the network.

use anyhow::{bail, Result};
use async_trait::async_trait;
use profile_harness::config::Config;
use profile_harness::error::HarnessError;
use profile_harness::models::{MediaKind, RawPayload, SubjectHandle};
use profile_harness::provider_sample::SampleProvider;
use profile_harness::refresh::{self, RefreshOutcome};
use profile_harness::resolver::SourceResolver;
use profile_harness::sqlite_store::SqliteStore;
use profile_harness::store::memory::InMemoryStore;
use profile_harness::store::Store;
use profile_harness::traits::{Provider, ProviderRegistry};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ─── Stub providers ─────────────────────────────────────────────────

/// Serves a fixed profile payload and, optionally, a separate media list.
struct FixtureProvider {
    profile: Value,
    media: Vec<Value>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Provider for FixtureProvider {
    fn name(&self) -> &str {
        "fixture"
    }

    fn description(&self) -> &str {
        "Canned payload"
    }

    async fn fetch_profile(&self, _handle: &SubjectHandle) -> Result<Option<RawPayload>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(RawPayload::new(self.profile.clone())))
    }

    async fn fetch_media(&self, _handle: &SubjectHandle, limit: usize) -> Result<Vec<Value>> {
        Ok(self.media.iter().take(limit).cloned().collect())
    }
}

/// Always fails, like an unreachable upstream.
struct BrokenProvider {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Provider for BrokenProvider {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always errors"
    }

    async fn fetch_profile(&self, _handle: &SubjectHandle) -> Result<Option<RawPayload>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bail!("connection refused")
    }

    async fn fetch_media(&self, _handle: &SubjectHandle, _limit: usize) -> Result<Vec<Value>> {
        bail!("connection refused")
    }
}

fn handle() -> SubjectHandle {
    SubjectHandle::parse("ralph").unwrap()
}

fn sample_resolver() -> SourceResolver {
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(SampleProvider::new(None)));
    SourceResolver::new(registry)
}

fn fixture_resolver(profile: Value, media: Vec<Value>) -> (SourceResolver, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(FixtureProvider {
        profile,
        media,
        calls: calls.clone(),
    }));
    (SourceResolver::new(registry), calls)
}

fn empty_resolver() -> SourceResolver {
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(BrokenProvider {
        calls: Arc::new(AtomicUsize::new(0)),
    }));
    SourceResolver::new(registry)
}

async fn sqlite_store(tmp: &TempDir) -> SqliteStore {
    let mut config = Config::minimal();
    config.db.path = tmp.path().join("data/phx.sqlite");
    SqliteStore::open(&config).await.unwrap()
}

// ─── Refresh ────────────────────────────────────────────────────────

async fn assert_sample_refresh(store: &dyn Store) {
    let config = Config::minimal();
    let outcome = refresh::run_refresh(&config, &sample_resolver(), store, &handle())
        .await
        .unwrap();

    let RefreshOutcome::Refreshed(report) = outcome else {
        panic!("sample provider should always produce data");
    };
    assert_eq!(report.inserted, 6);
    assert_eq!(report.photos, 4);
    assert_eq!(report.videos, 2);
    assert_eq!(report.subject.display_name, "Ralph Sample");
    assert_eq!(report.subject.followers, 48210);
    assert_eq!(report.subject.avg_likes, 1994.75);
    assert_eq!(report.subject.avg_comments, 80.5);
    assert!((report.subject.engagement_rate - 4.304604853764779).abs() < 1e-9);

    let videos = store
        .list_media(&handle(), Some(MediaKind::Video), None)
        .await
        .unwrap();
    assert_eq!(videos.len(), 2);
    assert_eq!(videos[0].views, 15420);
}

#[tokio::test]
async fn test_refresh_from_sample_in_memory() {
    let store = InMemoryStore::new();
    assert_sample_refresh(&store).await;
}

#[tokio::test]
async fn test_refresh_from_sample_sqlite() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store(&tmp).await;
    assert_sample_refresh(&store).await;
}

#[tokio::test]
async fn test_repeated_refresh_does_not_duplicate_or_drift() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store(&tmp).await;
    let config = Config::minimal();
    let resolver = sample_resolver();

    let mut snapshots = Vec::new();
    for _ in 0..3 {
        let RefreshOutcome::Refreshed(report) =
            refresh::run_refresh(&config, &resolver, &store, &handle())
                .await
                .unwrap()
        else {
            panic!("expected data");
        };
        let count = store.list_media(&handle(), None, None).await.unwrap().len();
        snapshots.push((count, report.subject));
    }
    assert!(snapshots.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(snapshots[0].0, 6);
}

#[tokio::test]
async fn test_refresh_discards_previous_enrichment() {
    let store = InMemoryStore::new();
    let config = Config::minimal();
    let resolver = sample_resolver();
    refresh::run_refresh(&config, &resolver, &store, &handle())
        .await
        .unwrap();

    let first = store.list_media(&handle(), None, Some(1)).await.unwrap();
    let id = first[0].id.unwrap();
    profile_harness::analyze::enrich_item(&store, id, b"not an image".to_vec())
        .await
        .unwrap();
    assert!(store.get_media(id).await.unwrap().unwrap().vibe.is_some());

    refresh::run_refresh(&config, &resolver, &store, &handle())
        .await
        .unwrap();
    assert!(store.get_media(id).await.unwrap().is_none());
    let fresh = store.list_media(&handle(), None, None).await.unwrap();
    assert!(fresh.iter().all(|m| m.vibe.is_none()));
}

#[tokio::test]
async fn test_separate_media_list_is_merged_ahead_of_embedded() {
    let store = InMemoryStore::new();
    let profile = json!({
        "username": "ralph",
        "followersCount": 100,
        "latestPosts": [ { "displayUrl": "embedded.jpg", "likesCount": 1 } ],
    });
    let media = vec![
        json!({ "type": "Image", "displayUrl": "a.jpg", "likesCount": 10, "commentsCount": 2 }),
        json!({ "type": "Video", "videoUrl": "b.mp4", "videoViewCount": 5 }),
    ];
    let (resolver, _) = fixture_resolver(profile, media);

    let RefreshOutcome::Refreshed(report) =
        refresh::run_refresh(&Config::minimal(), &resolver, &store, &handle())
            .await
            .unwrap()
    else {
        panic!("expected data");
    };
    assert_eq!(report.inserted, 3);
    let refs: Vec<String> = store
        .list_media(&handle(), None, None)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.visual_ref)
        .collect();
    assert_eq!(refs, vec!["a.jpg", "", "embedded.jpg"]);
}

#[tokio::test]
async fn test_zero_followers_keeps_rate_through_store() {
    let store = InMemoryStore::new();
    let posts: Vec<Value> = (1..=10)
        .map(|i| json!({ "displayUrl": format!("{}.jpg", i), "likesCount": i * 100, "commentsCount": i }))
        .collect();
    let (resolver, _) = fixture_resolver(json!({ "followersCount": 0, "latestPosts": posts }), vec![]);

    let RefreshOutcome::Refreshed(report) =
        refresh::run_refresh(&Config::minimal(), &resolver, &store, &handle())
            .await
            .unwrap()
    else {
        panic!("expected data");
    };
    assert_eq!(report.subject.engagement_rate, 0.0);
    assert!(report.subject.engagement_rate.is_finite());
    assert_eq!(report.subject.avg_likes, 550.0);
}

#[tokio::test]
async fn test_exhausted_chain_leaves_store_untouched() {
    let store = InMemoryStore::new();
    let config = Config::minimal();
    refresh::run_refresh(&config, &sample_resolver(), &store, &handle())
        .await
        .unwrap();

    let outcome = refresh::run_refresh(&config, &empty_resolver(), &store, &handle())
        .await
        .unwrap();
    assert!(matches!(outcome, RefreshOutcome::NoData { .. }));
    assert_eq!(store.list_media(&handle(), None, None).await.unwrap().len(), 6);
}

// ─── Read side ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_show_creates_subject_once() {
    let store = InMemoryStore::new();
    let (resolver, calls) = fixture_resolver(
        json!({ "fullName": "Ralph R", "followersCount": 12 }),
        vec![],
    );
    let config = Config::minimal();

    let view = refresh::show_subject(&config, &resolver, &store, &handle())
        .await
        .unwrap();
    assert_eq!(view.subject.display_name, "Ralph R");
    assert_eq!(view.subject.followers, 12);
    assert!(view.photos.is_empty());

    refresh::show_subject(&config, &resolver, &store, &handle())
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_show_with_no_data_stores_bare_subject() {
    let store = InMemoryStore::new();
    let view = refresh::show_subject(&Config::minimal(), &empty_resolver(), &store, &handle())
        .await
        .unwrap();
    assert_eq!(view.subject.display_name, "ralph");
    assert_eq!(view.subject.followers, 0);
    assert!(store.get_subject(&handle()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_show_limits_and_recomputes() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store(&tmp).await;
    let mut config = Config::minimal();
    config.refresh.show_photos = 2;
    config.refresh.show_videos = 1;
    let resolver = sample_resolver();
    refresh::run_refresh(&config, &resolver, &store, &handle())
        .await
        .unwrap();

    // Drop the cached aggregates; the view must recompute them.
    let mut stale = store.get_subject(&handle()).await.unwrap().unwrap();
    stale.avg_likes = 0.0;
    stale.avg_comments = 0.0;
    store.upsert_subject(&stale).await.unwrap();

    let view = refresh::show_subject(&config, &resolver, &store, &handle())
        .await
        .unwrap();
    assert_eq!(view.photos.len(), 2);
    assert_eq!(view.videos.len(), 1);
    assert_eq!(view.subject.avg_likes, 1994.75);
    assert_eq!(
        store.get_subject(&handle()).await.unwrap().unwrap().avg_likes,
        1994.75
    );
}

#[tokio::test]
async fn test_raw_payload_statuses() {
    let raw = refresh::raw_payload(&sample_resolver(), &handle()).await;
    assert_eq!(raw.status, "ok");
    assert_eq!(raw.payload.unwrap()["user"]["username"], "ralph");

    let empty = refresh::raw_payload(&empty_resolver(), &handle()).await;
    assert_eq!(empty.status, "empty");
    assert!(empty.payload.is_none());
}

#[tokio::test]
async fn test_clear_videos() {
    let store = InMemoryStore::new();
    refresh::run_refresh(&Config::minimal(), &sample_resolver(), &store, &handle())
        .await
        .unwrap();
    assert_eq!(refresh::clear_videos(&store, &handle()).await.unwrap(), 2);
    assert_eq!(refresh::clear_videos(&store, &handle()).await.unwrap(), 0);
    let rest = store.list_media(&handle(), None, None).await.unwrap();
    assert!(rest.iter().all(|m| m.kind == MediaKind::Photo));
}

#[tokio::test]
async fn test_clear_videos_of_unknown_subject_is_not_found() {
    let store = InMemoryStore::new();
    let err = refresh::clear_videos(&store, &handle()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HarnessError>(),
        Some(HarnessError::SubjectNotFound(h)) if h == "ralph"
    ));
}

#[tokio::test]
async fn test_broken_provider_falls_through_to_sample() {
    let broken_calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(BrokenProvider {
        calls: broken_calls.clone(),
    }));
    registry.register(Box::new(SampleProvider::new(None)));
    let resolver = SourceResolver::new(registry);

    let store = InMemoryStore::new();
    let outcome = refresh::run_refresh(&Config::minimal(), &resolver, &store, &handle())
        .await
        .unwrap();
    assert!(matches!(outcome, RefreshOutcome::Refreshed(_)));
    assert_eq!(broken_calls.load(Ordering::SeqCst), 1);
}
