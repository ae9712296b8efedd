//! Refresh orchestration: resolve → normalize → reconcile → store.
//!
//! Also hosts the read-side operations that share the same pipeline pieces:
//! the profile view (with live aggregates), first-sight subject creation,
//! raw payload inspection, and video clean-up.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::HarnessError;
use crate::models::{MediaItem, MediaKind, Subject, SubjectHandle};
use crate::normalize::{normalize, normalize_with_media};
use crate::reconcile::{reconcile, EngagementStats};
use crate::resolver::SourceResolver;
use crate::store::Store;

/// Summary of one completed refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub subject: Subject,
    pub inserted: usize,
    pub photos: usize,
    pub videos: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Refreshed(RefreshReport),
    /// Every provider came up empty; stored state is untouched.
    NoData { handle: SubjectHandle },
}

/// Subject plus a bounded slice of its media.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub subject: Subject,
    pub photos: Vec<MediaItem>,
    pub videos: Vec<MediaItem>,
}

/// Resolved payload as the provider returned it.
#[derive(Debug, Clone, Serialize)]
pub struct RawView {
    pub handle: SubjectHandle,
    /// `"ok"` or `"empty"`.
    pub status: &'static str,
    pub payload: Option<Value>,
}

/// Refresh `handle`: replace its media with the freshly resolved set and
/// recompute its statistics.
pub async fn run_refresh(
    config: &Config,
    resolver: &SourceResolver,
    store: &dyn Store,
    handle: &SubjectHandle,
) -> Result<RefreshOutcome> {
    let Some(payload) = resolver.resolve(handle).await else {
        return Ok(RefreshOutcome::NoData {
            handle: handle.clone(),
        });
    };
    let extra_media = resolver
        .resolve_media(handle, config.providers.apify.posts_limit)
        .await;

    let existing = store
        .get_subject(handle)
        .await?
        .unwrap_or_else(|| Subject::bare(handle.clone()));

    let normalized = normalize_with_media(&payload, &extra_media);
    let reconciled = reconcile(&existing, normalized, config.refresh.stats_window);
    let inserted = store
        .replace_media(&reconciled.subject, &reconciled.replace.insert)
        .await?;

    let photos = inserted
        .iter()
        .filter(|m| m.kind == MediaKind::Photo)
        .count();
    let report = RefreshReport {
        subject: reconciled.subject,
        inserted: inserted.len(),
        photos,
        videos: inserted.len() - photos,
    };
    tracing::info!(
        handle = %handle,
        photos = report.photos,
        videos = report.videos,
        "refresh complete"
    );
    Ok(RefreshOutcome::Refreshed(report))
}

/// Load `handle`, creating it from a one-off resolution if it is not stored yet.
///
/// Only profile fields are stored; media is left for an explicit refresh.
/// When nothing resolves, a bare subject named after the handle is stored.
pub async fn ensure_subject(
    resolver: &SourceResolver,
    store: &dyn Store,
    handle: &SubjectHandle,
) -> Result<Subject> {
    if let Some(subject) = store.get_subject(handle).await? {
        return Ok(subject);
    }

    let mut subject = Subject::bare(handle.clone());
    match resolver.resolve(handle).await {
        Some(payload) => subject.apply_fields(&normalize(&payload).fields),
        None => tracing::info!(handle = %handle, "no profile data, storing bare subject"),
    }
    store.upsert_subject(&subject).await?;
    Ok(subject)
}

/// Profile view with aggregates recomputed from the stored photos.
pub async fn show_subject(
    config: &Config,
    resolver: &SourceResolver,
    store: &dyn Store,
    handle: &SubjectHandle,
) -> Result<ProfileView> {
    let mut subject = ensure_subject(resolver, store, handle).await?;

    let window = config.refresh.stats_window;
    let sample = store
        .list_media(handle, Some(MediaKind::Photo), Some(window))
        .await?;
    if let Some(stats) = EngagementStats::from_photos(&sample, window, subject.followers) {
        stats.apply_to(&mut subject);
        store.upsert_subject(&subject).await?;
    }

    let photos = store
        .list_media(handle, Some(MediaKind::Photo), Some(config.refresh.show_photos))
        .await?;
    let videos = store
        .list_media(handle, Some(MediaKind::Video), Some(config.refresh.show_videos))
        .await?;

    Ok(ProfileView {
        subject,
        photos,
        videos,
    })
}

/// Resolve without normalizing or storing anything.
pub async fn raw_payload(resolver: &SourceResolver, handle: &SubjectHandle) -> RawView {
    let payload = resolver.resolve(handle).await;
    RawView {
        handle: handle.clone(),
        status: if payload.is_some() { "ok" } else { "empty" },
        payload: payload.map(|p| p.into_value()),
    }
}

/// Delete every video owned by `handle`. Returns the number removed.
///
/// Fails with [`HarnessError::SubjectNotFound`] when `handle` was never stored.
pub async fn clear_videos(store: &dyn Store, handle: &SubjectHandle) -> Result<u64> {
    if store.get_subject(handle).await?.is_none() {
        return Err(HarnessError::SubjectNotFound(handle.to_string()).into());
    }
    let removed = store.delete_media_of_kind(handle, MediaKind::Video).await?;
    tracing::info!(handle = %handle, removed, "videos cleared");
    Ok(removed)
}
