//! Storage abstraction for Profile Harness.
//!
//! The [`Store`] trait defines every persistence operation the refresh and
//! enrichment pipelines need, so the core can run against SQLite in
//! production and an in-memory store in tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::classify::Enrichment;
use crate::models::{MediaItem, MediaKind, Subject, SubjectHandle};

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_subject`](Store::get_subject) | Load a subject by handle |
/// | [`upsert_subject`](Store::upsert_subject) | Insert or update a subject's fields and statistics |
/// | [`replace_media`](Store::replace_media) | Atomically swap a subject's whole media collection |
/// | [`list_media`](Store::list_media) | Media of a subject in source order |
/// | [`get_media`](Store::get_media) | Load one media item by ID |
/// | [`set_enrichment`](Store::set_enrichment) | Attach classifier output to an item |
/// | [`delete_media_of_kind`](Store::delete_media_of_kind) | Drop all photos or all videos of a subject |
///
/// # Atomicity
///
/// [`replace_media`](Store::replace_media) is one unit: a concurrent reader
/// sees either the old collection or the new one, never an empty or partial
/// set. Concurrent replaces for the same subject are not serialized; the
/// last writer wins.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_subject(&self, handle: &SubjectHandle) -> Result<Option<Subject>>;

    async fn upsert_subject(&self, subject: &Subject) -> Result<()>;

    /// Upsert `subject`, delete every media item it owns, and insert `items`
    /// in order. Returns the inserted items with their assigned IDs.
    async fn replace_media(&self, subject: &Subject, items: &[MediaItem])
        -> Result<Vec<MediaItem>>;

    /// Media owned by `handle` in source order, optionally filtered by kind
    /// and truncated to `limit` items.
    async fn list_media(
        &self,
        handle: &SubjectHandle,
        kind: Option<MediaKind>,
        limit: Option<usize>,
    ) -> Result<Vec<MediaItem>>;

    async fn get_media(&self, id: i64) -> Result<Option<MediaItem>>;

    /// Store classifier output on item `id`. Returns `false` if no such item.
    async fn set_enrichment(&self, id: i64, enrichment: &Enrichment) -> Result<bool>;

    /// Delete all items of `kind` owned by `handle`; returns the count removed.
    async fn delete_media_of_kind(&self, handle: &SubjectHandle, kind: MediaKind) -> Result<u64>;
}
