//! In-memory [`Store`] implementation for tests and ephemeral runs.
//!
//! All state sits behind a single `std::sync::RwLock`, so a media
//! replacement happens inside one critical section and readers never see a
//! half-applied refresh.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::classify::Enrichment;
use crate::models::{MediaItem, MediaKind, Subject, SubjectHandle};

use super::Store;

#[derive(Default)]
struct State {
    subjects: HashMap<SubjectHandle, Subject>,
    /// Insertion order is source order.
    media: Vec<MediaItem>,
    next_id: i64,
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_subject(&self, handle: &SubjectHandle) -> Result<Option<Subject>> {
        Ok(self.read()?.subjects.get(handle).cloned())
    }

    async fn upsert_subject(&self, subject: &Subject) -> Result<()> {
        self.write()?
            .subjects
            .insert(subject.handle.clone(), subject.clone());
        Ok(())
    }

    async fn replace_media(
        &self,
        subject: &Subject,
        items: &[MediaItem],
    ) -> Result<Vec<MediaItem>> {
        let mut state = self.write()?;
        state
            .subjects
            .insert(subject.handle.clone(), subject.clone());
        state.media.retain(|m| m.owner != subject.handle);

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            state.next_id += 1;
            let mut stored = item.clone();
            stored.id = Some(state.next_id);
            stored.owner = subject.handle.clone();
            state.media.push(stored.clone());
            inserted.push(stored);
        }
        Ok(inserted)
    }

    async fn list_media(
        &self,
        handle: &SubjectHandle,
        kind: Option<MediaKind>,
        limit: Option<usize>,
    ) -> Result<Vec<MediaItem>> {
        let state = self.read()?;
        Ok(state
            .media
            .iter()
            .filter(|m| &m.owner == handle)
            .filter(|m| kind.map_or(true, |k| m.kind == k))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn get_media(&self, id: i64) -> Result<Option<MediaItem>> {
        Ok(self
            .read()?
            .media
            .iter()
            .find(|m| m.id == Some(id))
            .cloned())
    }

    async fn set_enrichment(&self, id: i64, enrichment: &Enrichment) -> Result<bool> {
        let mut state = self.write()?;
        let Some(item) = state.media.iter_mut().find(|m| m.id == Some(id)) else {
            return Ok(false);
        };
        item.tags = Some(enrichment.tags.clone());
        item.vibe = Some(enrichment.vibe.clone());
        item.quality = Some(enrichment.quality.clone());
        Ok(true)
    }

    async fn delete_media_of_kind(&self, handle: &SubjectHandle, kind: MediaKind) -> Result<u64> {
        let mut state = self.write()?;
        let before = state.media.len();
        state
            .media
            .retain(|m| !(&m.owner == handle && m.kind == kind));
        Ok((before - state.media.len()) as u64)
    }
}
