//! SQLite-backed [`Store`] implementation.
//!
//! The media replacement runs inside one `sqlx` transaction: subject upsert,
//! delete-all and insert-all either commit together or not at all. A
//! transaction dropped before `commit()` (early `?` return, cancelled future)
//! is rolled back by `sqlx`, so a failed refresh leaves the previous
//! collection in place.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::classify::Enrichment;
use crate::config::Config;
use crate::models::{MediaItem, MediaKind, Subject, SubjectHandle};
use crate::store::Store;
use crate::{db, migrate};

/// SQLite implementation of the [`Store`] trait over the `subjects` and
/// `media_items` tables.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Migrate the configured database and open a store over it.
    pub async fn open(config: &Config) -> Result<Self> {
        migrate::run_migrations(config).await?;
        Ok(Self::new(db::connect(config).await?))
    }
}

/// SQLite integers are signed; saturate instead of wrapping.
fn to_sql_int(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn from_sql_int(n: i64) -> u64 {
    n.max(0) as u64
}

fn join_tags(tags: &Option<Vec<String>>) -> Option<String> {
    tags.as_ref().map(|t| t.join(","))
}

fn split_tags(raw: Option<String>) -> Option<Vec<String>> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn subject_from_row(row: &SqliteRow) -> Result<Subject> {
    let handle: String = row.try_get("handle")?;
    Ok(Subject {
        handle: SubjectHandle::parse(&handle)?,
        display_name: row.try_get("display_name")?,
        avatar_url: row.try_get("avatar_url")?,
        followers: from_sql_int(row.try_get("followers")?),
        following: from_sql_int(row.try_get("following")?),
        media_count: from_sql_int(row.try_get("media_count")?),
        avg_likes: row.try_get("avg_likes")?,
        avg_comments: row.try_get("avg_comments")?,
        engagement_rate: row.try_get("engagement_rate")?,
    })
}

fn media_from_row(row: &SqliteRow) -> Result<MediaItem> {
    let owner: String = row.try_get("owner")?;
    let kind: String = row.try_get("kind")?;
    let captured_at: Option<i64> = row.try_get("captured_at")?;
    Ok(MediaItem {
        id: Some(row.try_get("id")?),
        owner: SubjectHandle::parse(&owner)?,
        kind: MediaKind::parse(&kind)
            .with_context(|| format!("unknown media kind in database: {}", kind))?,
        visual_ref: row.try_get("visual_ref")?,
        caption: row.try_get("caption")?,
        likes: from_sql_int(row.try_get("likes")?),
        comments: from_sql_int(row.try_get("comments")?),
        views: from_sql_int(row.try_get("views")?),
        tags: split_tags(row.try_get("tags")?),
        vibe: row.try_get("vibe")?,
        quality: row.try_get("quality")?,
        captured_at: captured_at.and_then(|ts| DateTime::from_timestamp(ts, 0)),
    })
}

async fn upsert_subject_tx(tx: &mut Transaction<'_, Sqlite>, subject: &Subject) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO subjects (handle, display_name, avatar_url, followers, following,
                              media_count, avg_likes, avg_comments, engagement_rate, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(handle) DO UPDATE SET
            display_name = excluded.display_name,
            avatar_url = excluded.avatar_url,
            followers = excluded.followers,
            following = excluded.following,
            media_count = excluded.media_count,
            avg_likes = excluded.avg_likes,
            avg_comments = excluded.avg_comments,
            engagement_rate = excluded.engagement_rate,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(subject.handle.as_str())
    .bind(&subject.display_name)
    .bind(&subject.avatar_url)
    .bind(to_sql_int(subject.followers))
    .bind(to_sql_int(subject.following))
    .bind(to_sql_int(subject.media_count))
    .bind(subject.avg_likes)
    .bind(subject.avg_comments)
    .bind(subject.engagement_rate)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_subject(&self, handle: &SubjectHandle) -> Result<Option<Subject>> {
        let row = sqlx::query("SELECT * FROM subjects WHERE handle = ?")
            .bind(handle.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(subject_from_row).transpose()
    }

    async fn upsert_subject(&self, subject: &Subject) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_subject_tx(&mut tx, subject).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace_media(
        &self,
        subject: &Subject,
        items: &[MediaItem],
    ) -> Result<Vec<MediaItem>> {
        let mut tx = self.pool.begin().await?;

        upsert_subject_tx(&mut tx, subject).await?;

        sqlx::query("DELETE FROM media_items WHERE owner = ?")
            .bind(subject.handle.as_str())
            .execute(&mut *tx)
            .await?;

        let now = chrono::Utc::now().timestamp();
        let mut inserted = Vec::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            let result = sqlx::query(
                r#"
                INSERT INTO media_items (owner, kind, position, visual_ref, caption, likes,
                                         comments, views, tags, vibe, quality, captured_at,
                                         created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(subject.handle.as_str())
            .bind(item.kind.as_str())
            .bind(position as i64)
            .bind(&item.visual_ref)
            .bind(&item.caption)
            .bind(to_sql_int(item.likes))
            .bind(to_sql_int(item.comments))
            .bind(to_sql_int(item.views))
            .bind(join_tags(&item.tags))
            .bind(&item.vibe)
            .bind(&item.quality)
            .bind(item.captured_at.map(|t| t.timestamp()))
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let mut stored = item.clone();
            stored.id = Some(result.last_insert_rowid());
            stored.owner = subject.handle.clone();
            inserted.push(stored);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn list_media(
        &self,
        handle: &SubjectHandle,
        kind: Option<MediaKind>,
        limit: Option<usize>,
    ) -> Result<Vec<MediaItem>> {
        // LIMIT -1 means no limit in SQLite
        let limit = limit.map(|n| n as i64).unwrap_or(-1);
        let rows = sqlx::query(
            r#"
            SELECT * FROM media_items
            WHERE owner = ? AND (? IS NULL OR kind = ?)
            ORDER BY position ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(handle.as_str())
        .bind(kind.map(|k| k.as_str()))
        .bind(kind.map(|k| k.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(media_from_row).collect()
    }

    async fn get_media(&self, id: i64) -> Result<Option<MediaItem>> {
        let row = sqlx::query("SELECT * FROM media_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(media_from_row).transpose()
    }

    async fn set_enrichment(&self, id: i64, enrichment: &Enrichment) -> Result<bool> {
        let result = sqlx::query("UPDATE media_items SET tags = ?, vibe = ?, quality = ? WHERE id = ?")
            .bind(enrichment.tags.join(","))
            .bind(&enrichment.vibe)
            .bind(&enrichment.quality)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_media_of_kind(&self, handle: &SubjectHandle, kind: MediaKind) -> Result<u64> {
        let result = sqlx::query("DELETE FROM media_items WHERE owner = ? AND kind = ?")
            .bind(handle.as_str())
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
