use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the schema in the configured database. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Subjects: one row per tracked handle, aggregates cached on the row
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            handle TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            avatar_url TEXT,
            followers INTEGER NOT NULL DEFAULT 0,
            following INTEGER NOT NULL DEFAULT 0,
            media_count INTEGER NOT NULL DEFAULT 0,
            avg_likes REAL NOT NULL DEFAULT 0,
            avg_comments REAL NOT NULL DEFAULT 0,
            engagement_rate REAL NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Media items: replaced wholesale on refresh; position keeps source order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('photo', 'video')),
            position INTEGER NOT NULL,
            visual_ref TEXT NOT NULL DEFAULT '',
            caption TEXT NOT NULL DEFAULT '',
            likes INTEGER NOT NULL DEFAULT 0,
            comments INTEGER NOT NULL DEFAULT 0,
            views INTEGER NOT NULL DEFAULT 0,
            tags TEXT,
            vibe TEXT,
            quality TEXT,
            captured_at INTEGER,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (owner) REFERENCES subjects(handle)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_media_items_owner ON media_items(owner, kind, position)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
