//! Core data models used throughout Profile Harness.
//!
//! These types represent the subjects, media items, and raw provider payloads
//! that flow through the resolve → normalize → reconcile pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HarnessError;

/// Longest handle accepted by [`SubjectHandle::parse`].
const MAX_HANDLE_LEN: usize = 64;

/// Validated subject identifier.
///
/// Stored exactly as given (case-sensitive). Providers compare it
/// case-insensitively when picking a result out of a multi-item dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubjectHandle(String);

impl SubjectHandle {
    /// Validate a raw handle.
    ///
    /// A handle must be non-empty, at most 64 characters, and consist of
    /// ASCII letters, digits, `.`, `_` or `-`. A leading `@` is stripped.
    pub fn parse(raw: &str) -> Result<Self, HarnessError> {
        let trimmed = raw.trim();
        let handle = trimmed.strip_prefix('@').unwrap_or(trimmed);
        if handle.is_empty() {
            return Err(HarnessError::InvalidHandle {
                handle: raw.to_string(),
                reason: "handle must not be empty",
            });
        }
        if handle.len() > MAX_HANDLE_LEN {
            return Err(HarnessError::InvalidHandle {
                handle: raw.to_string(),
                reason: "handle is longer than 64 characters",
            });
        }
        if !handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(HarnessError::InvalidHandle {
                handle: raw.to_string(),
                reason: "handle may only contain letters, digits, '.', '_' and '-'",
            });
        }
        Ok(Self(handle.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison used when matching provider results.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim_start_matches('@'))
    }
}

impl fmt::Display for SubjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tracked social-media account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subject {
    pub handle: SubjectHandle,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub followers: u64,
    pub following: u64,
    pub media_count: u64,
    pub avg_likes: f64,
    pub avg_comments: f64,
    pub engagement_rate: f64,
}

impl Subject {
    /// A subject with no profile data yet: named after its handle, all counts zero.
    pub fn bare(handle: SubjectHandle) -> Self {
        Self {
            display_name: handle.as_str().to_string(),
            handle,
            avatar_url: None,
            followers: 0,
            following: 0,
            media_count: 0,
            avg_likes: 0.0,
            avg_comments: 0.0,
            engagement_rate: 0.0,
        }
    }

    /// Overwrite the profile fields with freshly normalized values.
    ///
    /// Aggregate statistics are untouched; they are owned by the reconciler.
    pub fn apply_fields(&mut self, fields: &SubjectFields) {
        if let Some(name) = &fields.display_name {
            self.display_name = name.clone();
        }
        self.avatar_url = fields.avatar_url.clone();
        self.followers = fields.followers;
        self.following = fields.following;
        self.media_count = fields.media_count;
    }
}

/// Kind of a canonical media record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(MediaKind::Photo),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical photo or video record owned by exactly one [`Subject`].
///
/// `id` is `None` until the store assigns one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaItem {
    pub id: Option<i64>,
    pub owner: SubjectHandle,
    pub kind: MediaKind,
    pub visual_ref: String,
    pub caption: String,
    pub likes: u64,
    pub comments: u64,
    /// Only meaningful for [`MediaKind::Video`]; always zero for photos.
    pub views: u64,
    /// Source-provided keywords (videos) or classifier tags after enrichment.
    pub tags: Option<Vec<String>>,
    pub vibe: Option<String>,
    pub quality: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
}

impl MediaItem {
    /// Attach a normalized candidate to its owner.
    pub fn from_candidate(owner: &SubjectHandle, candidate: MediaCandidate) -> Self {
        Self {
            id: None,
            owner: owner.clone(),
            kind: candidate.kind,
            visual_ref: candidate.visual_ref,
            caption: candidate.caption,
            likes: candidate.likes,
            comments: candidate.comments,
            views: candidate.views,
            tags: candidate.tags,
            vibe: None,
            quality: None,
            captured_at: candidate.captured_at,
        }
    }
}

/// Opaque source-shaped payload returned by a provider.
///
/// Never persisted; consumed once by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RawPayload(Value);

impl RawPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// A payload is usable only when it is a JSON object with at least one key.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Object(map) => map.is_empty(),
            _ => true,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Canonical profile fields extracted from a payload.
///
/// `display_name` is `None` when no synonym resolved; callers fall back to
/// the handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectFields {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub followers: u64,
    pub following: u64,
    pub media_count: u64,
}

/// A media item that has been normalized but not yet attached to a subject.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaCandidate {
    pub kind: MediaKind,
    pub visual_ref: String,
    pub caption: String,
    pub likes: u64,
    pub comments: u64,
    pub views: u64,
    pub tags: Option<Vec<String>>,
    pub captured_at: Option<DateTime<Utc>>,
}

/// Output of the normalizer: profile fields plus media in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedProfile {
    pub fields: SubjectFields,
    pub media: Vec<MediaCandidate>,
}
