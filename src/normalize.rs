//! Schema normalization and media disambiguation.
//!
//! Providers return profile data in several shapes whose key names drift
//! between sources and source versions. This module maps any of them onto
//! [`NormalizedProfile`] using declarative accessor tables: each canonical
//! field owns an ordered list of key paths, and the first *present* path
//! wins. Paths are dotted (`edge_followed_by.count`); numeric segments index
//! into arrays (`edge_media_to_caption.edges.0.node.text`).
//!
//! Accepted shapes:
//!
//! - a flat profile object, counts under any synonym;
//! - a profile carrying embedded media lists (`latestPosts`, timeline edges…);
//! - a separate list of raw media entries fetched on its own
//!   ([`normalize_with_media`]).
//!
//! Every raw media entry yields exactly one candidate. Entries with no
//! resolvable visual reference keep an empty reference instead of being
//! dropped, and numeric fields fall back to zero.
//!
//! # Video detection
//!
//! An entry is a video when any of these holds:
//!
//! 1. `isVideo` / `is_video` is truthy;
//! 2. `type` / `mediaType` / `media_type` equals `"video"` ignoring case;
//! 3. `videoUrl` / `video_url` is a non-empty string.
//!
//! Otherwise it is a photo. A video that carries none of those signals is
//! classified as a photo; that false negative is a known limitation.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::models::{MediaCandidate, MediaKind, NormalizedProfile, RawPayload, SubjectFields};

// ═══════════════════════════════════════════════════════════════════════
// Accessor tables
// ═══════════════════════════════════════════════════════════════════════

/// Locations of the profile object inside wrapped payloads, tried in order.
/// Only consulted when the payload carries no profile field or media list of
/// its own; otherwise the payload is the profile itself.
const PROFILE_ROOTS: &[&str] = &[
    "data.user",
    "graphql.user",
    "user",
    "entry_data.ProfilePage.0.graphql.user",
];

const DISPLAY_NAME: &[&str] = &["fullName", "full_name", "name"];
const AVATAR: &[&str] = &[
    "profilePicUrlHD",
    "profilePicUrl",
    "profile_pic_url_hd",
    "profile_pic_url",
    "profilePicture",
];
const FOLLOWERS: &[&str] = &[
    "followersCount",
    "followers_count",
    "followers",
    "edge_followed_by.count",
];
const FOLLOWING: &[&str] = &[
    "followsCount",
    "followingCount",
    "following_count",
    "following",
    "edge_follow.count",
];
const MEDIA_COUNT: &[&str] = &[
    "postsCount",
    "posts_count",
    "mediaCount",
    "media_count",
    "edge_owner_to_timeline_media.count",
];

/// Embedded media list groups. Within a group the first list present wins;
/// groups are concatenated in this order.
const POST_LISTS: &[&str] = &[
    "latestPosts",
    "latest_posts",
    "posts",
    "edge_owner_to_timeline_media.edges",
];
const REEL_LISTS: &[&str] = &[
    "latestReels",
    "latest_reels",
    "latestReelsPosts",
    "reels",
    "edge_felix_video_timeline.edges",
];

const VIDEO_FLAGS: &[&str] = &["isVideo", "is_video"];
const TYPE_FIELDS: &[&str] = &["type", "mediaType", "media_type"];
const VIDEO_URLS: &[&str] = &["videoUrl", "video_url"];

const PHOTO_VISUAL: &[&str] = &[
    "displayUrl",
    "display_url",
    "url",
    "imageUrl",
    "image_url",
    "thumbnail_src",
];
const VIDEO_VISUAL: &[&str] = &[
    "thumbnailUrl",
    "thumbnail_url",
    "displayUrl",
    "display_url",
    "imageUrl",
    "image_url",
];
const CAPTION: &[&str] = &[
    "caption",
    "edge_media_to_caption.edges.0.node.text",
    "description",
    "title",
];
const LIKES: &[&str] = &[
    "likesCount",
    "likes",
    "like_count",
    "edge_liked_by.count",
    "edge_media_preview_like.count",
];
const COMMENTS: &[&str] = &[
    "commentsCount",
    "comments",
    "comment_count",
    "edge_media_to_comment.count",
];
const VIEWS: &[&str] = &[
    "viewsCount",
    "views",
    "playCount",
    "videoPlayCount",
    "video_view_count",
    "video_play_count",
];
const KEYWORDS: &[&str] = &["tags", "keywords", "hashtags"];
const TIMESTAMP: &[&str] = &["timestamp", "taken_at_timestamp", "taken_at", "postedAt"];

// ═══════════════════════════════════════════════════════════════════════
// Entry points
// ═══════════════════════════════════════════════════════════════════════

/// Normalize a profile payload and its embedded media.
pub fn normalize(payload: &RawPayload) -> NormalizedProfile {
    normalize_with_media(payload, &[])
}

/// Normalize a profile payload together with a separately fetched media list.
///
/// The separate list comes first, followed by embedded posts and then
/// embedded reels, each in source order.
pub fn normalize_with_media(payload: &RawPayload, extra_media: &[Value]) -> NormalizedProfile {
    let root = profile_root(payload.as_value());

    let fields = SubjectFields {
        display_name: first_present(root, DISPLAY_NAME)
            .and_then(Value::as_str)
            .map(str::to_string),
        avatar_url: first_present(root, AVATAR)
            .and_then(Value::as_str)
            .map(str::to_string),
        followers: count_of(root, FOLLOWERS),
        following: count_of(root, FOLLOWING),
        media_count: count_of(root, MEDIA_COUNT),
    };

    let embedded = [POST_LISTS, REEL_LISTS]
        .into_iter()
        .filter_map(|group| first_present(root, group).and_then(Value::as_array))
        .flatten();

    let media = extra_media
        .iter()
        .chain(embedded)
        .map(normalize_item)
        .collect();

    NormalizedProfile { fields, media }
}

/// Media-type heuristic. See the module docs for the rules.
pub fn is_video(item: &Value) -> bool {
    let item = unwrap_node(item);

    let flagged = VIDEO_FLAGS
        .iter()
        .filter_map(|k| lookup(item, k))
        .any(is_truthy);
    let typed = TYPE_FIELDS
        .iter()
        .filter_map(|k| lookup(item, k).and_then(Value::as_str))
        .any(|t| t.trim().eq_ignore_ascii_case("video"));
    let has_url = VIDEO_URLS
        .iter()
        .filter_map(|k| lookup(item, k).and_then(Value::as_str))
        .any(|u| !u.trim().is_empty());

    flagged || typed || has_url
}

/// Convert one raw media entry into a candidate.
pub fn normalize_item(raw: &Value) -> MediaCandidate {
    let item = unwrap_node(raw);
    let kind = if is_video(item) {
        MediaKind::Video
    } else {
        MediaKind::Photo
    };

    let visual_keys = match kind {
        MediaKind::Photo => PHOTO_VISUAL,
        MediaKind::Video => VIDEO_VISUAL,
    };

    MediaCandidate {
        kind,
        visual_ref: string_of(item, visual_keys),
        caption: string_of(item, CAPTION),
        likes: count_of(item, LIKES),
        comments: count_of(item, COMMENTS),
        views: match kind {
            MediaKind::Video => count_of(item, VIEWS),
            MediaKind::Photo => 0,
        },
        tags: match kind {
            MediaKind::Video => first_present(item, KEYWORDS).and_then(keyword_list),
            MediaKind::Photo => None,
        },
        captured_at: first_present(item, TIMESTAMP).and_then(timestamp_of),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Accessors
// ═══════════════════════════════════════════════════════════════════════

fn profile_root(value: &Value) -> &Value {
    if has_profile_fields(value) {
        return value;
    }
    PROFILE_ROOTS
        .iter()
        .filter_map(|path| lookup(value, path))
        .find(|v| v.is_object())
        .unwrap_or(value)
}

/// True when `value` carries any canonical profile field or media list at
/// its own level. Scraper items nest a `user` object next to the real
/// profile fields, so a wrapper path alone is not enough to descend.
fn has_profile_fields(value: &Value) -> bool {
    [
        DISPLAY_NAME,
        AVATAR,
        FOLLOWERS,
        FOLLOWING,
        MEDIA_COUNT,
        POST_LISTS,
        REEL_LISTS,
    ]
    .iter()
    .any(|paths| first_present(value, paths).is_some())
}

/// Graph-style edges wrap each entry as `{"node": {...}}`.
fn unwrap_node(item: &Value) -> &Value {
    match item.get("node") {
        Some(node) if node.is_object() => node,
        _ => item,
    }
}

/// Follow a dotted path. Numeric segments index arrays.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// A value is present when it is not null and, for strings, not blank.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn first_present<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|p| lookup(value, p))
        .find(|v| is_present(v))
}

fn string_of(value: &Value, paths: &[&str]) -> String {
    first_present(value, paths)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn count_of(value: &Value, paths: &[&str]) -> u64 {
    first_present(value, paths).map(coerce_count).unwrap_or(0)
}

/// Non-negative integer from a JSON number or numeric string; anything else is zero.
fn coerce_count(value: &Value) -> u64 {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n.is_finite() && n > 0.0 => n as u64,
        _ => 0,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

/// Accept either a comma-delimited string or a sequence of strings.
fn keyword_list(value: &Value) -> Option<Vec<String>> {
    let tags: Vec<String> = match value {
        Value::String(s) => s.split(',').map(clean_keyword).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(clean_keyword)
            .collect(),
        _ => return None,
    };
    let tags: Vec<String> = tags.into_iter().filter(|t| !t.is_empty()).collect();
    Some(tags)
}

fn clean_keyword(s: &str) -> String {
    s.trim().trim_start_matches('#').to_string()
}

/// Unix seconds (number or numeric string) or an RFC 3339 string.
fn timestamp_of(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s.trim()) {
                return Some(dt.with_timezone(&Utc));
            }
            s.trim().parse::<i64>().ok()
        }
        _ => None,
    }?;
    Utc.timestamp_opt(secs, 0).single()
}
