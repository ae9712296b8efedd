//! Refresh reconciliation.
//!
//! A refresh replaces a subject's media wholesale: every stored item is
//! dropped and the freshly normalized set is inserted in source order. No
//! per-item identity is tracked across fetches, so enrichment computed for
//! the old items is discarded.
//!
//! Aggregate statistics are recomputed from the first `stats_window` photos
//! of the new set. Videos never contribute.

use crate::models::{MediaItem, MediaKind, NormalizedProfile, Subject, SubjectHandle};

/// The media mutation a refresh applies: delete everything owned by `owner`,
/// then insert `insert`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceSet {
    pub owner: SubjectHandle,
    pub insert: Vec<MediaItem>,
}

/// Result of reconciling one normalized payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub subject: Subject,
    pub replace: ReplaceSet,
}

/// Mean likes, mean comments and engagement rate over a photo sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngagementStats {
    pub avg_likes: f64,
    pub avg_comments: f64,
    /// `None` when the subject has no followers to divide by.
    pub engagement_rate: Option<f64>,
}

impl EngagementStats {
    /// Compute statistics from the first `window` photos in `media`.
    ///
    /// Returns `None` when there are no photos in the window.
    pub fn from_photos<'a, I>(media: I, window: usize, followers: u64) -> Option<Self>
    where
        I: IntoIterator<Item = &'a MediaItem>,
    {
        let sample: Vec<&MediaItem> = media
            .into_iter()
            .filter(|m| m.kind == MediaKind::Photo)
            .take(window)
            .collect();
        if sample.is_empty() {
            return None;
        }

        let n = sample.len() as f64;
        let avg_likes = sample.iter().map(|m| m.likes as f64).sum::<f64>() / n;
        let avg_comments = sample.iter().map(|m| m.comments as f64).sum::<f64>() / n;
        let engagement_rate =
            (followers > 0).then(|| (avg_likes + avg_comments) / followers.max(1) as f64 * 100.0);

        Some(Self {
            avg_likes,
            avg_comments,
            engagement_rate,
        })
    }

    /// Write the statistics onto `subject`, keeping its prior rate when there
    /// is no follower denominator.
    pub fn apply_to(&self, subject: &mut Subject) {
        subject.avg_likes = self.avg_likes;
        subject.avg_comments = self.avg_comments;
        if let Some(rate) = self.engagement_rate {
            subject.engagement_rate = rate;
        }
    }
}

/// Reconcile `subject` against a freshly normalized payload.
///
/// Pure: the caller applies [`ReplaceSet`] and persists the subject.
pub fn reconcile(subject: &Subject, normalized: NormalizedProfile, stats_window: usize) -> Reconciled {
    let mut updated = subject.clone();
    updated.apply_fields(&normalized.fields);

    let insert: Vec<MediaItem> = normalized
        .media
        .into_iter()
        .map(|candidate| MediaItem::from_candidate(&subject.handle, candidate))
        .collect();

    if let Some(stats) = EngagementStats::from_photos(&insert, stats_window, updated.followers) {
        stats.apply_to(&mut updated);
    }

    Reconciled {
        subject: updated,
        replace: ReplaceSet {
            owner: subject.handle.clone(),
            insert,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaCandidate, SubjectFields};

    fn candidate(kind: MediaKind, likes: u64, comments: u64) -> MediaCandidate {
        MediaCandidate {
            kind,
            visual_ref: format!("{}-{}.jpg", kind, likes),
            caption: String::new(),
            likes,
            comments,
            views: 0,
            tags: None,
            captured_at: None,
        }
    }

    fn subject() -> Subject {
        Subject::bare(SubjectHandle::parse("ralph").unwrap())
    }

    fn normalized(followers: u64, media: Vec<MediaCandidate>) -> NormalizedProfile {
        NormalizedProfile {
            fields: SubjectFields {
                display_name: Some("Ralph".into()),
                followers,
                ..SubjectFields::default()
            },
            media,
        }
    }

    #[test]
    fn test_stats_from_first_photos_only() {
        let media = vec![
            candidate(MediaKind::Video, 10_000, 10_000),
            candidate(MediaKind::Photo, 100, 10),
            candidate(MediaKind::Photo, 300, 30),
            candidate(MediaKind::Photo, 999, 999),
        ];
        let out = reconcile(&subject(), normalized(1000, media), 2);
        assert_eq!(out.replace.insert.len(), 4);
        assert_eq!(out.subject.avg_likes, 200.0);
        assert_eq!(out.subject.avg_comments, 20.0);
        assert!((out.subject.engagement_rate - 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_replacement_is_idempotent() {
        let media = vec![
            candidate(MediaKind::Photo, 50, 5),
            candidate(MediaKind::Photo, 70, 7),
            candidate(MediaKind::Video, 1, 1),
        ];
        let first = reconcile(&subject(), normalized(200, media.clone()), 10);
        let second = reconcile(&first.subject, normalized(200, media), 10);
        assert_eq!(first.replace.insert.len(), second.replace.insert.len());
        assert_eq!(first.subject, second.subject);
        assert_eq!(first.replace, second.replace);
    }

    #[test]
    fn test_zero_followers_keeps_prior_rate() {
        let mut prior = subject();
        prior.engagement_rate = 3.5;
        let media = (1..=10)
            .map(|i| candidate(MediaKind::Photo, i * 10, i))
            .collect();
        let out = reconcile(&prior, normalized(0, media), 10);
        assert_eq!(out.subject.engagement_rate, 3.5);
        assert!(out.subject.engagement_rate.is_finite());
        assert_eq!(out.subject.avg_likes, 55.0);
        assert_eq!(out.subject.avg_comments, 5.5);
    }

    #[test]
    fn test_no_photos_leaves_stats_untouched() {
        let mut prior = subject();
        prior.avg_likes = 12.0;
        prior.avg_comments = 3.0;
        prior.engagement_rate = 1.5;
        let out = reconcile(
            &prior,
            normalized(100, vec![candidate(MediaKind::Video, 500, 50)]),
            10,
        );
        assert_eq!(out.subject.avg_likes, 12.0);
        assert_eq!(out.subject.avg_comments, 3.0);
        assert_eq!(out.subject.engagement_rate, 1.5);
        assert_eq!(out.subject.followers, 100);
    }

    #[test]
    fn test_replace_set_owned_by_subject() {
        let out = reconcile(
            &subject(),
            normalized(1, vec![candidate(MediaKind::Photo, 1, 1)]),
            10,
        );
        assert_eq!(out.replace.owner.as_str(), "ralph");
        assert!(out.replace.insert.iter().all(|m| m.owner == out.replace.owner));
        assert!(out.replace.insert.iter().all(|m| m.id.is_none()));
        assert_eq!(out.subject.display_name, "Ralph");
    }
}
