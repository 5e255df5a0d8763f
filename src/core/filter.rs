//! Breed quota filter.
//!
//! Decides which images of one breed stay so the breed ends up with between
//! `min_count` and `max_count` images. Flagged images (a person in frame)
//! go first, then random images if the breed is still over the maximum.

use rand::seq::index;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Detector outcome for one image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    /// The disqualifying object was detected
    Flagged,
    Clean,
}

/// One image of a bucket, identified by file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageItem {
    pub name: String,
    pub tag: Tag,
}

impl ImageItem {
    pub fn new(name: impl Into<String>, tag: Tag) -> Self {
        Self {
            name: name.into(),
            tag,
        }
    }
}

/// Target range for the number of images a bucket keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaBounds {
    pub min_count: usize,
    pub max_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalReason {
    /// Dropped in the flagged pass
    Flagged,
    /// Dropped at random to get under the maximum
    Excess,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub item: ImageItem,
    pub reason: RemovalReason,
}

/// Partition of a bucket into kept and removed items.
///
/// Both lists are ordered by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionDecision {
    pub kept: Vec<ImageItem>,
    pub removed: Vec<Removal>,
    /// How many images short of `min_count` the bucket is, if any
    pub shortfall: Option<usize>,
}

impl RetentionDecision {
    pub fn removed_with(&self, reason: RemovalReason) -> usize {
        self.removed.iter().filter(|r| r.reason == reason).count()
    }
}

/// Decide which items of a bucket to keep.
///
/// Order policy: items are considered in lexicographic file-name order, and
/// the flagged pass removes the first flagged items in that order, keeping
/// the last `max(0, min_count - clean)` of them. If the bucket is still over
/// `max_count`, the excess is sampled uniformly without replacement from the
/// kept flagged items followed by the clean items. The count never drops
/// below `min_count`, and a bucket smaller than `min_count` is left whole.
pub fn filter_bucket<R: Rng + ?Sized>(
    items: &[ImageItem],
    bounds: QuotaBounds,
    rng: &mut R,
) -> RetentionDecision {
    let mut ordered: Vec<&ImageItem> = items.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));
    ordered.dedup_by(|a, b| a.name == b.name);

    let (flagged, clean): (Vec<&ImageItem>, Vec<&ImageItem>) =
        ordered.iter().copied().partition(|item| item.tag == Tag::Flagged);

    let required_flagged_to_keep = bounds.min_count.saturating_sub(clean.len());
    let flagged_to_remove = flagged.len().saturating_sub(required_flagged_to_keep);
    let (removed_flagged, kept_flagged) = flagged.split_at(flagged_to_remove);

    let mut removed: BTreeSet<&str> = BTreeSet::new();
    let mut reasons: Vec<(&ImageItem, RemovalReason)> = Vec::new();
    for &item in removed_flagged {
        if removed.insert(item.name.as_str()) {
            reasons.push((item, RemovalReason::Flagged));
        }
    }

    let total = clean.len() + kept_flagged.len();
    if total > bounds.max_count {
        let mut excess = total - bounds.max_count;
        if total - excess < bounds.min_count {
            excess = total.saturating_sub(bounds.min_count);
        }

        let pool: Vec<&ImageItem> = kept_flagged.iter().chain(clean.iter()).copied().collect();
        if excess > 0 && pool.len() >= excess {
            for idx in index::sample(rng, pool.len(), excess).iter() {
                let item = pool[idx];
                if removed.insert(item.name.as_str()) {
                    reasons.push((item, RemovalReason::Excess));
                }
            }
        }
    }

    reasons.sort_by(|a, b| a.0.name.cmp(&b.0.name));
    let removed_items = reasons
        .into_iter()
        .map(|(item, reason)| Removal {
            item: item.clone(),
            reason,
        })
        .collect::<Vec<_>>();

    let kept: Vec<ImageItem> = ordered
        .iter()
        .filter(|item| !removed.contains(item.name.as_str()))
        .map(|item| (*item).clone())
        .collect();

    let shortfall = (ordered.len() < bounds.min_count).then(|| bounds.min_count - ordered.len());

    debug!(
        "Quota decision: {} items ({} flagged, {} clean) -> keep {}, remove {}",
        ordered.len(),
        flagged.len(),
        clean.len(),
        kept.len(),
        removed_items.len()
    );

    RetentionDecision {
        kept,
        removed: removed_items,
        shortfall,
    }
}
