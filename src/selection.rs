//! Choosing the newest relevant item from a media listing
//!
//! Selection is pure: no I/O, no clock, no randomness. The same snapshot always
//! yields the same item, which is what lets the pipeline be tested without hardware.

use crate::types::{ListingSnapshot, MediaItem};

/// Outcome of selecting from a listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// The newest matching item
    Match(MediaItem),
    /// Nothing in the listing matched the predicate
    NoMatch {
        /// How many items the listing held
        listed: usize,
    },
}

impl Selection {
    /// The matched item, if any
    pub fn item(&self) -> Option<&MediaItem> {
        match self {
            Selection::Match(item) => Some(item),
            Selection::NoMatch { .. } => None,
        }
    }
}

/// Select the newest item matching `predicate`
///
/// The item with the greatest `created_at` wins. Among items sharing that
/// timestamp, the one appearing later in the snapshot wins.
///
/// # Examples
///
/// ```
/// use drone_scan::selection::{Selection, select_latest};
/// use drone_scan::types::{ListingSnapshot, MediaItem, MediaKind};
///
/// let snapshot = ListingSnapshot::new(vec![
///     MediaItem::new("1", "DJI_0001.JPG", MediaKind::Photo, 100, 10),
///     MediaItem::new("2", "DJI_0002.MP4", MediaKind::Video, 200, 10),
///     MediaItem::new("3", "DJI_0003.JPG", MediaKind::Photo, 150, 10),
/// ]);
///
/// let selection = select_latest(&snapshot, |item| item.is_photo());
/// assert_eq!(selection.item().map(|i| i.id.as_str()), Some("3"));
/// ```
pub fn select_latest<P>(snapshot: &ListingSnapshot, predicate: P) -> Selection
where
    P: Fn(&MediaItem) -> bool,
{
    let mut best: Option<&MediaItem> = None;
    for item in snapshot.items().iter().filter(|item| predicate(item)) {
        // `>=` so a later item with an equal timestamp replaces the earlier one
        if best.is_none_or(|current| item.created_at >= current.created_at) {
            best = Some(item);
        }
    }

    match best {
        Some(item) => Selection::Match(item.clone()),
        None => Selection::NoMatch {
            listed: snapshot.len(),
        },
    }
}

/// Select the newest photo
pub fn select_latest_photo(snapshot: &ListingSnapshot) -> Selection {
    select_latest(snapshot, MediaItem::is_photo)
}
