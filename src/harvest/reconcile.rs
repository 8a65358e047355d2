use crate::harvest::record::{CommentRecord, TextMatch};
use std::collections::HashSet;

/// Merge candidate collections listed in priority order into one
/// duplicate-free collection, newest first.
///
/// The first copy of each identity key wins; later copies are dropped.
/// Ties on timestamp keep their first-seen order.
pub fn merge(collections: &[&[CommentRecord]], mode: TextMatch) -> Vec<CommentRecord> {
    let capacity = collections.iter().map(|c| c.len()).sum();
    let mut seen = HashSet::with_capacity(capacity);
    let mut out: Vec<CommentRecord> = Vec::with_capacity(capacity);

    for record in collections.iter().flat_map(|c| c.iter()) {
        if seen.insert(record.identity(mode)) {
            out.push(record.clone());
        }
    }

    // stable: equal timestamps keep first-seen order
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    out
}

/// Degraded records carry the clock time of the run that extracted them,
/// so their identity key never matches the copy already on disk. Give each
/// one the timestamp of the first stored record with the same content.
pub fn settle_degraded(
    fresh: &mut [CommentRecord],
    stored: &[&[CommentRecord]],
    mode: TextMatch,
) {
    for record in fresh.iter_mut().filter(|r| r.degraded) {
        let known = stored
            .iter()
            .flat_map(|c| c.iter())
            .find(|s| s.same_content(record, mode))
            .map(|s| s.timestamp);
        if let Some(timestamp) = known {
            record.timestamp = timestamp;
        }
    }
}

/// Fresh extraction takes priority over the current archive, which takes
/// priority over the legacy backup.
pub fn reconcile(
    fresh: &[CommentRecord],
    current: &[CommentRecord],
    legacy: &[CommentRecord],
    mode: TextMatch,
) -> Vec<CommentRecord> {
    merge(&[fresh, current, legacy], mode)
}

/// Used when a fetch produced nothing: only the persisted stores take part.
pub fn reconcile_stored(
    current: &[CommentRecord],
    legacy: &[CommentRecord],
    mode: TextMatch,
) -> Vec<CommentRecord> {
    merge(&[current, legacy], mode)
}
