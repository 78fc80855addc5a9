//! Group sanitizer: repair page references proposed by the splitter.
//!
//! The splitter regularly cites pages past the end of the file. Extraction
//! selects content by page index, so every group is corrected in place
//! before anything reads from it:
//!
//! 1. indices above `max_pages` become `max_pages`, indices below 1 become 1
//! 2. duplicates are removed, keeping the first occurrence
//! 3. groups left without pages are dropped
//!
//! Every correction is logged at `warn` and flags the group as `modified`.
//! Running the sanitizer twice changes nothing the second time.

use crate::document::DocumentGroup;
use std::collections::HashSet;
use tracing::warn;

/// Correct `groups` in place against a file of `max_pages` pages.
///
/// Returns the number of groups that were changed or dropped.
pub fn sanitize(groups: &mut Vec<DocumentGroup>, max_pages: usize) -> usize {
    let max_pages = max_pages.max(1);
    let mut corrections = 0;

    for (i, group) in groups.iter_mut().enumerate() {
        let mut changed = false;

        for p in group.pages.iter_mut() {
            let clamped = (*p).clamp(1, max_pages);
            if clamped != *p {
                warn!(
                    group = i + 1,
                    page = *p,
                    "Page {} is outside 1..={}; clamped to {}",
                    *p,
                    max_pages,
                    clamped
                );
                *p = clamped;
                changed = true;
            }
        }

        let before = group.pages.len();
        let mut seen = HashSet::with_capacity(before);
        group.pages.retain(|p| seen.insert(*p));
        if group.pages.len() != before {
            warn!(
                group = i + 1,
                "Removed {} duplicate page reference(s)",
                before - group.pages.len()
            );
            changed = true;
        }

        if changed {
            group.modified = true;
            corrections += 1;
        }
    }

    let before = groups.len();
    groups.retain(|g| {
        if g.pages.is_empty() {
            warn!(label = ?g.label, "Dropping group with no pages");
            false
        } else {
            true
        }
    });
    corrections + (before - groups.len())
}
