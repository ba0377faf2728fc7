use std::collections::BTreeSet;

use crate::models::EnrichedPost;

/// Collects the distinct tags of every post, sorted.
///
/// Sorting fixes the chunk boundaries the unifier derives from this list, so
/// the same corpus always produces the same chunks.
pub fn collect_tags(posts: &[EnrichedPost]) -> Vec<String> {
    posts
        .iter()
        .flat_map(|post| post.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
