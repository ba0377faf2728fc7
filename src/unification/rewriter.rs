use std::collections::BTreeSet;

use crate::models::{EnrichedPost, TagMapping};

/// Maps each tag to its canonical form and removes duplicates.
///
/// Tags without a mapping entry are kept as they are. The result is sorted;
/// tag order carries no meaning.
///
/// # Examples
///
/// ```
/// use postenrich::models::TagMapping;
/// use postenrich::unification::canonicalize_tags;
///
/// let mapping: TagMapping = [("Get Ready".to_string(), "GRWM".to_string())]
///     .into_iter()
///     .collect();
/// let tags = vec!["GRWM".to_string(), "Get Ready".to_string(), "Budget".to_string()];
///
/// assert_eq!(canonicalize_tags(&tags, &mapping), vec!["Budget", "GRWM"]);
/// ```
pub fn canonicalize_tags(tags: &[String], mapping: &TagMapping) -> Vec<String> {
    tags.iter()
        .map(|tag| mapping.canonical(tag).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Replaces every post's tags with their canonical, deduplicated forms.
pub fn rewrite_tags(posts: &mut [EnrichedPost], mapping: &TagMapping) {
    for post in posts {
        post.tags = canonicalize_tags(&post.tags, mapping);
    }
}
