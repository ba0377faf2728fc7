use serde::{Deserialize, Serialize};

/// Maximum number of tags a metadata record may carry.
pub const MAX_METADATA_TAGS: usize = 2;

/// Metadata derived from a post's text by the generation backend.
///
/// Created once per post by the metadata extractor and never mutated after
/// it has been merged into the post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Number of lines in the post.
    pub line_count: u32,
    /// Language of the post. Expected to be "English"; not enforced.
    pub language: String,
    /// Up to `MAX_METADATA_TAGS` free-form tags.
    pub tags: Vec<String>,
}

impl Metadata {
    /// Creates a metadata record, keeping at most `MAX_METADATA_TAGS` tags.
    ///
    /// # Examples
    ///
    /// ```
    /// use postenrich::models::Metadata;
    ///
    /// let metadata = Metadata::new(3, "English", vec!["A".into(), "B".into(), "C".into()]);
    /// assert_eq!(metadata.tags, vec!["A", "B"]);
    /// ```
    pub fn new(line_count: u32, language: impl Into<String>, mut tags: Vec<String>) -> Self {
        tags.truncate(MAX_METADATA_TAGS);
        Self {
            line_count,
            language: language.into(),
            tags,
        }
    }
}
