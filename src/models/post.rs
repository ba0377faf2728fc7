use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Metadata;

/// A raw post as supplied by the corpus loader.
///
/// Only `text` is required. Any fields besides `text` and `tags` are kept in
/// `extra` and written back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// The post's source content.
    pub text: String,
    /// Tags supplied with the raw post, if any.
    #[serde(default)]
    pub tags: Vec<String>,
    /// All other fields of the input record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    /// Creates a post with the given text and no tags.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Sets the post's tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// A post merged with its extracted metadata.
///
/// Metadata fields override same-named fields of the raw post, so `tags`
/// holds the extracted tags (and, after rewriting, their canonical forms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPost {
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub line_count: u32,
    pub language: String,
    pub tags: Vec<String>,
}

impl EnrichedPost {
    /// Merges `metadata` into `post`.
    ///
    /// # Examples
    ///
    /// ```
    /// use postenrich::models::{EnrichedPost, Metadata, Post};
    ///
    /// let post = Post::new("Up at 5am again.").with_tags(["Routine"]);
    /// let enriched = EnrichedPost::new(post, Metadata::new(1, "English", vec!["Mindset".into()]));
    ///
    /// assert_eq!(enriched.line_count, 1);
    /// assert_eq!(enriched.tags, vec!["Mindset"]);
    /// ```
    pub fn new(post: Post, metadata: Metadata) -> Self {
        let mut extra = post.extra;
        // These would otherwise serialize twice.
        extra.remove("line_count");
        extra.remove("language");

        Self {
            text: post.text,
            extra,
            line_count: metadata.line_count,
            language: metadata.language,
            tags: metadata.tags,
        }
    }
}
