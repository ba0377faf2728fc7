mod failure_policy;
mod metadata;
mod post;
mod tag_mapping;

pub use failure_policy::FailurePolicy;
pub use metadata::{MAX_METADATA_TAGS, Metadata};
pub use post::{EnrichedPost, Post};
pub use tag_mapping::{TagMapping, TagMappingConflict};
