/// End-to-end tests for the enrichment pipeline against a scripted backend.
///
/// The stub client answers metadata prompts from a per-post table and tag
/// prompts by looking each listed tag up in a canonical table, so these tests
/// run without network access.
use postenrich::corpus::{load_posts, write_posts};
use postenrich::{
    EnrichmentPipeline, GenerationClient, GenerationError, MetadataExtractionError,
    PipelineError, Post,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

const POST_MARKER: &str = "Here is the actual post on which you need to perform this task:\n";
const TAGS_MARKER: &str = "Here is the list of tags:\n";

/// How the stub answers a tag chunk.
#[derive(Clone, Copy)]
enum ChunkReply {
    /// Plain JSON object.
    Json,
    /// JSON wrapped in a markdown fence with a `!` sentinel line.
    Fenced,
    /// Not JSON at all.
    Refusal,
    /// A fixed reply, whatever the chunk listed.
    Raw(&'static str),
}

struct StubBackend {
    metadata: HashMap<String, String>,
    canonical: HashMap<String, String>,
    chunk_replies: Mutex<Vec<ChunkReply>>,
    tag_prompts: Mutex<Vec<String>>,
}

impl StubBackend {
    fn new() -> Self {
        Self {
            metadata: HashMap::new(),
            canonical: HashMap::new(),
            chunk_replies: Mutex::new(Vec::new()),
            tag_prompts: Mutex::new(Vec::new()),
        }
    }

    fn post(mut self, text: &str, response: &str) -> Self {
        self.metadata.insert(text.to_string(), response.to_string());
        self
    }

    fn canonical(mut self, tag: &str, canonical: &str) -> Self {
        self.canonical.insert(tag.to_string(), canonical.to_string());
        self
    }

    /// Replies for successive chunks; chunks past the end get `Json`.
    fn chunk_replies(self, replies: Vec<ChunkReply>) -> Self {
        *self.chunk_replies.lock().unwrap() = replies;
        self
    }

    fn tag_prompt_count(&self) -> usize {
        self.tag_prompts.lock().unwrap().len()
    }

    fn answer_tags(&self, listed: &str) -> String {
        let mut mapping = serde_json::Map::new();
        for tag in listed.split(", ").filter(|t| !t.is_empty()) {
            let canonical = self.canonical.get(tag).map_or(tag, String::as_str);
            mapping.insert(tag.to_string(), Value::from(canonical));
        }
        let body = Value::Object(mapping).to_string();

        let reply = {
            let mut replies = self.chunk_replies.lock().unwrap();
            if replies.is_empty() {
                ChunkReply::Json
            } else {
                replies.remove(0)
            }
        };
        match reply {
            ChunkReply::Json => body,
            ChunkReply::Fenced => format!("```json\n!note from model\n{body}\n```"),
            ChunkReply::Refusal => "I cannot help with that request.".to_string(),
            ChunkReply::Raw(reply) => reply.to_string(),
        }
    }
}

impl GenerationClient for StubBackend {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if let Some((_, listed)) = prompt.split_once(TAGS_MARKER) {
            self.tag_prompts.lock().unwrap().push(listed.to_string());
            return Ok(self.answer_tags(listed));
        }
        let (_, text) = prompt
            .split_once(POST_MARKER)
            .expect("prompt is neither a metadata nor a tag prompt");
        self.metadata
            .get(text)
            .cloned()
            .ok_or_else(|| GenerationError::Api {
                message: format!("no scripted metadata for {text:?}"),
            })
    }
}

fn metadata(lines: u32, tags: &[&str]) -> String {
    json!({ "line_count": lines, "language": "English", "tags": tags }).to_string()
}

#[test]
fn grwm_variants_collapse_to_one_tag() {
    let backend = Arc::new(
        StubBackend::new()
            .post("Morning routine", &metadata(1, &["GRWM", "Get Ready"]))
            .post("Date night look", &metadata(1, &["Get Ready With Me"]))
            .canonical("Get Ready", "GRWM")
            .canonical("Get Ready With Me", "GRWM"),
    );
    let pipeline = EnrichmentPipeline::with_client(backend.clone(), 30).unwrap();

    let outcome = pipeline
        .run(vec![Post::new("Morning routine"), Post::new("Date night look")])
        .unwrap();

    assert_eq!(outcome.posts[0].tags, vec!["GRWM"]);
    assert_eq!(outcome.posts[1].tags, vec!["GRWM"]);
    assert_eq!(outcome.mapping.canonical("Get Ready"), "GRWM");
    assert_eq!(backend.tag_prompt_count(), 1);
}

#[test]
fn fenced_metadata_and_sentinel_lines_are_repaired() {
    let backend = Arc::new(
        StubBackend::new()
            .post(
                "Leg day\nNo excuses",
                &format!("```json\n{}\n```", metadata(2, &["Discipline"])),
            )
            .canonical("Discipline", "Mindset")
            .chunk_replies(vec![ChunkReply::Fenced]),
    );
    let pipeline = EnrichmentPipeline::with_client(backend, 30).unwrap();

    let outcome = pipeline.run(vec![Post::new("Leg day\nNo excuses")]).unwrap();

    assert_eq!(outcome.posts[0].line_count, 2);
    assert_eq!(outcome.posts[0].tags, vec!["Mindset"]);
    assert!(outcome.failed_chunks.is_empty());
}

#[test]
fn failed_chunk_leaves_its_tags_untouched() {
    // Sorted tags: Budget Life, Costs | Meal Prep, Spending
    let backend = Arc::new(
        StubBackend::new()
            .post("a", &metadata(1, &["Budget Life", "Meal Prep"]))
            .post("b", &metadata(1, &["Costs", "Spending"]))
            .canonical("Budget Life", "Budget")
            .canonical("Costs", "Budget")
            .canonical("Meal Prep", "What I Eat")
            .canonical("Spending", "Budget")
            .chunk_replies(vec![ChunkReply::Json, ChunkReply::Refusal]),
    );
    let pipeline = EnrichmentPipeline::with_client(backend.clone(), 2).unwrap();

    let outcome = pipeline.run(vec![Post::new("a"), Post::new("b")]).unwrap();

    assert_eq!(backend.tag_prompt_count(), 2);
    assert_eq!(outcome.failed_chunks.len(), 1);
    assert_eq!(outcome.failed_chunks[0].index, 1);
    assert_eq!(outcome.failed_chunks[0].tags, vec!["Meal Prep", "Spending"]);
    assert_eq!(outcome.posts[0].tags, vec!["Budget", "Meal Prep"]);
    assert_eq!(outcome.posts[1].tags, vec!["Budget", "Spending"]);
}

#[test]
fn answers_for_tags_of_other_chunks_do_not_abort_the_run() {
    let backend = Arc::new(
        StubBackend::new()
            .post("a", &metadata(1, &["Budget Life"]))
            .post("b", &metadata(1, &["Money"]))
            .chunk_replies(vec![
                ChunkReply::Raw(r#"{"Budget Life": "Budget", "Money": "Budget"}"#),
                ChunkReply::Raw(r#"{"Money": "Finance"}"#),
            ]),
    );
    let pipeline = EnrichmentPipeline::with_client(backend, 1).unwrap();

    let outcome = pipeline.run(vec![Post::new("a"), Post::new("b")]).unwrap();

    assert!(outcome.failed_chunks.is_empty());
    assert_eq!(outcome.posts[0].tags, vec!["Budget"]);
    assert_eq!(outcome.posts[1].tags, vec!["Finance"]);
}

#[test]
fn chunks_are_sent_in_sorted_order_without_duplicates() {
    let backend = Arc::new(
        StubBackend::new()
            .post("one", &metadata(1, &["Skin", "Glow Up"]))
            .post("two", &metadata(1, &["Skin", "Diet"]))
            .post("three", &metadata(1, &["Money"])),
    );
    let pipeline = EnrichmentPipeline::with_client(backend.clone(), 2).unwrap();

    pipeline
        .run(vec![Post::new("one"), Post::new("two"), Post::new("three")])
        .unwrap();

    let prompts = backend.tag_prompts.lock().unwrap();
    assert_eq!(*prompts, vec!["Diet, Glow Up", "Money, Skin"]);
}

#[test]
fn extraction_failure_aborts_before_unification() {
    let backend = Arc::new(
        StubBackend::new()
            .post("fine", &metadata(1, &["GRWM"]))
            .post("broken", "line_count: 3, language: English"),
    );
    let pipeline = EnrichmentPipeline::with_client(backend.clone(), 30).unwrap();

    let err = pipeline
        .run(vec![Post::new("fine"), Post::new("broken")])
        .unwrap_err();

    match err {
        PipelineError::MetadataExtraction { index, source } => {
            assert_eq!(index, 1);
            assert!(matches!(source, MetadataExtractionError::MalformedResponse(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.tag_prompt_count(), 0);
}

#[test]
fn load_run_write_preserves_extra_fields() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("raw_posts.json");
    let output = dir.path().join("data").join("processed_posts.json");
    fs::write(
        &input,
        r#"[
            {"text": "Morning routine", "engagement": 120, "tags": ["old"]},
            {"text": "Budget tips\nSave more", "author": "sam"}
        ]"#,
    )
    .unwrap();

    let backend = Arc::new(
        StubBackend::new()
            .post("Morning routine", &metadata(1, &["Get Ready"]))
            .post("Budget tips\nSave more", &metadata(2, &["Money"]))
            .canonical("Get Ready", "GRWM")
            .canonical("Money", "Budget"),
    );
    let pipeline = EnrichmentPipeline::with_client(backend, 30).unwrap();

    let posts = load_posts(&input).unwrap();
    let outcome = pipeline.run(posts).unwrap();
    write_posts(&output, &outcome.posts).unwrap();

    let written: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(
        written,
        json!([
            {
                "text": "Morning routine",
                "engagement": 120,
                "line_count": 1,
                "language": "English",
                "tags": ["GRWM"]
            },
            {
                "text": "Budget tips\nSave more",
                "author": "sam",
                "line_count": 2,
                "language": "English",
                "tags": ["Budget"]
            }
        ])
    );
}

#[test]
fn empty_corpus_writes_empty_array() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("raw_posts.json");
    let output = dir.path().join("out.json");
    fs::write(&input, "[]").unwrap();

    let backend = Arc::new(StubBackend::new());
    let pipeline = EnrichmentPipeline::with_client(backend.clone(), 30).unwrap();

    let outcome = pipeline.run(load_posts(&input).unwrap()).unwrap();
    write_posts(&output, &outcome.posts).unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "[]");
    assert_eq!(backend.tag_prompt_count(), 0);
}
