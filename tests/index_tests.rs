//! Integration tests for the index and the question-answering graph
//!
//! Documents are indexed into a file-backed SQLite database, the database is
//! reopened, and a question is answered from it with scripted model output.

use async_trait::async_trait;
use std::sync::Mutex;
use tempfile::TempDir;
use wiki_bot::agents::QaGraph;
use wiki_bot::config::IndexConfig;
use wiki_bot::index::{populate_index, retrieve};
use wiki_bot::llm::{Embedder, LlmResult, TextCompletion};
use wiki_bot::output::{load_statistics, write_statistics};
use wiki_bot::storage::{open_index, VectorStore};
use wiki_bot::Document;

const TOPICS: [&str; 4] = ["battery", "motor", "levitation", "telemetry"];

/// Embeds text as keyword counts over a small vocabulary
struct TopicEmbedder;

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                TOPICS
                    .iter()
                    .map(|topic| lower.matches(topic).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Replays canned responses in order and records the prompts it saw
struct CannedModel {
    responses: Mutex<Vec<&'static str>>,
    prompts: Mutex<Vec<String>>,
}

impl CannedModel {
    fn new(mut responses: Vec<&'static str>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TextCompletion for CannedModel {
    async fn complete(&self, _node: &str, _system: &str, prompt: &str) -> LlmResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.responses.lock().unwrap().pop().unwrap_or_default().to_string())
    }
}

fn documents() -> Vec<Document> {
    vec![
        Document::from_page(
            "https://wiki.example.com/hardware/bms",
            "BMS",
            "The battery management system watches every battery cell.",
        ),
        Document::from_page(
            "https://wiki.example.com/hardware/inverter",
            "Inverter",
            "The inverter drives the linear motor.",
        ),
        Document::from_page(
            "https://wiki.example.com/software/logger",
            "Logger",
            "The SD logger stores telemetry frames for later telemetry review.",
        ),
    ]
}

fn small_chunks() -> IndexConfig {
    IndexConfig {
        chunk_size: 200,
        chunk_overlap: 20,
        embedding_batch_size: 2,
        ..IndexConfig::default()
    }
}

#[tokio::test]
async fn test_index_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("index").join("wiki.db");

    {
        let mut index = open_index(&db_path).unwrap();
        let written = populate_index(
            &mut index,
            &TopicEmbedder,
            &documents(),
            &small_chunks(),
            "hash-1",
            true,
        )
        .await
        .unwrap();
        assert_eq!(written, 3);
    }

    let index = open_index(&db_path).unwrap();
    let stats = load_statistics(&index).unwrap();
    assert_eq!(stats.total_chunks, 3);
    assert_eq!(stats.total_sources, 3);
    let build = stats.latest_build.as_ref().unwrap();
    assert_eq!(build.config_hash, "hash-1");
    assert_eq!(build.documents, 3);

    let mut rendered = Vec::new();
    write_statistics(&mut rendered, &stats).unwrap();
    assert!(String::from_utf8(rendered).unwrap().contains("Chunks: 3"));

    let hits = retrieve(&index, &TopicEmbedder, "where is telemetry kept?", 1)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.title, "Logger");
}

#[tokio::test]
async fn test_rebuild_replaces_chunks() {
    let dir = TempDir::new().unwrap();
    let mut index = open_index(&dir.path().join("wiki.db")).unwrap();
    let config = small_chunks();

    populate_index(&mut index, &TopicEmbedder, &documents(), &config, "a", true)
        .await
        .unwrap();
    populate_index(&mut index, &TopicEmbedder, &documents()[..1], &config, "b", true)
        .await
        .unwrap();

    assert_eq!(index.count_chunks().unwrap(), 1);
    assert_eq!(index.latest_build().unwrap().unwrap().config_hash, "b");
}

#[tokio::test]
async fn test_question_answered_from_index() {
    let dir = TempDir::new().unwrap();
    let mut index = open_index(&dir.path().join("wiki.db")).unwrap();
    populate_index(
        &mut index,
        &TopicEmbedder,
        &documents(),
        &small_chunks(),
        "hash",
        true,
    )
    .await
    .unwrap();

    let model = CannedModel::new(vec![
        r#"{"intent": "What drives the motor", "need_more_info": false}"#,
        "motor drive hardware",
        "The inverter drives the linear motor.",
    ]);
    let graph = QaGraph::new(&model, &TopicEmbedder, &index, 1);

    let ctx = graph.run("What powers the motor?", None).await.unwrap();

    assert_eq!(ctx.search_query.as_deref(), Some("motor drive hardware"));
    assert_eq!(ctx.context_chunks.len(), 1);
    assert!(ctx.context_chunks[0].contains("# Inverter"));
    assert_eq!(
        ctx.answer.as_deref(),
        Some("The inverter drives the linear motor.")
    );

    // The summarize prompt carries the retrieved chunk and the original question
    let prompts = model.prompts.lock().unwrap();
    assert!(prompts[2].contains("linear motor"));
    assert!(prompts[2].contains("What powers the motor?"));
}
