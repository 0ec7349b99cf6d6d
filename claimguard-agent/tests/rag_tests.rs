//! RAG agent against a recorded chat model and scripted retrieval

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use claimguard_agent::llm_client::{ChatMessage, ChatModel, LlmError};
use claimguard_agent::rag::{extract_claim_ids, NO_CONTEXT, SYSTEM_PROMPT};
use claimguard_agent::RagAgent;
use claimguard_common::models::RetrievedChunk;
use claimguard_common::{Error, Result, RetrievalSettings};
use claimguard_server::services::{ResilientRetriever, Retriever};

/// Records every request and replies with a fixed answer
struct RecordingModel {
    reply: String,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingModel {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn last_request(&self) -> Vec<ChatMessage> {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ChatModel for RecordingModel {
    async fn complete(&self, messages: &[ChatMessage]) -> std::result::Result<String, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

struct RejectingModel;

#[async_trait]
impl ChatModel for RejectingModel {
    async fn complete(&self, _messages: &[ChatMessage]) -> std::result::Result<String, LlmError> {
        Err(LlmError::ApiError(401, "invalid key".to_string()))
    }
}

struct ScriptedRetriever {
    chunks: Vec<RetrievedChunk>,
}

#[async_trait]
impl Retriever for ScriptedRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        Ok(self.chunks.iter().take(k).cloned().collect())
    }
}

struct FailingRetriever;

#[async_trait]
impl Retriever for FailingRetriever {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedChunk>> {
        Err(Error::Retrieval("vector service down".to_string()))
    }
}

fn resilient(inner: Arc<dyn Retriever>) -> ResilientRetriever {
    ResilientRetriever::new(
        inner,
        RetrievalSettings {
            timeout: Duration::from_millis(100),
            max_retries: 1,
            initial_backoff: Duration::from_millis(1),
            ..RetrievalSettings::default()
        },
    )
}

fn invoice_chunk(doc_id: &str, claim_id: &str, text: &str) -> RetrievedChunk {
    RetrievedChunk {
        doc_id: doc_id.to_string(),
        claim_id: claim_id.to_string(),
        text: text.to_string(),
        distance: 0.5,
    }
}

#[tokio::test]
async fn test_answer_includes_retrieved_context() {
    let retriever = Arc::new(ScriptedRetriever {
        chunks: vec![
            invoice_chunk("C100000_C100000_invoice.txt_chunk0", "C100000", "Billed hours: 999"),
            invoice_chunk("C100001_C100001_invoice.txt_chunk0", "C100001", "Routine checkup"),
        ],
    });
    let model = RecordingModel::new("C100000 bills 999 hours; flag it.");
    let agent = RagAgent::new(resilient(retriever), model.clone(), 5);

    let answer = agent.answer("Which claim bills 999 hours?").await.unwrap();

    assert_eq!(answer.answer, "C100000 bills 999 hours; flag it.");
    assert_eq!(answer.chunks.len(), 2);
    assert_eq!(extract_claim_ids(&answer.answer), vec!["C100000"]);

    let request = model.last_request();
    assert_eq!(request.len(), 2);
    assert_eq!(request[0].role, "system");
    assert_eq!(request[0].content, SYSTEM_PROMPT);
    assert_eq!(request[1].role, "user");
    assert!(request[1].content.contains("Which claim bills 999 hours?"));
    assert!(request[1]
        .content
        .contains("[doc_id=C100000_C100000_invoice.txt_chunk0 claim=C100000 dist=0.500] Billed hours: 999"));
}

#[tokio::test]
async fn test_k_limits_retrieved_chunks() {
    let chunks = (0..10)
        .map(|i| invoice_chunk(&format!("d{}", i), "C100000", "text"))
        .collect();
    let agent = RagAgent::new(
        resilient(Arc::new(ScriptedRetriever { chunks })),
        RecordingModel::new("ok"),
        3,
    );

    let answer = agent.answer("anything").await.unwrap();
    assert_eq!(answer.chunks.len(), 3);
}

#[tokio::test]
async fn test_retrieval_failure_sends_empty_context() {
    let model = RecordingModel::new("No documents to go on.");
    let agent = RagAgent::new(resilient(Arc::new(FailingRetriever)), model.clone(), 5);

    let answer = agent.answer("Is C100000 fraud?").await.unwrap();

    assert!(answer.chunks.is_empty());
    assert!(model.last_request()[1].content.contains(NO_CONTEXT));
}

#[tokio::test]
async fn test_model_error_propagates() {
    let agent = RagAgent::new(
        resilient(Arc::new(ScriptedRetriever { chunks: Vec::new() })),
        Arc::new(RejectingModel),
        5,
    );

    let err = agent.answer("hello").await.unwrap_err();
    assert!(matches!(err, LlmError::ApiError(401, _)));
}
