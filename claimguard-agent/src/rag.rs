//! Retrieval-augmented answers
//!
//! Retrieved chunks are rendered into a bounded context block that is sent
//! to the chat model together with the user's question.

use std::sync::{Arc, OnceLock};

use claimguard_common::models::RetrievedChunk;
use claimguard_server::services::ResilientRetriever;
use regex::Regex;
use serde::Serialize;

use crate::llm_client::{ChatMessage, ChatModel, LlmError};

pub const MAX_CONTEXT_CHARS: usize = 3500;
pub const SYSTEM_PROMPT: &str = "You specialize in analyzing insurance claims using RAG.";
pub const NO_CONTEXT: &str = "No relevant documents retrieved.";

/// Render chunks until the next one would push the total past `max_chars`
pub fn build_context(chunks: &[RetrievedChunk], max_chars: usize) -> String {
    let mut parts = Vec::new();
    let mut total = 0;

    for chunk in chunks {
        let piece = format!(
            "[doc_id={} claim={} dist={:.3}] {}",
            chunk.doc_id,
            chunk.claim_id,
            chunk.distance,
            chunk.text.trim()
        );
        let len = piece.chars().count();
        if total + len > max_chars {
            break;
        }
        total += len;
        parts.push(piece);
    }

    if parts.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        parts.join("\n\n")
    }
}

pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are an insurance-claims analysis assistant.\n\
         Use the retrieved documents to answer.\n\n\
         User question:\n{}\n\n\
         Retrieved context:\n{}\n\n\
         If asked about a claim, reference doc_ids when relevant.\n",
        question, context
    )
}

fn claim_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\bC\d{6}\b").expect("claim id pattern is a valid regex"))
}

/// Claim identifiers (`C` + six digits) in order of appearance
pub fn extract_claim_ids(text: &str) -> Vec<String> {
    claim_id_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub question: String,
    pub answer: String,
    pub chunks: Vec<RetrievedChunk>,
}

pub struct RagAgent {
    retriever: ResilientRetriever,
    model: Arc<dyn ChatModel>,
    k: usize,
}

impl RagAgent {
    pub fn new(retriever: ResilientRetriever, model: Arc<dyn ChatModel>, k: usize) -> Self {
        Self {
            retriever,
            model,
            k: k.max(1),
        }
    }

    /// Retrieval failures degrade to an empty context; model failures propagate
    pub async fn answer(&self, question: &str) -> Result<RagAnswer, LlmError> {
        let chunks = self.retriever.retrieve_or_empty(question, self.k).await;
        let context = build_context(&chunks, MAX_CONTEXT_CHARS);

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(question, &context)),
        ];
        let answer = self.model.complete(&messages).await?;

        Ok(RagAnswer {
            question: question.to_string(),
            answer,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str, distance: f64) -> RetrievedChunk {
        RetrievedChunk {
            doc_id: id.to_string(),
            claim_id: "C100000".to_string(),
            text: text.to_string(),
            distance,
        }
    }

    #[test]
    fn test_context_format() {
        let context = build_context(&[chunk("d1", "  Billed hours: 999 \n", 0.12345)], MAX_CONTEXT_CHARS);
        assert_eq!(context, "[doc_id=d1 claim=C100000 dist=0.123] Billed hours: 999");
    }

    #[test]
    fn test_context_stops_at_budget() {
        let chunks = vec![chunk("d1", &"a".repeat(50), 0.1), chunk("d2", &"b".repeat(50), 0.2)];
        let first_len = build_context(&chunks[..1], MAX_CONTEXT_CHARS).chars().count();

        let context = build_context(&chunks, first_len + 10);
        assert!(context.contains("d1"));
        assert!(!context.contains("d2"));
    }

    #[test]
    fn test_empty_context_message() {
        assert_eq!(build_context(&[], MAX_CONTEXT_CHARS), NO_CONTEXT);
        // A single oversize chunk leaves nothing to show
        assert_eq!(build_context(&[chunk("d", &"x".repeat(100), 0.0)], 10), NO_CONTEXT);
    }

    #[test]
    fn test_extract_claim_ids() {
        let ids = extract_claim_ids("Check C100000 and C123456, not C12345 or XC1234567.");
        assert_eq!(ids, vec!["C100000", "C123456"]);
        assert!(extract_claim_ids("nothing here").is_empty());
    }

    #[test]
    fn test_prompt_contains_question_and_context() {
        let prompt = build_prompt("Is C100000 fraud?", NO_CONTEXT);
        assert!(prompt.contains("User question:\nIs C100000 fraud?"));
        assert!(prompt.contains("Retrieved context:\nNo relevant documents retrieved."));
    }
}
