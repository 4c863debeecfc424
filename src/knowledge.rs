//! Knowledge retrieval for the `{knowledge}` parameter
//!
//! Every knowledge piece may carry embeddings from one or more models. The
//! task content is embedded with the model of the first piece's first index
//! entry and pieces are ranked by cosine distance to it.

use crate::core::error::PipelineError;
use crate::core::task::{ModelRequirements, ModelVariant};
use crate::tools::{LlmExecutionTools, Prompt, ToolError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub type EmbeddingVector = Vec<f64>;

/// Returned instead of knowledge when nothing can be ranked
pub const NO_KNOWLEDGE_PIECES: &str = "No knowledge pieces found";

/// How many pieces end up in `{knowledge}`
pub const MAX_KNOWLEDGE_PIECES: usize = 5;

/// Embedding of a knowledge piece by one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgePieceIndex {
    pub model_name: String,
    pub position: EmbeddingVector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgePiece {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub content: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub index: Vec<KnowledgePieceIndex>,
}

impl KnowledgePiece {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            name: None,
            content: content.into(),
            keywords: Vec::new(),
            index: Vec::new(),
        }
    }

    pub fn with_index(mut self, model_name: impl Into<String>, position: EmbeddingVector) -> Self {
        self.index.push(KnowledgePieceIndex {
            model_name: model_name.into(),
            position,
        });
        self
    }

    /// Embedding of this piece by the given model
    pub fn position_for(&self, model_name: &str) -> Option<&EmbeddingVector> {
        self.index
            .iter()
            .find(|entry| entry.model_name == model_name)
            .map(|entry| &entry.position)
    }
}

/// Cosine similarity of two equally long vectors; 0 if either has no magnitude
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, PipelineError> {
    if a.len() != b.len() {
        return Err(PipelineError::EmbeddingDimension {
            left: a.len(),
            right: b.len(),
        });
    }

    let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a < 1e-10 || norm_b < 1e-10 {
        return Ok(0.0);
    }

    Ok(dot_product / (norm_a * norm_b))
}

/// Rank the pieces against the task content and format the best ones
///
/// Relevance is the cosine distance `1 - similarity` and pieces are kept in
/// ascending order of it. A piece without an embedding for the active model
/// gets relevance 0.
pub async fn retrieve_knowledge(
    task_content: &str,
    pieces: &[KnowledgePiece],
    llm: Option<&dyn LlmExecutionTools>,
) -> Result<String, PipelineError> {
    let Some(model_name) = pieces
        .first()
        .and_then(|piece| piece.index.first())
        .map(|entry| entry.model_name.clone())
    else {
        return Ok(NO_KNOWLEDGE_PIECES.to_string());
    };

    let llm = llm.ok_or_else(|| ToolError::NotConfigured("LLM".to_string()))?;

    let prompt = Prompt {
        title: "Knowledge Search".to_string(),
        content: task_content.to_string(),
        parameters: HashMap::new(),
        model_requirements: ModelRequirements {
            model_variant: ModelVariant::Embedding,
            model_name: Some(model_name.clone()),
            ..ModelRequirements::default()
        },
    };
    let embedding = llm.call_embedding_model(&prompt).await?;

    let mut ranked = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let relevance = match piece.position_for(&model_name) {
            Some(position) => 1.0 - cosine_similarity(position, &embedding.content)?,
            None => 0.0,
        };
        ranked.push((relevance, piece));
    }
    ranked.sort_by(|(left, _), (right, _)| left.total_cmp(right));

    debug!(
        "Ranked {} knowledge pieces with model {}",
        ranked.len(),
        model_name
    );

    Ok(ranked
        .into_iter()
        .take(MAX_KNOWLEDGE_PIECES)
        .map(|(_, piece)| format!("- {}", piece.content))
        .collect::<Vec<_>>()
        .join("\n"))
}
