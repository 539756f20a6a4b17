// Rulebook knowledge-base retrieval over Qdrant
//
// The collection is populated offline by the document-chunking
// indexer; this module only reads it.
use async_trait::async_trait;
use qdrant_client::qdrant::SearchPointsBuilder;
use qdrant_client::Qdrant;
use serde::{Deserialize, Serialize};

use crate::embeddings::QueryEmbedder;

/// A ranked fragment of rule text. Read-only: ordering by descending
/// score is the retrieval service's contract and is never recomputed
/// locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleChunk {
    pub text: String,
    pub source_document: String,
    pub score: f32,
    pub chunk_id: String,
}

/// Top-k similarity lookup against the rulebook.
#[async_trait]
pub trait RuleRetriever: Send + Sync {
    /// Returns at most `k` chunks, ranked descending by relevance.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RuleChunk>, String>;
}

pub struct QdrantRulebase {
    client: Qdrant,
    collection_name: String,
    embedder: QueryEmbedder,
}

impl QdrantRulebase {
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection_name: String,
        embedder: QueryEmbedder,
    ) -> Result<Self, String> {
        let mut client_builder = Qdrant::from_url(url);

        if let Some(key) = api_key {
            client_builder = client_builder.api_key(key);
        }

        let client = client_builder
            .build()
            .map_err(|e| format!("Failed to build Qdrant client: {}", e))?;

        Ok(Self {
            client,
            collection_name,
            embedder,
        })
    }
}

#[async_trait]
impl RuleRetriever for QdrantRulebase {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RuleChunk>, String> {
        let query_embedding = self.embedder.embed_query(query).await?;

        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection_name, query_embedding, k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| format!("Qdrant search failed: {}", e))?;

        let mut chunks = Vec::new();
        for scored_point in search_result.result {
            let payload = scored_point.payload;
            let point_id = match scored_point.id {
                Some(id) => match id.point_id_options {
                    Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid)) => uuid,
                    Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(num)) => {
                        num.to_string()
                    }
                    None => continue,
                },
                None => continue,
            };

            // payload fields written by the offline indexer
            chunks.push(RuleChunk {
                text: payload
                    .get("text")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                source_document: payload
                    .get("source_document")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                score: scored_point.score,
                chunk_id: point_id,
            });
        }

        tracing::debug!(
            "Rulebook search returned {} chunks for k={}",
            chunks.len(),
            k
        );
        Ok(chunks)
    }
}
