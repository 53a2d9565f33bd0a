//! Natural-language search over symbol embeddings
//!
//! The query is embedded with the same model as the symbols, the vector
//! store is over-fetched by `query.candidate_multiplier`, hits whose symbol
//! has left the graph are dropped, and the rest are re-ranked with a small
//! lexical bonus for query words that appear in the symbol's names.

use crate::models::{SearchMetadata, SemanticHit, SemanticSearchResult};
use crate::query_engine::QueryEngine;
use codegraph_core::entities::NodeId;
use codegraph_core::error::{Error, Result};
use codegraph_embeddings::tokenize;
use codegraph_storage::VectorHit;
use ordered_float::OrderedFloat;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, warn};

impl QueryEngine {
    /// Top-k symbols for a free-text query
    ///
    /// `top_k` defaults to `query.default_top_k`. Fails when the embedding
    /// endpoint or the vector store is unavailable.
    pub async fn query(&self, text: &str, top_k: Option<usize>) -> Result<SemanticSearchResult> {
        let start = Instant::now();
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::invalid_input("query text is empty"));
        }
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        if top_k == 0 {
            return Err(Error::invalid_input("top_k must be at least 1"));
        }

        let vector = self
            .embeddings
            .embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| Error::embedding("the endpoint returned no vector for the query"))?;

        let fetch = top_k.saturating_mul(self.config.candidate_multiplier.max(1));
        let hits = self.vectors.search(&vector, fetch).await?;
        let candidates_fetched = hits.len();

        let (hits, warning) = self.drop_stale(hits).await;
        let stale_hits_dropped = candidates_fetched - hits.len();
        if stale_hits_dropped > 0 {
            debug!(stale_hits_dropped, "Dropped vector hits for retracted symbols");
        }

        let query_tokens: HashSet<String> = tokenize(text).into_iter().collect();
        let mut ranked: Vec<SemanticHit> = hits
            .into_iter()
            .map(|hit| self.score(hit, &query_tokens))
            .collect();
        ranked.sort_by(|a, b| {
            OrderedFloat(b.score)
                .cmp(&OrderedFloat(a.score))
                .then_with(|| a.qualified_name.cmp(&b.qualified_name))
        });
        ranked.truncate(top_k);

        Ok(SemanticSearchResult {
            query: text.to_string(),
            hits: ranked,
            metadata: SearchMetadata {
                candidates_fetched,
                stale_hits_dropped,
                query_time_ms: start.elapsed().as_millis() as u64,
                warning,
            },
        })
    }

    /// Keep hits whose node still exists. If the graph cannot be asked,
    /// every hit is kept and a warning says so.
    async fn drop_stale(&self, hits: Vec<VectorHit>) -> (Vec<VectorHit>, Option<String>) {
        let ids: Vec<NodeId> = hits.iter().map(|h| h.node_id.clone()).collect();
        match self.graph.get_nodes(&ids).await {
            Ok(nodes) => {
                let live: HashSet<NodeId> = nodes.into_iter().map(|n| n.id).collect();
                let hits = hits
                    .into_iter()
                    .filter(|h| live.contains(&h.node_id))
                    .collect();
                (hits, None)
            }
            Err(e) => {
                warn!(error = %e, "Graph store unavailable, semantic hits not checked");
                (
                    hits,
                    Some(format!("results not checked against the graph: {e}")),
                )
            }
        }
    }

    fn score(&self, hit: VectorHit, query_tokens: &HashSet<String>) -> SemanticHit {
        let payload = hit.payload;
        let lexical_overlap = if query_tokens.is_empty() {
            0.0
        } else {
            let haystack = format!(
                "{} {} {}",
                payload.name,
                payload.qualified_name,
                payload.signature.as_deref().unwrap_or_default()
            );
            let symbol_tokens: HashSet<String> = tokenize(&haystack).into_iter().collect();
            let shared = query_tokens.intersection(&symbol_tokens).count();
            shared as f32 / query_tokens.len() as f32
        };

        SemanticHit {
            node_id: hit.node_id,
            name: payload.name,
            qualified_name: payload.qualified_name,
            kind: payload.kind,
            file: payload.file,
            signature: payload.signature,
            score: hit.score + self.config.lexical_weight * lexical_overlap,
            similarity: hit.score,
            lexical_overlap,
        }
    }
}
