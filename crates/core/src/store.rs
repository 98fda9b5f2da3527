use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::models::{PdfChunk, SearchHit};
use crate::traits::VectorIndex;
use tracing::info;

#[derive(Debug, Clone)]
struct IndexedChunk {
    chunk: PdfChunk,
    vector: Vec<f32>,
    norm: f32,
}

/// Cosine-similarity index held in memory for a single document.
#[derive(Debug, Clone)]
pub struct MemoryVectorIndex {
    entries: Vec<IndexedChunk>,
    dimensions: usize,
    model: String,
}

impl MemoryVectorIndex {
    pub fn build(
        chunks: Vec<PdfChunk>,
        embeddings: Vec<Vec<f32>>,
        model: impl Into<String>,
    ) -> Result<Self, IndexError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::CountMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
        if !embeddings.is_empty() && dimensions == 0 {
            return Err(IndexError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| {
                if vector.len() != dimensions {
                    return Err(IndexError::DimensionMismatch {
                        expected: dimensions,
                        actual: vector.len(),
                    });
                }
                let norm = l2_norm(&vector);
                Ok(IndexedChunk {
                    chunk,
                    vector,
                    norm,
                })
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        Ok(Self {
            entries,
            dimensions,
            model: model.into(),
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl VectorIndex for MemoryVectorIndex {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn search_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }

        let query_norm = l2_norm(query_vector);
        let mut scored = self
            .entries
            .iter()
            .map(|entry| (cosine(query_vector, query_norm, entry), entry))
            .collect::<Vec<_>>();

        // stable: equal scores keep insertion order
        scored.sort_by(|left, right| right.0.total_cmp(&left.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| SearchHit {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }
}

/// Embeds every chunk with `embedder` and builds the index.
pub async fn build_index(
    chunks: Vec<PdfChunk>,
    embedder: &dyn Embedder,
) -> Result<MemoryVectorIndex, IndexError> {
    let texts = chunks
        .iter()
        .map(|chunk| chunk.text.clone())
        .collect::<Vec<_>>();
    let embeddings = embedder.embed_batch(&texts).await?;
    let index = MemoryVectorIndex::build(chunks, embeddings, embedder.model())?;

    info!(
        model = %index.model(),
        chunks = index.len(),
        dimensions = index.dimensions(),
        "vector index built"
    );
    Ok(index)
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|value| value * value).sum::<f32>().sqrt()
}

fn cosine(query: &[f32], query_norm: f32, entry: &IndexedChunk) -> f32 {
    if query_norm == 0.0 || entry.norm == 0.0 {
        return 0.0;
    }
    let dot = query
        .iter()
        .zip(&entry.vector)
        .map(|(left, right)| left * right)
        .sum::<f32>();
    dot / (query_norm * entry.norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;

    fn chunk(index: u64, page: u32, text: &str) -> PdfChunk {
        PdfChunk {
            chunk_id: format!("chunk-{index}"),
            document_id: "doc.pdf".to_string(),
            page,
            chunk_index: index,
            text: text.to_string(),
        }
    }

    #[test]
    fn search_ranks_nearest_first() -> Result<(), IndexError> {
        let index = MemoryVectorIndex::build(
            vec![chunk(0, 1, "x"), chunk(1, 1, "y"), chunk(2, 2, "xy")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            "test",
        )?;

        let hits = index.search_vector(&[1.0, 0.1], 2)?;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.chunk_id, "chunk-0");
        assert_eq!(hits[1].chunk.chunk_id, "chunk-2");
        assert!(hits[0].score >= hits[1].score);
        Ok(())
    }

    #[test]
    fn ties_keep_insertion_order() -> Result<(), IndexError> {
        let index = MemoryVectorIndex::build(
            vec![chunk(0, 1, "a"), chunk(1, 2, "b"), chunk(2, 3, "c")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]],
            "test",
        )?;

        let hits = index.search_vector(&[2.0, 0.0], 3)?;
        assert_eq!(
            hits.iter().map(|hit| hit.chunk.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        Ok(())
    }

    #[test]
    fn top_k_larger_than_index_returns_everything() -> Result<(), IndexError> {
        let index = MemoryVectorIndex::build(
            vec![chunk(0, 1, "a")],
            vec![vec![0.5, 0.5]],
            "test",
        )?;
        assert_eq!(index.search_vector(&[0.5, 0.5], 3)?.len(), 1);
        Ok(())
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let counts = MemoryVectorIndex::build(vec![chunk(0, 1, "a")], Vec::new(), "test");
        assert!(matches!(counts, Err(IndexError::CountMismatch { .. })));

        let dims = MemoryVectorIndex::build(
            vec![chunk(0, 1, "a"), chunk(1, 1, "b")],
            vec![vec![1.0, 0.0], vec![1.0]],
            "test",
        );
        assert!(matches!(dims, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn query_dimension_must_match() -> Result<(), IndexError> {
        let index = MemoryVectorIndex::build(vec![chunk(0, 1, "a")], vec![vec![1.0, 0.0]], "test")?;
        assert!(index.search_vector(&[1.0], 1).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn build_index_embeds_every_chunk() -> Result<(), IndexError> {
        let embedder = CharacterNgramEmbedder::default();
        let chunks = vec![
            chunk(0, 1, "hydraulic pump pressure"),
            chunk(1, 2, "electrical wiring diagram"),
        ];
        let index = build_index(chunks, &embedder).await?;

        assert_eq!(index.len(), 2);
        assert_eq!(index.dimensions(), embedder.dimensions);

        let query = embedder.embed_text("pump pressure");
        let hits = index.search_vector(&query, 1)?;
        assert_eq!(hits[0].chunk.page, 1);
        Ok(())
    }
}
