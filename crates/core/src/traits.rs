use crate::error::IndexError;
use crate::models::SearchHit;

pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nearest chunks to `query_vector`, best first.
    fn search_vector(&self, query_vector: &[f32], top_k: usize)
        -> Result<Vec<SearchHit>, IndexError>;
}
