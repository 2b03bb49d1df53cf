use std::cmp::Ordering;

use crate::context::Chunk;
use crate::ContextBuildError;

/// In-memory similarity index over embedded chunks. Lives for one
/// retrieval call.
#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<(Chunk, Vec<f32>)>,
    dimension: Option<usize>,
}

impl VectorIndex {
    pub fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<(), ContextBuildError> {
        self.check_dimension(vector.len())?;
        self.dimension = Some(vector.len());
        self.entries.push((chunk, vector));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `k` chunks. With a query vector they are ranked by cosine
    /// similarity, ties in insertion order; without one the first `k`
    /// inserted chunks are returned.
    pub fn search(
        &self,
        query: Option<&[f32]>,
        k: usize,
    ) -> Result<Vec<&Chunk>, ContextBuildError> {
        let Some(query) = query else {
            return Ok(self.entries.iter().take(k).map(|(chunk, _)| chunk).collect());
        };
        self.check_dimension(query.len())?;

        let mut scored: Vec<(&Chunk, f32)> = self
            .entries
            .iter()
            .map(|(chunk, vector)| (chunk, cosine_similarity(query, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        Ok(scored.into_iter().take(k).map(|(chunk, _)| chunk).collect())
    }

    fn check_dimension(&self, actual: usize) -> Result<(), ContextBuildError> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(ContextBuildError::InvalidDimension { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
