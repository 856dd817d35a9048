//! Embedding encoding and exact nearest-neighbor selection

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::str::FromStr;

/// Distance function for vector search; lower is more similar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, in [0, 2]
    Cosine,
    /// Euclidean distance
    L2,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
        }
    }

    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => {
                let mut dot = 0.0f32;
                let mut norm_a = 0.0f32;
                let mut norm_b = 0.0f32;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
            }
            DistanceMetric::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            _ => Err(Error::Config(format!("Unknown distance metric: {}", s))),
        }
    }
}

/// Serialize as little-endian IEEE-754 single-precision floats
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_embedding`]; the blob must hold exactly `dimension` floats
pub fn decode_embedding(bytes: &[u8], dimension: usize) -> Result<Vec<f32>> {
    if bytes.len() != dimension * 4 {
        return Err(Error::Corrupt(format!(
            "embedding blob has {} bytes, expected {}",
            bytes.len(),
            dimension * 4
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Reject vectors that cannot be stored or searched
pub fn validate_embedding(vector: &[f32], dimension: usize) -> Result<()> {
    if vector.len() != dimension {
        return Err(Error::InvalidInput(format!(
            "embedding dimension {} does not match store dimension {}",
            vector.len(),
            dimension
        )));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput(
            "embedding contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f32,
    chunk_id: i64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.chunk_id.cmp(&other.chunk_id))
    }
}

/// Keeps the `k` closest candidates seen so far
///
/// Ties on distance resolve to the lower chunk id, so results are stable for
/// identical input.
#[derive(Debug)]
pub struct NearestNeighbors {
    k: usize,
    heap: BinaryHeap<Candidate>,
}

impl NearestNeighbors {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    pub fn push(&mut self, chunk_id: i64, distance: f32) {
        if self.k == 0 {
            return;
        }
        self.heap.push(Candidate { distance, chunk_id });
        if self.heap.len() > self.k {
            self.heap.pop();
        }
    }

    /// `(chunk_id, distance)` pairs, nearest first
    pub fn into_sorted(self) -> Vec<(i64, f32)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| (c.chunk_id, c.distance))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_is_little_endian() {
        let bytes = encode_embedding(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_embedding(&bytes, 2).unwrap(), vec![1.0, -2.5]);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let err = decode_embedding(&[0u8; 7], 2).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_validate_embedding() {
        assert!(validate_embedding(&[0.1, 0.2], 2).is_ok());
        assert!(matches!(
            validate_embedding(&[0.1], 2),
            Err(Error::InvalidInput(_))
        ));
        assert!(validate_embedding(&[0.1, f32::NAN], 2).is_err());
    }

    #[test]
    fn test_cosine_distance() {
        let metric = DistanceMetric::Cosine;
        assert!(metric.distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
        assert!((metric.distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((metric.distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(metric.distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_l2_distance() {
        let d = DistanceMetric::L2.distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_neighbors_keeps_k_closest() {
        let mut nn = NearestNeighbors::new(3);
        for (id, d) in [(1, 0.9), (2, 0.1), (3, 0.5), (4, 0.3), (5, 0.7)] {
            nn.push(id, d);
        }

        assert_eq!(nn.into_sorted(), vec![(2, 0.1), (4, 0.3), (3, 0.5)]);
    }

    #[test]
    fn test_nearest_neighbors_tie_break_by_id() {
        let mut nn = NearestNeighbors::new(2);
        nn.push(9, 0.2);
        nn.push(3, 0.2);
        nn.push(5, 0.2);

        assert_eq!(nn.into_sorted(), vec![(3, 0.2), (5, 0.2)]);
    }

    #[test]
    fn test_zero_k() {
        let mut nn = NearestNeighbors::new(0);
        nn.push(1, 0.0);
        assert!(nn.into_sorted().is_empty());
    }
}
