use crate::error::{Result, ScoutError};

/// Cosine similarity between two vectors of the same dimension
///
/// Returns a value between -1 and 1. A zero-magnitude vector scores 0.0.
/// Vectors of different lengths are a `DimensionMismatch`; they are never
/// truncated or padded to fit.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
  if a.len() != b.len() {
    return Err(ScoutError::DimensionMismatch { expected: a.len(), actual: b.len() });
  }
  if a.is_empty() {
    return Ok(0.0);
  }

  let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
  let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
  let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

  if norm_a == 0.0 || norm_b == 0.0 {
    return Ok(0.0);
  }
  Ok(dot_product / (norm_a * norm_b))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_identical_and_orthogonal_vectors() {
    assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]).unwrap() - 1.0).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).unwrap(), 0.0);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap() + 1.0).abs() < 1e-6);
  }

  #[test]
  fn test_zero_vector_scores_zero() {
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
  }

  #[test]
  fn test_length_mismatch_fails_fast() {
    let err = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0]).unwrap_err();
    assert!(matches!(err, ScoutError::DimensionMismatch { expected: 3, actual: 2 }));
  }
}
