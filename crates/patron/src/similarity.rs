/// Inner product of two equal-length vectors
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
  debug_assert_eq!(a.len(), b.len());
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Calculate cosine similarity between two embeddings
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
  if a.len() != b.len() {
    return 0.0;
  }

  let magnitude_a = dot(a, a).sqrt();
  let magnitude_b = dot(b, b).sqrt();

  if magnitude_a == 0.0 || magnitude_b == 0.0 {
    0.0
  } else {
    dot(a, b) / (magnitude_a * magnitude_b)
  }
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn normalize_l2(vector: &mut [f32]) {
  let magnitude = dot(vector, vector).sqrt();
  if magnitude < f32::EPSILON {
    tracing::warn!("zero-magnitude embedding left unnormalized");
    return;
  }

  for value in vector.iter_mut() {
    *value /= magnitude;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cosine_identical_vectors() {
    let v = [0.3, 0.4, 0.5];
    assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn test_cosine_opposite_vectors() {
    let a = [1.0, 0.0];
    let b = [-1.0, 0.0];
    assert!((cosine(&a, &b) + 1.0).abs() < 1e-6);
  }

  #[test]
  fn test_cosine_length_mismatch_is_zero() {
    assert_eq!(cosine(&[1.0, 2.0], &[1.0]), 0.0);
  }

  #[test]
  fn test_cosine_zero_vector_is_zero() {
    assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
  }

  #[test]
  fn test_normalize_makes_dot_equal_cosine() {
    let mut a = vec![3.0, 4.0];
    let mut b = vec![1.0, 2.0];
    let expected = cosine(&a, &b);

    normalize_l2(&mut a);
    normalize_l2(&mut b);

    assert!((dot(&a, &a) - 1.0).abs() < 1e-6);
    assert!((dot(&a, &b) - expected).abs() < 1e-6);
  }

  #[test]
  fn test_normalize_zero_vector_unchanged() {
    let mut v = vec![0.0, 0.0, 0.0];
    normalize_l2(&mut v);
    assert_eq!(v, vec![0.0, 0.0, 0.0]);
  }
}
