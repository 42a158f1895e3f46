//! Vector math: L2 norm, normalization, distance.

use std::fmt;

#[derive(Debug)]
pub enum MathError {
    NonFinite,
    DimensionMismatch { expected: usize, got: usize },
}

impl fmt::Display for MathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MathError::NonFinite => write!(f, "vector contains NaN or Inf"),
            MathError::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected {}, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for MathError {}

/// Validate that a vector contains only finite values.
pub fn validate_finite(v: &[f32]) -> Result<(), MathError> {
    for &x in v {
        if !x.is_finite() {
            return Err(MathError::NonFinite);
        }
    }
    Ok(())
}

/// Compute the L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    let sum: f32 = v.iter().map(|x| x * x).sum();
    sum.sqrt()
}

/// L2-normalize a vector in place. Idempotent; a zero vector is left as the
/// zero vector rather than divided by zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm == 0.0 {
        return;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
}

/// Euclidean distance between two vectors of equal width.
pub fn l2_distance(a: &[f32], b: &[f32]) -> Result<f32, MathError> {
    if a.len() != b.len() {
        return Err(MathError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    let sum: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum();
    Ok(sum.sqrt())
}
