//! Distance computation and threshold classification between signatures.

use crate::errors::{AppError, AppResult};

/// Outcome of comparing two signatures under a threshold. Derived, never
/// persisted; neither input is mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchDecision {
    pub distance: f64,
    pub is_match: bool,
}

impl MatchDecision {
    pub fn evaluate(candidate: &[f64], reference: &[f64], threshold: f64) -> AppResult<Self> {
        let distance = euclidean_distance(candidate, reference)?;
        Ok(Self {
            distance,
            is_match: is_match(distance, threshold),
        })
    }
}

/// Euclidean (L2) norm of the element-wise difference.
pub fn euclidean_distance(lhs: &[f64], rhs: &[f64]) -> AppResult<f64> {
    if lhs.len() != rhs.len() {
        return Err(AppError::DimensionMismatch {
            expected: lhs.len(),
            found: rhs.len(),
        });
    }

    let sum = lhs
        .iter()
        .zip(rhs.iter())
        .map(|(l, r)| {
            let diff = l - r;
            diff * diff
        })
        .sum::<f64>();

    Ok(sum.sqrt())
}

/// Strict inequality at the boundary: a distance equal to the threshold is
/// not a match.
pub fn is_match(distance: f64, threshold: f64) -> bool {
    distance < threshold
}
