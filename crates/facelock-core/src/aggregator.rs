//! Reduces repeated capture samples into one canonical signature.

use crate::errors::{AppError, AppResult};

/// Element-wise arithmetic mean over a non-empty set of equal-length
/// embeddings. Every sample contributes equally; the minimum box-size filter
/// in the capture loop is the only gate applied before aggregation.
pub fn aggregate_samples(samples: &[Vec<f64>]) -> AppResult<Vec<f64>> {
    let first = samples.first().ok_or(AppError::InsufficientSamples)?;
    let expected = first.len();
    if expected == 0 {
        return Err(AppError::InvalidInput(
            "sample embeddings are zero-length".into(),
        ));
    }

    let mut signature = vec![0.0f64; expected];
    for sample in samples {
        if sample.len() != expected {
            return Err(AppError::DimensionMismatch {
                expected,
                found: sample.len(),
            });
        }
        for (slot, value) in signature.iter_mut().zip(sample.iter()) {
            *slot += value;
        }
    }

    let count = samples.len() as f64;
    for slot in &mut signature {
        *slot /= count;
    }

    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_single_sample_is_the_sample() {
        let signature = aggregate_samples(&[vec![1.0, 0.0, 0.0]]).unwrap();
        assert_eq!(signature, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn componentwise_mean_across_samples() {
        let samples = vec![vec![1.0, 2.0, 3.0], vec![3.0, 2.0, 1.0], vec![2.0, 2.0, 2.0]];
        let signature = aggregate_samples(&samples).unwrap();
        for (idx, value) in signature.iter().enumerate() {
            let expected: f64 = samples.iter().map(|s| s[idx]).sum::<f64>() / 3.0;
            assert!((value - expected).abs() < 1e-12);
        }
        assert_eq!(signature, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn identical_samples_aggregate_exactly() {
        let samples = vec![vec![1.0, 0.0, 0.0]; 3];
        let signature = aggregate_samples(&samples).unwrap();
        assert_eq!(signature, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_input_is_insufficient() {
        let err = aggregate_samples(&[]).unwrap_err();
        assert!(matches!(err, AppError::InsufficientSamples));
    }

    #[test]
    fn mixed_lengths_are_a_dimension_mismatch() {
        let err = aggregate_samples(&[vec![1.0, 2.0], vec![1.0, 2.0, 3.0]]).unwrap_err();
        match err {
            AppError::DimensionMismatch { expected, found } => {
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_length_embeddings_are_rejected() {
        let err = aggregate_samples(&[vec![], vec![]]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
