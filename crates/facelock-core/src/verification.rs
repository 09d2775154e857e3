//! Verification workflow: a 1:1 check of a live capture against the stored
//! signature of a claimed identifier.

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use tracing::info;

use crate::aggregator::aggregate_samples;
use crate::capture::{
    run_capture_loop, CancelHandle, CaptureLoopConfig, CaptureState, EmbeddingSource,
};
use crate::errors::{AppError, AppResult};
use crate::matcher::MatchDecision;
use crate::registry::{normalize_identifier, FilesystemRegistry, IdentityRegistry};

/// Distance below which a live capture is accepted as the claimed identity.
/// Tighter than the enrollment collision threshold.
pub const DEFAULT_VERIFICATION_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub identifier: String,
    pub capture: CaptureLoopConfig,
    pub threshold: f64,
    pub registry_dir: Option<PathBuf>,
}

impl VerificationConfig {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            capture: CaptureLoopConfig::default(),
            threshold: DEFAULT_VERIFICATION_THRESHOLD,
            registry_dir: None,
        }
    }
}

/// Proof of a successful verification, scoped to the caller's session.
/// Carries everything a caller needs to act on the result without going
/// back to the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedIdentity {
    pub identifier: String,
    pub record_id: String,
    pub display_name: String,
    pub distance: f64,
    pub verified_at: String,
}

#[derive(Debug)]
pub struct VerificationOutcome {
    pub identity: AuthenticatedIdentity,
    pub attempts: u32,
    pub sample_count: usize,
    pub degraded: bool,
    pub logs: Vec<String>,
}

pub fn run_verification<S: EmbeddingSource>(
    config: &VerificationConfig,
    source: &mut S,
) -> AppResult<VerificationOutcome> {
    let registry = FilesystemRegistry::resolve(config.registry_dir.as_deref());
    run_verification_with(config, source, &registry, &CancelHandle::new())
}

pub fn run_verification_with<S, R>(
    config: &VerificationConfig,
    source: &mut S,
    registry: &R,
    cancel: &CancelHandle,
) -> AppResult<VerificationOutcome>
where
    S: EmbeddingSource,
    R: IdentityRegistry,
{
    let identifier = normalize_identifier(&config.identifier)?;

    let mut logs = Vec::new();
    logs.push(format!(
        "Capturing up to {} sample(s) to verify {}",
        config.capture.target_samples, identifier
    ));
    let report = run_capture_loop(source, &config.capture, cancel)?;
    match report.state {
        CaptureState::Exhausted => {
            return Err(AppError::NoFaceDetected {
                attempts: report.attempts,
            });
        }
        CaptureState::Cancelled => {
            return Err(AppError::Cancelled {
                attempts: report.attempts,
            });
        }
        CaptureState::Succeeded | CaptureState::Degraded => {}
    }
    logs.push(format!(
        "Collected {} sample(s) in {} attempt(s)",
        report.samples.len(),
        report.attempts
    ));

    let candidate = aggregate_samples(&report.samples)?;

    // Capture precedes the lookup; NoFaceDetected wins when both would fail.
    let record = registry
        .load(&identifier)?
        .ok_or_else(|| AppError::IdentityNotFound {
            identifier: identifier.clone(),
        })?;

    let decision = MatchDecision::evaluate(&candidate, &record.signature, config.threshold)?;
    logs.push(format!(
        "Distance to enrolled signature: {:.4} (threshold {:.4})",
        decision.distance, config.threshold
    ));

    if !decision.is_match {
        info!(
            identifier = %identifier,
            distance = decision.distance,
            threshold = config.threshold,
            "verification rejected"
        );
        return Err(AppError::FaceMismatch {
            identifier,
            distance: decision.distance,
            threshold: config.threshold,
        });
    }

    let identity = AuthenticatedIdentity {
        identifier: identifier.clone(),
        record_id: record.record_id,
        display_name: record.profile.display_name(),
        distance: decision.distance,
        verified_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    logs.push(format!("Verified identity {identifier}"));
    info!(
        identifier = %identifier,
        distance = decision.distance,
        "verification accepted"
    );

    Ok(VerificationOutcome {
        identity,
        attempts: report.attempts,
        sample_count: report.samples.len(),
        degraded: report.state == CaptureState::Degraded,
        logs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::capture::FaceObservation;
    use crate::registry::{IdentityRecord, InMemoryRegistry, Profile};

    struct ConstantSource {
        embedding: Vec<f64>,
    }

    impl EmbeddingSource for ConstantSource {
        fn next_observation(&mut self) -> AppResult<Option<FaceObservation>> {
            Ok(Some(FaceObservation {
                embedding: self.embedding.clone(),
                box_width: 200,
                box_height: 200,
            }))
        }
    }

    fn fast_config(identifier: &str) -> VerificationConfig {
        let mut config = VerificationConfig::new(identifier);
        config.capture.inter_attempt_delay = std::time::Duration::ZERO;
        config
    }

    fn enrolled(identifier: &str, signature: Vec<f64>) -> IdentityRecord {
        IdentityRecord::new(
            identifier.into(),
            Profile::new("Test", "Person").unwrap(),
            signature,
            3,
            "2026-01-01T00:00:00Z".into(),
        )
    }

    #[test]
    fn matching_face_is_verified() {
        let registry =
            InMemoryRegistry::with_records(vec![enrolled("alice", vec![1.0, 0.0, 0.0])]);
        let mut source = ConstantSource {
            embedding: vec![1.0, 0.1, 0.0],
        };
        let outcome = run_verification_with(
            &fast_config(" Alice "),
            &mut source,
            &registry,
            &CancelHandle::new(),
        )
        .unwrap();
        assert_eq!(outcome.identity.identifier, "alice");
        assert_eq!(outcome.identity.display_name, "Test Person");
        assert!(outcome.identity.distance < DEFAULT_VERIFICATION_THRESHOLD);
        assert!(!outcome.identity.verified_at.is_empty());
    }

    #[test]
    fn unknown_identifier_fails_after_a_full_capture() {
        let registry = InMemoryRegistry::default();
        let mut source = ConstantSource {
            embedding: vec![0.1, 0.2],
        };
        let err = run_verification_with(
            &fast_config("ghost"),
            &mut source,
            &registry,
            &CancelHandle::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::IdentityNotFound { identifier } if identifier == "ghost"
        ));
    }

    #[test]
    fn faceless_capture_outranks_the_unknown_identifier() {
        struct CountingEmptySource {
            calls: u32,
        }
        impl EmbeddingSource for CountingEmptySource {
            fn next_observation(&mut self) -> AppResult<Option<FaceObservation>> {
                self.calls += 1;
                Ok(None)
            }
        }
        let registry = InMemoryRegistry::default();
        let mut source = CountingEmptySource { calls: 0 };
        let err = run_verification_with(
            &fast_config("ghost"),
            &mut source,
            &registry,
            &CancelHandle::new(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NoFaceDetected { attempts: 5 }));
        assert_eq!(source.calls, 5);
    }

    #[test]
    fn distant_face_is_rejected_with_distance_details() {
        let registry =
            InMemoryRegistry::with_records(vec![enrolled("alice", vec![0.0, 0.0, 0.0])]);
        let mut source = ConstantSource {
            embedding: vec![1.0, 1.0, 1.0],
        };
        let err = run_verification_with(
            &fast_config("alice"),
            &mut source,
            &registry,
            &CancelHandle::new(),
        )
        .unwrap_err();
        match err {
            AppError::FaceMismatch {
                identifier,
                distance,
                threshold,
            } => {
                assert_eq!(identifier, "alice");
                assert!(distance >= threshold);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn distance_exactly_at_threshold_is_rejected() {
        let registry =
            InMemoryRegistry::with_records(vec![enrolled("alice", vec![0.0, 0.0, 0.0])]);
        let mut source = ConstantSource {
            embedding: vec![DEFAULT_VERIFICATION_THRESHOLD, 0.0, 0.0],
        };
        let err = run_verification_with(
            &fast_config("alice"),
            &mut source,
            &registry,
            &CancelHandle::new(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::FaceMismatch { .. }));
    }

    #[test]
    fn stored_signature_of_different_length_is_a_dimension_mismatch() {
        let registry = InMemoryRegistry::with_records(vec![enrolled("alice", vec![0.0, 0.0])]);
        let mut source = ConstantSource {
            embedding: vec![0.0, 0.0, 0.0],
        };
        let err = run_verification_with(
            &fast_config("alice"),
            &mut source,
            &registry,
            &CancelHandle::new(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::DimensionMismatch { .. }));
    }

    #[test]
    fn no_face_across_all_attempts_is_reported() {
        struct EmptySource;
        impl EmbeddingSource for EmptySource {
            fn next_observation(&mut self) -> AppResult<Option<FaceObservation>> {
                Ok(None)
            }
        }
        let registry =
            InMemoryRegistry::with_records(vec![enrolled("alice", vec![0.0, 0.0, 0.0])]);
        let err = run_verification_with(
            &fast_config("alice"),
            &mut EmptySource,
            &registry,
            &CancelHandle::new(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NoFaceDetected { attempts: 5 }));
    }
}
