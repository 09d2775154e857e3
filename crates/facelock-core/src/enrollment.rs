//! Enrollment workflow: capture samples, aggregate them into a signature,
//! scan the registry for a colliding face, then persist the new identity.

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use tracing::info;

use crate::aggregator::aggregate_samples;
use crate::capture::{
    run_capture_loop, CancelHandle, CaptureLoopConfig, CaptureState, EmbeddingSource,
};
use crate::errors::{AppError, AppResult};
use crate::matcher::euclidean_distance;
use crate::registry::{
    normalize_identifier, FilesystemRegistry, IdentityRecord, IdentityRegistry, Profile,
};

/// Distance below which a freshly aggregated signature is considered the
/// same face as an already enrolled one. Deliberately looser than the
/// verification threshold so near-misses are caught at enrollment time.
pub const DEFAULT_COLLISION_THRESHOLD: f64 = 0.45;

#[derive(Debug, Clone)]
pub struct EnrollmentConfig {
    pub identifier: String,
    pub first_name: String,
    pub last_name: String,
    pub capture: CaptureLoopConfig,
    pub collision_threshold: f64,
    pub registry_dir: Option<PathBuf>,
}

impl EnrollmentConfig {
    pub fn new(
        identifier: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            capture: CaptureLoopConfig::default(),
            collision_threshold: DEFAULT_COLLISION_THRESHOLD,
            registry_dir: None,
        }
    }
}

#[derive(Debug)]
pub struct EnrollmentOutcome {
    pub identifier: String,
    pub record_id: String,
    pub sample_count: usize,
    pub attempts: u32,
    /// True when fewer than the target number of samples were collected and
    /// the signature was built from a partial set.
    pub degraded: bool,
    pub logs: Vec<String>,
}

pub fn run_enrollment<S: EmbeddingSource>(
    config: &EnrollmentConfig,
    source: &mut S,
) -> AppResult<EnrollmentOutcome> {
    let registry = FilesystemRegistry::resolve(config.registry_dir.as_deref());
    run_enrollment_with(config, source, &registry, &CancelHandle::new())
}

pub fn run_enrollment_with<S, R>(
    config: &EnrollmentConfig,
    source: &mut S,
    registry: &R,
    cancel: &CancelHandle,
) -> AppResult<EnrollmentOutcome>
where
    S: EmbeddingSource,
    R: IdentityRegistry,
{
    let identifier = normalize_identifier(&config.identifier)?;
    let profile = Profile::new(&config.first_name, &config.last_name)?;

    let mut logs = Vec::new();

    if registry.exists(&identifier)? {
        return Err(AppError::DuplicateIdentifier { identifier });
    }

    logs.push(format!(
        "Capturing up to {} sample(s) for {}",
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
        "Collected {} sample(s) in {} attempt(s) ({} frame(s) without a face, {} undersized)",
        report.samples.len(),
        report.attempts,
        report.discarded_no_face,
        report.discarded_undersized
    ));

    let signature = aggregate_samples(&report.samples)?;
    logs.push(format!(
        "Aggregated signature of length {}",
        signature.len()
    ));

    // Full scan of the registry. Every enrolled face is checked so a second
    // enrollment of the same person under a new identifier is refused.
    for existing in registry.load_all()? {
        let distance = euclidean_distance(&signature, &existing.signature)?;
        if distance < config.collision_threshold {
            return Err(AppError::DuplicateFace {
                identifier: existing.identifier,
                distance,
            });
        }
    }
    logs.push("No colliding face found in the registry".into());

    let record = IdentityRecord::new(
        identifier.clone(),
        profile,
        signature,
        report.samples.len(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    registry.insert(&record)?;

    let degraded = report.state == CaptureState::Degraded;
    if degraded {
        logs.push(format!(
            "Enrolled with a partial sample set ({} of {})",
            report.samples.len(),
            config.capture.target_samples
        ));
    }
    logs.push(format!("Enrolled identity {identifier}"));
    info!(
        identifier = %identifier,
        record_id = %record.record_id,
        samples = report.samples.len(),
        degraded,
        "enrollment complete"
    );

    Ok(EnrollmentOutcome {
        identifier,
        record_id: record.record_id,
        sample_count: record.sample_count,
        attempts: report.attempts,
        degraded,
        logs,
    })
}
