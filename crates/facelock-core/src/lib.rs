//! Core face enrollment and verification pipeline.
//!
//! The crate is organized around two workflows, [`enrollment`] and
//! [`verification`], built from the same capture loop, sample aggregator
//! and distance matcher. Face detection and embedding extraction live
//! behind the [`capture::EmbeddingSource`] trait and persistence behind
//! [`registry::IdentityRegistry`], so callers supply both.

pub mod aggregator;
pub mod capture;
pub mod enrollment;
pub mod errors;
pub mod matcher;
pub mod registry;
pub mod verification;

pub use aggregator::aggregate_samples;
pub use capture::{
    run_capture_loop, CancelHandle, CaptureLoopConfig, CaptureReport, CaptureState,
    EmbeddingSource, FaceObservation,
};
pub use enrollment::{
    run_enrollment, run_enrollment_with, EnrollmentConfig, EnrollmentOutcome,
    DEFAULT_COLLISION_THRESHOLD,
};
pub use errors::{AppError, AppResult};
pub use matcher::{euclidean_distance, is_match, MatchDecision};
pub use registry::{
    normalize_identifier, FilesystemRegistry, IdentityRecord, IdentityRegistry, InMemoryRegistry,
    Profile,
};
pub use verification::{
    run_verification, run_verification_with, AuthenticatedIdentity, VerificationConfig,
    VerificationOutcome, DEFAULT_VERIFICATION_THRESHOLD,
};
