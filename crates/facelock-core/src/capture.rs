//! Bounded sampling loop shared by enrollment and verification.
//!
//! Drives the external embedding source for up to `max_attempts` frames,
//! discarding frames with no detected face or a detection box below the
//! minimum size, and stops early once `target_samples` usable embeddings
//! have been collected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::errors::AppResult;

/// One usable result from the external embedding source: a fixed-length
/// embedding plus the detection box dimensions it was extracted from.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceObservation {
    pub embedding: Vec<f64>,
    pub box_width: u32,
    pub box_height: u32,
}

/// External face detection + embedding model. One call per capture attempt;
/// `None` means no usable face was found in the frame. Implementations must
/// not retain core state between calls.
pub trait EmbeddingSource {
    fn next_observation(&mut self) -> AppResult<Option<FaceObservation>>;
}

#[derive(Debug, Clone)]
pub struct CaptureLoopConfig {
    pub max_attempts: u32,
    pub target_samples: usize,
    pub inter_attempt_delay: Duration,
    /// Observations whose box width or height falls below this edge length
    /// are discarded as too small or too far away.
    pub min_box_edge: u32,
    /// Optional wall-clock bound on the whole loop.
    pub deadline: Option<Duration>,
}

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_TARGET_SAMPLES: usize = 3;
pub const DEFAULT_INTER_ATTEMPT_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MIN_BOX_EDGE: u32 = 60;

impl Default for CaptureLoopConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            target_samples: DEFAULT_TARGET_SAMPLES,
            inter_attempt_delay: DEFAULT_INTER_ATTEMPT_DELAY,
            min_box_edge: DEFAULT_MIN_BOX_EDGE,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// `target_samples` embeddings collected before the attempt budget ran out.
    Succeeded,
    /// Attempts exhausted with at least one sample; the partial set is used.
    Degraded,
    /// Attempts exhausted with zero samples.
    Exhausted,
    /// The cancel handle fired; no further source calls were made.
    Cancelled,
}

#[derive(Debug)]
pub struct CaptureReport {
    pub samples: Vec<Vec<f64>>,
    pub attempts: u32,
    pub discarded_no_face: u32,
    pub discarded_undersized: u32,
    pub state: CaptureState,
}

/// Cooperative cancellation for an in-flight capture loop. Clone the handle
/// into whatever owns the surrounding session; setting it stops the loop
/// before its next attempt and before finishing any inter-attempt pause.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

const CANCEL_POLL_SLICE: Duration = Duration::from_millis(50);

pub fn run_capture_loop<S: EmbeddingSource>(
    source: &mut S,
    config: &CaptureLoopConfig,
    cancel: &CancelHandle,
) -> AppResult<CaptureReport> {
    let started = Instant::now();
    let mut samples: Vec<Vec<f64>> = Vec::with_capacity(config.target_samples);
    let mut attempts = 0u32;
    let mut discarded_no_face = 0u32;
    let mut discarded_undersized = 0u32;

    while attempts < config.max_attempts {
        if cancel.is_cancelled() {
            return Ok(finish(
                samples,
                attempts,
                discarded_no_face,
                discarded_undersized,
                CaptureState::Cancelled,
            ));
        }
        if deadline_passed(config, started) {
            debug!(attempts, "capture deadline reached");
            break;
        }

        attempts += 1;
        match source.next_observation()? {
            None => {
                discarded_no_face += 1;
                debug!(attempt = attempts, "no face detected in frame");
            }
            Some(observation)
                if observation.box_width < config.min_box_edge
                    || observation.box_height < config.min_box_edge =>
            {
                discarded_undersized += 1;
                debug!(
                    attempt = attempts,
                    width = observation.box_width,
                    height = observation.box_height,
                    min_edge = config.min_box_edge,
                    "detection box below minimum size"
                );
            }
            Some(observation) => {
                samples.push(observation.embedding);
                debug!(
                    attempt = attempts,
                    collected = samples.len(),
                    target = config.target_samples,
                    "accepted sample"
                );
                if samples.len() >= config.target_samples {
                    return Ok(finish(
                        samples,
                        attempts,
                        discarded_no_face,
                        discarded_undersized,
                        CaptureState::Succeeded,
                    ));
                }
            }
        }

        if attempts < config.max_attempts
            && !pause_between_attempts(config, cancel, started)
        {
            return Ok(finish(
                samples,
                attempts,
                discarded_no_face,
                discarded_undersized,
                CaptureState::Cancelled,
            ));
        }
    }

    let state = if samples.is_empty() {
        CaptureState::Exhausted
    } else {
        CaptureState::Degraded
    };
    Ok(finish(
        samples,
        attempts,
        discarded_no_face,
        discarded_undersized,
        state,
    ))
}

fn finish(
    samples: Vec<Vec<f64>>,
    attempts: u32,
    discarded_no_face: u32,
    discarded_undersized: u32,
    state: CaptureState,
) -> CaptureReport {
    CaptureReport {
        samples,
        attempts,
        discarded_no_face,
        discarded_undersized,
        state,
    }
}

fn deadline_passed(config: &CaptureLoopConfig, started: Instant) -> bool {
    config
        .deadline
        .map(|limit| started.elapsed() >= limit)
        .unwrap_or(false)
}

/// Sleeps the inter-attempt delay in short slices so a cancel request takes
/// effect promptly. Returns false when the pause was interrupted by
/// cancellation.
fn pause_between_attempts(
    config: &CaptureLoopConfig,
    cancel: &CancelHandle,
    started: Instant,
) -> bool {
    let mut remaining = config.inter_attempt_delay;
    if let Some(limit) = config.deadline {
        let until_deadline = limit.saturating_sub(started.elapsed());
        remaining = remaining.min(until_deadline);
    }

    while remaining > Duration::ZERO {
        if cancel.is_cancelled() {
            return false;
        }
        let slice = remaining.min(CANCEL_POLL_SLICE);
        sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }

    !cancel.is_cancelled()
}
