use std::time::Duration;

use facelock_config::{load_resolved_config, ResolvedConfig};
use facelock_core::errors::{AppError, AppResult};
use facelock_core::CaptureLoopConfig;

pub fn load_settings() -> AppResult<ResolvedConfig> {
    let loaded = load_resolved_config()
        .map_err(|err| AppError::InvalidInput(format!("configuration error: {err}")))?;
    if let Some(source) = &loaded.source {
        tracing::debug!(source = %source.display(), "loaded configuration file");
    }
    Ok(loaded.resolved)
}

/// Capture settings for replaying pre-recorded observation files. The
/// inter-attempt delay is dropped because there is no live camera to wait
/// for between frames.
pub fn replay_capture_config(settings: &ResolvedConfig) -> CaptureLoopConfig {
    CaptureLoopConfig {
        max_attempts: settings.max_attempts,
        target_samples: settings.target_samples,
        inter_attempt_delay: Duration::ZERO,
        min_box_edge: settings.min_box_edge,
        deadline: settings.capture_deadline,
    }
}
