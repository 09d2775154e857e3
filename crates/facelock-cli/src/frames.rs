use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use facelock_core::errors::{AppError, AppResult};
use facelock_core::{EmbeddingSource, FaceObservation};

/// One observation file as produced by the external extraction pipeline.
/// `face` is null when the frame contained no usable face.
#[derive(Debug, Deserialize)]
struct FrameFile {
    face: Option<FrameFace>,
}

#[derive(Debug, Deserialize)]
struct FrameFace {
    embedding: Vec<f64>,
    box_width: u32,
    box_height: u32,
}

/// Replays pre-extracted observation files in order, one per capture
/// attempt. Once the list is exhausted every further attempt reports no
/// face, the same as a camera that stopped seeing one.
#[derive(Debug)]
pub struct FrameReplaySource {
    frames: Vec<PathBuf>,
    cursor: usize,
}

impl FrameReplaySource {
    pub fn new(frames: Vec<PathBuf>) -> Self {
        Self { frames, cursor: 0 }
    }
}

impl EmbeddingSource for FrameReplaySource {
    fn next_observation(&mut self) -> AppResult<Option<FaceObservation>> {
        let Some(path) = self.frames.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;

        let data = fs::read(path).map_err(|source| AppError::FrameRead {
            path: path.clone(),
            source,
        })?;
        let frame: FrameFile =
            serde_json::from_slice(&data).map_err(|err| AppError::InvalidFrameFile {
                path: path.clone(),
                message: format!("invalid observation file contents: {err}"),
            })?;

        Ok(frame.face.map(|face| FaceObservation {
            embedding: face.embedding,
            box_width: face.box_width,
            box_height: face.box_height,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_frame(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn replays_frames_in_order_then_reports_no_face() {
        let tmp = TempDir::new().unwrap();
        let first = write_frame(
            &tmp,
            "a.json",
            r#"{"face": {"embedding": [0.1, 0.2], "box_width": 240, "box_height": 200}}"#,
        );
        let second = write_frame(&tmp, "b.json", r#"{"face": null}"#);

        let mut source = FrameReplaySource::new(vec![first, second]);
        let obs = source.next_observation().unwrap().unwrap();
        assert_eq!(obs.embedding, vec![0.1, 0.2]);
        assert_eq!(obs.box_width, 240);
        assert!(source.next_observation().unwrap().is_none());
        assert!(source.next_observation().unwrap().is_none());
    }

    #[test]
    fn missing_frame_file_is_reported_with_path() {
        let mut source = FrameReplaySource::new(vec![PathBuf::from("/no/such/frame.json")]);
        let err = source.next_observation().unwrap_err();
        assert!(matches!(err, AppError::FrameRead { .. }));
    }

    #[test]
    fn malformed_frame_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let broken = write_frame(&tmp, "broken.json", "not json");
        let mut source = FrameReplaySource::new(vec![broken]);
        let err = source.next_observation().unwrap_err();
        assert!(matches!(err, AppError::InvalidFrameFile { .. }));
    }
}
