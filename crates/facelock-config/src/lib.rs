use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/facelock/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/facelock/config.toml";
pub const DEFAULT_COLLISION_THRESHOLD: f64 = 0.45;
pub const DEFAULT_VERIFICATION_THRESHOLD: f64 = 0.4;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_TARGET_SAMPLES: usize = 3;
pub const DEFAULT_INTER_ATTEMPT_DELAY_MILLIS: u64 = 500;
pub const DEFAULT_MIN_BOX_EDGE: u32 = 60;
pub const DEFAULT_REGISTRY_DIR: &str = "/var/lib/facelock/registry";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    pub enrollment_collision_threshold: Option<f64>,
    pub verification_threshold: Option<f64>,
    pub max_attempts: Option<u32>,
    pub target_samples: Option<usize>,
    pub inter_attempt_delay_millis: Option<u64>,
    pub min_box_edge: Option<u32>,
    pub capture_deadline_secs: Option<u64>,
    pub registry_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub enrollment_collision_threshold: f64,
    pub verification_threshold: f64,
    pub max_attempts: u32,
    pub target_samples: usize,
    pub inter_attempt_delay: Duration,
    pub min_box_edge: u32,
    pub capture_deadline: Option<Duration>,
    pub registry_dir: PathBuf,
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Self {
        Self {
            enrollment_collision_threshold: raw
                .enrollment_collision_threshold
                .unwrap_or(DEFAULT_COLLISION_THRESHOLD),
            verification_threshold: raw
                .verification_threshold
                .unwrap_or(DEFAULT_VERIFICATION_THRESHOLD),
            max_attempts: raw.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1),
            target_samples: raw.target_samples.unwrap_or(DEFAULT_TARGET_SAMPLES).max(1),
            inter_attempt_delay: Duration::from_millis(
                raw.inter_attempt_delay_millis
                    .unwrap_or(DEFAULT_INTER_ATTEMPT_DELAY_MILLIS),
            ),
            min_box_edge: raw.min_box_edge.unwrap_or(DEFAULT_MIN_BOX_EDGE),
            capture_deadline: raw.capture_deadline_secs.map(Duration::from_secs),
            registry_dir: raw
                .registry_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REGISTRY_DIR)),
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub contents: ConfigFile,
    pub source: PathBuf,
}

impl LoadedConfig {
    pub fn new(contents: ConfigFile, source: PathBuf) -> Self {
        Self { contents, source }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

pub fn load_resolved_config() -> Result<ResolvedConfigWithSource, ConfigError> {
    let sources = [
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ];
    load_resolved_from_paths(&sources)
}

pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let parsed =
                    toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                return Ok(Some(LoadedConfig::new(parsed, path.clone())));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

pub fn load_resolved_from_paths(
    paths: &[PathBuf],
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match load_from_paths(paths)? {
        Some(entry) => {
            let path = entry.source.clone();
            Ok(ResolvedConfigWithSource {
                resolved: ResolvedConfig::from_raw(entry.contents),
                source: Some(path),
            })
        }
        None => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::default(),
            source: None,
        }),
    }
}
