use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "facelock",
    about = "Enroll and verify face signatures against a local registry",
    version
)]
pub struct Cli {
    /// Emit structured JSON to stdout instead of human-readable logs
    #[arg(long)]
    pub json: bool,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enroll a new identity from observation files
    Enroll(EnrollArgs),
    /// Verify a claimed identity from observation files
    Verify(VerifyArgs),
    /// Operations on the identity registry
    #[command(subcommand)]
    Identities(IdentitiesCommands),
}

#[derive(Debug, Subcommand)]
pub enum IdentitiesCommands {
    /// List all enrolled identities
    List(IdentitiesListArgs),
    /// Remove an enrolled identity
    Remove(IdentitiesRemoveArgs),
}

#[derive(Debug, Args)]
pub struct EnrollArgs {
    /// Identifier to enroll (e.g. an email address)
    pub identifier: String,

    /// First name for the identity's display profile
    #[arg(long)]
    pub first_name: String,

    /// Last name for the identity's display profile
    #[arg(long)]
    pub last_name: String,

    /// Observation JSON files produced by the face extraction pipeline,
    /// one per capture attempt, in order (repeatable)
    #[arg(long = "frame", required = true)]
    pub frames: Vec<PathBuf>,

    /// Override the registry directory (falls back to config, then $FACELOCK_REGISTRY_DIR)
    #[arg(long)]
    pub registry_dir: Option<PathBuf>,

    /// Override the enrollment collision threshold
    #[arg(long)]
    pub collision_threshold: Option<f64>,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Claimed identifier to verify against
    pub identifier: String,

    /// Observation JSON files produced by the face extraction pipeline,
    /// one per capture attempt, in order (repeatable)
    #[arg(long = "frame", required = true)]
    pub frames: Vec<PathBuf>,

    /// Override the registry directory (falls back to config, then $FACELOCK_REGISTRY_DIR)
    #[arg(long)]
    pub registry_dir: Option<PathBuf>,

    /// Override the verification threshold
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Args)]
pub struct IdentitiesListArgs {
    /// Override the registry directory
    #[arg(long)]
    pub registry_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct IdentitiesRemoveArgs {
    /// Identifier to remove
    pub identifier: String,

    /// Override the registry directory
    #[arg(long)]
    pub registry_dir: Option<PathBuf>,
}
