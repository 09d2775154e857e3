mod cli;
mod config;
mod frames;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use facelock_core::errors::AppError;
use facelock_core::registry::{FilesystemRegistry, IdentityRegistry};
use facelock_core::{
    normalize_identifier, run_enrollment_with, run_verification_with, CancelHandle,
    EnrollmentConfig, VerificationConfig,
};

use crate::cli::{Cli, Commands, IdentitiesCommands, OutputMode};
use crate::frames::FrameReplaySource;
use crate::output::{
    render_enroll, render_error, render_identities, render_removed, render_verify,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mode = cli.output_mode();
    init_tracing(cli.verbose);

    match run(cli, mode) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            render_error(&err, mode);
            err.exit_code()
        }
    }
}

fn run(cli: Cli, mode: OutputMode) -> Result<(), AppError> {
    let settings = config::load_settings()?;

    match cli.command {
        Commands::Enroll(args) => {
            let registry_dir = args
                .registry_dir
                .unwrap_or_else(|| settings.registry_dir.clone());
            let registry = FilesystemRegistry::resolve(Some(registry_dir.as_path()));
            let workflow = EnrollmentConfig {
                identifier: args.identifier,
                first_name: args.first_name,
                last_name: args.last_name,
                capture: config::replay_capture_config(&settings),
                collision_threshold: args
                    .collision_threshold
                    .unwrap_or(settings.enrollment_collision_threshold),
                registry_dir: Some(registry_dir),
            };
            let mut source = FrameReplaySource::new(args.frames);
            let outcome =
                run_enrollment_with(&workflow, &mut source, &registry, &CancelHandle::new())?;
            render_enroll(&outcome, mode)?;
        }
        Commands::Verify(args) => {
            let registry_dir = args
                .registry_dir
                .unwrap_or_else(|| settings.registry_dir.clone());
            let registry = FilesystemRegistry::resolve(Some(registry_dir.as_path()));
            let workflow = VerificationConfig {
                identifier: args.identifier,
                capture: config::replay_capture_config(&settings),
                threshold: args.threshold.unwrap_or(settings.verification_threshold),
                registry_dir: Some(registry_dir),
            };
            let mut source = FrameReplaySource::new(args.frames);
            let outcome =
                run_verification_with(&workflow, &mut source, &registry, &CancelHandle::new())?;
            render_verify(&outcome, mode)?;
        }
        Commands::Identities(cmd) => match cmd {
            IdentitiesCommands::List(args) => {
                let registry_dir = args
                    .registry_dir
                    .unwrap_or_else(|| settings.registry_dir.clone());
                let registry = FilesystemRegistry::resolve(Some(registry_dir.as_path()));
                let records = registry.load_all()?;
                render_identities(&records, mode)?;
            }
            IdentitiesCommands::Remove(args) => {
                let registry_dir = args
                    .registry_dir
                    .unwrap_or_else(|| settings.registry_dir.clone());
                let registry = FilesystemRegistry::resolve(Some(registry_dir.as_path()));
                let identifier = normalize_identifier(&args.identifier)?;
                let removed = registry.remove(&identifier)?;
                render_removed(&identifier, removed, mode)?;
            }
        },
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(fmt_layer);
    if tracing::subscriber::set_global_default(registry).is_err() {
        // Already initialised (tests).
    }
}
