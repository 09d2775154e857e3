use std::error::Error;
use std::io::{self, Write};

use serde_json::json;

use facelock_core::errors::{AppError, AppResult};
use facelock_core::registry::IdentityRecord;
use facelock_core::{EnrollmentOutcome, VerificationOutcome};

use crate::cli::OutputMode;

pub fn render_enroll(outcome: &EnrollmentOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            for line in &outcome.logs {
                println!("{line}");
            }
            println!(
                "Enrollment successful: {} ({} sample(s), {} attempt(s))",
                outcome.identifier, outcome.sample_count, outcome.attempts
            );
        }
        OutputMode::Json => {
            let payload = serde_json::to_string(&json!({
                "success": true,
                "identifier": outcome.identifier,
                "record_id": outcome.record_id,
                "sample_count": outcome.sample_count,
                "attempts": outcome.attempts,
                "degraded": outcome.degraded,
            }))?;
            write_line(&payload)?;
        }
    }
    Ok(())
}

pub fn render_verify(outcome: &VerificationOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            for line in &outcome.logs {
                println!("{line}");
            }
            println!(
                "Verification successful: {} ({}, distance {:.4})",
                outcome.identity.identifier,
                outcome.identity.display_name,
                outcome.identity.distance
            );
        }
        OutputMode::Json => {
            let payload = serde_json::to_string(&json!({
                "success": true,
                "identifier": outcome.identity.identifier,
                "record_id": outcome.identity.record_id,
                "display_name": outcome.identity.display_name,
                "distance": outcome.identity.distance,
                "verified_at": outcome.identity.verified_at,
                "attempts": outcome.attempts,
                "degraded": outcome.degraded,
            }))?;
            write_line(&payload)?;
        }
    }
    Ok(())
}

pub fn render_identities(records: &[IdentityRecord], mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if records.is_empty() {
                println!("No identities enrolled");
                return Ok(());
            }
            for record in records {
                println!(
                    "{}  {}  samples={}  enrolled_at={}",
                    record.identifier,
                    record.profile.display_name(),
                    record.sample_count,
                    record.created_at
                );
            }
        }
        OutputMode::Json => {
            let entries: Vec<_> = records
                .iter()
                .map(|record| {
                    json!({
                        "identifier": record.identifier,
                        "record_id": record.record_id,
                        "first_name": record.profile.first_name,
                        "last_name": record.profile.last_name,
                        "sample_count": record.sample_count,
                        "created_at": record.created_at,
                    })
                })
                .collect();
            let payload = serde_json::to_string(&json!({ "identities": entries }))?;
            write_line(&payload)?;
        }
    }
    Ok(())
}

pub fn render_removed(identifier: &str, removed: bool, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if removed {
                println!("Removed identity {identifier}");
            } else {
                println!("No identity {identifier} to remove");
            }
        }
        OutputMode::Json => {
            let payload = serde_json::to_string(&json!({
                "identifier": identifier,
                "removed": removed,
            }))?;
            write_line(&payload)?;
        }
    }
    Ok(())
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "success": false,
                "error": err.human_message(),
            });
            if let Ok(json) = serde_json::to_string(&payload) {
                println!("{json}");
            }
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
    }
}

fn write_line(payload: &str) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}
