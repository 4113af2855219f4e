// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling with security-first design.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. parse_cli()                     │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validate_cli()                  │  Security validation
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```
//!
//! A single `stream` subcommand is the library's thin smoke-test
//! surface (SPEC_FULL.md "Ambient stack / CLI"): it parses a
//! safetensors file's header and prints its tensor table (name, dtype,
//! shape) without reading any chunk data. The CLI is explicitly outside
//! the streaming core per spec §1 - the actual `stream_files` call is a
//! library API, not something this binary drives end to end.
//!
//! Paths accepted here may be local filesystem paths or backend URIs
//! (`s3://`, `gs://`, `az://`, §6.2); only local paths are checked for
//! existence, since a URI's object is validated by the backend fetcher
//! the first time it's read, not by the CLI.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

/// Maximum single argument length
const MAX_ARG_LENGTH: usize = 4096;

/// Patterns that indicate shell injection rather than a legitimate
/// local path or backend URI.
const DANGEROUS_PATTERNS: &[&str] = &["`", ";", "&", "|", "\n", "\r", "\0"];

/// CLI parsing/validation errors.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("argument too long (max {MAX_ARG_LENGTH} characters): {0}")]
    ArgumentTooLong(String),

    #[error("dangerous pattern '{pattern}' detected in argument: {arg}")]
    DangerousPattern { pattern: String, arg: String },

    #[error("local path does not exist: {0}")]
    PathNotFound(String),
}

/// Top-level CLI structure.
#[derive(Parser, Debug, Clone)]
#[command(name = "model_streamer")]
#[command(about = concat!("Model weight streaming loader v", env!("CARGO_PKG_VERSION")))]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose (debug-level) logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Parse a safetensors header and print its tensor table (name,
    /// dtype, shape), without streaming any chunk data.
    Stream {
        /// Safetensors file path or backend URI.
        file: String,
    },
}

/// Validated CLI configuration.
///
/// Every string argument has passed [`validate_argument`], and every
/// local (non-URI) path has been confirmed to exist.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub verbose: bool,
}

/// Validated command variants.
#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Stream { file: String },
}

/// Parses argv with clap.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parses and validates CLI arguments in one call.
///
/// # Errors
///
/// Returns [`ParseError`] if any argument fails validation.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let cli = parse_cli();
    validate_cli(cli)
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let command = match cli.command {
        Commands::Stream { file } => {
            validate_path_argument(&file)?;
            ValidatedCommand::Stream { file }
        }
    };

    Ok(ValidatedCli {
        command,
        verbose: cli.verbose,
    })
}

/// Validates a single argument for length and shell-injection patterns.
fn validate_argument(arg: &str) -> Result<(), ParseError> {
    if arg.len() > MAX_ARG_LENGTH {
        return Err(ParseError::ArgumentTooLong(
            arg.chars().take(50).collect::<String>() + "...",
        ));
    }
    for pattern in DANGEROUS_PATTERNS {
        if arg.contains(pattern) {
            return Err(ParseError::DangerousPattern {
                pattern: pattern.to_string(),
                arg: arg.to_string(),
            });
        }
    }
    Ok(())
}

/// Validates a file argument: any backend URI (`s3://`, `gs://`,
/// `az://`) is checked only for shell-injection patterns; a bare local
/// path is additionally required to exist on disk.
fn validate_path_argument(arg: &str) -> Result<(), ParseError> {
    validate_argument(arg)?;

    let is_uri = ["s3://", "gs://", "az://"].iter().any(|scheme| arg.starts_with(scheme));
    if is_uri {
        return Ok(());
    }

    if !PathBuf::from(arg).exists() {
        return Err(ParseError::PathNotFound(arg.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_object_store_uris_without_existence_check() {
        let cli = Cli {
            command: Commands::Stream {
                file: "s3://bucket/model.safetensors".to_string(),
            },
            verbose: false,
        };
        let validated = validate_cli(cli).unwrap();
        match validated.command {
            ValidatedCommand::Stream { file } => {
                assert_eq!(file, "s3://bucket/model.safetensors".to_string());
            }
        }
    }

    #[test]
    fn rejects_nonexistent_local_path() {
        let cli = Cli {
            command: Commands::Stream {
                file: "/nonexistent/path/to/model.safetensors".to_string(),
            },
            verbose: false,
        };
        assert!(matches!(validate_cli(cli), Err(ParseError::PathNotFound(_))));
    }

    #[test]
    fn detects_dangerous_patterns() {
        for dangerous in ["file;rm -rf /", "file`whoami`", "file|pipe", "file\nnewline"] {
            assert!(
                matches!(validate_argument(dangerous), Err(ParseError::DangerousPattern { .. })),
                "failed to detect dangerous pattern in: {dangerous}"
            );
        }
    }

    #[test]
    fn accepts_safe_local_path() {
        // Cargo.toml always exists in the crate root at test time.
        assert!(validate_path_argument(env!("CARGO_MANIFEST_DIR")).is_ok());
    }
}
