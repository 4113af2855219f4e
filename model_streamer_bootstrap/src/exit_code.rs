// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Process Exit Codes
//!
//! Maps application results to Unix-style exit codes (`sysexits.h`
//! conventions) so the process's exit status is meaningful to shell
//! scripts and orchestrators driving `model_streamer`.

use std::process::ExitCode as StdExitCode;

/// Unix-style exit codes for the streamer CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Successful termination.
    Ok,
    /// Command-line usage error.
    Usage,
    /// Input data was incorrect in some way (bad header, bad chunk list).
    DataError,
    /// Backend I/O failure (object-store / filesystem).
    IoError,
    /// Broadcast or collective operation did not complete in time.
    Timeout,
    /// Catch-all for internal errors that don't map to a specific cause.
    Software,
}

impl ExitCode {
    fn code(self) -> u8 {
        match self {
            ExitCode::Ok => 0,
            ExitCode::Usage => 64,
            ExitCode::DataError => 65,
            ExitCode::IoError => 74,
            ExitCode::Timeout => 75,
            ExitCode::Software => 70,
        }
    }
}

impl From<ExitCode> for StdExitCode {
    fn from(code: ExitCode) -> Self {
        StdExitCode::from(code.code())
    }
}

/// Maps a `StreamerError` to the exit code its category implies.
pub fn map_error_to_exit_code(error: &model_streamer_domain::error::StreamerError) -> ExitCode {
    use model_streamer_domain::error::StreamerError as E;
    match error {
        E::InvalidInput(_) | E::BudgetTooSmall(_) => ExitCode::Usage,
        E::HeaderJson(_)
        | E::HeaderEncoding(_)
        | E::HeaderTooLarge(_)
        | E::HeaderTruncated(_)
        | E::HeaderInconsistent(_)
        | E::UnknownDtype(_) => ExitCode::DataError,
        E::BackendError(_) => ExitCode::IoError,
        E::BroadcastTimeout(_) => ExitCode::Timeout,
        E::MissingChunks(_) | E::OutOfMemory(_) => ExitCode::Software,
    }
}

/// Converts a top-level `Result` into a process exit code, logging the
/// error through the bootstrap logger when present.
pub fn result_to_exit_code<T>(
    result: Result<T, model_streamer_domain::error::StreamerError>,
) -> StdExitCode {
    match result {
        Ok(_) => StdExitCode::from(ExitCode::Ok),
        Err(ref e) => StdExitCode::from(map_error_to_exit_code(e)),
    }
}
