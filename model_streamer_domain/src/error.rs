// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Streamer Error Taxonomy
//!
//! One typed error per failure category, so callers can distinguish
//! wire-format corruption from semantic inconsistency from backend
//! failure without string matching.

use thiserror::Error;

/// All failure modes surfaced by the scheduler, header decoder,
/// partitioner, and distributed engine.
#[derive(Error, Debug, Clone)]
pub enum StreamerError {
    /// Heterogeneous backends in one request, non-positive partition
    /// count, or duplicate file ids.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Memory limit is below the largest single (padded) chunk.
    #[error("memory budget too small: {0}")]
    BudgetTooSmall(String),

    /// Any failure from the byte-range fetcher: not found, permission
    /// denied, transport error, truncated read.
    #[error("backend error: {0}")]
    BackendError(String),

    /// Safetensors header body failed to parse as JSON.
    #[error("safetensors header is not valid JSON: {0}")]
    HeaderJson(String),

    /// Safetensors header body failed to decode as UTF-8.
    #[error("safetensors header is not valid UTF-8: {0}")]
    HeaderEncoding(String),

    /// Declared header length exceeds `MAX_HEADER_SIZE`.
    #[error("safetensors header too large: {0}")]
    HeaderTooLarge(String),

    /// Fewer bytes were available than the declared header length (or
    /// fewer than 8 bytes for the length prefix itself).
    #[error("safetensors header truncated: {0}")]
    HeaderTruncated(String),

    /// Gap or overlap between tensor records, or payload size mismatch
    /// against shape × dtype.
    #[error("safetensors header inconsistent: {0}")]
    HeaderInconsistent(String),

    /// A dtype tag outside the registry.
    #[error("unknown dtype: {0}")]
    UnknownDtype(String),

    /// A collective did not complete before the configured deadline.
    #[error("broadcast timed out: {0}")]
    BroadcastTimeout(String),

    /// A broadcast round completed with zero chunks sent while the
    /// outstanding count was still positive.
    #[error("broadcast round yielded no chunks with {0} outstanding")]
    MissingChunks(String),

    /// Staging buffer allocation failed.
    #[error("out of memory: {0}")]
    OutOfMemory(String),
}

impl From<std::io::Error> for StreamerError {
    fn from(e: std::io::Error) -> Self {
        StreamerError::BackendError(e.to_string())
    }
}

impl From<serde_json::Error> for StreamerError {
    fn from(e: serde_json::Error) -> Self {
        StreamerError::HeaderJson(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StreamerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_include_category_and_detail() {
        let e = StreamerError::BudgetTooSmall("largest chunk is 4096 bytes".into());
        assert_eq!(
            e.to_string(),
            "memory budget too small: largest chunk is 4096 bytes"
        );
    }

    #[test]
    fn io_error_maps_to_backend_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such object");
        let e: StreamerError = io.into();
        assert!(matches!(e, StreamerError::BackendError(_)));
    }

    #[test]
    fn json_error_maps_to_header_json() {
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let e: StreamerError = parsed.unwrap_err().into();
        assert!(matches!(e, StreamerError::HeaderJson(_)));
    }
}
