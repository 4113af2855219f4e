// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # FileChunks Value Object
//!
//! A caller-supplied description of one file's worth of work: where the
//! bytes live, and the ordered list of chunk sizes to read from it. This
//! is the unit the `ChunkScheduler` and `Partitioner` consume — not to be
//! confused with a single materialized chunk of bytes (see
//! `infrastructure::staging_buffer` for that).
//!
//! ## Invariants
//!
//! - `buffer_strides`, when present, has the same length as `chunks` and
//!   each stride is `>=` its corresponding chunk size.
//! - Chunk sizes may be zero; a zero-size chunk is still emitted but
//!   contributes no bytes.

use crate::error::StreamerError;
use serde::{Deserialize, Serialize};

/// One file's ordered chunk layout, as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChunks {
    id: u64,
    path: String,
    offset: u64,
    chunks: Vec<u64>,
    buffer_strides: Option<Vec<u64>>,
}

impl FileChunks {
    /// Creates a new `FileChunks`, validating `chunks` is non-empty.
    ///
    /// An empty chunk list is rejected with `InvalidInput`: a file with
    /// nothing to read has no business appearing in the request.
    pub fn new(
        id: u64,
        path: impl Into<String>,
        offset: u64,
        chunks: Vec<u64>,
    ) -> Result<Self, StreamerError> {
        if chunks.is_empty() {
            return Err(StreamerError::InvalidInput(format!(
                "file {id} has no chunks"
            )));
        }
        Ok(Self {
            id,
            path: path.into(),
            offset,
            chunks,
            buffer_strides: None,
        })
    }

    /// Attaches explicit per-chunk buffer strides (padded sizes), e.g.
    /// for device-alignment padding computed ahead of time.
    pub fn with_buffer_strides(mut self, strides: Vec<u64>) -> Result<Self, StreamerError> {
        if strides.len() != self.chunks.len() {
            return Err(StreamerError::InvalidInput(format!(
                "file {}: {} buffer strides for {} chunks",
                self.id,
                strides.len(),
                self.chunks.len()
            )));
        }
        for (stride, chunk) in strides.iter().zip(self.chunks.iter()) {
            if stride < chunk {
                return Err(StreamerError::InvalidInput(format!(
                    "file {}: buffer stride {stride} smaller than chunk size {chunk}",
                    self.id
                )));
            }
        }
        self.buffer_strides = Some(strides);
        Ok(self)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn chunks(&self) -> &[u64] {
        &self.chunks
    }

    pub fn buffer_strides(&self) -> Option<&[u64]> {
        self.buffer_strides.as_deref()
    }

    /// The padded size of chunk `idx`: its buffer stride when present,
    /// else the raw chunk size.
    pub fn padded_size(&self, idx: usize) -> u64 {
        self.buffer_strides
            .as_ref()
            .map(|s| s[idx])
            .unwrap_or(self.chunks[idx])
    }

    /// Sum of raw (unpadded) chunk sizes.
    pub fn total_bytes(&self) -> u64 {
        self.chunks.iter().sum()
    }

    /// The byte offset within the object at which chunk `idx` starts,
    /// assuming chunks are read back-to-back from `offset`.
    pub fn chunk_offset(&self, idx: usize) -> u64 {
        self.offset + self.chunks[..idx].iter().sum::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_chunk_list() {
        let err = FileChunks::new(0, "weights.bin", 0, vec![]).unwrap_err();
        assert!(matches!(err, StreamerError::InvalidInput(_)));
    }

    #[test]
    fn computes_chunk_offsets_from_base_offset() {
        let fc = FileChunks::new(1, "weights.bin", 1000, vec![100, 200, 300]).unwrap();
        assert_eq!(fc.chunk_offset(0), 1000);
        assert_eq!(fc.chunk_offset(1), 1100);
        assert_eq!(fc.chunk_offset(2), 1300);
        assert_eq!(fc.total_bytes(), 600);
    }

    #[test]
    fn buffer_strides_must_match_chunk_count_and_dominate() {
        let fc = FileChunks::new(1, "weights.bin", 0, vec![100, 200]).unwrap();
        assert!(fc.clone().with_buffer_strides(vec![256]).is_err());
        assert!(fc.clone().with_buffer_strides(vec![64, 256]).is_err());
        let padded = fc.with_buffer_strides(vec![256, 256]).unwrap();
        assert_eq!(padded.padded_size(0), 256);
        assert_eq!(padded.padded_size(1), 256);
    }

    #[test]
    fn zero_size_chunks_are_allowed() {
        let fc = FileChunks::new(2, "weights.bin", 0, vec![0, 10, 0]).unwrap();
        assert_eq!(fc.total_bytes(), 10);
        assert_eq!(fc.padded_size(0), 0);
    }
}
