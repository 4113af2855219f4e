// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Partition Value Objects
//!
//! `WorkUnit` is the atomic unit the chunk-level partitioner bin-packs;
//! `Partition` is the per-rank assignment the `Partitioner` produces,
//! carrying enough of a source map back to the caller's original
//! `(file_id, chunk_idx)` space to satisfy the ordering guarantees of
//! the distributed engine.

use crate::value_objects::FileChunks;
use serde::{Deserialize, Serialize};

/// One atomic (path, offset, size) slice of an original chunk, tagged
/// with where it came from in the caller's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub path: String,
    pub file_offset: u64,
    pub size: u64,
    pub orig_file_id: u64,
    pub orig_chunk_idx: usize,
}

/// Maps a synthetic, partition-local chunk back to the caller's
/// original coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapEntry {
    pub orig_file_id: u64,
    pub orig_chunk_idx: usize,
    pub size: u64,
}

/// One rank's share of the work, plus the map back to original
/// coordinates for every synthetic chunk it was assigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Partition {
    files: Vec<FileChunks>,
    source_map: Vec<Vec<SourceMapEntry>>,
}

impl Partition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a synthetic file to this partition along with the
    /// per-chunk source map entries (one per chunk in `file`).
    pub fn push(&mut self, file: FileChunks, source_map: Vec<SourceMapEntry>) {
        debug_assert_eq!(file.chunks().len(), source_map.len());
        self.files.push(file);
        self.source_map.push(source_map);
    }

    pub fn files(&self) -> &[FileChunks] {
        &self.files
    }

    /// The original `(file_id, chunk_idx)` this partition's
    /// `(file_slot, chunk_idx)` came from.
    pub fn source_of(&self, file_slot: usize, chunk_idx: usize) -> Option<SourceMapEntry> {
        self.source_map.get(file_slot)?.get(chunk_idx).copied()
    }

    /// Total byte volume assigned to this partition.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.total_bytes()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_total_bytes_and_source_map() {
        let mut p = Partition::new();
        let fc = FileChunks::new(99, "synthetic", 0, vec![100, 200]).unwrap();
        p.push(
            fc,
            vec![
                SourceMapEntry {
                    orig_file_id: 1,
                    orig_chunk_idx: 0,
                    size: 100,
                },
                SourceMapEntry {
                    orig_file_id: 1,
                    orig_chunk_idx: 1,
                    size: 200,
                },
            ],
        );
        assert_eq!(p.total_bytes(), 300);
        assert_eq!(p.source_of(0, 1).unwrap().orig_chunk_idx, 1);
        assert!(p.source_of(0, 2).is_none());
    }
}
