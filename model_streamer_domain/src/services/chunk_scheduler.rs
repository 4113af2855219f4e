// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # ChunkScheduler
//!
//! Turns a list of `FileChunks` and a memory budget into a lazy
//! sequence of memory-capped `Batch`es, preserving each file's original
//! chunk order and remembering how to map batch-local positions back
//! to the caller's `(file_id, chunk_idx)` coordinates.
//!
//! Strictly single-threaded and synchronous: no I/O, no interior
//! mutability beyond the scheduler's own cursor bookkeeping.

use std::collections::VecDeque;

use crate::error::StreamerError;
use crate::value_objects::{Alignment, Batch, BatchEntry, FileChunks};

/// Caller-specified memory budget, before resolution to an effective
/// byte cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBudget {
    /// No cap: one batch containing every file.
    Unlimited,
    /// Cap to the largest single padded chunk across all files.
    LargestChunk,
    /// A hard cap in bytes.
    Bytes(u64),
}

impl MemoryBudget {
    /// Mirrors the source convention: -1 = unlimited, 0 = largest
    /// chunk, positive = hard byte cap.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            i if i < 0 => MemoryBudget::Unlimited,
            0 => MemoryBudget::LargestChunk,
            i => MemoryBudget::Bytes(i as u64),
        }
    }
}

struct FileCursor {
    file_idx: usize,
    next_chunk: usize,
}

/// Produces memory-capped batches over a fixed list of files.
pub struct ChunkScheduler {
    files: Vec<FileChunks>,
    alignment: Alignment,
    budget: u64,
    queue: VecDeque<FileCursor>,
}

impl ChunkScheduler {
    /// Builds a scheduler over `files` bounded by `budget` bytes
    /// (resolved from the caller's raw `-1`/`0`/positive convention via
    /// [`MemoryBudget::from_raw`]), padding every chunk to `alignment`.
    ///
    /// Fails with `BudgetTooSmall` if a positive budget is smaller than
    /// the largest single padded chunk across `files`.
    pub fn new(
        files: Vec<FileChunks>,
        budget: MemoryBudget,
        alignment: Alignment,
    ) -> Result<Self, StreamerError> {
        let largest_padded = files
            .iter()
            .flat_map(|f| (0..f.chunks().len()).map(|i| padded_size(f, i, alignment)))
            .max()
            .unwrap_or(0);

        let effective_budget = match budget {
            MemoryBudget::Unlimited => u64::MAX,
            MemoryBudget::LargestChunk => largest_padded,
            MemoryBudget::Bytes(b) => {
                if b < largest_padded {
                    return Err(StreamerError::BudgetTooSmall(format!(
                        "budget {b} bytes is below the largest single chunk ({largest_padded} bytes)"
                    )));
                }
                b
            }
        };

        let queue = files
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.chunks().is_empty())
            .map(|(file_idx, _)| FileCursor {
                file_idx,
                next_chunk: 0,
            })
            .collect();

        Ok(Self {
            files,
            alignment,
            budget: effective_budget,
            queue,
        })
    }

    /// Resolved effective budget in bytes.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Produces the next batch, or `None` once every file is drained.
    ///
    /// Greedily appends chunks from the file at the head of the FIFO;
    /// when that file drains it is popped and the next file's chunks
    /// continue filling the same batch. Stops as soon as the next
    /// chunk would exceed the budget — a chunk is never split.
    pub fn next_batch(&mut self) -> Option<Batch> {
        if self.queue.is_empty() {
            return None;
        }

        let mut batch = Batch::new();
        let mut used = 0u64;

        while let Some(cursor) = self.queue.front_mut() {
            let file = &self.files[cursor.file_idx];
            let chunk_idx = cursor.next_chunk;
            let padded = padded_size(file, chunk_idx, self.alignment);

            if used + padded > self.budget {
                break;
            }

            batch.push(BatchEntry {
                file_id: file.id(),
                chunk_idx,
                file_offset: file.chunk_offset(chunk_idx),
                size: file.chunks()[chunk_idx],
                padded_size: padded,
            });
            used += padded;
            cursor.next_chunk += 1;

            if cursor.next_chunk >= file.chunks().len() {
                self.queue.pop_front();
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }

    /// Looks up the global `(file_id, chunk_idx)` for batch slot `slot`.
    pub fn global_coords(&self, batch: &Batch, slot: usize) -> Option<(u64, usize)> {
        batch.global_coords(slot)
    }
}

fn padded_size(file: &FileChunks, idx: usize, alignment: Alignment) -> u64 {
    match file.buffer_strides() {
        Some(_) => file.padded_size(idx),
        None => alignment.round_up(file.chunks()[idx]),
    }
}
