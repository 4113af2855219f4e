// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Staging Buffer
//!
//! A single reusable byte region (§4.2): allocated once at
//! `B + (alignment - 1)` bytes so an aligned window of exactly `B`
//! bytes can be carved out of it, then reused across every batch for
//! the life of one `stream_files` session. Activating a batch assigns
//! each chunk a running, alignment-padded offset inside that window;
//! the caller-facing view for a chunk is the unpadded slice at that
//! offset.

use model_streamer_domain::value_objects::{Alignment, Batch};
use model_streamer_domain::StreamerError;

pub struct StagingBuffer {
    raw: Vec<u8>,
    aligned_start: usize,
    capacity: u64,
    /// Absolute offset (within the aligned window) of each entry in
    /// the currently active batch, in batch order.
    offsets: Vec<u64>,
}

impl StagingBuffer {
    /// Allocates `capacity + (alignment - 1)` bytes and computes the
    /// aligned window inside it. Fails with `OutOfMemory` if the
    /// allocation itself fails (an unwinding allocator abort is outside
    /// Rust's control; this covers the `try_reserve`-style path).
    pub fn new(capacity: u64, alignment: Alignment) -> Result<Self, StreamerError> {
        let pad = alignment.bytes().saturating_sub(1);
        let raw_len = (capacity as usize)
            .checked_add(pad)
            .ok_or_else(|| StreamerError::OutOfMemory(format!("staging buffer size overflow: {capacity} + {pad}")))?;

        let mut raw = Vec::new();
        raw.try_reserve_exact(raw_len)
            .map_err(|e| StreamerError::OutOfMemory(format!("failed to allocate {raw_len} bytes: {e}")))?;
        raw.resize(raw_len, 0);

        let base_ptr = raw.as_ptr() as usize;
        let aligned_start = alignment.round_up(base_ptr as u64) as usize - base_ptr;

        Ok(Self {
            raw,
            aligned_start,
            capacity,
            offsets: Vec::new(),
        })
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn aligned_window(&self) -> &[u8] {
        &self.raw[self.aligned_start..self.aligned_start + self.capacity as usize]
    }

    fn aligned_window_mut(&mut self) -> &mut [u8] {
        let end = self.aligned_start + self.capacity as usize;
        &mut self.raw[self.aligned_start..end]
    }

    /// Base address of the aligned window, for asserting the alignment
    /// invariant in tests.
    pub fn base_address(&self) -> usize {
        self.aligned_window().as_ptr() as usize
    }

    /// Assigns each entry of `batch` a running, padding-aware offset
    /// inside the aligned window. Must be called before `write_chunk`/
    /// `view` for this batch.
    pub fn activate_batch(&mut self, batch: &Batch) -> Result<(), StreamerError> {
        let mut offsets = Vec::with_capacity(batch.len());
        let mut running = 0u64;
        for entry in batch.entries() {
            offsets.push(running);
            running += entry.padded_size;
        }
        if running > self.capacity {
            return Err(StreamerError::OutOfMemory(format!(
                "batch needs {running} bytes, staging buffer holds {}",
                self.capacity
            )));
        }
        self.offsets = offsets;
        Ok(())
    }

    /// Copies `data` into the buffer at the slot assigned to batch
    /// entry `slot`, truncating/erroring if it doesn't match the slot's
    /// actual (unpadded) size.
    pub fn write_chunk(&mut self, slot: usize, data: &[u8]) -> Result<(), StreamerError> {
        let offset = *self.offsets.get(slot).ok_or_else(|| {
            StreamerError::InvalidInput(format!("no staging slot {slot}; batch not activated or out of range"))
        })? as usize;
        let end = offset + data.len();
        if end > self.capacity as usize {
            return Err(StreamerError::OutOfMemory(format!(
                "chunk write at {offset}..{end} exceeds staging capacity {}",
                self.capacity
            )));
        }
        self.aligned_window_mut()[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Returns the unpadded view for batch entry `slot`, `actual_size`
    /// bytes starting at its assigned offset. Valid only until the next
    /// `activate_batch` call.
    pub fn view(&self, slot: usize, actual_size: u64) -> Result<&[u8], StreamerError> {
        let offset = *self.offsets.get(slot).ok_or_else(|| {
            StreamerError::InvalidInput(format!("no staging slot {slot}; batch not activated or out of range"))
        })? as usize;
        let end = offset + actual_size as usize;
        if end > self.capacity as usize {
            return Err(StreamerError::OutOfMemory(format!(
                "view at {offset}..{end} exceeds staging capacity {}",
                self.capacity
            )));
        }
        Ok(&self.aligned_window()[offset..end])
    }
}
