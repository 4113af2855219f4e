// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Local Filesystem Backend
//!
//! `ByteRangeFetcher` over a plain local path: opens the file, memory-
//! maps it, and copies the requested range out. Mapping (rather than
//! seek + read) avoids double-buffering the page cache for repeated
//! reads of the same file across batches.

use async_trait::async_trait;
use memmap2::Mmap;
use std::fs::File;

use model_streamer_domain::ports::ByteRangeFetcher;
use model_streamer_domain::StreamerError;

pub struct LocalFsFetcher;

impl LocalFsFetcher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalFsFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteRangeFetcher for LocalFsFetcher {
    async fn fetch_range(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>, StreamerError> {
        let path = path.to_string();
        tokio::task::spawn_blocking(move || fetch_range_blocking(&path, offset, length))
            .await
            .map_err(|e| StreamerError::BackendError(format!("local read task panicked: {e}")))?
    }
}

fn fetch_range_blocking(path: &str, offset: u64, length: u64) -> Result<Vec<u8>, StreamerError> {
    let file = File::open(path).map_err(|e| StreamerError::BackendError(format!("{path}: {e}")))?;

    // SAFETY: the mapped file is not mutated by this process; another
    // process truncating it concurrently is an external precondition
    // violation the caller owns, same as with a plain `read`.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| StreamerError::BackendError(format!("{path}: mmap failed: {e}")))?;

    let start = offset as usize;
    let end = start
        .checked_add(length as usize)
        .ok_or_else(|| StreamerError::BackendError(format!("{path}: range overflow at offset {offset}")))?;

    if end > mmap.len() {
        return Err(StreamerError::BackendError(format!(
            "{path}: requested range {start}..{end} exceeds file length {}",
            mmap.len()
        )));
    }

    Ok(mmap[start..end].to_vec())
}
