// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # ByteRangeFetcher Port
//!
//! Resolves a path + offset + length to bytes in a caller-provided
//! buffer. One implementation per backend (local filesystem, S3, GCS,
//! Azure); the core treats it as opaque. Deliberately out of scope for
//! this crate per the purpose statement: only the contract is
//! specified here, not an object-store client.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StreamerError;

/// Reads exactly `length` bytes starting at `offset` from the object
/// addressed by `path` into a caller-owned buffer.
#[async_trait]
pub trait ByteRangeFetcher: Send + Sync {
    /// Fetches `length` bytes at `offset` from `path`, returning them
    /// as an owned buffer. Implementations report not-found,
    /// permission, transport, and truncation failures as
    /// `BackendError`; transient transport retries, if any, are the
    /// implementation's own responsibility.
    async fn fetch_range(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>, StreamerError>;
}

#[async_trait]
impl ByteRangeFetcher for Arc<dyn ByteRangeFetcher> {
    async fn fetch_range(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>, StreamerError> {
        (**self).fetch_range(path, offset, length).await
    }
}
