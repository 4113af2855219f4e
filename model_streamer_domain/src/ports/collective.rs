// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CollectiveBackend Port
//!
//! Group formation, broadcast, all-gather, and barrier — the handful
//! of collective-communication primitives the distributed engine's
//! broadcast state machine drives. The collective communication
//! library itself is deliberately out of scope for this crate; only
//! its contract is specified here.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StreamerError;

/// A formed collective-communication subgroup: some ranks out of the
/// full world, with a fixed member order every peer agrees on.
#[async_trait]
pub trait CollectiveBackend: Send + Sync {
    /// This peer's 0-based rank within the world.
    fn rank(&self) -> usize;

    /// Total number of ranks in the world.
    fn world_size(&self) -> usize;

    /// Gathers one opaque value (e.g. a hostname) from every rank in
    /// the world, used transiently during local-node group discovery.
    /// The source-rank scratch group this runs on is destroyed
    /// immediately after, so the library does not retain device
    /// memory for it.
    async fn all_gather_strings(&self, value: &str) -> Result<Vec<String>, StreamerError>;

    /// Forms a new subgroup containing exactly `ranks` (given in a
    /// fixed, globally agreed order). Every peer must call this with
    /// identical arguments in identical order, even peers not included
    /// in `ranks` — collective group creation is itself collective.
    async fn new_group(&self, ranks: &[usize]) -> Result<Box<dyn CollectiveGroup>, StreamerError>;
}

/// One formed subgroup, used for the broadcast rounds of a single
/// `stream_files` session.
#[async_trait]
pub trait CollectiveGroup: Send + Sync {
    /// This peer's rank within the subgroup (not the world).
    fn local_rank(&self) -> usize;

    /// Number of ranks in this subgroup.
    fn size(&self) -> usize;

    /// Broadcasts `buffer` from `root` (a subgroup-local rank) to
    /// every member, blocking until the configured timeout elapses or
    /// the transfer completes. The sender passes its outgoing data in
    /// `buffer`; every other member's `buffer` is overwritten with the
    /// received bytes. Exceeding the timeout surfaces
    /// `BroadcastTimeout` on every participating peer.
    async fn broadcast(&self, root: usize, buffer: &mut [u8]) -> Result<(), StreamerError>;

    /// Blocks until every member of the group has called `barrier`,
    /// used at clean session teardown. Skipped on the failure exit
    /// path, since a blocked rank cannot safely barrier.
    async fn barrier(&self) -> Result<(), StreamerError>;
}

#[async_trait]
impl CollectiveBackend for Arc<dyn CollectiveBackend> {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn world_size(&self) -> usize {
        (**self).world_size()
    }

    async fn all_gather_strings(&self, value: &str) -> Result<Vec<String>, StreamerError> {
        (**self).all_gather_strings(value).await
    }

    async fn new_group(&self, ranks: &[usize]) -> Result<Box<dyn CollectiveGroup>, StreamerError> {
        (**self).new_group(ranks).await
    }
}
