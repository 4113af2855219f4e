// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Environment Configuration
//!
//! Resolves the process-scoped knobs from §6.3: `MEMORY_LIMIT`,
//! `CUDA_ALIGNMENT`, `DIST`, `DIST_TIMEOUT`, `DIST_BUFFER_MIN_BYTESIZE`,
//! `DIST_GLOBAL`, plus the supplemented `PARTITION_POLICY` knob
//! (SPEC_FULL.md "Supplemented features"), and publishes
//! `PROCESS_GROUP_SIZE` once group formation completes.
//!
//! `MEMORY_LIMIT` is the one knob the engine mutates transiently during
//! a distributed `stream_files` call (§9, "Configuration overrides with
//! restore-on-exit"); [`MemoryLimitGuard`] models that as a scoped
//! override that restores the prior value on every exit path, including
//! panics mid-session.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use model_streamer_domain::services::PartitionPolicy;

const DEFAULT_MEMORY_LIMIT: i64 = 40 * 1024 * 1024 * 1024; // 40 GB
const DEFAULT_CUDA_ALIGNMENT: usize = 256;
const DEFAULT_DIST_TIMEOUT_SECS: u64 = 600;
const DEFAULT_DIST_BUFFER_MIN_BYTESIZE: u64 = 1024 * 1024 * 1024; // 1 GiB

/// `DIST` env knob: force single-peer, force distributed, or decide by
/// backend/device pair at `stream_files` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistMode {
    ForceSinglePeer,
    ForceDistributed,
    Auto,
}

impl DistMode {
    fn parse(raw: &str) -> Self {
        match raw {
            "0" => DistMode::ForceSinglePeer,
            "1" => DistMode::ForceDistributed,
            _ => DistMode::Auto,
        }
    }
}

/// `PARTITION_POLICY` env knob (SPEC_FULL.md "Supplemented features"):
/// forces `Partitioner::partition_with_policy` to a specific strategy
/// regardless of `|files|` vs `G`. Unset or unrecognized means "use the
/// spec's default `|files| >= G` rule".
fn parse_partition_policy(raw: &str) -> Option<PartitionPolicy> {
    match raw.to_ascii_lowercase().as_str() {
        "files" => Some(PartitionPolicy::Files),
        "chunks" => Some(PartitionPolicy::Chunks),
        _ => None,
    }
}

/// The process-scoped configuration resolved once at startup.
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    pub cuda_alignment: usize,
    pub dist: DistMode,
    pub dist_timeout_secs: u64,
    pub dist_buffer_min_bytesize: u64,
    pub dist_global: bool,
    pub partition_policy: Option<PartitionPolicy>,
}

impl StreamerConfig {
    /// Reads every knob from the environment, falling back to the
    /// spec's documented defaults for anything unset or unparseable.
    /// `MEMORY_LIMIT` is handled separately by [`memory_limit_raw`]
    /// since it is mutable for the lifetime of the process.
    pub fn from_env() -> Self {
        let memory_limit = env_i64("MEMORY_LIMIT").unwrap_or(DEFAULT_MEMORY_LIMIT);
        MEMORY_LIMIT.store(memory_limit, Ordering::SeqCst);

        Self {
            cuda_alignment: env_usize("CUDA_ALIGNMENT").unwrap_or(DEFAULT_CUDA_ALIGNMENT),
            dist: std::env::var("DIST").map(|v| DistMode::parse(&v)).unwrap_or(DistMode::Auto),
            dist_timeout_secs: env_u64("DIST_TIMEOUT").unwrap_or(DEFAULT_DIST_TIMEOUT_SECS),
            dist_buffer_min_bytesize: env_u64("DIST_BUFFER_MIN_BYTESIZE").unwrap_or(DEFAULT_DIST_BUFFER_MIN_BYTESIZE),
            dist_global: std::env::var("DIST_GLOBAL").map(|v| v == "1").unwrap_or(false),
            partition_policy: std::env::var("PARTITION_POLICY").ok().and_then(|v| parse_partition_policy(&v)),
        }
    }

    /// Effective staging-buffer alignment: `<= 1` disables alignment
    /// per §6.3, which this crate models as alignment 1 (no padding).
    pub fn effective_alignment(&self) -> usize {
        if self.cuda_alignment <= 1 {
            1
        } else {
            self.cuda_alignment
        }
    }
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Current effective `MEMORY_LIMIT`, in the raw `-1`/`0`/positive
/// encoding `MemoryBudget::from_raw` expects. Process-scoped: every
/// `ChunkScheduler` constructed for a single-peer `stream_files` call
/// reads this value.
static MEMORY_LIMIT: AtomicI64 = AtomicI64::new(DEFAULT_MEMORY_LIMIT);

pub fn memory_limit_raw() -> i64 {
    MEMORY_LIMIT.load(Ordering::SeqCst)
}

/// Published by `DistributedEngine` once group formation completes, so
/// downstream layers (e.g. a tensor-parallel runtime) can read the
/// node-local group size without re-deriving it.
static PROCESS_GROUP_SIZE: AtomicUsize = AtomicUsize::new(1);

pub fn publish_process_group_size(size: usize) {
    PROCESS_GROUP_SIZE.store(size, Ordering::SeqCst);
}

pub fn process_group_size() -> usize {
    PROCESS_GROUP_SIZE.load(Ordering::SeqCst)
}

/// Scoped override of `MEMORY_LIMIT` to "unlimited", used while the
/// distributed engine prefills its local partition into a host buffer
/// (§4.4, "Memory policy"). Restores the prior value on drop, on every
/// exit path including an early return or a panic unwind.
pub struct MemoryLimitGuard {
    prior: i64,
}

impl MemoryLimitGuard {
    pub fn override_unlimited() -> Self {
        let prior = MEMORY_LIMIT.swap(-1, Ordering::SeqCst);
        Self { prior }
    }
}

impl Drop for MemoryLimitGuard {
    fn drop(&mut self) {
        MEMORY_LIMIT.store(self.prior, Ordering::SeqCst);
    }
}
