// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Rayon Thread Pool Configuration
//!
//! A single global Rayon pool used by the partitioner's bin-packing
//! sort (`Partitioner::partition_with_policy`'s `par_sort_unstable_by`
//! over work units). Sized at `cores - 1`, leaving one core free for
//! the byte-range worker pool's async runtime.

use model_streamer_domain::StreamerError;
use std::sync::Arc;

pub struct RayonPoolManager {
    pool: Arc<rayon::ThreadPool>,
}

impl RayonPoolManager {
    pub fn new() -> Result<Self, StreamerError> {
        let available_cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        let worker_count = (available_cores.saturating_sub(1)).max(1);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("model-streamer-rayon-{i}"))
            .build()
            .map_err(|e| StreamerError::InvalidInput(format!("failed to create rayon pool: {e}")))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &Arc<rayon::ThreadPool> {
        &self.pool
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}

/// Global pool instance, initialized lazily on first use.
#[allow(clippy::expect_used)]
pub static RAYON_POOL: std::sync::LazyLock<RayonPoolManager> =
    std::sync::LazyLock::new(|| RayonPoolManager::new().expect("failed to initialize rayon pool"));
