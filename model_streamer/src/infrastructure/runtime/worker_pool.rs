// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Worker Pool
//!
//! The byte-range fetch pool sitting underneath `ChunkScheduler` (§5,
//! "The ByteRangeFetcher is a pool of worker threads that perform
//! blocking range-GETs; completion is reported back ... in arrival
//! order"). A bounded number of fetches run concurrently; results are
//! handed back as each one lands, not in submission order, mirroring
//! the native streamer's `relative_index` completion reporting.

use futures::stream::{self, StreamExt};
use std::sync::Arc;

use model_streamer_domain::ports::ByteRangeFetcher;
use model_streamer_domain::StreamerError;

/// One byte-range read to perform, tagged with the caller's slot so the
/// result can be routed back regardless of completion order.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub slot: usize,
    pub path: String,
    pub offset: u64,
    pub length: u64,
}

/// Bounded-concurrency byte-range fetch pool.
///
/// Single-threaded callers drive this: `fetch_all` awaits until every
/// job in the batch has completed, returning results as they arrive so
/// the caller can write each one into the staging buffer without
/// waiting on the slowest.
pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Sized from the available parallelism, same convention as
    /// `RayonPoolManager` (`infrastructure::config::rayon_config`): the
    /// fetch pool is I/O-bound so a higher multiple of cores is used
    /// than the CPU-bound Rayon pool.
    pub fn with_default_concurrency() -> Self {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self::new(cores * 4)
    }

    /// Runs every job in `jobs` against `fetcher`, bounded to this
    /// pool's concurrency, returning `(slot, bytes)` pairs in arrival
    /// order. The whole call fails on the first job that errors.
    pub async fn fetch_all(
        &self,
        fetcher: &Arc<dyn ByteRangeFetcher>,
        jobs: Vec<FetchJob>,
    ) -> Result<Vec<(usize, Vec<u8>)>, StreamerError> {
        let concurrency = self.concurrency;
        let fetcher = fetcher.clone();

        stream::iter(jobs.into_iter().map(move |job| {
            let fetcher = fetcher.clone();
            async move {
                let bytes = fetcher.fetch_range(&job.path, job.offset, job.length).await?;
                Ok::<_, StreamerError>((job.slot, bytes))
            }
        }))
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::with_default_concurrency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ByteRangeFetcher for CountingFetcher {
        async fn fetch_range(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>, StreamerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path == "fail.bin" {
                return Err(StreamerError::BackendError("not found".into()));
            }
            Ok(vec![offset as u8; length as usize])
        }
    }

    #[tokio::test]
    async fn fetches_every_job_and_preserves_slot_tags() {
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let pool = WorkerPool::new(2);
        let jobs = vec![
            FetchJob { slot: 0, path: "a.bin".into(), offset: 0, length: 4 },
            FetchJob { slot: 1, path: "a.bin".into(), offset: 10, length: 4 },
            FetchJob { slot: 2, path: "a.bin".into(), offset: 20, length: 4 },
        ];
        let mut results = pool.fetch_all(&fetcher, jobs).await.unwrap();
        results.sort_by_key(|(slot, _)| *slot);
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].0, 1);
        assert_eq!(results[1].1, vec![10u8; 4]);
    }

    #[tokio::test]
    async fn one_failing_job_fails_the_whole_batch() {
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let pool = WorkerPool::new(4);
        let jobs = vec![
            FetchJob { slot: 0, path: "a.bin".into(), offset: 0, length: 4 },
            FetchJob { slot: 1, path: "fail.bin".into(), offset: 0, length: 4 },
        ];
        let err = pool.fetch_all(&fetcher, jobs).await.unwrap_err();
        assert!(matches!(err, StreamerError::BackendError(_)));
    }

    #[test]
    fn default_concurrency_is_a_multiple_of_available_cores() {
        let pool = WorkerPool::with_default_concurrency();
        assert!(pool.concurrency >= 4);
    }
}
