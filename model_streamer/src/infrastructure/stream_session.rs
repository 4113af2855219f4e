// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stream Session
//!
//! The single-peer `stream_files` path of §4.5: drives the
//! `ChunkScheduler` one batch at a time, issues one byte-range fetch
//! per batch through the worker pool into the staging buffer, and
//! yields each chunk as a view into that buffer. Grounded on
//! `file_streamer.py`'s `stream_file`/`get_chunks` pair — one native
//! "request" per batch, chunks reported back as they arrive.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use byte_unit::{Byte, UnitType};
use tracing::info;

use model_streamer_domain::services::chunk_scheduler::MemoryBudget;
use model_streamer_domain::services::ChunkScheduler;
use model_streamer_domain::value_objects::{Alignment, FileChunks};
use model_streamer_domain::ports::ByteRangeFetcher;
use model_streamer_domain::StreamerError;

use crate::infrastructure::metrics::StreamerMetrics;
use crate::infrastructure::runtime::worker_pool::{FetchJob, WorkerPool};
use crate::infrastructure::staging_buffer::StagingBuffer;

/// One chunk handed back to the caller: the tensor's original
/// coordinates and a copy of its bytes out of the staging buffer.
///
/// The staging buffer itself is reused on the next batch, so this
/// struct owns its bytes rather than borrowing — the caller is free to
/// hold onto a `YieldedChunk` past the next `next_batch_chunks` call,
/// unlike the staging buffer's own `view`.
#[derive(Debug, Clone)]
pub struct YieldedChunk {
    pub file_id: u64,
    pub chunk_idx: usize,
    pub bytes: Vec<u8>,
}

/// Drives one `stream_files` call along the single-peer path: batches
/// from `ChunkScheduler`, byte-range fetches via a `WorkerPool`, staged
/// into a reusable `StagingBuffer`.
pub struct StreamSession {
    scheduler: ChunkScheduler,
    staging: Option<StagingBuffer>,
    alignment: Alignment,
    paths_by_file_id: HashMap<u64, String>,
    fetcher: Arc<dyn ByteRangeFetcher>,
    worker_pool: WorkerPool,
    metrics: Option<Arc<StreamerMetrics>>,
    total_bytes_streamed: u64,
    started_at: Instant,
}

impl StreamSession {
    /// Builds a session over `files`, resolving `budget` the same way
    /// `ChunkScheduler::new` does (`MemoryBudget::from_raw` for the
    /// caller's `-1`/`0`/positive `MEMORY_LIMIT` convention).
    pub fn new(
        files: Vec<FileChunks>,
        budget: MemoryBudget,
        alignment: Alignment,
        fetcher: Arc<dyn ByteRangeFetcher>,
    ) -> Result<Self, StreamerError> {
        let paths_by_file_id = files.iter().map(|f| (f.id(), f.path().to_string())).collect();
        let scheduler = ChunkScheduler::new(files, budget, alignment)?;

        Ok(Self {
            scheduler,
            staging: None,
            alignment,
            paths_by_file_id,
            fetcher,
            worker_pool: WorkerPool::with_default_concurrency(),
            metrics: None,
            total_bytes_streamed: 0,
            started_at: Instant::now(),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<StreamerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Pulls the next scheduler batch, fetches every entry concurrently
    /// through the worker pool, stages it, and returns every chunk in
    /// the batch's metadata order. Returns `None` once the scheduler is
    /// drained.
    ///
    /// The staging buffer is allocated lazily on the first batch: a
    /// `MemoryBudget::Unlimited` session resolves to a budget of
    /// `u64::MAX` inside `ChunkScheduler`, which is only ever realised
    /// as one all-encompassing batch, so the buffer is sized to that
    /// first batch's actual footprint instead of the unresolved cap.
    pub async fn next_batch_chunks(&mut self) -> Result<Option<Vec<YieldedChunk>>, StreamerError> {
        let Some(batch) = self.scheduler.next_batch() else {
            return Ok(None);
        };

        if self.staging.is_none() {
            let capacity = match self.scheduler.budget() {
                u64::MAX => batch.total_padded_bytes(),
                bounded => bounded,
            };
            self.staging = Some(StagingBuffer::new(capacity, self.alignment)?);
        }
        let staging = self.staging.as_mut().expect("staging buffer allocated above");
        staging.activate_batch(&batch)?;

        let mut jobs = Vec::with_capacity(batch.len());
        for (slot, entry) in batch.entries().iter().enumerate() {
            let path = self.paths_by_file_id.get(&entry.file_id).ok_or_else(|| {
                StreamerError::InvalidInput(format!("no path registered for file id {}", entry.file_id))
            })?;
            jobs.push(FetchJob {
                slot,
                path: path.clone(),
                offset: entry.file_offset,
                length: entry.size,
            });
        }

        let timer = self.metrics.as_ref().map(|m| m.batch_fetch_duration.start_timer());
        let mut fetched = self.worker_pool.fetch_all(&self.fetcher, jobs).await?;
        drop(timer);
        fetched.sort_by_key(|(slot, _)| *slot);

        let mut yielded = Vec::with_capacity(batch.len());
        for (slot, entry) in batch.entries().iter().enumerate() {
            let (_, bytes) = &fetched[slot];
            staging.write_chunk(slot, bytes)?;
            yielded.push(YieldedChunk {
                file_id: entry.file_id,
                chunk_idx: entry.chunk_idx,
                bytes: staging.view(slot, entry.size)?.to_vec(),
            });
            self.total_bytes_streamed += entry.size;
        }

        if let Some(metrics) = &self.metrics {
            metrics.bytes_streamed_total.inc_by(batch.entries().iter().map(|e| e.size).sum());
            metrics.chunks_yielded_total.inc_by(yielded.len() as u64);
            metrics.staging_bytes_in_use.set(batch.total_padded_bytes() as f64);
        }

        Ok(Some(yielded))
    }

    /// Total unpadded bytes streamed so far, for throughput reporting.
    pub fn total_bytes_streamed(&self) -> u64 {
        self.total_bytes_streamed
    }
}

impl Drop for StreamSession {
    /// Logs overall throughput on session teardown, mirroring
    /// `file_streamer.py`'s `__exit__` summary line.
    fn drop(&mut self) {
        let elapsed = self.started_at.elapsed();
        let size = Byte::from_u64(self.total_bytes_streamed)
            .get_appropriate_unit(UnitType::Binary)
            .to_string();
        let throughput = if elapsed.as_secs_f64() > 0.0 {
            Byte::from_u64((self.total_bytes_streamed as f64 / elapsed.as_secs_f64()) as u64)
                .get_appropriate_unit(UnitType::Binary)
                .to_string()
        } else {
            "n/a".to_string()
        };
        info!(
            "stream session complete: {size} in {:.2}s, {throughput}/s",
            elapsed.as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use model_streamer_domain::value_objects::Alignment;

    struct FakeFetcher;

    #[async_trait]
    impl ByteRangeFetcher for FakeFetcher {
        async fn fetch_range(&self, _path: &str, offset: u64, length: u64) -> Result<Vec<u8>, StreamerError> {
            Ok(vec![offset as u8; length as usize])
        }
    }

    fn file(id: u64, chunks: Vec<u64>) -> FileChunks {
        FileChunks::new(id, format!("file-{id}.bin"), 0, chunks).unwrap()
    }

    #[tokio::test]
    async fn yields_every_chunk_across_batches_in_order() {
        let files = vec![file(1, vec![10, 20]), file(2, vec![30])];
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(FakeFetcher);
        let mut session =
            StreamSession::new(files, MemoryBudget::Bytes(25), Alignment::host_default(), fetcher).unwrap();

        let mut all = Vec::new();
        while let Some(chunks) = session.next_batch_chunks().await.unwrap() {
            all.extend(chunks);
        }

        assert_eq!(all.len(), 3);
        assert_eq!((all[0].file_id, all[0].chunk_idx), (1, 0));
        assert_eq!((all[2].file_id, all[2].chunk_idx), (2, 0));
        assert_eq!(session.total_bytes_streamed(), 60);
    }

    #[tokio::test]
    async fn unlimited_budget_sizes_staging_buffer_from_first_batch() {
        let files = vec![file(1, vec![100, 200, 300])];
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(FakeFetcher);
        let mut session =
            StreamSession::new(files, MemoryBudget::Unlimited, Alignment::host_default(), fetcher).unwrap();

        let chunks = session.next_batch_chunks().await.unwrap().unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(session.next_batch_chunks().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_file_list_yields_nothing() {
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(FakeFetcher);
        let mut session =
            StreamSession::new(vec![], MemoryBudget::Unlimited, Alignment::host_default(), fetcher).unwrap();
        assert!(session.next_batch_chunks().await.unwrap().is_none());
    }
}
