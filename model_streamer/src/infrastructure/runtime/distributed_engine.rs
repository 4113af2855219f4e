// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DistributedEngine
//!
//! The partition-and-broadcast state machine of §4.4: partitions the
//! workload across a peer group, prefills a local send buffer from the
//! byte-range worker pool, and round-robins a broadcast over every
//! subgroup member so every peer yields every chunk in the caller's
//! original `(file_id, chunk_idx)` space.
//!
//! `MAX_CHUNKS_PER_BATCH` and the four-buffer layout (one send and one
//! receive tensor each for metadata and data) mirror
//! `distributed_streamer.py`'s `get_chunks` directly; that file is this
//! module's ground truth for wire layout and loop structure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use model_streamer_domain::error::StreamerError;
use model_streamer_domain::ports::collective::{CollectiveBackend, CollectiveGroup};
use model_streamer_domain::ports::ByteRangeFetcher;
use model_streamer_domain::services::Partitioner;
use model_streamer_domain::value_objects::{BroadcastPlan, FileChunks, Partition};

use crate::infrastructure::config::env::publish_process_group_size;
use crate::infrastructure::config::{MemoryLimitGuard, StreamerConfig};
use crate::infrastructure::runtime::worker_pool::{FetchJob, WorkerPool};

/// Row capacity of the metadata tensor: `distributed_streamer.py`'s
/// `MAX_CHUNKS_PER_BATCH`. Row 0 is the header `[chunk_count, 0, 0, 0]`;
/// rows `1..=chunk_count` are `[orig_file_id, orig_chunk_idx, size,
/// offset_in_data_buffer]`.
const MAX_CHUNKS_PER_BATCH: usize = 256;
const METADATA_ROW_WORDS: usize = 4;
const METADATA_ROWS: usize = MAX_CHUNKS_PER_BATCH + 1;
const METADATA_BUFFER_BYTES: usize = METADATA_ROWS * METADATA_ROW_WORDS * 8;

/// One chunk yielded by the engine, already translated to the caller's
/// original coordinates.
#[derive(Debug, Clone)]
pub struct YieldedChunk {
    pub file_id: u64,
    pub chunk_idx: usize,
    pub bytes: Vec<u8>,
}

/// Greedy FIFO-per-file cursor over one peer's local partition, used to
/// pull chunks for prefill. Unlike `ChunkScheduler`, it stops on either
/// a byte cap or a row-count cap, since the metadata tensor's row
/// capacity is fixed ahead of time and must be respected independently
/// of the data buffer's byte budget.
struct PrefillCursor {
    queue: VecDeque<(usize, usize)>, // (file_slot, next_chunk)
}

impl PrefillCursor {
    fn new(files: &[FileChunks]) -> Self {
        let queue = files
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.chunks().is_empty())
            .map(|(slot, _)| (slot, 0usize))
            .collect();
        Self { queue }
    }

    /// Pulls up to `MAX_CHUNKS_PER_BATCH` chunks whose combined size
    /// does not exceed `byte_cap`, advancing the cursor past whatever
    /// it returns. A chunk that would overflow either cap is left in
    /// place for the next call (the leftover-chunk behavior of §4.4
    /// step 1).
    fn pull(&mut self, files: &[FileChunks], byte_cap: u64) -> Vec<(usize, usize, u64)> {
        let mut taken = Vec::new();
        let mut used = 0u64;

        while taken.len() < MAX_CHUNKS_PER_BATCH {
            let Some(&(file_slot, chunk_idx)) = self.queue.front() else {
                break;
            };
            let file = &files[file_slot];
            let size = file.chunks()[chunk_idx];

            if used + size > byte_cap {
                break;
            }

            taken.push((file_slot, chunk_idx, size));
            used += size;

            let (_, next) = self.queue.front_mut().unwrap();
            *next += 1;
            if *next >= file.chunks().len() {
                self.queue.pop_front();
            }
        }

        taken
    }
}

fn encode_metadata(buf: &mut [u8], rows: &[(u64, u64, u64, u64)]) {
    buf.fill(0);
    write_u64(buf, 0, rows.len() as u64);
    for (i, &(a, b, c, d)) in rows.iter().enumerate() {
        let row_offset = (i + 1) * METADATA_ROW_WORDS * 8;
        write_u64(buf, row_offset, a);
        write_u64(buf, row_offset + 8, b);
        write_u64(buf, row_offset + 16, c);
        write_u64(buf, row_offset + 24, d);
    }
}

fn decode_metadata(buf: &[u8]) -> Vec<(u64, u64, u64, u64)> {
    let count = read_u64(buf, 0) as usize;
    (0..count)
        .map(|i| {
            let row_offset = (i + 1) * METADATA_ROW_WORDS * 8;
            (
                read_u64(buf, row_offset),
                read_u64(buf, row_offset + 8),
                read_u64(buf, row_offset + 16),
                read_u64(buf, row_offset + 24),
            )
        })
        .collect()
}

fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

async fn broadcast_with_timeout(
    group: &dyn CollectiveGroup,
    root: usize,
    buffer: &mut [u8],
    timeout: Duration,
) -> Result<(), StreamerError> {
    match tokio::time::timeout(timeout, group.broadcast(root, buffer)).await {
        Ok(result) => result,
        Err(_) => Err(StreamerError::BroadcastTimeout(format!(
            "broadcast from rank {root} exceeded {timeout:?}"
        ))),
    }
}

/// One `stream_files` distributed session, owning its subgroup, its
/// local partition, and the reusable broadcast buffers for the life of
/// the session.
pub struct DistributedSession {
    group: Box<dyn CollectiveGroup>,
    plan: BroadcastPlan,
    local_partition: Partition,
    cursor: PrefillCursor,
    outstanding: AtomicUsize,
    failed: bool,
    timeout: Duration,

    send_metadata: Vec<u8>,
    recv_metadata: Vec<u8>,
    send_data: Vec<u8>,
    recv_data: Vec<u8>,
    data_buffer_capacity: u64,

    fetcher: Arc<dyn ByteRangeFetcher>,
    worker_pool: WorkerPool,

    /// Raises `MEMORY_LIMIT` to unlimited for the life of this session
    /// (§4.4 "Memory policy"); restored on drop, including on the
    /// failure exit path.
    _memory_limit_guard: MemoryLimitGuard,
}

impl DistributedSession {
    /// This peer's broadcast plan, for diagnostics/logging.
    pub fn plan(&self) -> &BroadcastPlan {
        &self.plan
    }

    /// Runs one full circuit of the round-robin broadcast (§4.4 step
    /// 2, `for s in 0..G`), returning every chunk yielded across the
    /// circuit, or `None` once the session is done. Aggregating a
    /// whole circuit per call matches "on each outer iteration" in the
    /// spec's main-loop description: every rank's turn is taken exactly
    /// once per call.
    pub async fn next_circuit(&mut self) -> Result<Option<Vec<YieldedChunk>>, StreamerError> {
        if self.outstanding.load(Ordering::SeqCst) == 0 {
            return Ok(None);
        }

        let mut produced = Vec::new();
        let world_size = self.plan.world_size();
        let my_rank = self.plan.rank();

        for s in 0..world_size {
            let chunks = if s == my_rank {
                self.prefill_and_send(s).await
            } else {
                self.receive_from(s).await
            };

            match chunks {
                Ok(chunks) => produced.extend(chunks),
                Err(e) => {
                    self.failed = true;
                    return Err(e);
                }
            }
        }

        if produced.is_empty() {
            self.failed = true;
            return Err(StreamerError::MissingChunks(format!(
                "{} chunks outstanding",
                self.outstanding.load(Ordering::SeqCst)
            )));
        }

        Ok(Some(produced))
    }

    async fn prefill_and_send(&mut self, root: usize) -> Result<Vec<YieldedChunk>, StreamerError> {
        let entries = self.cursor.pull(self.local_partition.files(), self.data_buffer_capacity);

        let mut jobs = Vec::with_capacity(entries.len());
        for (slot, &(file_slot, chunk_idx, _)) in entries.iter().enumerate() {
            let file = &self.local_partition.files()[file_slot];
            jobs.push(FetchJob {
                slot,
                path: file.path().to_string(),
                offset: file.chunk_offset(chunk_idx),
                length: file.chunks()[chunk_idx],
            });
        }

        let mut fetched = self.worker_pool.fetch_all(&self.fetcher, jobs).await?;
        fetched.sort_by_key(|(slot, _)| *slot);

        let mut rows = Vec::with_capacity(entries.len());
        let mut yielded = Vec::with_capacity(entries.len());
        let mut running_offset = 0u64;

        for (slot, &(file_slot, chunk_idx, size)) in entries.iter().enumerate() {
            let (_, bytes) = &fetched[slot];
            let start = running_offset as usize;
            self.send_data[start..start + size as usize].copy_from_slice(bytes);

            let source = self
                .local_partition
                .source_of(file_slot, chunk_idx)
                .ok_or_else(|| StreamerError::InvalidInput("prefill entry missing source map".into()))?;

            rows.push((source.orig_file_id, source.orig_chunk_idx as u64, size, running_offset));
            yielded.push(YieldedChunk {
                file_id: source.orig_file_id,
                chunk_idx: source.orig_chunk_idx,
                bytes: bytes.clone(),
            });
            running_offset += size;
        }

        encode_metadata(&mut self.send_metadata, &rows);
        broadcast_with_timeout(self.group.as_ref(), root, &mut self.send_metadata, self.timeout).await?;

        if !rows.is_empty() {
            let total = running_offset as usize;
            broadcast_with_timeout(self.group.as_ref(), root, &mut self.send_data[..total], self.timeout).await?;
        }

        self.outstanding.fetch_sub(yielded.len(), Ordering::SeqCst);
        Ok(yielded)
    }

    async fn receive_from(&mut self, root: usize) -> Result<Vec<YieldedChunk>, StreamerError> {
        broadcast_with_timeout(self.group.as_ref(), root, &mut self.recv_metadata, self.timeout).await?;

        let rows = decode_metadata(&self.recv_metadata);
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let (_, _, last_size, last_offset) = *rows.last().unwrap();
        let total = (last_offset + last_size) as usize;
        broadcast_with_timeout(self.group.as_ref(), root, &mut self.recv_data[..total], self.timeout).await?;

        let yielded: Vec<YieldedChunk> = rows
            .iter()
            .map(|&(orig_file_id, orig_chunk_idx, size, offset)| YieldedChunk {
                file_id: orig_file_id,
                chunk_idx: orig_chunk_idx as usize,
                bytes: self.recv_data[offset as usize..(offset + size) as usize].to_vec(),
            })
            .collect();

        self.outstanding.fetch_sub(yielded.len(), Ordering::SeqCst);
        Ok(yielded)
    }

    /// Clean session teardown (§5, "cancellation"): barriers and drops
    /// the subgroup. Skipped on the failure exit path, since a blocked
    /// rank cannot safely barrier.
    pub async fn close(self) -> Result<(), StreamerError> {
        if self.failed {
            return Ok(());
        }
        self.group.barrier().await
    }
}

/// Drives group formation and partitioning for one `stream_files` call,
/// then hands back a session that owns the rest of the broadcast state
/// machine.
pub struct DistributedEngine {
    collective: Arc<dyn CollectiveBackend>,
    fetcher: Arc<dyn ByteRangeFetcher>,
    config: StreamerConfig,
}

impl DistributedEngine {
    pub fn new(collective: Arc<dyn CollectiveBackend>, fetcher: Arc<dyn ByteRangeFetcher>, config: StreamerConfig) -> Self {
        Self { collective, fetcher, config }
    }

    /// Builds the subgroup, computes the deterministic partitioning,
    /// and returns a session scoped to this peer's share of the work.
    /// `local_hostname` is used only for the node-local grouping path
    /// (`DIST_GLOBAL=0`).
    pub async fn stream_files(&self, files: Vec<FileChunks>, local_hostname: &str) -> Result<DistributedSession, StreamerError> {
        let (group, plan) = self.form_group(local_hostname).await?;

        // §4.4 "Memory policy (pre-broadcast)": the local peer streams
        // its partition to a host-side buffer with the memory limit
        // raised to unlimited for the life of the session; restored
        // when the session (and this guard) is dropped.
        let memory_limit_guard = MemoryLimitGuard::override_unlimited();

        let partitions = Partitioner::partition_with_policy(&files, plan.world_size(), self.config.partition_policy)?;
        let total_chunks: usize = partitions.iter().flat_map(|p| p.files()).map(|f| f.chunks().len()).sum();

        let local_partition = partitions
            .into_iter()
            .nth(plan.rank())
            .ok_or_else(|| StreamerError::InvalidInput("no partition assigned to local rank".into()))?;

        let global_largest_chunk = files.iter().flat_map(|f| f.chunks()).copied().max().unwrap_or(0);
        let data_buffer_capacity = self.config.dist_buffer_min_bytesize.max(global_largest_chunk);

        let cursor = PrefillCursor::new(local_partition.files());

        Ok(DistributedSession {
            group,
            plan,
            local_partition,
            cursor,
            outstanding: AtomicUsize::new(total_chunks),
            failed: false,
            timeout: Duration::from_secs(self.config.dist_timeout_secs),
            send_metadata: vec![0u8; METADATA_BUFFER_BYTES],
            recv_metadata: vec![0u8; METADATA_BUFFER_BYTES],
            send_data: vec![0u8; data_buffer_capacity as usize],
            recv_data: vec![0u8; data_buffer_capacity as usize],
            data_buffer_capacity,
            fetcher: self.fetcher.clone(),
            worker_pool: WorkerPool::with_default_concurrency(),
            _memory_limit_guard: memory_limit_guard,
        })
    }

    /// Forms the broadcast subgroup per §4.4 "Group formation": either
    /// one global group over every rank, or one group per unique
    /// hostname, discovered via a transient all-gather and created by
    /// every peer in identical (sorted-hostname) order.
    async fn form_group(&self, local_hostname: &str) -> Result<(Box<dyn CollectiveGroup>, BroadcastPlan), StreamerError> {
        let world_size = self.collective.world_size();

        if self.config.dist_global || world_size <= 1 {
            let ranks: Vec<usize> = (0..world_size).collect();
            let group = self.collective.new_group(&ranks).await?;
            publish_process_group_size(group.size());
            let plan = BroadcastPlan::new(group.size(), group.local_rank(), ranks)?;
            return Ok((group, plan));
        }

        let hostnames = self.collective.all_gather_strings(local_hostname).await?;
        let mut unique_hosts: Vec<String> = hostnames.clone();
        unique_hosts.sort();
        unique_hosts.dedup();

        let my_rank = self.collective.rank();
        let mut my_group: Option<Box<dyn CollectiveGroup>> = None;
        let mut my_ranks: Vec<usize> = Vec::new();

        for host in &unique_hosts {
            let ranks: Vec<usize> = hostnames
                .iter()
                .enumerate()
                .filter(|(_, h)| *h == host)
                .map(|(rank, _)| rank)
                .collect();
            // Every peer creates every node-local group, in the same
            // order, even ones it isn't a member of: group formation
            // is itself collective.
            let group = self.collective.new_group(&ranks).await?;
            if ranks.contains(&my_rank) {
                my_group = Some(group);
                my_ranks = ranks;
            }
        }

        let group = my_group.ok_or_else(|| {
            StreamerError::InvalidInput("local rank did not appear in any node-local subgroup".into())
        })?;
        publish_process_group_size(group.size());
        let plan = BroadcastPlan::new(group.size(), group.local_rank(), my_ranks)?;
        Ok((group, plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serial_test::serial;
    use std::collections::HashMap;

    struct FakeFetcher;

    #[async_trait]
    impl ByteRangeFetcher for FakeFetcher {
        async fn fetch_range(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>, StreamerError> {
            let tag = path.as_bytes().first().copied().unwrap_or(b'x');
            Ok(vec![tag; length as usize].into_iter().map(|b| b.wrapping_add(offset as u8)).collect())
        }
    }

    /// An in-process collective that loops broadcasts back through a
    /// shared channel, simulating a single-process "distributed" run
    /// for deterministic unit testing without a real communication
    /// library.
    struct LoopbackBackend {
        world_size: usize,
    }

    #[async_trait]
    impl CollectiveBackend for LoopbackBackend {
        fn rank(&self) -> usize {
            0
        }
        fn world_size(&self) -> usize {
            self.world_size
        }
        async fn all_gather_strings(&self, value: &str) -> Result<Vec<String>, StreamerError> {
            Ok(vec![value.to_string(); self.world_size])
        }
        async fn new_group(&self, ranks: &[usize]) -> Result<Box<dyn CollectiveGroup>, StreamerError> {
            Ok(Box::new(LoopbackGroup {
                ranks: ranks.to_vec(),
                store: Arc::new(Mutex::new(HashMap::new())),
            }))
        }
    }

    /// A subgroup of size 1 that just echoes whatever's broadcast back
    /// to the same buffer, letting single-peer-shaped tests exercise
    /// the broadcast plumbing without a second process.
    struct LoopbackGroup {
        ranks: Vec<usize>,
        store: Arc<Mutex<HashMap<usize, Vec<u8>>>>,
    }

    #[async_trait]
    impl CollectiveGroup for LoopbackGroup {
        fn local_rank(&self) -> usize {
            0
        }
        fn size(&self) -> usize {
            self.ranks.len()
        }
        async fn broadcast(&self, root: usize, buffer: &mut [u8]) -> Result<(), StreamerError> {
            let mut store = self.store.lock();
            if root == self.local_rank() {
                store.insert(root, buffer.to_vec());
            } else if let Some(saved) = store.get(&root) {
                buffer.copy_from_slice(saved);
            }
            Ok(())
        }
        async fn barrier(&self) -> Result<(), StreamerError> {
            Ok(())
        }
    }

    fn file(id: u64, chunks: Vec<u64>) -> FileChunks {
        FileChunks::new(id, format!("file-{id}"), 0, chunks).unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn single_rank_session_yields_every_chunk_and_terminates() {
        let collective: Arc<dyn CollectiveBackend> = Arc::new(LoopbackBackend { world_size: 1 });
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(FakeFetcher);
        let config = StreamerConfig::from_env();
        let engine = DistributedEngine::new(collective, fetcher, config);

        let files = vec![file(1, vec![10, 20, 30])];
        let mut session = engine.stream_files(files, "localhost").await.unwrap();

        let mut total = 0;
        while let Some(chunks) = session.next_circuit().await.unwrap() {
            total += chunks.len();
        }
        assert_eq!(total, 3);
        session.close().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn stream_files_restores_memory_limit_on_session_drop() {
        use crate::infrastructure::config::env::memory_limit_raw;

        let collective: Arc<dyn CollectiveBackend> = Arc::new(LoopbackBackend { world_size: 1 });
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(FakeFetcher);
        let mut config = StreamerConfig::from_env();
        config.dist_buffer_min_bytesize = 1024;
        let engine = DistributedEngine::new(collective, fetcher, config);

        let prior = memory_limit_raw();
        let session = engine.stream_files(vec![file(1, vec![10])], "localhost").await.unwrap();
        assert_eq!(memory_limit_raw(), -1, "memory limit must be unlimited for the life of the session");
        drop(session);
        assert_eq!(memory_limit_raw(), prior, "memory limit must be restored once the session is dropped");
    }

    #[tokio::test]
    #[serial]
    async fn stream_files_publishes_process_group_size() {
        use crate::infrastructure::config::env::process_group_size;

        let collective: Arc<dyn CollectiveBackend> = Arc::new(LoopbackBackend { world_size: 3 });
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(FakeFetcher);
        let config = StreamerConfig::from_env();
        let engine = DistributedEngine::new(collective, fetcher, config);

        let files = vec![file(1, vec![10]), file(2, vec![10]), file(3, vec![10])];
        let _session = engine.stream_files(files, "localhost").await.unwrap();
        assert_eq!(process_group_size(), 3);
    }

    #[test]
    fn metadata_round_trips_through_encode_decode() {
        let mut buf = vec![0u8; METADATA_BUFFER_BYTES];
        let rows = vec![(1u64, 0u64, 100u64, 0u64), (1u64, 1u64, 200u64, 100u64)];
        encode_metadata(&mut buf, &rows);
        let decoded = decode_metadata(&buf);
        assert_eq!(decoded, rows);
    }

    #[test]
    fn prefill_cursor_respects_both_caps() {
        let files = vec![file(1, vec![10, 10, 10, 10])];
        let mut cursor = PrefillCursor::new(&files);
        let first = cursor.pull(&files, 25);
        assert_eq!(first.len(), 2);
        let second = cursor.pull(&files, 25);
        assert_eq!(second.len(), 2);
        assert!(cursor.pull(&files, 25).is_empty());
    }
}
