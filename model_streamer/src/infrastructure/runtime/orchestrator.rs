// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stream Files Orchestrator
//!
//! §5 "Distribution gating": one `stream_files` call picks between the
//! single-peer path (§4.5) and the distributed partition-and-broadcast
//! path (§4.4) based on the `DIST` knob and the collective backend's
//! world size, then exposes both behind one chunk-yielding interface so
//! the caller does not need to know which path it took.

use std::sync::Arc;

use model_streamer_domain::error::StreamerError;
use model_streamer_domain::ports::collective::CollectiveBackend;
use model_streamer_domain::ports::ByteRangeFetcher;
use model_streamer_domain::services::chunk_scheduler::MemoryBudget;
use model_streamer_domain::value_objects::{Alignment, FileChunks};

use crate::infrastructure::config::env::memory_limit_raw;
use crate::infrastructure::config::{DistMode, StreamerConfig};
use crate::infrastructure::runtime::distributed_engine::{DistributedEngine, DistributedSession};
use crate::infrastructure::stream_session::{StreamSession, YieldedChunk};

/// One `stream_files` call, already routed to the path the `DIST` knob
/// and the collective backend's world size select.
pub enum StreamFilesSession {
    SinglePeer(StreamSession),
    Distributed(DistributedSession),
}

impl StreamFilesSession {
    /// Decides the path per §5 "Distribution gating" and builds the
    /// session for it:
    ///
    /// - `DIST=0` (`DistMode::ForceSinglePeer`) always takes the
    ///   single-peer path, even if a collective backend is supplied.
    /// - `DIST=1` (`DistMode::ForceDistributed`) always takes the
    ///   distributed path, failing with `InvalidInput` if no collective
    ///   backend was supplied.
    /// - `DIST=auto` (`DistMode::Auto`, the default) distributes only
    ///   when a collective backend is present and reports
    ///   `world_size() > 1`; otherwise it short-circuits to the
    ///   single-peer path per §4.5 ("When G = 1 ... the engine
    ///   short-circuits").
    pub async fn start(
        files: Vec<FileChunks>,
        config: &StreamerConfig,
        fetcher: Arc<dyn ByteRangeFetcher>,
        collective: Option<Arc<dyn CollectiveBackend>>,
        local_hostname: &str,
    ) -> Result<Self, StreamerError> {
        let distribute = match config.dist {
            DistMode::ForceSinglePeer => false,
            DistMode::ForceDistributed => true,
            DistMode::Auto => collective.as_ref().map(|c| c.world_size() > 1).unwrap_or(false),
        };

        if distribute {
            let collective = collective.ok_or_else(|| {
                StreamerError::InvalidInput(
                    "DIST forces distribution but no collective backend is configured".into(),
                )
            })?;
            let engine = DistributedEngine::new(collective, fetcher, config.clone());
            let session = engine.stream_files(files, local_hostname).await?;
            Ok(StreamFilesSession::Distributed(session))
        } else {
            let alignment = Alignment::new(config.effective_alignment())?;
            let budget = MemoryBudget::from_raw(memory_limit_raw());
            let session = StreamSession::new(files, budget, alignment, fetcher)?;
            Ok(StreamFilesSession::SinglePeer(session))
        }
    }

    /// Pulls the next unit of chunks, whichever path this session took:
    /// one `ChunkScheduler` batch on the single-peer path, or one
    /// broadcast circuit on the distributed path. `None` once the
    /// underlying path is drained.
    pub async fn next_chunks(&mut self) -> Result<Option<Vec<YieldedChunk>>, StreamerError> {
        match self {
            StreamFilesSession::SinglePeer(session) => session.next_batch_chunks().await,
            StreamFilesSession::Distributed(session) => {
                let circuit = session.next_circuit().await?;
                Ok(circuit.map(|chunks| {
                    chunks
                        .into_iter()
                        .map(|c| YieldedChunk {
                            file_id: c.file_id,
                            chunk_idx: c.chunk_idx,
                            bytes: c.bytes,
                        })
                        .collect()
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use model_streamer_domain::ports::collective::CollectiveGroup;
    use parking_lot::Mutex;
    use serial_test::serial;
    use std::collections::HashMap;

    struct FakeFetcher;

    #[async_trait]
    impl ByteRangeFetcher for FakeFetcher {
        async fn fetch_range(&self, _path: &str, offset: u64, length: u64) -> Result<Vec<u8>, StreamerError> {
            Ok(vec![offset as u8; length as usize])
        }
    }

    /// An in-process collective for routing tests: one group spanning
    /// the whole world, broadcasts looped back through a shared map.
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
                size: ranks.len(),
                store: Arc::new(Mutex::new(HashMap::new())),
            }))
        }
    }

    struct LoopbackGroup {
        size: usize,
        store: Arc<Mutex<HashMap<usize, Vec<u8>>>>,
    }

    #[async_trait]
    impl CollectiveGroup for LoopbackGroup {
        fn local_rank(&self) -> usize {
            0
        }
        fn size(&self) -> usize {
            self.size
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

    fn config_with_dist(dist: DistMode) -> StreamerConfig {
        let mut config = StreamerConfig::from_env();
        config.dist = dist;
        config
    }

    #[tokio::test]
    async fn force_single_peer_ignores_a_supplied_collective() {
        let config = config_with_dist(DistMode::ForceSinglePeer);
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(FakeFetcher);
        let collective: Arc<dyn CollectiveBackend> = Arc::new(LoopbackBackend { world_size: 3 });

        let session = StreamFilesSession::start(
            vec![file(1, vec![10])],
            &config,
            fetcher,
            Some(collective),
            "localhost",
        )
        .await
        .unwrap();

        assert!(matches!(session, StreamFilesSession::SinglePeer(_)));
    }

    #[tokio::test]
    async fn auto_with_no_collective_short_circuits_to_single_peer() {
        let config = config_with_dist(DistMode::Auto);
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(FakeFetcher);

        let session = StreamFilesSession::start(vec![file(1, vec![10])], &config, fetcher, None, "localhost")
            .await
            .unwrap();

        assert!(matches!(session, StreamFilesSession::SinglePeer(_)));
    }

    #[tokio::test]
    async fn auto_with_world_size_one_short_circuits_to_single_peer() {
        let config = config_with_dist(DistMode::Auto);
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(FakeFetcher);
        let collective: Arc<dyn CollectiveBackend> = Arc::new(LoopbackBackend { world_size: 1 });

        let session = StreamFilesSession::start(
            vec![file(1, vec![10])],
            &config,
            fetcher,
            Some(collective),
            "localhost",
        )
        .await
        .unwrap();

        assert!(matches!(session, StreamFilesSession::SinglePeer(_)));
    }

    #[tokio::test]
    async fn force_distributed_without_a_collective_is_invalid_input() {
        let config = config_with_dist(DistMode::ForceDistributed);
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(FakeFetcher);

        let err = StreamFilesSession::start(vec![file(1, vec![10])], &config, fetcher, None, "localhost")
            .await
            .unwrap_err();

        assert!(matches!(err, StreamerError::InvalidInput(_)));
    }

    #[tokio::test]
    #[serial]
    async fn force_distributed_routes_distributed_and_yields_every_chunk() {
        let config = config_with_dist(DistMode::ForceDistributed);
        let fetcher: Arc<dyn ByteRangeFetcher> = Arc::new(FakeFetcher);
        let collective: Arc<dyn CollectiveBackend> = Arc::new(LoopbackBackend { world_size: 1 });

        let mut session = StreamFilesSession::start(
            vec![file(1, vec![10, 20, 30])],
            &config,
            fetcher,
            Some(collective),
            "localhost",
        )
        .await
        .unwrap();
        assert!(matches!(session, StreamFilesSession::Distributed(_)));

        let mut total = 0;
        while let Some(chunks) = session.next_chunks().await.unwrap() {
            total += chunks.len();
        }
        assert_eq!(total, 3);
    }
}
