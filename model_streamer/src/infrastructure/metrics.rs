// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service Implementation
//!
//! Prometheus-based metrics for the streaming loader: bytes pulled
//! through the byte-range worker pool, chunks yielded to the caller,
//! broadcast rounds completed, and staging-buffer occupancy. Thread-
//! safe, low overhead, one instance per process.

use prometheus::{Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry};

use model_streamer_domain::StreamerError;

fn metrics_error(what: &str, e: impl std::fmt::Display) -> StreamerError {
    StreamerError::InvalidInput(format!("failed to create {what} metric: {e}"))
}

/// Prometheus metrics for one streaming session or process.
#[derive(Clone)]
pub struct StreamerMetrics {
    registry: Registry,

    pub bytes_streamed_total: IntCounter,
    pub chunks_yielded_total: IntCounter,
    pub broadcast_rounds_total: IntCounter,
    pub staging_bytes_in_use: Gauge,
    pub batch_fetch_duration: Histogram,
}

impl StreamerMetrics {
    pub fn new() -> Result<Self, StreamerError> {
        let registry = Registry::new();

        let bytes_streamed_total = IntCounter::with_opts(
            Opts::new("bytes_streamed_total", "Total tensor bytes yielded to the caller")
                .namespace("model_streamer"),
        )
        .map_err(|e| metrics_error("bytes_streamed_total", e))?;

        let chunks_yielded_total = IntCounter::with_opts(
            Opts::new("chunks_yielded_total", "Total (file_id, chunk_idx) pairs yielded")
                .namespace("model_streamer"),
        )
        .map_err(|e| metrics_error("chunks_yielded_total", e))?;

        let broadcast_rounds_total = IntCounter::with_opts(
            Opts::new("broadcast_rounds_total", "Total distributed broadcast rounds completed")
                .namespace("model_streamer"),
        )
        .map_err(|e| metrics_error("broadcast_rounds_total", e))?;

        let staging_bytes_in_use = Gauge::with_opts(
            Opts::new("staging_bytes_in_use", "Bytes of the staging buffer currently occupied by the active batch")
                .namespace("model_streamer"),
        )
        .map_err(|e| metrics_error("staging_bytes_in_use", e))?;

        let batch_fetch_duration = Histogram::with_opts(
            HistogramOpts::new("batch_fetch_duration_seconds", "Time to fetch one scheduler batch")
                .namespace("model_streamer")
                .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )
        .map_err(|e| metrics_error("batch_fetch_duration", e))?;

        registry
            .register(Box::new(bytes_streamed_total.clone()))
            .map_err(|e| metrics_error("registry (bytes_streamed_total)", e))?;
        registry
            .register(Box::new(chunks_yielded_total.clone()))
            .map_err(|e| metrics_error("registry (chunks_yielded_total)", e))?;
        registry
            .register(Box::new(broadcast_rounds_total.clone()))
            .map_err(|e| metrics_error("registry (broadcast_rounds_total)", e))?;
        registry
            .register(Box::new(staging_bytes_in_use.clone()))
            .map_err(|e| metrics_error("registry (staging_bytes_in_use)", e))?;
        registry
            .register(Box::new(batch_fetch_duration.clone()))
            .map_err(|e| metrics_error("registry (batch_fetch_duration)", e))?;

        Ok(Self {
            registry,
            bytes_streamed_total,
            chunks_yielded_total,
            broadcast_rounds_total,
            staging_bytes_in_use,
            batch_fetch_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
