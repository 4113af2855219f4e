// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Model Streamer Domain
//!
//! Pure domain layer for the model weight streamer: the chunk scheduler,
//! the safetensors header decoder, and the distributed partitioner, plus
//! the value objects and port traits they operate over.
//!
//! ## Architecture Position
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            BOOTSTRAP                         │  entry point, CLI, signals
//! └─────────────────────┬─────────────────────────┘
//!                        ▼
//! ┌─────────────────────────────────────────────┐
//! │         INFRASTRUCTURE (model_streamer)      │  backends, staging buffer,
//! │                                               │  distributed runtime
//! └─────────────────────┬─────────────────────────┘
//!                        ▼
//! ┌─────────────────────────────────────────────┐
//! │       DOMAIN (this crate)                    │  scheduling, header
//! │                                               │  decode, partitioning
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core concepts
//!
//! - **Value objects** (`value_objects`): `FileChunks`, `Alignment`,
//!   `Batch`, `TensorRecord`, `Dtype`, `WorkUnit`/`Partition`,
//!   `BroadcastPlan` — immutable, self-validating data.
//! - **Domain services** (`services`): `ChunkScheduler`,
//!   `SafetensorsHeader`, `Partitioner` — stateless or narrowly-stateful
//!   pure algorithms, no I/O.
//! - **Ports** (`ports`): `ByteRangeFetcher`, `CollectiveBackend` —
//!   `async_trait` interfaces the domain depends on but does not
//!   implement; infrastructure provides the implementations.
//!
//! Everything here is synchronous and allocation-only except the ports,
//! which are I/O-bound by nature and therefore `async_trait`.

pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use error::StreamerError;
