// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Runtime
//!
//! The concurrency machinery sitting on top of the domain's pure
//! scheduling algorithms: a bounded worker pool that performs the
//! actual byte-range GETs (§5, "ByteRangeFetcher is a pool of worker
//! threads"), and the distributed engine's broadcast state machine
//! (§4.4).

pub mod distributed_engine;
pub mod orchestrator;
pub mod worker_pool;

pub use distributed_engine::DistributedEngine;
pub use orchestrator::StreamFilesSession;
pub use worker_pool::WorkerPool;
