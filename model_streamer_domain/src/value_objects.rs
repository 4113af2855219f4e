// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Value Objects
//!
//! Immutable, self-validating data describing the streaming workload:
//! file-local chunk layout (`FileChunks`), staging-buffer alignment
//! (`Alignment`), scheduled work (`Batch`), safetensors tensor metadata
//! (`Dtype`, `TensorRecord`), and distributed-run shape (`WorkUnit`,
//! `Partition`, `BroadcastPlan`).

pub mod alignment;
pub mod batch;
pub mod broadcast_plan;
pub mod dtype;
pub mod file_chunks;
pub mod partition;
pub mod tensor_record;

pub use alignment::Alignment;
pub use batch::{Batch, BatchEntry};
pub use broadcast_plan::BroadcastPlan;
pub use dtype::Dtype;
pub use file_chunks::FileChunks;
pub use partition::{Partition, WorkUnit};
pub use tensor_record::TensorRecord;
