// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Layer
//!
//! Concrete adapters for the domain crate's ports, plus the runtime
//! machinery (worker pool, distributed engine, staging buffer) that
//! drives them. Nothing in here is imported by `model-streamer-domain`;
//! dependencies point inward only.

pub mod backends;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod runtime;
pub mod staging_buffer;
pub mod stream_session;
