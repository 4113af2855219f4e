// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Model Streamer
//!
//! Infrastructure and application crate for the model weight streamer:
//! object-store and local filesystem backends, the staging buffer, the
//! single-peer and distributed runtime, and the process-scoped
//! configuration and observability that drive them.
//!
//! ## Architecture position
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        BOOTSTRAP (model_streamer_bootstrap)  │  CLI, logger, shutdown
//! └─────────────────────┬─────────────────────────┘
//!                        ▼
//! ┌─────────────────────────────────────────────┐
//! │          THIS CRATE (model_streamer)         │  backends, staging
//! │                                               │  buffer, distributed
//! │                                               │  runtime, application
//! └─────────────────────┬─────────────────────────┘
//!                        ▼
//! ┌─────────────────────────────────────────────┐
//! │       DOMAIN (model_streamer_domain)         │  scheduling, header
//! │                                               │  decode, partitioning
//! └─────────────────────────────────────────────┘
//! ```
//!
//! `application` is the thin orchestration layer `model_streamer_bootstrap`'s
//! CLI calls into; `infrastructure` holds every concrete adapter for the
//! domain crate's ports plus the runtime machinery that drives them.

pub mod application;
pub mod infrastructure;

// Tests are organized as:
// - Unit tests: #[cfg(test)] modules within each source file
// - Integration tests: separate files in tests/ directory

pub use model_streamer_domain::error::StreamerError;
