// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Logging
//!
//! Structured `tracing` initialization. Every span below this layer —
//! the chunk scheduler's batches, the header decoder's tensor count,
//! the distributed engine's broadcast rounds — emits through the
//! `tracing` macros; this module is just the subscriber wiring.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global `tracing` subscriber. Respects `RUST_LOG`;
/// defaults to `info` when unset. Call once, at process startup,
/// before any `stream_files` call.
///
/// `json` selects machine-parseable output (for log aggregation in
/// production) over the human-readable format (for local development).
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt().with_env_filter(filter).with_target(true);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
