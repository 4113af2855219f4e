// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Ports
//!
//! I/O-bound traits the domain depends on but does not implement:
//! `ByteRangeFetcher` (resolve path+offset+length to bytes) and
//! `CollectiveBackend` (group formation, broadcast, barrier). Both are
//! `async_trait` because they're I/O-bound by nature, unlike the rest
//! of this crate's sync, pure algorithms. Infrastructure provides the
//! concrete implementations.

pub mod byte_range_fetcher;
pub mod collective;

pub use byte_range_fetcher::ByteRangeFetcher;
pub use collective::CollectiveBackend;
