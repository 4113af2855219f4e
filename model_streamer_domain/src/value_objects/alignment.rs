// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Alignment Value Object
//!
//! The staging buffer's alignment: a power of two, or 1 to disable
//! padding entirely. Every per-chunk offset assigned by the staging
//! buffer is a multiple of this value, so every tensor view handed to
//! the caller starts on an aligned address.

use crate::error::StreamerError;
use serde::{Deserialize, Serialize};

/// A validated power-of-two byte alignment (or 1, meaning "no padding").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Alignment {
    bytes: usize,
}

impl Alignment {
    /// Default alignment for device (GPU) staging buffers: 256 bytes,
    /// chosen to satisfy typical GPU copy-alignment requirements.
    pub const DEVICE_DEFAULT: usize = 256;

    /// Default alignment for host pageable buffers: none.
    pub const HOST_DEFAULT: usize = 1;

    /// Creates an `Alignment`, validating it is 1 or a power of two.
    pub fn new(bytes: usize) -> Result<Self, StreamerError> {
        if bytes == 0 || (bytes != 1 && !bytes.is_power_of_two()) {
            return Err(StreamerError::InvalidInput(format!(
                "alignment {bytes} must be 1 or a power of two"
            )));
        }
        Ok(Self { bytes })
    }

    pub fn device_default() -> Self {
        Self {
            bytes: Self::DEVICE_DEFAULT,
        }
    }

    pub fn host_default() -> Self {
        Self {
            bytes: Self::HOST_DEFAULT,
        }
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Rounds `size` up to the next multiple of this alignment.
    pub fn round_up(&self, size: u64) -> u64 {
        let a = self.bytes as u64;
        if a <= 1 {
            return size;
        }
        size.div_ceil(a) * a
    }

    /// True if `address` satisfies this alignment.
    pub fn is_aligned(&self, address: usize) -> bool {
        self.bytes <= 1 || address % self.bytes == 0
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Self::host_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two() {
        assert!(Alignment::new(0).is_err());
        assert!(Alignment::new(3).is_err());
        assert!(Alignment::new(256).is_ok());
        assert!(Alignment::new(1).is_ok());
    }

    #[test]
    fn round_up_pads_to_next_multiple() {
        let a = Alignment::new(256).unwrap();
        assert_eq!(a.round_up(100), 256);
        assert_eq!(a.round_up(200), 256);
        assert_eq!(a.round_up(300), 512);
        assert_eq!(a.round_up(256), 256);
    }

    #[test]
    fn alignment_of_one_is_a_no_op() {
        let a = Alignment::new(1).unwrap();
        assert_eq!(a.round_up(777), 777);
        assert!(a.is_aligned(777));
    }
}
