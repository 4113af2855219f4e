// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Safetensors Dtype Registry
//!
//! Maps the safetensors wire-format type tags (§6.1) to their storage
//! width. Standard dtypes carry a whole byte width; sub-byte dtypes
//! (FP4, FP6 variants) carry a bit width and round their total payload
//! size up to the next byte, matching the original's packed-bit export
//! convention.

use crate::error::StreamerError;
use serde::{Deserialize, Serialize};

/// A recognized safetensors element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dtype {
    F64,
    F32,
    F16,
    BF16,
    I64,
    I32,
    I16,
    I8,
    U8,
    Bool,
    C64,
    U64,
    U32,
    U16,
    F8E4M3,
    F8E5M2,
    F8E8M0,
    F4,
}

impl Dtype {
    /// Parses a wire-format type tag, e.g. `"F32"`. Unknown tags yield
    /// `UnknownDtype`.
    pub fn parse(tag: &str) -> Result<Self, StreamerError> {
        Ok(match tag {
            "F64" => Dtype::F64,
            "F32" => Dtype::F32,
            "F16" => Dtype::F16,
            "BF16" => Dtype::BF16,
            "I64" => Dtype::I64,
            "I32" => Dtype::I32,
            "I16" => Dtype::I16,
            "I8" => Dtype::I8,
            "U8" => Dtype::U8,
            "BOOL" => Dtype::Bool,
            "C64" => Dtype::C64,
            "U64" => Dtype::U64,
            "U32" => Dtype::U32,
            "U16" => Dtype::U16,
            "F8_E4M3" => Dtype::F8E4M3,
            "F8_E5M2" => Dtype::F8E5M2,
            "F8_E8M0" => Dtype::F8E8M0,
            "F4" => Dtype::F4,
            other => return Err(StreamerError::UnknownDtype(other.to_string())),
        })
    }

    /// Bit width of a single element of this dtype.
    pub fn bits(&self) -> u32 {
        match self {
            Dtype::F64 | Dtype::I64 | Dtype::U64 | Dtype::C64 => 64,
            Dtype::F32 | Dtype::I32 | Dtype::U32 => 32,
            Dtype::F16 | Dtype::BF16 | Dtype::I16 | Dtype::U16 => 16,
            Dtype::I8 | Dtype::U8 | Dtype::Bool | Dtype::F8E4M3 | Dtype::F8E5M2 | Dtype::F8E8M0 => {
                8
            }
            Dtype::F4 => 4,
        }
    }

    /// True for dtypes narrower than a byte, which pack multiple
    /// elements per byte and round the total payload up to a whole
    /// number of bytes.
    pub fn is_sub_byte(&self) -> bool {
        self.bits() < 8
    }

    /// Expected payload size in bytes for `num_elements` elements of
    /// this dtype: `element_size * num_elements` for byte-aligned
    /// dtypes, or the packed-bit ceiling-division for sub-byte dtypes.
    pub fn payload_bytes(&self, num_elements: u64) -> u64 {
        let total_bits = self.bits() as u64 * num_elements;
        total_bits.div_ceil(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_tags() {
        assert_eq!(Dtype::parse("F32").unwrap(), Dtype::F32);
        assert_eq!(Dtype::parse("BF16").unwrap(), Dtype::BF16);
        assert!(matches!(
            Dtype::parse("NOPE"),
            Err(StreamerError::UnknownDtype(_))
        ));
    }

    #[test]
    fn byte_aligned_payload_is_element_count_times_width() {
        let f32_size = Dtype::F32.payload_bytes(4);
        assert_eq!(f32_size, 16);
        let u8_size = Dtype::U8.payload_bytes(10);
        assert_eq!(u8_size, 10);
    }

    #[test]
    fn sub_byte_payload_uses_ceiling_division() {
        assert!(Dtype::F4.is_sub_byte());
        // 3 elements at 4 bits each = 12 bits -> 2 bytes.
        assert_eq!(Dtype::F4.payload_bytes(3), 2);
        // 2 elements at 4 bits each = 8 bits -> 1 byte exactly.
        assert_eq!(Dtype::F4.payload_bytes(2), 1);
    }
}
