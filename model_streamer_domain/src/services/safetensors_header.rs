// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SafetensorsHeader
//!
//! Parses and validates a safetensors file's header: an 8-byte
//! little-endian length prefix followed by a JSON object describing
//! each tensor's dtype, shape, and byte range. All errors are reported
//! before any tensor byte is read.
//!
//! Split into two steps because the bytes themselves arrive from an
//! I/O boundary (`ByteRangeFetcher`) in two separate reads: the 8-byte
//! prefix first (to learn how many more bytes to fetch), then the JSON
//! body.

use serde::Deserialize;
use serde_json::Value;

use crate::error::StreamerError;
use crate::value_objects::{Dtype, TensorRecord};

/// Header length may not exceed this many bytes.
pub const MAX_HEADER_SIZE: u64 = 100 * 1024 * 1024;

const METADATA_KEY: &str = "__metadata__";

#[derive(Deserialize)]
struct RawTensorEntry {
    dtype: String,
    shape: Vec<u64>,
    data_offsets: (u64, u64),
}

/// A fully decoded and validated safetensors header.
#[derive(Debug, Clone)]
pub struct SafetensorsHeader {
    tensors: Vec<TensorRecord>,
    data_region_offset: u64,
}

impl SafetensorsHeader {
    pub fn tensors(&self) -> &[TensorRecord] {
        &self.tensors
    }

    pub fn data_region_offset(&self) -> u64 {
        self.data_region_offset
    }

    /// The per-tensor chunk sizes, in the same order as `tensors()`.
    pub fn chunk_sizes(&self) -> Vec<u64> {
        self.tensors.iter().map(|t| t.size()).collect()
    }

    /// Decodes the 8-byte little-endian length prefix, validating it
    /// against `MAX_HEADER_SIZE`.
    ///
    /// Step 1 of the decode procedure: fails with `HeaderTruncated` if
    /// fewer than 8 bytes were read, `HeaderTooLarge` if the declared
    /// length exceeds the cap.
    pub fn parse_length_prefix(prefix: &[u8]) -> Result<u64, StreamerError> {
        if prefix.len() < 8 {
            return Err(StreamerError::HeaderTruncated(format!(
                "expected 8-byte length prefix, got {} bytes",
                prefix.len()
            )));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&prefix[..8]);
        let length = u64::from_le_bytes(buf);
        if length > MAX_HEADER_SIZE {
            return Err(StreamerError::HeaderTooLarge(format!(
                "header length {length} exceeds {MAX_HEADER_SIZE} byte cap"
            )));
        }
        Ok(length)
    }

    /// Decodes and validates the JSON header body, given the length
    /// declared by `parse_length_prefix`.
    ///
    /// Steps 2-6 of the decode procedure: UTF-8 + JSON decode, per-
    /// tensor dtype/offset validation, sort by `start`, strict
    /// contiguity check.
    pub fn parse_body(length: u64, body: &[u8]) -> Result<Self, StreamerError> {
        if body.len() as u64 != length {
            return Err(StreamerError::HeaderTruncated(format!(
                "expected {length} header bytes, got {}",
                body.len()
            )));
        }

        let text = std::str::from_utf8(body)
            .map_err(|e| StreamerError::HeaderEncoding(e.to_string()))?;
        let value: Value = serde_json::from_str(text)?;
        let obj = value.as_object().ok_or_else(|| {
            StreamerError::HeaderJson("header is not a JSON object".to_string())
        })?;

        let mut records = Vec::with_capacity(obj.len());
        for (name, raw) in obj {
            if name == METADATA_KEY {
                continue;
            }
            let entry: RawTensorEntry = serde_json::from_value(raw.clone())?;
            let dtype = Dtype::parse(&entry.dtype)?;
            let (start, end) = entry.data_offsets;
            if start > end {
                return Err(StreamerError::HeaderInconsistent(format!(
                    "tensor {name}: start offset {start} > end offset {end}"
                )));
            }
            let num_elements: u64 = entry.shape.iter().product();
            let expected_packed = dtype.payload_bytes(num_elements);
            let actual = end - start;
            let accepted_unpacked = dtype.is_sub_byte() && actual == num_elements;
            if actual != expected_packed && !accepted_unpacked {
                return Err(StreamerError::HeaderInconsistent(format!(
                    "tensor {name}: payload size {actual} does not match shape/dtype (expected {expected_packed})"
                )));
            }
            records.push(TensorRecord::new(name.clone(), dtype, entry.shape, start, end));
        }

        records.sort_by_key(|r| r.start_offset());

        for pair in records.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.end_offset() < next.start_offset() {
                return Err(StreamerError::HeaderInconsistent(format!(
                    "gap between tensors {} (ends {}) and {} (starts {})",
                    prev.name(),
                    prev.end_offset(),
                    next.name(),
                    next.start_offset()
                )));
            }
            if prev.end_offset() > next.start_offset() {
                return Err(StreamerError::HeaderInconsistent(format!(
                    "overlap between tensors {} (ends {}) and {} (starts {})",
                    prev.name(),
                    prev.end_offset(),
                    next.name(),
                    next.start_offset()
                )));
            }
        }

        Ok(Self {
            tensors: records,
            data_region_offset: 8 + length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(json: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(json.len() as u64).to_le_bytes());
        out.extend_from_slice(json.as_bytes());
        out
    }

    #[test]
    fn round_trips_two_contiguous_tensors() {
        let json = r#"{"A":{"dtype":"U8","shape":[10],"data_offsets":[0,10]},"B":{"dtype":"F32","shape":[2,2],"data_offsets":[10,26]}}"#;
        let bytes = header_bytes(json);
        let length = SafetensorsHeader::parse_length_prefix(&bytes[..8]).unwrap();
        let header = SafetensorsHeader::parse_body(length, &bytes[8..]).unwrap();
        assert_eq!(header.chunk_sizes(), vec![10, 16]);
        assert_eq!(header.data_region_offset(), 8 + json.len() as u64);
    }

    #[test]
    fn ignores_metadata_key() {
        let json = r#"{"__metadata__":{"format":"pt"},"A":{"dtype":"U8","shape":[4],"data_offsets":[0,4]}}"#;
        let bytes = header_bytes(json);
        let length = SafetensorsHeader::parse_length_prefix(&bytes[..8]).unwrap();
        let header = SafetensorsHeader::parse_body(length, &bytes[8..]).unwrap();
        assert_eq!(header.tensors().len(), 1);
    }

    #[test]
    fn overlap_is_header_inconsistent() {
        let json = r#"{"A":{"dtype":"U8","shape":[10],"data_offsets":[0,10]},"B":{"dtype":"U8","shape":[10],"data_offsets":[5,15]}}"#;
        let bytes = header_bytes(json);
        let length = SafetensorsHeader::parse_length_prefix(&bytes[..8]).unwrap();
        let err = SafetensorsHeader::parse_body(length, &bytes[8..]).unwrap_err();
        assert!(matches!(err, StreamerError::HeaderInconsistent(_)));
    }

    #[test]
    fn header_too_large_is_rejected_before_reading_body() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(MAX_HEADER_SIZE + 1).to_le_bytes());
        let err = SafetensorsHeader::parse_length_prefix(&bytes).unwrap_err();
        assert!(matches!(err, StreamerError::HeaderTooLarge(_)));
    }

    #[test]
    fn truncated_prefix_is_rejected() {
        let err = SafetensorsHeader::parse_length_prefix(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, StreamerError::HeaderTruncated(_)));
    }

    #[test]
    fn unknown_dtype_is_rejected() {
        let json = r#"{"A":{"dtype":"Q128","shape":[1],"data_offsets":[0,1]}}"#;
        let bytes = header_bytes(json);
        let length = SafetensorsHeader::parse_length_prefix(&bytes[..8]).unwrap();
        let err = SafetensorsHeader::parse_body(length, &bytes[8..]).unwrap_err();
        assert!(matches!(err, StreamerError::UnknownDtype(_)));
    }
}
