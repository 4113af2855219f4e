// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Layer
//!
//! Thin orchestration sitting above the infrastructure crate's ports
//! and runtime: translates an external request (a file path or URI)
//! into calls against `BackendRouter` and `SafetensorsHeader`, without
//! owning any I/O or business rule itself. This is the layer
//! `model_streamer_bootstrap`'s CLI calls into.

use model_streamer_domain::error::StreamerError;
use model_streamer_domain::ports::ByteRangeFetcher;
use model_streamer_domain::services::SafetensorsHeader;

use crate::infrastructure::backends::BackendRouter;

/// One tensor's name/dtype/shape, the fields the CLI's `stream`
/// subcommand prints (SPEC_FULL.md "Ambient stack / CLI").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSummary {
    pub name: String,
    pub dtype: String,
    pub shape: Vec<u64>,
}

/// Fetches and decodes `path`'s safetensors header, returning one
/// [`TensorSummary`] per tensor in header order.
///
/// Grounded on `SafetensorsHeader`'s two-step decode (§4.3): the 8-byte
/// length prefix is fetched first so the exact JSON body length is
/// known before the second fetch.
pub async fn describe_file(router: &BackendRouter, path: &str) -> Result<Vec<TensorSummary>, StreamerError> {
    let fetcher = router.fetcher_for(path)?;

    let prefix = fetcher.fetch_range(path, 0, 8).await?;
    let length = SafetensorsHeader::parse_length_prefix(&prefix)?;
    let body = fetcher.fetch_range(path, 8, length).await?;
    let header = SafetensorsHeader::parse_body(length, &body)?;

    Ok(header
        .tensors()
        .iter()
        .map(|t| TensorSummary {
            name: t.name().to_string(),
            dtype: format!("{:?}", t.dtype()),
            shape: t.shape().to_vec(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_streamer_domain::ports::ByteRangeFetcher;
    use std::io::Write;

    fn safetensors_bytes(json: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(json.len() as u64).to_le_bytes());
        out.extend_from_slice(json.as_bytes());
        out
    }

    #[tokio::test]
    async fn describes_tensors_from_a_local_file() {
        let json = r#"{"weight":{"dtype":"F32","shape":[2,2],"data_offsets":[0,16]}}"#;
        let bytes = safetensors_bytes(json);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&bytes).unwrap();
        drop(file);

        let router = BackendRouter::new();
        let summaries = describe_file(&router, path.to_str().unwrap()).await.unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "weight");
        assert_eq!(summaries[0].dtype, "F32");
        assert_eq!(summaries[0].shape, vec![2, 2]);
    }
}
