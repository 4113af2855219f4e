// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object Store Backend
//!
//! `ByteRangeFetcher` over S3, GCS, or Azure Blob via the `object_store`
//! crate. Credential resolution is delegated entirely to each builder's
//! `from_env()` — this crate's purpose statement puts credential
//! resolution out of scope, so the standard provider-chain env vars
//! (`AWS_ACCESS_KEY_ID`, `GOOGLE_APPLICATION_CREDENTIALS`,
//! `AZURE_STORAGE_ACCOUNT`, …) are the only configuration surface.

use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::ops::Range;
use std::sync::Arc;

use model_streamer_domain::ports::ByteRangeFetcher;
use model_streamer_domain::StreamerError;

/// One backend client bound to a single bucket/container; handles any
/// key within that bucket.
pub struct ObjectStoreFetcher {
    store: Arc<dyn ObjectStore>,
    prefix_len: usize,
}

impl ObjectStoreFetcher {
    /// Builds a fetcher for the bucket/container named in `path`'s
    /// `scheme://bucket/...` prefix.
    pub fn for_url(path: &str) -> Result<Self, StreamerError> {
        let (scheme, rest) = path.split_once("://").ok_or_else(|| {
            StreamerError::InvalidInput(format!("not an object store path: {path}"))
        })?;
        let bucket = rest.split('/').next().unwrap_or_default();
        if bucket.is_empty() {
            return Err(StreamerError::InvalidInput(format!(
                "object store path missing bucket/container: {path}"
            )));
        }

        let store: Arc<dyn ObjectStore> = match scheme {
            "s3" => Arc::new(
                AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|e| StreamerError::BackendError(format!("s3 client for {bucket}: {e}")))?,
            ),
            "gs" => Arc::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|e| StreamerError::BackendError(format!("gcs client for {bucket}: {e}")))?,
            ),
            "az" => Arc::new(
                MicrosoftAzureBuilder::from_env()
                    .with_container_name(bucket)
                    .build()
                    .map_err(|e| StreamerError::BackendError(format!("azure client for {bucket}: {e}")))?,
            ),
            other => {
                return Err(StreamerError::InvalidInput(format!(
                    "unsupported object store scheme: {other}"
                )))
            }
        };

        // `scheme://bucket/` — stripped from every subsequent fetch_range
        // call to recover the object key relative to the bucket root.
        let prefix_len = scheme.len() + 3 + bucket.len() + 1;

        Ok(Self { store, prefix_len })
    }

    fn object_path(&self, path: &str) -> Result<ObjectPath, StreamerError> {
        let key = path.get(self.prefix_len..).ok_or_else(|| {
            StreamerError::InvalidInput(format!("path {path} does not match this backend's bucket"))
        })?;
        Ok(ObjectPath::from(key))
    }
}

#[async_trait]
impl ByteRangeFetcher for ObjectStoreFetcher {
    async fn fetch_range(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>, StreamerError> {
        let object_path = self.object_path(path)?;
        let start = offset as usize;
        let end = start
            .checked_add(length as usize)
            .ok_or_else(|| StreamerError::BackendError(format!("{path}: range overflow at offset {offset}")))?;
        let range: Range<usize> = start..end;

        let bytes = self
            .store
            .get_range(&object_path, range)
            .await
            .map_err(|e| StreamerError::BackendError(format!("{path}: {e}")))?;

        Ok(bytes.to_vec())
    }
}
