// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Backend Routing
//!
//! Routes an opaque path string to a `ByteRangeFetcher` by prefix
//! alone (§6.2): `s3://`, `gs://`, `az://` select an object-store
//! backend, anything else is treated as a local filesystem path.
//! Fetchers are cached per bucket/container so repeated chunk reads
//! against the same object don't pay reconnection cost.

pub mod local;
pub mod object_store_backend;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use model_streamer_domain::ports::ByteRangeFetcher;
use model_streamer_domain::StreamerError;

pub use local::LocalFsFetcher;
pub use object_store_backend::ObjectStoreFetcher;

/// Caches one fetcher per distinct bucket/container root and hands out
/// `Arc` clones of it. The engine does not know or care which concrete
/// backend serves a given path; it only calls `fetcher_for`.
pub struct BackendRouter {
    local: Arc<LocalFsFetcher>,
    object_store_cache: Mutex<HashMap<String, Arc<ObjectStoreFetcher>>>,
}

impl BackendRouter {
    pub fn new() -> Self {
        Self {
            local: Arc::new(LocalFsFetcher::new()),
            object_store_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves `path` to a fetcher. All paths sharing the same scheme
    /// and bucket/container resolve to the same cached `ObjectStoreFetcher`
    /// instance.
    pub fn fetcher_for(&self, path: &str) -> Result<Arc<dyn ByteRangeFetcher>, StreamerError> {
        match scheme_of(path) {
            None => Ok(self.local.clone() as Arc<dyn ByteRangeFetcher>),
            Some(scheme) => {
                let root = bucket_root(path)?;
                let cache_key = format!("{scheme}://{root}");

                let mut cache = self.object_store_cache.lock();
                if let Some(existing) = cache.get(&cache_key) {
                    return Ok(existing.clone() as Arc<dyn ByteRangeFetcher>);
                }

                let fetcher = Arc::new(ObjectStoreFetcher::for_url(path)?);
                cache.insert(cache_key, fetcher.clone());
                Ok(fetcher as Arc<dyn ByteRangeFetcher>)
            }
        }
    }
}

impl Default for BackendRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the backend scheme implied by `path`'s prefix, or `None` for
/// a local filesystem path.
fn scheme_of(path: &str) -> Option<&'static str> {
    if path.starts_with("s3://") {
        Some("s3")
    } else if path.starts_with("gs://") {
        Some("gs")
    } else if path.starts_with("az://") {
        Some("az")
    } else {
        None
    }
}

/// Extracts the `scheme://bucket` prefix used as the cache key, so
/// every object under the same bucket shares one client.
fn bucket_root(path: &str) -> Result<String, StreamerError> {
    let without_scheme = path.splitn(2, "://").nth(1).ok_or_else(|| {
        StreamerError::InvalidInput(format!("malformed object store path: {path}"))
    })?;
    let bucket = without_scheme.split('/').next().unwrap_or_default();
    if bucket.is_empty() {
        return Err(StreamerError::InvalidInput(format!(
            "object store path missing bucket/container: {path}"
        )));
    }
    Ok(bucket.to_string())
}
