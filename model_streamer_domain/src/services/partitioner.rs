// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Partitioner
//!
//! Deterministically splits a list of `FileChunks` across `G` peer
//! ranks by byte volume. `|files| >= G` picks whole-file bin-packing
//! (cheap, identity source map); otherwise chunks are flattened to
//! atomic work units and bin-packed individually, then reassembled
//! into contiguous per-rank synthetic files.
//!
//! Both procedures are deterministic: identical inputs produce
//! identical per-rank outputs on every peer, which is what lets every
//! peer compute its partition independently without a coordinator.

use rayon::prelude::*;

use crate::error::StreamerError;
use crate::value_objects::partition::SourceMapEntry;
use crate::value_objects::{FileChunks, Partition, WorkUnit};

/// Forces a specific partitioning strategy, overriding the default
/// `|files| >= G` decision rule. See `partition_with_policy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionPolicy {
    Files,
    Chunks,
}

pub struct Partitioner;

impl Partitioner {
    /// Partitions `files` across `g` ranks using the default rule:
    /// partition-by-files when `files.len() >= g`, partition-by-chunks
    /// otherwise.
    pub fn partition(files: &[FileChunks], g: usize) -> Result<Vec<Partition>, StreamerError> {
        Self::partition_with_policy(files, g, None)
    }

    /// Partitions `files` across `g` ranks, optionally forcing a
    /// specific strategy regardless of `|files|` vs `g`. `policy =
    /// None` uses the default rule.
    pub fn partition_with_policy(
        files: &[FileChunks],
        g: usize,
        policy: Option<PartitionPolicy>,
    ) -> Result<Vec<Partition>, StreamerError> {
        if g == 0 {
            return Err(StreamerError::InvalidInput(
                "partition count must be positive".into(),
            ));
        }
        let mut seen = std::collections::HashSet::with_capacity(files.len());
        for f in files {
            if !seen.insert(f.id()) {
                return Err(StreamerError::InvalidInput(format!(
                    "duplicate file id {}",
                    f.id()
                )));
            }
        }

        let use_files = match policy {
            Some(PartitionPolicy::Files) => true,
            Some(PartitionPolicy::Chunks) => false,
            None => files.len() >= g,
        };

        if use_files {
            Ok(partition_by_files(files, g))
        } else {
            Ok(partition_by_chunks(files, g))
        }
    }
}

fn lightest_bin(sizes: &[u64]) -> usize {
    sizes
        .iter()
        .enumerate()
        .min_by_key(|(_, &size)| size)
        .map(|(idx, _)| idx)
        .unwrap()
}

fn partition_by_files(files: &[FileChunks], g: usize) -> Vec<Partition> {
    let mut order: Vec<&FileChunks> = files.iter().collect();
    order.sort_by(|a, b| b.total_bytes().cmp(&a.total_bytes()).then(a.id().cmp(&b.id())));

    let mut partitions: Vec<Partition> = (0..g).map(|_| Partition::new()).collect();
    let mut sizes = vec![0u64; g];

    for file in order {
        let bin = lightest_bin(&sizes);
        sizes[bin] += file.total_bytes();
        let source_map: Vec<SourceMapEntry> = file
            .chunks()
            .iter()
            .enumerate()
            .map(|(idx, &size)| SourceMapEntry {
                orig_file_id: file.id(),
                orig_chunk_idx: idx,
                size,
            })
            .collect();
        partitions[bin].push(file.clone(), source_map);
    }

    partitions
}

fn partition_by_chunks(files: &[FileChunks], g: usize) -> Vec<Partition> {
    let mut units: Vec<WorkUnit> = files
        .iter()
        .flat_map(|f| {
            f.chunks().iter().enumerate().filter_map(move |(idx, &size)| {
                if size == 0 {
                    None
                } else {
                    Some(WorkUnit {
                        path: f.path().to_string(),
                        file_offset: f.chunk_offset(idx),
                        size,
                        orig_file_id: f.id(),
                        orig_chunk_idx: idx,
                    })
                }
            })
        })
        .collect();

    units.par_sort_unstable_by(|a, b| {
        b.size
            .cmp(&a.size)
            .then(a.orig_file_id.cmp(&b.orig_file_id))
            .then(a.orig_chunk_idx.cmp(&b.orig_chunk_idx))
    });

    let mut bins: Vec<Vec<WorkUnit>> = (0..g).map(|_| Vec::new()).collect();
    let mut sizes = vec![0u64; g];
    for unit in units {
        let bin = lightest_bin(&sizes);
        sizes[bin] += unit.size;
        bins[bin].push(unit);
    }

    let mut next_synthetic_id = 0u64;
    bins.into_iter()
        .map(|mut units| {
            units.sort_by(|a, b| a.path.cmp(&b.path).then(a.file_offset.cmp(&b.file_offset)));

            let mut partition = Partition::new();
            let mut idx = 0;
            while idx < units.len() {
                let start = idx;
                let mut end = idx + 1;
                while end < units.len()
                    && units[end].path == units[start].path
                    && units[end].file_offset
                        == units[end - 1].file_offset + units[end - 1].size
                {
                    end += 1;
                }

                let run = &units[start..end];
                let chunk_sizes: Vec<u64> = run.iter().map(|u| u.size).collect();
                let source_map: Vec<SourceMapEntry> = run
                    .iter()
                    .map(|u| SourceMapEntry {
                        orig_file_id: u.orig_file_id,
                        orig_chunk_idx: u.orig_chunk_idx,
                        size: u.size,
                    })
                    .collect();

                let synthetic = FileChunks::new(
                    next_synthetic_id,
                    run[0].path.clone(),
                    run[0].file_offset,
                    chunk_sizes,
                )
                .expect("merged run is always non-empty");
                next_synthetic_id += 1;

                partition.push(synthetic, source_map);
                idx = end;
            }

            partition
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: u64, offset: u64, chunks: Vec<u64>) -> FileChunks {
        FileChunks::new(id, format!("file-{id}"), offset, chunks).unwrap()
    }

    #[test]
    fn many_files_uses_partition_by_files() {
        let files = vec![file(1, 0, vec![100]), file(2, 0, vec![200]), file(3, 0, vec![50])];
        let partitions = Partitioner::partition(&files, 3).unwrap();
        assert_eq!(partitions.len(), 3);
        let total: u64 = partitions.iter().map(|p| p.total_bytes()).sum();
        assert_eq!(total, 350);
    }

    #[test]
    fn few_files_many_ranks_uses_partition_by_chunks() {
        // From spec.md scenario 6: G = 3, totals 1300 bytes, expected
        // per-peer totals {450, 420, 430} in some order.
        let files = vec![
            file(1, 1000, vec![100, 50, 200]),
            file(2, 0, vec![400]),
            file(3, 5000, vec![80, 20]),
            file(4, 800, vec![300, 150]),
        ];
        let partitions = Partitioner::partition(&files, 3).unwrap();
        assert_eq!(partitions.len(), 3);

        let mut totals: Vec<u64> = partitions.iter().map(|p| p.total_bytes()).collect();
        totals.sort_unstable();
        assert_eq!(totals, vec![420, 430, 450]);
        assert_eq!(totals.iter().sum::<u64>(), 1300);

        // Every original (file_id, chunk_idx) appears on exactly one peer.
        let mut seen = std::collections::HashSet::new();
        for partition in &partitions {
            for (file_slot, f) in partition.files().iter().enumerate() {
                for chunk_idx in 0..f.chunks().len() {
                    let source = partition.source_of(file_slot, chunk_idx).unwrap();
                    assert!(
                        seen.insert((source.orig_file_id, source.orig_chunk_idx)),
                        "duplicate coordinate"
                    );
                }
            }
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn partition_is_deterministic() {
        let files = vec![file(1, 1000, vec![100, 50, 200]), file(2, 0, vec![400])];
        let a = Partitioner::partition(&files, 3).unwrap();
        let b = Partitioner::partition(&files, 3).unwrap();
        let totals_a: Vec<u64> = a.iter().map(|p| p.total_bytes()).collect();
        let totals_b: Vec<u64> = b.iter().map(|p| p.total_bytes()).collect();
        assert_eq!(totals_a, totals_b);
    }

    #[test]
    fn rejects_duplicate_file_ids() {
        let files = vec![file(1, 0, vec![10]), file(1, 0, vec![20])];
        let err = Partitioner::partition(&files, 2).unwrap_err();
        assert!(matches!(err, StreamerError::InvalidInput(_)));
    }

    #[test]
    fn policy_override_forces_chunk_partitioning_even_with_many_files() {
        let files = vec![file(1, 0, vec![10]), file(2, 0, vec![20]), file(3, 0, vec![30])];
        let by_files = Partitioner::partition_with_policy(&files, 2, Some(PartitionPolicy::Files)).unwrap();
        let by_chunks =
            Partitioner::partition_with_policy(&files, 2, Some(PartitionPolicy::Chunks)).unwrap();
        // Both conserve total bytes; they need not agree bin-for-bin.
        let total_files: u64 = by_files.iter().map(|p| p.total_bytes()).sum();
        let total_chunks: u64 = by_chunks.iter().map(|p| p.total_bytes()).sum();
        assert_eq!(total_files, 60);
        assert_eq!(total_chunks, 60);
    }

    use proptest::prelude::*;

    fn files_strategy() -> impl Strategy<Value = Vec<FileChunks>> {
        prop::collection::vec(prop::collection::vec(1u64..200, 1..6), 1..6).prop_map(|chunk_lists| {
            chunk_lists
                .into_iter()
                .enumerate()
                .map(|(idx, chunks)| file(idx as u64, 0, chunks))
                .collect()
        })
    }

    fn coordinates(partitions: &[Partition]) -> Vec<(u64, usize)> {
        let mut result = Vec::new();
        for partition in partitions {
            for (file_slot, f) in partition.files().iter().enumerate() {
                for chunk_idx in 0..f.chunks().len() {
                    let source = partition.source_of(file_slot, chunk_idx).unwrap();
                    result.push((source.orig_file_id, source.orig_chunk_idx));
                }
            }
        }
        result
    }

    proptest! {
        // spec §8.1 "Partition conservation"/"Partition determinism":
        // every original coordinate lands on exactly one peer, and
        // repeated calls on the same input agree on per-peer totals.
        #[test]
        fn conservation_and_determinism_hold_for_any_partition(
            files in files_strategy(),
            g in 1usize..5,
        ) {
            let expected: std::collections::HashSet<(u64, usize)> = files
                .iter()
                .flat_map(|f| (0..f.chunks().len()).map(move |i| (f.id(), i)))
                .collect();

            let a = Partitioner::partition(&files, g).unwrap();
            let b = Partitioner::partition(&files, g).unwrap();

            let coords_a = coordinates(&a);
            let seen_a: std::collections::HashSet<(u64, usize)> = coords_a.iter().copied().collect();
            prop_assert_eq!(coords_a.len(), expected.len(), "no coordinate may repeat or be dropped");
            prop_assert_eq!(seen_a, expected);

            let totals_a: Vec<u64> = a.iter().map(|p| p.total_bytes()).collect();
            let totals_b: Vec<u64> = b.iter().map(|p| p.total_bytes()).collect();
            prop_assert_eq!(totals_a, totals_b, "repeated partition calls must agree on per-peer totals");
        }
    }
}
