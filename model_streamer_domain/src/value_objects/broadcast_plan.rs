// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # BroadcastPlan Value Object
//!
//! The shape of one distributed `stream_files` session: the world
//! size, this peer's rank, and the global ranks participating in the
//! broadcast subgroup. Every peer independently computes an identical
//! plan from the same group-formation inputs.

use crate::error::StreamerError;
use serde::{Deserialize, Serialize};

/// World size and this peer's position within a broadcast subgroup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastPlan {
    world_size: usize,
    rank: usize,
    participating_ranks: Vec<usize>,
}

impl BroadcastPlan {
    pub fn new(
        world_size: usize,
        rank: usize,
        participating_ranks: Vec<usize>,
    ) -> Result<Self, StreamerError> {
        if world_size == 0 {
            return Err(StreamerError::InvalidInput(
                "broadcast plan world size must be positive".into(),
            ));
        }
        if rank >= world_size {
            return Err(StreamerError::InvalidInput(format!(
                "rank {rank} out of range for world size {world_size}"
            )));
        }
        if participating_ranks.len() != world_size {
            return Err(StreamerError::InvalidInput(format!(
                "expected {world_size} participating ranks, got {}",
                participating_ranks.len()
            )));
        }
        Ok(Self {
            world_size,
            rank,
            participating_ranks,
        })
    }

    /// A single-peer (non-distributed) plan: world size 1, rank 0.
    pub fn single_peer() -> Self {
        Self {
            world_size: 1,
            rank: 0,
            participating_ranks: vec![0],
        }
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn participating_ranks(&self) -> &[usize] {
        &self.participating_ranks
    }

    pub fn is_distributed(&self) -> bool {
        self.world_size > 1
    }

    /// The global rank broadcasting during round `round` (`round` is
    /// this subgroup's local sender slot, `0..world_size`).
    pub fn sender_for_round(&self, round: usize) -> Option<usize> {
        self.participating_ranks.get(round).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_peer_plan_is_not_distributed() {
        let plan = BroadcastPlan::single_peer();
        assert!(!plan.is_distributed());
        assert_eq!(plan.world_size(), 1);
    }

    #[test]
    fn rejects_rank_out_of_range() {
        assert!(BroadcastPlan::new(2, 5, vec![0, 1]).is_err());
    }

    #[test]
    fn sender_for_round_follows_participating_ranks_order() {
        let plan = BroadcastPlan::new(3, 1, vec![2, 0, 1]).unwrap();
        assert_eq!(plan.sender_for_round(0), Some(2));
        assert_eq!(plan.sender_for_round(2), Some(1));
        assert_eq!(plan.sender_for_round(3), None);
    }
}
