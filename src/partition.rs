/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Static partitioning of the vertex id space across ranks.
//!
//! The split is a pure function of the number of nodes and the group size,
//! so every rank computes the same assignment locally and no range is ever
//! communicated. It never changes during a run: ranks and partitions are a
//! fixed a-priori agreement, and a group whose ranks disagree on either is a
//! programming error with undefined behavior at the protocol level, not a
//! runtime-recoverable condition.

use std::ops::Range;

/// Returns the contiguous vertex range owned by `rank`.
///
/// Every rank owns `num_nodes / num_ranks` vertices, except the last one,
/// which also takes the remainder.
pub fn rank_range(num_nodes: usize, num_ranks: usize, rank: usize) -> Range<usize> {
    debug_assert!(rank < num_ranks);
    let chunk = num_nodes / num_ranks;
    let start = rank * chunk;
    let end = if rank == num_ranks - 1 {
        num_nodes
    } else {
        start + chunk
    };
    start..end
}

/// Returns the per-rank element counts and displacements of the label
/// exchange, in rank order.
pub fn counts_displs(num_nodes: usize, num_ranks: usize) -> (Vec<usize>, Vec<usize>) {
    (0..num_ranks)
        .map(|rank| {
            let range = rank_range(num_nodes, num_ranks, rank);
            (range.len(), range.start)
        })
        .unzip()
}
