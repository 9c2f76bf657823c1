/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The hybrid propagation engine and the final component count.
//!
//! [`propagate`] lowers, in place, the label of every vertex to the minimum
//! label reachable within its connected component, by synchronized rounds of
//! minimum-label relaxation. Each round has three steps:
//!
//! 1. **local relaxation**: the rank's owned vertex range is mapped in
//!    data-parallel over the thread pool; each vertex takes the minimum
//!    label of its neighborhood;
//! 2. **label exchange**: a variable-count all-gather keyed by the static
//!    per-rank ranges, after which every rank holds every other rank's
//!    updates of the round;
//! 3. **convergence check**: one logical-OR reduction of the per-rank
//!    changed flags. The loop runs while any rank changed anything, and its
//!    state is global: because the reduction is a flat, once-per-round
//!    rendezvous with no early exit, every rank leaves the loop on the same
//!    round and the round count is deterministic for a given group size.
//!
//! The smallest label of a component propagates outward by at least one hop
//! per round, so the loop terminates in at most diameter-many rounds, and at
//! the fixed point a vertex's label is the smallest vertex id of its
//! component.
//!
//! # Races
//!
//! Within a round, workers write only vertices of their own disjoint
//! sub-ranges but read the labels of arbitrary neighbors, which other
//! workers (and, for out-of-partition vertices, other ranks between the
//! previous exchange and this one) may still be lowering. The race is
//! benign: labels only ever decrease, so a stale read merely observes a
//! too-large value, which can defer an improvement to a later round but
//! never produces a wrong one. A too-small value can never be observed,
//! since no writer ever stores anything below the component minimum. The
//! label array is therefore shared through [`SyncCell`]s, with no locking
//! anywhere.
//!
//! [`SyncCell`]: sync_cell_slice::SyncCell

use crate::comm::{CommError, Communicator};
use crate::graph::Csr;
use crate::partition::{counts_displs, rank_range};
use dsi_progress_logger::ProgressLog;
use rayon::prelude::*;
use rayon::ThreadPool;
use sync_cell_slice::SyncSlice;

/// Minimum number of vertices a parallel relaxation task processes.
const RAYON_MIN_LEN: usize = 10_000;

/// Runs minimum-label propagation to convergence and returns the number of
/// rounds executed.
///
/// Every rank of the group must call this with a bit-identical graph, its
/// own identity-initialized label array, and its own thread pool; on return
/// the label arrays of all ranks are identical and hold, for every vertex,
/// the smallest vertex id of its component. An already-converged label
/// array is left untouched and the loop exits after a single round.
pub fn propagate(
    graph: &Csr,
    labels: &mut [u32],
    comm: &impl Communicator,
    thread_pool: &ThreadPool,
    pl: &mut impl ProgressLog,
) -> Result<usize, CommError> {
    let num_nodes = graph.num_nodes();
    assert_eq!(labels.len(), num_nodes);
    let (counts, displs) = counts_displs(num_nodes, comm.num_ranks());
    let owned = rank_range(num_nodes, comm.num_ranks(), comm.rank());

    pl.item_name("round");
    pl.start("Propagating minimum labels...");

    let mut rounds = 0;
    loop {
        let labels_sync = labels.as_sync_slice();
        let local_changed = thread_pool.install(|| {
            owned
                .clone()
                .into_par_iter()
                .with_min_len(RAYON_MIN_LEN)
                .map(|node| {
                    // SAFETY: each parallel task writes only nodes of its own
                    // sub-range, and no rank writes outside its owned range.
                    // Concurrent reads of neighbor labels are benign races:
                    // labels decrease monotonically, so a stale value is only
                    // ever too large (see the module documentation).
                    unsafe {
                        let mut label = labels_sync[node].get();
                        let mut changed = false;
                        for &succ in graph.successors(node) {
                            let other = labels_sync[succ as usize].get();
                            if other < label {
                                label = other;
                                changed = true;
                            }
                        }
                        if changed {
                            labels_sync[node].set(label);
                        }
                        changed
                    }
                })
                .reduce(|| false, |a, b| a | b)
        });

        // Deliver this round's owned-range updates to every rank before
        // anyone may start the next round.
        comm.all_gather_varying(labels, &counts, &displs)?;
        let global_changed = comm.all_reduce_or(local_changed)?;

        rounds += 1;
        pl.update();
        if !global_changed {
            break;
        }
    }

    pl.done();
    Ok(rounds)
}

/// Counts the connected components of a converged label array.
///
/// A vertex whose label is still its own id is the minimum of its component,
/// so the number of such vertices is the number of components. Only the
/// coordinator needs to call this.
pub fn count_components(labels: &[u32]) -> usize {
    labels
        .par_iter()
        .enumerate()
        .filter(|&(node, &label)| label as usize == node)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_components() {
        assert_eq!(count_components(&[0, 0, 0, 3, 3, 5]), 3);
        assert_eq!(count_components(&[0, 1, 2, 3]), 4);
        assert_eq!(count_components(&[]), 0);
    }
}
