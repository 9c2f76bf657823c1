/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! One-to-all distribution of the graph topology.
//!
//! The coordinator (rank 0) holds the authoritative graph after ingestion;
//! [`broadcast_graph`] replicates it so that every rank ends up with a
//! bit-identical private copy. The protocol is a fixed sequence of
//! collectives, each a group-wide synchronization point:
//!
//! 1. the vertex count, or a negative sentinel if the coordinator has no
//!    graph — in that case every rank returns [`DistributeError::NoGraph`]
//!    and the whole run fails together instead of hanging;
//! 2. the edge-slot count;
//! 3. (non-coordinators) allocation of the offsets and edge buffers, before
//!    any bulk data arrives; a failed allocation aborts the whole group;
//! 4. the offsets array, in a single collective;
//! 5. the edge array, in chunks of at most
//!    [`max_msg_len`](Communicator::max_msg_len) elements, since its length
//!    may exceed what one collective can move; the final chunk may be
//!    partial, and elements land at the cumulative offset already
//!    transferred, so ordering is preserved exactly.
//!
//! Labels are not part of the transfer: every rank initializes its own
//! identity label array with [`identity_labels`].

use crate::comm::{CommError, Communicator};
use crate::graph::Csr;
use log::debug;
use std::collections::TryReserveError;

/// Sentinel vertex count broadcast when the coordinator has no graph.
const NO_GRAPH: i64 = -1;

/// Errors of the distribution protocol.
#[derive(Debug, thiserror::Error)]
pub enum DistributeError {
    /// The coordinator had no graph to distribute (ingestion failed).
    #[error("the coordinator has no graph to distribute")]
    NoGraph,
    /// A core buffer could not be allocated. This is always fatal for the
    /// whole group: a group in which only some ranks hold a graph cannot
    /// execute the collective protocol.
    #[error("cannot allocate the {what} buffer")]
    Alloc {
        /// The buffer that could not be allocated.
        what: &'static str,
        /// The underlying allocator error.
        #[source]
        source: TryReserveError,
    },
    /// A collective failed, group-wide.
    #[error(transparent)]
    Comm(#[from] CommError),
}

fn try_alloc<T: Clone + Default>(
    len: usize,
    what: &'static str,
) -> Result<Vec<T>, DistributeError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|source| DistributeError::Alloc { what, source })?;
    buf.resize(len, T::default());
    Ok(buf)
}

/// Replicates the coordinator's graph on every rank of the group.
///
/// The coordinator passes `Some(graph)` (or `None` if ingestion failed,
/// which fails the whole group); every other rank passes `None`. On success
/// every rank owns a graph bit-identical to the coordinator's.
pub fn broadcast_graph(
    comm: &impl Communicator,
    graph: Option<Csr>,
) -> Result<Csr, DistributeError> {
    let root = 0;
    let is_root = comm.rank() == root;

    let mut header = [match &graph {
        Some(g) => g.num_nodes() as i64,
        None => NO_GRAPH,
    }];
    comm.broadcast(root, &mut header)?;
    if header[0] < 0 {
        return Err(DistributeError::NoGraph);
    }
    let num_nodes = header[0] as usize;

    let mut header = [graph.as_ref().map_or(0, |g| g.num_edge_slots() as i64)];
    comm.broadcast(root, &mut header)?;
    let num_edge_slots = header[0] as usize;

    let (mut offsets, mut edges) = match graph {
        Some(g) => {
            let (_, offsets, edges) = g.into_parts();
            (offsets.into_vec(), edges.into_vec())
        }
        None => {
            debug_assert!(!is_root);
            (
                try_alloc::<u64>(num_nodes + 1, "offsets")?,
                try_alloc::<u32>(num_edge_slots, "edges")?,
            )
        }
    };

    comm.broadcast(root, &mut offsets)?;

    let chunk = comm.max_msg_len();
    let mut sent = 0;
    while sent < num_edge_slots {
        let len = chunk.min(num_edge_slots - sent);
        comm.broadcast(root, &mut edges[sent..sent + len])?;
        sent += len;
    }
    debug!(
        "rank {}: received {} nodes, {} edge slots",
        comm.rank(),
        num_nodes,
        num_edge_slots
    );

    // SAFETY: the parts are bit-identical to the coordinator's, which were
    // produced by a valid graph.
    Ok(unsafe { Csr::from_parts(num_nodes, offsets.into(), edges.into()) })
}

/// Allocates the identity label array of a rank.
///
/// Every rank calls this independently after [`broadcast_graph`]; labels are
/// never transferred during distribution.
pub fn identity_labels(num_nodes: usize) -> Result<Vec<u32>, DistributeError> {
    let mut labels = Vec::new();
    labels
        .try_reserve_exact(num_nodes)
        .map_err(|source| DistributeError::Alloc {
            what: "labels",
            source,
        })?;
    labels.extend(0..num_nodes as u32);
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_labels() {
        assert_eq!(identity_labels(5).unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(identity_labels(0).unwrap().is_empty());
    }

    #[test]
    fn test_allocation_failure() {
        // An impossible reservation must surface as the allocation error,
        // never as an abort or a panic
        assert!(matches!(
            identity_labels(usize::MAX),
            Err(DistributeError::Alloc { what: "labels", .. })
        ));
        assert!(matches!(
            try_alloc::<u32>(usize::MAX, "edges"),
            Err(DistributeError::Alloc { what: "edges", .. })
        ));
    }
}
