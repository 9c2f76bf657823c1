/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The in-memory graph store.

use epserde::Epserde;

/// A compressed sparse-row symmetric graph.
///
/// The topology is stored as an offsets array of `num_nodes + 1` elements
/// and a flat successor array: the successors of node `v` occupy the slots
/// `offsets[v]..offsets[v + 1]`. Every undirected edge `(u, v)` occupies two
/// slots, one in each endpoint's slice, and there are no self-loops, so
/// [`num_edge_slots`](Csr::num_edge_slots) is twice the number of undirected
/// edges.
///
/// Offsets are 64-bit wide because the number of edge slots of large graphs
/// exceeds 32 bits; node ids are 32-bit wide to halve the memory (and
/// transfer) footprint of the successor array.
///
/// The topology is immutable after construction and freely shared across
/// threads and ranks without locking.
#[derive(Debug, Clone, PartialEq, Eq, Epserde)]
pub struct Csr {
    num_nodes: usize,
    offsets: Box<[u64]>,
    edges: Box<[u32]>,
}

impl Csr {
    /// Creates a graph from its raw parts.
    ///
    /// # Safety
    ///
    /// `offsets` must have `num_nodes + 1` monotonically non-decreasing
    /// elements, with `offsets[0] == 0` and `offsets[num_nodes] ==
    /// edges.len()`, and every element of `edges` must be smaller than
    /// `num_nodes`.
    pub unsafe fn from_parts(num_nodes: usize, offsets: Box<[u64]>, edges: Box<[u32]>) -> Self {
        debug_assert!(num_nodes <= u32::MAX as usize);
        debug_assert_eq!(offsets.len(), num_nodes + 1);
        debug_assert_eq!(offsets.first().copied(), Some(0));
        debug_assert_eq!(offsets.last().copied(), Some(edges.len() as u64));
        Self {
            num_nodes,
            offsets,
            edges,
        }
    }

    /// Creates a graph from a list of undirected edges.
    ///
    /// Every edge is stored in both endpoints' successor slices; self-loops
    /// and pairs referencing nodes outside `0..num_nodes` are silently
    /// dropped. Parallel edges are kept, as they do not change the result of
    /// component computations.
    pub fn from_edges(num_nodes: usize, list: &[(usize, usize)]) -> Self {
        let keep = |&&(u, v): &&(usize, usize)| u < num_nodes && v < num_nodes && u != v;

        let mut degrees = vec![0u64; num_nodes];
        for &(u, v) in list.iter().filter(keep) {
            degrees[u] += 1;
            degrees[v] += 1;
        }

        let mut offsets = Vec::with_capacity(num_nodes + 1);
        let mut cumul = 0u64;
        offsets.push(0);
        for &d in &degrees {
            cumul += d;
            offsets.push(cumul);
        }

        let mut edges = vec![0u32; cumul as usize];
        let mut cursor = offsets[..num_nodes].to_vec();
        for &(u, v) in list.iter().filter(keep) {
            edges[cursor[u] as usize] = v as u32;
            cursor[u] += 1;
            edges[cursor[v] as usize] = u as u32;
            cursor[v] += 1;
        }

        unsafe { Self::from_parts(num_nodes, offsets.into(), edges.into()) }
    }

    /// Returns the number of nodes of the graph.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Returns the number of directed edge slots, that is, twice the number
    /// of undirected edges.
    pub fn num_edge_slots(&self) -> u64 {
        self.edges.len() as u64
    }

    /// Returns the successors of a node.
    #[inline(always)]
    pub fn successors(&self, node: usize) -> &[u32] {
        &self.edges[self.offsets[node] as usize..self.offsets[node + 1] as usize]
    }

    /// Returns the degree of a node.
    #[inline(always)]
    pub fn outdegree(&self, node: usize) -> usize {
        (self.offsets[node + 1] - self.offsets[node]) as usize
    }

    /// Returns the offsets array.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Returns the flat successor array.
    pub fn edges(&self) -> &[u32] {
        &self.edges
    }

    /// Consumes the graph and returns its raw parts.
    pub fn into_parts(self) -> (usize, Box<[u64]>, Box<[u32]>) {
        (self.num_nodes, self.offsets, self.edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_edges() {
        let g = Csr::from_edges(4, &[(0, 1), (2, 1), (3, 3), (0, 7)]);
        assert_eq!(g.num_nodes(), 4);
        // (3, 3) is a self-loop and (0, 7) is out of range
        assert_eq!(g.num_edge_slots(), 4);
        assert_eq!(g.successors(0), &[1]);
        assert_eq!(g.successors(1), &[0, 2]);
        assert_eq!(g.outdegree(1), 2);
        assert_eq!(g.successors(2), &[1]);
        assert!(g.successors(3).is_empty());
    }

    #[test]
    fn test_empty() {
        let g = Csr::from_edges(0, &[]);
        assert_eq!(g.num_nodes(), 0);
        assert_eq!(g.num_edge_slots(), 0);
        assert_eq!(g.offsets(), &[0]);
    }
}
