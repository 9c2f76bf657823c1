/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Blocking collectives over a group of cooperating ranks.
//!
//! Ranks never exchange point-to-point messages: the whole protocol of this
//! crate is expressed through the collectives of the [`Communicator`] trait,
//! which every rank of a group must call in the same order with compatible
//! arguments. A collective returns only once the group-wide data movement it
//! describes has completed from the caller's point of view; there are no
//! non-blocking variants and no cancellation.
//!
//! [`LocalGroup`] is the bundled transport: it runs each rank on its own
//! thread and moves frames over a full mesh of unbounded channels. A rank
//! that bails out of the group drops its endpoints, and every peer blocked
//! on a collective observes the disconnection as [`CommError::Aborted`]:
//! a single failing rank thus takes the whole group down, which is exactly
//! the fail-fast policy this crate wants.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Errors returned by collectives.
#[derive(Debug, thiserror::Error)]
pub enum CommError {
    /// A peer left the group, so the collective can never complete.
    #[error("process group aborted: a peer disconnected")]
    Aborted,
    /// A collective received a frame whose type or length does not match the
    /// receive buffer. This means the group is not calling collectives in
    /// the same order with compatible arguments, which is a programming
    /// error, not a recoverable condition.
    #[error("collective protocol mismatch")]
    Protocol,
    /// A single collective was asked to move more elements than the
    /// transport allows. Callers moving large arrays must chunk them by
    /// [`max_msg_len`](Communicator::max_msg_len).
    #[error("message of {len} elements exceeds the transport maximum of {max}")]
    MsgTooLong {
        /// The requested element count.
        len: usize,
        /// The transport maximum.
        max: usize,
    },
}

/// A typed unit of collective traffic.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A slice of 32-bit node ids or labels.
    U32(Vec<u32>),
    /// A slice of 64-bit offsets.
    U64(Vec<u64>),
    /// A slice of signed 64-bit header values.
    I64(Vec<i64>),
    /// A reduction flag.
    Bool(bool),
}

/// Element types that can travel in a collective.
pub trait CommElem: Copy + Send + 'static {
    /// Packs a slice into a frame.
    fn pack(data: &[Self]) -> Frame;
    /// Unpacks a frame into a buffer of the same length.
    fn unpack(frame: Frame, dst: &mut [Self]) -> Result<(), CommError>;
}

macro_rules! impl_comm_elem {
    ($ty:ty, $variant:ident) => {
        impl CommElem for $ty {
            fn pack(data: &[Self]) -> Frame {
                Frame::$variant(data.to_vec())
            }

            fn unpack(frame: Frame, dst: &mut [Self]) -> Result<(), CommError> {
                match frame {
                    Frame::$variant(data) if data.len() == dst.len() => {
                        dst.copy_from_slice(&data);
                        Ok(())
                    }
                    _ => Err(CommError::Protocol),
                }
            }
        }
    };
}

impl_comm_elem!(u32, U32);
impl_comm_elem!(u64, U64);
impl_comm_elem!(i64, I64);

/// The collectives a group of ranks communicates through.
///
/// All methods are blocking and must be called by every rank of the group in
/// the same order. The buffer of [`broadcast`](Communicator::broadcast) is
/// read on the root and overwritten everywhere else, as in the classic
/// single-buffer collective signatures.
pub trait Communicator {
    /// Returns the rank of this endpoint in the group.
    fn rank(&self) -> usize;

    /// Returns the number of ranks in the group.
    fn num_ranks(&self) -> usize;

    /// Returns the maximum number of elements a single collective may move.
    ///
    /// Transfers larger than this must be split into chunks by the caller;
    /// the limit is a property of the transport, not of the protocol.
    fn max_msg_len(&self) -> usize;

    /// Replicates `data` from rank `root` to every rank of the group.
    fn broadcast<T: CommElem>(&self, root: usize, data: &mut [T]) -> Result<(), CommError>;

    /// Exchanges per-rank slices of a shared array.
    ///
    /// Rank `r` contributes `data[displs[r]..displs[r] + counts[r]]`; on
    /// return every rank holds every other rank's contribution in place.
    /// The counts may differ across ranks, but every rank must pass the
    /// same `counts` and `displs`.
    fn all_gather_varying<T: CommElem>(
        &self,
        data: &mut [T],
        counts: &[usize],
        displs: &[usize],
    ) -> Result<(), CommError>;

    /// Reduces one boolean per rank with logical OR and returns the result
    /// on every rank.
    fn all_reduce_or(&self, value: bool) -> Result<bool, CommError>;

    /// Blocks until every rank of the group has entered the barrier.
    fn barrier(&self) -> Result<(), CommError>;
}

/// The in-process transport: one thread per rank, a full mesh of channels.
///
/// The default [`max_msg_len`](Communicator::max_msg_len) is the classic
/// 32-bit collective element-count limit, so code chunked for this transport
/// is chunked correctly for a message-passing one;
/// [`with_max_msg_len`](LocalGroup::with_max_msg_len) can shrink it to
/// exercise chunking in tests.
pub struct LocalGroup;

/// The default maximum number of elements per collective.
pub const DEFAULT_MAX_MSG_LEN: usize = i32::MAX as usize;

impl LocalGroup {
    /// Creates the endpoints of a group of `num_ranks` ranks.
    pub fn new(num_ranks: usize) -> Vec<LocalComm> {
        Self::with_max_msg_len(num_ranks, DEFAULT_MAX_MSG_LEN)
    }

    /// Creates the endpoints of a group with a custom per-collective
    /// element-count limit.
    pub fn with_max_msg_len(num_ranks: usize, max_msg_len: usize) -> Vec<LocalComm> {
        assert!(num_ranks > 0, "a group must have at least one rank");
        let mut grid_tx = Vec::with_capacity(num_ranks);
        let mut rx_cols: Vec<Vec<Receiver<Frame>>> =
            (0..num_ranks).map(|_| Vec::with_capacity(num_ranks)).collect();
        for _src in 0..num_ranks {
            let mut row_tx = Vec::with_capacity(num_ranks);
            for dst in 0..num_ranks {
                let (tx, rx) = unbounded();
                row_tx.push(tx);
                rx_cols[dst].push(rx);
            }
            grid_tx.push(row_tx);
        }
        grid_tx
            .into_iter()
            .zip(rx_cols)
            .enumerate()
            .map(|(rank, (txs, rxs))| LocalComm {
                rank,
                txs,
                rxs,
                max_msg_len,
            })
            .collect()
    }

    /// Runs `f` on every rank of a fresh group of `num_ranks` ranks, each on
    /// its own thread, and returns the per-rank results in rank order.
    pub fn run<R, F>(num_ranks: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(LocalComm) -> R + Send + Sync,
    {
        let comms = Self::new(num_ranks);
        std::thread::scope(|scope| {
            let handles = comms
                .into_iter()
                .map(|comm| {
                    let f = &f;
                    scope.spawn(move || f(comm))
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                })
                .collect()
        })
    }
}

/// One rank's endpoint of a [`LocalGroup`].
pub struct LocalComm {
    rank: usize,
    /// `txs[r]` sends to rank `r`; the entry for this rank is never used.
    txs: Vec<Sender<Frame>>,
    /// `rxs[r]` receives from rank `r`; the entry for this rank is never used.
    rxs: Vec<Receiver<Frame>>,
    max_msg_len: usize,
}

impl LocalComm {
    fn check_len(&self, len: usize) -> Result<(), CommError> {
        if len > self.max_msg_len {
            return Err(CommError::MsgTooLong {
                len,
                max: self.max_msg_len,
            });
        }
        Ok(())
    }

    fn send(&self, dst: usize, frame: Frame) -> Result<(), CommError> {
        self.txs[dst].send(frame).map_err(|_| CommError::Aborted)
    }

    fn recv(&self, src: usize) -> Result<Frame, CommError> {
        self.rxs[src].recv().map_err(|_| CommError::Aborted)
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_ranks(&self) -> usize {
        self.txs.len()
    }

    fn max_msg_len(&self) -> usize {
        self.max_msg_len
    }

    fn broadcast<T: CommElem>(&self, root: usize, data: &mut [T]) -> Result<(), CommError> {
        self.check_len(data.len())?;
        if self.rank == root {
            let frame = T::pack(data);
            for dst in 0..self.num_ranks() {
                if dst != root {
                    self.send(dst, frame.clone())?;
                }
            }
            Ok(())
        } else {
            T::unpack(self.recv(root)?, data)
        }
    }

    fn all_gather_varying<T: CommElem>(
        &self,
        data: &mut [T],
        counts: &[usize],
        displs: &[usize],
    ) -> Result<(), CommError> {
        let num_ranks = self.num_ranks();
        debug_assert_eq!(counts.len(), num_ranks);
        debug_assert_eq!(displs.len(), num_ranks);
        let me = self.rank;
        self.check_len(counts[me])?;

        let frame = T::pack(&data[displs[me]..displs[me] + counts[me]]);
        for dst in 0..num_ranks {
            if dst != me {
                self.send(dst, frame.clone())?;
            }
        }
        for src in 0..num_ranks {
            if src != me {
                let frame = self.recv(src)?;
                T::unpack(frame, &mut data[displs[src]..displs[src] + counts[src]])?;
            }
        }
        Ok(())
    }

    fn all_reduce_or(&self, value: bool) -> Result<bool, CommError> {
        let num_ranks = self.num_ranks();
        let me = self.rank;
        for dst in 0..num_ranks {
            if dst != me {
                self.send(dst, Frame::Bool(value))?;
            }
        }
        let mut result = value;
        for src in 0..num_ranks {
            if src != me {
                match self.recv(src)? {
                    Frame::Bool(other) => result |= other,
                    _ => return Err(CommError::Protocol),
                }
            }
        }
        Ok(result)
    }

    fn barrier(&self) -> Result<(), CommError> {
        // A no-op reduction completes exactly when every rank has entered.
        self.all_reduce_or(false).map(|_| ())
    }
}
