//! Data-parallel coordination between cooperating workers.
//!
//! Every worker owns a full replica of the network. Workers split each batch
//! (and each evaluation pass) by contiguous index range with [`partition`],
//! and meet at three kinds of blocking collective:
//!
//! 1. broadcast of the initial parameters from worker 0,
//! 2. broadcast of each epoch's shuffled order from worker 0,
//! 3. sum-reduction of gradients after every batch and of loss/correct counts
//!    after every evaluation.
//!
//! The [`Communicator`] trait is the seam. [`SingleProcess`] is the world of
//! one; [`ChannelCommunicator`] connects worker threads with `crossbeam`
//! channels.

pub mod channel;
mod single;

pub use channel::{channel_group, run_workers, ChannelCommunicator};
pub use single::SingleProcess;

use crate::error::CollectiveError;
use std::ops::Range;

/// Blocking collective operations over a fixed group of workers.
///
/// All workers must issue the same collectives in the same order with
/// buffers of the same length. There is no timeout; a vanished peer is
/// reported as [`CollectiveError::Disconnected`].
pub trait Communicator {
    /// Index of this worker in `0..world_size()`.
    fn rank(&self) -> usize;

    /// Number of workers in the group.
    fn world_size(&self) -> usize;

    /// Replace `values` on every worker with the elementwise sum over all
    /// workers. Every worker receives a bit-identical result.
    fn all_reduce_sum(&mut self, values: &mut [f64]) -> Result<(), CollectiveError>;

    /// Overwrite `values` on every worker with the contents held by `root`.
    fn broadcast_values(&mut self, values: &mut [f64], root: usize) -> Result<(), CollectiveError>;

    /// Overwrite `indices` on every worker with the contents held by `root`.
    fn broadcast_indices(
        &mut self,
        indices: &mut [usize],
        root: usize,
    ) -> Result<(), CollectiveError>;

    /// Whether this worker is the root of the group.
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

impl<C: Communicator + ?Sized> Communicator for &mut C {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn world_size(&self) -> usize {
        (**self).world_size()
    }

    fn all_reduce_sum(&mut self, values: &mut [f64]) -> Result<(), CollectiveError> {
        (**self).all_reduce_sum(values)
    }

    fn broadcast_values(&mut self, values: &mut [f64], root: usize) -> Result<(), CollectiveError> {
        (**self).broadcast_values(values, root)
    }

    fn broadcast_indices(
        &mut self,
        indices: &mut [usize],
        root: usize,
    ) -> Result<(), CollectiveError> {
        (**self).broadcast_indices(indices, root)
    }
}

/// The contiguous slice of `0..total` assigned to `rank`.
///
/// Every rank gets `total / world_size` items; the last rank also takes the
/// remainder.
///
/// # Example
///
/// ```
/// use seqnet::distributed::partition;
///
/// assert_eq!(partition(10, 0, 3), 0..3);
/// assert_eq!(partition(10, 1, 3), 3..6);
/// assert_eq!(partition(10, 2, 3), 6..10);
/// ```
///
/// # Panics
///
/// Panics if `rank >= world_size`.
pub fn partition(total: usize, rank: usize, world_size: usize) -> Range<usize> {
    assert!(
        rank < world_size,
        "rank {} is outside a group of {}",
        rank,
        world_size
    );
    let chunk = total / world_size;
    let start = chunk * rank;
    let end = if rank + 1 == world_size {
        total
    } else {
        start + chunk
    };
    start..end
}

pub(crate) fn check_root(root: usize, world_size: usize) -> Result<(), CollectiveError> {
    if root < world_size {
        Ok(())
    } else {
        Err(CollectiveError::InvalidRoot { root, world_size })
    }
}
