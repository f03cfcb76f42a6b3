//! In-process worker groups connected by `crossbeam` channels.
//!
//! Each ordered pair of workers gets its own unbounded channel, so messages
//! from one peer arrive in the order they were sent and can never be confused
//! with another peer's. Every message carries the sender's collective sequence
//! number; a receiver that sees a different number reports
//! [`CollectiveError::OutOfSync`] instead of mixing two collectives.

use super::{check_root, Communicator};
use crate::error::CollectiveError;
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::thread;

#[derive(Debug)]
enum Payload {
    Values(Vec<f64>),
    Indices(Vec<usize>),
}

#[derive(Debug)]
struct Message {
    sequence: u64,
    payload: Payload,
}

#[derive(Debug)]
struct Link {
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

/// One worker's endpoint in a group built by [`channel_group`].
///
/// Dropping an endpoint disconnects it; peers blocked on it get
/// [`CollectiveError::Disconnected`].
#[derive(Debug)]
pub struct ChannelCommunicator {
    rank: usize,
    world_size: usize,
    sequence: u64,
    // Links to every other rank, in rank order, skipping this one.
    peers: Vec<Link>,
}

/// Build a fully connected group of `world_size` endpoints, indexed by rank.
///
/// # Panics
///
/// Panics if `world_size` is 0.
pub fn channel_group(world_size: usize) -> Vec<ChannelCommunicator> {
    assert!(world_size > 0, "world_size must be greater than 0");

    // outgoing[src][dst] / incoming[dst][src], None on the diagonal.
    let mut outgoing: Vec<Vec<Option<Sender<Message>>>> = (0..world_size)
        .map(|_| (0..world_size).map(|_| None).collect())
        .collect();
    let mut incoming: Vec<Vec<Option<Receiver<Message>>>> = (0..world_size)
        .map(|_| (0..world_size).map(|_| None).collect())
        .collect();
    for src in 0..world_size {
        for dst in (0..world_size).filter(|&dst| dst != src) {
            let (tx, rx) = unbounded();
            outgoing[src][dst] = Some(tx);
            incoming[dst][src] = Some(rx);
        }
    }

    let group: Vec<ChannelCommunicator> = outgoing
        .into_iter()
        .zip(incoming)
        .enumerate()
        .map(|(rank, (txs, rxs))| ChannelCommunicator {
            rank,
            world_size,
            sequence: 0,
            peers: txs
                .into_iter()
                .zip(rxs)
                .filter_map(|(tx, rx)| Some(Link { tx: tx?, rx: rx? }))
                .collect(),
        })
        .collect();

    log::debug!("built channel group of {} workers", world_size);
    group
}

/// Run `worker` once per rank on scoped threads and collect the results in
/// rank order.
///
/// A worker that panics drops its endpoint, which surfaces as
/// [`CollectiveError::Disconnected`] in its peers; the panic itself is
/// re-raised on the calling thread once all workers have finished.
///
/// # Example
///
/// ```
/// use seqnet::distributed::{run_workers, Communicator};
///
/// let sums = run_workers(3, |mut comm| {
///     let mut values = [comm.rank() as f64 + 1.0];
///     comm.all_reduce_sum(&mut values).map(|_| values[0])
/// });
/// assert_eq!(sums, vec![Ok(6.0), Ok(6.0), Ok(6.0)]);
/// ```
pub fn run_workers<F, R>(world_size: usize, worker: F) -> Vec<R>
where
    F: Fn(ChannelCommunicator) -> R + Sync,
    R: Send,
{
    let group = channel_group(world_size);
    thread::scope(|scope| {
        let worker = &worker;
        let handles: Vec<_> = group
            .into_iter()
            .map(|comm| scope.spawn(move || worker(comm)))
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

impl ChannelCommunicator {
    fn link(&self, peer: usize) -> &Link {
        let index = if peer < self.rank { peer } else { peer - 1 };
        &self.peers[index]
    }

    fn other_ranks(&self) -> impl Iterator<Item = usize> {
        let rank = self.rank;
        (0..self.world_size).filter(move |&peer| peer != rank)
    }

    fn send(&self, peer: usize, payload: Payload) -> Result<(), CollectiveError> {
        let message = Message {
            sequence: self.sequence,
            payload,
        };
        self.link(peer)
            .tx
            .send(message)
            .map_err(|_| CollectiveError::Disconnected {
                peer,
                sequence: self.sequence,
            })
    }

    fn recv(&self, peer: usize) -> Result<Payload, CollectiveError> {
        let message = self
            .link(peer)
            .rx
            .recv()
            .map_err(|_| CollectiveError::Disconnected {
                peer,
                sequence: self.sequence,
            })?;
        if message.sequence != self.sequence {
            return Err(CollectiveError::OutOfSync {
                peer,
                expected: self.sequence,
                actual: message.sequence,
            });
        }
        Ok(message.payload)
    }

    fn recv_values(&self, peer: usize, expected: usize) -> Result<Vec<f64>, CollectiveError> {
        match self.recv(peer)? {
            Payload::Values(values) if values.len() == expected => Ok(values),
            Payload::Values(values) => Err(CollectiveError::LengthMismatch {
                peer,
                expected,
                actual: values.len(),
            }),
            Payload::Indices(_) => Err(CollectiveError::UnexpectedPayload { peer }),
        }
    }

    fn recv_indices(&self, peer: usize, expected: usize) -> Result<Vec<usize>, CollectiveError> {
        match self.recv(peer)? {
            Payload::Indices(indices) if indices.len() == expected => Ok(indices),
            Payload::Indices(indices) => Err(CollectiveError::LengthMismatch {
                peer,
                expected,
                actual: indices.len(),
            }),
            Payload::Values(_) => Err(CollectiveError::UnexpectedPayload { peer }),
        }
    }

    /// Number of collectives this endpoint has started.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    /// Every worker sends its buffer to every peer, then adds all
    /// contributions in rank order, so all replicas round identically.
    fn all_reduce_sum(&mut self, values: &mut [f64]) -> Result<(), CollectiveError> {
        self.sequence += 1;
        if self.world_size == 1 {
            return Ok(());
        }

        for peer in self.other_ranks() {
            self.send(peer, Payload::Values(values.to_vec()))?;
        }

        let own = values.to_vec();
        values.fill(0.0);
        for source in 0..self.world_size {
            let contribution = if source == self.rank {
                own.clone()
            } else {
                self.recv_values(source, values.len())?
            };
            for (acc, x) in values.iter_mut().zip(contribution) {
                *acc += x;
            }
        }
        Ok(())
    }

    fn broadcast_values(&mut self, values: &mut [f64], root: usize) -> Result<(), CollectiveError> {
        check_root(root, self.world_size)?;
        self.sequence += 1;
        if self.rank == root {
            for peer in self.other_ranks() {
                self.send(peer, Payload::Values(values.to_vec()))?;
            }
        } else {
            let received = self.recv_values(root, values.len())?;
            values.copy_from_slice(&received);
        }
        Ok(())
    }

    fn broadcast_indices(
        &mut self,
        indices: &mut [usize],
        root: usize,
    ) -> Result<(), CollectiveError> {
        check_root(root, self.world_size)?;
        self.sequence += 1;
        if self.rank == root {
            for peer in self.other_ranks() {
                self.send(peer, Payload::Indices(indices.to_vec()))?;
            }
        } else {
            let received = self.recv_indices(root, indices.len())?;
            indices.copy_from_slice(&received);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_ranks() {
        let group = channel_group(4);
        for (rank, comm) in group.iter().enumerate() {
            assert_eq!(comm.rank(), rank);
            assert_eq!(comm.world_size(), 4);
            assert_eq!(comm.peers.len(), 3);
        }
    }

    #[test]
    fn test_broadcast_indices_from_nonzero_root() {
        let results = run_workers(3, |mut comm| {
            let mut order = if comm.rank() == 2 {
                vec![4, 2, 0, 1, 3]
            } else {
                vec![0; 5]
            };
            comm.broadcast_indices(&mut order, 2).map(|_| order)
        });
        for result in results {
            assert_eq!(result.unwrap(), vec![4, 2, 0, 1, 3]);
        }
    }

    #[test]
    fn test_length_mismatch_is_reported() {
        let results = run_workers(2, |mut comm| {
            let mut values = vec![1.0; comm.rank() + 1];
            comm.all_reduce_sum(&mut values)
        });
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(CollectiveError::LengthMismatch { .. }))));
    }

    #[test]
    fn test_dropped_peer_disconnects() {
        let mut group = channel_group(2);
        let peer = group.pop().unwrap();
        drop(peer);
        let mut comm = group.pop().unwrap();
        let mut values = [1.0];
        assert!(matches!(
            comm.all_reduce_sum(&mut values),
            Err(CollectiveError::Disconnected { peer: 1, .. })
        ));
    }

    #[test]
    fn test_mismatched_collectives_are_out_of_sync() {
        let results = run_workers(2, |mut comm| {
            if comm.rank() == 0 {
                // Rank 0 skips one collective.
                let mut values = [1.0];
                comm.broadcast_values(&mut values, 0)
            } else {
                let mut first = [0usize];
                let mut values = [0.0];
                comm.broadcast_indices(&mut first, 1)?;
                comm.broadcast_values(&mut values, 0)
            }
        });
        assert!(results[1].is_err());
    }
}
