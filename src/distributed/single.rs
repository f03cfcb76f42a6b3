use super::{check_root, Communicator};
use crate::error::CollectiveError;

/// A group of one worker. Every collective leaves its buffer unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn all_reduce_sum(&mut self, _values: &mut [f64]) -> Result<(), CollectiveError> {
        Ok(())
    }

    fn broadcast_values(&mut self, _values: &mut [f64], root: usize) -> Result<(), CollectiveError> {
        check_root(root, 1)
    }

    fn broadcast_indices(
        &mut self,
        _indices: &mut [usize],
        root: usize,
    ) -> Result<(), CollectiveError> {
        check_root(root, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_process_is_noop() {
        let mut comm = SingleProcess;
        let mut values = [1.0, 2.0];
        comm.all_reduce_sum(&mut values).unwrap();
        comm.broadcast_values(&mut values, 0).unwrap();
        assert_eq!(values, [1.0, 2.0]);
        assert!(comm.is_root());
    }

    #[test]
    fn test_single_process_rejects_foreign_root() {
        let mut comm = SingleProcess;
        let mut indices = [0usize];
        assert_eq!(
            comm.broadcast_indices(&mut indices, 1),
            Err(CollectiveError::InvalidRoot {
                root: 1,
                world_size: 1
            })
        );
    }
}
