//! stream/reassembler.rs
//! Restores index order from out-of-order completions.
//!
//! Only the strictly increasing prefix starting at `next` is ever released.

use std::collections::BTreeMap;

use tracing::debug;

use crate::types::StreamError;

#[derive(Debug, Default)]
pub struct Reassembler {
    next: u32,
    pending: BTreeMap<u32, Vec<u8>>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next released buffer will carry.
    #[inline]
    pub fn next_index(&self) -> u32 {
        self.next
    }

    /// Completed but not yet released buffers.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn push(&mut self, index: u32, buffer: Vec<u8>) -> Result<(), StreamError> {
        if index < self.next || self.pending.contains_key(&index) {
            return Err(StreamError::Pipeline(format!("duplicate chunk index {index}")));
        }
        self.pending.insert(index, buffer);
        Ok(())
    }

    /// Release the buffer for `next` if it has arrived.
    pub fn pop_ready(&mut self) -> Option<Vec<u8>> {
        let buffer = self.pending.remove(&self.next)?;
        debug!(index = self.next, len = buffer.len(), "chunk released");
        self.next = self.next.wrapping_add(1);
        Some(buffer)
    }

    /// Every submitted index must have been released.
    pub fn finish(&self) -> Result<(), StreamError> {
        match self.pending.keys().next() {
            None => Ok(()),
            Some(first) => Err(StreamError::Pipeline(format!(
                "{} chunks stranded, first index {first}, expected {}",
                self.pending.len(),
                self.next
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn releases_only_contiguous_prefix() {
        let mut r = Reassembler::new();
        r.push(1, vec![1]).unwrap();
        r.push(2, vec![2]).unwrap();
        assert!(r.pop_ready().is_none());

        r.push(0, vec![0]).unwrap();
        assert_eq!(r.pop_ready(), Some(vec![0]));
        assert_eq!(r.pop_ready(), Some(vec![1]));
        assert_eq!(r.pop_ready(), Some(vec![2]));
        assert!(r.pop_ready().is_none());
        r.finish().unwrap();
    }

    #[test]
    fn rejects_duplicates_and_replays() {
        let mut r = Reassembler::new();
        r.push(0, vec![]).unwrap();
        assert!(r.push(0, vec![]).is_err());
        r.pop_ready().unwrap();
        assert!(r.push(0, vec![]).is_err());
    }

    #[test]
    fn finish_fails_with_gap() {
        let mut r = Reassembler::new();
        r.push(3, vec![3]).unwrap();
        assert!(matches!(r.finish(), Err(StreamError::Pipeline(_))));
    }

    proptest! {
        #[test]
        fn any_permutation_comes_out_in_order(order in Just((0u32..64).collect::<Vec<_>>()).prop_shuffle()) {
            let mut r = Reassembler::new();
            let mut out = Vec::new();
            for i in order {
                r.push(i, i.to_be_bytes().to_vec()).unwrap();
                while let Some(b) = r.pop_ready() {
                    out.push(u32::from_be_bytes([b[0], b[1], b[2], b[3]]));
                }
            }
            prop_assert_eq!(out, (0u32..64).collect::<Vec<_>>());
            prop_assert!(r.finish().is_ok());
        }
    }
}
