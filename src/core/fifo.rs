// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fixed-capacity ring FIFO
//!
//! Used in front of the GIF (PATH3, quadwords) and for the SIF bridge
//! (32-bit words). Writes never overflow: a write larger than the free space
//! is truncated and the caller is told how much was actually taken, so the
//! producer can retry the remainder later.
//!
//! # Example
//!
//! ```
//! use ps2rx::core::fifo::Fifo;
//!
//! let mut fifo = Fifo::<u128>::new(2);
//! assert_eq!(fifo.write(&[1, 2, 3]), 2);
//! assert!(fifo.is_full());
//!
//! let mut out = [0u128; 4];
//! assert_eq!(fifo.read(&mut out), 2);
//! assert_eq!(&out[..2], &[1, 2]);
//! ```

/// Bounded ring buffer
#[derive(Debug, Clone)]
pub struct Fifo<T> {
    /// Backing storage
    data: Vec<T>,

    /// Index of the oldest element
    read_pos: usize,

    /// Index the next element is written to
    write_pos: usize,

    /// Number of stored elements
    size: usize,
}

impl<T: Copy + Default> Fifo<T> {
    /// Create an empty FIFO
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of elements (at least 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity.max(1)],
            read_pos: 0,
            write_pos: 0,
            size: 0,
        }
    }

    /// Maximum number of elements
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of stored elements
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Free slots
    #[inline]
    pub fn free(&self) -> usize {
        self.capacity() - self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.size == self.capacity()
    }

    /// Append as much of `values` as fits
    ///
    /// # Returns
    ///
    /// Number of elements taken from the front of `values`
    pub fn write(&mut self, values: &[T]) -> usize {
        let count = values.len().min(self.free());
        for &value in &values[..count] {
            self.data[self.write_pos] = value;
            self.write_pos = (self.write_pos + 1) % self.capacity();
        }
        self.size += count;
        count
    }

    /// Append one element
    ///
    /// # Returns
    ///
    /// `false` if the FIFO was full
    pub fn push(&mut self, value: T) -> bool {
        self.write(std::slice::from_ref(&value)) == 1
    }

    /// Remove up to `out.len()` elements in FIFO order
    ///
    /// # Returns
    ///
    /// Number of elements written to the front of `out`
    pub fn read(&mut self, out: &mut [T]) -> usize {
        let count = out.len().min(self.size);
        for slot in &mut out[..count] {
            *slot = self.data[self.read_pos];
            self.read_pos = (self.read_pos + 1) % self.capacity();
        }
        self.size -= count;
        count
    }

    /// Remove the oldest element
    pub fn pop(&mut self) -> Option<T> {
        let mut value = [T::default()];
        (self.read(&mut value) == 1).then_some(value[0])
    }

    /// Look at the element `index` places from the front without removing it
    pub fn peek(&self, index: usize) -> Option<T> {
        (index < self.size).then(|| self.data[(self.read_pos + index) % self.capacity()])
    }

    /// Drop all contents
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_fifo_is_empty() {
        let fifo = Fifo::<u32>::new(8);
        assert!(fifo.is_empty());
        assert_eq!(fifo.len(), 0);
        assert_eq!(fifo.free(), 8);
    }

    #[test]
    fn test_write_truncates_to_free_space() {
        let mut fifo = Fifo::<u32>::new(4);
        assert_eq!(fifo.write(&[1, 2, 3]), 3);
        assert_eq!(fifo.write(&[4, 5, 6]), 1);
        assert!(fifo.is_full());
        assert_eq!(fifo.write(&[7]), 0);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let mut fifo = Fifo::<u32>::new(3);
        fifo.write(&[1, 2, 3]);
        assert_eq!(fifo.pop(), Some(1));
        assert_eq!(fifo.pop(), Some(2));
        fifo.write(&[4, 5]);

        let mut out = [0; 3];
        assert_eq!(fifo.read(&mut out), 3);
        assert_eq!(out, [3, 4, 5]);
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_peek() {
        let mut fifo = Fifo::<u128>::new(4);
        fifo.write(&[10, 20]);
        assert_eq!(fifo.peek(0), Some(10));
        assert_eq!(fifo.peek(1), Some(20));
        assert_eq!(fifo.peek(2), None);
        assert_eq!(fifo.len(), 2);
    }

    #[test]
    fn test_push_and_clear() {
        let mut fifo = Fifo::<u32>::new(1);
        assert!(fifo.push(7));
        assert!(!fifo.push(8));
        fifo.clear();
        assert!(fifo.is_empty());
        assert_eq!(fifo.pop(), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Write(Vec<u32>),
        Read(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop::collection::vec(any::<u32>(), 0..40).prop_map(Op::Write),
            (0usize..40).prop_map(Op::Read),
        ]
    }

    proptest! {
        #[test]
        fn prop_size_is_conserved(
            capacity in 1usize..64,
            ops in prop::collection::vec(op_strategy(), 0..64),
        ) {
            let mut fifo = Fifo::<u32>::new(capacity);
            for op in ops {
                let before = fifo.len();
                match op {
                    Op::Write(values) => {
                        let free = fifo.free();
                        let written = fifo.write(&values);
                        prop_assert_eq!(written, values.len().min(free));
                        prop_assert_eq!(fifo.len(), before + written);
                    }
                    Op::Read(count) => {
                        let mut out = vec![0u32; count];
                        let read = fifo.read(&mut out);
                        prop_assert_eq!(read, count.min(before));
                        prop_assert_eq!(fifo.len(), before - read);
                    }
                }
                prop_assert!(fifo.len() <= fifo.capacity());
            }
        }

        #[test]
        fn prop_reads_return_writes_in_order(
            values in prop::collection::vec(any::<u32>(), 0..200),
            capacity in 1usize..32,
        ) {
            let mut fifo = Fifo::<u32>::new(capacity);
            let mut pending = values.as_slice();
            let mut drained = Vec::new();
            while !pending.is_empty() || !fifo.is_empty() {
                let taken = fifo.write(pending);
                pending = &pending[taken..];
                if let Some(value) = fifo.pop() {
                    drained.push(value);
                }
            }
            prop_assert_eq!(drained, values);
        }
    }
}
