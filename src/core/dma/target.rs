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

//! Downstream units of the DMAC
//!
//! Every peripheral channel talks to one [`DmaTarget`]. The GIF and SIF are
//! part of the core; VIF0/VIF1, the IPU and SIF2 are external collaborators
//! plugged in through [`DmaTargets`].

/// A unit a DMA channel moves quadwords to or from
pub trait DmaTarget {
    /// Quadwords the unit can accept right now
    fn capacity(&self) -> usize {
        usize::MAX
    }

    /// Whether the unit can make progress at all
    fn ready(&self) -> bool {
        self.capacity() > 0
    }

    /// Accept quadwords from memory
    ///
    /// # Returns
    ///
    /// Number of quadwords taken from the front of `data`
    fn write(&mut self, data: &[u128]) -> usize;

    /// Produce quadwords for memory
    ///
    /// # Returns
    ///
    /// Number of quadwords written to the front of `out`
    fn read(&mut self, _out: &mut [u128]) -> usize {
        0
    }

    /// Accept the upper 64 bits of a tag (CHCR.TTE)
    ///
    /// # Returns
    ///
    /// `false` if the payload was refused
    fn write_tag_payload(&mut self, payload: u64) -> bool {
        self.write(&[payload as u128]) == 1
    }
}

/// Target that takes everything and produces nothing
#[derive(Debug, Default)]
pub struct NullTarget {
    /// Quadwords swallowed so far
    pub received: u64,
}

impl DmaTarget for NullTarget {
    fn write(&mut self, data: &[u128]) -> usize {
        self.received += data.len() as u64;
        data.len()
    }
}

/// Target that records what it receives and replays a canned input
#[derive(Debug, Default)]
pub struct BufferTarget {
    /// Quadwords received from memory
    pub received: Vec<u128>,

    /// Quadwords to hand out on reads
    pub source: std::collections::VecDeque<u128>,

    /// Maximum number of quadwords buffered (None = unbounded)
    pub limit: Option<usize>,
}

impl BufferTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target that buffers at most `limit` quadwords
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

impl DmaTarget for BufferTarget {
    fn capacity(&self) -> usize {
        self.limit
            .map_or(usize::MAX, |limit| limit.saturating_sub(self.received.len()))
    }

    fn write(&mut self, data: &[u128]) -> usize {
        let count = data.len().min(self.capacity());
        self.received.extend_from_slice(&data[..count]);
        count
    }

    fn read(&mut self, out: &mut [u128]) -> usize {
        let count = out.len().min(self.source.len());
        for (slot, value) in out.iter_mut().zip(self.source.drain(..count)) {
            *slot = value;
        }
        count
    }
}

/// External collaborators of the DMAC
pub struct DmaTargets {
    pub vif0: Box<dyn DmaTarget>,
    pub vif1: Box<dyn DmaTarget>,
    pub from_ipu: Box<dyn DmaTarget>,
    pub to_ipu: Box<dyn DmaTarget>,
    pub sif2: Box<dyn DmaTarget>,
}

impl Default for DmaTargets {
    fn default() -> Self {
        Self {
            vif0: Box::new(NullTarget::default()),
            vif1: Box::new(NullTarget::default()),
            from_ipu: Box::new(NullTarget::default()),
            to_ipu: Box::new(NullTarget::default()),
            sif2: Box::new(NullTarget::default()),
        }
    }
}
