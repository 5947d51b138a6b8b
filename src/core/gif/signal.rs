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

//! VU1 to GS signal channel
//!
//! A VU1 program running on a worker thread reports GS SIGNAL, FINISH and
//! LABEL events through [`VuSignals`]. There is one producer (the VU1
//! worker) and one consumer (the system loop); everything is lock-free.
//!
//! The flags word holds which events are pending. Payloads are packed as
//! `mask << 32 | data`.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use bitflags::bitflags;

bitflags! {
    /// Pending GS events
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SignalFlags: u32 {
        const FINISH = 1 << 0;
        const LABEL = 1 << 1;
        const SIGNAL = 1 << 2;
    }
}

#[inline]
fn pack(mask: u32, data: u32) -> u64 {
    ((mask as u64) << 32) | (data & mask) as u64
}

#[inline]
fn unpack(value: u64) -> (u32, u32) {
    ((value >> 32) as u32, value as u32)
}

/// Events taken from [`VuSignals`] in one go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GsChanges {
    pub finish: bool,
    /// SIGNAL as (mask, data)
    pub signal: Option<(u32, u32)>,
    /// LABEL as (mask, data)
    pub label: Option<(u32, u32)>,
}

impl GsChanges {
    pub fn is_empty(&self) -> bool {
        !self.finish && self.signal.is_none() && self.label.is_none()
    }
}

/// Lock-free SIGNAL/FINISH/LABEL mailbox
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ps2rx::core::gif::VuSignals;
///
/// let signals = Arc::new(VuSignals::new());
/// let producer = Arc::clone(&signals);
/// std::thread::spawn(move || {
///     producer.label(0xFF00, 0x1200);
///     producer.label(0x00FF, 0x0034);
/// })
/// .join()
/// .unwrap();
///
/// let changes = signals.take_changes();
/// assert_eq!(changes.label, Some((0xFFFF, 0x1234)));
/// ```
#[derive(Debug, Default)]
pub struct VuSignals {
    flags: AtomicU32,
    signal: AtomicU64,
    label: AtomicU64,
}

impl VuSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise SIGNAL
    ///
    /// # Returns
    ///
    /// `false` while the previous SIGNAL has not been taken; the producer
    /// has to stall and retry
    pub fn try_signal(&self, mask: u32, data: u32) -> bool {
        if self.pending().contains(SignalFlags::SIGNAL) {
            return false;
        }
        self.signal.store(pack(mask, data), Ordering::Relaxed);
        self.flags
            .fetch_or(SignalFlags::SIGNAL.bits(), Ordering::Release);
        true
    }

    /// Raise FINISH
    pub fn finish(&self) {
        self.flags
            .fetch_or(SignalFlags::FINISH.bits(), Ordering::Release);
    }

    /// Raise LABEL, merging with a pending one by mask
    ///
    /// A taken LABEL leaves an empty payload, which merges as a fresh one.
    pub fn label(&self, mask: u32, data: u32) {
        let mut current = self.label.load(Ordering::Relaxed);
        loop {
            let (old_mask, old_data) = unpack(current);
            let next = pack(old_mask | mask, (old_data & !mask) | (data & mask));
            match self.label.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        self.flags
            .fetch_or(SignalFlags::LABEL.bits(), Ordering::Release);
    }

    /// Events not yet taken
    pub fn pending(&self) -> SignalFlags {
        SignalFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    /// Take every pending event
    pub fn take_changes(&self) -> GsChanges {
        let finish = self
            .flags
            .fetch_and(!SignalFlags::FINISH.bits(), Ordering::AcqRel)
            & SignalFlags::FINISH.bits()
            != 0;

        // The payload is read before the flag drops, so a new SIGNAL cannot
        // overwrite it in between
        let signal = self.pending().contains(SignalFlags::SIGNAL).then(|| {
            let value = self.signal.load(Ordering::Acquire);
            self.flags
                .fetch_and(!SignalFlags::SIGNAL.bits(), Ordering::AcqRel);
            unpack(value)
        });

        // A LABEL merged after the flag drops stays in the payload and is
        // either swapped out here or raises the flag again for the next take
        let label = if self
            .flags
            .fetch_and(!SignalFlags::LABEL.bits(), Ordering::AcqRel)
            & SignalFlags::LABEL.bits()
            != 0
        {
            Some(unpack(self.label.swap(0, Ordering::AcqRel))).filter(|&(mask, _)| mask != 0)
        } else {
            None
        };

        GsChanges {
            finish,
            signal,
            label,
        }
    }

    /// Drop every pending event
    pub fn clear(&self) {
        self.flags.store(0, Ordering::Release);
        self.signal.store(0, Ordering::Relaxed);
        self.label.store(0, Ordering::Relaxed);
    }
}
