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

//! Clock bridge between the EE and the IOP
//!
//! The EE runs at 294.912 MHz and the IOP at 36.864 MHz, a fixed 8:1 ratio.
//! The IOP never runs on its own: the EE hands it a slice of time to catch
//! up in ([`ClockBridge::begin_slice`]), and while the slice is running an
//! EE event armed earlier than the slice end pulls the end in
//! ([`ClockBridge::request_break`]) so the EE regains control at the right
//! relative time.
//!
//! Conversions truncate. The jitter this introduces between the domains is
//! part of the hardware timing model.
//!
//! # Example
//!
//! ```
//! use ps2rx::core::clock::ClockBridge;
//!
//! let mut bridge = ClockBridge::new(8);
//! assert_eq!(bridge.begin_slice(1000, 5000), 625);
//!
//! // An EE event armed for cycle 1004 cuts the IOP slice short
//! bridge.request_break(1004);
//! assert_eq!(bridge.slice_end_ee(), Some(1004));
//! ```

use crate::core::timing::{Cycle, NEVER};

/// An active IOP catch-up window, in EE cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IopSlice {
    /// EE cycle the slice started at
    start: Cycle,
    /// EE cycle the slice was granted up to
    granted: Cycle,
    /// EE cycle the slice currently ends at (may be pulled in by breaks)
    end: Cycle,
}

/// EE/IOP cycle converter and IOP slice arbiter
#[derive(Debug)]
pub struct ClockBridge {
    /// EE cycles per IOP cycle
    ratio: u64,

    /// Active IOP slice, if the IOP is currently catching up
    slice: Option<IopSlice>,

    /// EE cycles the IOP gave up because of breaks
    stolen: u64,

    /// Number of slices that were cut short
    breaks: u64,
}

impl ClockBridge {
    /// Create a bridge
    ///
    /// # Arguments
    ///
    /// * `ratio` - EE cycles per IOP cycle (8 on retail hardware)
    pub fn new(ratio: u32) -> Self {
        Self {
            ratio: ratio.max(1) as u64,
            slice: None,
            stolen: 0,
            breaks: 0,
        }
    }

    /// EE cycles per IOP cycle
    #[inline]
    pub fn ratio(&self) -> u64 {
        self.ratio
    }

    /// Convert an EE cycle count to IOP cycles (truncating)
    #[inline]
    pub fn ee_to_iop(&self, ee: Cycle) -> Cycle {
        if ee == NEVER {
            NEVER
        } else {
            ee / self.ratio
        }
    }

    /// Convert an IOP cycle count to EE cycles
    #[inline]
    pub fn iop_to_ee(&self, iop: Cycle) -> Cycle {
        if iop == NEVER {
            NEVER
        } else {
            iop.saturating_mul(self.ratio)
        }
    }

    /// Open an IOP catch-up slice
    ///
    /// # Arguments
    ///
    /// * `ee_now` - Current EE cycle
    /// * `ee_limit` - EE cycle the IOP may run up to
    ///
    /// # Returns
    ///
    /// The IOP cycle the slice ends at
    pub fn begin_slice(&mut self, ee_now: Cycle, ee_limit: Cycle) -> Cycle {
        let end = ee_limit.max(ee_now);
        self.slice = Some(IopSlice {
            start: ee_now,
            granted: end,
            end,
        });
        self.ee_to_iop(end)
    }

    /// Ask the IOP to hand control back to the EE at `at_ee_cycle`
    ///
    /// Only shortens the active slice; a break later than the current slice
    /// end, or outside a slice, has no effect.
    ///
    /// # Returns
    ///
    /// `true` if the slice was shortened
    pub fn request_break(&mut self, at_ee_cycle: Cycle) -> bool {
        let Some(slice) = self.slice.as_mut() else {
            return false;
        };
        if at_ee_cycle >= slice.end {
            return false;
        }

        let at = at_ee_cycle.max(slice.start);
        log::trace!(
            "ClockBridge: IOP break at EE cycle {} (slice was {}..{})",
            at,
            slice.start,
            slice.end
        );
        slice.end = at;
        true
    }

    /// EE cycle the active slice ends at
    pub fn slice_end_ee(&self) -> Option<Cycle> {
        self.slice.map(|slice| slice.end)
    }

    /// IOP cycle the active slice ends at
    pub fn slice_end_iop(&self) -> Option<Cycle> {
        self.slice.map(|slice| self.ee_to_iop(slice.end))
    }

    /// Whether an IOP slice is open
    #[inline]
    pub fn in_slice(&self) -> bool {
        self.slice.is_some()
    }

    /// Close the active slice
    ///
    /// # Returns
    ///
    /// EE cycles of the granted slice that were given up because of breaks
    pub fn end_slice(&mut self) -> u64 {
        let Some(slice) = self.slice.take() else {
            return 0;
        };
        let lost = slice.granted - slice.end;
        if lost > 0 {
            self.stolen += lost;
            self.breaks += 1;
        }
        lost
    }

    /// Total EE cycles the IOP gave up because of breaks
    #[inline]
    pub fn stolen_cycles(&self) -> u64 {
        self.stolen
    }

    /// Number of slices that were cut short
    #[inline]
    pub fn break_count(&self) -> u64 {
        self.breaks
    }

    /// Forget all slice state
    pub fn reset(&mut self) {
        self.slice = None;
        self.stolen = 0;
        self.breaks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_truncates() {
        let bridge = ClockBridge::new(8);
        assert_eq!(bridge.ee_to_iop(1004), 125);
        assert_eq!(bridge.ee_to_iop(7), 0);
        assert_eq!(bridge.iop_to_ee(125), 1000);
        assert_eq!(bridge.ee_to_iop(NEVER), NEVER);
        assert_eq!(bridge.iop_to_ee(NEVER), NEVER);
    }

    #[test]
    fn test_zero_ratio_clamped() {
        let bridge = ClockBridge::new(0);
        assert_eq!(bridge.ratio(), 1);
    }

    #[test]
    fn test_slice_runs_to_limit_without_breaks() {
        let mut bridge = ClockBridge::new(8);
        assert_eq!(bridge.begin_slice(0, 800), 100);
        assert_eq!(bridge.slice_end_iop(), Some(100));
        assert_eq!(bridge.end_slice(), 0);
        assert_eq!(bridge.break_count(), 0);
    }

    #[test]
    fn test_ee_event_breaks_iop_slice() {
        // EE at 1000 arms an event with delta 4 while the IOP is granted up
        // to its own next event at EE-equivalent 5000.
        let mut bridge = ClockBridge::new(8);
        bridge.begin_slice(1000, 5000);

        assert!(bridge.request_break(1000 + 4));
        assert_eq!(bridge.slice_end_ee(), Some(1004));
        assert_eq!(bridge.slice_end_iop(), Some(1004 / 8));

        assert_eq!(bridge.end_slice(), 5000 - 1004);
        assert_eq!(bridge.stolen_cycles(), 3996);
        assert_eq!(bridge.break_count(), 1);
    }

    #[test]
    fn test_later_break_does_not_extend_slice() {
        let mut bridge = ClockBridge::new(8);
        bridge.begin_slice(0, 400);
        assert!(!bridge.request_break(800));
        assert_eq!(bridge.slice_end_ee(), Some(400));
    }

    #[test]
    fn test_break_before_slice_start_clamps_to_start() {
        let mut bridge = ClockBridge::new(8);
        bridge.begin_slice(100, 400);
        assert!(bridge.request_break(50));
        assert_eq!(bridge.slice_end_ee(), Some(100));
    }

    #[test]
    fn test_break_outside_slice_ignored() {
        let mut bridge = ClockBridge::new(8);
        assert!(!bridge.request_break(10));
        assert!(!bridge.in_slice());
        assert_eq!(bridge.end_slice(), 0);
    }

    #[test]
    fn test_earliest_break_wins() {
        let mut bridge = ClockBridge::new(8);
        bridge.begin_slice(0, 1000);
        bridge.request_break(600);
        bridge.request_break(300);
        bridge.request_break(500);
        assert_eq!(bridge.slice_end_ee(), Some(300));
    }
}
