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

//! D_STAT (0x1000E010) - DMAC interrupt status and mask
//!
//! ```text
//! Bit    | Field | Access
//! -------|-------|---------------------------------
//! 0-9    | CIS   | Channel done, write 1 to clear
//! 13     | SIS   | Stall, write 1 to clear
//! 14     | MEIS  | MFIFO empty, write 1 to clear
//! 15     | BEIS  | Bus error, write 1 to clear
//! 16-25  | CIM   | Channel mask, write 1 to toggle
//! 29     | SIM   | Stall mask, write 1 to toggle
//! 30     | MEIM  | MFIFO empty mask, write 1 to toggle
//! ```
//!
//! BEIS has no mask bit: a bus error always asserts INT1.

/// Status bits cleared by writing 1
const STATUS_MASK: u32 = 0x0000_E3FF;

/// Mask bits toggled by writing 1
const MASK_MASK: u32 = 0x63FF_0000;

pub const SIS: u32 = 1 << 13;
pub const MEIS: u32 = 1 << 14;
pub const BEIS: u32 = 1 << 15;
pub const SIM: u32 = 1 << 29;
pub const MEIM: u32 = 1 << 30;

/// DMAC interrupt status/mask pair
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DmacStat {
    value: u32,
}

impl DmacStat {
    pub fn new() -> Self {
        Self { value: 0 }
    }

    pub fn read(&self) -> u32 {
        self.value
    }

    /// Guest write: low half clears, high half toggles
    pub fn write(&mut self, value: u32) {
        self.value &= !(value & STATUS_MASK);
        self.value ^= value & MASK_MASK;
        log::trace!("D_STAT = 0x{:08X}", self.value);
    }

    /// Flag channel completion (CIS)
    pub fn set_channel(&mut self, channel: usize) {
        self.value |= 1 << channel;
    }

    /// Raise SIS, MEIS or BEIS
    pub fn set(&mut self, bits: u32) {
        self.value |= bits & STATUS_MASK;
    }

    /// Whether `CIS` is set for `channel`
    pub fn channel_flag(&self, channel: usize) -> bool {
        self.value & (1 << channel) != 0
    }

    /// INT1 line level
    pub fn int1(&self) -> bool {
        let cis = self.value & 0x3FF;
        let cim = (self.value >> 16) & 0x3FF;
        cis & cim != 0
            || (self.value & SIS != 0 && self.value & SIM != 0)
            || (self.value & MEIS != 0 && self.value & MEIM != 0)
            || self.value & BEIS != 0
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }
}
