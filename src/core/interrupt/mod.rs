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

//! PS2 Interrupt Controllers
//!
//! Both processors have their own interrupt controller. They differ in how
//! the guest acknowledges and masks sources, which is the whole reason they
//! are separate types.
//!
//! ## EE INTC
//!
//! - **INTC_STAT** (0x1000F000): Writing 1 to a bit clears it
//! - **INTC_MASK** (0x1000F010): Writing 1 to a bit toggles it
//!
//! `STAT & MASK` drives the EE INT0 line. DMAC completion goes through a
//! different line (INT1, see [`DmacStat`](crate::core::dma::DmacStat)).
//!
//! ```text
//! Bit  | Source
//! -----|-------------------------
//! 0    | GS
//! 1    | SBUS
//! 2    | VBLANK start
//! 3    | VBLANK end
//! 4    | VIF0
//! 5    | VIF1
//! 6    | VU0
//! 7    | VU1
//! 8    | IPU
//! 9-12 | TIMER0-3
//! 13   | SFIFO
//! 14   | VU0 watchdog
//! ```
//!
//! ## IOP INTC
//!
//! - **I_STAT** (0x1F801070): Writing ANDs the value in (0 bits clear)
//! - **I_MASK** (0x1F801074): Plain write
//! - **I_CTRL** (0x1F801078): Master enable; reading returns and clears it
//!
//! ## IOP DMA interrupt register (DICR2)
//!
//! DICR2 (0x1F801574) carries enable and flag bits for IOP DMA channels
//! 7-12. A flag raise for an enabled channel asserts the IOP INTC DMA bit.
//!
//! ## References
//!
//! - [PS2 Hardware Docs: INTC](https://psi-rockin.github.io/ps2tek/#interruptcontroller)

/// EE interrupt source bit flags
pub mod interrupts {
    /// GS SIGNAL/FINISH/HSYNC (bit 0)
    pub const GS: u32 = 1 << 0;

    /// SBUS, the SIF doorbell from the IOP (bit 1)
    pub const SBUS: u32 = 1 << 1;

    /// Vertical blank start (bit 2)
    pub const VBLANK_START: u32 = 1 << 2;

    /// Vertical blank end (bit 3)
    pub const VBLANK_END: u32 = 1 << 3;

    /// VIF0 (bit 4)
    pub const VIF0: u32 = 1 << 4;

    /// VIF1 (bit 5)
    pub const VIF1: u32 = 1 << 5;

    /// VU0 (bit 6)
    pub const VU0: u32 = 1 << 6;

    /// VU1 (bit 7)
    pub const VU1: u32 = 1 << 7;

    /// IPU (bit 8)
    pub const IPU: u32 = 1 << 8;

    /// Timer 0 (bit 9)
    pub const TIMER0: u32 = 1 << 9;

    /// Timer 1 (bit 10)
    pub const TIMER1: u32 = 1 << 10;

    /// Timer 2 (bit 11)
    pub const TIMER2: u32 = 1 << 11;

    /// Timer 3 (bit 12)
    pub const TIMER3: u32 = 1 << 12;

    /// SFIFO (bit 13)
    pub const SFIFO: u32 = 1 << 13;

    /// VU0 watchdog (bit 14)
    pub const VU0_WATCHDOG: u32 = 1 << 14;

    /// Every implemented source
    pub const ALL: u32 = 0x7FFF;
}

/// IOP interrupt source bit flags (subset used by the core)
pub mod iop_interrupts {
    /// Vertical blank (bit 0)
    pub const VBLANK: u32 = 1 << 0;

    /// DMA, summarised from DICR/DICR2 (bit 3)
    pub const DMA: u32 = 1 << 3;

    /// Every implemented source
    pub const ALL: u32 = 0x03FF_FFFF;
}

/// EE Interrupt Controller
///
/// # Example
///
/// ```
/// use ps2rx::core::interrupt::{IntcController, interrupts};
///
/// let mut intc = IntcController::new();
/// intc.request(interrupts::GS);
///
/// // The mask register toggles on write
/// intc.write_mask(interrupts::GS);
/// assert!(intc.is_pending());
/// intc.write_mask(interrupts::GS);
/// assert!(!intc.is_pending());
///
/// // Status is write-1-to-clear
/// intc.write_status(interrupts::GS);
/// assert_eq!(intc.read_status(), 0);
/// ```
#[derive(Debug, Default)]
pub struct IntcController {
    /// INTC_STAT (0x1000F000) - Pending sources
    status: u32,

    /// INTC_MASK (0x1000F010) - Enabled sources
    mask: u32,
}

impl IntcController {
    /// Create a controller with nothing pending and everything masked
    pub fn new() -> Self {
        Self { status: 0, mask: 0 }
    }

    /// Raise interrupt source bit(s)
    ///
    /// # Arguments
    ///
    /// * `interrupt` - Source bit(s) from [`interrupts`]
    pub fn request(&mut self, interrupt: u32) {
        self.status |= interrupt & interrupts::ALL;
        log::trace!(
            "INTC requested: 0x{:04X}, status=0x{:04X}",
            interrupt,
            self.status
        );
    }

    /// Whether INT0 is asserted
    pub fn is_pending(&self) -> bool {
        (self.status & self.mask) != 0
    }

    /// Read INTC_STAT
    pub fn read_status(&self) -> u32 {
        self.status
    }

    /// Write INTC_STAT (write 1 to clear)
    pub fn write_status(&mut self, value: u32) {
        self.status &= !value;
        log::trace!("INTC acknowledged, status=0x{:04X}", self.status);
    }

    /// Read INTC_MASK
    pub fn read_mask(&self) -> u32 {
        self.mask
    }

    /// Write INTC_MASK (write 1 to toggle)
    pub fn write_mask(&mut self, value: u32) {
        self.mask ^= value & interrupts::ALL;
        log::debug!("INTC mask now 0x{:04X}", self.mask);
    }

    /// Clear status and mask
    pub fn reset(&mut self) {
        self.status = 0;
        self.mask = 0;
    }
}

/// IOP Interrupt Controller
///
/// # Example
///
/// ```
/// use ps2rx::core::interrupt::{IopInterruptController, iop_interrupts};
///
/// let mut intc = IopInterruptController::new();
/// intc.write_ctrl(1);
/// intc.write_mask(iop_interrupts::DMA);
/// intc.request(iop_interrupts::DMA);
/// assert!(intc.is_pending());
///
/// // I_STAT acknowledges by ANDing
/// intc.write_status(!iop_interrupts::DMA);
/// assert!(!intc.is_pending());
/// ```
#[derive(Debug, Default)]
pub struct IopInterruptController {
    /// I_STAT (0x1F801070)
    status: u32,

    /// I_MASK (0x1F801074)
    mask: u32,

    /// I_CTRL (0x1F801078) - Master enable (bit 0)
    ctrl: u32,
}

impl IopInterruptController {
    /// Create a controller with everything cleared and disabled
    pub fn new() -> Self {
        Self {
            status: 0,
            mask: 0,
            ctrl: 0,
        }
    }

    /// Raise interrupt source bit(s)
    pub fn request(&mut self, interrupt: u32) {
        self.status |= interrupt & iop_interrupts::ALL;
        log::trace!(
            "IOP IRQ requested: 0x{:08X}, status=0x{:08X}",
            interrupt,
            self.status
        );
    }

    /// Whether the IOP interrupt line is asserted
    pub fn is_pending(&self) -> bool {
        self.ctrl & 1 != 0 && (self.status & self.mask) != 0
    }

    /// Read I_STAT
    pub fn read_status(&self) -> u32 {
        self.status
    }

    /// Write I_STAT (`status &= value`)
    pub fn write_status(&mut self, value: u32) {
        self.status &= value;
        log::trace!("IOP IRQ acknowledged, status=0x{:08X}", self.status);
    }

    /// Read I_MASK
    pub fn read_mask(&self) -> u32 {
        self.mask
    }

    /// Write I_MASK
    pub fn write_mask(&mut self, value: u32) {
        self.mask = value & iop_interrupts::ALL;
        log::debug!("IOP IRQ mask set: 0x{:08X}", self.mask);
    }

    /// Read I_CTRL
    ///
    /// The read has a side effect: the master enable is cleared.
    pub fn read_ctrl(&mut self) -> u32 {
        std::mem::take(&mut self.ctrl)
    }

    /// Look at I_CTRL without the read side effect
    pub fn peek_ctrl(&self) -> u32 {
        self.ctrl
    }

    /// Write I_CTRL
    pub fn write_ctrl(&mut self, value: u32) {
        self.ctrl = value & 1;
    }

    /// Clear every register
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// DICR2 (0x1F801574) - IOP DMA interrupt control for channels 7-12
///
/// Bits 16-21 enable, bits 24-29 flag, bit 31 is the summary (read only).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Dicr2 {
    value: u32,
}

impl Dicr2 {
    const ENABLE_SHIFT: u32 = 16;
    const FLAG_SHIFT: u32 = 24;
    const FIELD_MASK: u32 = 0x3F;

    pub fn new() -> Self {
        Self { value: 0 }
    }

    /// Register read; bit 31 reports any enabled flag
    pub fn read(&self) -> u32 {
        let summary = if self.any_flagged() { 1 << 31 } else { 0 };
        self.value | summary
    }

    /// Register write: enables are replaced, flags are write-1-to-clear
    pub fn write(&mut self, value: u32) {
        let flag_clear = value & (Self::FIELD_MASK << Self::FLAG_SHIFT);
        let enables = value & (Self::FIELD_MASK << Self::ENABLE_SHIFT);
        let low = value & 0xFFFF;
        let flags = self.value & (Self::FIELD_MASK << Self::FLAG_SHIFT) & !flag_clear;
        self.value = low | enables | flags;
    }

    /// Set the flag of IOP DMA channel `channel` (7-12)
    ///
    /// # Returns
    ///
    /// `true` if the channel is enabled, i.e. the IOP INTC DMA bit must be
    /// raised
    pub fn raise(&mut self, channel: usize) -> bool {
        let Some(bit) = Self::bit(channel) else {
            log::warn!("DICR2: channel {} out of range", channel);
            return false;
        };
        self.value |= 1 << (Self::FLAG_SHIFT + bit);
        self.value & (1 << (Self::ENABLE_SHIFT + bit)) != 0
    }

    /// Whether any enabled channel has its flag set
    pub fn any_flagged(&self) -> bool {
        let flags = (self.value >> Self::FLAG_SHIFT) & Self::FIELD_MASK;
        let enables = (self.value >> Self::ENABLE_SHIFT) & Self::FIELD_MASK;
        flags & enables != 0
    }

    fn bit(channel: usize) -> Option<u32> {
        (7..=12).contains(&channel).then(|| (channel - 7) as u32)
    }
}

#[cfg(test)]
mod tests;
