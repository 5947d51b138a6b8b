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

//! Register decode for both processors
//!
//! EE windows:
//!
//! ```text
//! 0x10003000-0x100030FF  GIF
//! 0x10008000-0x1000E0FF  DMAC channels and globals
//! 0x1000F000/F010        INTC_STAT / INTC_MASK
//! 0x1000F200-0x1000F26F  SIF mailbox
//! 0x1000F520/F590        D_ENABLER / D_ENABLEW
//! 0x12001000-0x12001087  GS privileged registers
//! ```
//!
//! IOP windows:
//!
//! ```text
//! 0x1D000000-0x1D00006F  SIF mailbox
//! 0x1F801070/74/78       I_STAT / I_MASK / I_CTRL
//! 0x1F801520-0x1F80153F  DMA channels 9 and 10
//! 0x1F801574             DICR2
//! ```

use super::System;
use crate::core::dma::{D_ENABLER, D_ENABLEW};
use crate::core::error::{EmulatorError, Result};
use crate::core::sif;

/// EE INTC status
pub const INTC_STAT: u32 = 0x1000_F000;
/// EE INTC mask
pub const INTC_MASK: u32 = 0x1000_F010;

/// IOP INTC status
pub const I_STAT: u32 = 0x1F80_1070;
/// IOP INTC mask
pub const I_MASK: u32 = 0x1F80_1074;
/// IOP INTC master enable
pub const I_CTRL: u32 = 0x1F80_1078;

const GIF_WINDOW: std::ops::RangeInclusive<u32> = 0x1000_3000..=0x1000_30FF;
const DMAC_WINDOW: std::ops::RangeInclusive<u32> = 0x1000_8000..=0x1000_E0FF;
const SIF_EE_WINDOW: std::ops::RangeInclusive<u32> = 0x1000_F200..=0x1000_F26F;
const GS_WINDOW: std::ops::RangeInclusive<u32> = 0x1200_1000..=0x1200_1087;
const SIF_IOP_WINDOW: std::ops::RangeInclusive<u32> = 0x1D00_0000..=0x1D00_006F;
const IOP_DMA_WINDOW: std::ops::RangeInclusive<u32> = 0x1F80_1520..=0x1F80_153F;

impl System {
    /// Read an EE-side register
    pub fn ee_read32(&self, addr: u32) -> Result<u32> {
        match addr {
            INTC_STAT => Ok(self.intc.read_status()),
            INTC_MASK => Ok(self.intc.read_mask()),
            D_ENABLER | D_ENABLEW => self.dmac.read(addr),
            _ if DMAC_WINDOW.contains(&addr) => self.dmac.read(addr),
            _ if GIF_WINDOW.contains(&addr) => self.gif.read(addr),
            _ if SIF_EE_WINDOW.contains(&addr) => self.sif.ee_read32(addr),
            _ if GS_WINDOW.contains(&addr) => self.gs.read(addr),
            _ => Err(EmulatorError::InvalidRegister { address: addr }),
        }
    }

    /// Write an EE-side register
    ///
    /// Side effects (channel starts, interrupt edges) are routed before this
    /// returns.
    pub fn ee_write32(&mut self, addr: u32, value: u32) -> Result<()> {
        match addr {
            INTC_STAT => self.intc.write_status(value),
            INTC_MASK => self.intc.write_mask(value),
            D_ENABLER | D_ENABLEW => self.dmac.write(addr, value)?,
            _ if DMAC_WINDOW.contains(&addr) => self.dmac.write(addr, value)?,
            _ if GIF_WINDOW.contains(&addr) => self.gif.write_register(addr, value)?,
            _ if SIF_EE_WINDOW.contains(&addr) => self.sif.ee_write32(addr, value)?,
            _ if GS_WINDOW.contains(&addr) => self.gs.write(addr, value)?,
            _ => return Err(EmulatorError::InvalidRegister { address: addr }),
        }
        self.sync();
        Ok(())
    }

    /// Read an IOP-side register
    ///
    /// Takes `&mut self` because reading I_CTRL clears it.
    pub fn iop_read32(&mut self, addr: u32) -> Result<u32> {
        match addr {
            I_STAT => Ok(self.iop_intc.read_status()),
            I_MASK => Ok(self.iop_intc.read_mask()),
            I_CTRL => {
                let value = self.iop_intc.read_ctrl();
                self.sync();
                Ok(value)
            }
            sif::DICR2 => self.sif.iop_read32(addr),
            _ if SIF_IOP_WINDOW.contains(&addr) || IOP_DMA_WINDOW.contains(&addr) => {
                self.sif.iop_read32(addr)
            }
            _ => Err(EmulatorError::InvalidRegister { address: addr }),
        }
    }

    /// Write an IOP-side register
    pub fn iop_write32(&mut self, addr: u32, value: u32) -> Result<()> {
        match addr {
            I_STAT => self.iop_intc.write_status(value),
            I_MASK => self.iop_intc.write_mask(value),
            I_CTRL => self.iop_intc.write_ctrl(value),
            sif::DICR2 => self.sif.iop_write32(addr, value)?,
            _ if SIF_IOP_WINDOW.contains(&addr) || IOP_DMA_WINDOW.contains(&addr) => {
                self.sif.iop_write32(addr, value)?
            }
            _ => return Err(EmulatorError::InvalidRegister { address: addr }),
        }
        self.sync();
        Ok(())
    }
}
