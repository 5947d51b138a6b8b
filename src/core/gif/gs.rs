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

//! GS privileged registers mirrored by the core
//!
//! Only the interrupt side of the GS is modelled: CSR event bits, IMR masks
//! and the SIGLBLID register that SIGNAL and LABEL update.

use super::signal::GsChanges;
use crate::core::error::{EmulatorError, Result};

/// GS_CSR
pub const GS_CSR: u32 = 0x1200_1000;
/// GS_IMR
pub const GS_IMR: u32 = 0x1200_1010;
/// GS_SIGLBLID (SIGID in the low word, LBLID in the high word)
pub const GS_SIGLBLID: u32 = 0x1200_1080;

/// CSR event bits (write 1 to clear)
pub mod csr {
    pub const SIGNAL: u32 = 1 << 0;
    pub const FINISH: u32 = 1 << 1;
    pub const HSINT: u32 = 1 << 2;
    pub const VSINT: u32 = 1 << 3;
    pub const EDWINT: u32 = 1 << 4;
    pub const EVENTS: u32 = 0x1F;
}

/// IMR mask bits (set = masked)
pub mod imr {
    pub const SIGMSK: u32 = 1 << 8;
    pub const FINISHMSK: u32 = 1 << 9;
    pub const HSMSK: u32 = 1 << 10;
    pub const VSMSK: u32 = 1 << 11;
    pub const EDWMSK: u32 = 1 << 12;
    pub const ALL: u32 = 0x7F00;
}

/// GS interrupt registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsRegisters {
    csr: u32,
    imr: u32,
    sigid: u32,
    lblid: u32,
}

impl Default for GsRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl GsRegisters {
    /// Power-on state: every source masked
    pub fn new() -> Self {
        Self {
            csr: 0,
            imr: imr::ALL,
            sigid: 0,
            lblid: 0,
        }
    }

    pub fn sigid(&self) -> u32 {
        self.sigid
    }

    pub fn lblid(&self) -> u32 {
        self.lblid
    }

    /// Apply events from the VU1 signal channel
    ///
    /// # Returns
    ///
    /// `true` if an unmasked SIGNAL or FINISH was raised
    pub fn apply(&mut self, changes: &GsChanges) -> bool {
        let mut raise = false;

        if let Some((mask, data)) = changes.signal {
            if self.csr & csr::SIGNAL != 0 {
                log::warn!("GS: SIGNAL raised while the previous one is unacknowledged");
            }
            self.sigid = (self.sigid & !mask) | (data & mask);
            self.csr |= csr::SIGNAL;
            raise |= self.imr & imr::SIGMSK == 0;
        }

        if changes.finish {
            self.csr |= csr::FINISH;
            raise |= self.imr & imr::FINISHMSK == 0;
        }

        if let Some((mask, data)) = changes.label {
            self.lblid = (self.lblid & !mask) | (data & mask);
        }

        if raise {
            log::debug!("GS interrupt (CSR=0x{:02X})", self.csr);
        }
        raise
    }

    /// Level of the GS interrupt line
    pub fn interrupt_pending(&self) -> bool {
        (self.csr & csr::SIGNAL != 0 && self.imr & imr::SIGMSK == 0)
            || (self.csr & csr::FINISH != 0 && self.imr & imr::FINISHMSK == 0)
    }

    pub fn read(&self, addr: u32) -> Result<u32> {
        match addr {
            GS_CSR => Ok(self.csr),
            GS_IMR => Ok(self.imr),
            GS_SIGLBLID => Ok(self.sigid),
            a if a == GS_SIGLBLID + 4 => Ok(self.lblid),
            _ => Err(EmulatorError::InvalidRegister { address: addr }),
        }
    }

    pub fn write(&mut self, addr: u32, value: u32) -> Result<()> {
        log::trace!("GS write 0x{:08X} = 0x{:08X}", addr, value);
        match addr {
            GS_CSR => self.csr &= !(value & csr::EVENTS),
            GS_IMR => self.imr = value & imr::ALL,
            GS_SIGLBLID => self.sigid = value,
            a if a == GS_SIGLBLID + 4 => self.lblid = value,
            _ => return Err(EmulatorError::InvalidRegister { address: addr }),
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
