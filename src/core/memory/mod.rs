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

//! DMA-visible memory windows
//!
//! DMA channels address memory physically, in quadword units. This module
//! owns the EE-side windows (main RAM, scratchpad, VU memory) and IOP RAM,
//! and implements the address translation every channel goes through.
//!
//! # EE DMA Address Map
//!
//! | Address                         | Region          |
//! |---------------------------------|-----------------|
//! | bit 31 set, or 0x7xxxxxxx       | Scratchpad 16KB |
//! | 0x00000000 - RAM size           | Main RAM        |
//! | RAM size - 0x0FFFFFFF           | Open bus (zero) |
//! | 0x11000000 - 0x1100FFFF         | VU memory       |
//! | anything else                   | Bus error       |
//!
//! Addresses are masked to 0x1FFFFFF0 (after the scratchpad check), so the
//! low nibble is ignored and KSEG mirrors resolve to physical memory.
//!
//! # Example
//!
//! ```
//! use ps2rx::core::memory::MainMemory;
//!
//! let mut mem = MainMemory::new(32 * 1024 * 1024);
//! mem.write_qword(0x1000, 0x1234).unwrap();
//! assert_eq!(mem.read_qword(0x1000).unwrap(), 0x1234);
//!
//! // Scratchpad select bit
//! mem.write_qword(0x8000_0010, 7).unwrap();
//! assert_eq!(mem.read_spr_qword(0x10), 7);
//!
//! // Unmapped addresses fail translation
//! assert!(mem.read_qword(0x1200_0000).is_err());
//! ```

use crate::core::error::{EmulatorError, Result};

/// Scratchpad size (16KB)
pub const SPR_SIZE: usize = 16 * 1024;

/// Scratchpad address mask (quadword aligned)
pub const SPR_MASK: u32 = 0x3FF0;

/// VU memory window start
const VU_MEM_START: u32 = 0x1100_0000;

/// VU memory window size (VU0/VU1 micro and data memory)
const VU_MEM_SIZE: usize = 0x1_0000;

/// Region a DMA address resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegion {
    /// Main RAM
    Ram,
    /// Scratchpad
    Scratchpad,
    /// VU micro/data memory
    Vu,
    /// Mapped but unbacked: reads return zero, writes are dropped
    OpenBus,
}

/// A translated DMA address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaAddress {
    pub region: MemoryRegion,
    pub offset: usize,
}

/// EE-side memory reachable by the DMAC
pub struct MainMemory {
    /// Main RAM
    ram: Vec<u8>,

    /// Scratchpad RAM
    spr: Vec<u8>,

    /// VU memory window
    vu: Vec<u8>,
}

impl MainMemory {
    /// Create zeroed memory
    ///
    /// # Arguments
    ///
    /// * `ram_size` - Main RAM size in bytes
    pub fn new(ram_size: usize) -> Self {
        Self {
            ram: vec![0; ram_size],
            spr: vec![0; SPR_SIZE],
            vu: vec![0; VU_MEM_SIZE],
        }
    }

    /// Main RAM size in bytes
    pub fn ram_size(&self) -> usize {
        self.ram.len()
    }

    /// Translate a DMA address
    ///
    /// # Returns
    ///
    /// `EmulatorError::InvalidMemoryAccess` for addresses outside every
    /// mapped window
    pub fn translate(&self, addr: u32) -> Result<DmaAddress> {
        if addr & 0x8000_0000 != 0 || addr & 0x7000_0000 == 0x7000_0000 {
            return Ok(DmaAddress {
                region: MemoryRegion::Scratchpad,
                offset: (addr & SPR_MASK) as usize,
            });
        }

        let phys = addr & 0x1FFF_FFF0;
        if (phys as usize) + 16 <= self.ram.len() {
            Ok(DmaAddress {
                region: MemoryRegion::Ram,
                offset: phys as usize,
            })
        } else if phys < 0x1000_0000 {
            Ok(DmaAddress {
                region: MemoryRegion::OpenBus,
                offset: 0,
            })
        } else if (VU_MEM_START..VU_MEM_START + VU_MEM_SIZE as u32).contains(&phys) {
            Ok(DmaAddress {
                region: MemoryRegion::Vu,
                offset: (phys - VU_MEM_START) as usize,
            })
        } else {
            log::warn!("DMA address 0x{:08X} is not mapped", addr);
            Err(EmulatorError::InvalidMemoryAccess { address: addr })
        }
    }

    fn backing(&self, region: MemoryRegion) -> Option<&[u8]> {
        match region {
            MemoryRegion::Ram => Some(&self.ram),
            MemoryRegion::Scratchpad => Some(&self.spr),
            MemoryRegion::Vu => Some(&self.vu),
            MemoryRegion::OpenBus => None,
        }
    }

    fn backing_mut(&mut self, region: MemoryRegion) -> Option<&mut [u8]> {
        match region {
            MemoryRegion::Ram => Some(&mut self.ram),
            MemoryRegion::Scratchpad => Some(&mut self.spr),
            MemoryRegion::Vu => Some(&mut self.vu),
            MemoryRegion::OpenBus => None,
        }
    }

    /// Read one quadword through DMA address translation
    pub fn read_qword(&self, addr: u32) -> Result<u128> {
        let target = self.translate(addr)?;
        Ok(self
            .backing(target.region)
            .map(|mem| read_u128(mem, target.offset))
            .unwrap_or(0))
    }

    /// Write one quadword through DMA address translation
    pub fn write_qword(&mut self, addr: u32, value: u128) -> Result<()> {
        let target = self.translate(addr)?;
        if let Some(mem) = self.backing_mut(target.region) {
            mem[target.offset..target.offset + 16].copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    /// Read a scratchpad quadword by SPR address (SADR)
    #[inline]
    pub fn read_spr_qword(&self, sadr: u32) -> u128 {
        read_u128(&self.spr, (sadr & SPR_MASK) as usize)
    }

    /// Write a scratchpad quadword by SPR address (SADR)
    #[inline]
    pub fn write_spr_qword(&mut self, sadr: u32, value: u128) {
        let offset = (sadr & SPR_MASK) as usize;
        self.spr[offset..offset + 16].copy_from_slice(&value.to_le_bytes());
    }

    /// Copy raw bytes into main RAM
    ///
    /// # Arguments
    ///
    /// * `addr` - Physical RAM offset
    /// * `bytes` - Data to copy
    pub fn load(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        let start = addr as usize;
        let end = start
            .checked_add(bytes.len())
            .filter(|end| *end <= self.ram.len())
            .ok_or(EmulatorError::InvalidMemoryAccess { address: addr })?;
        self.ram[start..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Read a 32-bit word of main RAM
    pub fn read32(&self, addr: u32) -> Result<u32> {
        let offset = (addr & 0x1FFF_FFFC) as usize;
        if offset + 4 > self.ram.len() {
            return Err(EmulatorError::InvalidMemoryAccess { address: addr });
        }
        Ok(read_u32(&self.ram, offset))
    }

    /// Write a 32-bit word of main RAM
    pub fn write32(&mut self, addr: u32, value: u32) -> Result<()> {
        let offset = (addr & 0x1FFF_FFFC) as usize;
        if offset + 4 > self.ram.len() {
            return Err(EmulatorError::InvalidMemoryAccess { address: addr });
        }
        self.ram[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Zero every window
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.spr.fill(0);
        self.vu.fill(0);
    }
}

/// IOP RAM as seen by the IOP DMA channels
pub struct IopMemory {
    ram: Vec<u8>,
}

impl IopMemory {
    /// Create zeroed IOP RAM
    pub fn new(size: usize) -> Self {
        Self { ram: vec![0; size] }
    }

    fn offset(&self, addr: u32) -> Result<usize> {
        let offset = (addr & 0x00FF_FFFC) as usize;
        if offset + 4 > self.ram.len() {
            log::warn!("IOP DMA address 0x{:08X} is not mapped", addr);
            return Err(EmulatorError::InvalidMemoryAccess { address: addr });
        }
        Ok(offset)
    }

    /// Read a 32-bit word
    pub fn read32(&self, addr: u32) -> Result<u32> {
        let offset = self.offset(addr)?;
        Ok(read_u32(&self.ram, offset))
    }

    /// Write a 32-bit word
    pub fn write32(&mut self, addr: u32, value: u32) -> Result<()> {
        let offset = self.offset(addr)?;
        self.ram[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Zero the RAM
    pub fn reset(&mut self) {
        self.ram.fill(0);
    }
}

#[inline(always)]
fn read_u32(mem: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        mem[offset],
        mem[offset + 1],
        mem[offset + 2],
        mem[offset + 3],
    ])
}

#[inline(always)]
fn read_u128(mem: &[u8], offset: usize) -> u128 {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&mem[offset..offset + 16]);
    u128::from_le_bytes(bytes)
}
