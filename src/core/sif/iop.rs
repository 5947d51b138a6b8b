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

//! IOP DMA channels 9 (SIF0) and 10 (SIF1)

use crate::core::error::{EmulatorError, Result};
use crate::core::fifo::Fifo;
use crate::core::memory::IopMemory;

/// CHCR start/busy bit
pub const CHCR_START: u32 = 1 << 24;

/// Tag word 0: interrupt request
const TAG_IRQ: u32 = 1 << 30;
/// Tag word 0: last tag of the chain
const TAG_END: u32 = 1 << 31;

/// Register offsets from the channel base
mod reg {
    pub const MADR: u32 = 0x0;
    pub const BCR: u32 = 0x4;
    pub const CHCR: u32 = 0x8;
    pub const TADR: u32 = 0xC;
}

/// IOP SIF channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IopSifId {
    /// Channel 9, IOP memory to SIF0 FIFO
    Sif0,
    /// Channel 10, SIF1 FIFO to IOP memory
    Sif1,
}

impl IopSifId {
    pub const ALL: [IopSifId; 2] = [IopSifId::Sif0, IopSifId::Sif1];

    pub fn index(self) -> usize {
        self as usize
    }

    /// IOP DMA channel number
    pub fn channel(self) -> usize {
        match self {
            IopSifId::Sif0 => 9,
            IopSifId::Sif1 => 10,
        }
    }

    pub fn base_address(self) -> u32 {
        match self {
            IopSifId::Sif0 => 0x1F80_1520,
            IopSifId::Sif1 => 0x1F80_1530,
        }
    }

    pub fn from_address(addr: u32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|id| (id.base_address()..id.base_address() + 0x10).contains(&addr))
    }

    pub fn name(self) -> &'static str {
        match self {
            IopSifId::Sif0 => "SIF0",
            IopSifId::Sif1 => "SIF1",
        }
    }
}

/// One IOP SIF channel
#[derive(Debug, Clone)]
pub struct IopSifChannel {
    pub id: IopSifId,
    pub madr: u32,
    pub bcr: u32,
    pub chcr: u32,
    pub tadr: u32,

    /// Words left in the current block
    pub(super) words_left: u32,

    /// The current block is the last
    pub(super) chain_done: bool,

    /// The last block has moved; the completion is pending
    pub(super) completing: bool,

    /// Words moved since reset
    pub transferred: u64,
}

/// What one step moved
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Progress {
    /// A tag was consumed
    pub tag: bool,
    /// Data words moved
    pub words: u32,
}

impl IopSifChannel {
    pub fn new(id: IopSifId) -> Self {
        Self {
            id,
            madr: 0,
            bcr: 0,
            chcr: 0,
            tadr: 0,
            words_left: 0,
            chain_done: false,
            completing: false,
            transferred: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.chcr & CHCR_START != 0
    }

    pub(super) fn block_finished(&self) -> bool {
        self.words_left == 0
    }

    pub(super) fn stop(&mut self) {
        self.chcr &= !CHCR_START;
        self.completing = false;
    }

    pub(super) fn read(&self, offset: u32) -> Result<u32> {
        match offset {
            reg::MADR => Ok(self.madr),
            reg::BCR => Ok(self.bcr),
            reg::CHCR => Ok(self.chcr),
            reg::TADR => Ok(self.tadr),
            _ => Err(EmulatorError::InvalidRegister {
                address: self.id.base_address() + offset,
            }),
        }
    }

    /// Register write
    ///
    /// # Returns
    ///
    /// `true` if the write started the channel
    pub(super) fn write(&mut self, offset: u32, value: u32) -> Result<bool> {
        match offset {
            reg::MADR => self.madr = value & 0x00FF_FFFF,
            reg::BCR => self.bcr = value,
            reg::TADR => self.tadr = value & 0x00FF_FFFF,
            reg::CHCR => {
                let was_active = self.is_active();
                self.chcr = value;
                if !was_active && self.is_active() {
                    self.words_left = 0;
                    self.chain_done = false;
                    self.completing = false;
                    log::debug!(
                        "IOP {} started: tadr=0x{:06X}",
                        self.id.name(),
                        self.tadr
                    );
                    return Ok(true);
                }
                if was_active && !self.is_active() {
                    self.completing = false;
                    log::debug!("IOP {} stopped", self.id.name());
                }
            }
            _ => {
                return Err(EmulatorError::InvalidRegister {
                    address: self.id.base_address() + offset,
                })
            }
        }
        Ok(false)
    }

    fn load_tag(&mut self, word0: u32, word1: u32) {
        self.madr = word0 & 0x00FF_FFFF;
        self.words_left = (word1 + 3) & !3;
        self.chain_done = word0 & (TAG_END | TAG_IRQ) != 0;
        log::debug!(
            "IOP {}: tag addr=0x{:06X} words={} end={}",
            self.id.name(),
            self.madr,
            self.words_left,
            self.chain_done
        );
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.id);
    }
}

/// Channel 9: tag and data from IOP memory into the SIF0 FIFO
pub(super) fn step_to_fifo(
    ch: &mut IopSifChannel,
    fifo: &mut Fifo<u32>,
    mem: &IopMemory,
) -> Result<Progress> {
    let mut progress = Progress::default();

    if ch.block_finished() {
        // The EE tag goes into the FIFO as one quadword
        if fifo.free() < 4 {
            return Ok(progress);
        }
        let tadr = ch.tadr;
        let tag = [
            mem.read32(tadr)?,
            mem.read32(tadr + 4)?,
            mem.read32(tadr + 8)?,
            mem.read32(tadr + 12)?,
        ];
        ch.load_tag(tag[0], tag[1]);
        ch.tadr = tadr.wrapping_add(16);
        fifo.write(&[tag[2], tag[3], 0, 0]);
        progress.tag = true;
    }

    let count = ch.words_left.min(fifo.free() as u32);
    for _ in 0..count {
        let word = mem.read32(ch.madr)?;
        fifo.push(word);
        ch.madr = ch.madr.wrapping_add(4);
        ch.words_left -= 1;
        ch.transferred += 1;
        progress.words += 1;
    }
    Ok(progress)
}

/// Channel 10: tag and data from the SIF1 FIFO into IOP memory
pub(super) fn step_from_fifo(
    ch: &mut IopSifChannel,
    fifo: &mut Fifo<u32>,
    mem: &mut IopMemory,
) -> Result<Progress> {
    let mut progress = Progress::default();

    if ch.block_finished() {
        if fifo.len() < 4 {
            return Ok(progress);
        }
        let mut tag = [0u32; 4];
        fifo.read(&mut tag);
        ch.load_tag(tag[0], tag[1]);
        progress.tag = true;
    }

    let count = ch.words_left.min(fifo.len() as u32);
    for _ in 0..count {
        let Some(word) = fifo.pop() else {
            break;
        };
        mem.write32(ch.madr, word)?;
        ch.madr = ch.madr.wrapping_add(4);
        ch.words_left -= 1;
        ch.transferred += 1;
        progress.words += 1;
    }
    Ok(progress)
}
