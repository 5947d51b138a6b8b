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

//! SIF (Subsystem Interface) - the EE/IOP bridge
//!
//! Two 32-bit word FIFOs connect the processors:
//!
//! | FIFO | Direction  | EE channel       | IOP channel       |
//! |------|------------|------------------|-------------------|
//! | SIF0 | IOP -> EE  | 5 (destination)  | 9 (source chain)  |
//! | SIF1 | EE -> IOP  | 6 (source chain) | 10 (destination)  |
//!
//! The EE channels run inside the DMAC and reach the FIFOs through
//! [`Sif0Port`]/[`Sif1Port`]. The IOP channels are stepped here. Whenever
//! one side moves data it records a [`SifWake`] for the other side, which
//! the system turns into scheduler events.
//!
//! # IOP tags
//!
//! IOP channel 9 reads 4-word tags from IOP memory:
//!
//! ```text
//! Word | Meaning
//! -----|-------------------------------------------------
//! 0    | IOP address (b0-23), IRQ b30, end of chain b31
//! 1    | Word count (rounded up to a multiple of 4)
//! 2-3  | EE DMAtag, pushed into the FIFO ahead of the data
//! ```
//!
//! IOP channel 10 reads the same layout (words 0-1 used) from the SIF1 FIFO.
//!
//! # Mailbox
//!
//! | EE          | IOP         | Register | EE write | IOP write |
//! |-------------|-------------|----------|----------|-----------|
//! | 0x1000F200  | 0x1D000000  | MSCOM    | set      | ignored   |
//! | 0x1000F210  | 0x1D000010  | SMCOM    | ignored  | set       |
//! | 0x1000F220  | 0x1D000020  | MSFLG    | OR       | clear     |
//! | 0x1000F230  | 0x1D000030  | SMFLG    | clear    | OR        |
//! | 0x1000F240  | 0x1D000040  | CTRL     | b8       | b4-7      |
//! | 0x1000F260  | 0x1D000060  | BD6      | set      | ignored   |

mod iop;

pub use iop::{IopSifChannel, IopSifId};

use bitflags::bitflags;

use crate::core::config::CoreConfig;
use crate::core::dma::{DmaTarget, StepResult};
use crate::core::error::{EmulatorError, Result};
use crate::core::fifo::Fifo;
use crate::core::interrupt::Dicr2;
use crate::core::memory::IopMemory;

#[cfg(test)]
mod tests;

/// EE view of the mailbox
pub mod ee_reg {
    pub const MSCOM: u32 = 0x1000_F200;
    pub const SMCOM: u32 = 0x1000_F210;
    pub const MSFLG: u32 = 0x1000_F220;
    pub const SMFLG: u32 = 0x1000_F230;
    pub const CTRL: u32 = 0x1000_F240;
    pub const BD6: u32 = 0x1000_F260;
}

/// IOP view of the mailbox
pub mod iop_reg {
    pub const MSCOM: u32 = 0x1D00_0000;
    pub const SMCOM: u32 = 0x1D00_0010;
    pub const MSFLG: u32 = 0x1D00_0020;
    pub const SMFLG: u32 = 0x1D00_0030;
    pub const CTRL: u32 = 0x1D00_0040;
    pub const BD6: u32 = 0x1D00_0060;
}

/// IOP DICR2
pub const DICR2: u32 = 0x1F80_1574;

bitflags! {
    /// Side of the bridge that has to be stepped again
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SifWake: u8 {
        /// Data arrived for EE channel 5
        const EE_SIF0 = 1 << 0;
        /// Space freed for EE channel 6
        const EE_SIF1 = 1 << 1;
        /// Space freed for IOP channel 9 (or it was started)
        const IOP_SIF0 = 1 << 2;
        /// Data arrived for IOP channel 10 (or it was started)
        const IOP_SIF1 = 1 << 3;
    }
}

/// SIF mailbox registers
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub mscom: u32,
    pub smcom: u32,
    pub msflg: u32,
    pub smflg: u32,
    pub ctrl: u32,
    pub bd6: u32,
}

#[inline]
fn qword_to_words(qword: u128) -> [u32; 4] {
    [
        qword as u32,
        (qword >> 32) as u32,
        (qword >> 64) as u32,
        (qword >> 96) as u32,
    ]
}

#[inline]
fn words_to_qword(words: [u32; 4]) -> u128 {
    words
        .iter()
        .rev()
        .fold(0u128, |acc, &word| (acc << 32) | word as u128)
}

/// EE channel 5's view of the SIF0 FIFO
pub struct Sif0Port<'a> {
    fifo: &'a mut Fifo<u32>,
    wake: &'a mut SifWake,
}

impl DmaTarget for Sif0Port<'_> {
    fn capacity(&self) -> usize {
        0
    }

    fn write(&mut self, _data: &[u128]) -> usize {
        log::warn!("SIF0: EE channel 5 only reads");
        0
    }

    /// Whole quadwords only; a partial quadword stays in the FIFO
    fn read(&mut self, out: &mut [u128]) -> usize {
        let count = out.len().min(self.fifo.len() / 4);
        for slot in &mut out[..count] {
            let mut words = [0u32; 4];
            self.fifo.read(&mut words);
            *slot = words_to_qword(words);
        }
        if count > 0 {
            self.wake.insert(SifWake::IOP_SIF0);
        }
        count
    }
}

/// EE channel 6's view of the SIF1 FIFO
pub struct Sif1Port<'a> {
    fifo: &'a mut Fifo<u32>,
    wake: &'a mut SifWake,
}

impl DmaTarget for Sif1Port<'_> {
    fn capacity(&self) -> usize {
        self.fifo.free() / 4
    }

    fn write(&mut self, data: &[u128]) -> usize {
        let count = data.len().min(self.capacity());
        for &qword in &data[..count] {
            self.fifo.write(&qword_to_words(qword));
        }
        if count > 0 {
            self.wake.insert(SifWake::IOP_SIF1);
        }
        count
    }

    fn write_tag_payload(&mut self, payload: u64) -> bool {
        if self.fifo.free() < 2 {
            return false;
        }
        self.fifo.write(&[payload as u32, (payload >> 32) as u32]);
        self.wake.insert(SifWake::IOP_SIF1);
        true
    }
}

/// The EE/IOP bridge
pub struct Sif {
    /// IOP -> EE
    sif0: Fifo<u32>,

    /// EE -> IOP
    sif1: Fifo<u32>,

    /// IOP channels 9 and 10
    iop: [IopSifChannel; 2],

    /// IOP DMA interrupt control for channels 7-12
    dicr2: Dicr2,

    mailbox: Mailbox,

    /// Pending wake-ups for the system
    wake: SifWake,

    /// An enabled DICR2 flag was raised
    iop_irq: bool,

    /// IOP cycles per quadword moved
    cycles_per_qword: u32,
}

impl Sif {
    pub fn new(config: &CoreConfig) -> Self {
        let words = config.sif_fifo_words.max(4);
        Self {
            sif0: Fifo::new(words),
            sif1: Fifo::new(words),
            iop: [
                IopSifChannel::new(IopSifId::Sif0),
                IopSifChannel::new(IopSifId::Sif1),
            ],
            dicr2: Dicr2::new(),
            mailbox: Mailbox::default(),
            wake: SifWake::empty(),
            iop_irq: false,
            cycles_per_qword: config.iop_cycles_per_qword.max(1),
        }
    }

    /// Port for EE DMA channel 5
    pub fn sif0_port(&mut self) -> Sif0Port<'_> {
        Sif0Port {
            fifo: &mut self.sif0,
            wake: &mut self.wake,
        }
    }

    /// Port for EE DMA channel 6
    pub fn sif1_port(&mut self) -> Sif1Port<'_> {
        Sif1Port {
            fifo: &mut self.sif1,
            wake: &mut self.wake,
        }
    }

    /// Words in the SIF0 FIFO
    pub fn sif0_len(&self) -> usize {
        self.sif0.len()
    }

    /// Words in the SIF1 FIFO
    pub fn sif1_len(&self) -> usize {
        self.sif1.len()
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn iop_channel(&self, id: IopSifId) -> &IopSifChannel {
        &self.iop[id.index()]
    }

    /// Whether IOP channel `id` has a transfer in progress
    pub fn iop_active(&self, id: IopSifId) -> bool {
        self.iop[id.index()].is_active()
    }

    pub fn dicr2(&self) -> &Dicr2 {
        &self.dicr2
    }

    /// Take the pending wake-ups
    ///
    /// A channel that has already moved its last block is not woken.
    pub fn take_wake(&mut self) -> SifWake {
        let mut wake = std::mem::take(&mut self.wake);
        if self.iop[IopSifId::Sif0.index()].completing {
            wake.remove(SifWake::IOP_SIF0);
        }
        if self.iop[IopSifId::Sif1.index()].completing {
            wake.remove(SifWake::IOP_SIF1);
        }
        wake
    }

    /// Take the IOP DMA interrupt request
    pub fn take_iop_irq(&mut self) -> bool {
        std::mem::take(&mut self.iop_irq)
    }

    /// Run one continuation of an IOP SIF channel
    pub fn iop_step(&mut self, id: IopSifId, mem: &mut IopMemory) -> StepResult {
        let channel = &mut self.iop[id.index()];
        if !channel.is_active() {
            return StepResult::Done;
        }
        if channel.completing {
            self.iop_complete(id);
            return StepResult::Done;
        }

        let result = match id {
            IopSifId::Sif0 => iop::step_to_fifo(channel, &mut self.sif0, mem),
            IopSifId::Sif1 => iop::step_from_fifo(channel, &mut self.sif1, mem),
        };

        match result {
            Ok(progress) => {
                if progress.words > 0 || progress.tag {
                    self.wake.insert(match id {
                        IopSifId::Sif0 => SifWake::EE_SIF0,
                        IopSifId::Sif1 => SifWake::EE_SIF1,
                    });
                }
                let qwords = (progress.words + if progress.tag { 4 } else { 0 }).div_ceil(4);
                let cost = (qwords * self.cycles_per_qword).max(1);

                let channel = &mut self.iop[id.index()];
                if channel.block_finished() && channel.chain_done {
                    channel.completing = true;
                    StepResult::Completing(cost)
                } else if progress.words == 0 && !progress.tag {
                    StepResult::Waiting
                } else {
                    StepResult::Continue(cost)
                }
            }
            Err(err) => {
                log::warn!("IOP {}: bus error ({}), channel stopped", id.name(), err);
                self.iop[id.index()].stop();
                self.raise_iop_irq(id);
                StepResult::Faulted
            }
        }
    }

    fn iop_complete(&mut self, id: IopSifId) {
        let channel = &mut self.iop[id.index()];
        channel.stop();
        log::debug!(
            "IOP {} complete ({} words moved since reset)",
            id.name(),
            channel.transferred
        );
        self.raise_iop_irq(id);
    }

    fn raise_iop_irq(&mut self, id: IopSifId) {
        if self.dicr2.raise(id.channel()) {
            self.iop_irq = true;
        }
    }

    /// Read a mailbox register from the EE side
    pub fn ee_read32(&self, addr: u32) -> Result<u32> {
        let value = match addr {
            ee_reg::MSCOM => self.mailbox.mscom,
            ee_reg::SMCOM => self.mailbox.smcom,
            ee_reg::MSFLG => self.mailbox.msflg,
            ee_reg::SMFLG => self.mailbox.smflg,
            ee_reg::CTRL => self.mailbox.ctrl,
            ee_reg::BD6 => self.mailbox.bd6,
            _ => return Err(EmulatorError::InvalidRegister { address: addr }),
        };
        log::trace!("SIF EE read 0x{:08X} = 0x{:08X}", addr, value);
        Ok(value)
    }

    /// Write a mailbox register from the EE side
    pub fn ee_write32(&mut self, addr: u32, value: u32) -> Result<()> {
        log::trace!("SIF EE write 0x{:08X} = 0x{:08X}", addr, value);
        let mailbox = &mut self.mailbox;
        match addr {
            ee_reg::MSCOM => mailbox.mscom = value,
            ee_reg::SMCOM => log::warn!("EE write to SIF SMCOM ignored"),
            ee_reg::MSFLG => mailbox.msflg |= value,
            ee_reg::SMFLG => mailbox.smflg &= !value,
            ee_reg::CTRL => {
                mailbox.ctrl = (mailbox.ctrl & !0x100) | (value & 0x100);
            }
            ee_reg::BD6 => mailbox.bd6 = value,
            _ => return Err(EmulatorError::InvalidRegister { address: addr }),
        }
        Ok(())
    }

    /// Read an IOP-side SIF register (mailbox, channels 9/10, DICR2)
    pub fn iop_read32(&self, addr: u32) -> Result<u32> {
        let value = match addr {
            iop_reg::MSCOM => self.mailbox.mscom,
            iop_reg::SMCOM => self.mailbox.smcom,
            iop_reg::MSFLG => self.mailbox.msflg,
            iop_reg::SMFLG => self.mailbox.smflg,
            iop_reg::CTRL => self.mailbox.ctrl,
            iop_reg::BD6 => self.mailbox.bd6,
            DICR2 => self.dicr2.read(),
            _ => {
                let id = IopSifId::from_address(addr)
                    .ok_or(EmulatorError::InvalidRegister { address: addr })?;
                self.iop[id.index()].read(addr - id.base_address())?
            }
        };
        log::trace!("SIF IOP read 0x{:08X} = 0x{:08X}", addr, value);
        Ok(value)
    }

    /// Write an IOP-side SIF register
    pub fn iop_write32(&mut self, addr: u32, value: u32) -> Result<()> {
        log::trace!("SIF IOP write 0x{:08X} = 0x{:08X}", addr, value);
        let mailbox = &mut self.mailbox;
        match addr {
            iop_reg::MSCOM => log::warn!("IOP write to SIF MSCOM ignored"),
            iop_reg::SMCOM => mailbox.smcom = value,
            iop_reg::MSFLG => mailbox.msflg &= !value,
            iop_reg::SMFLG => mailbox.smflg |= value,
            iop_reg::CTRL => mailbox.ctrl = (mailbox.ctrl & !0xF0) | (value & 0xF0),
            iop_reg::BD6 => log::warn!("IOP write to SIF BD6 ignored"),
            DICR2 => self.dicr2.write(value),
            _ => {
                let id = IopSifId::from_address(addr)
                    .ok_or(EmulatorError::InvalidRegister { address: addr })?;
                let started = self.iop[id.index()].write(addr - id.base_address(), value)?;
                if started {
                    self.wake.insert(match id {
                        IopSifId::Sif0 => SifWake::IOP_SIF0,
                        IopSifId::Sif1 => SifWake::IOP_SIF1,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.sif0.clear();
        self.sif1.clear();
        for channel in &mut self.iop {
            channel.reset();
        }
        self.dicr2 = Dicr2::new();
        self.mailbox = Mailbox::default();
        self.wake = SifWake::empty();
        self.iop_irq = false;
    }
}
