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

//! DMA (Direct Memory Access) Controller
//!
//! This module implements the Emotion Engine's DMAC, which moves quadwords
//! between memory and the peripherals without CPU intervention.
//!
//! # DMA Channels
//!
//! | Channel | Device      | Base Address | Chain walker |
//! |---------|-------------|--------------|--------------|
//! | 0       | VIF0        | 0x10008000   | with stack   |
//! | 1       | VIF1        | 0x10009000   | with stack   |
//! | 2       | GIF         | 0x1000A000   | with stack   |
//! | 3       | fromIPU     | 0x1000B000   | -            |
//! | 4       | toIPU       | 0x1000B400   | simple       |
//! | 5       | SIF0        | 0x1000C000   | destination  |
//! | 6       | SIF1        | 0x1000C400   | simple       |
//! | 7       | SIF2        | 0x1000C800   | by direction |
//! | 8       | fromSPR     | 0x1000D000   | destination  |
//! | 9       | toSPR       | 0x1000D400   | with stack   |
//!
//! # Global Registers
//!
//! - **D_CTRL** (0x1000E000): DMAE b0, RELE b1, MFD b2-3, STS b4-5, STD b6-7
//! - **D_STAT** (0x1000E010): see [`DmacStat`]
//! - **D_PCR** (0x1000E020): CDE b16-25 (per-channel enable), PCE b31
//! - **D_SQWC** (0x1000E030): SQWC b0-7 (skip), TQWC b16-23 (transfer)
//! - **D_RBSR**/**D_RBOR** (0x1000E040/50): MFIFO ring size mask / origin
//! - **D_STADR** (0x1000E060): Stall address
//! - **D_ENABLEW** (0x1000F590): bit 16 suspends every channel;
//!   **D_ENABLER** (0x1000F520) reads it back
//!
//! # Stepping
//!
//! The controller never touches the scheduler. Each channel continuation
//! calls [`DmaController::step`], which moves as much of the current block as
//! the downstream unit accepts and reports how long the channel is busy
//! ([`StepResult`]). Register writes that start, restart or stop channels
//! leave their work in [`ChannelRequests`] for the owner to act on.
//!
//! # References
//!
//! - [PS2 Hardware Docs: DMAC](https://psi-rockin.github.io/ps2tek/#dmac)
//! - EE User's Manual, chapter 5 (DMAC)

pub mod channel;
pub mod stat;
pub mod tag;
pub mod target;

pub use channel::{ChainKind, Channel, ChannelId, TransferMode, CHANNEL_COUNT, MAX_QWC};
pub use stat::DmacStat;
pub use tag::{ChainStep, Tag, TagId};
pub use target::{BufferTarget, DmaTarget, DmaTargets, NullTarget};

use crate::core::config::CoreConfig;
use crate::core::error::{DmaError, EmulatorError, Result};
use crate::core::memory::{MainMemory, SPR_MASK};
pub use channel::chcr;

#[cfg(test)]
mod tests;

/// D_CTRL
pub const D_CTRL: u32 = 0x1000_E000;
/// D_STAT
pub const D_STAT: u32 = 0x1000_E010;
/// D_PCR
pub const D_PCR: u32 = 0x1000_E020;
/// D_SQWC
pub const D_SQWC: u32 = 0x1000_E030;
/// D_RBSR
pub const D_RBSR: u32 = 0x1000_E040;
/// D_RBOR
pub const D_RBOR: u32 = 0x1000_E050;
/// D_STADR
pub const D_STADR: u32 = 0x1000_E060;
/// D_ENABLER
pub const D_ENABLER: u32 = 0x1000_F520;
/// D_ENABLEW
pub const D_ENABLEW: u32 = 0x1000_F590;

/// Channel register offsets
pub mod reg {
    pub const CHCR: u32 = 0x00;
    pub const MADR: u32 = 0x10;
    pub const QWC: u32 = 0x20;
    pub const TADR: u32 = 0x30;
    pub const ASR0: u32 = 0x40;
    pub const ASR1: u32 = 0x50;
    pub const SADR: u32 = 0x80;
}

/// D_CTRL fields
pub mod ctrl {
    pub const DMAE: u32 = 1 << 0;
    pub const RELE: u32 = 1 << 1;
    pub const MFD_SHIFT: u32 = 2;
    pub const STS_SHIFT: u32 = 4;
    pub const STD_SHIFT: u32 = 6;
}

/// D_PCR priority control enable
pub const PCR_PCE: u32 = 1 << 31;

/// D_ENABLEW suspend bit
pub const ENABLE_SUSPEND: u32 = 1 << 16;

/// Outcome of one channel step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// More work remains; step again after this many cycles
    Continue(u32),
    /// The last block has moved; the completion fires after this many cycles
    Completing(u32),
    /// The transfer is over (or the event was stale)
    Done,
    /// Parked until a register write or another channel wakes it
    Waiting,
    /// Stopped by a bus error
    Faulted,
}

/// Channel work produced by register writes and steps
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRequests {
    /// Channels that must be stepped now
    pub kick: u16,
    /// Channels whose pending continuation must be cancelled
    pub cancel: u16,
}

/// Observable channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    /// STR set but blocked on DMAE, D_ENABLEW or D_PCR
    Queued,
    /// Waiting on the stall address or an empty MFIFO
    Stalled,
    Running,
}

#[derive(Debug, Clone, Copy)]
struct DmaTiming {
    cycles_per_qword: u32,
    tag_fetch_cycles: u32,
    stall_retest_cycles: u32,
}

/// EE DMA controller
///
/// # Example
///
/// ```
/// use ps2rx::core::config::CoreConfig;
/// use ps2rx::core::dma::{ChannelId, DmaController, NullTarget, StepResult, D_CTRL};
/// use ps2rx::core::memory::MainMemory;
///
/// let mut dmac = DmaController::new(&CoreConfig::default());
/// let mut mem = MainMemory::new(1024 * 1024);
/// let mut vif0 = NullTarget::default();
///
/// dmac.write(D_CTRL, 1).unwrap();
/// dmac.write(0x1000_8020, 4).unwrap(); // QWC
/// dmac.write(0x1000_8000, 0x101).unwrap(); // CHCR: DIR | STR
///
/// assert_eq!(dmac.take_requests().kick, 1);
/// let result = dmac.step(ChannelId::Vif0, &mut mem, Some(&mut vif0));
/// assert_eq!(result, StepResult::Completing(8));
/// assert_eq!(dmac.step(ChannelId::Vif0, &mut mem, Some(&mut vif0)), StepResult::Done);
/// assert_eq!(vif0.received, 4);
/// ```
pub struct DmaController {
    /// The ten channels, in hardware order
    channels: [Channel; CHANNEL_COUNT],

    /// D_CTRL
    ctrl: u32,

    /// D_STAT
    stat: DmacStat,

    /// D_PCR
    pcr: u32,

    /// D_SQWC
    sqwc: u32,

    /// D_RBSR
    rbsr: u32,

    /// D_RBOR
    rbor: u32,

    /// D_STADR
    stadr: u32,

    /// D_ENABLEW
    enable: u32,

    /// Channels with STR set that could not start yet
    queued: u16,

    /// Channels parked on stall control or an empty MFIFO
    stalled: u16,

    /// Work for the owner of the controller
    requests: ChannelRequests,

    /// Most recent guest-visible fault
    last_fault: Option<DmaError>,

    timing: DmaTiming,
}

impl DmaController {
    /// Create a controller with every register cleared
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            channels: ChannelId::ALL.map(Channel::new),
            ctrl: 0,
            stat: DmacStat::new(),
            pcr: 0,
            sqwc: 0,
            rbsr: 0,
            rbor: 0,
            stadr: 0,
            enable: 0,
            queued: 0,
            stalled: 0,
            requests: ChannelRequests::default(),
            last_fault: None,
            timing: DmaTiming {
                cycles_per_qword: config.cycles_per_qword,
                tag_fetch_cycles: config.tag_fetch_cycles,
                stall_retest_cycles: config.stall_retest_cycles.max(1),
            },
        }
    }

    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.index()]
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> &mut Channel {
        &mut self.channels[id.index()]
    }

    pub fn stat(&self) -> &DmacStat {
        &self.stat
    }

    /// D_CTRL value
    pub fn ctrl(&self) -> u32 {
        self.ctrl
    }

    /// D_STADR value
    pub fn stall_address(&self) -> u32 {
        self.stadr
    }

    /// Bit mask of queued channels
    pub fn queued_mask(&self) -> u16 {
        self.queued
    }

    /// Bit mask of stalled channels
    pub fn stalled_mask(&self) -> u16 {
        self.stalled
    }

    /// Most recent bus error or call-stack overflow
    pub fn last_fault(&self) -> Option<DmaError> {
        self.last_fault
    }

    /// Level of the EE INT1 line
    pub fn int1(&self) -> bool {
        self.stat.int1()
    }

    /// Take the pending channel work
    pub fn take_requests(&mut self) -> ChannelRequests {
        std::mem::take(&mut self.requests)
    }

    pub fn channel_state(&self, id: ChannelId) -> ChannelState {
        let bit = 1 << id.index();
        let ch = self.channel(id);
        if !ch.is_started() {
            ChannelState::Idle
        } else if self.queued & bit != 0 {
            ChannelState::Queued
        } else if self.stalled & bit != 0 {
            ChannelState::Stalled
        } else {
            ChannelState::Running
        }
    }

    /// Whether DMAE is set and D_ENABLEW is not suspending
    fn globally_enabled(&self) -> bool {
        self.ctrl & ctrl::DMAE != 0 && self.enable & ENABLE_SUSPEND == 0
    }

    fn can_run(&self, ch: usize) -> bool {
        self.globally_enabled() && (self.pcr & PCR_PCE == 0 || self.pcr & (1 << (16 + ch)) != 0)
    }

    /// Channel selected as the stall source by D_CTRL.STS
    fn stall_source(&self) -> Option<usize> {
        match (self.ctrl >> ctrl::STS_SHIFT) & 3 {
            1 => Some(ChannelId::Sif0.index()),
            2 => Some(ChannelId::FromSpr.index()),
            3 => Some(ChannelId::FromIpu.index()),
            _ => None,
        }
    }

    /// Channel selected as the stall drain by D_CTRL.STD
    fn stall_drain(&self) -> Option<usize> {
        match (self.ctrl >> ctrl::STD_SHIFT) & 3 {
            1 => Some(ChannelId::Vif1.index()),
            2 => Some(ChannelId::Gif.index()),
            3 => Some(ChannelId::Sif1.index()),
            _ => None,
        }
    }

    /// Channel draining the memory FIFO selected by D_CTRL.MFD
    fn mfifo_drain(&self) -> Option<usize> {
        match (self.ctrl >> ctrl::MFD_SHIFT) & 3 {
            2 => Some(ChannelId::Vif1.index()),
            3 => Some(ChannelId::Gif.index()),
            _ => None,
        }
    }

    #[inline]
    fn ring(&self, addr: u32) -> u32 {
        self.rbor.wrapping_add(addr & self.rbsr)
    }

    fn effective_mode(&self, ch: usize) -> TransferMode {
        let channel = &self.channels[ch];
        match channel.mode() {
            TransferMode::Chain if channel.id.chain_kind(channel.dir()) == ChainKind::Unsupported => {
                TransferMode::Normal
            }
            mode => mode,
        }
    }

    #[inline]
    fn cost(&self, moved: u32) -> u32 {
        moved.saturating_mul(self.timing.cycles_per_qword).max(1)
    }

    // Register access

    /// Read a DMAC register
    ///
    /// # Returns
    ///
    /// `EmulatorError::InvalidRegister` for addresses outside the DMAC
    pub fn read(&self, addr: u32) -> Result<u32> {
        let value = match addr {
            D_CTRL => self.ctrl,
            D_STAT => self.stat.read(),
            D_PCR => self.pcr,
            D_SQWC => self.sqwc,
            D_RBSR => self.rbsr,
            D_RBOR => self.rbor,
            D_STADR => self.stadr,
            D_ENABLER | D_ENABLEW => self.enable,
            _ => {
                let id = ChannelId::from_address(addr)
                    .ok_or(EmulatorError::InvalidRegister { address: addr })?;
                let ch = self.channel(id);
                match addr - id.base_address() {
                    reg::CHCR => ch.chcr,
                    reg::MADR => ch.madr,
                    reg::QWC => ch.qwc_register(),
                    reg::TADR => ch.tadr,
                    reg::ASR0 => ch.asr[0],
                    reg::ASR1 => ch.asr[1],
                    reg::SADR => ch.sadr,
                    _ => return Err(EmulatorError::InvalidRegister { address: addr }),
                }
            }
        };
        log::trace!("DMAC read 0x{:08X} = 0x{:08X}", addr, value);
        Ok(value)
    }

    /// Write a DMAC register
    pub fn write(&mut self, addr: u32, value: u32) -> Result<()> {
        log::trace!("DMAC write 0x{:08X} = 0x{:08X}", addr, value);
        match addr {
            D_CTRL => {
                let was_enabled = self.ctrl & ctrl::DMAE != 0;
                self.ctrl = value & 0xFF;
                if !was_enabled && self.ctrl & ctrl::DMAE != 0 {
                    self.restart_queued();
                }
            }
            D_STAT => self.stat.write(value),
            D_PCR => {
                self.pcr = value & 0x83FF_03FF;
                self.restart_queued();
            }
            D_SQWC => self.sqwc = value & 0x00FF_00FF,
            D_RBSR => self.rbsr = value & 0x7FFF_FFF0,
            D_RBOR => self.rbor = value & 0x7FFF_FFF0,
            D_STADR => {
                self.stadr = value & 0x7FFF_FFF0;
                self.wake_stalled();
            }
            D_ENABLEW => {
                let was_suspended = self.enable & ENABLE_SUSPEND != 0;
                self.enable = value;
                if was_suspended && value & ENABLE_SUSPEND == 0 {
                    self.restart_queued();
                }
            }
            D_ENABLER => log::warn!("Write to read-only D_ENABLER ignored"),
            _ => {
                let id = ChannelId::from_address(addr)
                    .ok_or(EmulatorError::InvalidRegister { address: addr })?;
                let ch = id.index();
                match addr - id.base_address() {
                    reg::CHCR => self.write_chcr(ch, value),
                    reg::MADR => self.channels[ch].madr = value & !0xF,
                    reg::QWC => {
                        if self.channels[ch].is_started() {
                            log::warn!("DMA {}: QWC write while running ignored", id.name());
                        } else {
                            self.channels[ch].qwc = value & 0xFFFF;
                        }
                    }
                    reg::TADR => self.channels[ch].tadr = value & !0xF,
                    reg::ASR0 => self.channels[ch].asr[0] = value & !0xF,
                    reg::ASR1 => self.channels[ch].asr[1] = value & !0xF,
                    reg::SADR => self.channels[ch].sadr = value & SPR_MASK,
                    _ => return Err(EmulatorError::InvalidRegister { address: addr }),
                }
            }
        }
        Ok(())
    }

    fn write_chcr(&mut self, ch: usize, value: u32) {
        let channel = &mut self.channels[ch];
        if channel.is_started() {
            if value & chcr::STR == 0 {
                self.force_stop(ch);
            } else if value & chcr::WRITABLE != channel.chcr {
                log::warn!(
                    "DMA {}: CHCR write 0x{:08X} while running ignored",
                    channel.id.name(),
                    value
                );
            }
            return;
        }

        channel.chcr = value & chcr::WRITABLE;
        if value & chcr::STR != 0 {
            self.start(ch);
        }
    }

    /// STR 0 -> 1
    fn start(&mut self, ch: usize) {
        let bit = 1 << ch;
        if self.can_run(ch) {
            self.begin(ch);
            self.requests.kick |= bit;
        } else {
            log::debug!(
                "DMA {} queued (D_CTRL=0x{:02X} D_ENABLEW=0x{:08X} D_PCR=0x{:08X})",
                self.channels[ch].id.name(),
                self.ctrl,
                self.enable,
                self.pcr
            );
            self.queued |= bit;
        }
    }

    /// Set up transfer state for a channel that is allowed to run
    fn begin(&mut self, ch: usize) {
        let mode = self.effective_mode(ch);
        let channel = &mut self.channels[ch];
        channel.active = true;
        channel.completing = false;
        channel.in_ring = false;
        channel.interleave_left = 0;

        match mode {
            TransferMode::Normal => {
                if channel.mode() == TransferMode::Chain {
                    log::warn!("DMA {}: chain mode unsupported, running normal", channel.id.name());
                }
                if channel.qwc == 0 {
                    channel.qwc = MAX_QWC;
                }
                channel.chain_done = true;
            }
            TransferMode::Interleave => channel.chain_done = true,
            TransferMode::Chain => {
                let destination = channel.id.chain_kind(channel.dir()) == ChainKind::Destination;
                channel.chain_done =
                    channel.qwc > 0 && tag::residual_ends_chain(channel, destination);
            }
        }

        log::debug!(
            "DMA {} started: mode={:?} madr=0x{:08X} qwc={} tadr=0x{:08X}",
            channel.id.name(),
            mode,
            channel.madr,
            channel.qwc,
            channel.tadr
        );
    }

    /// STR cleared while running
    ///
    /// Only this channel is affected: its continuation is cancelled and it
    /// leaves the queued/stalled sets.
    fn force_stop(&mut self, ch: usize) {
        let bit = 1 << ch;
        self.channels[ch].stop();
        self.queued &= !bit;
        self.stalled &= !bit;
        self.requests.kick &= !bit;
        self.requests.cancel |= bit;
        log::debug!("DMA {} stopped", self.channels[ch].id.name());
    }

    /// Start every queued channel that is no longer blocked
    fn restart_queued(&mut self) {
        for ch in 0..CHANNEL_COUNT {
            let bit = 1 << ch;
            if self.queued & bit == 0 || !self.can_run(ch) {
                continue;
            }
            self.queued &= !bit;
            if !self.channels[ch].active {
                self.begin(ch);
            }
            self.requests.kick |= bit;
        }
    }

    /// Re-arm every stalled channel
    fn wake_stalled(&mut self) {
        if self.stalled != 0 {
            log::trace!("DMAC waking stalled channels 0x{:03X}", self.stalled);
        }
        self.requests.kick |= std::mem::take(&mut self.stalled);
    }

    fn publish_stall_address(&mut self, ch: usize) {
        if self.stall_source() == Some(ch) {
            self.stadr = self.channels[ch].madr;
            log::trace!("D_STADR = 0x{:08X}", self.stadr);
            self.wake_stalled();
        }
    }

    fn complete(&mut self, ch: usize) {
        let channel = &mut self.channels[ch];
        channel.stop();
        self.stat.set_channel(ch);
        log::debug!(
            "DMA {} complete ({} quadwords moved since reset)",
            channel.id.name(),
            channel.transferred
        );
    }

    fn bus_error(&mut self, ch: usize, address: u32) {
        log::warn!(
            "DMA {}: bus error at 0x{:08X}",
            self.channels[ch].id.name(),
            address
        );
        self.stat.set(stat::BEIS);
        self.stat.set_channel(ch);
        self.force_stop(ch);
        self.last_fault = Some(DmaError::BusError {
            channel: ch,
            address,
        });
    }

    // Stepping

    /// Run one continuation of channel `id`
    ///
    /// # Arguments
    ///
    /// * `id` - Channel to step
    /// * `mem` - EE memory
    /// * `port` - Downstream unit (`None` for the scratchpad channels)
    pub fn step(
        &mut self,
        id: ChannelId,
        mem: &mut MainMemory,
        port: Option<&mut dyn DmaTarget>,
    ) -> StepResult {
        let ch = id.index();
        let bit = 1 << ch;
        let channel = &self.channels[ch];
        if !channel.is_started() || !channel.active {
            return StepResult::Done;
        }
        if channel.completing {
            self.complete(ch);
            return StepResult::Done;
        }
        if !self.can_run(ch) {
            self.queued |= bit;
            return StepResult::Waiting;
        }

        let result = match self.effective_mode(ch) {
            TransferMode::Normal => self.step_normal(ch, mem, port),
            TransferMode::Interleave => self.step_interleave(ch, mem),
            TransferMode::Chain => self.step_chain(ch, mem, port),
        };

        match result {
            Ok(StepResult::Completing(delay)) => {
                self.channels[ch].completing = true;
                StepResult::Completing(delay)
            }
            Ok(result) => result,
            Err(err) => {
                let address = match err {
                    EmulatorError::InvalidMemoryAccess { address } => address,
                    _ => 0,
                };
                self.bus_error(ch, address);
                StepResult::Faulted
            }
        }
    }

    fn step_normal(
        &mut self,
        ch: usize,
        mem: &mut MainMemory,
        port: Option<&mut dyn DmaTarget>,
    ) -> Result<StepResult> {
        let moved = self.transfer(ch, mem, port, u32::MAX)?;
        if moved > 0 {
            self.after_progress(ch);
        }

        if self.channels[ch].qwc == 0 {
            Ok(StepResult::Completing(self.cost(moved)))
        } else if moved == 0 {
            Ok(StepResult::Continue(self.timing.stall_retest_cycles))
        } else {
            Ok(StepResult::Continue(self.cost(moved)))
        }
    }

    fn step_interleave(&mut self, ch: usize, mem: &mut MainMemory) -> Result<StepResult> {
        let tqwc = (self.sqwc >> 16) & 0xFF;
        let skip = self.sqwc & 0xFF;

        let channel = &mut self.channels[ch];
        if channel.interleave_left == 0 {
            channel.interleave_left = if tqwc == 0 {
                channel.qwc
            } else {
                tqwc.min(channel.qwc)
            };
        }
        let limit = channel.interleave_left;

        let moved = self.transfer(ch, mem, None, limit)?;
        if moved > 0 {
            self.after_progress(ch);
        }

        let channel = &mut self.channels[ch];
        channel.interleave_left -= moved.min(channel.interleave_left);
        if channel.interleave_left == 0 && channel.qwc > 0 {
            channel.madr = channel.madr.wrapping_add(skip << 4);
        }

        if channel.qwc == 0 {
            Ok(StepResult::Completing(self.cost(moved)))
        } else {
            Ok(StepResult::Continue(self.cost(moved)))
        }
    }

    fn step_chain(
        &mut self,
        ch: usize,
        mem: &mut MainMemory,
        mut port: Option<&mut dyn DmaTarget>,
    ) -> Result<StepResult> {
        let id = self.channels[ch].id;
        let kind = id.chain_kind(self.channels[ch].dir());
        let mut cost = 0;

        if self.channels[ch].qwc == 0 {
            if self.channels[ch].chain_done {
                return Ok(StepResult::Completing(1));
            }
            match self.next_tag(ch, kind, mem, port.as_deref_mut())? {
                Some(fetched) => cost += fetched,
                None => {
                    return Ok(if self.stalled & (1 << ch) != 0 {
                        StepResult::Waiting
                    } else {
                        StepResult::Continue(self.timing.stall_retest_cycles)
                    })
                }
            }
        }

        let moved = self.transfer(ch, mem, port, u32::MAX)?;
        cost += moved.saturating_mul(self.timing.cycles_per_qword);

        if self.channels[ch].qwc > 0 {
            return Ok(if cost == 0 {
                StepResult::Continue(self.timing.stall_retest_cycles)
            } else {
                StepResult::Continue(cost)
            });
        }

        // Block finished
        let last_id = (self.channels[ch].tag_field() as u32 >> 12) & 7;
        if kind == ChainKind::Destination {
            if last_id == tag::DEST_CNTS {
                self.publish_stall_address(ch);
            }
            if id == ChannelId::FromSpr {
                self.after_progress(ch);
            }
        } else if TagId::from_bits(last_id) == TagId::Cnt {
            let channel = &mut self.channels[ch];
            channel.tadr = channel.madr;
        }

        if self.channels[ch].chain_done {
            Ok(StepResult::Completing(cost.max(1)))
        } else {
            Ok(StepResult::Continue(cost.max(1)))
        }
    }

    /// Fetch and walk the next tag
    ///
    /// # Returns
    ///
    /// The cycles the fetch cost, or `None` if the channel has to wait
    fn next_tag(
        &mut self,
        ch: usize,
        kind: ChainKind,
        mem: &mut MainMemory,
        mut port: Option<&mut (dyn DmaTarget + '_)>,
    ) -> Result<Option<u32>> {
        let bit = 1 << ch;
        let id = self.channels[ch].id;
        let mfifo = self.mfifo_drain() == Some(ch);
        let stall_drain = self.stall_drain() == Some(ch) && self.stall_source().is_some();

        if mfifo {
            let write_ptr = self.ring(self.channels[ChannelId::FromSpr.index()].madr);
            if self.ring(self.channels[ch].tadr) == write_ptr {
                log::debug!("DMA {}: MFIFO empty", id.name());
                self.stat.set(stat::MEIS);
                self.stalled |= bit;
                return Ok(None);
            }
        }

        if kind != ChainKind::Destination {
            if let Some(port) = port.as_deref() {
                if !port.ready() {
                    return Ok(None);
                }
            }
        }

        let Some(tag) = self.read_tag(ch, kind, mem, port.as_deref_mut())? else {
            return Ok(None);
        };

        let channel = &mut self.channels[ch];
        let tag_addr = channel.tadr;
        tag::load_tag(channel, &tag);
        let step = match kind {
            ChainKind::Stack => tag::walk_with_stack(channel, &tag),
            ChainKind::Simple => tag::walk_simple(channel, &tag),
            _ => tag::walk_destination(channel, &tag),
        };

        log::debug!(
            "DMA {}: tag 0x{:08X} id={} qwc={} addr=0x{:08X} -> madr=0x{:08X} tadr=0x{:08X} {:?}",
            id.name(),
            tag_addr,
            tag.raw_id(),
            tag.qwc(),
            tag.addr(),
            channel.madr,
            channel.tadr,
            step
        );

        match step {
            ChainStep::Continue => {}
            ChainStep::Stop => channel.chain_done = true,
            ChainStep::StackOverflow => {
                log::warn!("DMA {}: call stack overflow, ending chain", id.name());
                channel.chain_done = true;
                self.last_fault = Some(DmaError::CallStackOverflow { channel: ch });
            }
        }
        if tag.irq() && channel.tie() {
            channel.chain_done = true;
        }

        if kind != ChainKind::Destination && tag.id() == TagId::Refs && stall_drain {
            let end = channel.madr.wrapping_add(channel.qwc << 4);
            if end > self.stadr {
                log::debug!(
                    "DMA {}: stalled, block end 0x{:08X} > D_STADR 0x{:08X}",
                    id.name(),
                    end,
                    self.stadr
                );
                channel.tadr = channel.tadr.wrapping_sub(16);
                channel.qwc = 0;
                channel.chain_done = false;
                self.stat.set(stat::SIS);
                self.stalled |= bit;
                return Ok(None);
            }
        }

        if mfifo {
            let (rbor, rbsr) = (self.rbor, self.rbsr);
            let ring = |addr: u32| rbor.wrapping_add(addr & rbsr);
            let channel = &mut self.channels[ch];
            channel.tadr = ring(channel.tadr);
            channel.in_ring = matches!(tag.id(), TagId::Cnt | TagId::Next | TagId::End);
            if channel.in_ring {
                channel.madr = ring(channel.madr);
            }
        } else {
            self.channels[ch].in_ring = false;
        }

        let channel = &mut self.channels[ch];
        if channel.tte() && id.supports_tte() && kind != ChainKind::Destination {
            if id == ChannelId::ToSpr {
                mem.write_spr_qword(channel.sadr, tag.raw());
                channel.sadr = channel.sadr.wrapping_add(16) & SPR_MASK;
            } else if let Some(port) = port {
                if !port.write_tag_payload(tag.payload()) {
                    log::warn!("DMA {}: tag payload refused downstream", id.name());
                }
            }
        }

        Ok(Some(self.timing.tag_fetch_cycles))
    }

    fn read_tag(
        &mut self,
        ch: usize,
        kind: ChainKind,
        mem: &mut MainMemory,
        port: Option<&mut (dyn DmaTarget + '_)>,
    ) -> Result<Option<Tag>> {
        let channel = &mut self.channels[ch];
        if kind != ChainKind::Destination {
            return Ok(Some(Tag::new(mem.read_qword(channel.tadr)?)));
        }

        if channel.id == ChannelId::FromSpr {
            let raw = mem.read_spr_qword(channel.sadr);
            channel.sadr = channel.sadr.wrapping_add(16) & SPR_MASK;
            return Ok(Some(Tag::new(raw)));
        }

        let mut raw = [0u128; 1];
        let got = port.map_or(0, |port| port.read(&mut raw));
        Ok((got == 1).then(|| Tag::new(raw[0])))
    }

    /// Bookkeeping after a block moved data
    fn after_progress(&mut self, ch: usize) {
        let kind = self.channels[ch].id.chain_kind(self.channels[ch].dir());
        if self.effective_mode(ch) != TransferMode::Chain || kind != ChainKind::Destination {
            self.publish_stall_address(ch);
        }
        if ch == ChannelId::FromSpr.index() && self.mfifo_drain().is_some() {
            self.wake_stalled();
        }
    }

    /// Move up to `limit` quadwords of the current block
    ///
    /// Channel registers advance per quadword, so on a bus error they show
    /// exactly how far the block got.
    fn transfer(
        &mut self,
        ch: usize,
        mem: &mut MainMemory,
        port: Option<&mut dyn DmaTarget>,
        limit: u32,
    ) -> Result<u32> {
        let id = self.channels[ch].id;
        let (rbor, rbsr) = (self.rbor, self.rbsr);
        let ring = move |addr: u32| rbor.wrapping_add(addr & rbsr);
        let mfifo_write = id == ChannelId::FromSpr && self.mfifo_drain().is_some();

        let channel = &mut self.channels[ch];
        let count = channel.qwc.min(limit);
        if count == 0 {
            return Ok(0);
        }

        let moved = match id {
            ChannelId::FromSpr => {
                let mut moved = 0;
                while moved < count {
                    let value = mem.read_spr_qword(channel.sadr);
                    let dest = if mfifo_write {
                        ring(channel.madr)
                    } else {
                        channel.madr
                    };
                    mem.write_qword(dest, value)?;
                    channel.madr = if mfifo_write {
                        ring(dest.wrapping_add(16))
                    } else {
                        dest.wrapping_add(16)
                    };
                    channel.sadr = channel.sadr.wrapping_add(16) & SPR_MASK;
                    channel.qwc -= 1;
                    channel.transferred += 1;
                    moved += 1;
                }
                moved
            }
            ChannelId::ToSpr => {
                let mut moved = 0;
                while moved < count {
                    let value = mem.read_qword(channel.madr)?;
                    mem.write_spr_qword(channel.sadr, value);
                    channel.madr = channel.madr.wrapping_add(16);
                    channel.sadr = channel.sadr.wrapping_add(16) & SPR_MASK;
                    channel.qwc -= 1;
                    channel.transferred += 1;
                    moved += 1;
                }
                moved
            }
            _ => {
                let Some(port) = port else {
                    log::warn!("DMA {}: no downstream unit attached", id.name());
                    return Ok(0);
                };

                if id.reads_memory(channel.dir()) {
                    let count = (count as usize).min(port.capacity());
                    let mut data = Vec::with_capacity(count);
                    let mut addr = channel.madr;
                    let mut fault = None;
                    for _ in 0..count {
                        match mem.read_qword(addr) {
                            Ok(value) => data.push(value),
                            Err(err) => {
                                fault = Some(err);
                                break;
                            }
                        }
                        addr = if channel.in_ring {
                            ring(addr.wrapping_add(16))
                        } else {
                            addr.wrapping_add(16)
                        };
                    }

                    let accepted = port.write(&data).min(data.len());
                    for _ in 0..accepted {
                        channel.madr = if channel.in_ring {
                            ring(channel.madr.wrapping_add(16))
                        } else {
                            channel.madr.wrapping_add(16)
                        };
                    }
                    channel.qwc -= accepted as u32;
                    channel.transferred += accepted as u64;

                    if let Some(err) = fault {
                        if accepted == data.len() {
                            return Err(err);
                        }
                    }
                    accepted as u32
                } else {
                    let mut data = vec![0u128; count as usize];
                    let got = port.read(&mut data).min(data.len());
                    for &value in &data[..got] {
                        mem.write_qword(channel.madr, value)?;
                        channel.madr = channel.madr.wrapping_add(16);
                        channel.qwc -= 1;
                        channel.transferred += 1;
                    }
                    got as u32
                }
            }
        };

        log::trace!(
            "DMA {}: moved {} quadwords, {} left",
            id.name(),
            moved,
            channel.qwc
        );
        Ok(moved)
    }

    /// Return every register to its power-on value
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
        self.ctrl = 0;
        self.stat.reset();
        self.pcr = 0;
        self.sqwc = 0;
        self.rbsr = 0;
        self.rbor = 0;
        self.stadr = 0;
        self.enable = 0;
        self.queued = 0;
        self.stalled = 0;
        self.requests = ChannelRequests::default();
        self.last_fault = None;
    }
}
