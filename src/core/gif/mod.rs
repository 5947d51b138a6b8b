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

//! GIF (Graphics Interface)
//!
//! The GIF feeds the GS from three paths:
//!
//! | Path  | Source                 | Priority |
//! |-------|------------------------|----------|
//! | PATH1 | VU1 XGKICK             | highest  |
//! | PATH2 | VIF1 DIRECT/DIRECTHL   |          |
//! | PATH3 | GIF DMA channel (FIFO) | lowest   |
//!
//! A path that starts a packet owns the GS bus until a GIFtag with EOP set
//! has had all of its data sent. Only then is the bus re-arbitrated.
//!
//! PATH1 and PATH2 are driven by producers outside the core and submit
//! through staging queues. PATH3 is the DMA side: the unit implements
//! [`DmaTarget`] and only accepts quadwords into its FIFO while PATH3 may
//! run, so the DMA channel sees a full target and retries later.
//!
//! # Registers
//!
//! - **GIF_CTRL** (0x10003000): RST b0, PSE b3 (pause)
//! - **GIF_MODE** (0x10003010): M3R b0 (mask PATH3), IMT b2
//! - **GIF_STAT** (0x10003020): read-only mirror, see [`GifStatus`]
//!
//! # References
//!
//! - [PS2 Hardware Docs: GIF](https://psi-rockin.github.io/ps2tek/#gif)

pub mod gs;
pub mod signal;

pub use gs::GsRegisters;
pub use signal::{GsChanges, SignalFlags, VuSignals};

use std::collections::VecDeque;

use bitflags::bitflags;

use crate::core::config::CoreConfig;
use crate::core::dma::DmaTarget;
use crate::core::error::{EmulatorError, Result};
use crate::core::fifo::Fifo;

#[cfg(test)]
mod tests;

/// GIF_CTRL
pub const GIF_CTRL: u32 = 0x1000_3000;
/// GIF_MODE
pub const GIF_MODE: u32 = 0x1000_3010;
/// GIF_STAT
pub const GIF_STAT: u32 = 0x1000_3020;

/// GIF_CTRL bits
pub mod ctrl {
    /// Reset the unit
    pub const RST: u32 = 1 << 0;
    /// Temporary transfer stop
    pub const PSE: u32 = 1 << 3;
}

/// GIF_MODE bits
pub mod mode {
    /// Mask PATH3
    pub const M3R: u32 = 1 << 0;
    /// Intermittent transfer mode
    pub const IMT: u32 = 1 << 2;
}

/// One of the three GS transfer paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GifPath {
    Path1,
    Path2,
    Path3,
}

impl GifPath {
    pub const ALL: [GifPath; 3] = [GifPath::Path1, GifPath::Path2, GifPath::Path3];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            GifPath::Path1 => "PATH1",
            GifPath::Path2 => "PATH2",
            GifPath::Path3 => "PATH3",
        }
    }

    /// GIF_STAT.APATH encoding
    fn apath(self) -> u32 {
        self.index() as u32 + 1
    }
}

bitflags! {
    /// Single-bit fields of GIF_STAT
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GifStatus: u32 {
        /// PATH3 masked by GIF_MODE
        const M3R = 1 << 0;
        /// PATH3 masked by VIF1 MASKP3
        const M3P = 1 << 1;
        /// Intermittent mode
        const IMT = 1 << 2;
        /// Transfer paused
        const PSE = 1 << 3;
        /// PATH3 interrupted
        const IP3 = 1 << 5;
        /// PATH3 queued
        const P3Q = 1 << 6;
        /// PATH2 queued
        const P2Q = 1 << 7;
        /// PATH1 queued
        const P1Q = 1 << 8;
        /// Output path busy
        const OPH = 1 << 9;
    }
}

const APATH_SHIFT: u32 = 10;
const FQC_SHIFT: u32 = 24;

/// GIFtag data format (FLG)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GifFormat {
    Packed,
    Reglist,
    Image,
    /// FLG = 3, handled like IMAGE
    Disabled,
}

/// GIFtag header
///
/// ```text
/// Bits    | Field | Meaning
/// --------|-------|--------------------------------
/// 0-14    | NLOOP | Loop count
/// 15      | EOP   | Last packet of the transfer
/// 46      | PRE   | PRIM field valid
/// 47-57   | PRIM  | Primitive
/// 58-59   | FLG   | Data format
/// 60-63   | NREG  | Registers per loop (0 means 16)
/// 64-127  | REGS  | Register descriptors
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifTag {
    raw: u128,
}

impl GifTag {
    pub fn new(raw: u128) -> Self {
        Self { raw }
    }

    /// Build a tag (REGS left zero)
    pub fn build(nloop: u16, eop: bool, format: GifFormat, nreg: u8) -> Self {
        let flg = match format {
            GifFormat::Packed => 0u128,
            GifFormat::Reglist => 1,
            GifFormat::Image => 2,
            GifFormat::Disabled => 3,
        };
        let mut raw = (nloop & 0x7FFF) as u128 | (flg << 58) | (((nreg & 0xF) as u128) << 60);
        if eop {
            raw |= 1 << 15;
        }
        Self::new(raw)
    }

    pub fn raw(&self) -> u128 {
        self.raw
    }

    pub fn nloop(&self) -> u32 {
        (self.raw & 0x7FFF) as u32
    }

    pub fn eop(&self) -> bool {
        self.raw & (1 << 15) != 0
    }

    pub fn format(&self) -> GifFormat {
        match (self.raw >> 58) & 3 {
            0 => GifFormat::Packed,
            1 => GifFormat::Reglist,
            2 => GifFormat::Image,
            _ => GifFormat::Disabled,
        }
    }

    pub fn nreg(&self) -> u32 {
        match ((self.raw >> 60) & 0xF) as u32 {
            0 => 16,
            n => n,
        }
    }

    /// Quadwords of data following the tag
    pub fn data_qwords(&self) -> u32 {
        match self.format() {
            GifFormat::Packed => self.nloop() * self.nreg(),
            GifFormat::Reglist => (self.nloop() * self.nreg()).div_ceil(2),
            GifFormat::Image | GifFormat::Disabled => self.nloop(),
        }
    }
}

/// Position of one path inside its GIF packet stream
#[derive(Debug, Default, Clone, Copy)]
struct PacketTracker {
    /// Data quadwords left before the next GIFtag
    remaining: u32,
    /// The current packet ends the transfer
    eop: bool,
}

impl PacketTracker {
    /// Account for one quadword leaving the path
    ///
    /// # Returns
    ///
    /// `true` if this quadword finished an EOP packet
    fn feed(&mut self, qword: u128) -> bool {
        if self.remaining == 0 {
            let tag = GifTag::new(qword);
            self.remaining = tag.data_qwords();
            self.eop = tag.eop();
            log::trace!(
                "GIFtag nloop={} eop={} flg={:?} nreg={}",
                tag.nloop(),
                tag.eop(),
                tag.format(),
                tag.nreg()
            );
        } else {
            self.remaining -= 1;
        }

        if self.remaining == 0 && self.eop {
            self.eop = false;
            true
        } else {
            false
        }
    }
}

/// GS side of the GIF
pub trait GsSink {
    /// Receive quadwords from `path`, in order
    fn consume(&mut self, path: GifPath, data: &[u128]);
}

/// Sink that only counts quadwords
#[derive(Debug, Default)]
pub struct NullGsSink {
    pub received: [u64; 3],
}

impl GsSink for NullGsSink {
    fn consume(&mut self, path: GifPath, data: &[u128]) {
        self.received[path.index()] += data.len() as u64;
    }
}

/// GIF unit: PATH3 FIFO, direct-path staging and the path arbiter
pub struct GifUnit {
    /// PATH3 FIFO
    fifo: Fifo<u128>,

    /// PATH1 and PATH2 staging queues
    staged: [VecDeque<u128>; 2],

    /// Packet state per path
    packets: [PacketTracker; 3],

    /// Path holding the GS bus mid-packet
    owner: Option<GifPath>,

    /// GIF_CTRL (PSE only; RST is a strobe)
    ctrl: u32,

    /// GIF_MODE
    mode: u32,

    /// VIF1 MASKP3
    vif1_mask: bool,

    /// Quadwords the GS takes per drain
    drain_qwords: usize,

    /// Quadwords sent to the GS per path
    transferred: [u64; 3],
}

impl GifUnit {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            fifo: Fifo::new(config.gif_fifo_qwords.max(1)),
            staged: [VecDeque::new(), VecDeque::new()],
            packets: [PacketTracker::default(); 3],
            owner: None,
            ctrl: 0,
            mode: 0,
            vif1_mask: false,
            drain_qwords: config.gs_drain_qwords.max(1),
            transferred: [0; 3],
        }
    }

    /// Queue quadwords on a path
    ///
    /// PATH1 and PATH2 always take everything. PATH3 goes through the FIFO
    /// and takes what currently fits.
    ///
    /// # Returns
    ///
    /// Number of quadwords accepted
    pub fn submit(&mut self, path: GifPath, data: &[u128]) -> usize {
        match path {
            GifPath::Path1 | GifPath::Path2 => {
                self.staged[path.index()].extend(data.iter().copied());
                log::trace!("GIF: {} staged {} quadwords", path.name(), data.len());
                data.len()
            }
            GifPath::Path3 => self.write(data),
        }
    }

    /// Whether PATH3 is masked by GIF_MODE.M3R or VIF1 MASKP3
    pub fn path3_masked(&self) -> bool {
        self.mode & mode::M3R != 0 || self.vif1_mask
    }

    /// Set by VIF1 MASKP3
    pub fn set_vif1_mask(&mut self, masked: bool) {
        self.vif1_mask = masked;
    }

    pub fn paused(&self) -> bool {
        self.ctrl & ctrl::PSE != 0
    }

    /// Path currently holding the GS bus
    pub fn owner(&self) -> Option<GifPath> {
        self.owner
    }

    /// Quadwords in the PATH3 FIFO
    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }

    /// Quadwords waiting on a path
    pub fn queued(&self, path: GifPath) -> usize {
        match path {
            GifPath::Path1 | GifPath::Path2 => self.staged[path.index()].len(),
            GifPath::Path3 => self.fifo.len(),
        }
    }

    /// Quadwords sent to the GS from `path` since reset
    pub fn transferred(&self, path: GifPath) -> u64 {
        self.transferred[path.index()]
    }

    /// Whether PATH3 DMA must wait
    ///
    /// PATH3 keeps accepting while it owns the bus mid-packet, otherwise a
    /// waiting direct path could never get the bus.
    fn path3_blocked(&self) -> bool {
        if self.paused() {
            return true;
        }
        if self.owner == Some(GifPath::Path3) {
            return false;
        }
        self.owner.is_some() || self.staged.iter().any(|q| !q.is_empty()) || self.path3_masked()
    }

    fn has_data(&self, path: GifPath) -> bool {
        self.queued(path) > 0
    }

    /// Path that sends next
    fn select(&self) -> Option<GifPath> {
        if self.paused() {
            return None;
        }
        if let Some(owner) = self.owner {
            return self.has_data(owner).then_some(owner);
        }
        [GifPath::Path1, GifPath::Path2]
            .into_iter()
            .find(|&path| self.has_data(path))
            .or_else(|| {
                (self.has_data(GifPath::Path3) && !self.path3_masked()).then_some(GifPath::Path3)
            })
    }

    /// Whether a drain would move anything
    pub fn has_pending(&self) -> bool {
        self.select().is_some()
    }

    fn pop(&mut self, path: GifPath) -> Option<u128> {
        match path {
            GifPath::Path1 | GifPath::Path2 => self.staged[path.index()].pop_front(),
            GifPath::Path3 => self.fifo.pop(),
        }
    }

    /// Send up to one drain's worth of quadwords to the GS
    ///
    /// # Returns
    ///
    /// Number of quadwords sent
    pub fn drain(&mut self, sink: &mut dyn GsSink) -> usize {
        let mut moved = 0;
        while moved < self.drain_qwords {
            let Some(path) = self.select() else {
                break;
            };
            let Some(qword) = self.pop(path) else {
                break;
            };

            let packet_done = self.packets[path.index()].feed(qword);
            sink.consume(path, &[qword]);
            self.transferred[path.index()] += 1;
            moved += 1;

            if packet_done {
                log::trace!("GIF: {} released the bus", path.name());
                self.owner = None;
            } else if self.owner.is_none() {
                log::trace!("GIF: {} took the bus", path.name());
                self.owner = Some(path);
            }
        }
        moved
    }

    /// GIF_STAT value
    pub fn status(&self) -> u32 {
        let mut flags = GifStatus::empty();
        flags.set(GifStatus::M3R, self.mode & mode::M3R != 0);
        flags.set(GifStatus::M3P, self.vif1_mask);
        flags.set(GifStatus::IMT, self.mode & mode::IMT != 0);
        flags.set(GifStatus::PSE, self.paused());
        flags.set(GifStatus::OPH, self.owner.is_some());
        for (path, flag) in [
            (GifPath::Path1, GifStatus::P1Q),
            (GifPath::Path2, GifStatus::P2Q),
            (GifPath::Path3, GifStatus::P3Q),
        ] {
            flags.set(flag, self.has_data(path) && self.owner != Some(path));
        }

        let apath = self.owner.map_or(0, GifPath::apath);
        let fqc = (self.fifo.len() as u32).min(0x1F);
        flags.bits() | (apath << APATH_SHIFT) | (fqc << FQC_SHIFT)
    }

    /// Read a GIF register
    pub fn read(&self, addr: u32) -> Result<u32> {
        match addr {
            GIF_CTRL => Ok(self.ctrl),
            GIF_MODE => Ok(self.mode),
            GIF_STAT => Ok(self.status()),
            _ => Err(EmulatorError::InvalidRegister { address: addr }),
        }
    }

    /// Write a GIF register
    pub fn write_register(&mut self, addr: u32, value: u32) -> Result<()> {
        log::trace!("GIF write 0x{:08X} = 0x{:08X}", addr, value);
        match addr {
            GIF_CTRL => {
                if value & ctrl::RST != 0 {
                    log::debug!("GIF reset");
                    self.reset_paths();
                }
                self.ctrl = value & ctrl::PSE;
            }
            GIF_MODE => self.mode = value & (mode::M3R | mode::IMT),
            GIF_STAT => log::warn!("Write to read-only GIF_STAT ignored"),
            _ => return Err(EmulatorError::InvalidRegister { address: addr }),
        }
        Ok(())
    }

    /// Drop all queued data and packet state
    fn reset_paths(&mut self) {
        self.fifo.clear();
        for queue in &mut self.staged {
            queue.clear();
        }
        self.packets = [PacketTracker::default(); 3];
        self.owner = None;
    }

    pub fn reset(&mut self) {
        self.reset_paths();
        self.ctrl = 0;
        self.mode = 0;
        self.vif1_mask = false;
        self.transferred = [0; 3];
    }
}

/// PATH3: the GIF DMA channel's downstream side
impl DmaTarget for GifUnit {
    fn capacity(&self) -> usize {
        if self.path3_blocked() {
            0
        } else {
            self.fifo.free()
        }
    }

    fn write(&mut self, data: &[u128]) -> usize {
        let count = data.len().min(self.capacity());
        self.fifo.write(&data[..count])
    }
}
