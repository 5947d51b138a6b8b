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

//! DMAC channel registers
//!
//! # Channel Registers
//!
//! | Offset | Register | Notes                               |
//! |--------|----------|-------------------------------------|
//! | 0x00   | CHCR     | Channel control                     |
//! | 0x10   | MADR     | Memory address (bit 31 = SPR)       |
//! | 0x20   | QWC      | Quadword count (16 bits)            |
//! | 0x30   | TADR     | Tag address                         |
//! | 0x40   | ASR0     | Address stack slot 0                |
//! | 0x50   | ASR1     | Address stack slot 1                |
//! | 0x80   | SADR     | Scratchpad address (SPR channels)   |
//!
//! # CHCR
//!
//! ```text
//! Bit    | Field | Meaning
//! -------|-------|-------------------------------------------
//! 0      | DIR   | 1 = from memory, 0 = to memory
//! 2-3    | MOD   | 0 normal, 1 chain, 2 interleave
//! 4-5    | ASP   | Address stack pointer (CALL depth)
//! 6      | TTE   | Transfer the tag's upper 64 bits
//! 7      | TIE   | Honour the tag IRQ bit
//! 8      | STR   | Start / busy
//! 16-31  | TAG   | Upper 16 bits of the last tag read
//! ```

/// Number of DMAC channels
pub const CHANNEL_COUNT: usize = 10;

/// Largest transfer a channel can hold (QWC = 0 in normal mode)
pub const MAX_QWC: u32 = 0x1_0000;

/// DMAC channels, in hardware order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelId {
    Vif0 = 0,
    Vif1 = 1,
    Gif = 2,
    FromIpu = 3,
    ToIpu = 4,
    Sif0 = 5,
    Sif1 = 6,
    Sif2 = 7,
    FromSpr = 8,
    ToSpr = 9,
}

/// Which tag walker a channel uses in chain mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainKind {
    /// Full source chain including CALL/RET
    Stack,
    /// Source chain without the address stack
    Simple,
    /// Tags arrive with the data from the source side
    Destination,
    /// Chain mode is not supported by the channel
    Unsupported,
}

impl ChannelId {
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [
        ChannelId::Vif0,
        ChannelId::Vif1,
        ChannelId::Gif,
        ChannelId::FromIpu,
        ChannelId::ToIpu,
        ChannelId::Sif0,
        ChannelId::Sif1,
        ChannelId::Sif2,
        ChannelId::FromSpr,
        ChannelId::ToSpr,
    ];

    /// Channel by index (0-9)
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Register block base address
    pub fn base_address(self) -> u32 {
        match self {
            ChannelId::Vif0 => 0x1000_8000,
            ChannelId::Vif1 => 0x1000_9000,
            ChannelId::Gif => 0x1000_A000,
            ChannelId::FromIpu => 0x1000_B000,
            ChannelId::ToIpu => 0x1000_B400,
            ChannelId::Sif0 => 0x1000_C000,
            ChannelId::Sif1 => 0x1000_C400,
            ChannelId::Sif2 => 0x1000_C800,
            ChannelId::FromSpr => 0x1000_D000,
            ChannelId::ToSpr => 0x1000_D400,
        }
    }

    /// Channel whose register block contains `addr`
    pub fn from_address(addr: u32) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|ch| (ch.base_address()..ch.base_address() + 0x100).contains(&addr))
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Vif0 => "VIF0",
            ChannelId::Vif1 => "VIF1",
            ChannelId::Gif => "GIF",
            ChannelId::FromIpu => "fromIPU",
            ChannelId::ToIpu => "toIPU",
            ChannelId::Sif0 => "SIF0",
            ChannelId::Sif1 => "SIF1",
            ChannelId::Sif2 => "SIF2",
            ChannelId::FromSpr => "fromSPR",
            ChannelId::ToSpr => "toSPR",
        }
    }

    /// Scratchpad transfer channel
    #[inline]
    pub fn is_spr(self) -> bool {
        matches!(self, ChannelId::FromSpr | ChannelId::ToSpr)
    }

    /// Whether the channel moves data out of memory
    ///
    /// VIF1 and SIF2 are bidirectional and follow CHCR.DIR; the others are
    /// wired one way.
    pub fn reads_memory(self, dir: bool) -> bool {
        match self {
            ChannelId::Vif1 | ChannelId::Sif2 => dir,
            ChannelId::FromIpu | ChannelId::Sif0 | ChannelId::FromSpr => false,
            _ => true,
        }
    }

    /// Walker used in chain mode
    pub fn chain_kind(self, dir: bool) -> ChainKind {
        match self {
            ChannelId::Vif0 | ChannelId::Gif | ChannelId::ToSpr => ChainKind::Stack,
            ChannelId::Vif1 if dir => ChainKind::Stack,
            ChannelId::ToIpu | ChannelId::Sif1 => ChainKind::Simple,
            ChannelId::Sif2 if dir => ChainKind::Simple,
            ChannelId::Sif0 | ChannelId::FromSpr => ChainKind::Destination,
            ChannelId::Sif2 => ChainKind::Destination,
            _ => ChainKind::Unsupported,
        }
    }

    /// Whether TTE sends the tag payload downstream
    pub fn supports_tte(self) -> bool {
        matches!(
            self,
            ChannelId::Vif0 | ChannelId::Vif1 | ChannelId::Sif1 | ChannelId::ToSpr
        )
    }
}

/// Effective transfer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Normal,
    Chain,
    Interleave,
}

/// CHCR field accessors
pub mod chcr {
    pub const DIR: u32 = 1 << 0;
    pub const MOD_SHIFT: u32 = 2;
    pub const MOD_MASK: u32 = 0x3 << MOD_SHIFT;
    pub const ASP_SHIFT: u32 = 4;
    pub const ASP_MASK: u32 = 0x3 << ASP_SHIFT;
    pub const TTE: u32 = 1 << 6;
    pub const TIE: u32 = 1 << 7;
    pub const STR: u32 = 1 << 8;
    pub const TAG_SHIFT: u32 = 16;
    pub const TAG_MASK: u32 = 0xFFFF << TAG_SHIFT;

    /// Bits the guest can write
    pub const WRITABLE: u32 = DIR | MOD_MASK | ASP_MASK | TTE | TIE | STR | TAG_MASK;
}

/// One DMAC channel
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,

    /// CHCR
    pub chcr: u32,

    /// MADR - Memory address of the current block
    pub madr: u32,

    /// Remaining quadwords of the current block
    ///
    /// Kept wider than the 16-bit register so a normal transfer started
    /// with QWC = 0 can hold 0x10000.
    pub qwc: u32,

    /// TADR - Address of the next tag
    pub tadr: u32,

    /// ASR0/ASR1 - CALL return addresses
    pub asr: [u32; 2],

    /// SADR - Scratchpad address
    pub sadr: u32,

    /// The chain hit a stop condition; the transfer ends after the current block
    pub chain_done: bool,

    /// The transfer was begun (as opposed to queued)
    pub active: bool,

    /// The final block has moved and the completion event is pending
    pub completing: bool,

    /// Current block lives in the MFIFO ring
    pub in_ring: bool,

    /// Quadwords left in the current interleave block
    pub interleave_left: u32,

    /// Quadwords moved since reset
    pub transferred: u64,
}

impl Channel {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            chcr: 0,
            madr: 0,
            qwc: 0,
            tadr: 0,
            asr: [0; 2],
            sadr: 0,
            chain_done: false,
            active: false,
            completing: false,
            in_ring: false,
            interleave_left: 0,
            transferred: 0,
        }
    }

    /// STR bit
    #[inline(always)]
    pub fn is_started(&self) -> bool {
        self.chcr & chcr::STR != 0
    }

    /// DIR bit
    #[inline(always)]
    pub fn dir(&self) -> bool {
        self.chcr & chcr::DIR != 0
    }

    /// Raw MOD field
    #[inline(always)]
    pub fn raw_mode(&self) -> u32 {
        (self.chcr & chcr::MOD_MASK) >> chcr::MOD_SHIFT
    }

    /// Mode the channel actually runs in
    ///
    /// MOD 3 behaves as chain. Interleave only exists on the scratchpad
    /// channels; elsewhere it runs as a normal transfer.
    pub fn mode(&self) -> TransferMode {
        match self.raw_mode() {
            0 => TransferMode::Normal,
            2 if self.id.is_spr() => TransferMode::Interleave,
            2 => TransferMode::Normal,
            _ => TransferMode::Chain,
        }
    }

    /// Address stack depth
    #[inline(always)]
    pub fn asp(&self) -> u32 {
        (self.chcr & chcr::ASP_MASK) >> chcr::ASP_SHIFT
    }

    pub fn set_asp(&mut self, asp: u32) {
        self.chcr = (self.chcr & !chcr::ASP_MASK) | ((asp & 3) << chcr::ASP_SHIFT);
    }

    #[inline(always)]
    pub fn tte(&self) -> bool {
        self.chcr & chcr::TTE != 0
    }

    #[inline(always)]
    pub fn tie(&self) -> bool {
        self.chcr & chcr::TIE != 0
    }

    /// CHCR.TAG field
    #[inline(always)]
    pub fn tag_field(&self) -> u16 {
        (self.chcr >> chcr::TAG_SHIFT) as u16
    }

    pub fn set_tag_field(&mut self, upper: u16) {
        self.chcr = (self.chcr & !chcr::TAG_MASK) | ((upper as u32) << chcr::TAG_SHIFT);
    }

    /// Clear STR and all transfer progress flags
    pub fn stop(&mut self) {
        self.chcr &= !chcr::STR;
        self.active = false;
        self.completing = false;
        self.chain_done = false;
        self.in_ring = false;
        self.interleave_left = 0;
    }

    /// QWC register view
    #[inline]
    pub fn qwc_register(&self) -> u32 {
        self.qwc & 0xFFFF
    }

    /// Zero every register
    pub fn reset(&mut self) {
        *self = Self::new(self.id);
    }
}
