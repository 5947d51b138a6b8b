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

//! DMAtag decoding and chain walkers
//!
//! A DMAtag is one quadword:
//!
//! ```text
//! Bits    | Field | Meaning
//! --------|-------|-------------------------------------
//! 0-15    | QWC   | Quadwords in the block
//! 26-27   | PCE   | Priority control
//! 28-30   | ID    | Tag opcode
//! 31      | IRQ   | Interrupt request (with CHCR.TIE)
//! 32-62   | ADDR  | Block / next tag address
//! 63      | SPR   | ADDR is a scratchpad address
//! 64-127  | -     | Payload sent downstream when CHCR.TTE is set
//! ```
//!
//! The walkers only update channel registers. Reading the tag and moving
//! the block are the controller's job.

use super::channel::Channel;

/// Source-chain tag opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagId {
    /// Transfer the block at ADDR, then end
    Refe = 0,
    /// Transfer the block following the tag, next tag follows the block
    Cnt = 1,
    /// Transfer the block following the tag, next tag at ADDR
    Next = 2,
    /// Transfer the block at ADDR, next tag follows this tag
    Ref = 3,
    /// REF with stall control
    Refs = 4,
    /// Push a return address, next tag at ADDR
    Call = 5,
    /// Pop the next tag address
    Ret = 6,
    /// Transfer the block following the tag, then end
    End = 7,
}

impl TagId {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 7 {
            0 => TagId::Refe,
            1 => TagId::Cnt,
            2 => TagId::Next,
            3 => TagId::Ref,
            4 => TagId::Refs,
            5 => TagId::Call,
            6 => TagId::Ret,
            _ => TagId::End,
        }
    }
}

/// Destination-chain id that publishes the stall address
pub const DEST_CNTS: u32 = 0;

/// Destination-chain id that ends the chain
pub const DEST_END: u32 = 7;

/// Decoded DMAtag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    raw: u128,
}

impl Tag {
    pub fn new(raw: u128) -> Self {
        Self { raw }
    }

    /// Build a tag from its fields (payload zero)
    pub fn build(id: TagId, qwc: u16, addr: u32, irq: bool) -> Self {
        let mut word0 = qwc as u32 | ((id as u32) << 28);
        if irq {
            word0 |= 1 << 31;
        }
        Self::new(word0 as u128 | ((addr as u128) << 32))
    }

    #[inline]
    pub fn raw(&self) -> u128 {
        self.raw
    }

    #[inline]
    fn word0(&self) -> u32 {
        self.raw as u32
    }

    pub fn qwc(&self) -> u32 {
        self.word0() & 0xFFFF
    }

    pub fn pce(&self) -> u32 {
        (self.word0() >> 26) & 3
    }

    /// Raw ID field (0-7)
    pub fn raw_id(&self) -> u32 {
        (self.word0() >> 28) & 7
    }

    pub fn id(&self) -> TagId {
        TagId::from_bits(self.raw_id())
    }

    pub fn irq(&self) -> bool {
        self.word0() & (1 << 31) != 0
    }

    /// ADDR with the SPR select bit in bit 31
    pub fn addr(&self) -> u32 {
        (self.raw >> 32) as u32
    }

    pub fn spr(&self) -> bool {
        self.addr() & 0x8000_0000 != 0
    }

    /// Upper half of the first word, mirrored into CHCR.TAG
    pub fn upper(&self) -> u16 {
        (self.word0() >> 16) as u16
    }

    /// Upper 64 bits
    pub fn payload(&self) -> u64 {
        (self.raw >> 64) as u64
    }
}

/// Result of walking one tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStep {
    /// More tags follow this block
    Continue,
    /// The chain ends after this block
    Stop,
    /// CALL with a full address stack; the chain ends after this block
    StackOverflow,
}

/// Copy a freshly read tag into the channel registers
///
/// Happens before the walker runs, on every tag read.
pub fn load_tag(ch: &mut Channel, tag: &Tag) {
    ch.set_tag_field(tag.upper());
    ch.qwc = tag.qwc();
    ch.madr = tag.addr();
}

/// Source-chain walker with the CALL/RET address stack
///
/// Used by VIF0, VIF1, GIF and toSPR.
///
/// * CALL pushes the address after its block and jumps to ADDR. A third
///   nested CALL stops the chain.
/// * CALL with ADDR 0 pushes nothing and continues after its block like
///   CNT.
/// * RET pops the stack. RET on an empty stack ends the chain.
pub fn walk_with_stack(ch: &mut Channel, tag: &Tag) -> ChainStep {
    match tag.id() {
        TagId::Call => {
            let target = ch.madr;
            ch.madr = ch.tadr.wrapping_add(16);
            let ret = ch.madr.wrapping_add(ch.qwc << 4);

            if target == 0 {
                // CALL to address 0 behaves as CNT
                ch.tadr = ret;
                return ChainStep::Continue;
            }

            match ch.asp() {
                0 => ch.asr[0] = ret,
                1 => ch.asr[1] = ret,
                _ => return ChainStep::StackOverflow,
            }
            ch.set_asp(ch.asp() + 1);
            ch.tadr = target;
            ChainStep::Continue
        }
        TagId::Ret => {
            ch.madr = ch.tadr.wrapping_add(16);
            match ch.asp() {
                2 => {
                    ch.tadr = std::mem::take(&mut ch.asr[1]);
                    ch.set_asp(1);
                    ChainStep::Continue
                }
                1 => {
                    ch.tadr = std::mem::take(&mut ch.asr[0]);
                    ch.set_asp(0);
                    ChainStep::Continue
                }
                _ => ChainStep::Stop,
            }
        }
        _ => walk_common(ch, tag),
    }
}

/// Source-chain walker without an address stack
///
/// Used by toIPU and SIF1. CALL and RET end the chain like END.
pub fn walk_simple(ch: &mut Channel, tag: &Tag) -> ChainStep {
    match tag.id() {
        TagId::Call | TagId::Ret => {
            log::warn!(
                "DMA {}: tag id {} not supported, treated as END",
                ch.id.name(),
                tag.raw_id()
            );
            ch.madr = ch.tadr.wrapping_add(16);
            ChainStep::Stop
        }
        _ => walk_common(ch, tag),
    }
}

fn walk_common(ch: &mut Channel, tag: &Tag) -> ChainStep {
    match tag.id() {
        TagId::Refe => {
            ch.tadr = ch.tadr.wrapping_add(16);
            ChainStep::Stop
        }
        TagId::Cnt => {
            ch.madr = ch.tadr.wrapping_add(16);
            ch.tadr = ch.madr;
            ChainStep::Continue
        }
        TagId::Next => {
            let next = ch.madr;
            ch.madr = ch.tadr.wrapping_add(16);
            ch.tadr = next;
            ChainStep::Continue
        }
        TagId::Ref | TagId::Refs => {
            ch.tadr = ch.tadr.wrapping_add(16);
            ChainStep::Continue
        }
        TagId::End | TagId::Call | TagId::Ret => {
            ch.madr = ch.tadr.wrapping_add(16);
            ChainStep::Stop
        }
    }
}

/// Destination-chain walker
///
/// Used by fromSPR and SIF0, where tags arrive in front of the data. MADR
/// already holds ADDR after [`load_tag`].
pub fn walk_destination(_ch: &mut Channel, tag: &Tag) -> ChainStep {
    if tag.raw_id() == DEST_END {
        ChainStep::Stop
    } else {
        ChainStep::Continue
    }
}

/// Whether the tag currently mirrored in CHCR.TAG ends the chain
///
/// Decides if a residual block (chain started with QWC > 0) is the last.
pub fn residual_ends_chain(ch: &Channel, destination: bool) -> bool {
    let upper = ch.tag_field() as u32;
    let id = (upper >> 12) & 7;
    let irq = upper & 0x8000 != 0;
    let stops = if destination {
        id == DEST_END
    } else {
        id == TagId::Refe as u32 || id == TagId::End as u32
    };
    stops || (irq && ch.tie())
}
