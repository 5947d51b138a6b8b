// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::core::dma::channel::chcr;
use crate::core::dma::{ctrl, D_CTRL};

mod registers;
mod run_loop;
mod transfers;

pub(super) fn system() -> System {
    System::new(CoreConfig::default()).unwrap()
}

pub(super) fn enable_dmac(system: &mut System) {
    system.ee_write32(D_CTRL, ctrl::DMAE).unwrap();
}

/// Program and start an EE channel
pub(super) fn start_channel(system: &mut System, id: ChannelId, chcr: u32, madr: u32, qwc: u32, tadr: u32) {
    let base = id.base_address();
    system.ee_write32(base + 0x10, madr).unwrap();
    system.ee_write32(base + 0x20, qwc).unwrap();
    system.ee_write32(base + 0x30, tadr).unwrap();
    system.ee_write32(base, chcr | chcr::STR).unwrap();
}

/// CHCR for a chain transfer
pub(super) const CHAIN: u32 = 1 << chcr::MOD_SHIFT;

pub(super) fn write_iop_tag(system: &mut System, addr: u32, tag: [u32; 4]) {
    for (i, word) in tag.into_iter().enumerate() {
        system.iop_memory_mut().write32(addr + i as u32 * 4, word).unwrap();
    }
}

pub(super) fn words_to_qword(words: [u32; 4]) -> u128 {
    words
        .iter()
        .rev()
        .fold(0u128, |acc, &word| (acc << 32) | word as u128)
}

/// GS consumer that records the path of every quadword
#[derive(Clone, Default)]
pub(super) struct SharedSink(pub Rc<RefCell<Vec<GifPath>>>);

impl GsSink for SharedSink {
    fn consume(&mut self, path: GifPath, data: &[u128]) {
        self.0.borrow_mut().extend(std::iter::repeat_n(path, data.len()));
    }
}
