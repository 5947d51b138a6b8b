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

//! Test fixtures for common transfer scenarios

use std::cell::RefCell;
use std::rc::Rc;

use ps2rx::core::config::CoreConfig;
use ps2rx::core::dma::{chcr, ctrl, reg, ChannelId, DmaTarget, DmaTargets, D_CTRL};
use ps2rx::core::system::System;

/// CHCR value for a chain transfer out of memory
#[allow(dead_code)]
pub const CHAIN_FROM_MEMORY: u32 = chcr::DIR | (1 << chcr::MOD_SHIFT);

/// CHCR value for a chain transfer into memory
#[allow(dead_code)]
pub const CHAIN_TO_MEMORY: u32 = 1 << chcr::MOD_SHIFT;

/// System with default configuration and 1MB of EE RAM
#[allow(dead_code)]
pub fn create_test_system() -> System {
    System::new(small_config()).expect("default configuration is valid")
}

/// Default configuration with a smaller EE RAM
#[allow(dead_code)]
pub fn small_config() -> CoreConfig {
    CoreConfig {
        main_ram_size: 1024 * 1024,
        ..CoreConfig::default()
    }
}

/// Set D_CTRL.DMAE
#[allow(dead_code)]
pub fn enable_dmac(system: &mut System) {
    system
        .ee_write32(D_CTRL, ctrl::DMAE)
        .expect("D_CTRL is mapped");
}

/// Program and start an EE channel through its registers
#[allow(dead_code)]
pub fn start_channel(system: &mut System, id: ChannelId, chcr: u32, madr: u32, qwc: u32, tadr: u32) {
    let base = id.base_address();
    system.ee_write32(base + reg::MADR, madr).unwrap();
    system.ee_write32(base + reg::QWC, qwc).unwrap();
    system.ee_write32(base + reg::TADR, tadr).unwrap();
    system.ee_write32(base + reg::CHCR, chcr | chcr::STR).unwrap();
}

/// Write a quadword as four little-endian words
#[allow(dead_code)]
pub fn qword(words: [u32; 4]) -> u128 {
    words
        .iter()
        .rev()
        .fold(0u128, |acc, &word| (acc << 32) | word as u128)
}

/// Write a four-word IOP DMA tag
#[allow(dead_code)]
pub fn write_iop_words(system: &mut System, addr: u32, words: &[u32]) {
    for (i, &word) in words.iter().enumerate() {
        system
            .iop_memory_mut()
            .write32(addr + i as u32 * 4, word)
            .unwrap();
    }
}

/// DMA target whose received quadwords stay visible to the test
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct SharedTarget {
    pub received: Rc<RefCell<Vec<u128>>>,
}

impl DmaTarget for SharedTarget {
    fn write(&mut self, data: &[u128]) -> usize {
        self.received.borrow_mut().extend_from_slice(data);
        data.len()
    }
}

/// System whose VIF1 endpoint records everything it receives
#[allow(dead_code)]
pub fn create_system_with_vif1() -> (System, SharedTarget) {
    let vif1 = SharedTarget::default();
    let targets = DmaTargets {
        vif1: Box::new(vif1.clone()),
        ..DmaTargets::default()
    };
    let system = System::with_collaborators(
        small_config(),
        targets,
        Box::new(ps2rx::core::gif::NullGsSink::default()),
    )
    .expect("default configuration is valid");
    (system, vif1)
}
