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

//! Test helpers for DMA controller tests

use super::super::*;

/// Controller with default timing (2 cycles per quadword, 4 per tag)
pub fn controller() -> DmaController {
    DmaController::new(&CoreConfig::default())
}

/// Controller with DMAE set
pub fn enabled_controller() -> DmaController {
    let mut dmac = controller();
    dmac.write(D_CTRL, ctrl::DMAE).unwrap();
    dmac
}

/// 1MB of EE memory
pub fn memory() -> MainMemory {
    MainMemory::new(1024 * 1024)
}

/// Address of a channel register
pub fn reg_addr(id: ChannelId, offset: u32) -> u32 {
    id.base_address() + offset
}

pub fn write_tag(mem: &mut MainMemory, addr: u32, tag: Tag) {
    mem.write_qword(addr, tag.raw()).unwrap();
}

/// Fill `count` quadwords at `addr` with `first`, `first + 1`, ...
pub fn fill(mem: &mut MainMemory, addr: u32, count: u32, first: u128) {
    for i in 0..count {
        mem.write_qword(addr + i * 16, first + i as u128).unwrap();
    }
}

/// Program and start a channel
pub fn start(dmac: &mut DmaController, id: ChannelId, chcr: u32, madr: u32, qwc: u32, tadr: u32) {
    dmac.write(reg_addr(id, reg::MADR), madr).unwrap();
    dmac.write(reg_addr(id, reg::QWC), qwc).unwrap();
    dmac.write(reg_addr(id, reg::TADR), tadr).unwrap();
    dmac.write(reg_addr(id, reg::CHCR), chcr | chcr::STR).unwrap();
}

/// CHCR value for a chain transfer out of memory
pub const CHAIN_FROM_MEMORY: u32 = chcr::DIR | (1 << chcr::MOD_SHIFT);

/// Steps taken and cycles spent by [`run`]
#[derive(Debug)]
pub struct RunSummary {
    pub steps: usize,
    pub cycles: u64,
    pub completions: usize,
    pub last: StepResult,
}

/// Step a channel until it stops producing continuations
pub fn run(
    dmac: &mut DmaController,
    id: ChannelId,
    mem: &mut MainMemory,
    mut port: Option<&mut dyn DmaTarget>,
    max_steps: usize,
) -> RunSummary {
    let mut summary = RunSummary {
        steps: 0,
        cycles: 0,
        completions: 0,
        last: StepResult::Done,
    };
    while summary.steps < max_steps {
        let result = dmac.step(id, mem, port.as_deref_mut().map(|p| p as &mut dyn DmaTarget));
        summary.steps += 1;
        summary.last = result;
        match result {
            StepResult::Continue(delay) => summary.cycles += delay as u64,
            StepResult::Completing(delay) => {
                summary.cycles += delay as u64;
                summary.completions += 1;
            }
            StepResult::Done | StepResult::Waiting | StepResult::Faulted => break,
        }
    }
    summary
}
