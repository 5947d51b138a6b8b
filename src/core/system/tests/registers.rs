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

use super::*;
use crate::core::dma::{D_ENABLEW, D_PCR};
use crate::core::error::EmulatorError;
use crate::core::gif::{GIF_MODE, GIF_STAT};
use crate::core::sif::{ee_reg, iop_reg};

#[test]
fn test_unmapped_addresses() {
    let mut system = system();
    assert!(matches!(
        system.ee_read32(0x1000_4000),
        Err(EmulatorError::InvalidRegister { address: 0x1000_4000 })
    ));
    assert!(system.ee_write32(0x1200_2000, 0).is_err());
    assert!(system.iop_read32(0x1F80_1100).is_err());
    assert!(system.iop_write32(0x1F80_1080, 0).is_err());
}

#[test]
fn test_intc_mask_toggles() {
    let mut system = system();
    system.ee_write32(INTC_MASK, 0x5).unwrap();
    system.ee_write32(INTC_MASK, 0x1).unwrap();
    assert_eq!(system.ee_read32(INTC_MASK).unwrap(), 0x4);
}

#[test]
fn test_dmac_registers_routed() {
    let mut system = system();
    system.ee_write32(0x1000_9010, 0x0002_0000).unwrap();
    assert_eq!(system.ee_read32(0x1000_9010).unwrap(), 0x0002_0000);

    system.ee_write32(D_PCR, 0x8000_0000).unwrap();
    assert_eq!(system.ee_read32(D_PCR).unwrap(), 0x8000_0000);

    system.ee_write32(D_ENABLEW, 1 << 16).unwrap();
    assert_eq!(system.ee_read32(D_ENABLEW).unwrap(), 1 << 16);
}

#[test]
fn test_gif_registers_routed() {
    let mut system = system();
    system.ee_write32(GIF_MODE, 1).unwrap();
    assert_eq!(system.ee_read32(GIF_STAT).unwrap() & 1, 1);
    assert!(system.gif().path3_masked());
}

#[test]
fn test_mailbox_seen_from_both_sides() {
    let mut system = system();
    system.ee_write32(ee_reg::MSCOM, 0xCAFE).unwrap();
    assert_eq!(system.iop_read32(iop_reg::MSCOM).unwrap(), 0xCAFE);

    system.iop_write32(iop_reg::SMFLG, 0x10).unwrap();
    assert_eq!(system.ee_read32(ee_reg::SMFLG).unwrap(), 0x10);
}

#[test]
fn test_iop_channel_registers_routed() {
    let mut system = system();
    system.iop_write32(0x1F80_1530, 0x4000).unwrap();
    assert_eq!(system.iop_read32(0x1F80_1530).unwrap(), 0x4000);
    assert_eq!(system.sif().iop_channel(IopSifId::Sif1).madr, 0x4000);
}

#[test]
fn test_channel_start_through_register_write() {
    let mut system = system();
    enable_dmac(&mut system);
    start_channel(&mut system, ChannelId::Vif1, chcr::DIR, 0, 1, 0);

    // The kick is armed before any cycle passes
    assert!(system
        .ee_scheduler()
        .is_armed(EeEvent::dma(ChannelId::Vif1.index())));
}

#[test]
fn test_queued_channel_starts_on_dmae() {
    let mut system = system();
    start_channel(&mut system, ChannelId::Vif1, chcr::DIR, 0, 1, 0);
    system.run(50);
    assert!(!system.is_idle());

    enable_dmac(&mut system);
    system.run(50);
    assert!(system.is_idle());
}
