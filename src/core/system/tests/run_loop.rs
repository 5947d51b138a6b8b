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

#[test]
fn test_run_advances_both_clocks() {
    let mut system = system();
    assert_eq!(system.run(1000), 1000);
    assert_eq!(system.ee_cycle(), 1000);
    assert_eq!(system.iop_cycle(), 125);

    system.run(7);
    assert_eq!(system.iop_cycle(), 125);
    system.run(1);
    assert_eq!(system.iop_cycle(), 126);
}

#[test]
fn test_ee_event_cuts_iop_run_short() {
    let mut system = system();
    system.run(1000);

    // IOP's own next event is at EE-equivalent cycle 5000
    system.schedule_iop(IopEvent::Counter, 500);
    assert_eq!(system.iop_scheduler().due_cycle(IopEvent::Counter), Some(625));
    system.schedule_ee(EeEvent::Counter, 4);

    system.run(4);
    assert_eq!(system.ee_cycle(), 1004);
    assert_eq!(system.iop_cycle(), 125);
    assert_eq!(system.counter_ticks(), (1, 0));
    assert!(system.iop_scheduler().is_armed(IopEvent::Counter));

    system.run(4000);
    assert_eq!(system.counter_ticks(), (1, 1));
    assert_eq!(system.iop_cycle(), 5004 / 8);
}

#[test]
fn test_iop_wake_breaks_slice() {
    let mut system = system();
    enable_dmac(&mut system);

    write_iop_tag(&mut system, 0x1000, [0x2000 | (1 << 31), 8, 0x7000_0002, 0x5000]);
    for i in 0..8 {
        system.iop_memory_mut().write32(0x2000 + i * 4, 0x40 + i).unwrap();
    }
    system.iop_write32(0x1F80_152C, 0x1000).unwrap();
    system.iop_write32(0x1F80_1528, 1 << 24).unwrap();

    // EE SIF0 polls an empty FIFO until the IOP pushes data
    start_channel(&mut system, ChannelId::Sif0, CHAIN, 0, 0, 0);
    system.run(200);

    assert_eq!(system.clock_bridge().break_count(), 1);
    assert_eq!(
        system.memory().read_qword(0x5010).unwrap(),
        words_to_qword([0x44, 0x45, 0x46, 0x47])
    );
    assert!(system.is_idle());
}

#[test]
fn test_counter_events_are_periodic() {
    let config = CoreConfig {
        counter_period: 100,
        ..CoreConfig::default()
    };
    let mut system = System::new(config).unwrap();
    system.run(1000);

    // IOP period is 100 / 8 = 12 IOP cycles
    assert_eq!(system.counter_ticks(), (10, 10));
}

#[test]
fn test_run_zero_fires_due_events() {
    let mut system = system();
    system.schedule_ee(EeEvent::Counter, 0);
    assert_eq!(system.run(0), 0);
    assert_eq!(system.counter_ticks(), (1, 0));
}

#[test]
fn test_reset_returns_to_power_on() {
    let mut system = system();
    enable_dmac(&mut system);
    start_channel(&mut system, ChannelId::Vif0, chcr::DIR, 0, 4, 0);
    system.run(3);
    system.memory_mut().write32(0x100, 7).unwrap();

    system.reset();
    assert_eq!(system.ee_cycle(), 0);
    assert_eq!(system.iop_cycle(), 0);
    assert!(system.is_idle());
    assert_eq!(system.memory().read32(0x100).unwrap(), 0);
    assert_eq!(system.ee_scheduler().next_event_cycle(), crate::core::timing::NEVER);
}

#[test]
fn test_invalid_config_rejected() {
    let config = CoreConfig {
        clock_ratio: 0,
        ..CoreConfig::default()
    };
    assert!(System::new(config).is_err());
}
