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

//! Custom assertions for transfer tests

use ps2rx::core::dma::D_STAT;
use ps2rx::core::system::System;

/// Assert an IOP RAM word has the expected value
#[allow(dead_code)]
pub fn assert_iop_word(system: &System, addr: u32, expected: u32) {
    let actual = system
        .iop_memory()
        .read32(addr)
        .expect("Failed to read IOP memory");
    assert_eq!(
        actual, expected,
        "IOP memory at 0x{:08X} mismatch: expected 0x{:08X}, got 0x{:08X}",
        addr, expected, actual
    );
}

/// Assert an EE RAM quadword has the expected value
#[allow(dead_code)]
pub fn assert_ee_qword(system: &System, addr: u32, expected: u128) {
    let actual = system
        .memory()
        .read_qword(addr)
        .expect("Failed to read EE memory");
    assert_eq!(
        actual, expected,
        "EE memory at 0x{:08X} mismatch: expected 0x{:032X}, got 0x{:032X}",
        addr, expected, actual
    );
}

/// Assert D_STAT.CIS is set for `channel`
#[allow(dead_code)]
pub fn assert_channel_done(system: &System, channel: usize) {
    let stat = system.ee_read32(D_STAT).expect("D_STAT is mapped");
    assert!(
        stat & (1 << channel) != 0,
        "channel {} not flagged in D_STAT 0x{:08X}",
        channel,
        stat
    );
}
