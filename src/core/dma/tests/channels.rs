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

//! Scratchpad channel tests
//!
//! fromSPR/toSPR move data between main memory and the scratchpad without
//! a downstream unit.

use super::super::*;
use super::helpers::*;

#[test]
fn test_channel_addresses() {
    for id in ChannelId::ALL {
        assert_eq!(ChannelId::from_address(id.base_address()), Some(id));
        assert_eq!(ChannelId::from_address(id.base_address() + reg::SADR), Some(id));
        assert_eq!(ChannelId::from_index(id.index()), Some(id));
    }
    assert_eq!(ChannelId::from_address(0x1000_E000), None);
    assert!(ChannelId::FromSpr.is_spr());
    assert!(ChannelId::ToSpr.is_spr());
    assert!(!ChannelId::Gif.is_spr());
}

#[test]
fn test_to_spr_chain() {
    let mut dmac = enabled_controller();
    let mut mem = memory();

    write_tag(&mut mem, 0x1000, Tag::build(TagId::Cnt, 2, 0, false));
    fill(&mut mem, 0x1010, 2, 0x40);
    write_tag(&mut mem, 0x1030, Tag::build(TagId::End, 1, 0, false));
    mem.write_qword(0x1040, 0x50).unwrap();

    dmac.write(reg_addr(ChannelId::ToSpr, reg::SADR), 0x100).unwrap();
    start(&mut dmac, ChannelId::ToSpr, CHAIN_FROM_MEMORY, 0, 0, 0x1000);
    let summary = run(&mut dmac, ChannelId::ToSpr, &mut mem, None, 8);

    assert_eq!(summary.completions, 1);
    assert_eq!(mem.read_spr_qword(0x100), 0x40);
    assert_eq!(mem.read_spr_qword(0x110), 0x41);
    assert_eq!(mem.read_spr_qword(0x120), 0x50);
    assert_eq!(dmac.channel(ChannelId::ToSpr).sadr, 0x130);
}

#[test]
fn test_to_spr_tte_writes_whole_tag() {
    let mut dmac = enabled_controller();
    let mut mem = memory();

    let cnt = Tag::build(TagId::Cnt, 1, 0, false);
    let end = Tag::build(TagId::End, 0, 0, false);
    write_tag(&mut mem, 0x1000, cnt);
    mem.write_qword(0x1010, 0x77).unwrap();
    write_tag(&mut mem, 0x1020, end);

    start(&mut dmac, ChannelId::ToSpr, CHAIN_FROM_MEMORY | chcr::TTE, 0, 0, 0x1000);
    run(&mut dmac, ChannelId::ToSpr, &mut mem, None, 8);

    assert_eq!(mem.read_spr_qword(0x00), cnt.raw());
    assert_eq!(mem.read_spr_qword(0x10), 0x77);
    assert_eq!(mem.read_spr_qword(0x20), end.raw());
}

#[test]
fn test_from_spr_destination_chain() {
    let mut dmac = enabled_controller();
    let mut mem = memory();

    mem.write_spr_qword(0x00, Tag::build(TagId::Cnt, 1, 0x4000, false).raw());
    mem.write_spr_qword(0x10, 0xAA);
    mem.write_spr_qword(0x20, Tag::build(TagId::End, 1, 0x5000, false).raw());
    mem.write_spr_qword(0x30, 0xBB);

    start(&mut dmac, ChannelId::FromSpr, 1 << chcr::MOD_SHIFT, 0, 0, 0);
    let summary = run(&mut dmac, ChannelId::FromSpr, &mut mem, None, 8);

    assert_eq!(summary.completions, 1);
    assert_eq!(mem.read_qword(0x4000).unwrap(), 0xAA);
    assert_eq!(mem.read_qword(0x5000).unwrap(), 0xBB);
    assert_eq!(dmac.channel(ChannelId::FromSpr).sadr, 0x40);
}

#[test]
fn test_sadr_wraps_inside_scratchpad() {
    let mut dmac = enabled_controller();
    let mut mem = memory();
    fill(&mut mem, 0x2000, 2, 0x10);

    dmac.write(reg_addr(ChannelId::ToSpr, reg::SADR), 0x3FF0).unwrap();
    start(&mut dmac, ChannelId::ToSpr, 0, 0x2000, 2, 0);
    run(&mut dmac, ChannelId::ToSpr, &mut mem, None, 4);

    assert_eq!(mem.read_spr_qword(0x3FF0), 0x10);
    assert_eq!(mem.read_spr_qword(0x0000), 0x11);
    assert_eq!(dmac.channel(ChannelId::ToSpr).sadr, 0x10);
}

#[test]
fn test_spr_channels_ignore_port() {
    let mut dmac = enabled_controller();
    let mut mem = memory();
    let mut unused = BufferTarget::new();
    mem.write_spr_qword(0, 0x99);

    start(&mut dmac, ChannelId::FromSpr, 0, 0x3000, 1, 0);
    run(&mut dmac, ChannelId::FromSpr, &mut mem, Some(&mut unused), 4);

    assert!(unused.received.is_empty());
    assert_eq!(mem.read_qword(0x3000).unwrap(), 0x99);
}
