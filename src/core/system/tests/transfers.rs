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
use crate::core::dma::{Tag, TagId, D_STAT};
use crate::core::gif::{GifFormat, GifTag};
use crate::core::sif::DICR2;

fn image_tag(nloop: u16) -> u128 {
    GifTag::build(nloop, true, GifFormat::Image, 0).raw()
}

#[test]
fn test_gif_dma_reaches_gs() {
    let sink = SharedSink::default();
    let mut system = system();
    system.set_gs_sink(Box::new(sink.clone()));
    enable_dmac(&mut system);

    system.memory_mut().write_qword(0x1000, image_tag(2)).unwrap();
    system.memory_mut().write_qword(0x1010, 1).unwrap();
    system.memory_mut().write_qword(0x1020, 2).unwrap();
    start_channel(&mut system, ChannelId::Gif, chcr::DIR, 0x1000, 3, 0);
    system.run(200);

    assert_eq!(system.gif().transferred(GifPath::Path3), 3);
    assert_eq!(*sink.0.borrow(), vec![GifPath::Path3; 3]);
    assert_eq!(system.ee_read32(D_STAT).unwrap() & (1 << 2), 1 << 2);
    assert!(system.is_idle());
}

#[test]
fn test_direct_path_goes_before_path3() {
    let sink = SharedSink::default();
    let mut system = system();
    system.set_gs_sink(Box::new(sink.clone()));
    enable_dmac(&mut system);

    system.memory_mut().write_qword(0x1000, image_tag(2)).unwrap();
    start_channel(&mut system, ChannelId::Gif, chcr::DIR, 0x1000, 3, 0);
    assert_eq!(system.submit_path(GifPath::Path1, &[image_tag(1), 9]), 2);
    system.run(200);

    assert_eq!(
        *sink.0.borrow(),
        vec![
            GifPath::Path1,
            GifPath::Path1,
            GifPath::Path3,
            GifPath::Path3,
            GifPath::Path3
        ]
    );
}

#[test]
fn test_paused_gif_holds_data() {
    let mut system = system();
    system.ee_write32(crate::core::gif::GIF_CTRL, 1 << 3).unwrap();
    system.submit_path(GifPath::Path2, &[image_tag(1), 5]);
    system.run(100);
    assert_eq!(system.gif().transferred(GifPath::Path2), 0);

    system.ee_write32(crate::core::gif::GIF_CTRL, 0).unwrap();
    system.run(100);
    assert_eq!(system.gif().transferred(GifPath::Path2), 2);
}

#[test]
fn test_sif1_round_trip() {
    let mut system = system();
    enable_dmac(&mut system);

    let mem = system.memory_mut();
    mem.write_qword(0x1000, Tag::build(TagId::End, 2, 0, false).raw())
        .unwrap();
    mem.write_qword(0x1010, words_to_qword([0x3000 | (1 << 31), 4, 0, 0]))
        .unwrap();
    mem.write_qword(0x1020, words_to_qword([5, 6, 7, 8])).unwrap();

    system.iop_write32(0x1F80_1538, 1 << 24).unwrap();
    start_channel(&mut system, ChannelId::Sif1, chcr::DIR | CHAIN, 0, 0, 0x1000);
    system.run(500);

    for (i, expected) in [5, 6, 7, 8].into_iter().enumerate() {
        assert_eq!(
            system.iop_memory().read32(0x3000 + i as u32 * 4).unwrap(),
            expected
        );
    }
    assert_eq!(system.ee_read32(D_STAT).unwrap() & (1 << 6), 1 << 6);
    assert_eq!(system.iop_read32(DICR2).unwrap() & (1 << 27), 1 << 27);
    assert!(system.is_idle());
}

#[test]
fn test_sif1_iop_started_late() {
    let mut system = system();
    enable_dmac(&mut system);

    let mem = system.memory_mut();
    mem.write_qword(0x1000, Tag::build(TagId::End, 2, 0, false).raw())
        .unwrap();
    mem.write_qword(0x1010, words_to_qword([0x3000 | (1 << 31), 4, 0, 0]))
        .unwrap();
    mem.write_qword(0x1020, words_to_qword([1, 2, 3, 4])).unwrap();

    start_channel(&mut system, ChannelId::Sif1, chcr::DIR | CHAIN, 0, 0, 0x1000);
    system.run(100);
    assert_eq!(system.sif().sif1_len(), 8);

    system.iop_write32(0x1F80_1538, 1 << 24).unwrap();
    system.run(100);
    assert_eq!(system.iop_memory().read32(0x300C).unwrap(), 4);
    assert_eq!(system.sif().sif1_len(), 0);
}

#[test]
fn test_sif0_round_trip() {
    let mut system = system();
    enable_dmac(&mut system);

    write_iop_tag(&mut system, 0x1000, [0x2000, 4, 0x1000_0001, 0x6000]);
    write_iop_tag(&mut system, 0x1010, [0x2100 | (1 << 31), 4, 0x7000_0001, 0x6010]);
    for i in 0..4 {
        system.iop_memory_mut().write32(0x2000 + i * 4, 0xA0 + i).unwrap();
        system.iop_memory_mut().write32(0x2100 + i * 4, 0xB0 + i).unwrap();
    }

    start_channel(&mut system, ChannelId::Sif0, CHAIN, 0, 0, 0);
    system.iop_write32(0x1F80_152C, 0x1000).unwrap();
    system.iop_write32(0x1F80_1528, 1 << 24).unwrap();
    system.run(1000);

    assert_eq!(
        system.memory().read_qword(0x6000).unwrap(),
        words_to_qword([0xA0, 0xA1, 0xA2, 0xA3])
    );
    assert_eq!(
        system.memory().read_qword(0x6010).unwrap(),
        words_to_qword([0xB0, 0xB1, 0xB2, 0xB3])
    );
    assert_eq!(system.ee_read32(D_STAT).unwrap() & (1 << 5), 1 << 5);
    assert!(system.is_idle());
}

#[test]
fn test_scratchpad_round_trip() {
    let mut system = system();
    enable_dmac(&mut system);

    system.memory_mut().write_qword(0x2000, 0x1234).unwrap();
    start_channel(&mut system, ChannelId::ToSpr, 0, 0x2000, 1, 0);
    system.run(50);
    start_channel(&mut system, ChannelId::FromSpr, 0, 0x3000, 1, 0);
    system.run(50);

    assert_eq!(system.memory().read_qword(0x3000).unwrap(), 0x1234);
    assert!(system.is_idle());
}
