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

//! GIFtag decoding and packet boundaries

use super::*;

#[test]
fn test_tag_fields() {
    let raw = 0x0003u128 | (1 << 15) | (1u128 << 58) | (5u128 << 60);
    let tag = GifTag::new(raw);
    assert_eq!(tag.nloop(), 3);
    assert!(tag.eop());
    assert_eq!(tag.format(), GifFormat::Reglist);
    assert_eq!(tag.nreg(), 5);
}

#[test]
fn test_data_qwords_per_format() {
    assert_eq!(GifTag::build(3, false, GifFormat::Packed, 2).data_qwords(), 6);
    assert_eq!(GifTag::build(3, false, GifFormat::Reglist, 3).data_qwords(), 5);
    assert_eq!(GifTag::build(3, false, GifFormat::Reglist, 2).data_qwords(), 3);
    assert_eq!(GifTag::build(7, false, GifFormat::Image, 9).data_qwords(), 7);
    assert_eq!(GifTag::build(7, false, GifFormat::Disabled, 0).data_qwords(), 7);
}

#[test]
fn test_nreg_zero_means_sixteen() {
    let tag = GifTag::build(2, false, GifFormat::Packed, 0);
    assert_eq!(tag.nreg(), 16);
    assert_eq!(tag.data_qwords(), 32);
}

#[test]
fn test_tracker_releases_after_eop_data() {
    let mut tracker = PacketTracker::default();
    assert!(!tracker.feed(GifTag::build(2, true, GifFormat::Image, 0).raw()));
    assert!(!tracker.feed(0));
    assert!(tracker.feed(0));
}

#[test]
fn test_tracker_empty_eop_packet() {
    let mut tracker = PacketTracker::default();
    assert!(tracker.feed(GifTag::build(0, true, GifFormat::Packed, 1).raw()));
}

#[test]
fn test_tracker_holds_across_non_eop_packets() {
    let mut tracker = PacketTracker::default();
    assert!(!tracker.feed(GifTag::build(1, false, GifFormat::Image, 0).raw()));
    assert!(!tracker.feed(0));
    assert!(!tracker.feed(GifTag::build(1, true, GifFormat::Image, 0).raw()));
    assert!(tracker.feed(0));
}
