// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Unit tests for the GIF organized by category

mod packets;

use super::*;

/// Sink recording every quadword with its path
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub received: Vec<(GifPath, u128)>,
}

impl GsSink for RecordingSink {
    fn consume(&mut self, path: GifPath, data: &[u128]) {
        self.received.extend(data.iter().map(|&qw| (path, qw)));
    }
}

impl RecordingSink {
    pub fn paths(&self) -> Vec<GifPath> {
        self.received.iter().map(|&(path, _)| path).collect()
    }
}

/// GIF with the default configuration (16-quadword FIFO, 4 per drain)
pub fn gif() -> GifUnit {
    GifUnit::new(&CoreConfig::default())
}

/// IMAGE packet: tag plus `len` data quadwords
pub fn image_packet(len: u16, eop: bool, first: u128) -> Vec<u128> {
    let mut packet = vec![GifTag::build(len, eop, GifFormat::Image, 0).raw()];
    packet.extend((0..len as u128).map(|i| first + i));
    packet
}

/// Drain until nothing is left, at most `rounds` times
pub fn drain_all(gif: &mut GifUnit, sink: &mut RecordingSink, rounds: usize) {
    for _ in 0..rounds {
        if gif.drain(sink) == 0 {
            break;
        }
    }
}
