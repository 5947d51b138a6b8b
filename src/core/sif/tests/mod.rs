// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

use super::*;


pub(super) fn sif() -> Sif {
    Sif::new(&CoreConfig::default())
}

pub(super) fn iop_memory() -> IopMemory {
    IopMemory::new(2 * 1024 * 1024)
}

/// Write a 4-word IOP tag
pub(super) fn write_iop_tag(mem: &mut IopMemory, addr: u32, tag: [u32; 4]) {
    for (i, word) in tag.into_iter().enumerate() {
        mem.write32(addr + i as u32 * 4, word).unwrap();
    }
}

/// Start IOP channel `id` with its tag list at `tadr`
pub(super) fn start_iop(sif: &mut Sif, id: IopSifId, tadr: u32) {
    sif.iop_write32(id.base_address() + 0xC, tadr).unwrap();
    sif.iop_write32(id.base_address() + 0x8, iop::CHCR_START).unwrap();
}
