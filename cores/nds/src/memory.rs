// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! The per-CPU memory buses. Accesses are decoded by region; backing
//! stores wrap inside their (power of two sized) arrays. Reads from
//! unmapped space observe the open bus, which on this system is the
//! last opcode the reading CPU prefetched.

use arm_core::{interface::RwType, Address};
use common::numutil::{ByteArrayExt, NumExt};

use crate::{cpu::cp15::TcmState, Nds7, Nds9};

pub const KB: usize = 1024;
pub const MB: usize = KB * KB;

/// Owner layout of the two 16K halves of shared WRAM.
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum WramStatus {
    All9 = 0,
    First7 = 1,
    First9 = 2,
    All7 = 3,
}

#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Memory {
    pub psram: Box<[u8]>,
    wram: Box<[u8]>,
    pub wram_status: WramStatus,

    pub bios7: Box<[u8]>,
    pub bios9: Box<[u8]>,
    /// Direct boot leaves the boot ROM windows unmapped.
    pub bios_inert: bool,

    wram7: Box<[u8]>,
    pub(crate) inst_tcm: Box<[u8]>,
    pub(crate) data_tcm: Box<[u8]>,

    vram: Box<[u8]>,
    palette: Box<[u8]>,
    oam: Box<[u8]>,

    pub postflg: [u8; 2],
}

impl Nds7 {
    pub fn get<T: RwType>(&mut self, addr_unaligned: Address) -> T {
        let addr = addr_unaligned.0 & !(T::WIDTH - 1);
        let a = addr.us();
        match addr >> 24 {
            0x00 if addr < 0x4000 && !self.memory.bios_inert => self.memory.bios7.get_wrap(a),
            0x02 => self.memory.psram.get_wrap(a),
            0x03 if addr >= 0x0380_0000 => self.memory.wram7.get_wrap(a),
            0x03 => match self.memory.wram_status {
                WramStatus::All7 => self.memory.wram.get_wrap(a),
                WramStatus::First9 => self.memory.wram[(16 * KB)..].get_wrap(a),
                WramStatus::First7 => self.memory.wram[..(16 * KB)].get_wrap(a),
                // With no shared block, the ARM7 sees its own WRAM here
                WramStatus::All9 => self.memory.wram7.get_wrap(a),
            },
            0x04 => self.get_mmio(addr),
            0x06 => self.memory.vram.get_wrap(a),
            _ => T::from_u32(self.cpu7.fetched_opcode()),
        }
    }

    pub fn set<T: RwType>(&mut self, addr_unaligned: Address, value: T) {
        let addr = addr_unaligned.0 & !(T::WIDTH - 1);
        let a = addr.us();
        match addr >> 24 {
            0x02 => self.memory.psram.set_wrap(a, value),
            0x03 if addr >= 0x0380_0000 => self.memory.wram7.set_wrap(a, value),
            0x03 => match self.memory.wram_status {
                WramStatus::All7 => self.memory.wram.set_wrap(a, value),
                WramStatus::First9 => self.memory.wram[(16 * KB)..].set_wrap(a, value),
                WramStatus::First7 => self.memory.wram[..(16 * KB)].set_wrap(a, value),
                WramStatus::All9 => self.memory.wram7.set_wrap(a, value),
            },
            0x04 => self.set_mmio(addr, value),
            0x06 => self.memory.vram.set_wrap(a, value),
            _ => (),
        }
    }
}

impl Nds9 {
    pub fn get<T: RwType>(&mut self, addr_unaligned: Address) -> T {
        let addr = addr_unaligned.0 & !(T::WIDTH - 1);
        let a = addr.us();

        if self.cp15.tcm_state[1] == TcmState::Rw && self.cp15.tcm_range[1].contains(&addr) {
            return self.memory.inst_tcm.get_wrap(a);
        }
        if self.cp15.tcm_state[0] == TcmState::Rw && self.cp15.tcm_range[0].contains(&addr) {
            return self.memory.data_tcm.get_wrap(a);
        }

        match addr >> 24 {
            0x02 => self.memory.psram.get_wrap(a),
            0x03 => match self.memory.wram_status {
                WramStatus::All9 => self.memory.wram.get_wrap(a),
                WramStatus::First7 => self.memory.wram[(16 * KB)..].get_wrap(a),
                WramStatus::First9 => self.memory.wram[..(16 * KB)].get_wrap(a),
                WramStatus::All7 => T::from_u32(0),
            },
            0x04 => self.get_mmio(addr),
            0x05 => self.memory.palette.get_wrap(a),
            0x06 => self.memory.vram.get_wrap(a),
            0x07 => self.memory.oam.get_wrap(a),
            0xFF if addr >= 0xFFFF_0000 && !self.memory.bios_inert => {
                self.memory.bios9.get_wrap(a)
            }
            _ => T::from_u32(self.cpu9.fetched_opcode()),
        }
    }

    pub fn set<T: RwType>(&mut self, addr_unaligned: Address, value: T) {
        let addr = addr_unaligned.0 & !(T::WIDTH - 1);
        let a = addr.us();

        if self.cp15.tcm_state[1] != TcmState::None && self.cp15.tcm_range[1].contains(&addr) {
            self.memory.inst_tcm.set_wrap(a, value);
            return;
        }
        if self.cp15.tcm_state[0] != TcmState::None && self.cp15.tcm_range[0].contains(&addr) {
            self.memory.data_tcm.set_wrap(a, value);
            return;
        }

        match addr >> 24 {
            0x02 => self.memory.psram.set_wrap(a, value),
            0x03 => match self.memory.wram_status {
                WramStatus::All9 => self.memory.wram.set_wrap(a, value),
                WramStatus::First7 => self.memory.wram[(16 * KB)..].set_wrap(a, value),
                WramStatus::First9 => self.memory.wram[..(16 * KB)].set_wrap(a, value),
                WramStatus::All7 => (),
            },
            0x04 => self.set_mmio(addr, value),
            0x05 => self.memory.palette.set_wrap(a, value),
            0x06 => self.memory.vram.set_wrap(a, value),
            0x07 => self.memory.oam.set_wrap(a, value),
            _ => (),
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            psram: vec![0; 4 * MB].into_boxed_slice(),
            wram: vec![0; 32 * KB].into_boxed_slice(),
            wram_status: WramStatus::All9,
            bios7: vec![0; 16 * KB].into_boxed_slice(),
            bios9: vec![0; 8 * KB].into_boxed_slice(),
            bios_inert: false,

            wram7: vec![0; 64 * KB].into_boxed_slice(),
            inst_tcm: vec![0; 32 * KB].into_boxed_slice(),
            data_tcm: vec![0; 16 * KB].into_boxed_slice(),

            vram: vec![0; MB].into_boxed_slice(),
            palette: vec![0; 2 * KB].into_boxed_slice(),
            oam: vec![0; 2 * KB].into_boxed_slice(),

            postflg: [0; 2],
        }
    }
}
