// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::{
    fmt::Display,
    ops::{Add, AddAssign, Sub, SubAssign},
};

use common::{numutil::NumExt, Time};

use crate::interface::{Bus, CpuVersion, RwType, SysWrapper};

#[derive(Debug, Copy, Clone)]
pub struct Address(pub u32);

impl Address {
    pub const BYTE: Address = Address(1);
    pub const HW: Address = Address(2);
    pub const WORD: Address = Address(4);

    pub fn add_rel(self, rel: RelativeOffset) -> Address {
        Address(self.0.wrapping_add_signed(rel.0))
    }

    pub fn add_signed(self, rhs: Address, positive: bool) -> Address {
        if positive {
            self + rhs
        } else {
            self - rhs
        }
    }
}

impl Add for Address {
    type Output = Address;

    fn add(self, rhs: Self) -> Self::Output {
        Address(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for Address {
    type Output = Address;

    fn sub(self, rhs: Self) -> Self::Output {
        Address(self.0.wrapping_sub(rhs.0))
    }
}

impl AddAssign for Address {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Address {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#0x{:X}", self.0)
    }
}

#[derive(Debug, Copy, Clone)]
pub struct RelativeOffset(pub i32);

impl Display for RelativeOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 >= 0 {
            write!(f, "#0x{:X}", self.0)
        } else {
            write!(f, "#-0x{:X}", -self.0)
        }
    }
}

/// Bitmask for the kinds of memory accesses.
pub type Access = u8;

pub mod access {
    use super::Access;
    pub const NONSEQ: Access = 0;
    pub const SEQ: Access = 1 << 0;
    pub const CODE: Access = 1 << 1;
    pub const DMA: Access = 1 << 2;
}

impl<S: Bus> SysWrapper<S> {
    /// Get the value at the given memory address and add to the device clock.
    pub fn read<T: RwType>(&mut self, addr: Address, access: Access) -> T::ReadOutput {
        let time = self.wait_time::<T>(addr, access);
        self.tick(time as Time);

        let value = self.get::<T>(addr).u32();
        T::ReadOutput::from_u32(if !S::Version::IS_V5 && T::WIDTH == 2 {
            // Special handling for halfwords on ARMv4
            if addr.0.is_bit(0) {
                // Unaligned
                value.rotate_right(8)
            } else {
                value
            }
        } else {
            value
        })
    }

    /// Set the value at the given memory address and add to the device clock.
    pub fn write<T: RwType>(&mut self, addr: Address, value: T, access: Access) {
        let time = self.wait_time::<T>(addr, access);
        self.tick(time as Time);
        self.set(addr, value);
    }

    /// Read a half-word from the bus (LE).
    /// If address is unaligned, do LDRSH behavior.
    pub fn read_hword_ldrsh(&mut self, addr: Address, kind: Access) -> u32 {
        let time = self.wait_time::<u16>(addr, kind);
        self.tick(time as Time);
        let val = self.get::<u16>(addr).u32();
        if !S::Version::IS_V5 && addr.0.is_bit(0) {
            // Unaligned on ARMv4
            (val >> 8) as i8 as i32 as u32
        } else {
            // Aligned
            val as i16 as i32 as u32
        }
    }

    /// Read a word from the bus (LE).
    /// If address is unaligned, do LDR/SWP behavior.
    pub fn read_word_ldrswp(&mut self, addr: Address, kind: Access) -> u32 {
        let val = self.read::<u32>(addr, kind);
        if addr.0 & 3 != 0 {
            // Unaligned
            let by = (addr.0 & 3) << 3;
            val.rotate_right(by)
        } else {
            // Aligned
            val
        }
    }
}
