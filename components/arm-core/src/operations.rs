// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt::UpperHex;

use common::Time;

use crate::{
    interface::{Bus, CpuVersion, SysWrapper},
    memory::{
        access::{CODE, NONSEQ, SEQ},
        Address, RelativeOffset,
    },
    state::{Flag, Register},
};

impl<S: Bus> SysWrapper<S> {
    /// Undefined or unimplemented encodings are programming errors of the
    /// guest and terminate the emulator.
    pub fn und_inst<T: UpperHex>(&mut self, code: T) -> ! {
        panic!(
            "undefined instruction 0x{:08X} on {:?} (PC = 0x{:08X})",
            code,
            S::Version::MODEL,
            self.cpur().pc().0
        );
    }

    #[inline]
    pub fn reg(&self, reg: Register) -> u32 {
        self.cpur().registers[reg.0 as usize]
    }

    /// Get a register's value for the next instruction (PC will be +4)
    #[inline]
    pub fn reg_pc4(&self, reg: Register) -> u32 {
        self.cpur().reg_pc4(reg)
    }

    /// Set the PC. Needs special behavior to fake the pipeline.
    pub fn set_pc(&mut self, val: Address) {
        // Align to 2/4 depending on mode
        let size = self.cpur().current_instruction_size();
        self.cpu().registers[15] = val.0 & !(size - 1);
        self.pipeline_stall();
    }

    /// Set a register. Needs special behavior due to PC.
    pub fn set_reg(&mut self, reg: Register, val: u32) {
        if reg.is_pc() {
            self.set_pc(Address(val));
        } else {
            self.cpu().registers[reg.0 as usize] = val;
        }
    }

    /// Set a register. Needs special behavior due to PC.
    /// Additionally allows interworking when setting PC on ARMv5.
    pub fn set_reg_allow_switch(&mut self, reg: Register, val: u32) {
        if reg.is_pc() {
            if S::Version::IS_V5 {
                self.cpu().set_flag(Flag::Thumb, val & 1 != 0);
            }
            self.set_pc(Address(val));
        } else {
            self.cpu().registers[reg.0 as usize] = val;
        }
    }

    /// Emulate a pipeline reload; used when PC changes.
    /// Both prefetch slots are refilled at the new location.
    pub fn pipeline_stall(&mut self) {
        if self.cpur().is_flag(Flag::Thumb) {
            let pc = self.cpur().pc();
            let time = self.wait_time::<u16>(pc, NONSEQ | CODE);
            self.tick(time as Time);
            self.cpu().bump_pc(2);
            let pc = self.cpur().pc();
            let time = self.wait_time::<u16>(pc, SEQ | CODE);
            self.tick(time as Time);
        } else {
            let pc = self.cpur().pc();
            let time = self.wait_time::<u32>(pc, NONSEQ | CODE);
            self.tick(time as Time);
            self.cpu().bump_pc(4);
            let pc = self.cpur().pc();
            let time = self.wait_time::<u32>(pc, SEQ | CODE);
            self.tick(time as Time);
        };
        self.cpu().invalidate_pipeline();
        self.cpu().access_type = SEQ;
    }

    /// Idle for 1 cycle and set access type to non-sequential.
    pub fn idle_nonseq(&mut self) {
        self.tick(1);
        self.cpu().access_type = NONSEQ;
    }

    /// Calculate MUL instruction idle cycles and add them to the clock.
    pub fn apply_mul_idle_ticks(&mut self, mut value: u32, signed: bool) {
        self.idle_nonseq();
        let mut mask = 0xFFFF_FF00;
        loop {
            value &= mask;
            if value == 0 || (signed && value == mask) {
                break;
            }
            self.tick(1);
            mask <<= 8;
        }
    }

    /// Called by block transfers when the register list was empty.
    /// The ARM7 transfers R15 and moves the base by 0x40; later models
    /// are undefined here and treated as a fatal guest error.
    pub fn on_empty_rlist(&mut self, rb: Register, str: bool, up: bool, before: bool) {
        if S::Version::IS_V5 {
            panic!(
                "empty register list in block transfer on {:?} (PC = 0x{:08X})",
                S::Version::MODEL,
                self.cpur().pc().0
            );
        }

        let addr = Address(self.reg(rb));
        self.set_reg(rb, addr.add_signed(Address(0x40), up).0);

        if str {
            let addr = match (up, before) {
                (true, true) => addr + Address::WORD,
                (true, false) => addr,
                (false, true) => addr - Address(0x40),
                (false, false) => addr - Address(0x3C),
            };
            let value = self.cpur().pc().0 + self.cpur().current_instruction_size();
            self.write::<u32>(addr, value, NONSEQ);
        } else {
            let val = self.read::<u32>(addr, NONSEQ);
            self.set_pc(Address(val));
        }
    }

    /// Perform a relative jump.
    pub fn relative_jump(&mut self, offset: RelativeOffset) {
        self.set_pc(self.cpur().pc().add_rel(offset));
    }
}
