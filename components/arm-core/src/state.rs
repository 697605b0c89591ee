// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::{
    fmt::Display,
    ops::{Index, IndexMut, Range},
};

use bitmatch::bitmatch;
use common::numutil::NumExt;

use crate::{
    exceptions::InterruptController,
    memory::{access::SEQ, Access, Address},
};

/// Macro for creating accessors for mode-dependent registers.
macro_rules! mode_reg {
    ($reg:ident, $get:ident, $set:ident) => {
        pub fn $get(&self) -> u32 {
            let mode = self.mode();
            if mode == Mode::System {
                self.$reg[0]
            } else {
                self.$reg[mode as usize]
            }
        }

        pub fn $set(&mut self, val: u32) {
            let mode = self.mode();
            if mode == Mode::System {
                self.$reg[0] = val;
            } else {
                self.$reg[mode as usize] = val;
            }
        }
    };
}

#[derive(Copy, Clone, PartialEq)]
pub struct LowRegister(pub u16);

impl LowRegister {
    pub fn all() -> impl DoubleEndedIterator<Item = LowRegister> {
        Self::range(0..8)
    }

    pub fn from_rlist(rlist: u8) -> impl DoubleEndedIterator<Item = LowRegister> {
        Self::all().filter(move |r| rlist.is_bit(r.0))
    }

    pub fn range(range: Range<u16>) -> impl DoubleEndedIterator<Item = LowRegister> {
        range.map(Self)
    }
}

impl Display for LowRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Copy, Clone, PartialEq)]
pub struct Register(pub u16);

impl Register {
    pub fn is_pc(&self) -> bool {
        self.0 == 15
    }

    pub fn from_rlist(rlist: u16) -> impl DoubleEndedIterator<Item = Register> {
        (0..16).map(Self).filter(move |r| rlist.is_bit(r.0))
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            15 => write!(f, "pc"),
            14 => write!(f, "lr"),
            13 => write!(f, "sp"),
            r => write!(f, "r{r}"),
        }
    }
}

/// A register with values for FIQ and all other modes
#[derive(Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FiqReg {
    pub reg: u32,
    pub fiq: u32,
}

/// A register with different values for the different CPU modes
pub type ModeReg = [u32; 6];

/// The state of one CPU core: the register file with its banks,
/// the two-deep prefetch pipeline, and the interrupt latch.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpuState {
    // Registers
    pub registers: [u32; 16],
    fiqs: [FiqReg; 5],
    pub sp: ModeReg,
    lr: ModeReg,
    cpsr: u32,
    spsr: ModeReg,

    // Pipeline
    pipeline: [u32; 2],
    pipeline_valid: bool,
    pub access_type: Access,

    // Interrupt control
    pub intr: InterruptController,
    pub is_halted: bool,
}

impl CpuState {
    #[inline]
    pub fn sp(&self) -> Address {
        Address(self.registers[13])
    }

    #[inline]
    pub fn lr(&self) -> Address {
        Address(self.registers[14])
    }

    #[inline]
    pub fn pc(&self) -> Address {
        Address(self.registers[15])
    }

    #[inline]
    pub fn cpsr(&self) -> u32 {
        self.cpsr
    }

    #[inline]
    pub fn set_sp(&mut self, value: Address) {
        self.registers[13] = value.0;
    }

    #[inline]
    pub fn set_lr(&mut self, value: Address) {
        self.registers[14] = value.0;
    }

    /// Get the 'adjusted' value of the PC that some THUMB instructions need.
    #[inline]
    pub fn adj_pc(&self) -> Address {
        Address(self.registers[15] & !2)
    }

    #[inline]
    pub fn bump_pc(&mut self, count: u32) -> Address {
        self.registers[15] = self.registers[15].wrapping_add(count);
        Address(self.registers[15])
    }

    mode_reg!(sp, cpsr_sp, set_cpsr_sp);
    mode_reg!(lr, cpsr_lr, set_cpsr_lr);
    mode_reg!(spsr, spsr, set_spsr);

    /// Get a register's value for the next instruction (PC will be +4)
    pub fn reg_pc4(&self, reg: Register) -> u32 {
        let mut regs = self.registers;
        regs[15] += 4;
        regs[reg.0.us()]
    }

    #[inline]
    pub fn is_flag(&self, flag: Flag) -> bool {
        self.cpsr.is_bit(flag as u16)
    }

    #[inline]
    pub fn set_flag(&mut self, flag: Flag, en: bool) {
        self.cpsr = self.cpsr.set_bit(flag as u16, en);
    }

    /// Get the current CPU mode.
    pub fn mode(&self) -> Mode {
        Mode::get(self.cpsr & 0x1F)
    }

    /// Set the mode bits inside CPSR.
    pub fn set_mode(&mut self, ctx: Mode) {
        self.set_cpsr((self.cpsr & !0x1F) | ctx.to_u32());
    }

    /// Set the CPSR. This may only change flags; mode changes will not be
    /// handled.
    pub(crate) fn set_cpsr_flags(&mut self, value: u32) {
        self.cpsr = value;
    }

    /// Set the CPSR. Needs to consider mode switches, in which case
    /// the banked registers need to be copied.
    pub fn set_cpsr(&mut self, value: u32) {
        for reg in 8..=12 {
            if self.mode() == Mode::Fiq {
                self.fiqs[reg - 8].fiq = self.registers[reg];
            } else {
                self.fiqs[reg - 8].reg = self.registers[reg];
            }
        }
        self.set_cpsr_sp(self.registers[13]);
        self.set_cpsr_lr(self.registers[14]);

        self.cpsr = value;

        for reg in 8..=12 {
            self.registers[reg] = if self.mode() == Mode::Fiq {
                self.fiqs[reg - 8].fiq
            } else {
                self.fiqs[reg - 8].reg
            };
        }
        self.registers[13] = self.cpsr_sp();
        self.registers[14] = self.cpsr_lr();
    }

    /// Evaluate a condition encoded into an instruction.
    pub fn eval_condition(&self, cond: u16) -> bool {
        // This condition table is taken from mGBA sources, which are licensed under
        // MPL2 at https://github.com/mgba-emu/mgba
        // Thank you to endrift and other mGBA contributors!
        const COND_MASKS: [u16; 16] = [
            0xF0F0, // EQ [-Z--]
            0x0F0F, // NE [-z--]
            0xCCCC, // CS [--C-]
            0x3333, // CC [--c-]
            0xFF00, // MI [N---]
            0x00FF, // PL [n---]
            0xAAAA, // VS [---V]
            0x5555, // VC [---v]
            0x0C0C, // HI [-zC-]
            0xF3F3, // LS [-Z--] || [--c-]
            0xAA55, // GE [N--V] || [n--v]
            0x55AA, // LT [N--v] || [n--V]
            0x0A05, // GT [Nz-V] || [nz-v]
            0xF5FA, // LE [-Z--] || [Nz-v] || [nz-V]
            0xFFFF, // AL [----]
            0x0000, // NV
        ];

        let flags = self.cpsr >> 28;
        (COND_MASKS[cond.us()] & (1 << flags)) != 0
    }

    pub fn current_instruction_size(&self) -> u32 {
        // 4 on ARM, 2 on THUMB
        4 - ((self.is_flag(Flag::Thumb) as u32) << 1)
    }
}

impl CpuState {
    pub(crate) fn fill_pipeline(&mut self, with: [u32; 2]) {
        self.pipeline = with;
        self.pipeline_valid = true;
    }

    /// Discard the prefetched slots; the next instruction refetches
    /// them at the current PC. Used by the system after it repoints a
    /// core directly.
    pub fn invalidate_pipeline(&mut self) {
        self.pipeline_valid = false;
    }

    pub(crate) fn pipeline_valid(&self) -> bool {
        self.pipeline_valid
    }

    pub(crate) fn advance_pipeline(&mut self, next: u32) -> u32 {
        let inst = self.pipeline[0];
        self.pipeline[0] = self.pipeline[1];
        self.pipeline[1] = next;
        self.access_type = SEQ;
        inst
    }

    /// The opcode the prefetch last pulled from the bus.
    /// This is what open-bus reads observe.
    #[inline]
    pub fn fetched_opcode(&self) -> u32 {
        self.pipeline[1]
    }
}

impl Default for CpuState {
    fn default() -> Self {
        Self {
            registers: [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4],
            fiqs: Default::default(),
            sp: ModeReg::default(),
            lr: ModeReg::default(),
            cpsr: 0xD3,
            spsr: ModeReg::default(),
            pipeline: Default::default(),
            pipeline_valid: Default::default(),
            access_type: Default::default(),
            intr: Default::default(),
            is_halted: Default::default(),
        }
    }
}

/// Execution context of the CPU.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mode {
    User,
    Fiq,
    Supervisor,
    Abort,
    Irq,
    Undefined,
    System,
}

impl Mode {
    #[bitmatch]
    pub fn get(n: u32) -> Self {
        #[bitmatch]
        match n {
            "0??00" => Self::User,
            "0??01" => Self::Fiq,
            "0??10" => Self::Irq,
            "0??11" => Self::Supervisor,
            "10000" => Self::User,
            "10001" => Self::Fiq,
            "10010" => Self::Irq,
            "10011" => Self::Supervisor,
            "10111" => Self::Abort,
            "11011" => Self::Undefined,
            "11111" => Self::System,
            _ => panic!("invalid CPU mode 0x{n:02X}"),
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Self::User => 0b10000,
            Self::Fiq => 0b10001,
            Self::Irq => 0b10010,
            Self::Supervisor => 0b10011,
            Self::Abort => 0b10111,
            Self::Undefined => 0b11011,
            Self::System => 0b11111,
        }
    }
}

/// Flags inside CPSR.
#[derive(Copy, Clone)]
pub enum Flag {
    Neg = 31,
    Zero = 30,
    Carry = 29,
    Overflow = 28,
    QClamped = 27,
    IrqDisable = 7,
    FiqDisable = 6,
    Thumb = 5,
}

impl Flag {
    pub fn mask(self) -> u16 {
        1 << self as u16
    }
}

impl Index<LowRegister> for CpuState {
    type Output = u32;

    fn index(&self, index: LowRegister) -> &Self::Output {
        &self.registers[index.0.us()]
    }
}

impl IndexMut<LowRegister> for CpuState {
    fn index_mut(&mut self, index: LowRegister) -> &mut Self::Output {
        &mut self.registers[index.0.us()]
    }
}

impl Index<Register> for CpuState {
    type Output = u32;

    fn index(&self, index: Register) -> &Self::Output {
        &self.registers[index.0.us()]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mode_bits_roundtrip() {
        for mode in [
            Mode::User,
            Mode::Fiq,
            Mode::Supervisor,
            Mode::Abort,
            Mode::Irq,
            Mode::Undefined,
            Mode::System,
        ] {
            assert_eq!(Mode::get(mode.to_u32()), mode);
        }
    }

    #[test]
    fn bank_switch_roundtrip() {
        let mut state = CpuState::default();
        state.set_mode(Mode::System);
        state.registers[8] = 0x1111;
        state.registers[13] = 0x2222;
        state.registers[14] = 0x3333;

        state.set_mode(Mode::Fiq);
        state.registers[8] = 0xAAAA;
        state.registers[13] = 0xBBBB;
        state.registers[14] = 0xCCCC;
        state.set_spsr(0xDEAD_BEEF);

        state.set_mode(Mode::Irq);
        state.registers[13] = 0x4444;

        state.set_mode(Mode::Fiq);
        assert_eq!(state.registers[8], 0xAAAA);
        assert_eq!(state.registers[13], 0xBBBB);
        assert_eq!(state.registers[14], 0xCCCC);
        assert_eq!(state.spsr(), 0xDEAD_BEEF);

        state.set_mode(Mode::System);
        assert_eq!(state.registers[8], 0x1111);
        assert_eq!(state.registers[13], 0x2222);
        assert_eq!(state.registers[14], 0x3333);
    }

    #[test]
    fn condition_table_matches_reference() {
        // Brute-force reference over all 16 conditions and flag states.
        for flags in 0..16u32 {
            let n = flags.is_bit(3);
            let z = flags.is_bit(2);
            let c = flags.is_bit(1);
            let v = flags.is_bit(0);
            let expected = [
                z,
                !z,
                c,
                !c,
                n,
                !n,
                v,
                !v,
                c && !z,
                !c || z,
                n == v,
                n != v,
                !z && (n == v),
                z || (n != v),
                true,
                false,
            ];

            let mut state = CpuState::default();
            state.set_cpsr_flags((state.cpsr() & 0x0FFF_FFFF) | (flags << 28));
            for (cond, &exp) in expected.iter().enumerate() {
                assert_eq!(
                    state.eval_condition(cond as u16),
                    exp,
                    "cond {cond:X} flags {flags:04b}"
                );
            }
        }
    }
}
