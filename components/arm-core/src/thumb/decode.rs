// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Decode of the 16-bit instruction set into visitor calls. The dispatch
//! table has 1024 entries indexed by the instruction's top 10 bits.

use std::fmt::UpperHex;

use bitmatch::bitmatch;
use common::numutil::{NumExt, U16Ext};
use num_traits::FromPrimitive;

use super::ThumbVisitor;
use crate::{
    memory::{Address, RelativeOffset},
    state::{LowRegister, Register},
};

#[derive(Copy, Clone)]
pub struct ThumbInst(u16);

impl ThumbInst {
    pub fn of(inst: u16) -> Self {
        Self(inst)
    }

    pub fn reg(self, idx: u16) -> LowRegister {
        LowRegister(self.0.bits(idx, 3))
    }

    pub fn reg16(self) -> (Register, Register) {
        (
            Register(self.0.bits(3, 4)),
            Register(self.reg(0).0 | (self.0.bit(7) << 3)),
        )
    }

    pub fn imm5(self) -> u32 {
        self.0.bits(6, 5).u32()
    }

    pub fn imm7(self) -> u32 {
        ((self.0 & 0x7F) << 2) as u32
    }

    pub fn imm8(self) -> u32 {
        (self.0 & 0xFF).u32()
    }

    pub fn imm10(self) -> i16 {
        self.0.i10()
    }

    pub fn imm11(self) -> u32 {
        self.0.bits(0, 11).u32() << 1
    }

    pub fn is_bit(self, bit: u16) -> bool {
        self.0.is_bit(bit)
    }

    fn thumb4(self) -> Thumb4Op {
        Thumb4Op::from_u16(self.0.bits(6, 4)).unwrap()
    }
}

impl UpperHex for ThumbInst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        UpperHex::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Thumb1Op {
    Lsl,
    Lsr,
    Asr,
    Add,
    Sub,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Thumb2Op {
    Add,
    Sub,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Thumb3Op {
    Mov,
    Cmp,
    Add,
    Sub,
}

#[derive(num_derive::FromPrimitive, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Thumb4Op {
    And = 0,
    Eor,
    Lsl,
    Lsr,
    Asr,
    Adc,
    Sbc,
    Ror,
    Tst,
    Neg,
    Cmp,
    Cmn,
    Orr,
    Mul,
    Bic,
    Mvn,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd)]
pub enum ThumbStrLdrOp {
    Str = 0,
    Strh,
    Strb,
    Ldsb,
    Ldr,
    Ldrh,
    Ldrb,
    Ldsh,
}

pub(crate) const fn get_lut_table<I: ThumbVisitor>() -> [fn(&mut I, ThumbInst); 1024] {
    let mut lut: [fn(&mut I, ThumbInst); 1024] = [I::thumb_unknown_opcode; 1024];
    let mut i = 0;
    while i < 1024 {
        lut[i] = get_instruction_handler::<I>(i);
        i += 1;
    }
    lut
}

#[bitmatch]
const fn get_instruction_handler<I: ThumbVisitor>(code: usize) -> fn(&mut I, ThumbInst) {
    use Thumb1Op as Op1;
    use Thumb2Op as Op2;
    use Thumb3Op as Op3;
    use ThumbStrLdrOp::*;

    #[bitmatch]
    match code {
        // THUMB.1
        "00000_?????" => |e, i| e.thumb_arithmetic(Op1::Lsl, i.reg(0), i.reg(3), i.imm5()),
        "00001_?????" => |e, i| e.thumb_arithmetic(Op1::Lsr, i.reg(0), i.reg(3), i.imm5()),
        "00010_?????" => |e, i| e.thumb_arithmetic(Op1::Asr, i.reg(0), i.reg(3), i.imm5()),
        // THUMB.2
        "0001110_???" => |e, i| e.thumb_arithmetic(Op1::Add, i.reg(0), i.reg(3), i.reg(6).0.u32()),
        "0001111_???" => |e, i| e.thumb_arithmetic(Op1::Sub, i.reg(0), i.reg(3), i.reg(6).0.u32()),
        "0001100_???" => |e, i| e.thumb_2_reg(Op2::Add, i.reg(0), i.reg(3), i.reg(6)),
        "0001101_???" => |e, i| e.thumb_2_reg(Op2::Sub, i.reg(0), i.reg(3), i.reg(6)),

        // THUMB.3
        "00100_?????" => |e, i| e.thumb_3(Op3::Mov, i.reg(8), i.imm8()),
        "00101_?????" => |e, i| e.thumb_3(Op3::Cmp, i.reg(8), i.imm8()),
        "00110_?????" => |e, i| e.thumb_3(Op3::Add, i.reg(8), i.imm8()),
        "00111_?????" => |e, i| e.thumb_3(Op3::Sub, i.reg(8), i.imm8()),

        // THUMB.4
        "010000_????" => |e, i| e.thumb_alu(i.thumb4(), i.reg(0), i.reg(3)),

        // THUMB.5
        "01000100_??" => |e, i| e.thumb_hi_add(i.reg16()),
        "01000101_??" => |e, i| e.thumb_hi_cmp(i.reg16()),
        "01000110_??" => |e, i| e.thumb_hi_mov(i.reg16()),
        "01000111_??" => |e, i| {
            let (s, d) = i.reg16();
            e.thumb_hi_bx(s, d.0 > 7)
        },

        // THUMB.6
        "01001_?????" => |e, i| e.thumb_ldr6(i.reg(8), Address(i.imm8() << 2)),
        // THUMB.7/8
        "0101000_???" => |e, i| e.thumb_ldrstr78(Str, i.reg(0), i.reg(3), i.reg(6)),
        "0101001_???" => |e, i| e.thumb_ldrstr78(Strh, i.reg(0), i.reg(3), i.reg(6)),
        "0101010_???" => |e, i| e.thumb_ldrstr78(Strb, i.reg(0), i.reg(3), i.reg(6)),
        "0101011_???" => |e, i| e.thumb_ldrstr78(Ldsb, i.reg(0), i.reg(3), i.reg(6)),
        "0101100_???" => |e, i| e.thumb_ldrstr78(Ldr, i.reg(0), i.reg(3), i.reg(6)),
        "0101101_???" => |e, i| e.thumb_ldrstr78(Ldrh, i.reg(0), i.reg(3), i.reg(6)),
        "0101110_???" => |e, i| e.thumb_ldrstr78(Ldrb, i.reg(0), i.reg(3), i.reg(6)),
        "0101111_???" => |e, i| e.thumb_ldrstr78(Ldsh, i.reg(0), i.reg(3), i.reg(6)),
        // THUMB.9
        "01100_?????" => |e, i| e.thumb_ldrstr9(Str, i.reg(0), i.reg(3), Address(i.imm5() << 2)),
        "01101_?????" => |e, i| e.thumb_ldrstr9(Ldr, i.reg(0), i.reg(3), Address(i.imm5() << 2)),
        "01110_?????" => |e, i| e.thumb_ldrstr9(Strb, i.reg(0), i.reg(3), Address(i.imm5())),
        "01111_?????" => |e, i| e.thumb_ldrstr9(Ldrb, i.reg(0), i.reg(3), Address(i.imm5())),
        // THUMB.10
        "10000_?????" => |e, i| e.thumb_ldrstr10(true, i.reg(0), i.reg(3), Address(i.imm5() << 1)),
        "10001_?????" => |e, i| e.thumb_ldrstr10(false, i.reg(0), i.reg(3), Address(i.imm5() << 1)),

        // THUMB.11
        "10010_?????" => |e, i| e.thumb_str_sp(i.reg(8), Address(i.imm8() << 2)),
        "10011_?????" => |e, i| e.thumb_ldr_sp(i.reg(8), Address(i.imm8() << 2)),

        // THUMB.12
        "10100_?????" => |e, i| e.thumb_rel_addr(false, i.reg(8), Address(i.imm8() << 2)),
        "10101_?????" => |e, i| e.thumb_rel_addr(true, i.reg(8), Address(i.imm8() << 2)),

        // THUMB.13
        "10110000_??" => |e, i| {
            let offset = i.imm7() as i32;
            e.thumb_sp_offs(RelativeOffset(if i.is_bit(7) { -offset } else { offset }))
        },

        // THUMB.14
        "10110100_??" => |e, i| e.thumb_push(i.0 as u8, false),
        "10110101_??" => |e, i| e.thumb_push(i.0 as u8, true),
        "10111100_??" => |e, i| e.thumb_pop(i.0 as u8, false),
        "10111101_??" => |e, i| e.thumb_pop(i.0 as u8, true),

        // THUMB.15
        "11000_?????" => |e, i| e.thumb_stmia(i.reg(8), i.0 as u8),
        "11001_?????" => |e, i| e.thumb_ldmia(i.reg(8), i.0 as u8),

        // THUMB.16/17
        "11011111_??" => |e, _| e.thumb_swi(),
        "1101??????" => |e, i| {
            e.thumb_bcond((i.0 >> 8) & 0xF, RelativeOffset((i.imm8() as i8 as i32) * 2))
        },

        // THUMB.18
        "11100_?????" => |e, i| e.thumb_br(RelativeOffset(i.imm10() as i32 * 2)),
        // THUMB.19
        "11110_?????" => |e, i| e.thumb_set_lr(RelativeOffset((i.imm10() as i32) << 12)),
        "11101_?????" => |e, i| e.thumb_bl(Address(i.imm11()), false),
        "11111_?????" => |e, i| e.thumb_bl(Address(i.imm11()), true),

        _ => I::thumb_unknown_opcode,
    }
}
