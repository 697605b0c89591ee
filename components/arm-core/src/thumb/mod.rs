// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

pub use decode::ThumbInst;
use decode::{Thumb1Op, Thumb2Op, Thumb3Op, Thumb4Op, ThumbStrLdrOp};

use crate::{
    interface::{Bus, SysWrapper},
    memory::{Address, RelativeOffset},
    state::{LowRegister, Register},
};

mod decode;
mod execute;

pub type ThumbHandler<S> = fn(&mut SysWrapper<S>, ThumbInst);
pub type ThumbLut<S> = [ThumbHandler<S>; 1024];

pub(crate) const fn make_lut<S: Bus>() -> ThumbLut<S> {
    decode::get_lut_table::<SysWrapper<S>>()
}

/// Everything the THUMB instruction set can do, split from how it is
/// encoded.
pub(crate) trait ThumbVisitor {
    const IS_V5: bool;

    fn thumb_unknown_opcode(&mut self, inst: ThumbInst);

    fn thumb_arithmetic(&mut self, kind: Thumb1Op, d: LowRegister, s: LowRegister, n: u32);
    fn thumb_2_reg(&mut self, kind: Thumb2Op, d: LowRegister, s: LowRegister, n: LowRegister);
    fn thumb_3(&mut self, kind: Thumb3Op, d: LowRegister, n: u32);
    fn thumb_alu(&mut self, kind: Thumb4Op, d: LowRegister, s: LowRegister);

    fn thumb_hi_add(&mut self, r: (Register, Register));
    fn thumb_hi_cmp(&mut self, r: (Register, Register));
    fn thumb_hi_mov(&mut self, r: (Register, Register));
    fn thumb_hi_bx(&mut self, s: Register, blx: bool);

    fn thumb_ldr6(&mut self, d: LowRegister, offset: Address);
    fn thumb_ldrstr78(&mut self, op: ThumbStrLdrOp, d: LowRegister, b: LowRegister, o: LowRegister);
    fn thumb_ldrstr9(&mut self, op: ThumbStrLdrOp, d: LowRegister, b: LowRegister, offset: Address);
    fn thumb_ldrstr10(&mut self, str: bool, d: LowRegister, b: LowRegister, offset: Address);
    fn thumb_str_sp(&mut self, d: LowRegister, offset: Address);
    fn thumb_ldr_sp(&mut self, d: LowRegister, offset: Address);

    fn thumb_rel_addr(&mut self, sp: bool, d: LowRegister, offset: Address);
    fn thumb_sp_offs(&mut self, offset: RelativeOffset);

    fn thumb_push(&mut self, reg_list: u8, lr: bool);
    fn thumb_pop(&mut self, reg_list: u8, pc: bool);
    fn thumb_stmia(&mut self, b: LowRegister, reg_list: u8);
    fn thumb_ldmia(&mut self, b: LowRegister, reg_list: u8);

    fn thumb_bcond(&mut self, cond: u16, offset: RelativeOffset);
    fn thumb_swi(&mut self);
    fn thumb_br(&mut self, offset: RelativeOffset);
    fn thumb_set_lr(&mut self, offset: RelativeOffset);
    fn thumb_bl(&mut self, offset: Address, thumb: bool);
}
