// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

pub use decode::ArmInst;
use decode::{
    ArmAluOp, ArmAluShift, ArmLdmStmConfig, ArmLdrStrConfig, ArmLdrStrOperandKind, ArmMulOp,
    ArmOperandKind, ArmQOp, ArmShMulOp, ArmSignedOperandKind,
};

use crate::{
    interface::{Bus, Model, SysWrapper},
    memory::RelativeOffset,
    state::Register,
};

mod decode;
mod execute;

pub type ArmHandler<S> = fn(&mut SysWrapper<S>, ArmInst);
pub type ArmLut<S> = [ArmHandler<S>; 4096];

pub(crate) const fn make_lut<S: Bus>() -> ArmLut<S> {
    decode::get_lut_table::<SysWrapper<S>>()
}

/// Everything the ARM instruction set can do, split from how it is
/// encoded. The interpreter implements this once per bus.
pub(crate) trait ArmVisitor {
    const IS_V5: bool;
    const MODEL: Model;

    fn arm_unknown_opcode(&mut self, inst: ArmInst);
    fn arm_swi(&mut self);
    fn arm_hint(&mut self, ty: u32);

    fn arm_b(&mut self, offset: RelativeOffset);
    fn arm_bl(&mut self, offset: RelativeOffset);
    fn arm_bx(&mut self, n: Register);
    fn arm_blx(&mut self, src: ArmSignedOperandKind);

    #[allow(clippy::too_many_arguments)]
    fn arm_alu_reg(
        &mut self,
        n: Register,
        d: Register,
        m: Register,
        op: ArmAluOp,
        shift_kind: ArmAluShift,
        shift_operand: ArmOperandKind,
        cpsr: bool,
    );
    fn arm_alu_imm(&mut self, n: Register, d: Register, imm: u32, ror_by: u32, op: ArmAluOp, cpsr: bool);

    #[allow(clippy::too_many_arguments)]
    fn arm_mul(
        &mut self,
        n: Register,
        s: Register,
        d: Register,
        m: Register,
        op: ArmMulOp,
        cpsr: bool,
    );
    #[allow(clippy::too_many_arguments)]
    fn arm_sh_mul(
        &mut self,
        n: Register,
        s: Register,
        d: Register,
        m: Register,
        op: ArmShMulOp,
        x_top: bool,
        y_top: bool,
    );

    fn arm_clz(&mut self, m: Register, d: Register);
    fn arm_q(&mut self, n: Register, m: Register, d: Register, op: ArmQOp);

    fn arm_msr(&mut self, src: ArmOperandKind, fsxc: u32, spsr: bool);
    fn arm_mrs(&mut self, d: Register, spsr: bool);

    fn arm_ldrstr(
        &mut self,
        n: Register,
        d: Register,
        offset: ArmLdrStrOperandKind,
        config: ArmLdrStrConfig,
    );
    fn arm_ldmstm(&mut self, n: Register, rlist: u16, force_user: bool, config: ArmLdmStmConfig);
    fn arm_swp(&mut self, n: Register, d: Register, m: Register, word: bool);

    #[allow(clippy::too_many_arguments)]
    fn arm_mrc(&mut self, opc: u32, cn: u32, cm: u32, cp: u32, pn: u32, rd: Register);
    #[allow(clippy::too_many_arguments)]
    fn arm_mcr(&mut self, opc: u32, cn: u32, cm: u32, cp: u32, pn: u32, rd: Register);
}
