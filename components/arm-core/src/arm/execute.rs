// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

use common::numutil::{NumExt, U32Ext};

use super::{decode::*, ArmHandler, ArmVisitor};
use crate::{
    interface::{Bus, CpuVersion, Model, SysWrapper},
    memory::{
        access::{NONSEQ, SEQ},
        Address, RelativeOffset,
    },
    state::{Flag::*, Mode, Register},
    Exception,
};

impl<S: Bus> SysWrapper<S> {
    pub fn execute_inst_arm(&mut self, inst: u32) {
        if !self.check_arm_cond(inst) {
            return;
        }

        let handler = Self::get_handler_arm(inst);
        handler(self, ArmInst::of(inst));
    }

    pub fn check_arm_cond(&mut self, inst: u32) -> bool {
        // BLX and MRC2/MCR2 on ARMv5 are encoded with NV.
        let armv5_uncond = S::Version::IS_V5
            && ((inst.bits(25, 7) == 0b111_1101) || (inst.bits(24, 9) == 0b1_1111_1110));
        self.cpur().eval_condition(inst.bits(28, 4).u16()) || armv5_uncond
    }

    pub fn get_handler_arm(inst: u32) -> ArmHandler<S> {
        S::Version::ARM_LUT[arm_inst_to_lookup_idx(inst)]
    }
}

impl<S: Bus> ArmVisitor for SysWrapper<S> {
    const IS_V5: bool = S::Version::IS_V5;
    const MODEL: Model = S::Version::MODEL;

    fn arm_unknown_opcode(&mut self, inst: ArmInst) {
        self.und_inst(inst);
    }

    fn arm_swi(&mut self) {
        self.exception_occurred(Exception::Swi);
    }

    fn arm_hint(&mut self, ty: u32) {
        match ty {
            // NOP
            0 => (),
            // WFI
            3 => self.cpu().halt_on_irq(),
            _ => panic!("unhandled hint instruction type 0x{ty:X}"),
        }
    }

    fn arm_b(&mut self, offset: RelativeOffset) {
        self.relative_jump(offset);
    }

    fn arm_bl(&mut self, offset: RelativeOffset) {
        let lr = self.cpur().pc() - Address::WORD;
        self.cpu().set_lr(lr);
        self.relative_jump(offset);
    }

    fn arm_bx(&mut self, n: Register) {
        let rn = self.reg(n);
        let is_thumb = rn.is_bit(0);
        self.cpu().set_flag(Thumb, is_thumb);
        self.set_pc(Address(rn - is_thumb as u32));
    }

    fn arm_blx(&mut self, src: ArmSignedOperandKind) {
        match src {
            ArmSignedOperandKind::Immediate(offset) => {
                let lr = self.cpur().pc() - Address::WORD;
                self.cpu().set_lr(lr);
                self.cpu().set_flag(Thumb, true);
                self.set_pc(self.cpur().pc().add_rel(offset));
            }

            ArmSignedOperandKind::Register(reg) => {
                let rn = self.reg(reg);
                let lr = self.cpur().pc() - Address::WORD;
                self.cpu().set_lr(lr);

                let is_thumb = rn.is_bit(0);
                self.cpu().set_flag(Thumb, is_thumb);
                self.set_pc(Address(rn - is_thumb as u32));
            }
        }
    }

    fn arm_alu_reg(
        &mut self,
        n: Register,
        d: Register,
        m: Register,
        op: ArmAluOp,
        shift_kind: ArmAluShift,
        shift_operand: ArmOperandKind,
        cpsr: bool,
    ) {
        let carry = self.cpur().is_flag(Carry);
        let (a, b) = match shift_operand {
            ArmOperandKind::Immediate(imm) => {
                let a = self.reg(n);
                let rm = self.reg(m);
                (a, self.shifted_op::<true>(rm, shift_kind, imm, cpsr))
            }
            // Shift amounts from a register make operand reads of the PC
            // observe PC+12.
            ArmOperandKind::Register(reg) => {
                let a = self.reg_pc4(n);
                let rm = self.reg_pc4(m);
                let shift = self.reg(reg) & 0xFF;
                (a, self.shifted_op::<false>(rm, shift_kind, shift, cpsr))
            }
        };
        self.alu_inner(op, a, b, carry, d, cpsr);
    }

    fn arm_alu_imm(
        &mut self,
        n: Register,
        d: Register,
        imm: u32,
        ror_by: u32,
        op: ArmAluOp,
        cpsr: bool,
    ) {
        let carry = self.cpur().is_flag(Carry);
        let imm = if ror_by == 0 {
            imm
        } else if cpsr {
            self.cpu().ror::<true, false>(imm, ror_by)
        } else {
            imm.rotate_right(ror_by)
        };
        let a = self.reg(n);
        self.alu_inner(op, a, imm, carry, d, cpsr);
    }

    fn arm_mul(
        &mut self,
        n: Register,
        s: Register,
        d: Register,
        m: Register,
        op: ArmMulOp,
        cpsr: bool,
    ) {
        let rm = self.reg(m);
        let rs = self.reg(s);
        let rn = self.reg(n);
        let rd = self.reg(d);

        let a = rm as u64;
        let b = rs as u64;
        let dhi = rd as u64;
        let dlo = rn as u64;

        let out: u64 = match op {
            ArmMulOp::Mul => rm.wrapping_mul(rs) as u64,
            ArmMulOp::Mla => {
                let r = rm.wrapping_mul(rs).wrapping_add(rn);
                self.tick(1);
                r as u64
            }
            ArmMulOp::Umaal => a.wrapping_mul(b).wrapping_add(dhi).wrapping_add(dlo),
            ArmMulOp::Umull => {
                self.tick(1);
                a.wrapping_mul(b)
            }
            ArmMulOp::Umlal => {
                self.tick(2);
                a.wrapping_mul(b).wrapping_add(dlo | (dhi << 32))
            }
            ArmMulOp::Smull => {
                self.tick(1);
                (a as i32 as i64).wrapping_mul(b as i32 as i64) as u64
            }
            ArmMulOp::Smlal => {
                self.tick(2);
                (a as i32 as i64)
                    .wrapping_mul(b as i32 as i64)
                    .wrapping_add((dlo | (dhi << 32)) as i64) as u64
            }
        };

        let is_long = !matches!(op, ArmMulOp::Mul | ArmMulOp::Mla);
        if is_long {
            self.set_reg(d, (out >> 32).u32());
            self.set_reg(n, out.u32());
        } else {
            self.set_reg(d, out.u32());
        }
        if cpsr {
            let neg_bit = if is_long { 63 } else { 31 };
            self.cpu().set_flag(Zero, out == 0);
            self.cpu().set_flag(Neg, out.is_bit(neg_bit));
        }

        let signed = matches!(op, ArmMulOp::Smull | ArmMulOp::Smlal);
        self.apply_mul_idle_ticks(b as u32, signed);
    }

    fn arm_sh_mul(
        &mut self,
        n: Register,
        s: Register,
        d: Register,
        m: Register,
        op: ArmShMulOp,
        x_top: bool,
        y_top: bool,
    ) {
        let rm = self.reg(m);
        let rs = self.reg(s);
        let rn = self.reg(n);
        let rd = self.reg(d);

        let a = if x_top { rm.high() } else { rm.low() } as i16 as i64;
        let b = if y_top { rs.high() } else { rs.low() } as i16 as i64;

        let out: u32 = match op {
            ArmShMulOp::SmlaXy => {
                // Accumulate updates the sticky flag without saturating.
                let r = a.wrapping_mul(b) as i32;
                if r.checked_add(rn as i32).is_none() {
                    self.cpu().set_flag(QClamped, true);
                }
                r.wrapping_add(rn as i32) as u32
            }
            ArmShMulOp::SmlawYOrSmulwY if x_top => {
                // SMULW
                (((rm as i32 as i64).wrapping_mul(b)) >> 16) as u32
            }
            ArmShMulOp::SmlawYOrSmulwY => {
                // SMLAW
                let r = (((rm as i32 as i64).wrapping_mul(b)) >> 16) as i32;
                if r.checked_add(rn as i32).is_none() {
                    self.cpu().set_flag(QClamped, true);
                }
                r.wrapping_add(rn as i32) as u32
            }
            ArmShMulOp::SmlalXy => {
                let acc = (rn as u64) | ((rd as u64) << 32);
                let out = (acc as i64).wrapping_add(a.wrapping_mul(b)) as u64;
                self.set_reg(d, (out >> 32) as u32);
                self.set_reg(n, out as u32);
                self.apply_mul_idle_ticks(b as u32, true);
                return;
            }
            ArmShMulOp::SmulXy => a.wrapping_mul(b) as u32,
        };

        self.set_reg(d, out);
        self.apply_mul_idle_ticks(b as u32, true);
    }

    fn arm_clz(&mut self, m: Register, d: Register) {
        let count = self.reg(m).leading_zeros();
        self.set_reg(d, count);
    }

    fn arm_q(&mut self, n: Register, m: Register, d: Register, op: ArmQOp) {
        let rm = self.reg(m) as i32;
        let rn = self.reg(n) as i32;
        let value = match op {
            ArmQOp::Qadd => rm.saturating_add(rn),
            ArmQOp::Qsub => rm.saturating_sub(rn),
            ArmQOp::QdAdd => rm.saturating_add(rn.saturating_mul(2)),
            ArmQOp::QdSub => rm.saturating_sub(rn.saturating_mul(2)),
        };
        let checked = match op {
            ArmQOp::Qadd => rm.checked_add(rn),
            ArmQOp::Qsub => rm.checked_sub(rn),
            ArmQOp::QdAdd => rn.checked_mul(2).and_then(|rn| rm.checked_add(rn)),
            ArmQOp::QdSub => rn.checked_mul(2).and_then(|rn| rm.checked_sub(rn)),
        };
        if checked.is_none() {
            self.cpu().set_flag(QClamped, true);
        }
        self.set_reg(d, value as u32);
    }

    fn arm_msr(&mut self, src: ArmOperandKind, fsxc: u32, spsr: bool) {
        let src = match src {
            ArmOperandKind::Immediate(imm) => imm,
            ArmOperandKind::Register(reg) => self.reg(reg),
        };
        let mut mask = 0;
        for (bit, lanes) in [(0, 0x0000_00FF), (1, 0x0000_FF00), (2, 0x00FF_0000), (3, 0xFF00_0000)]
        {
            if fsxc.is_bit(bit) {
                mask |= lanes;
            }
        }
        // In user mode only the flag byte is writable.
        if self.cpur().mode() == Mode::User {
            mask &= 0xFF00_0000;
        }

        if spsr {
            let value = (self.cpur().spsr() & !mask) | (src & mask);
            self.cpu().set_spsr(value);
        } else {
            // The T bit may not be changed through MSR.
            let mask = mask & !(1 << 5);
            let value = (self.cpur().cpsr() & !mask) | (src & mask);
            self.cpu().set_cpsr(value);
        }
    }

    fn arm_mrs(&mut self, d: Register, spsr: bool) {
        let psr = if spsr {
            self.cpur().spsr()
        } else {
            self.cpur().cpsr()
        };
        self.set_reg(d, psr.set_bit(4, true));
    }

    fn arm_ldrstr(
        &mut self,
        n: Register,
        d: Register,
        offset: ArmLdrStrOperandKind,
        config: ArmLdrStrConfig,
    ) {
        use ArmLdrStrKind::*;

        // LDRT/STRT force user-mode translation; not supported by this core.
        if !config.pre
            && config.writeback_bit
            && matches!(config.kind, LoadByte | LoadWord | StoreByte | StoreWord)
        {
            panic!(
                "unsupported translated transfer (LDRT/STRT) at PC = 0x{:08X}",
                self.cpur().pc().0
            );
        }
        if matches!(config.kind, LoadDoubleWord | StoreDoubleWord)
            && (!Self::IS_V5 || d.0 & 1 == 1)
        {
            // LDRD/STRD are ARMv5-only, and odd destinations are undefined.
            panic!(
                "undefined doubleword transfer to r{} on {:?} (PC = 0x{:08X})",
                d.0,
                Self::MODEL,
                self.cpur().pc().0
            );
        }

        let mut addr = Address(self.reg(n));
        let offset = match offset {
            ArmLdrStrOperandKind::Immediate(imm) => Address(imm),
            ArmLdrStrOperandKind::Register(reg) => Address(self.reg(reg)),
            ArmLdrStrOperandKind::ShiftedRegister { base, shift, by } => {
                let base = self.reg(base);
                Address(self.shifted_op::<true>(base, shift, by, false))
            }
        };
        if config.pre {
            addr = addr.add_signed(offset, config.up);
        }

        match config.kind {
            LoadByte => {
                let val = self.read::<u8>(addr, NONSEQ).u32();
                self.set_reg(d, val);
            }
            LoadSignedByte => {
                let val = self.read::<u8>(addr, NONSEQ) as i8 as i32 as u32;
                self.set_reg(d, val);
            }
            StoreByte => self.write::<u8>(addr, self.reg_pc4(d).u8(), NONSEQ),

            LoadHalfword => {
                let val = self.read::<u16>(addr, NONSEQ).u32();
                self.set_reg(d, val);
            }
            LoadSignedHalfword => {
                let val = self.read_hword_ldrsh(addr, NONSEQ);
                self.set_reg(d, val);
            }
            StoreHalfword => self.write::<u16>(addr, self.reg_pc4(d).u16(), NONSEQ),

            LoadWord => {
                let val = self.read_word_ldrswp(addr, NONSEQ);
                self.set_reg_allow_switch(d, val);
            }
            StoreWord => self.write::<u32>(addr, self.reg_pc4(d), NONSEQ),

            LoadDoubleWord => {
                let val = self.read::<u32>(addr, NONSEQ);
                self.set_reg(d, val);
                let val = self.read::<u32>(addr + Address::WORD, SEQ);
                self.set_reg(Register((d.0 + 1) & 15), val);
            }
            StoreDoubleWord => {
                self.write::<u32>(addr, self.reg_pc4(d), NONSEQ);
                let value = self.reg_pc4(Register((d.0 + 1) & 15));
                self.write::<u32>(addr + Address::WORD, value, SEQ);
            }
        }

        if !config.pre {
            addr = addr.add_signed(offset, config.up);
        }
        // Writeback does nothing when the loaded register is the base;
        // LDRD extends that to the second destination, like LDM.
        let wb_allowed = match config.kind {
            LoadDoubleWord => n.0 != (d.0 + 1) & 15,
            k if k.is_ldr() => n != d,
            _ => true,
        };
        if config.writeback() && wb_allowed {
            self.set_reg(n, addr.0);
        }

        self.cpu().access_type = NONSEQ;
        if config.kind.is_ldr() {
            // All LDR stall by 1I
            self.tick(1);
        }
    }

    fn arm_ldmstm(&mut self, n: Register, rlist: u16, force_user: bool, config: ArmLdmStmConfig) {
        let starting_addr = Address(self.reg(n));
        let cpsr = self.cpur().cpsr();
        // With the S bit, transfers use the user bank; LDM with PC in the
        // list instead restores SPSR at the end.
        let load_psr = force_user && config.ldr && rlist.is_bit(15);
        if force_user && !load_psr {
            self.cpu().set_mode(Mode::System);
        }

        let mut addr = starting_addr;
        let first_register = Register(rlist.trailing_zeros() as u16);
        let last_register = 15u16
            .checked_sub(rlist.leading_zeros() as u16)
            .map(Register);
        let register_count = rlist.count_ones();
        let ending_offset = Address(register_count * 4);
        if !config.up {
            addr = addr.add_signed(Address::WORD, !config.pre);
            addr -= ending_offset;
        }
        let mut kind = NONSEQ;
        let mut set_n = false;

        for reg in Register::from_rlist(rlist) {
            set_n |= reg == n;
            if config.pre {
                addr += Address::WORD;
            }
            // STM with the base in the list: the ARM7 stores the new base
            // unless the base is first; the ARM9 always stores the old one.
            if !config.ldr && config.writeback && !Self::IS_V5 && reg == n && reg != first_register
            {
                self.set_reg(n, starting_addr.add_signed(ending_offset, config.up).0);
            }

            if config.ldr {
                let val = self.read::<u32>(addr, kind);
                self.set_reg_allow_switch(reg, val);
            } else {
                let val = self.reg_pc4(reg);
                self.write::<u32>(addr, val, kind);
            }

            kind = SEQ;
            if !config.pre {
                addr += Address::WORD;
            }
        }

        if force_user && !load_psr {
            self.cpu().set_cpsr(cpsr);
        }
        if load_psr {
            let spsr = self.cpur().spsr();
            self.cpu().set_cpsr(spsr);
        }

        let ldr_writeback = if Self::IS_V5 {
            // LDM ARMv5: writeback if base is the only register,
            // or not the last one in the list.
            register_count == 1 || last_register != Some(n)
        } else {
            // LDM ARMv4: writeback if base is not in the list.
            !set_n
        };
        if config.writeback && (!config.ldr || ldr_writeback) {
            self.set_reg(n, starting_addr.add_signed(ending_offset, config.up).0);
        }

        if kind == NONSEQ {
            self.on_empty_rlist(n, !config.ldr, config.up, config.pre);
        }
        self.cpu().access_type = NONSEQ;
        if config.ldr {
            // All LDR stall by 1I
            self.tick(1);
        }
    }

    fn arm_swp(&mut self, n: Register, d: Register, m: Register, word: bool) {
        let addr = Address(self.reg(n));
        let mem_value = if word {
            self.read_word_ldrswp(addr, NONSEQ)
        } else {
            self.read::<u8>(addr, NONSEQ).u32()
        };
        let reg = self.reg(m);
        if word {
            self.write::<u32>(addr, reg, NONSEQ);
        } else {
            self.write::<u8>(addr, reg.u8(), NONSEQ);
        }
        self.set_reg(d, mem_value);
        self.idle_nonseq();
    }

    fn arm_mrc(&mut self, opc: u32, cn: u32, cm: u32, cp: u32, pn: u32, rd: Register) {
        if !Self::IS_V5 || pn != 15 || opc != 0 {
            // No coprocessor is mapped there.
            self.und_inst(pn);
        }

        let value = self.get_cp15(opc, cn, cm, cp);
        if rd.is_pc() {
            let cpsr = (self.cpur().cpsr() & 0x0FFF_FFFF) | (value & 0xF000_0000);
            self.cpu().set_cpsr_flags(cpsr);
        } else {
            self.set_reg(rd, value);
        }
    }

    fn arm_mcr(&mut self, opc: u32, cn: u32, cm: u32, cp: u32, pn: u32, rd: Register) {
        if !Self::IS_V5 || pn != 15 || opc != 0 {
            self.und_inst(pn);
        }

        let rd = self.reg_pc4(rd);
        self.set_cp15(opc, cn, cm, cp, rd);
    }
}

impl<S: Bus> SysWrapper<S> {
    fn alu_inner(&mut self, op: ArmAluOp, a: u32, b: u32, c: bool, d: Register, cpsr: bool) {
        use ArmAluOp::*;
        let value = match (op, cpsr) {
            (And, true) => self.cpu().and::<true>(a, b),
            (And, false) => self.cpu().and::<false>(a, b),
            (Eor, true) => self.cpu().xor::<true>(a, b),
            (Eor, false) => self.cpu().xor::<false>(a, b),
            (Sub, true) => self.cpu().sub::<true>(a, b),
            (Sub, false) => self.cpu().sub::<false>(a, b),
            (Rsb, true) => self.cpu().sub::<true>(b, a),
            (Rsb, false) => self.cpu().sub::<false>(b, a),
            (Add, true) => self.cpu().add::<true>(a, b),
            (Add, false) => self.cpu().add::<false>(a, b),
            (Adc, true) => self.cpu().adc::<true>(a, b, c as u32),
            (Adc, false) => self.cpu().adc::<false>(a, b, c as u32),
            (Sbc, true) => self.cpu().sbc::<true>(a, b, c as u32),
            (Sbc, false) => self.cpu().sbc::<false>(a, b, c as u32),
            (Rsc, true) => self.cpu().sbc::<true>(b, a, c as u32),
            (Rsc, false) => self.cpu().sbc::<false>(b, a, c as u32),
            (Tst, _) => {
                self.cpu().and::<true>(a, b);
                0
            }
            (Teq, _) => {
                self.cpu().xor::<true>(a, b);
                0
            }
            (Cmp, _) => {
                self.cpu().sub::<true>(a, b);
                0
            }
            (Cmn, _) => {
                self.cpu().add::<true>(a, b);
                0
            }
            (Orr, true) => self.cpu().or::<true>(a, b),
            (Orr, false) => self.cpu().or::<false>(a, b),
            (Mov, _) => {
                if cpsr {
                    self.cpu().set_nz::<true>(b);
                }
                b
            }
            (Bic, true) => self.cpu().bit_clear::<true>(a, b),
            (Bic, false) => self.cpu().bit_clear::<false>(a, b),
            (Mvn, true) => self.cpu().not::<true>(b),
            (Mvn, false) => self.cpu().not::<false>(b),
        };

        if cpsr && d.is_pc() && self.cpur().mode() != Mode::User && self.cpur().mode() != Mode::System
        {
            // If S=1, not in user/system mode and the dest is the PC, set
            // CPSR to current SPSR; the pipeline reload below picks up a
            // switch to THUMB.
            let spsr = self.cpur().spsr();
            self.cpu().set_cpsr(spsr);
        }

        if op.should_write() {
            // Only write if needed - the compare ops might set PC
            // when they should not
            self.set_reg(d, value);
        }
    }

    pub(super) fn shifted_op<const IMM: bool>(
        &mut self,
        nn: u32,
        op: ArmAluShift,
        shift_amount: u32,
        cpsr: bool,
    ) -> u32 {
        if op == ArmAluShift::Lsl && shift_amount == 0 {
            // Special case: no shift
            nn
        } else {
            match (op, cpsr) {
                (ArmAluShift::Lsl, true) => self.cpu().lsl::<true>(nn, shift_amount),
                (ArmAluShift::Lsl, false) => self.cpu().lsl::<false>(nn, shift_amount),
                (ArmAluShift::Lsr, true) => self.cpu().lsr::<true, IMM>(nn, shift_amount),
                (ArmAluShift::Lsr, false) => self.cpu().lsr::<false, IMM>(nn, shift_amount),
                (ArmAluShift::Asr, true) => self.cpu().asr::<true, IMM>(nn, shift_amount),
                (ArmAluShift::Asr, false) => self.cpu().asr::<false, IMM>(nn, shift_amount),
                (ArmAluShift::Ror, true) => self.cpu().ror::<true, IMM>(nn, shift_amount),
                (ArmAluShift::Ror, false) => self.cpu().ror::<false, IMM>(nn, shift_amount),
            }
        }
    }
}
