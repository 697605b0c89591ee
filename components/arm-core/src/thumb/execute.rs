// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

use common::numutil::NumExt;

use super::{decode::*, ThumbHandler, ThumbVisitor};
use crate::{
    interface::{Bus, CpuVersion, SysWrapper},
    memory::{
        access::{NONSEQ, SEQ},
        Address, RelativeOffset,
    },
    state::{Flag::*, LowRegister, Register},
};

impl<S: Bus> SysWrapper<S> {
    pub fn execute_inst_thumb(&mut self, inst: u16) {
        let handler = Self::get_handler_thumb(inst);
        handler(self, ThumbInst::of(inst));
    }

    pub fn get_handler_thumb(inst: u16) -> ThumbHandler<S> {
        S::Version::THUMB_LUT[inst.us() >> 6]
    }

    #[inline]
    fn lreg(&self, reg: LowRegister) -> u32 {
        self.cpur()[reg]
    }
}

impl<S: Bus> ThumbVisitor for SysWrapper<S> {
    const IS_V5: bool = S::Version::IS_V5;

    fn thumb_unknown_opcode(&mut self, inst: ThumbInst) {
        self.und_inst(inst);
    }

    // THUMB.1/2
    fn thumb_arithmetic(&mut self, kind: Thumb1Op, d: LowRegister, s: LowRegister, n: u32) {
        use Thumb1Op::*;
        let rs = self.lreg(s);
        let value = match kind {
            Lsl => self.cpu().lsl::<true>(rs, n),
            Lsr => self.cpu().lsr::<true, true>(rs, n),
            Asr => self.cpu().asr::<true, true>(rs, n),
            Add => self.cpu().add::<true>(rs, n & 7),
            Sub => self.cpu().sub::<true>(rs, n & 7),
        };
        self.cpu()[d] = value;
    }

    // THUMB.2
    fn thumb_2_reg(&mut self, kind: Thumb2Op, d: LowRegister, s: LowRegister, n: LowRegister) {
        let rs = self.lreg(s);
        let rn = self.lreg(n);
        let value = match kind {
            Thumb2Op::Add => self.cpu().add::<true>(rs, rn),
            Thumb2Op::Sub => self.cpu().sub::<true>(rs, rn),
        };
        self.cpu()[d] = value;
    }

    // THUMB.3
    fn thumb_3(&mut self, kind: Thumb3Op, d: LowRegister, n: u32) {
        use Thumb3Op::*;
        let rd = self.lreg(d);
        match kind {
            Mov => {
                self.cpu().set_nz::<true>(n);
                self.cpu()[d] = n;
            }
            Cmp => {
                self.cpu().sub::<true>(rd, n);
            }
            Add => {
                let value = self.cpu().add::<true>(rd, n);
                self.cpu()[d] = value;
            }
            Sub => {
                let value = self.cpu().sub::<true>(rd, n);
                self.cpu()[d] = value;
            }
        };
    }

    // THUMB.4
    fn thumb_alu(&mut self, kind: Thumb4Op, d: LowRegister, s: LowRegister) {
        use Thumb4Op::*;

        let rd = self.lreg(d);
        let rs = self.lreg(s);

        let value = match kind {
            And => self.cpu().and::<true>(rd, rs),
            Eor => self.cpu().xor::<true>(rd, rs),
            Lsl => {
                self.idle_nonseq();
                self.cpu().lsl::<true>(rd, rs & 0xFF)
            }
            Lsr => {
                self.idle_nonseq();
                self.cpu().lsr::<true, false>(rd, rs & 0xFF)
            }
            Asr => {
                self.idle_nonseq();
                self.cpu().asr::<true, false>(rd, rs & 0xFF)
            }
            Adc => {
                let c = self.cpur().is_flag(Carry) as u32;
                self.cpu().adc::<true>(rd, rs, c)
            }
            Sbc => {
                let c = self.cpur().is_flag(Carry) as u32;
                self.cpu().sbc::<true>(rd, rs, c)
            }
            Ror => {
                self.idle_nonseq();
                self.cpu().ror::<true, false>(rd, rs & 0xFF)
            }
            Tst => {
                self.cpu().and::<true>(rd, rs);
                rd
            }
            Neg => self.cpu().neg::<true>(rs),
            Cmp => {
                self.cpu().sub::<true>(rd, rs);
                rd
            }
            Cmn => {
                self.cpu().add::<true>(rd, rs);
                rd
            }
            Orr => self.cpu().or::<true>(rd, rs),
            Mul => {
                self.apply_mul_idle_ticks(rd, true);
                self.cpu().mul::<true>(rd, rs)
            }
            Bic => self.cpu().bit_clear::<true>(rd, rs),
            Mvn => self.cpu().not::<true>(rs),
        };
        self.cpu()[d] = value;
    }

    // THUMB.5
    fn thumb_hi_add(&mut self, (s, d): (Register, Register)) {
        let res = self.reg(d).wrapping_add(self.reg(s));
        self.set_reg(d, res);
    }

    fn thumb_hi_cmp(&mut self, (s, d): (Register, Register)) {
        let rs = self.reg(s);
        let rd = self.reg(d);
        self.cpu().sub::<true>(rd, rs);
    }

    fn thumb_hi_mov(&mut self, (s, d): (Register, Register)) {
        let rs = self.reg(s);
        self.set_reg(d, rs);
    }

    fn thumb_hi_bx(&mut self, s: Register, blx: bool) {
        if blx {
            if !Self::IS_V5 {
                self.und_inst(0x4780u16);
            }
            let rn = self.reg(s);
            let lr = self.cpur().pc() - Address::BYTE;
            self.cpu().set_lr(lr);
            if !rn.is_bit(0) {
                self.cpu().set_flag(Thumb, false);
            }
            self.set_pc(Address(rn));
        } else if s.is_pc() {
            // BX PC: continue in ARM at the aligned PC
            self.cpu().set_flag(Thumb, false);
            self.set_pc(self.cpur().pc());
        } else {
            let rs = self.reg(s);
            if rs.is_bit(0) {
                self.set_pc(Address(rs & !1));
            } else {
                self.cpu().set_flag(Thumb, false);
                self.set_pc(Address(rs & !3));
            }
        }
    }

    // THUMB.6
    fn thumb_ldr6(&mut self, d: LowRegister, offset: Address) {
        let addr = self.cpur().adj_pc() + offset;
        let value = self.read_word_ldrswp(addr, NONSEQ);
        self.cpu()[d] = value;
        // LDR has +1I
        self.idle_nonseq();
    }

    // THUMB.7/8
    fn thumb_ldrstr78(
        &mut self,
        op: ThumbStrLdrOp,
        d: LowRegister,
        b: LowRegister,
        o: LowRegister,
    ) {
        use ThumbStrLdrOp::*;

        let rb = self.lreg(b);
        let ro = self.lreg(o);
        let rd = self.lreg(d);
        let addr = Address(rb.wrapping_add(ro));
        self.cpu().access_type = NONSEQ;

        match op {
            Str => self.write::<u32>(addr, rd, NONSEQ),
            Strh => self.write::<u16>(addr, rd.u16(), NONSEQ),
            Strb => self.write::<u8>(addr, rd.u8(), NONSEQ),
            _ => {
                let value = match op {
                    Ldsb => self.read::<u8>(addr, NONSEQ) as i8 as i32 as u32,
                    Ldr => self.read_word_ldrswp(addr, NONSEQ),
                    Ldrh => self.read::<u16>(addr, NONSEQ),
                    Ldrb => self.read::<u8>(addr, NONSEQ).u32(),
                    _ => self.read_hword_ldrsh(addr, NONSEQ),
                };
                self.cpu()[d] = value;
            }
        }
        if op > Strb {
            // LDR has +1I
            self.tick(1);
        }
    }

    // THUMB.9
    fn thumb_ldrstr9(&mut self, op: ThumbStrLdrOp, d: LowRegister, b: LowRegister, offset: Address) {
        use ThumbStrLdrOp::*;

        let rb = Address(self.lreg(b));
        let rd = self.lreg(d);
        self.cpu().access_type = NONSEQ;

        match op {
            Str => self.write::<u32>(rb + offset, rd, NONSEQ),
            Strb => self.write::<u8>(rb + offset, rd.u8(), NONSEQ),

            Ldr => {
                let value = self.read_word_ldrswp(rb + offset, NONSEQ);
                self.cpu()[d] = value;
            }
            Ldrb => {
                let value = self.read::<u8>(rb + offset, NONSEQ).u32();
                self.cpu()[d] = value;
            }

            _ => unreachable!(),
        }

        if op == Ldr || op == Ldrb {
            // LDR has +1I
            self.tick(1);
        }
    }

    // THUMB.10
    fn thumb_ldrstr10(&mut self, str: bool, d: LowRegister, b: LowRegister, offset: Address) {
        let rd = self.lreg(d);
        let addr = Address(self.lreg(b)) + offset;
        self.cpu().access_type = NONSEQ;

        if str {
            self.write::<u16>(addr, rd.u16(), NONSEQ);
        } else {
            let value = self.read::<u16>(addr, NONSEQ).u32();
            self.cpu()[d] = value;
            // LDR has +1I
            self.tick(1);
        }
    }

    // THUMB.11
    fn thumb_str_sp(&mut self, d: LowRegister, offset: Address) {
        let rd = self.lreg(d);
        let addr = self.cpur().sp() + offset;
        self.cpu().access_type = NONSEQ;
        self.write::<u32>(addr, rd, NONSEQ);
    }

    fn thumb_ldr_sp(&mut self, d: LowRegister, offset: Address) {
        let addr = self.cpur().sp() + offset;
        let value = self.read_word_ldrswp(addr, NONSEQ);
        self.cpu()[d] = value;
        // LDR has +1I
        self.idle_nonseq();
    }

    // THUMB.12
    fn thumb_rel_addr(&mut self, sp: bool, d: LowRegister, offset: Address) {
        let value = if sp {
            (self.cpur().sp() + offset).0
        } else {
            (self.cpur().adj_pc() + offset).0
        };
        self.cpu()[d] = value;
    }

    // THUMB.13
    fn thumb_sp_offs(&mut self, offset: RelativeOffset) {
        let sp = self.cpur().sp();
        self.cpu().set_sp(sp.add_rel(offset));
    }

    // THUMB.14
    fn thumb_push(&mut self, reg_list: u8, lr: bool) {
        let mut sp = self.cpur().sp();
        let mut kind = NONSEQ;

        if lr {
            sp -= Address::WORD;
            let lr = self.cpur().lr();
            self.write::<u32>(sp, lr.0, kind);
            kind = SEQ;
        }

        for reg in LowRegister::from_rlist(reg_list).rev() {
            sp -= Address::WORD;
            let reg = self.lreg(reg);
            self.write::<u32>(sp, reg, kind);
            kind = SEQ;
        }

        if kind == NONSEQ {
            self.on_empty_rlist(Register(13), true, false, true);
            return;
        }
        self.cpu().set_sp(sp);
        self.cpu().access_type = NONSEQ;
    }

    fn thumb_pop(&mut self, reg_list: u8, pc: bool) {
        let mut sp = self.cpur().sp();
        let mut kind = NONSEQ;

        for reg in LowRegister::from_rlist(reg_list) {
            let value = self.read::<u32>(sp, kind);
            self.cpu()[reg] = value;
            sp += Address::WORD;
            kind = SEQ;
        }

        if pc {
            let pc = self.read::<u32>(sp, kind);
            if Self::IS_V5 && !pc.is_bit(0) {
                self.cpu().set_flag(Thumb, false);
            }
            self.set_pc(Address(pc));
            sp += Address::WORD;
            kind = SEQ;
        }

        if kind == NONSEQ {
            self.on_empty_rlist(Register(13), false, true, false);
            return;
        }
        self.cpu().set_sp(sp);
        self.idle_nonseq();
    }

    // THUMB.15
    fn thumb_stmia(&mut self, b: LowRegister, reg_list: u8) {
        let mut kind = NONSEQ;
        let mut base_rlist_addr = None;
        let mut rb = Address(self.lreg(b));

        for reg in LowRegister::from_rlist(reg_list) {
            if reg == b && kind != NONSEQ {
                base_rlist_addr = Some(Address(self.lreg(b)));
            }
            let reg = self.lreg(reg);
            self.write::<u32>(rb, reg, kind);
            rb += Address::WORD;
            self.cpu()[b] = rb.0;
            kind = SEQ;
        }

        if let Some(addr) = base_rlist_addr {
            // If base was in Rlist and not the first, write the final
            // address to that location. Timing was already accounted for
            // by the (wrong) write in the loop above.
            self.set::<u32>(addr, rb.0);
        }

        if kind == NONSEQ {
            self.on_empty_rlist(Register(b.0), true, true, false);
        }
        self.cpu().access_type = NONSEQ;
    }

    fn thumb_ldmia(&mut self, b: LowRegister, reg_list: u8) {
        let mut kind = NONSEQ;
        let mut addr = Address(self.lreg(b));

        for reg in LowRegister::from_rlist(reg_list) {
            let value = self.read::<u32>(addr, kind);
            self.cpu()[reg] = value;
            addr += Address::WORD;
            kind = SEQ;
        }

        if kind == NONSEQ {
            self.on_empty_rlist(Register(b.0), false, true, false);
            return;
        }
        // A loaded base register wins over the writeback.
        if !reg_list.is_bit(b.0) {
            self.cpu()[b] = addr.0;
        }
        self.idle_nonseq();
    }

    // THUMB.16
    fn thumb_bcond(&mut self, cond: u16, offset: RelativeOffset) {
        if self.cpur().eval_condition(cond) {
            self.relative_jump(offset);
        }
    }

    // THUMB.17
    fn thumb_swi(&mut self) {
        self.exception_occurred(crate::Exception::Swi);
    }

    // THUMB.18
    fn thumb_br(&mut self, offset: RelativeOffset) {
        self.relative_jump(offset);
    }

    // THUMB.19
    fn thumb_set_lr(&mut self, offset: RelativeOffset) {
        let lr = self.cpur().pc().add_rel(offset);
        self.cpu().set_lr(lr);
    }

    fn thumb_bl(&mut self, offset: Address, thumb: bool) {
        let pc = self.cpur().pc();
        let target = self.cpur().lr() + offset;
        // The BLX suffix continues in ARM; switch before the jump so the
        // target is aligned for the new width.
        self.cpu().set_flag(Thumb, thumb);
        self.set_pc(target);
        self.cpu().set_lr(pc - Address::BYTE);
    }
}
