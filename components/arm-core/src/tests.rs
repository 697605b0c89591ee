// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Interpreter tests against a flat-RAM bus, for both CPU models.

use common::{
    numutil::{ByteArrayExt, NumExt},
    Time,
};

use crate::{
    interface::{Arm7Tdmi, Arm946Es, Bus, RwType},
    state::{CpuState, Flag, Mode},
    Access, Address, Cpu, Interrupt,
};

macro_rules! test_bus {
    ($name:ident, $version:ty) => {
        struct $name {
            cpu: CpuState,
            ram: Vec<u8>,
            time: Time,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    cpu: CpuState::default(),
                    ram: vec![0; 64 * 1024],
                    time: 0,
                }
            }
        }

        impl Bus for $name {
            type Version = $version;

            fn cpur(&self) -> &CpuState {
                &self.cpu
            }

            fn cpu(&mut self) -> &mut CpuState {
                &mut self.cpu
            }

            fn tick(&mut self, cycles: Time) {
                self.time += cycles;
            }

            fn handle_events(&mut self) {}

            fn get<T: RwType>(&mut self, addr: Address) -> T {
                self.ram.get_wrap((addr.0 & !(T::WIDTH - 1)).us())
            }

            fn set<T: RwType>(&mut self, addr: Address, value: T) {
                self.ram.set_wrap((addr.0 & !(T::WIDTH - 1)).us(), value);
            }

            fn wait_time<T: RwType>(&mut self, _addr: Address, _access: Access) -> u16 {
                1
            }
        }
    };
}

test_bus!(TestBus7, Arm7Tdmi);
test_bus!(TestBus9, Arm946Es);

fn with_code9(code: &[u32]) -> TestBus9 {
    let mut bus = TestBus9::default();
    for (i, inst) in code.iter().enumerate() {
        bus.ram.set_exact(i * 4, *inst);
    }
    bus
}

fn with_code7(code: &[u32]) -> TestBus7 {
    let mut bus = TestBus7::default();
    for (i, inst) in code.iter().enumerate() {
        bus.ram.set_exact(i * 4, *inst);
    }
    bus
}

fn run(bus: &mut impl Cpu, count: usize) {
    for _ in 0..count {
        bus.continue_running();
    }
}

#[test]
fn data_processing_sequence() {
    // mov r0, #1; mov r1, #2; add r2, r0, r1
    let mut bus = with_code9(&[0xE3A0_0001, 0xE3A0_1002, 0xE080_2001]);
    let pc = bus.cpu.pc().0;
    run(&mut bus, 3);
    assert_eq!(bus.cpu.registers[0], 1);
    assert_eq!(bus.cpu.registers[1], 2);
    assert_eq!(bus.cpu.registers[2], 3);
    assert_eq!(bus.cpu.pc().0, pc + 12);
}

#[test]
fn conditions_gate_execution() {
    // movs r0, #0; movne r1, #1; moveq r1, #2
    let mut bus = with_code9(&[0xE3B0_0000, 0x13A0_1001, 0x03A0_1002]);
    run(&mut bus, 3);
    assert!(bus.cpu.is_flag(Flag::Zero));
    assert_eq!(bus.cpu.registers[1], 2);
}

#[test]
fn misaligned_word_load_rotates() {
    // ldr r0, [r1]
    let mut bus = with_code9(&[0xE591_0000]);
    bus.ram.set_exact(0x100, 0xAABB_CCDDu32);
    bus.cpu.registers[1] = 0x101;
    run(&mut bus, 1);
    assert_eq!(bus.cpu.registers[0], 0xAABB_CCDDu32.rotate_right(8));
}

#[test]
fn str_stores_and_writes_back() {
    // str r0, [r1], #4
    let mut bus = with_code9(&[0xE481_0004]);
    bus.cpu.registers[0] = 0x1234_5678;
    bus.cpu.registers[1] = 0x200;
    run(&mut bus, 1);
    assert_eq!(bus.ram.get_exact::<u32>(0x200), 0x1234_5678);
    assert_eq!(bus.cpu.registers[1], 0x204);
}

#[test]
fn bx_interworks_to_thumb() {
    // bx r0
    let mut bus = with_code9(&[0xE12F_FF10]);
    bus.cpu.registers[0] = 0x201;
    run(&mut bus, 1);
    assert!(bus.cpu.is_flag(Flag::Thumb));
    // Loop-top PC is one fetch ahead of the next instruction
    assert_eq!(bus.cpu.pc().0, 0x202);
}

#[test]
fn shift_by_register_reads_pc_plus_12() {
    // add r0, pc, pc, lsl r1 (r1 = 0)
    let mut bus = with_code9(&[0xE08F_011F]);
    bus.cpu.registers[1] = 0;
    run(&mut bus, 1);
    // Both operands observe PC+12 = 12
    assert_eq!(bus.cpu.registers[0], 24);
}

#[test]
fn clz_bounds() {
    // clz r1, r0
    for (input, expected) in [(0u32, 32u32), (1, 31), (0x8000_0000, 0)] {
        let mut bus = with_code9(&[0xE16F_1F10]);
        bus.cpu.registers[0] = input;
        run(&mut bus, 1);
        assert_eq!(bus.cpu.registers[1], expected);
    }
}

#[test]
fn qadd_saturates_and_sets_q() {
    // qadd r2, r0, r1
    let mut bus = with_code9(&[0xE101_2050]);
    bus.cpu.registers[0] = 0x7FFF_FFFF;
    bus.cpu.registers[1] = 1;
    run(&mut bus, 1);
    assert_eq!(bus.cpu.registers[2], 0x7FFF_FFFF);
    assert!(bus.cpu.is_flag(Flag::QClamped));
}

#[test]
#[should_panic]
fn clz_is_undefined_on_arm7() {
    let mut bus = with_code7(&[0xE16F_1F10]);
    run(&mut bus, 1);
}

#[test]
fn mul_only_advances_pc() {
    // mul r0, r0, r0
    let mut bus = with_code9(&[0xE000_0090]);
    bus.cpu.registers[0] = 7;
    let pc = bus.cpu.pc().0;
    run(&mut bus, 1);
    assert_eq!(bus.cpu.registers[0], 49);
    assert_eq!(bus.cpu.pc().0, pc + 4);
}

#[test]
fn stm_stores_old_base_on_arm9() {
    // stmia r0!, {r0, r1}
    let mut bus = with_code9(&[0xE8A0_0003]);
    bus.cpu.registers[0] = 0x300;
    bus.cpu.registers[1] = 0x1111_1111;
    run(&mut bus, 1);
    assert_eq!(bus.ram.get_exact::<u32>(0x300), 0x300);
    assert_eq!(bus.ram.get_exact::<u32>(0x304), 0x1111_1111);
    assert_eq!(bus.cpu.registers[0], 0x308);
}

#[test]
fn ldm_writeback_model_split() {
    // ldmia r0!, {r0}: the ARM7 keeps the loaded value, the ARM9
    // (single-register list) writes the base back over it.
    let mut bus7 = with_code7(&[0xE8B0_0001]);
    bus7.ram.set_exact(0x400, 0xCAFE_0000u32);
    bus7.cpu.registers[0] = 0x400;
    run(&mut bus7, 1);
    assert_eq!(bus7.cpu.registers[0], 0xCAFE_0000);

    let mut bus9 = with_code9(&[0xE8B0_0001]);
    bus9.ram.set_exact(0x400, 0xCAFE_0000u32);
    bus9.cpu.registers[0] = 0x400;
    run(&mut bus9, 1);
    assert_eq!(bus9.cpu.registers[0], 0x404);
}

#[test]
#[should_panic]
fn empty_rlist_panics_on_arm9() {
    // stmia r0!, {}
    let mut bus = with_code9(&[0xE8A0_0000]);
    bus.cpu.registers[0] = 0x300;
    run(&mut bus, 1);
}

#[test]
fn empty_rlist_transfers_pc_on_arm7() {
    // stmia r0!, {}
    let mut bus = with_code7(&[0xE8A0_0000]);
    bus.cpu.registers[0] = 0x300;
    run(&mut bus, 1);
    // PC+4 beyond the fetch stage gets stored, base moves by 0x40
    assert_eq!(bus.ram.get_exact::<u32>(0x300), 12);
    assert_eq!(bus.cpu.registers[0], 0x340);
}

#[test]
fn ldr_pc_interworks_on_arm9() {
    // ldr pc, [r0]
    let mut bus = with_code9(&[0xE590_F000]);
    bus.ram.set_exact(0x500, 0x0000_0201u32);
    bus.cpu.registers[0] = 0x500;
    run(&mut bus, 1);
    assert!(bus.cpu.is_flag(Flag::Thumb));
    assert_eq!(bus.cpu.pc().0, 0x202);
}

#[test]
fn msr_mrs_roundtrip() {
    // msr cpsr_f, r0; mrs r1, cpsr
    let mut bus = with_code9(&[0xE128_F000, 0xE10F_1000]);
    bus.cpu.registers[0] = 0xF000_0000;
    let control = bus.cpu.cpsr() & 0xFF;
    run(&mut bus, 2);
    // Flag lanes took the new value, control lanes kept the old one
    assert_eq!(bus.cpu.registers[1] >> 28, 0xF);
    assert_eq!(bus.cpu.registers[1] & 0xEF, control & 0xEF);
}

#[test]
fn msr_control_switches_mode() {
    // msr cpsr_c, r0
    let mut bus = with_code9(&[0xE121_F000]);
    bus.cpu.registers[0] = Mode::Irq.to_u32();
    run(&mut bus, 1);
    assert_eq!(bus.cpu.mode(), Mode::Irq);
}

#[test]
fn swi_enters_supervisor() {
    let mut bus = with_code9(&[0xEF00_0000]);
    bus.cpu.set_mode(Mode::System);
    let cpsr = bus.cpu.cpsr();
    run(&mut bus, 1);
    assert_eq!(bus.cpu.mode(), Mode::Supervisor);
    assert!(bus.cpu.is_flag(Flag::IrqDisable));
    assert_eq!(bus.cpu.spsr(), cpsr);
    // SWI vector is 0x08; the pipeline reload leaves PC one fetch ahead
    assert_eq!(bus.cpu.pc().0, 0x0C);
}

#[test]
fn irq_taken_at_instruction_boundary() {
    // Two NOP-ish instructions
    let mut bus = with_code9(&[0xE1A0_0000, 0xE1A0_0000]);
    bus.cpu.set_mode(Mode::System);
    bus.cpu.set_flag(Flag::IrqDisable, false);
    bus.cpu.intr.ime = true;
    bus.cpu.intr.ie = 1 << Interrupt::IpcSync as u16;
    run(&mut bus, 1);

    bus.request_interrupt(Interrupt::IpcSync);
    assert!(bus.cpu.irq_line());
    run(&mut bus, 1);
    assert_eq!(bus.cpu.mode(), Mode::Irq);
    assert!(bus.cpu.is_flag(Flag::IrqDisable));
    // The boundary call serviced the IRQ and then ran the instruction
    // at the vector, so PC is one fetch past it
    assert_eq!(bus.cpu.pc().0, 0x18 + 8);
    // Return address resumes past the first instruction
    assert_eq!(bus.cpu.lr().0, 8);
}

#[test]
fn wfi_hint_halts_until_raise() {
    // msr with an empty field mask encodes hints; type 3 is WFI
    let mut bus = with_code9(&[0xE320_F003]);
    run(&mut bus, 1);
    assert!(bus.cpu.is_halted);
    let time = bus.time;
    run(&mut bus, 1);
    // Halted: nothing fetched, no cycles consumed by the core
    assert_eq!(bus.time, time);

    // Even a masked source ends the wait
    bus.request_interrupt(Interrupt::Timer0);
    assert!(!bus.cpu.is_halted);
}

#[test]
fn thumb_mov_add() {
    // mov r0, #5; add r0, #3
    let mut bus = TestBus9::default();
    bus.ram.set_exact(0, 0x2005u16);
    bus.ram.set_exact(2, 0x3003u16);
    bus.cpu.set_flag(Flag::Thumb, true);
    bus.cpu.registers[15] = 2;
    run(&mut bus, 2);
    assert_eq!(bus.cpu.registers[0], 8);
}

#[test]
fn thumb_push_pop_roundtrip() {
    // push {r0}; pop {r1}
    let mut bus = TestBus9::default();
    bus.ram.set_exact(0, 0xB401u16);
    bus.ram.set_exact(2, 0xBC02u16);
    bus.cpu.set_flag(Flag::Thumb, true);
    bus.cpu.registers[15] = 2;
    bus.cpu.registers[0] = 0xDEAD_BEEF;
    bus.cpu.registers[13] = 0x600;
    run(&mut bus, 2);
    assert_eq!(bus.cpu.registers[1], 0xDEAD_BEEF);
    assert_eq!(bus.cpu.registers[13], 0x600);
}
