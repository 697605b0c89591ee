// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! System-level tests running machine code on the assembled console.

use arm_core::{
    state::{Flag, Mode},
    Address, Cpu, Interrupt,
};
use common::numutil::NumExt;

use crate::Nds;

const CODE9: u32 = 0x0200_0000;

fn with_code9(code: &[u32]) -> Box<Nds> {
    let mut ds = Box::<Nds>::default();
    for (i, op) in code.iter().enumerate() {
        ds.nds9().set(Address(CODE9 + (i as u32) * 4), *op);
    }
    ds.cpu9.registers[15] = CODE9 + 4;
    ds.cpu9.invalidate_pipeline();
    ds
}

fn run9(ds: &mut Nds, count: usize) {
    for _ in 0..count {
        ds.nds9().continue_running();
    }
}

#[test]
fn reset_points_cores_at_their_vectors() {
    let mut ds = Box::<Nds>::default();
    // One fetch ahead of the reset vector on both cores: the ARM9 uses
    // the high vector base, the ARM7 the low one.
    assert_eq!(ds.cpu9.pc().0, 0xFFFF_0004);
    assert_eq!(ds.cpu7.pc().0, 0x0000_0004);

    ds.cpu9.registers[0] = 77;
    ds.reset();
    assert_eq!(ds.cpu9.registers[0], 0);
    assert_eq!(ds.cpu9.pc().0, 0xFFFF_0004);
}

#[test]
fn arithmetic_on_main_ram() {
    // mov r0, #1; mov r1, #2; add r2, r0, r1
    let mut ds = with_code9(&[0xE3A0_0001, 0xE3A0_1002, 0xE080_2001]);
    run9(&mut ds, 3);
    assert_eq!(ds.cpu9.registers[2], 3);
    assert_eq!(ds.cpu9.pc().0, CODE9 + 4 + 12);
}

#[test]
fn misaligned_word_load_rotates() {
    // ldr r0, [r1] with r1 = 0x02000001
    let mut ds = with_code9(&[0xE591_0000]);
    ds.nds9().set::<u32>(Address(0x0200_1000), 0x1122_3344);
    ds.cpu9.registers[1] = 0x0200_1001;
    run9(&mut ds, 1);
    assert_eq!(ds.cpu9.registers[0], 0x1122_3344u32.rotate_right(8));
}

#[test]
fn stm_stores_old_base() {
    // stmia r0!, {r0, r1}
    let mut ds = with_code9(&[0xE8A0_0003]);
    ds.cpu9.registers[0] = 0x0200_1000;
    ds.cpu9.registers[1] = 0x1111_1111;
    run9(&mut ds, 1);
    assert_eq!(ds.nds9().get::<u32>(Address(0x0200_1000)), 0x0200_1000);
    assert_eq!(ds.nds9().get::<u32>(Address(0x0200_1004)), 0x1111_1111);
    assert_eq!(ds.cpu9.registers[0], 0x0200_1008);
}

#[test]
fn ldr_pc_interworks() {
    // ldr pc, [r0]
    let mut ds = with_code9(&[0xE590_F000]);
    ds.nds9().set::<u32>(Address(0x0200_2000), 0x0200_0001);
    ds.cpu9.registers[0] = 0x0200_2000;
    run9(&mut ds, 1);
    assert!(ds.cpu9.is_flag(Flag::Thumb));
    assert_eq!(ds.cpu9.pc().0, 0x0200_0002);
}

#[test]
fn open_bus_reads_last_fetched_opcode() {
    // ldr r0, [r1] from unmapped space; the marker is in the prefetch
    // slot while the load runs
    let mut ds = with_code9(&[0xE591_0000, 0xE1A0_0000, 0xE1A0_C00C]);
    ds.cpu9.registers[1] = 0x0900_0000;
    run9(&mut ds, 1);
    assert_eq!(ds.cpu9.registers[0], 0xE1A0_C00C);
}

#[test]
fn ipc_fifo_and_sync() {
    let mut ds = Box::<Nds>::default();
    // Enable both FIFOs
    ds.nds9().set::<u16>(Address(0x0400_0184), 0x8000);
    ds.nds7().set::<u16>(Address(0x0400_0184), 0x8000);

    // ARM9 -> ARM7 word
    ds.nds9().set::<u32>(Address(0x0400_0188), 0xDEAD_BEEF);
    assert_eq!(ds.nds7().get::<u32>(Address(0x0410_0000)), 0xDEAD_BEEF);

    // ARM9 listens for IPCSYNC, ARM7 pulses it
    ds.nds9().set::<u16>(Address(0x0400_0180), 0x4000);
    ds.nds9()
        .set::<u32>(Address(0x0400_0210), 1 << Interrupt::IpcSync as u16);
    ds.nds9().set::<u32>(Address(0x0400_0208), 1);
    assert!(!ds.cpu9.irq_line());

    ds.nds7().set::<u16>(Address(0x0400_0180), 0x2000);
    assert!(ds.cpu9.irq_line());

    // Acknowledging IF drops the line again
    ds.nds9()
        .set::<u32>(Address(0x0400_0214), 1 << Interrupt::IpcSync as u16);
    assert!(!ds.cpu9.irq_line());
}

#[test]
fn gx_packed_command_executes_in_one_cycle() {
    let mut ds = Box::<Nds>::default();
    ds.cpu7.halt_on_irq();
    ds.cpu9.halt_on_irq();

    // A packed word holding MTX_MODE, then its parameter
    ds.nds9().set::<u32>(Address(0x0400_0400), 0x0000_0010);
    ds.nds9().set::<u32>(Address(0x0400_0400), 0x0000_0002);
    assert_eq!(ds.gx.pipe_contents(), vec![(0x10, 2)]);
    assert!(ds.gx.is_busy());

    ds.step(4);
    assert!(!ds.gx.is_busy());
    assert_eq!(ds.gx.counts(), (0, 0));
}

#[test]
fn gx_command_port_and_status() {
    let mut ds = Box::<Nds>::default();
    ds.cpu7.halt_on_irq();
    ds.cpu9.halt_on_irq();

    // VTX_16 through its port, starved with one of two parameters
    ds.nds9().set::<u32>(Address(0x0400_048C), 0xAAAA);
    ds.step(4);
    assert!(!ds.gx.is_busy());
    assert_eq!(ds.gx.counts(), (1, 0));

    ds.nds9().set::<u32>(Address(0x0400_048C), 0xBBBB);
    ds.step(4);
    assert_eq!(ds.gx.counts(), (0, 0));
}

#[test]
fn gx_empty_irq_is_level_sensitive() {
    let mut ds = Box::<Nds>::default();
    // Select the "FIFO empty" IRQ condition; it holds immediately
    ds.nds9().set::<u32>(Address(0x0400_0600), 2 << 30);
    assert!(ds
        .cpu9
        .intr
        .if_
        .is_bit(Interrupt::GeometryFifo as u16));
}

#[test]
fn wram_banking_switches_owner() {
    let mut ds = Box::<Nds>::default();
    // Give all of shared WRAM to the ARM7
    ds.nds9().set::<u8>(Address(0x0400_0247), 3);
    ds.nds7().set::<u32>(Address(0x0300_0000), 0xCAFE_BABE);
    assert_eq!(ds.nds7().get::<u32>(Address(0x0300_0000)), 0xCAFE_BABE);
    assert_eq!(ds.nds9().get::<u32>(Address(0x0300_0000)), 0);
    assert_eq!(ds.nds7().get::<u8>(Address(0x0400_0241)), 3);
}

#[test]
fn haltcnt_halts_the_arm7() {
    let mut ds = Box::<Nds>::default();
    ds.nds7().set::<u8>(Address(0x0400_0301), 0x80);
    assert!(ds.cpu7.is_halted);
    ds.nds7().request_interrupt(Interrupt::VBlank);
    assert!(!ds.cpu7.is_halted);
}

#[test]
fn step_consumes_the_cycle_budget() {
    let mut ds = Box::<Nds>::default();
    ds.cpu7.halt_on_irq();
    ds.cpu9.halt_on_irq();
    ds.step(500);
    assert!(ds.scheduler.now() >= 500);
    assert_eq!(ds.time_7, ds.scheduler.now());
}

#[test]
fn direct_boot_loads_header_binaries() {
    fn put32(rom: &mut [u8], at: usize, value: u32) {
        rom[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    let mut rom = vec![0u8; 0x1000];
    put32(&mut rom, 0x20, 0x400); // ARM9 binary offset
    put32(&mut rom, 0x24, 0x0200_0000); // entry
    put32(&mut rom, 0x28, 0x0200_0000); // RAM address
    put32(&mut rom, 0x2C, 8); // size
    put32(&mut rom, 0x30, 0x600); // ARM7 binary offset
    put32(&mut rom, 0x34, 0x0380_0000); // entry
    put32(&mut rom, 0x38, 0x0380_0000); // RAM address
    put32(&mut rom, 0x3C, 4); // size
    put32(&mut rom, 0x400, 0xE3A0_0001); // mov r0, #1
    put32(&mut rom, 0x404, 0xEAFF_FFFE); // b .
    put32(&mut rom, 0x600, 0xEAFF_FFFE); // b .

    let mut ds = Box::<Nds>::default();
    ds.load_rom(rom);
    ds.direct_boot();

    assert_eq!(ds.nds9().get::<u32>(Address(0x0200_0000)), 0xE3A0_0001);
    assert_eq!(ds.nds7().get::<u32>(Address(0x0380_0000)), 0xEAFF_FFFE);
    assert_eq!(ds.cpu9.pc().0, 0x0200_0004);
    assert_eq!(ds.cpu7.pc().0, 0x0380_0004);
    assert_eq!(ds.cpu9.mode(), Mode::System);
    assert_eq!(ds.cpu9.sp().0, 0x0300_2F7C);

    run9(&mut ds, 1);
    assert_eq!(ds.cpu9.registers[0], 1);
}

#[test]
#[should_panic]
fn direct_boot_rejects_malformed_rom() {
    let mut ds = Box::<Nds>::default();
    ds.load_rom(vec![0; 0x100]);
    ds.direct_boot();
}
