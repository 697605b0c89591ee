// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! The NDS system: two ARM cores sharing memory, a scheduler, the IPC
//! channel and the geometry command processor. The host drives it
//! through [Nds::step].

mod addr;
mod cpu;
mod graphics;
mod hw;
mod io;
mod memory;
mod scheduling;

use std::{
    mem,
    ops::{Deref, DerefMut},
};

use arm_core::{interface::Bus, state::CpuState, Address, Cpu, Interrupt};
use common::{components::scheduler::Scheduler, Time, TimeS};
pub use cpu::NDS9_CLOCK;
use cpu::cp15::Cp15;
use graphics::CommandProcessor;
use hw::{cartridge::Cartridge, ipc::IpcFifo};
use memory::{Memory, WramStatus};
use scheduling::NdsEvent;

/// Macro for creating a wrapper of the system, specifically with
/// the use case of being able to implement the CPU bus twice,
/// since the NDS has 2 CPUs.
macro_rules! nds_wrapper {
    ($name:ident, $idx:expr) => {
        /// Wrapper for one of the CPUs.
        /// Raw pointer was chosen to avoid lifetimes.
        #[repr(transparent)]
        pub struct $name(*mut Nds);

        impl Deref for $name {
            type Target = Nds;

            #[inline]
            fn deref(&self) -> &Self::Target {
                unsafe { &*self.0 }
            }
        }

        impl DerefMut for $name {
            #[inline]
            fn deref_mut(&mut self) -> &mut Self::Target {
                unsafe { &mut *self.0 }
            }
        }

        impl NdsCpu for $name {
            const I: usize = $idx;
        }

        unsafe impl Send for $name {}
    };
}

nds_wrapper!(Nds7, 0);
nds_wrapper!(Nds9, 1);

#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Nds {
    pub cpu7: CpuState,
    pub cpu9: CpuState,
    cp15: Cp15,
    fifo: IpcFifo,
    gx: CommandProcessor,

    memory: Memory,
    pub cart: Cartridge,

    scheduler: Scheduler<NdsEvent>,
    /// ARM7-side cycle counter, in device cycles. It trails the
    /// scheduler's clock and is caught up after every ARM9 slice.
    time_7: Time,
    running: bool,
}

impl Nds {
    /// Fully re-initialise every component, keeping the loaded boot
    /// images and cartridge.
    pub fn reset(&mut self) {
        let old = mem::take(self);
        self.memory.bios7 = old.memory.bios7;
        self.memory.bios9 = old.memory.bios9;
        self.cart = old.cart;
    }

    /// Advance the system by approximately the given amount of device
    /// cycles. The two CPUs are interleaved at scheduler event
    /// boundaries; the ARM9 may overshoot by the length of its last
    /// instruction.
    pub fn step(&mut self, cycles: u32) {
        self.running = true;
        self.scheduler.schedule(NdsEvent::StepDone, cycles as TimeS);
        while self.running {
            self.advance();
        }
    }

    /// Run an instruction on the ARM9, then keep running the ARM7
    /// until it has caught up. A waiting CPU instead has its clock
    /// skipped forward.
    fn advance(&mut self) {
        if self.cpu9.is_halted {
            let event = self.scheduler.pop();
            event.kind.dispatch(self, event.late_by);
        } else {
            self.nds9().continue_running();
        }

        while self.time_7 < self.scheduler.now() {
            if self.cpu7.is_halted {
                self.time_7 = self.scheduler.now();
                break;
            }
            self.nds7().continue_running();
        }
    }

    pub fn load_boot_rom7(&mut self, image: &[u8; 0x4000]) {
        self.memory.bios7 = image.to_vec().into_boxed_slice();
    }

    pub fn load_boot_rom9(&mut self, image: &[u8; 0x2000]) {
        self.memory.bios9 = image.to_vec().into_boxed_slice();
    }

    pub fn load_rom(&mut self, rom: Vec<u8>) {
        self.cart.load_rom(rom);
    }

    /// Skip the boot ROMs: copy the header-specified binaries into RAM,
    /// point each CPU at its entry, set up the conventional stacks and
    /// the post-firmware CP15 state.
    pub fn direct_boot(&mut self) {
        let header = self.cart.header();
        log::info!(
            "direct boot: ARM9 entry 0x{:08X}, ARM7 entry 0x{:08X}",
            { header.arm9_entry_addr },
            { header.arm7_entry_addr }
        );

        // The header itself is visible in main RAM after boot
        for i in 0..0x200usize {
            let byte = self.cart.rom[i % self.cart.rom.len()];
            self.nds9().set(Address(0x027F_FE00 + i as u32), byte);
        }

        self.cp15.direct_boot();
        {
            let mut ds = self.nds9();
            for i in 0..header.arm9_size {
                let byte = self.cart.rom[(header.arm9_offset + i) as usize];
                ds.set(Address(header.arm9_ram_addr + i), byte);
            }

            ds.cpu().set_cpsr(0x1F);
            ds.cpu().registers[13] = 0x0300_2F7C;
            ds.cpu().sp[2] = 0x0300_2FC0;
            ds.cpu().sp[4] = 0x0300_2F80;
            ds.cpu().registers[14] = header.arm9_entry_addr;
            ds.cpu().registers[15] = header.arm9_entry_addr + 4;
            ds.cpu().invalidate_pipeline();
        }
        {
            let mut ds = self.nds7();
            for i in 0..header.arm7_size {
                let byte = self.cart.rom[(header.arm7_offset + i) as usize];
                ds.set(Address(header.arm7_ram_addr + i), byte);
            }

            ds.cpu().set_cpsr(0x1F);
            ds.cpu().registers[13] = 0x0380_FD80;
            ds.cpu().sp[2] = 0x0380_FFC0;
            ds.cpu().sp[4] = 0x0380_FF80;
            ds.cpu().registers[14] = header.arm7_entry_addr;
            ds.cpu().registers[15] = header.arm7_entry_addr + 4;
            ds.cpu().invalidate_pipeline();
        }

        self.memory.wram_status = WramStatus::All7;
        self.memory.postflg = [1, 1];
        self.memory.bios_inert = true;
    }

    #[inline]
    pub fn nds7(&mut self) -> Nds7 {
        Nds7(self as *mut Nds)
    }

    #[inline]
    pub fn nds9(&mut self) -> Nds9 {
        Nds9(self as *mut Nds)
    }

    fn cpu_state(&self, cpu: usize) -> &CpuState {
        if cpu == 0 {
            &self.cpu7
        } else {
            &self.cpu9
        }
    }

    fn cpu_state_mut(&mut self, cpu: usize) -> &mut CpuState {
        if cpu == 0 {
            &mut self.cpu7
        } else {
            &mut self.cpu9
        }
    }

    /// Raise an interrupt on the given CPU.
    fn send_irq(&mut self, cpu: usize, intr: Interrupt) {
        if cpu == 0 {
            self.nds7().request_interrupt(intr);
        } else {
            self.nds9().request_interrupt(intr);
        }
    }

    fn maybe_irq_to_other(&mut self, me: usize, intr: Option<Interrupt>) {
        if let Some(intr) = intr {
            self.send_irq(me ^ 1, intr);
        }
    }

    // Geometry engine entry points; the command processor itself only
    // knows the scheduler, IRQs are routed here.
    fn gx_fifo_write(&mut self, word: u32) {
        if self.gx.write_fifo(&mut self.scheduler, word) {
            self.send_irq(1, Interrupt::GeometryFifo);
        }
    }

    fn gx_cmd_port_write(&mut self, addr: u32, param: u32) {
        if self.gx.write_cmd_port(&mut self.scheduler, addr, param) {
            self.send_irq(1, Interrupt::GeometryFifo);
        }
    }

    pub(crate) fn gx_execute(&mut self, cmd: u8) {
        if self.gx.execute(&mut self.scheduler, cmd) {
            self.send_irq(1, Interrupt::GeometryFifo);
        }
    }
}

impl Default for Nds {
    fn default() -> Self {
        let mut nds = Self {
            cpu7: CpuState::default(),
            cpu9: CpuState::default(),
            cp15: Cp15::default(),
            fifo: IpcFifo::default(),
            gx: CommandProcessor::default(),
            memory: Memory::default(),
            cart: Cartridge::default(),
            scheduler: Scheduler::default(),
            time_7: 0,
            running: false,
        };

        // The ARM9 resets at the high exception vectors.
        nds.cpu9.registers[15] = 0xFFFF_0004;
        nds
    }
}

/// Trait for things that need to operate on a single CPU.
/// I = 0 for the ARM7, I = 1 for the ARM9; state separated by CPU
/// generally uses [CpuDevice] for easy access with I.
pub trait NdsCpu: Bus + DerefMut<Target = Nds> {
    const I: usize;
}

/// Type for devices that both CPUs have.
pub(crate) type CpuDevice<T> = [T; 2];

#[cfg(test)]
mod tests;
