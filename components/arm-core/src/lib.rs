// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Decoded-dispatch interpreter for the ARM7/ARM9 family cores.
//! It is generic over the system containing it; see `interface.rs`.
//! Dispatch tables are built at compile time, one set per bus.

pub mod arm;
mod alu;
mod exceptions;
pub mod interface;
mod memory;
mod operations;
pub mod state;
pub mod thumb;

use common::numutil::NumExt;
pub use exceptions::{Exception, Interrupt, InterruptController};
use interface::{Bus, RwType, SysWrapper};
pub use memory::{access, Access, Address, RelativeOffset};
use state::Flag::Thumb;
pub use state::{CpuState, LowRegister, Register};

#[cfg(test)]
mod tests;

/// Execution entry points of the interpreter, implemented for every bus.
pub trait Cpu: Bus {
    /// Advance emulation by one instruction, handling due system events
    /// and pending interrupts first. Waiting-for-IRQ cores do nothing;
    /// the system is expected to advance the clock for them instead.
    fn continue_running(&mut self) {
        let mut gg = SysWrapper::of(self);
        gg.continue_running();
    }

    /// Latch an interrupt request for this core.
    fn request_interrupt(&mut self, int: Interrupt) {
        self.cpu().request_interrupt(int);
    }

    /// Latch an interrupt request for this core, by IE/IF bit index.
    fn request_interrupt_with_index(&mut self, idx: u16) {
        self.cpu().request_interrupt_with_index(idx);
    }
}

impl<S: Bus> Cpu for S {}

impl<S: Bus> SysWrapper<S> {
    /// Run one iteration of the interpreter loop.
    pub(crate) fn continue_running(&mut self) {
        self.handle_events();
        if self.cpur().is_halted {
            return;
        }

        // The IRQ line is sampled at instruction boundaries only.
        if self.cpur().is_interrupt_pending() {
            self.service_irq();
        }

        self.ensure_pipeline_valid();
        if self.cpur().is_flag(Thumb) {
            let inst = self.fetch_next_inst::<u16>();
            self.execute_inst_thumb(inst.u16());
        } else {
            let inst = self.fetch_next_inst::<u32>();
            self.execute_inst_arm(inst);
        }
    }

    /// Fetch the next instruction of the CPU, shifting the prefetched
    /// slots and returning the instruction to execute now.
    fn fetch_next_inst<TY: RwType>(&mut self) -> u32 {
        self.cpu().bump_pc(TY::WIDTH);
        let pc = self.cpur().pc();
        let access = self.cpur().access_type | access::CODE;
        let time = self.wait_time::<TY>(pc, access);
        self.tick(time as common::Time);

        let next = self.get::<TY>(pc).u32();
        self.cpu().advance_pipeline(next)
    }

    /// Refill the pipeline without spending cycles; used after a stall
    /// marked it invalid.
    fn ensure_pipeline_valid(&mut self) {
        if self.cpur().pipeline_valid() {
            return;
        }
        let pc = self.cpur().pc();
        let pipeline = if self.cpur().is_flag(Thumb) {
            [
                self.get::<u16>(pc - Address::HW).u32(),
                self.get::<u16>(pc).u32(),
            ]
        } else {
            [self.get::<u32>(pc - Address::WORD), self.get::<u32>(pc)]
        };
        self.cpu().fill_pipeline(pipeline);
    }
}
