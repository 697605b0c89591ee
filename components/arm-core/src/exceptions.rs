// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

use common::numutil::NumExt;

use crate::{
    interface::{Bus, SysWrapper},
    memory::Address,
    state::{
        CpuState,
        Flag::{FiqDisable, IrqDisable, Thumb},
        Mode,
    },
};

impl CpuState {
    /// The CPU-visible IRQ line: any enabled source latched while the
    /// master enable is set.
    #[inline]
    pub fn irq_line(&self) -> bool {
        self.intr.ime && (self.intr.ie & self.intr.if_) != 0
    }

    /// Whether the CPU will service the line at the next instruction
    /// boundary.
    #[inline]
    pub(crate) fn is_interrupt_pending(&self) -> bool {
        self.irq_line() && !self.is_flag(IrqDisable)
    }

    /// Latch an interrupt request. The line is sampled at the top of the
    /// next instruction; raising also ends any wait-for-IRQ state, even
    /// for masked sources.
    pub fn request_interrupt(&mut self, int: Interrupt) {
        self.request_interrupt_with_index(int as u16);
    }

    /// Latch an interrupt request by index.
    pub fn request_interrupt_with_index(&mut self, idx: u16) {
        self.intr.if_ = self.intr.if_.set_bit(idx, true);
        self.is_halted = false;
    }

    /// Wait for an IRQ to be raised before executing anything else.
    pub fn halt_on_irq(&mut self) {
        self.is_halted = true;
    }
}

impl<S: Bus> SysWrapper<S> {
    /// An exception occurred, jump to the vector and deal with it.
    pub(crate) fn exception_occurred(&mut self, kind: Exception) {
        if self.cpur().is_flag(Thumb) {
            self.cpu().bump_pc(2);
        }

        let cpsr = self.cpur().cpsr();
        self.cpu().set_mode(kind.mode());

        self.cpu().set_flag(Thumb, false);
        self.cpu().set_flag(IrqDisable, true);
        if let Exception::Reset | Exception::Fiq = kind {
            self.cpu().set_flag(FiqDisable, true);
        }

        let lr = self.cpur().pc() - Address(self.cpur().current_instruction_size());
        self.cpu().set_lr(lr);
        self.cpu().set_spsr(cpsr);
        let vector = self.exception_base() + kind.vector();
        self.set_pc(vector);
    }

    /// Take the IRQ that is pending at an instruction boundary.
    pub(crate) fn service_irq(&mut self) {
        self.cpu().bump_pc(4);
        self.exception_occurred(Exception::Irq);
    }
}

/// Interrupt sources, by bit index in IE/IF.
/// Shared between both cores; several sources only exist on one of them.
#[repr(C)]
#[derive(Copy, Clone)]
pub enum Interrupt {
    VBlank,
    HBlank,
    VCounter,
    Timer0,
    Timer1,
    Timer2,
    Timer3,
    Serial,
    Dma0,
    Dma1,
    Dma2,
    Dma3,
    Joypad,
    GamePak,
    Unused1,
    Unused2,
    IpcSync,
    IpcSendFifoEmpty,
    IpcRecvFifoNotEmpty,
    CardTransferComplete,
    CardIreqMc,
    GeometryFifo,
    ScreensOpen,
    SpiBus,
    Wifi,
}

/// Possible exceptions.
/// Listed in vector order; only SWI, UND and IRQ are ever raised here.
#[derive(Debug, Copy, Clone)]
pub enum Exception {
    Reset,
    Undefined,
    Swi,
    PrefetchAbort,
    DataAbort,
    AddressExceeded,
    Irq,
    Fiq,
}

impl Exception {
    /// Vector offset the PC is set to when this exception occurs.
    fn vector(self) -> Address {
        Address(self as u32 * 4)
    }

    /// Mode to execute the exception in.
    fn mode(self) -> Mode {
        const MODE: [Mode; 8] = [
            Mode::Supervisor,
            Mode::Undefined,
            Mode::Supervisor,
            Mode::Abort,
            Mode::Abort,
            Mode::Supervisor,
            Mode::Irq,
            Mode::Fiq,
        ];
        MODE[self as usize]
    }
}

/// Per-core interrupt controller: master enable, enable mask and
/// level-sensitive request latch.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InterruptController {
    pub ime: bool,
    pub ie: u32,
    pub if_: u32,
}
