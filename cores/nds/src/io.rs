// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! MMIO register dispatch for both CPUs. Registers shared between the
//! cores live in the `Nds` impl; per-CPU registers are declared on the
//! respective bus view. Byte-lane composition goes through the helpers
//! in `common`; side effects receive the masked section of the write.

use std::mem;

use arm_core::{interface::RwType, Interrupt};
use common::{
    components::io::{get_mmio_apply, section, set_mmio_apply, FAILED_READ, FAILED_WRITE},
    io08, io16, io32, iow08, iow16, iow32,
    numutil::NumExt,
};

use crate::{addr::*, memory::WramStatus, Nds, Nds7, Nds9, NdsCpu};

impl Nds {
    pub(crate) fn get_mmio_shared<DS: NdsCpu>(&mut self, a: u32) -> (u32, u32, u32) {
        // IPC
        io16!(a, IPCSYNC, self.fifo.sync_read(DS::I));
        io16!(a, IPCFIFOCNT, self.fifo.cnt_read(DS::I));
        io32!(a, IPCFIFORECV, {
            let (value, intr) = self.fifo.receive(DS::I);
            self.maybe_irq_to_other(DS::I, intr);
            value
        });

        // Interrupt control
        io32!(a, IME, self.cpu_state(DS::I).intr.ime as u32);
        io32!(a, IE, self.cpu_state(DS::I).intr.ie);
        io32!(a, IF, self.cpu_state(DS::I).intr.if_);

        // Misc
        io08!(a, POSTFLG, self.memory.postflg[DS::I]);

        log::debug!("CPU{}: read from unknown IO register 0x{a:X}", DS::I);
        FAILED_READ
    }

    pub(crate) fn set_mmio_shared<DS: NdsCpu>(&mut self, a: u32, v: u32, m: u32) -> (u32, u32) {
        let s8 = section::<u8>(a, v, m);
        let s16 = section::<u16>(a, v, m);
        let s32 = section::<u32>(a, v, m);

        // IPC
        iow16!(a, IPCSYNC, {
            if self.fifo.sync_write(DS::I, s16) {
                self.send_irq(DS::I ^ 1, Interrupt::IpcSync);
            }
        });
        iow16!(a, IPCFIFOCNT, self.fifo.cnt_write(DS::I, s16));
        iow32!(a, IPCFIFOSEND, {
            let intr = self.fifo.send(DS::I, s32.with(0));
            self.maybe_irq_to_other(DS::I, intr);
        });

        // Interrupt control
        iow32!(a, IME, {
            let ime = s32.with(self.cpu_state(DS::I).intr.ime as u32);
            self.cpu_state_mut(DS::I).intr.ime = ime.is_bit(0);
        });
        iow32!(a, IE, s32.apply(&mut self.cpu_state_mut(DS::I).intr.ie));
        // Acknowledge is write-1-to-clear
        iow32!(a, IF, self.cpu_state_mut(DS::I).intr.if_ &= !s32.raw());

        // Misc
        iow08!(a, POSTFLG, self.memory.postflg[DS::I] |= s8.raw() & 1);

        log::debug!(
            "CPU{}: write to unknown IO register 0x{a:X} (value 0x{v:X})",
            DS::I
        );
        FAILED_WRITE
    }
}

impl Nds7 {
    pub(crate) fn get_mmio<T: RwType>(&mut self, addr: u32) -> T {
        get_mmio_apply(addr, |a| {
            io08!(a, WRAMSTAT, self.memory.wram_status as u8);
            self.get_mmio_shared::<Self>(a)
        })
    }

    pub(crate) fn set_mmio<T: RwType>(&mut self, addr: u32, value: T) {
        set_mmio_apply(addr, value, |a, v, m| {
            let s8 = section::<u8>(a, v, m);

            iow08!(a, HALTCNT, {
                if s8.raw() >> 6 == 2 {
                    self.cpu7.halt_on_irq();
                }
            });

            self.set_mmio_shared::<Self>(a, v, m)
        })
    }
}

impl Nds9 {
    pub(crate) fn get_mmio<T: RwType>(&mut self, addr: u32) -> T {
        get_mmio_apply(addr, |a| {
            // Geometry engine
            io32!(a, GXSTAT, self.gx.status_read());

            // Memory control
            io08!(a, WRAMCNT, self.memory.wram_status as u8);

            self.get_mmio_shared::<Self>(a)
        })
    }

    pub(crate) fn set_mmio<T: RwType>(&mut self, addr: u32, value: T) {
        set_mmio_apply(addr, value, |a, v, m| {
            let s8 = section::<u8>(a, v, m);
            let s32 = section::<u32>(a, v, m);

            // Geometry engine: the FIFO window and the command ports take
            // whole words
            if matches!(a & !3, GXFIFO..=GXFIFO_END) {
                Nds::gx_fifo_write(self, s32.with(0));
                return (a & 3, 4);
            }
            if matches!(a & !3, GXCMDPORT..=GXCMDPORT_END) {
                Nds::gx_cmd_port_write(self, a & !3, s32.with(0));
                return (a & 3, 4);
            }
            iow32!(a, GXSTAT, {
                if self.gx.status_write(s32) {
                    self.send_irq(1, Interrupt::GeometryFifo);
                }
            });

            // Memory control
            iow08!(a, WRAMCNT, {
                self.memory.wram_status = unsafe { mem::transmute(s8.raw() & 3) };
            });

            self.set_mmio_shared::<Self>(a, v, m)
        })
    }
}
