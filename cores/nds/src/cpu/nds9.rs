// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

use arm_core::{
    interface::{Arm946Es, Bus, RwType},
    state::CpuState,
    Access, Address,
};
use common::{numutil::NumExt, Time};

use crate::Nds9;

impl Bus for Nds9 {
    type Version = Arm946Es;

    fn cpur(&self) -> &CpuState {
        &self.cpu9
    }

    fn cpu(&mut self) -> &mut CpuState {
        &mut self.cpu9
    }

    fn tick(&mut self, cycles: Time) {
        self.scheduler.advance(cycles);
    }

    fn handle_events(&mut self) {
        while let Some(event) = self.scheduler.get_next_pending() {
            event.kind.dispatch(self, event.late_by);
        }
    }

    fn exception_base(&self) -> Address {
        Address(self.cp15.exception_base())
    }

    fn get<T: RwType>(&mut self, addr: Address) -> T {
        Nds9::get(self, addr)
    }

    fn set<T: RwType>(&mut self, addr: Address, value: T) {
        Nds9::set(self, addr, value)
    }

    fn wait_time<T: RwType>(&mut self, _addr: Address, _access: Access) -> u16 {
        1
    }

    fn get_cp15(&self, _opc: u32, cn: u32, cm: u32, cp: u32) -> u32 {
        match (cn, cm, cp) {
            // ID registers
            (0, 0, 0 | 3..=7) => 0x4105_9461,
            (0, 0, 1) => 0x0F0D_2112,
            (0, 0, 2) => 0x0014_0180,

            (1, 0, 0) => self.cp15.control.into(),

            // Protection unit
            (2, 0, 0 | 1) => self.cp15.cache_bits[cp.us()].u32(),
            (3, 0, 0) => self.cp15.data_bufferable_bits.u32(),
            (5, 0, 0 | 1) => self.cp15.access_protection_bits[cp.us()].u32(),
            (5, 0, 2 | 3) => self.cp15.access_protection_bits_ext[cp.us() - 2],
            (6, _, 0 | 1) => self.cp15.protection_unit_regions[cp.us()][cm.us()],

            // Cache and TCM
            (9, 0, 0 | 1) => self.cp15.cache_lockdown[cp.us()],
            (9, 1, 0 | 1) => self.cp15.tcm_control[cp.us()].into(),

            (13, 0 | 1, 1) => self.cp15.trace_process_id,

            _ => 0,
        }
    }

    fn set_cp15(&mut self, _opc: u32, cn: u32, cm: u32, cp: u32, value: u32) {
        match (cn, cm, cp) {
            (0, 0, _) => (),

            (1, 0, 0) => self.cp15.control_update(value),

            // Protection unit
            (2, 0, 0 | 1) => self.cp15.cache_bits[cp.us()] = value.u8(),
            (3, 0, 0) => self.cp15.data_bufferable_bits = value.u8(),
            (5, 0, 0 | 1) => self.cp15.access_protection_bits[cp.us()] = value.u16(),
            (5, 0, 2 | 3) => self.cp15.access_protection_bits_ext[cp.us() - 2] = value,
            (6, _, 0 | 1) => self.cp15.protection_unit_regions[cp.us()][cm.us()] = value,

            // Wait for interrupt
            (7, 0, 4) => self.cpu9.halt_on_irq(),

            // Cache and TCM
            (9, 0, 0 | 1) => self.cp15.cache_lockdown[cp.us()] = value,
            (9, 1, 0) => {
                self.cp15.tcm_control[0] = value.into();
                self.cp15.dtcm_map_update();
            }
            (9, 1, 1) => {
                self.cp15.tcm_control[1] = value.into();
                self.cp15.itcm_map_update();
            }

            (13, 0 | 1, 1) => self.cp15.trace_process_id = value,

            _ => log::debug!("CP15: write to unhandled register C{cn},C{cm},{cp}"),
        }
    }
}
