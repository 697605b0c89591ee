// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

use arm_core::{
    interface::{Arm7Tdmi, Bus, RwType},
    state::CpuState,
    Access, Address,
};
use common::Time;

use crate::Nds7;

impl Bus for Nds7 {
    type Version = Arm7Tdmi;

    fn cpur(&self) -> &CpuState {
        &self.cpu7
    }

    fn cpu(&mut self) -> &mut CpuState {
        &mut self.cpu7
    }

    fn tick(&mut self, cycles: Time) {
        // The ARM7 runs at half the device clock rate.
        self.time_7 += cycles << 1;
    }

    fn handle_events(&mut self) {
        // The ARM9 drives the scheduler; this core is dragged behind it.
    }

    fn get<T: RwType>(&mut self, addr: Address) -> T {
        Nds7::get(self, addr)
    }

    fn set<T: RwType>(&mut self, addr: Address, value: T) {
        Nds7::set(self, addr, value)
    }

    fn wait_time<T: RwType>(&mut self, _addr: Address, _access: Access) -> u16 {
        1
    }
}
