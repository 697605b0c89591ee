// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

use common::{components::scheduler::Kind, TimeS};
use NdsEvent::*;

use crate::Nds;

#[derive(Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum NdsEvent {
    /// The current `step` call has used up its cycle budget.
    StepDone,
    /// The geometry engine finishes a command.
    GxCommand { cmd: u8 },
}

impl NdsEvent {
    pub fn dispatch(self, ds: &mut Nds, _late_by: TimeS) {
        match self {
            StepDone => ds.running = false,
            GxCommand { cmd } => ds.gx_execute(cmd),
        }
    }
}

impl Kind for NdsEvent {}

impl Default for NdsEvent {
    fn default() -> Self {
        Self::StepDone
    }
}
