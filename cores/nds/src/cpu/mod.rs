// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! CPU implementations.
//! When it comes to timing, the ARM9 runs against the scheduler until the
//! ARM7 is behind, which is then dragged along on its own cycle counter.
//! Effectively, the ARM9 is the one handling the scheduling.

pub mod cp15;
mod nds7;
mod nds9;

pub const NDS9_CLOCK: u32 = 67_027_964;
