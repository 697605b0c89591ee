// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Support code shared between the CPU component and the system core:
//! the event scheduler, MMIO register composition helpers and numeric
//! utilities.

pub use components::scheduler::{Time, TimeS};

pub mod components;
pub mod numutil;
