// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! MMIO register offsets inside the 0x0400_0000 window.

// IPC
pub const IPCSYNC: u32 = 0x180;
pub const IPCFIFOCNT: u32 = 0x184;
pub const IPCFIFOSEND: u32 = 0x188;
pub const IPCFIFORECV: u32 = 0x10_0000;

// Interrupt control
pub const IME: u32 = 0x208;
pub const IE: u32 = 0x210;
pub const IF: u32 = 0x214;

// Memory control
pub const WRAMSTAT: u32 = 0x241;
pub const WRAMCNT: u32 = 0x247;

// Geometry engine
pub const GXFIFO: u32 = 0x400;
pub const GXFIFO_END: u32 = 0x43C;
pub const GXCMDPORT: u32 = 0x440;
pub const GXCMDPORT_END: u32 = 0x5FC;
pub const GXSTAT: u32 = 0x600;

// Boot state
pub const POSTFLG: u32 = 0x300;
pub const HALTCNT: u32 = 0x301;
