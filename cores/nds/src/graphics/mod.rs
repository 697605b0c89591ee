// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

use modular_bitfield::{bitfield, specifiers::*, BitfieldSpecifier};

mod commands;

pub use commands::CommandProcessor;

#[bitfield]
#[repr(u32)]
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct GxStat {
    pub test_busy: bool,
    pub box_test_result: bool,
    #[skip]
    __: B6,
    pub matrix_stack_level: B5,
    pub matrix_stack_busy: bool,
    pub matrix_stack_error: bool,
    #[skip]
    __: B1,
    pub fifo_size: B9,
    pub fifo_less_than_half: bool,
    pub fifo_empty: bool,
    pub busy: bool,
    #[skip]
    __: B2,
    pub fifo_irq: FifoIrqMode,
}

#[derive(BitfieldSpecifier, Debug, Copy, Clone, PartialEq)]
#[bits = 2]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FifoIrqMode {
    Never = 0,
    LessThanHalfFull = 1,
    Empty = 2,
    Reserved = 3,
}
