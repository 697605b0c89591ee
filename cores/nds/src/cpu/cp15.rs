// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Inner implementation of CP15 for the ARMv5.
//! Note that the MRC/MCR register file itself lives in `nds9.rs`, as part
//! of the bus interface.

use std::ops::Range;

use modular_bitfield::{bitfield, specifiers::*};

#[bitfield]
#[repr(u32)]
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Control {
    pub pu_enable: bool,
    #[skip]
    __: B1,
    pub data_cache_enable: bool,
    #[skip]
    __: B4,
    pub big_endian: bool,
    #[skip]
    __: B4,

    pub inst_cache_enable: bool,
    pub exception_vectors_high: bool,
    pub cache_replacement: bool,
    pub pre_armv5: bool,

    pub dtcm_enable: bool,
    pub dtcm_load_mode: bool,
    pub itcm_enable: bool,
    pub itcm_load_mode: bool,

    #[skip]
    __: B12,
}

#[bitfield]
#[repr(u32)]
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TcmControl {
    #[skip]
    __: B1,
    pub virtual_size: B5,
    #[skip]
    __: B6,
    pub region_base: B20,
}

/// Load mode makes a TCM write-only while its contents stream in.
#[derive(Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TcmState {
    None,
    Wo,
    Rw,
}

#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Cp15 {
    pub(crate) control: Control,
    pub(crate) cache_bits: [u8; 2],
    pub(crate) data_bufferable_bits: u8,

    pub(crate) access_protection_bits: [u16; 2],
    pub(crate) access_protection_bits_ext: [u32; 2],
    pub(crate) protection_unit_regions: [[u32; 8]; 2],

    pub(crate) cache_lockdown: [u32; 2],
    pub(crate) tcm_control: [TcmControl; 2],
    pub(crate) trace_process_id: u32,

    pub(crate) tcm_state: [TcmState; 2],
    pub(crate) tcm_range: [Range<u32>; 2],
}

impl Cp15 {
    pub fn dtcm_map_update(&mut self) {
        let base = self.tcm_control[0].region_base() << 12;
        let size = 512u32 << self.tcm_control[0].virtual_size();
        self.tcm_range[0] = base..base.wrapping_add(size);
        self.tcm_state[0] = if self.control.dtcm_enable() {
            if self.control.dtcm_load_mode() {
                TcmState::Wo
            } else {
                TcmState::Rw
            }
        } else {
            TcmState::None
        };
    }

    pub fn itcm_map_update(&mut self) {
        // ITCM is always mapped from 0, only the mirror size moves.
        let size = 512u32 << self.tcm_control[1].virtual_size();
        self.tcm_range[1] = 0..size;
        self.tcm_state[1] = if self.control.itcm_enable() {
            if self.control.itcm_load_mode() {
                TcmState::Wo
            } else {
                TcmState::Rw
            }
        } else {
            TcmState::None
        };
    }

    pub fn control_update(&mut self, ctrl: u32) {
        self.control = ctrl.into();
        self.dtcm_map_update();
        self.itcm_map_update();
    }

    /// Exception vector base selected by the V bit.
    pub fn exception_base(&self) -> u32 {
        if self.control.exception_vectors_high() {
            0xFFFF_0000
        } else {
            0x0000_0000
        }
    }

    /// Register state the firmware leaves behind: PU on, caches on, high
    /// vectors, DTCM at the start of shared WRAM, ITCM mirrored over the
    /// first 32 MB.
    pub fn direct_boot(&mut self) {
        self.tcm_control[0] = TcmControl::new()
            .with_region_base(0x0300_0000 >> 12)
            .with_virtual_size(5);
        self.tcm_control[1] = TcmControl::new().with_virtual_size(16);
        self.control_update(0x0005_707D);
    }
}

impl Default for Cp15 {
    fn default() -> Self {
        let mut cp15 = Self {
            control: Control::new()
                .with_exception_vectors_high(true)
                .with_dtcm_enable(true)
                .with_itcm_enable(true),
            cache_bits: [0; 2],
            data_bufferable_bits: 0,
            access_protection_bits: [0; 2],
            access_protection_bits_ext: [0; 2],
            protection_unit_regions: [[0; 8]; 2],
            cache_lockdown: [0; 2],
            tcm_control: [
                TcmControl::new().with_region_base(0x27C0).with_virtual_size(5),
                TcmControl::new().with_virtual_size(16),
            ],
            trace_process_id: 0,

            tcm_state: [TcmState::Rw, TcmState::Rw],
            tcm_range: [0..0, 0..0],
        };
        cp15.dtcm_map_update();
        cp15.itcm_map_update();
        cp15
    }
}
