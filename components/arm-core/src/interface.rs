// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::ops::{Deref, DerefMut};

use common::{numutil::NumExt, Time};

use crate::{
    arm::{self, ArmLut},
    memory::{Access, Address},
    state::CpuState,
    thumb::{self, ThumbLut},
};

/// Trait for a system that contains this CPU.
/// It is implemented once per core on a system with multiple processors.
pub trait Bus: Sized + 'static {
    /// CPU model to emulate for this bus.
    type Version: CpuVersion<Self>;

    /// Get the CPU state.
    fn cpur(&self) -> &CpuState;
    /// Get the CPU state.
    fn cpu(&mut self) -> &mut CpuState;

    /// Increment the device clock by the given amount of cycles.
    fn tick(&mut self, cycles: Time);
    /// Handle any events that have become due on the system.
    /// Called between instructions; events may raise interrupts.
    fn handle_events(&mut self);

    /// Base address of the exception vectors.
    /// The ARM9 moves this with the CP15 V bit.
    fn exception_base(&self) -> Address {
        Address(0)
    }

    /// Get the value at the given memory address.
    fn get<T: RwType>(&mut self, addr: Address) -> T;
    /// Set the value at the given memory address.
    fn set<T: RwType>(&mut self, addr: Address, value: T);
    /// Get the access time in cycles for the given memory address.
    fn wait_time<T: RwType>(&mut self, addr: Address, access: Access) -> u16;

    /// Callback for getting a CP15 register.
    /// The system provides the CP15 implementation; only called
    /// when the model is ARMv5+.
    fn get_cp15(&self, _opc: u32, _cn: u32, _cm: u32, _cp: u32) -> u32 {
        panic!("CP15 unsupported on this CPU")
    }
    /// Callback for setting a CP15 register.
    fn set_cp15(&mut self, _opc: u32, _cn: u32, _cm: u32, _cp: u32, _value: u32) {
        panic!("CP15 unsupported on this CPU")
    }
}

/// Trait for a CPU model to implement.
pub trait CpuVersion<S: Bus>: 'static {
    /// If this model exhibits ARMv5 behavior.
    const IS_V5: bool;
    /// The model tag, for model-split edge cases and diagnostics.
    const MODEL: Model;

    /// LUT for ARM instructions.
    const ARM_LUT: ArmLut<S> = arm::make_lut::<S>();
    /// LUT for THUMB instructions.
    const THUMB_LUT: ThumbLut<S> = thumb::make_lut::<S>();
}

/// The CPU models this interpreter knows.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Model {
    Arm7,
    Arm9,
    Arm11,
}

pub struct Arm7Tdmi;

impl<S: Bus> CpuVersion<S> for Arm7Tdmi {
    const IS_V5: bool = false;
    const MODEL: Model = Model::Arm7;
}

pub struct Arm946Es;

impl<S: Bus> CpuVersion<S> for Arm946Es {
    const IS_V5: bool = true;
    const MODEL: Model = Model::Arm9;
}

pub struct Arm11MpCore;

impl<S: Bus> CpuVersion<S> for Arm11MpCore {
    const IS_V5: bool = true;
    const MODEL: Model = Model::Arm11;
}

/// Wrapper around the system used by the instruction handlers.
/// The raw pointer sidesteps lifetime issues when handlers re-enter
/// the system, the same way the facade's per-CPU views do.
#[repr(transparent)]
pub struct SysWrapper<S: Bus> {
    pub inner: *mut S,
}

impl<S: Bus> SysWrapper<S> {
    pub fn of(inner: &mut S) -> Self {
        Self { inner }
    }
}

impl<S: Bus> Deref for SysWrapper<S> {
    type Target = S;

    #[inline]
    fn deref(&self) -> &Self::Target {
        unsafe { &*self.inner }
    }
}

impl<S: Bus> DerefMut for SysWrapper<S> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.inner }
    }
}

/// Trait for a type that the CPU can read/write memory with.
/// On this ARM CPU, it is u8, u16, u32.
pub trait RwType: NumExt + 'static {
    type ReadOutput: RwType;
}

impl RwType for u8 {
    type ReadOutput = Self;
}

impl RwType for u16 {
    /// u16 outputs u32: On unaligned reads, the CPU
    /// shifts the result, therefore making it 32bit.
    type ReadOutput = u32;
}

impl RwType for u32 {
    type ReadOutput = Self;
}
