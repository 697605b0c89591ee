// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Inter-processor communication: the SYNC handshake nibbles and the two
//! 16-entry command FIFOs. Each CPU's view is symmetric; `cpu[i].fifo` is
//! what CPU `i` receives, so CPU `i` sends into `cpu[i ^ 1].fifo`.

use std::collections::VecDeque;

use arm_core::Interrupt;
use common::components::io::IoSection;
use modular_bitfield::{bitfield, specifiers::*};

use crate::CpuDevice;

#[bitfield]
#[repr(u16)]
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SyncRegister {
    data_in: B4,
    #[skip]
    __: B4,
    data_out: B4,
    #[skip]
    __: B1,
    send_irq: bool,
    irq_en: bool,
    #[skip]
    __: B1,
}

#[bitfield]
#[repr(u16)]
#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ControlRegister {
    send_fifo_empty: bool,
    send_fifo_full: bool,
    send_fifo_empty_irq: bool,
    send_fifo_clear: bool,
    #[skip]
    __: B4,
    recv_fifo_empty: bool,
    recv_fifo_full: bool,
    recv_fifo_not_empty_irq: bool,
    #[skip]
    __: B3,
    error: bool,
    enable: bool,
}

#[derive(Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct FifoIrqs {
    sync: bool,
    send_empty: bool,
    recv_not_empty: bool,
}

#[derive(Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpuFifo {
    irqs: FifoIrqs,
    enabled: bool,
    error: bool,
    fifo: VecDeque<u32>,
    last: u32,
    sync_out: u8,
}

#[derive(Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct IpcFifo {
    cpu: CpuDevice<CpuFifo>,
}

impl IpcFifo {
    /// CPU `i` pushes a word to its peer. Returns the interrupt to raise
    /// on the peer, if any.
    pub fn send(&mut self, i: usize, value: u32) -> Option<Interrupt> {
        if !self.cpu[i].enabled {
            return None;
        }

        let peer = &mut self.cpu[i ^ 1];
        if peer.fifo.len() < 16 {
            peer.fifo.push_back(value);
            let raise = peer.irqs.recv_not_empty && peer.fifo.len() == 1;
            raise.then_some(Interrupt::IpcRecvFifoNotEmpty)
        } else {
            // Overflow latches the error bit, the word is lost.
            self.cpu[i].error = true;
            None
        }
    }

    /// CPU `i` reads its receive FIFO. Returns the read word and the
    /// interrupt to raise on the peer, if any.
    pub fn receive(&mut self, i: usize) -> (u32, Option<Interrupt>) {
        let peer_send_empty_irq = self.cpu[i ^ 1].irqs.send_empty;
        let local = &mut self.cpu[i];
        match local.fifo.front().copied() {
            Some(value) if local.enabled => {
                local.fifo.pop_front();
                local.last = value;
                let raise = local.fifo.is_empty() && peer_send_empty_irq;
                log::debug!("IPC: CPU{i} read 0x{value:08X} from its FIFO");
                (value, raise.then_some(Interrupt::IpcSendFifoEmpty))
            }
            Some(value) => (value, None),
            None => {
                // Underflow latches the error bit and replays the last
                // successfully read word.
                local.error = true;
                (local.last, None)
            }
        }
    }

    pub fn sync_read(&self, i: usize) -> u16 {
        let local = &self.cpu[i];
        let remote = &self.cpu[i ^ 1];
        SyncRegister::new()
            .with_data_in(remote.sync_out)
            .with_data_out(local.sync_out)
            .with_irq_en(local.irqs.sync)
            .into()
    }

    pub fn cnt_read(&self, i: usize) -> u16 {
        let local = &self.cpu[i];
        let remote = &self.cpu[i ^ 1];
        ControlRegister::new()
            .with_send_fifo_empty(remote.fifo.is_empty())
            .with_send_fifo_full(remote.fifo.len() == 16)
            .with_send_fifo_empty_irq(local.irqs.send_empty)
            .with_recv_fifo_empty(local.fifo.is_empty())
            .with_recv_fifo_full(local.fifo.len() == 16)
            .with_recv_fifo_not_empty_irq(local.irqs.recv_not_empty)
            .with_error(local.error)
            .with_enable(local.enabled)
            .into()
    }

    /// Returns true if the peer's IPCSYNC interrupt should be raised.
    pub fn sync_write(&mut self, i: usize, value: IoSection<u16>) -> bool {
        let new = SyncRegister::from(value.with(self.sync_read(i)));
        self.cpu[i].sync_out = new.data_out();
        self.cpu[i].irqs.sync = new.irq_en();

        // The IRQ bit is a pulse: only a lane actually driven this
        // access can trigger it, and only with the peer listening.
        SyncRegister::from(value.raw()).send_irq() && self.cpu[i ^ 1].irqs.sync
    }

    pub fn cnt_write(&mut self, i: usize, value: IoSection<u16>) {
        let new = ControlRegister::from(value.with(self.cnt_read(i)));
        let written = ControlRegister::from(value.raw());

        let local = &mut self.cpu[i];
        local.irqs.send_empty = new.send_fifo_empty_irq();
        local.irqs.recv_not_empty = new.recv_fifo_not_empty_irq();
        local.error &= !written.error();
        local.enabled = new.enable();

        if written.send_fifo_clear() {
            let peer = &mut self.cpu[i ^ 1];
            peer.fifo.clear();
            peer.last = 0;
        }
    }
}

#[cfg(test)]
mod test {
    use common::components::io::section;

    use super::*;

    fn enabled() -> IpcFifo {
        let mut ipc = IpcFifo::default();
        ipc.cnt_write(0, section::<u16>(0, 0x8000, 0xFFFF));
        ipc.cnt_write(1, section::<u16>(0, 0x8000, 0xFFFF));
        ipc
    }

    #[test]
    fn fifo_roundtrip() {
        let mut ipc = enabled();
        assert!(ipc.send(1, 0xDEAD_BEEF).is_none());
        let (value, _) = ipc.receive(0);
        assert_eq!(value, 0xDEAD_BEEF);
    }

    #[test]
    fn overflow_latches_error_and_drops() {
        let mut ipc = enabled();
        for i in 0..16 {
            ipc.send(0, i);
        }
        ipc.send(0, 0x1234);
        assert!(ControlRegister::from(ipc.cnt_read(0)).error());
        // 16 entries survive, the overflowing one is gone
        for i in 0..16 {
            assert_eq!(ipc.receive(1).0, i);
        }
    }

    #[test]
    fn underflow_latches_error_and_replays_last() {
        let mut ipc = enabled();
        ipc.send(1, 77);
        assert_eq!(ipc.receive(0).0, 77);
        assert_eq!(ipc.receive(0).0, 77);
        assert!(ControlRegister::from(ipc.cnt_read(0)).error());

        // The error bit is write-1-to-clear
        ipc.cnt_write(0, section::<u16>(0, 0xC000, 0xFFFF));
        assert!(!ControlRegister::from(ipc.cnt_read(0)).error());
    }

    #[test]
    fn recv_irq_on_first_entry_only() {
        let mut ipc = enabled();
        ipc.cnt_write(1, section::<u16>(0, 0x8400, 0xFFFF));
        assert!(matches!(
            ipc.send(0, 1),
            Some(Interrupt::IpcRecvFifoNotEmpty)
        ));
        assert!(ipc.send(0, 2).is_none());
    }

    #[test]
    fn sync_nibble_and_irq() {
        let mut ipc = enabled();
        // CPU1 enables its sync IRQ
        ipc.sync_write(1, section::<u16>(0, 0x4000, 0xFFFF));
        // CPU0 writes its nibble and pulses the IRQ bit
        let raise = ipc.sync_write(0, section::<u16>(0, 0x2B00, 0xFFFF));
        assert!(raise);
        assert_eq!(SyncRegister::from(ipc.sync_read(1)).data_in(), 0xB);
        // Writing only the low byte cannot pulse
        let raise = ipc.sync_write(0, section::<u16>(0, 0x0000, 0x00FF));
        assert!(!raise);
    }
}
