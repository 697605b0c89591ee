// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

//! The geometry command processor. Writes to GXFIFO carry packed words of
//! up to four opcodes followed by their parameter words; the command
//! ports carry a single parameter for the opcode encoded in the address.
//! Unpacked `(opcode, parameter)` entries flow through a 4-entry pipe fed
//! from a 256-entry FIFO, and execution takes one device cycle per
//! command on the shared scheduler.

use std::collections::VecDeque;

use arrayvec::ArrayVec;
use common::{components::io::IoSection, components::scheduler::Scheduler, numutil::NumExt};

use super::{FifoIrqMode, GxStat};
use crate::scheduling::NdsEvent;

/// Parameter word count per command.
const PARAM_COUNT: [u8; 256] = {
    let mut count = [0; 256];
    // Matrix engine
    count[0x10] = 1; // MTX_MODE
    count[0x12] = 1; // MTX_POP
    count[0x13] = 1; // MTX_STORE
    count[0x14] = 1; // MTX_RESTORE
    count[0x16] = 16; // MTX_LOAD_4x4
    count[0x17] = 12; // MTX_LOAD_4x3
    count[0x18] = 16; // MTX_MULT_4x4
    count[0x19] = 12; // MTX_MULT_4x3
    count[0x1A] = 9; // MTX_MULT_3x3
    count[0x1B] = 3; // MTX_SCALE
    count[0x1C] = 3; // MTX_TRANS
    // Vertex and polygon attributes
    count[0x20] = 1; // COLOR
    count[0x21] = 1; // NORMAL
    count[0x22] = 1; // TEXCOORD
    count[0x23] = 2; // VTX_16
    count[0x24] = 1; // VTX_10
    count[0x25] = 1; // VTX_XY
    count[0x26] = 1; // VTX_XZ
    count[0x27] = 1; // VTX_YZ
    count[0x28] = 1; // VTX_DIFF
    count[0x29] = 1; // POLYGON_ATTR
    count[0x2A] = 1; // TEXIMAGE_PARAM
    count[0x2B] = 1; // PLTT_BASE
    // Material and lighting
    count[0x30] = 1; // DIF_AMB
    count[0x31] = 1; // SPE_EMI
    count[0x32] = 1; // LIGHT_VECTOR
    count[0x33] = 1; // LIGHT_COLOR
    count[0x34] = 32; // SHININESS
    // Vertex lists
    count[0x40] = 1; // BEGIN_VTXS
    // Swap buffers and viewport
    count[0x50] = 1; // SWAP_BUFFERS
    count[0x60] = 1; // VIEWPORT
    // Tests
    count[0x70] = 3; // BOX_TEST
    count[0x71] = 2; // POS_TEST
    count[0x72] = 1; // VEC_TEST
    count
};

#[derive(Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct Unpack {
    /// The packed-opcode word currently being consumed.
    word: u32,
    /// Commands remaining in `word`, 0..=4.
    cmds_left: u8,
    /// Parameter words still expected for the current command.
    params_left: u8,
}

#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CommandProcessor {
    status: GxStat,
    unpack: Unpack,
    /// Execution source, up to 4 entries.
    pipe: ArrayVec<u64, 4>,
    /// Backlog, up to 256 entries.
    fifo: VecDeque<u64>,
}

impl Default for CommandProcessor {
    fn default() -> Self {
        Self {
            status: GxStat::new()
                .with_fifo_empty(true)
                .with_fifo_less_than_half(true),
            unpack: Unpack::default(),
            pipe: ArrayVec::new(),
            fifo: VecDeque::with_capacity(256),
        }
    }
}

impl CommandProcessor {
    pub fn status_read(&self) -> u32 {
        self.status.into()
    }

    /// Write GXSTAT: the IRQ mode bits move, bit 15 acknowledges a matrix
    /// stack error. Returns whether the (level-sensitive) FIFO IRQ
    /// condition holds afterwards.
    pub fn status_write(&mut self, value: IoSection<u32>) -> bool {
        if value.raw().is_bit(15) {
            self.status.set_matrix_stack_error(false);
        }
        self.status = value.mask(0xC000_0000).with(self.status.into()).into();
        self.fifo_irq_condition()
    }

    /// A word written to the GXFIFO window: either a parameter for the
    /// command being unpacked, or a fresh packed-opcode word.
    pub fn write_fifo(&mut self, sched: &mut Scheduler<NdsEvent>, word: u32) -> bool {
        if self.unpack.params_left > 0 {
            let irq = self.enqueue(sched, self.unpack.word.u8(), word);
            self.unpack.params_left -= 1;
            if self.unpack.params_left == 0 {
                self.unpack.word >>= 8;
                self.unpack.cmds_left -= 1;
            }
            return irq;
        }

        if self.unpack.cmds_left == 0 {
            self.unpack.cmds_left = 4;
            self.unpack.word = word;
        }

        // Emit parameterless commands until one expects parameters, the
        // packed word runs out, or it becomes all (implicit) NOPs.
        let mut irq = false;
        for _ in 0..4 {
            let command = self.unpack.word.u8();
            self.unpack.params_left = PARAM_COUNT[command.us()];
            if self.unpack.params_left != 0 {
                break;
            }

            irq |= self.enqueue(sched, command, 0);
            self.unpack.word >>= 8;
            self.unpack.cmds_left -= 1;

            if self.unpack.cmds_left == 0 || self.unpack.word == 0 {
                self.unpack.cmds_left = 0;
                break;
            }
        }
        irq
    }

    /// A parameter written to one of the 0x440-0x5FF command ports.
    pub fn write_cmd_port(
        &mut self,
        sched: &mut Scheduler<NdsEvent>,
        addr: u32,
        param: u32,
    ) -> bool {
        self.enqueue(sched, ((addr & 0x1FF) >> 2).u8(), param)
    }

    fn enqueue(&mut self, sched: &mut Scheduler<NdsEvent>, cmd: u8, param: u32) -> bool {
        let entry = ((cmd as u64) << 32) | param as u64;

        let mut irq = false;
        if self.fifo.is_empty() && !self.pipe.is_full() {
            self.pipe.push(entry);
        } else {
            if self.fifo.len() == 256 {
                panic!(
                    "geometry FIFO overflow (busy = {})",
                    self.status.busy()
                );
            }
            self.fifo.push_back(entry);
            irq = self.update_fifo_status();
        }

        if !self.status.busy() {
            self.process(sched);
        }
        irq
    }

    fn dequeue(&mut self) -> (u64, bool) {
        assert!(!self.pipe.is_empty(), "dequeue from empty geometry pipe");
        let entry = self.pipe.remove(0);

        let mut irq = false;
        if self.pipe.len() <= 2 {
            for _ in 0..2 {
                match self.fifo.pop_front() {
                    Some(entry) => self.pipe.push(entry),
                    None => break,
                }
            }
            irq = self.update_fifo_status();
        }

        (entry, irq)
    }

    /// Check whether the pipe head can run, and if so schedule it one
    /// device cycle out.
    fn process(&mut self, sched: &mut Scheduler<NdsEvent>) {
        let Some(&head) = self.pipe.first() else {
            self.status.set_busy(false);
            return;
        };

        let cmd = (head >> 32).u8();
        let available = self.pipe.len() + self.fifo.len();
        if available < PARAM_COUNT[cmd.us()].us() {
            // Starved for parameters; the next enqueue retries.
            self.status.set_busy(false);
            return;
        }

        self.status.set_busy(true);
        sched.schedule(NdsEvent::GxCommand { cmd }, 1);
    }

    /// Run the scheduled command: drain its entry and parameters, then
    /// look at the next one. No rasteriser is attached, so the entries
    /// are consumed and dropped.
    pub(crate) fn execute(&mut self, sched: &mut Scheduler<NdsEvent>, cmd: u8) -> bool {
        let mut irq = false;
        if PARAM_COUNT[cmd.us()] == 0 {
            irq |= self.dequeue().1;
        }
        for _ in 0..PARAM_COUNT[cmd.us()] {
            irq |= self.dequeue().1;
        }

        self.process(sched);
        irq
    }

    fn update_fifo_status(&mut self) -> bool {
        self.status.set_fifo_size(self.fifo.len() as u16);
        self.status.set_fifo_empty(self.fifo.is_empty());
        self.status.set_fifo_less_than_half(self.fifo.len() < 128);
        self.fifo_irq_condition()
    }

    fn fifo_irq_condition(&self) -> bool {
        match self.status.fifo_irq() {
            FifoIrqMode::Empty => self.fifo.is_empty(),
            FifoIrqMode::LessThanHalfFull => self.fifo.len() < 128,
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn pipe_contents(&self) -> Vec<(u8, u32)> {
        self.pipe
            .iter()
            .map(|e| ((e >> 32) as u8, *e as u32))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn counts(&self) -> (usize, usize) {
        (self.pipe.len(), self.fifo.len())
    }

    pub fn is_busy(&self) -> bool {
        self.status.busy()
    }
}

#[cfg(test)]
mod test {
    use common::components::scheduler::Scheduler;

    use super::*;

    fn run_pending(gx: &mut CommandProcessor, sched: &mut Scheduler<NdsEvent>) {
        loop {
            sched.advance(1);
            match sched.get_next_pending() {
                Some(evt) => {
                    let NdsEvent::GxCommand { cmd } = evt.kind else {
                        continue;
                    };
                    gx.execute(sched, cmd);
                }
                None if !gx.is_busy() => break,
                None => (),
            }
        }
    }

    #[test]
    fn packed_word_with_single_command() {
        let mut sched = Scheduler::default();
        let mut gx = CommandProcessor::default();

        // MTX_MODE expects one parameter
        gx.write_fifo(&mut sched, 0x0000_0010);
        assert_eq!(gx.pipe_contents(), vec![]);
        gx.write_fifo(&mut sched, 0x0000_0002);
        assert_eq!(gx.pipe_contents(), vec![(0x10, 2)]);
        assert!(gx.is_busy());

        run_pending(&mut gx, &mut sched);
        assert_eq!(gx.counts(), (0, 0));
        assert!(!gx.is_busy());
    }

    #[test]
    fn packed_word_with_nops_emits_until_zero() {
        let mut sched = Scheduler::default();
        let mut gx = CommandProcessor::default();

        // Low byte 0x15 has no parameters, rest of the word is NOPs
        gx.write_fifo(&mut sched, 0x0000_0015);
        assert_eq!(gx.pipe_contents(), vec![(0x15, 0)]);
    }

    #[test]
    fn command_port_enqueues_directly() {
        let mut sched = Scheduler::default();
        let mut gx = CommandProcessor::default();

        gx.write_cmd_port(&mut sched, 0x440, 0x1234);
        assert_eq!(gx.pipe_contents(), vec![(0x10, 0x1234)]);
    }

    #[test]
    fn starved_command_waits_for_parameters() {
        let mut sched = Scheduler::default();
        let mut gx = CommandProcessor::default();

        // VTX_16 wants two parameter words; give it one
        gx.write_cmd_port(&mut sched, 0x440 + (0x23 - 0x10) * 4, 0xAAAA);
        run_pending(&mut gx, &mut sched);
        assert!(!gx.is_busy());
        assert_eq!(gx.counts(), (1, 0));

        gx.write_cmd_port(&mut sched, 0x440 + (0x23 - 0x10) * 4, 0xBBBB);
        run_pending(&mut gx, &mut sched);
        assert_eq!(gx.counts(), (0, 0));
    }

    #[test]
    fn pipe_drains_from_fifo() {
        let mut sched = Scheduler::default();
        let mut gx = CommandProcessor::default();

        // Fill pipe (4) and some of the FIFO with parameterless commands;
        // nothing executes until the scheduler runs.
        for _ in 0..10 {
            gx.write_cmd_port(&mut sched, 0x440 + (0x15 - 0x10) * 4, 0);
        }
        assert_eq!(gx.counts(), (4, 6));
        assert!(GxStat::from(gx.status_read()).fifo_size() == 6);

        run_pending(&mut gx, &mut sched);
        assert_eq!(gx.counts(), (0, 0));
        let status = GxStat::from(gx.status_read());
        assert!(status.fifo_empty());
        assert!(status.fifo_less_than_half());
    }

    #[test]
    #[should_panic]
    fn fifo_overflow_panics() {
        let mut sched = Scheduler::default();
        let mut gx = CommandProcessor::default();
        for _ in 0..(4 + 256 + 1) {
            // SHININESS keeps everything queued waiting for parameters
            gx.write_cmd_port(&mut sched, 0x440 + (0x34 - 0x10) * 4, 0);
        }
    }
}
