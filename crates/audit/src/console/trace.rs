//! The trace console: a deterministic TIA-style video machine.
//!
//! A trace cartridge is the `TRC1` magic followed by a program:
//!
//! | opcode | operands  | effect                                        |
//! |--------|-----------|-----------------------------------------------|
//! | `0x00` |           | NOP                                           |
//! | `0x01` | `reg val` | write `val` to TIA register `reg`             |
//! | `0x02` | `lo hi`   | jump to program byte offset `hi:lo`           |
//!
//! Each instruction costs [`CLOCKS_PER_STEP`] colour clocks, except a write
//! to WSYNC which runs the beam to the end of the scanline. Execution wraps
//! to the first instruction after the last one.
//!
//! A frame ends on the falling edge of VSYNC, or when the beam has drawn
//! [`MAX_SCANLINES`] lines without one. Output is stable once
//! [`STABLE_AFTER`] consecutive frames repeat the previous frame's scanline
//! count, and stays stable until reset.

use super::registers::{self, COLUBK, TIA_END, VBLANK, VSYNC, WSYNC};
use super::{Console, FrameInfo, Hook, Observer, RegisterWrite, Signal};
use crate::core::{AttachError, ConsoleError, Image};

pub const MAGIC: &[u8; 4] = b"TRC1";

pub const CLOCKS_PER_SCANLINE: usize = 228;
pub const HBLANK_CLOCKS: usize = 68;
pub const CLOCKS_PER_STEP: usize = 12;
pub const MAX_SCANLINES: u32 = 312;
pub const STABLE_AFTER: u32 = 3;

const OP_NOP: u8 = 0x00;
const OP_WRITE: u8 = 0x01;
const OP_JUMP: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Nop,
    Write { register: u8, value: u8 },
    /// Target is an instruction index once decoded.
    Jump { target: usize },
}

#[derive(Debug, Clone)]
struct Program {
    ops: Vec<Op>,
}

impl Program {
    /// Offsets in errors are relative to the first byte after the magic.
    fn decode(data: &[u8]) -> Result<Self, AttachError> {
        let code = data.strip_prefix(MAGIC).ok_or(AttachError::BadMagic)?;
        if code.is_empty() {
            return Err(AttachError::EmptyProgram);
        }

        let mut ops = Vec::new();
        let mut starts: Vec<Option<usize>> = vec![None; code.len()];
        let mut jumps = Vec::new();
        let mut offset = 0;

        while offset < code.len() {
            starts[offset] = Some(ops.len());
            let opcode = code[offset];
            let op = match opcode {
                OP_NOP => {
                    offset += 1;
                    Op::Nop
                }
                OP_WRITE => {
                    let operands = code
                        .get(offset + 1..offset + 3)
                        .ok_or(AttachError::Truncated { offset })?;
                    let (register, value) = (operands[0], operands[1]);
                    if register >= TIA_END {
                        return Err(AttachError::UnmappedRegister { register, offset });
                    }
                    offset += 3;
                    Op::Write { register, value }
                }
                OP_JUMP => {
                    let operands = code
                        .get(offset + 1..offset + 3)
                        .ok_or(AttachError::Truncated { offset })?;
                    let target = usize::from(u16::from_le_bytes([operands[0], operands[1]]));
                    jumps.push((ops.len(), offset, target));
                    offset += 3;
                    Op::Jump { target: 0 }
                }
                _ => return Err(AttachError::UnknownOpcode { opcode, offset }),
            };
            ops.push(op);
        }

        for (index, offset, target) in jumps {
            let resolved = starts
                .get(target)
                .copied()
                .flatten()
                .ok_or(AttachError::BadJump { offset, target })?;
            ops[index] = Op::Jump { target: resolved };
        }

        Ok(Self { ops })
    }
}

pub struct TraceConsole {
    program: Option<Program>,
    pc: usize,
    registers: [u8; TIA_END as usize],
    clock: usize,
    scanline: u32,
    line: Vec<Signal>,
    frame: FrameInfo,
    previous_scanlines: Option<u32>,
    repeats: u32,
    last_signal: Signal,
    last_write: Option<RegisterWrite>,
}

impl Default for TraceConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceConsole {
    pub fn new() -> Self {
        Self {
            program: None,
            pc: 0,
            registers: [0; TIA_END as usize],
            clock: 0,
            scanline: 0,
            line: Vec::with_capacity(CLOCKS_PER_SCANLINE),
            frame: FrameInfo::default(),
            previous_scanlines: None,
            repeats: 0,
            last_signal: Signal::default(),
            last_write: None,
        }
    }

    fn vsync(&self) -> bool {
        self.registers[usize::from(VSYNC)] & 0x02 != 0
    }

    fn vblank(&self) -> bool {
        self.registers[usize::from(VBLANK)] & 0x02 != 0
    }

    fn write(&mut self, register: u8, value: u8, observer: &mut dyn Observer) {
        let write = RegisterWrite {
            address: u16::from(register),
            data: value,
        };
        self.last_write = Some(write);
        observer.register_write(write);

        let was_syncing = self.vsync();
        self.registers[usize::from(register)] = value;

        match register {
            WSYNC => {
                let remaining = CLOCKS_PER_SCANLINE - self.clock;
                self.advance(remaining, observer);
            }
            VSYNC if was_syncing && !self.vsync() => {
                self.end_frame(observer);
                self.advance(CLOCKS_PER_STEP, observer);
            }
            _ => self.advance(CLOCKS_PER_STEP, observer),
        }
    }

    fn advance(&mut self, clocks: usize, observer: &mut dyn Observer) {
        for _ in 0..clocks {
            let hblank = self.clock < HBLANK_CLOCKS;
            let vblank = self.vblank();
            let color = if hblank || vblank {
                0
            } else {
                self.registers[usize::from(COLUBK)] & 0xfe
            };
            let signal = Signal {
                vsync: self.vsync(),
                vblank,
                hblank,
                color,
            };

            self.line.push(signal);
            self.last_signal = signal;
            self.clock += 1;

            if self.clock == CLOCKS_PER_SCANLINE {
                self.end_scanline(observer);
            }
        }
    }

    fn end_scanline(&mut self, observer: &mut dyn Observer) {
        self.flush_line(observer);
        self.clock = 0;
        self.scanline += 1;
        if self.scanline >= MAX_SCANLINES {
            self.end_frame(observer);
        }
    }

    fn flush_line(&mut self, observer: &mut dyn Observer) {
        if !self.line.is_empty() {
            observer.pixels(&self.frame, &self.line);
            self.line.clear();
        }
    }

    fn end_frame(&mut self, observer: &mut dyn Observer) {
        self.flush_line(observer);

        let scanlines = self.scanline;
        if self.previous_scanlines == Some(scanlines) {
            self.repeats += 1;
        } else {
            self.repeats = 0;
        }
        self.previous_scanlines = Some(scanlines);

        self.frame.frame_num += 1;
        self.frame.scanlines = scanlines;
        self.frame.stable |= self.repeats >= STABLE_AFTER;
        self.scanline = 0;

        observer.new_frame(&self.frame);
    }
}

impl Console for TraceConsole {
    fn supports(&self, _hook: Hook) -> bool {
        true
    }

    fn attach(&mut self, image: &Image) -> Result<(), AttachError> {
        self.program = Some(Program::decode(image.data())?);
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.pc = 0;
        self.registers = [0; TIA_END as usize];
        self.clock = 0;
        self.scanline = 0;
        self.line.clear();
        self.frame = FrameInfo::default();
        self.previous_scanlines = None;
        self.repeats = 0;
        self.last_signal = Signal::default();
        self.last_write = None;
    }

    fn step(&mut self, observer: &mut dyn Observer) -> Result<(), ConsoleError> {
        let (op, len) = match &self.program {
            Some(program) => (program.ops[self.pc], program.ops.len()),
            None => return Err(ConsoleError::NotAttached),
        };
        self.pc = (self.pc + 1) % len;
        self.last_write = None;

        match op {
            Op::Nop => self.advance(CLOCKS_PER_STEP, observer),
            Op::Jump { target } => {
                self.pc = target;
                self.advance(CLOCKS_PER_STEP, observer);
            }
            Op::Write { register, value } => self.write(register, value, observer),
        }
        Ok(())
    }

    fn frame_info(&self) -> FrameInfo {
        self.frame
    }

    fn last_signal(&self) -> Signal {
        self.last_signal
    }

    fn last_write(&self) -> Option<RegisterWrite> {
        self.last_write
    }
}

/// Assembles trace cartridges.
#[derive(Debug, Clone, Default)]
pub struct CartridgeBuilder {
    code: Vec<u8>,
}

impl CartridgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program offset of the next instruction, usable as a jump target.
    pub fn position(&self) -> u16 {
        self.code.len() as u16
    }

    pub fn nop(mut self) -> Self {
        self.code.push(OP_NOP);
        self
    }

    pub fn write(mut self, register: u8, value: u8) -> Self {
        self.code.extend_from_slice(&[OP_WRITE, register, value]);
        self
    }

    pub fn wsync(self) -> Self {
        self.write(WSYNC, 0)
    }

    pub fn wsyncs(self, lines: usize) -> Self {
        (0..lines).fold(self, |builder, _| builder.wsync())
    }

    pub fn jump(mut self, target: u16) -> Self {
        self.code.push(OP_JUMP);
        self.code.extend_from_slice(&target.to_le_bytes());
        self
    }

    /// A 262-line frame with VBLANK held through VSYNC and the visible
    /// region filled with `background`.
    pub fn frame(self, background: u8) -> Self {
        self.frame_with_sync(background, true)
    }

    /// As [`frame`](Self::frame), optionally leaving VBLANK off during the
    /// three VSYNC lines.
    pub fn frame_with_sync(self, background: u8, blank_during_sync: bool) -> Self {
        self.write(VBLANK, if blank_during_sync { 0x02 } else { 0x00 })
            .write(VSYNC, 0x02)
            .wsyncs(3)
            .write(VSYNC, 0x00)
            .write(VBLANK, 0x02)
            .wsyncs(37)
            .write(VBLANK, 0x00)
            .write(registers::COLUBK, background)
            .wsyncs(192)
            .write(VBLANK, 0x02)
            .wsyncs(30)
    }

    pub fn build(self) -> Vec<u8> {
        let mut data = MAGIC.to_vec();
        data.extend(self.code);
        data
    }
}
