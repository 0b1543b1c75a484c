//! Execution contexts.
//!
//! The engine only talks to the [`Console`] trait. A console owns all
//! emulation state for one image and is discarded when the session ends.
//! [`TraceConsole`] is the bundled implementation.

pub mod trace;

pub use trace::{CartridgeBuilder, TraceConsole};

use crate::core::{AttachError, ConsoleError, Image};
use std::fmt;

/// TIA write addresses understood by the trace console.
pub mod registers {
    pub const VSYNC: u8 = 0x00;
    pub const VBLANK: u8 = 0x01;
    pub const WSYNC: u8 = 0x02;
    pub const COLUP0: u8 = 0x06;
    pub const COLUP1: u8 = 0x07;
    pub const COLUPF: u8 = 0x08;
    pub const COLUBK: u8 = 0x09;

    /// One past the highest TIA write address.
    pub const TIA_END: u8 = 0x40;

    pub const COLOUR_REGISTERS: [u8; 4] = [COLUP0, COLUP1, COLUPF, COLUBK];

    pub fn is_colour_register(address: u16) -> bool {
        COLOUR_REGISTERS.iter().any(|&r| u16::from(r) == address)
    }
}

/// Observation points a checker can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    FrameBoundary,
    RegisterWrite,
    PixelStream,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameBoundary => write!(f, "frame-boundary"),
            Self::RegisterWrite => write!(f, "register-write"),
            Self::PixelStream => write!(f, "pixel-stream"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInfo {
    /// Completed frames since reset.
    pub frame_num: u64,
    /// Scanline count of the last completed frame.
    pub scanlines: u32,
    pub stable: bool,
}

/// One colour clock of video output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signal {
    pub vsync: bool,
    pub vblank: bool,
    pub hblank: bool,
    pub color: u8,
}

impl Signal {
    pub fn is_visible(&self) -> bool {
        !self.vblank && !self.hblank
    }

    pub fn hue(&self) -> u8 {
        self.color >> 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub address: u16,
    pub data: u8,
}

/// Receives hook events while a console steps. Every method defaults to a
/// no-op so implementors only override what they subscribe to.
pub trait Observer {
    fn new_frame(&mut self, _frame: &FrameInfo) {}

    fn register_write(&mut self, _write: RegisterWrite) {}

    /// A batch of signals, normally one scanline.
    fn pixels(&mut self, _frame: &FrameInfo, _signals: &[Signal]) {}
}

/// Observer that drops everything.
pub struct NullObserver;

impl Observer for NullObserver {}

pub trait Console {
    fn supports(&self, hook: Hook) -> bool;

    fn attach(&mut self, image: &Image) -> Result<(), AttachError>;

    /// Returns the machine to its power-on state, keeping the attachment.
    fn reset(&mut self);

    /// Advances one unit of simulated work.
    fn step(&mut self, observer: &mut dyn Observer) -> Result<(), ConsoleError>;

    fn frame_info(&self) -> FrameInfo;

    fn last_signal(&self) -> Signal;

    fn last_write(&self) -> Option<RegisterWrite>;
}
