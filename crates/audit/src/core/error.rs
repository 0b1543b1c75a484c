use crate::console::Hook;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Structural failures. Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to list directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("malformed container {}: {source}", path.display())]
    Container {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("unrecognised program image {}: {reason}", path.display())]
    Image { path: PathBuf, reason: String },

    #[error("{} exceeds the {limit} byte limit", path.display())]
    Oversized { path: PathBuf, limit: u64 },

    #[error("invalid checker: {id} (valid checkers: {})", valid.join(", "))]
    UnknownChecker { id: String, valid: Vec<String> },

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("worker pool closed while dispatching {}", path.display())]
    PoolClosed { path: PathBuf },
}

impl AuditError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn container(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Container {
            path: path.into(),
            source,
        }
    }
}

/// Why an image could not be attached to a console.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachError {
    #[error("not a trace cartridge (missing TRC1 header)")]
    BadMagic,

    #[error("cartridge contains no program")]
    EmptyProgram,

    #[error("truncated instruction at offset {offset:#06x}")]
    Truncated { offset: usize },

    #[error("unknown opcode {opcode:#04x} at offset {offset:#06x}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("write to unmapped register {register:#04x} at offset {offset:#06x}")]
    UnmappedRegister { register: u8, offset: usize },

    #[error("jump at offset {offset:#06x} targets {target:#06x}, which is not an instruction")]
    BadJump { offset: usize, target: usize },
}

/// Faults raised by a console while stepping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("no cartridge attached")]
    NotAttached,

    #[error("emulation fault: {0}")]
    Fault(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckerError {
    #[error("console does not support the {0} hook")]
    UnsupportedHook(Hook),

    #[error("{0}")]
    Setup(String),
}

pub type Result<T, E = AuditError> = std::result::Result<T, E>;
