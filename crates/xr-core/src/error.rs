//! Error types for the xenon-rt runtime

use thiserror::Error;

/// Main error type for the runtime
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("HLE error: {0}")]
    Hle(#[from] HleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

/// Guest memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Out of memory")]
    OutOfMemory,

    #[error("Invalid address: 0x{0:08x}")]
    InvalidAddress(u32),

    #[error("Access of {len} bytes at 0x{addr:08x} crosses the end of guest memory")]
    OutOfRange { addr: u32, len: u32 },
}

/// Host-routine (stub) errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HleError {
    #[error("No host routine bound to stub 0x{0:08x}")]
    UnknownStub(u32),

    #[error("No host routine registered for symbol {0}")]
    UnknownSymbol(String),

    #[error("Guest memory fault in {name}: {source}")]
    Fault {
        name: &'static str,
        #[source]
        source: MemoryError,
    },
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
