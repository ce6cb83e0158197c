//! Error types for the protocol core.

use core::fmt;

use crate::command::Command;

/// Why a tagged value did not take a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Fragment does not start with `<tag>:`
    TagMismatch,
    /// Payload is not valid UTF-8
    InvalidUtf8,
    /// Payload is not a decimal integer in range
    InvalidInt,
    /// Payload does not fit the fixed-size value buffer
    PayloadOverflow { len: usize, capacity: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::TagMismatch => write!(f, "Tag mismatch"),
            ParseError::InvalidUtf8 => write!(f, "Payload is not valid UTF-8"),
            ParseError::InvalidInt => write!(f, "Payload is not a decimal integer"),
            ParseError::PayloadOverflow { len, capacity } => {
                write!(f, "Payload too large: {} bytes (max {})", len, capacity)
            }
        }
    }
}

/// A line the dispatcher refused to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// A required field was missing from a command line
    MissingField { command: Command, tag: &'static str },
    /// A field was present but its value was unusable
    InvalidField { command: Command, tag: &'static str },
    /// Command is not accepted in the current phase
    WrongPhase(Command),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::MissingField { command, tag } => {
                write!(f, "Malformed {}: missing '{}'", command, tag)
            }
            DispatchError::InvalidField { command, tag } => {
                write!(f, "Malformed {}: invalid '{}'", command, tag)
            }
            DispatchError::WrongPhase(command) => {
                write!(f, "{} not accepted before initialization", command)
            }
        }
    }
}

/// Errors surfaced to the application owning the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleError {
    /// The controller did not supply every requested tag in time
    InitTimeout { waited_millis: u64, missing: usize },
    /// Module name or feature tags cannot be sent as a descriptor line
    InvalidDescriptor(&'static str),
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleError::InitTimeout {
                waited_millis,
                missing,
            } => write!(
                f,
                "Initialization timed out after {} ms ({} tags missing)",
                waited_millis, missing
            ),
            ModuleError::InvalidDescriptor(reason) => write!(f, "Invalid descriptor: {}", reason),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseError {}

#[cfg(feature = "std")]
impl std::error::Error for DispatchError {}

#[cfg(feature = "std")]
impl std::error::Error for ModuleError {}

/// Errors from host links
#[cfg(feature = "std")]
#[derive(Debug)]
pub enum LinkError {
    /// I/O error during read/write
    Io(std::io::Error),
    /// Connection closed
    ConnectionClosed,
}

#[cfg(feature = "std")]
impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Io(e) => write!(f, "I/O error: {}", e),
            LinkError::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LinkError {}

#[cfg(feature = "std")]
impl From<std::io::Error> for LinkError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            LinkError::ConnectionClosed
        } else {
            LinkError::Io(e)
        }
    }
}
