//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::constants::{Address, MAX_PROGRAM_SIZE};

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// Attempt to load a bytecode program that can't fit in memory.
    LargeProgram { len: usize },
    /// VM fault during the interpreter loop. Execution is halted.
    Fault(Fault),
    Io(std::io::Error),
    Fmt(fmt::Error),
}

impl Chip8Error {
    /// The runtime fault, if this error was raised while stepping.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LargeProgram { len } => write!(
                f,
                "program of {len} bytes too large for VM memory (max {MAX_PROGRAM_SIZE})"
            ),
            Self::Fault(fault) => write!(f, "runtime error: {fault}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Fmt(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Chip8Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Fmt(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Fault> for Chip8Error {
    fn from(fault: Fault) -> Self {
        Chip8Error::Fault(fault)
    }
}

impl From<std::io::Error> for Chip8Error {
    fn from(err: std::io::Error) -> Self {
        Chip8Error::Io(err)
    }
}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}

/// Fatal error raised by an instruction, with the location it happened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    /// Address of the faulting instruction.
    pub pc: Address,
    /// The instruction word, or zero if the fetch itself failed.
    pub opcode: u16,
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {:04X} (opcode {:04X})",
            self.kind, self.pc, self.opcode
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Memory access outside of 0x000-0xFFF.
    Addressing { address: usize },
    /// Return from a subroutine with an empty call stack.
    StackUnderflow,
    /// Subroutine call with a full call stack.
    StackOverflow,
}

impl Display for FaultKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Addressing { address } => write!(f, "memory access out of bounds: {address:#X}"),
            Self::StackUnderflow => write!(f, "call stack underflow"),
            Self::StackOverflow => write!(f, "call stack overflow"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fault_message() {
        let err = Chip8Error::from(Fault {
            kind: FaultKind::StackUnderflow,
            pc: 0x204,
            opcode: 0x00EE,
        });
        assert_eq!(
            err.to_string(),
            "runtime error: call stack underflow at 0204 (opcode 00EE)"
        );
        assert_eq!(err.fault().map(|f| f.kind), Some(FaultKind::StackUnderflow));
    }
}
