mod bytecode;
mod clock;
pub mod constants;
mod decode;
mod display;
mod error;
mod keypad;
mod machine;
mod vm;

pub use self::vm::Hz;

pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        clock::Clock,
        decode::Op,
        display::{Chip8DisplayBuffer, DisplayHandle, Framebuffer},
        error::{Chip8Error, Chip8Result, Fault, FaultKind},
        keypad::{InvalidKeyCode, KeyCode, Keypad},
        machine::Machine,
        vm::{Chip8Conf, Chip8Vm, ExecState, Flow},
    };
}
