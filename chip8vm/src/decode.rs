//! Instruction decoding.
//!
//! An instruction word is decoded once into an [`Op`] with its operands
//! extracted, and the interpreter matches on that.
use crate::{bytecode::*, constants::Address};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Op {
    /// 0nnn (SYS addr)
    ///
    /// Machine code routine on the original hardware. Ignored.
    Sys { address: Address },
    /// 00E0 (CLS)
    ///
    /// Clear the screen.
    ClearScreen,
    /// 00EE (RET)
    ///
    /// Return from the sub-routine.
    Return,
    /// 1nnn (JP addr)
    ///
    /// Jump to the address in `nnn`.
    JumpAddress { address: Address },
    /// 2nnn (CALL addr)
    ///
    /// Call the sub-routine at address `nnn`.
    Call { address: Address },
    /// 3xnn (SE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` equals value `nn`
    Skip_Eq_Byte { vx: u8, nn: u8 },
    /// 4xnn (SNE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` does not equal value `nn`.
    Skip_NotEq_Byte { vx: u8, nn: u8 },
    /// 5xy0 (SE Vx, Vy)
    ///
    /// Skip the next instruction if register `Vx` equals register `Vy`.
    Skip_Eq { vx: u8, vy: u8 },
    /// 6xnn (LD Vx, byte)
    Load_Byte { vx: u8, nn: u8 },
    /// 7xnn (ADD Vx, byte)
    ///
    /// Add byte to the value in register `Vx`, store the result in `Vx`.
    /// The carry flag is untouched.
    Add_Byte { vx: u8, nn: u8 },

    // ------------------------------------------------------------------------
    // Math
    /// 8xy0 (LD Vx, Vy)
    Load_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy1 (OR Vx, Vy)
    Or_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy2 (AND Vx, Vy)
    And_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy3 (XOR Vx, Vy)
    Xor_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy4 (ADD Vx, Vy)
    ///
    /// VF is set to 1 on overflow.
    Add_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy5 (SUB Vx, Vy)
    ///
    /// VF is set to 1 when `Vx > Vy`.
    Sub_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy6 (SHR Vx)
    ///
    /// `Vy` is ignored.
    Shr_Vx { vx: u8, vy: u8 },
    /// 8xy7 (SUBN Vx, Vy)
    ///
    /// VF is set to 1 when `Vy > Vx`.
    SubN_Vx_Vy { vx: u8, vy: u8 },
    /// 8xyE (SHL Vx)
    ///
    /// `Vy` is ignored.
    Shl_Vx { vx: u8, vy: u8 },

    /// 9xy0 (SNE Vx, Vy)
    Skip_NotEq { vx: u8, vy: u8 },
    /// Annn (LD I, addr)
    Load_I { address: Address },
    /// Bnnn (JP V0, addr)
    JumpOffset { address: Address },
    /// Cxnn (RND Vx, byte)
    Random { vx: u8, nn: u8 },
    /// Dxyn (DRW Vx, Vy, nibble)
    Draw { vx: u8, vy: u8, n: u8 },

    // ------------------------------------------------------------------------
    // Keyboard
    /// Ex9E (SKP Vx)
    Skip_Key { vx: u8 },
    /// ExA1 (SKNP Vx)
    Skip_NotKey { vx: u8 },

    // ------------------------------------------------------------------------
    // Misc
    /// Fx07 (LD Vx, DT)
    Load_Vx_DT { vx: u8 },
    /// Fx0A (LD Vx, K)
    Load_Vx_Key { vx: u8 },
    /// Fx15 (LD DT, Vx)
    Load_DT_Vx { vx: u8 },
    /// Fx18 (LD ST, Vx)
    Load_ST_Vx { vx: u8 },
    /// Fx1E (ADD I, Vx)
    Add_I_Vx { vx: u8 },
    /// Fx29 (LD F, Vx)
    Load_Font { vx: u8 },
    /// Fx33 (LD B, Vx)
    Store_BCD { vx: u8 },
    /// Fx55 (LD [I], Vx)
    Store_Regs { vx: u8 },
    /// Fx65 (LD Vx, [I])
    Load_Regs { vx: u8 },

    /// Anything not in the instruction table. Executed as a no-op.
    Unknown { opcode: u16 },
}

impl Op {
    /// Decode an instruction word.
    ///
    /// Never fails; unrecognised words become [`Op::Unknown`].
    pub fn decode(word: u16) -> Self {
        let (vx, vy) = (op_x(word), op_y(word));
        let (n, nn, nnn) = (op_n(word), op_nn(word), op_nnn(word));

        match op_code(word) {
            0x0 => match word {
                0x00E0 => Op::ClearScreen,
                0x00EE => Op::Return,
                _ => Op::Sys { address: nnn },
            },
            0x1 => Op::JumpAddress { address: nnn },
            0x2 => Op::Call { address: nnn },
            0x3 => Op::Skip_Eq_Byte { vx, nn },
            0x4 => Op::Skip_NotEq_Byte { vx, nn },
            0x5 if n == 0 => Op::Skip_Eq { vx, vy },
            0x6 => Op::Load_Byte { vx, nn },
            0x7 => Op::Add_Byte { vx, nn },
            // Arithmetic instructions identified by n
            0x8 => match n {
                0x0 => Op::Load_Vx_Vy { vx, vy },
                0x1 => Op::Or_Vx_Vy { vx, vy },
                0x2 => Op::And_Vx_Vy { vx, vy },
                0x3 => Op::Xor_Vx_Vy { vx, vy },
                0x4 => Op::Add_Vx_Vy { vx, vy },
                0x5 => Op::Sub_Vx_Vy { vx, vy },
                0x6 => Op::Shr_Vx { vx, vy },
                0x7 => Op::SubN_Vx_Vy { vx, vy },
                0xE => Op::Shl_Vx { vx, vy },
                _ => Op::Unknown { opcode: word },
            },
            0x9 if n == 0 => Op::Skip_NotEq { vx, vy },
            0xA => Op::Load_I { address: nnn },
            0xB => Op::JumpOffset { address: nnn },
            0xC => Op::Random { vx, nn },
            0xD => Op::Draw { vx, vy, n },
            // Keyboard and miscellaneous instructions identified by nn
            0xE => match nn {
                0x9E => Op::Skip_Key { vx },
                0xA1 => Op::Skip_NotKey { vx },
                _ => Op::Unknown { opcode: word },
            },
            0xF => match nn {
                0x07 => Op::Load_Vx_DT { vx },
                0x0A => Op::Load_Vx_Key { vx },
                0x15 => Op::Load_DT_Vx { vx },
                0x18 => Op::Load_ST_Vx { vx },
                0x1E => Op::Add_I_Vx { vx },
                0x29 => Op::Load_Font { vx },
                0x33 => Op::Store_BCD { vx },
                0x55 => Op::Store_Regs { vx },
                0x65 => Op::Load_Regs { vx },
                _ => Op::Unknown { opcode: word },
            },
            _ => Op::Unknown { opcode: word },
        }
    }

    /// Whether this instruction is part of the instruction table.
    #[inline]
    pub fn is_known(&self) -> bool {
        !matches!(self, Op::Unknown { .. })
    }
}
