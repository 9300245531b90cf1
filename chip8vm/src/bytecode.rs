//! Helpers for extracting operands from instruction words.
//!
//! Instructions are two bytes, big-endian, with the opcode identity in the
//! first 4-bit nibble.
use crate::constants::Address;

/// Combine the two bytes at the program counter into an instruction word.
#[inline(always)]
pub fn word(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// Extract opcode identity from the upper nibble.
#[inline(always)]
pub fn op_code(word: u16) -> u8 {
    ((word & 0xF000) >> 12) as u8
}

/// Extract operand X, the register in the second nibble.
#[inline(always)]
pub fn op_x(word: u16) -> u8 {
    ((word & 0x0F00) >> 8) as u8
}

/// Extract operand Y, the register in the third nibble.
#[inline(always)]
pub fn op_y(word: u16) -> u8 {
    ((word & 0x00F0) >> 4) as u8
}

/// Extract operand N from the lowest nibble.
#[inline(always)]
pub fn op_n(word: u16) -> u8 {
    (word & 0x000F) as u8
}

/// Extract operand NN from the low byte.
#[inline(always)]
pub fn op_nn(word: u16) -> u8 {
    (word & 0x00FF) as u8
}

/// Extract the 12-bit address operand NNN.
#[inline(always)]
pub fn op_nnn(word: u16) -> Address {
    word & 0x0FFF
}
