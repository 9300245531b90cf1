//! Hexadecimal keypad shared with the input device.
use std::sync::atomic::{AtomicU16, Ordering};

use crate::constants::*;

/// Keyboard input state.
///
/// Written by the input collaborator, possibly from another thread, and read
/// by the interpreter. Each key is one bit; pressed is a 1 bit, released is a 0 bit.
#[derive(Debug, Default)]
pub struct Keypad {
    state: AtomicU16,
    /// Keys that went down since the latch was last taken.
    presses: AtomicU16,
}

impl Keypad {
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the keyboard key input state.
    pub fn set_key(&self, key: KeyCode, pressed: bool) {
        let mask = 1 << key.as_u8();
        if pressed {
            self.state.fetch_or(mask, Ordering::AcqRel);
            self.presses.fetch_or(mask, Ordering::AcqRel);
        } else {
            self.state.fetch_and(!mask, Ordering::AcqRel);
        }
    }

    /// Checks immediately whether the given key is currently pressed.
    #[inline]
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.bits() & (1 << key.as_u8()) != 0
    }

    /// Check whether any key is pressed down.
    #[inline]
    pub fn any_pressed(&self) -> bool {
        self.bits() != 0
    }

    /// Lowest key that is pressed down.
    pub fn first_pressed(&self) -> Option<KeyCode> {
        lowest_key(self.bits())
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear(&self) {
        self.state.store(0, Ordering::Release);
        self.presses.store(0, Ordering::Release);
    }

    /// Raw key state, bit `n` for key `n`.
    #[inline]
    pub fn bits(&self) -> u16 {
        self.state.load(Ordering::Acquire)
    }

    /// Take the latched key presses, resetting the latch.
    ///
    /// Catches taps that were pressed and released between two polls.
    pub(crate) fn take_presses(&self) -> u16 {
        self.presses.swap(0, Ordering::AcqRel)
    }
}

/// Key for the lowest set bit.
pub(crate) fn lowest_key(bits: u16) -> Option<KeyCode> {
    if bits == 0 {
        None
    } else {
        KeyCode::try_from(bits.trailing_zeros() as u8).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    /// All keys in order of their value.
    pub const ALL: [KeyCode; KEY_COUNT as usize] = [
        Self::Key0,
        Self::Key1,
        Self::Key2,
        Self::Key3,
        Self::Key4,
        Self::Key5,
        Self::Key6,
        Self::Key7,
        Self::Key8,
        Self::Key9,
        Self::KeyA,
        Self::KeyB,
        Self::KeyC,
        Self::KeyD,
        Self::KeyE,
        Self::KeyF,
    ];

    #[inline]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(key_id as usize)
            .copied()
            .ok_or(InvalidKeyCode(key_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidKeyCode(pub u8);

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16, got {}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_key_state() {
        let keypad = Keypad::new();

        keypad.set_key(KeyCode::Key0, true);
        assert_eq!(keypad.bits(), 0b00000000_00000001);
        assert!(keypad.is_pressed(KeyCode::Key0));
        assert!(!keypad.is_pressed(KeyCode::Key1));
        assert!(!keypad.is_pressed(KeyCode::Key7));

        keypad.set_key(KeyCode::Key7, true);
        assert_eq!(keypad.bits(), 0b00000000_10000001);
        assert!(keypad.is_pressed(KeyCode::Key7));

        keypad.set_key(KeyCode::Key0, false);
        assert_eq!(keypad.bits(), 0b00000000_10000000);
        assert!(!keypad.is_pressed(KeyCode::Key0));
        assert_eq!(keypad.first_pressed(), Some(KeyCode::Key7));

        keypad.set_key(KeyCode::KeyF, true);
        assert_eq!(keypad.bits(), 0b10000000_10000000);
        assert!(keypad.is_pressed(KeyCode::KeyF));

        keypad.clear();
        assert!(!keypad.any_pressed());
        assert_eq!(keypad.first_pressed(), None);
    }

    #[test]
    fn test_press_latch() {
        let keypad = Keypad::new();

        // tapped between two polls
        keypad.set_key(KeyCode::Key9, true);
        keypad.set_key(KeyCode::Key9, false);
        assert!(!keypad.any_pressed());

        assert_eq!(keypad.take_presses(), 1 << 9);
        assert_eq!(keypad.take_presses(), 0);
    }

    #[test]
    fn test_keycode_conversion() {
        assert_eq!(KeyCode::try_from(0xA), Ok(KeyCode::KeyA));
        assert_eq!(KeyCode::try_from(16), Err(InvalidKeyCode(16)));
        assert_eq!(u8::from(KeyCode::KeyF), 15);
        assert_eq!(KeyCode::KeyB.to_string(), "kb");
        assert_eq!(lowest_key(0b0110_0000), Some(KeyCode::Key5));
    }
}
