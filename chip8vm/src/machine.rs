//! Machine state: memory, registers, stack, timers and display.
use std::sync::Arc;

use log::debug;

use crate::{
    bytecode::word,
    constants::*,
    display::Framebuffer,
    error::{Chip8Error, Chip8Result, FaultKind},
    keypad::Keypad,
};

pub type MemResult<T> = std::result::Result<T, FaultKind>;

/// Core state for a chip8 interpreter.
///
/// A plain record mutated synchronously by the VM. The only part shared
/// with other threads is the keypad.
pub struct Machine {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the next instruction to fetch.
    pub(crate) pc: Address,
    /// Stack pointer, the number of return addresses on the stack.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register VF (index 0xF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// (I) Pointer register used for sprite, BCD and bulk register operations.
    pub(crate) index: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub(crate) sound_timer: u8,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: Box<[Address; STACK_SIZE]>,
    /// Screen buffer that is drawn to.
    pub(crate) display: Framebuffer,

    // ------------------------------------------------------------------------
    // Devices
    pub(crate) keypad: Arc<Keypad>,
}

impl Default for Machine {
    fn default() -> Self {
        let mut machine = Self {
            pc: MEM_START as Address,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            index: 0,
            delay_timer: 0,
            sound_timer: 0,

            ram: Box::new([0; MEM_SIZE]),
            stack: Box::new([0; STACK_SIZE]),
            display: Framebuffer::new(),

            keypad: Arc::new(Keypad::new()),
        };
        machine.load_font();
        machine
    }
}

impl Machine {
    /// Boot a machine with zeroed state and the builtin font loaded.
    pub fn new() -> Self {
        Default::default()
    }

    /// Boot a machine with the given program loaded.
    pub fn with_program(bytecode: &[u8]) -> Chip8Result<Self> {
        let mut machine = Self::new();
        machine.load(bytecode)?;
        Ok(machine)
    }

    /// Reset the machine and copy the program into memory at `MEM_START`.
    ///
    /// The keypad is kept so input devices stay connected. On error the
    /// machine is left untouched.
    pub fn load(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if bytecode.len() > MAX_PROGRAM_SIZE {
            return Err(Chip8Error::LargeProgram {
                len: bytecode.len(),
            });
        }

        self.reset();
        self.ram[MEM_START..MEM_START + bytecode.len()].copy_from_slice(bytecode);
        debug!("loaded program of {} bytes", bytecode.len());

        Ok(())
    }

    /// Return every field to its boot state.
    fn reset(&mut self) {
        self.pc = MEM_START as Address;
        self.sp = 0;
        self.registers.fill(0);
        self.index = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;

        // Start with clean memory to avoid leaking previous program.
        self.ram.fill(0);
        self.stack.fill(0);
        self.display.clear();
        self.load_font();
    }

    fn load_font(&mut self) {
        let start = FONTSET_START as usize;
        self.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
    }

    // ------------------------------------------------------------------------
    // Memory

    pub fn read_byte(&self, address: usize) -> MemResult<u8> {
        self.ram
            .get(address)
            .copied()
            .ok_or(FaultKind::Addressing { address })
    }

    pub fn write_byte(&mut self, address: usize, value: u8) -> MemResult<()> {
        match self.ram.get_mut(address) {
            Some(byte) => {
                *byte = value;
                Ok(())
            }
            None => Err(FaultKind::Addressing { address }),
        }
    }

    /// Borrow `len` bytes starting at `address`.
    pub fn read_slice(&self, address: usize, len: usize) -> MemResult<&[u8]> {
        let end = address + len;
        if end > MEM_SIZE {
            // Report the first byte that falls outside memory.
            return Err(FaultKind::Addressing {
                address: address.max(MEM_SIZE),
            });
        }
        Ok(&self.ram[address..end])
    }

    /// Borrow `len` bytes starting at `address` for writing.
    pub fn write_slice(&mut self, address: usize, len: usize) -> MemResult<&mut [u8]> {
        let end = address + len;
        if end > MEM_SIZE {
            return Err(FaultKind::Addressing {
                address: address.max(MEM_SIZE),
            });
        }
        Ok(&mut self.ram[address..end])
    }

    /// Read the big-endian instruction word at the program counter.
    #[inline]
    pub fn fetch(&self) -> MemResult<u16> {
        let pc = self.pc as usize;
        Ok(word([self.read_byte(pc)?, self.read_byte(pc + 1)?]))
    }

    // ------------------------------------------------------------------------
    // Stack

    pub fn push_call(&mut self, address: Address) -> MemResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(FaultKind::StackOverflow);
        }
        self.stack[self.sp] = address;
        self.sp += 1;
        Ok(())
    }

    pub fn pop_call(&mut self) -> MemResult<Address> {
        if self.sp == 0 {
            return Err(FaultKind::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp])
    }

    // ------------------------------------------------------------------------
    // Display

    pub fn clear_display(&mut self) {
        self.display.clear();
    }

    pub fn read_pixel(&self, x: usize, y: usize) -> bool {
        self.display.read_pixel(x, y)
    }

    pub fn write_pixel(&mut self, x: usize, y: usize, value: bool) {
        self.display.write_pixel(x, y, value)
    }

    pub fn display(&self) -> &Framebuffer {
        &self.display
    }

    // ------------------------------------------------------------------------
    // Timers

    /// Count down both timers, stopping at zero.
    #[inline]
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    // ------------------------------------------------------------------------
    // Accessors

    pub fn pc(&self) -> Address {
        self.pc
    }

    pub fn set_pc(&mut self, pc: Address) {
        self.pc = pc;
    }

    /// Value of register `Vx`. Only the lower nibble of `vx` is used.
    #[inline(always)]
    pub fn register(&self, vx: u8) -> u8 {
        self.registers[(vx & 0xF) as usize]
    }

    #[inline(always)]
    pub fn set_register(&mut self, vx: u8, value: u8) {
        self.registers[(vx & 0xF) as usize] = value;
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    pub fn index(&self) -> Address {
        self.index
    }

    pub fn set_index(&mut self, index: Address) {
        self.index = index;
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn set_delay_timer(&mut self, value: u8) {
        self.delay_timer = value;
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn set_sound_timer(&mut self, value: u8) {
        self.sound_timer = value;
    }

    /// Number of return addresses on the call stack.
    pub fn stack_depth(&self) -> usize {
        self.sp
    }

    pub fn keypad(&self) -> &Arc<Keypad> {
        &self.keypad
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_boot_state() {
        let machine = Machine::new();
        assert_eq!(machine.pc(), 0x200);
        assert_eq!(machine.index(), 0);
        assert_eq!(machine.stack_depth(), 0);
        assert_eq!(machine.registers(), &[0; REGISTER_COUNT]);
        assert_eq!(machine.display().lit_count(), 0);

        let font = machine
            .read_slice(FONTSET_START as usize, FONTSET_DATA_LENGTH)
            .unwrap();
        assert_eq!(font, &FONTSET[..]);
    }

    #[test]
    fn test_load_places_program() {
        let program: Vec<u8> = (0..=255).collect();
        let machine = Machine::with_program(&program).unwrap();

        for (i, byte) in program.iter().enumerate() {
            assert_eq!(machine.read_byte(MEM_START + i), Ok(*byte));
        }
        assert_eq!(machine.read_byte(MEM_START + program.len()), Ok(0));

        // Reserved area only holds the font.
        let mut reserved = [0; MEM_START];
        let start = FONTSET_START as usize;
        reserved[start..start + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
        assert_eq!(machine.read_slice(0, MEM_START).unwrap(), &reserved[..]);
    }

    #[test]
    fn test_load_largest_program() {
        let program = vec![0xAB; MAX_PROGRAM_SIZE];
        let machine = Machine::with_program(&program).unwrap();
        assert_eq!(machine.read_byte(MEM_SIZE - 1), Ok(0xAB));
    }

    #[test]
    fn test_load_too_large() {
        let mut machine = Machine::with_program(&[0x12, 0x34]).unwrap();
        let program = vec![0; MAX_PROGRAM_SIZE + 1];

        let result = machine.load(&program);
        assert!(matches!(
            result,
            Err(Chip8Error::LargeProgram { len }) if len == MAX_PROGRAM_SIZE + 1
        ));

        // previous program untouched
        assert_eq!(machine.fetch(), Ok(0x1234));
    }

    #[test]
    fn test_load_resets_state() {
        let mut machine = Machine::with_program(&[0x00, 0xE0]).unwrap();
        let keypad = machine.keypad().clone();
        machine.set_register(3, 7);
        machine.push_call(0x300).unwrap();
        machine.write_pixel(5, 5, true);
        machine.set_pc(0x400);

        machine.load(&[0x00, 0xEE]).unwrap();

        assert_eq!(machine.register(3), 0);
        assert_eq!(machine.stack_depth(), 0);
        assert!(!machine.read_pixel(5, 5));
        assert_eq!(machine.pc(), 0x200);
        assert!(Arc::ptr_eq(&keypad, machine.keypad()));
    }

    #[test]
    fn test_memory_bounds() {
        let mut machine = Machine::new();
        assert_eq!(machine.write_byte(0xFFF, 1), Ok(()));
        assert_eq!(machine.read_byte(0xFFF), Ok(1));
        assert_eq!(
            machine.read_byte(0x1000),
            Err(FaultKind::Addressing { address: 0x1000 })
        );
        assert_eq!(
            machine.write_byte(0x1000, 1),
            Err(FaultKind::Addressing { address: 0x1000 })
        );
        assert_eq!(
            machine.read_slice(0xFFE, 3),
            Err(FaultKind::Addressing { address: 0x1000 })
        );
        assert!(machine.read_slice(0xFFE, 2).is_ok());
    }

    #[test]
    fn test_fetch_end_of_memory() {
        let mut machine = Machine::new();
        machine.set_pc(0xFFF);
        assert_eq!(
            machine.fetch(),
            Err(FaultKind::Addressing { address: 0x1000 })
        );
    }

    #[test]
    fn test_call_stack() {
        let mut machine = Machine::new();
        assert_eq!(machine.pop_call(), Err(FaultKind::StackUnderflow));

        machine.push_call(0x202).unwrap();
        machine.push_call(0x404).unwrap();
        assert_eq!(machine.stack_depth(), 2);
        assert_eq!(machine.pop_call(), Ok(0x404));
        assert_eq!(machine.pop_call(), Ok(0x202));
        assert_eq!(machine.pop_call(), Err(FaultKind::StackUnderflow));
    }

    #[test]
    fn test_stack_overflow() {
        let mut machine = Machine::new();
        for i in 0..STACK_SIZE {
            machine.push_call(i as Address).unwrap();
        }
        assert_eq!(machine.push_call(0), Err(FaultKind::StackOverflow));
        assert_eq!(machine.stack_depth(), STACK_SIZE);
    }

    #[test]
    fn test_timer_decay() {
        let mut machine = Machine::new();
        machine.set_delay_timer(5);
        machine.set_sound_timer(2);

        for _ in 0..5 {
            machine.tick_timers();
        }
        assert_eq!(machine.delay_timer(), 0);
        assert_eq!(machine.sound_timer(), 0);

        // never wraps
        machine.tick_timers();
        assert_eq!(machine.delay_timer(), 0);
        assert_eq!(machine.sound_timer(), 0);
    }

    #[test]
    fn test_clear_display_twice() {
        let mut machine = Machine::new();
        machine.write_pixel(0, 0, true);
        machine.clear_display();
        machine.clear_display();
        assert_eq!(machine.display().lit_count(), 0);
    }
}
