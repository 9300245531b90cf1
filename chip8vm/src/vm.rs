//! Virtual machine.
use std::{
    fmt::{self, Write},
    sync::Arc,
    time::Duration,
};

use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    constants::*,
    decode::Op,
    display::DisplayHandle,
    error::{Chip8Error, Chip8Result, Fault, FaultKind},
    keypad::{lowest_key, KeyCode, Keypad},
    machine::{Machine, MemResult},
};

pub struct Chip8Vm {
    machine: Machine,
    state: ExecState,
    /// Set when an instruction faulted. Stepping stays halted until the next load.
    fault: Option<Fault>,
    screen: DisplayHandle,
    rng: StdRng,
    conf: Chip8Conf,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        let rng = match conf.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let vm = Chip8Vm {
            machine: Machine::new(),
            state: ExecState::Running,
            fault: None,
            screen: DisplayHandle::new(),
            rng,
            conf,
        };
        vm.publish_display();
        vm
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Reset the machine and load a program, clearing any previous fault.
    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        self.machine.load(bytecode)?;

        self.state = ExecState::Running;
        self.fault = None;
        self.publish_display();

        Ok(())
    }

    /// Read surface for the renderer.
    pub fn display(&self) -> DisplayHandle {
        self.screen.clone()
    }

    /// Keypad shared with the input device.
    pub fn keypad(&self) -> Arc<Keypad> {
        self.machine.keypad.clone()
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Direct access to the machine state, for setting up tests and tools.
    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    /// The fault that halted the VM, if any.
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Number of instructions executed per 60 Hz frame by [`Chip8Vm::run_frame`].
    pub fn steps_per_frame(&self) -> u64 {
        let hz = self
            .conf
            .clock_frequency
            .unwrap_or(Hz(DEFAULT_CLOCK_FREQUENCY));
        (hz.0 / DELAY_FREQUENCY).max(1)
    }

    fn publish_display(&self) {
        self.screen.publish(&self.machine.display);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Running,
    /// Stalled on `Fx0A` until a key goes down. The key is stored in `Vx`.
    WaitingForKey { vx: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// The display buffer changed and a new frame was published.
    Draw,
    /// The sound timer was set.
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    KeyWait,
    /// The instruction isn't in the instruction table and was skipped.
    Unknown(u16),
}

/// VM Configuration Parameters.
#[derive(Debug, Default, Clone)]
pub struct Chip8Conf {
    /// Instructions per second, used to pace [`Chip8Vm::run_frame`].
    pub clock_frequency: Option<Hz>,
    /// Seed for the `RND` instruction. Random when not set.
    pub rng_seed: Option<u64>,
}

/// Frequency in hertz (per second)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Interpreter
impl Chip8Vm {
    /// Sets the keyboard key input state.
    ///
    /// Input devices on other threads can hold on to [`Chip8Vm::keypad`] instead.
    pub fn set_key(&self, key: KeyCode, pressed: bool) {
        self.machine.keypad.set_key(key, pressed);
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear_keys(&self) {
        self.machine.keypad.clear()
    }

    /// Count down the delay and sound timers.
    ///
    /// Must be called at 60 Hz, independent of how fast the VM is stepped.
    pub fn timer_tick(&mut self) {
        self.machine.tick_timers();
    }

    /// Execute up to `step_count` instructions.
    ///
    /// Returns the control flow of the last instruction.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.step()?;
        }

        Ok(flow)
    }

    /// Run one 60 Hz frame worth of instructions, then tick the timers.
    ///
    /// Stops early when the VM stalls waiting for a key.
    pub fn run_frame(&mut self) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..self.steps_per_frame() {
            flow = self.step()?;
            if flow == Flow::KeyWait {
                break;
            }
        }
        self.timer_tick();

        Ok(flow)
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> Chip8Result<Flow> {
        if let Some(fault) = self.fault {
            return Err(Chip8Error::Fault(fault));
        }

        if let ExecState::WaitingForKey { vx } = self.state {
            return Ok(self.poll_key(vx));
        }

        let pc = self.machine.pc;
        let opcode = match self.machine.fetch() {
            Ok(opcode) => opcode,
            Err(kind) => return Err(self.halt(kind, pc, 0)),
        };

        // Each instruction is two bytes.
        self.machine.pc = pc.wrapping_add(2);

        let op = Op::decode(opcode);
        op_trace(pc, opcode, &op);

        match self.exec(op) {
            Ok(flow) => {
                if flow == Flow::Draw {
                    self.publish_display();
                }
                Ok(flow)
            }
            Err(kind) => Err(self.halt(kind, pc, opcode)),
        }
    }

    fn halt(&mut self, kind: FaultKind, pc: Address, opcode: u16) -> Chip8Error {
        let fault = Fault { kind, pc, opcode };
        self.fault = Some(fault);
        Chip8Error::Fault(fault)
    }

    /// Check whether a key went down since the wait started.
    fn poll_key(&mut self, vx: u8) -> Flow {
        match lowest_key(self.machine.keypad.take_presses()) {
            Some(key) => {
                self.machine.set_register(vx, key.as_u8());
                self.state = ExecState::Running;
                Flow::Ok
            }
            None => Flow::KeyWait,
        }
    }

    /// Skip the next instruction when the condition holds.
    #[inline(always)]
    fn skip_if(&mut self, cond: bool) {
        if cond {
            self.machine.pc = self.machine.pc.wrapping_add(2);
        }
    }

    #[inline(always)]
    fn set_flag(&mut self, flag: bool) {
        self.machine.registers[FLAG_REGISTER] = flag as u8;
    }

    /// Execute a decoded instruction.
    ///
    /// The program counter already points past the instruction.
    fn exec(&mut self, op: Op) -> MemResult<Flow> {
        let m = &mut self.machine;

        match op {
            // 0nnn (SYS addr)
            //
            // Machine code routines aren't emulated.
            Op::Sys { .. } => {}
            // 00E0 (CLS)
            Op::ClearScreen => {
                m.clear_display();
                return Ok(Flow::Draw);
            }
            // 00EE (RET)
            //
            // Set the program counter to the address at the top of the stack.
            Op::Return => {
                m.pc = m.pop_call()?;
                return Ok(Flow::Jump);
            }
            // 1nnn (JP addr)
            Op::JumpAddress { address } => {
                m.pc = address;
                return Ok(Flow::Jump);
            }
            // 2nnn (CALL addr)
            //
            // The pushed address is the instruction after the call.
            Op::Call { address } => {
                m.push_call(m.pc)?;
                m.pc = address;
                return Ok(Flow::Jump);
            }
            // Bnnn (JP V0, addr)
            Op::JumpOffset { address } => {
                m.pc = address.wrapping_add(m.registers[0] as Address);
                return Ok(Flow::Jump);
            }
            Op::Skip_Eq_Byte { vx, nn } => {
                let cond = m.register(vx) == nn;
                self.skip_if(cond);
            }
            Op::Skip_NotEq_Byte { vx, nn } => {
                let cond = m.register(vx) != nn;
                self.skip_if(cond);
            }
            Op::Skip_Eq { vx, vy } => {
                let cond = m.register(vx) == m.register(vy);
                self.skip_if(cond);
            }
            Op::Skip_NotEq { vx, vy } => {
                let cond = m.register(vx) != m.register(vy);
                self.skip_if(cond);
            }
            Op::Load_Byte { vx, nn } => m.set_register(vx, nn),
            // 7xnn (ADD Vx, byte)
            //
            // Overflow wraps. Carry flag is not set.
            Op::Add_Byte { vx, nn } => {
                let x = m.register(vx);
                m.set_register(vx, x.wrapping_add(nn));
            }
            Op::Load_Vx_Vy { vx, vy } => m.set_register(vx, m.register(vy)),
            Op::Or_Vx_Vy { vx, vy } => m.set_register(vx, m.register(vx) | m.register(vy)),
            Op::And_Vx_Vy { vx, vy } => m.set_register(vx, m.register(vx) & m.register(vy)),
            Op::Xor_Vx_Vy { vx, vy } => m.set_register(vx, m.register(vx) ^ m.register(vy)),
            // 8xy4 (ADD Vx, Vy)
            //
            // The flag is written before the result, so when Vx is VF the result wins.
            Op::Add_Vx_Vy { vx, vy } => {
                let (result, overflow) = m.register(vx).overflowing_add(m.register(vy));
                self.set_flag(overflow);
                self.machine.set_register(vx, result);
            }
            // 8xy5 (SUB Vx, Vy)
            //
            // VF is 1 when there is no borrow.
            Op::Sub_Vx_Vy { vx, vy } => {
                let (x, y) = (m.register(vx), m.register(vy));
                self.set_flag(x > y);
                self.machine.set_register(vx, x.wrapping_sub(y));
            }
            // 8xy7 (SUBN Vx, Vy)
            Op::SubN_Vx_Vy { vx, vy } => {
                let (x, y) = (m.register(vx), m.register(vy));
                self.set_flag(y > x);
                self.machine.set_register(vx, y.wrapping_sub(x));
            }
            // 8xy6 (SHR Vx)
            //
            // VF takes the bit shifted out.
            Op::Shr_Vx { vx, .. } => {
                let x = m.register(vx);
                self.set_flag(x & 1 == 1);
                self.machine.set_register(vx, x >> 1);
            }
            // 8xyE (SHL Vx)
            Op::Shl_Vx { vx, .. } => {
                let x = m.register(vx);
                self.set_flag(x >> 7 == 1);
                self.machine.set_register(vx, x << 1);
            }
            Op::Load_I { address } => m.index = address,
            // Cxnn (RND Vx, byte)
            Op::Random { vx, nn } => {
                let r: u8 = self.rng.gen();
                self.machine.set_register(vx, r & nn);
            }
            Op::Draw { vx, vy, n } => {
                let x = m.register(vx) as usize;
                let y = m.register(vy) as usize;
                let erased = self.draw_sprite(x, y, n as usize)?;
                self.set_flag(erased);
                return Ok(Flow::Draw);
            }
            // Ex9E (SKP Vx)
            Op::Skip_Key { vx } => {
                let cond = key_pressed(m, vx);
                self.skip_if(cond);
            }
            // ExA1 (SKNP Vx)
            Op::Skip_NotKey { vx } => {
                let cond = !key_pressed(m, vx);
                self.skip_if(cond);
            }
            Op::Load_Vx_DT { vx } => m.set_register(vx, m.delay_timer),
            // Fx0A (LD Vx, K)
            //
            // All execution stops until a key is pressed. Only presses made
            // after this point count.
            Op::Load_Vx_Key { vx } => {
                m.keypad.take_presses();
                self.state = ExecState::WaitingForKey { vx };
                return Ok(Flow::KeyWait);
            }
            Op::Load_DT_Vx { vx } => m.delay_timer = m.register(vx),
            Op::Load_ST_Vx { vx } => {
                m.sound_timer = m.register(vx);
                return Ok(Flow::Sound);
            }
            // Fx1E (ADD I, Vx)
            Op::Add_I_Vx { vx } => m.index = m.index.wrapping_add(m.register(vx) as Address),
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            Op::Load_Font { vx } => {
                let digit = m.register(vx) as Address;
                m.index = FONTSET_START + digit * FONTSET_HEIGHT as Address;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            Op::Store_BCD { vx } => {
                let x = m.register(vx);
                let bcd = m.write_slice(m.index as usize, 3)?;
                bcd[0] = x / 100 % 10;
                bcd[1] = x / 10 % 10;
                bcd[2] = x % 10;
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            // I is left unchanged.
            Op::Store_Regs { vx } => {
                let count = vx as usize + 1;
                let registers = m.registers;
                m.write_slice(m.index as usize, count)?
                    .copy_from_slice(&registers[..count]);
            }
            // Fx65 (LD Vx, [I])
            Op::Load_Regs { vx } => {
                let count = vx as usize + 1;
                let mut values = [0; REGISTER_COUNT];
                values[..count].copy_from_slice(m.read_slice(m.index as usize, count)?);
                m.registers[..count].copy_from_slice(&values[..count]);
            }
            Op::Unknown { opcode } => {
                debug!("unknown opcode {opcode:04X} at {:04X}", m.pc.wrapping_sub(2));
                return Ok(Flow::Unknown(opcode));
            }
        }

        Ok(Flow::Ok)
    }

    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
    /// Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
    /// memory pointed to by address register I.
    ///
    /// Pixels falling outside the display area are clipped, not wrapped.
    ///
    /// Returns whether any pixel was switched off, which is a collision.
    fn draw_sprite(&mut self, x: usize, y: usize, n: usize) -> MemResult<bool> {
        let m = &mut self.machine;

        // Copy the rows out first, the display borrows the machine mutably.
        let mut sprite = [0u8; 0x10];
        sprite[..n].copy_from_slice(m.read_slice(m.index as usize, n)?);

        let mut is_erased = false;

        for (r, row) in sprite[..n].iter().enumerate() {
            let py = y + r;
            if py >= DISPLAY_HEIGHT {
                break;
            }

            // Each row is 8 bits representing the 8 pixels of the sprite.
            for c in 0..SPRITE_WIDTH {
                let px = x + c;
                if px >= DISPLAY_WIDTH {
                    break;
                }

                let new_px = (row >> (7 - c)) & 1 == 1;
                if !new_px {
                    continue;
                }

                // XOR erases a pixel when both the old and new values are 1.
                let old_px = m.read_pixel(px, py);
                is_erased |= old_px;
                m.write_pixel(px, py, !old_px);
            }
        }

        Ok(is_erased)
    }
}

/// Whether the key named by the value in `Vx` is down.
///
/// Values above 0xF name no key, which is never pressed.
fn key_pressed(m: &Machine, vx: u8) -> bool {
    KeyCode::try_from(m.register(vx))
        .map(|key| m.keypad.is_pressed(key))
        .unwrap_or(false)
}

/// Troubleshooting
#[doc(hidden)]
impl Chip8Vm {
    /// Returns the contents of the program memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for addr in (MEM_START..(MEM_START + count).min(MEM_SIZE - 1)).step_by(2) {
            let (a, b) = (self.machine.ram[addr], self.machine.ram[addr + 1]);
            writeln!(buf, "{addr:04X}: {a:02X}{b:02X}")?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        write!(buf, "{}", self.machine.display)?;
        Ok(buf)
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        let keypad = &self.machine.keypad;

        if keypad.any_pressed() {
            write!(buf, "keys: ")?;
            for key in KeyCode::ALL {
                if keypad.is_pressed(key) {
                    write!(buf, "{key}")?;
                }
            }
        }

        Ok(buf)
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(pc: Address, opcode: u16, op: &Op) {
    log::trace!("{pc:04X}: {opcode:04X} {op:?}");
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: Address, _: u16, _: &Op) {}
