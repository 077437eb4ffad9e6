//! Register-based virtual machine for assembled bytecode.
//!
//! The VM is an explicit context: the register file, the state flag, the
//! cycle counter and the options are all fields of [`Vm`]. Programs are
//! loaded at [`VmOptions::base`]; `IS` holds that address and `IP` moves
//! relative to it. Setting `IP` to zero stops the machine.

pub mod exec;
pub mod registers;

use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bytecode::opcode;
use crate::bytecode::{Bytecode, BytecodeError};
use crate::diagnostics::AsStr;

pub use registers::{Register, Registers};

/// Load address used when none is configured.
pub const DEFAULT_BASE: u64 = 0x1000;

/// Cycles a program may run before it is stopped.
pub const DEFAULT_CYCLE_BUDGET: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmErrorKind {
    InvalidOpcode(u8),
    InvalidRegister(u8),
    IpOutOfRange,
    /// An operand extends past the end of the program.
    OutOfBounds(BytecodeError),
    SyscallUnimplemented,
    CycleBudgetExhausted(u64),
    Cancelled,
    Io(String),
    /// [`VmOptions::base`] is zero, the address that means halt.
    ZeroBase,
}

impl AsStr for VmErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            VmErrorKind::InvalidOpcode(_) => "invalid opcode",
            VmErrorKind::InvalidRegister(_) => "invalid register",
            VmErrorKind::IpOutOfRange => "instruction pointer out of range",
            VmErrorKind::OutOfBounds(_) => "operand out of bounds",
            VmErrorKind::SyscallUnimplemented => "syscall is not implemented",
            VmErrorKind::CycleBudgetExhausted(_) => "cycle budget exhausted",
            VmErrorKind::Cancelled => "execution cancelled",
            VmErrorKind::Io(_) => "i/o error",
            VmErrorKind::ZeroBase => "load address must not be zero",
        }
    }
}

/// A fault, with the instruction pointer at the time it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmError {
    pub kind: VmErrorKind,
    pub ip: u64,
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.kind.as_str();
        match &self.kind {
            VmErrorKind::InvalidOpcode(b) | VmErrorKind::InvalidRegister(b) => {
                write!(f, "{head} {b:#04x} at {:#x}", self.ip)
            }
            VmErrorKind::OutOfBounds(err) => write!(f, "{head} at {:#x}: {err}", self.ip),
            VmErrorKind::CycleBudgetExhausted(n) => {
                write!(f, "{head} after {n} cycles at {:#x}", self.ip)
            }
            VmErrorKind::Io(message) => write!(f, "{head} at {:#x}: {message}", self.ip),
            VmErrorKind::ZeroBase => f.write_str(head),
            _ => write!(f, "{head} at {:#x}", self.ip),
        }
    }
}

impl std::error::Error for VmError {}

pub type VmResult<T> = Result<T, VmError>;

/// What a handler wants the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue at this absolute address. Zero halts.
    Jump(u64),
    /// Continue with the following instruction.
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Ready,
    Running,
    Halted,
    Faulted,
}

#[derive(Debug, Clone)]
pub struct VmOptions {
    /// Address the first byte of the program is loaded at. Must be non-zero:
    /// `IP == 0` halts, so [`Vm::run`] refuses a zero base with
    /// [`VmErrorKind::ZeroBase`].
    pub base: u64,
    /// `None` lets a program run forever.
    pub cycle_budget: Option<u64>,
    /// Log every dispatched instruction to stderr.
    pub trace: bool,
}

impl Default for VmOptions {
    fn default() -> Self {
        VmOptions { base: DEFAULT_BASE, cycle_budget: Some(DEFAULT_CYCLE_BUDGET), trace: false }
    }
}

/// Cooperative cancellation flag, checked once per cycle. Clones share the
/// flag, so one can be handed to another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Summary of a run that reached `hlt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halt {
    pub cycles: u64,
}

pub struct Vm {
    registers: Registers,
    state: VmState,
    cycles: u64,
    options: VmOptions,
    cancel: Option<CancelToken>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmOptions::default())
    }
}

impl Vm {
    pub fn new(options: VmOptions) -> Self {
        Vm { registers: Registers::default(), state: VmState::Ready, cycles: 0, options, cancel: None }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[inline]
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    #[inline]
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    #[inline]
    pub fn state(&self) -> VmState {
        self.state
    }

    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[inline]
    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    #[inline]
    pub fn ip(&self) -> u64 {
        self.registers[Register::Ip]
    }

    /// Runs `code` from its first byte until `hlt` or a fault. Register
    /// output from `regdump` goes to `out`.
    pub fn run(&mut self, code: &Bytecode, out: &mut dyn Write) -> VmResult<Halt> {
        if self.options.base == 0 {
            self.state = VmState::Faulted;
            return Err(VmError { kind: VmErrorKind::ZeroBase, ip: 0 });
        }
        self.registers.clear();
        self.registers[Register::Ip] = self.options.base;
        self.registers[Register::Is] = self.options.base;
        self.cycles = 0;
        self.state = VmState::Running;

        loop {
            match self.step(code, out) {
                Ok(true) => {}
                Ok(false) => {
                    self.state = VmState::Halted;
                    return Ok(Halt { cycles: self.cycles });
                }
                Err(err) => {
                    self.state = VmState::Faulted;
                    return Err(err);
                }
            }
        }
    }

    /// Executes one instruction. Returns `false` once the machine halted.
    fn step(&mut self, code: &Bytecode, out: &mut dyn Write) -> VmResult<bool> {
        let ip = self.ip();
        if ip == 0 {
            return Ok(false);
        }
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(self.fault(VmErrorKind::Cancelled));
        }
        if let Some(budget) = self.options.cycle_budget.filter(|&budget| self.cycles >= budget) {
            return Err(self.fault(VmErrorKind::CycleBudgetExhausted(budget)));
        }

        let offset = self.offset_of(ip, code)?;
        let byte = code.get_byte(offset).map_err(|e| self.fault(VmErrorKind::OutOfBounds(e)))?;
        let info = opcode::lookup(byte).ok_or_else(|| self.fault(VmErrorKind::InvalidOpcode(byte)))?;
        if self.options.trace {
            print_info!("{ip:#06x} {:<8} cycle {}", info.mnemonic, self.cycles);
        }

        self.cycles += 1;
        let flow = match info.handler {
            Some(handler) => handler(self, code, out)?,
            None => Flow::Next,
        };
        self.registers[Register::Ip] = match flow {
            Flow::Jump(addr) => addr,
            Flow::Next => ip.wrapping_add(info.size() as u64),
        };
        Ok(self.ip() != 0)
    }

    /// Translates an absolute address into an offset into `code`.
    fn offset_of(&self, addr: u64, code: &Bytecode) -> VmResult<u64> {
        let start = self.registers[Register::Is];
        match addr.checked_sub(start) {
            Some(offset) if offset < code.len() as u64 => Ok(offset),
            _ => Err(self.fault(VmErrorKind::IpOutOfRange)),
        }
    }

    #[cold]
    pub(crate) fn fault(&self, kind: VmErrorKind) -> VmError {
        VmError { kind, ip: self.ip() }
    }
}
