use std::fmt;
use std::ops::{Index, IndexMut};

/// Every register of the machine. Only `R0`..`R9` can be named by an
/// instruction operand; `Ip` and `Is` are managed by the VM loop.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    /// Instruction pointer
    Ip,
    /// Instruction start: address of the first byte of the program
    Is,
}

impl Register {
    pub const COUNT: usize = 12;

    pub const GENERAL: [Register; 10] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
        Register::R8,
        Register::R9,
    ];

    /// Decodes an operand byte; anything but `0..=9` is invalid.
    #[inline]
    pub fn from_operand(byte: u8) -> Option<Register> {
        Self::GENERAL.get(byte as usize).copied()
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Register::R0 => "r0",
            Register::R1 => "r1",
            Register::R2 => "r2",
            Register::R3 => "r3",
            Register::R4 => "r4",
            Register::R5 => "r5",
            Register::R6 => "r6",
            Register::R7 => "r7",
            Register::R8 => "r8",
            Register::R9 => "r9",
            Register::Ip => "ip",
            Register::Is => "is",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name())
    }
}

/// The register file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    values: [u64; Register::COUNT],
}

impl Registers {
    #[inline]
    pub fn get(&self, reg: Register) -> u64 {
        self.values[reg.index()]
    }

    #[inline]
    pub fn set(&mut self, reg: Register, value: u64) {
        self.values[reg.index()] = value;
    }

    pub fn clear(&mut self) {
        self.values = [0; Register::COUNT];
    }
}

impl Index<Register> for Registers {
    type Output = u64;

    fn index(&self, reg: Register) -> &u64 {
        &self.values[reg.index()]
    }
}

impl IndexMut<Register> for Registers {
    fn index_mut(&mut self, reg: Register) -> &mut u64 {
        &mut self.values[reg.index()]
    }
}

/// Register dump, two columns per line: general registers first, then `ip`
/// and `is`.
impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let all = Register::GENERAL.iter().copied().chain([Register::Ip, Register::Is]);
        for (i, reg) in all.enumerate() {
            let sep = if i % 2 == 1 { "\n" } else { "    " };
            write!(f, "{:<3} {:#018x}{sep}", reg.name(), self.get(reg))?;
        }
        Ok(())
    }
}
