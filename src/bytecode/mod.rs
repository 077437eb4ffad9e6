//! Byte buffer holding an opcode stream.
//!
//! All multi-byte values are little-endian. Addresses used by the getters are
//! offsets into the buffer; the VM translates instruction pointers to offsets
//! before reading.

pub mod file;
pub mod opcode;

use std::fmt;

use crate::diagnostics::AsStr;

/// Capacity added whenever the buffer is full.
pub const GROW_BY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytecodeError {
    /// Read of `width` bytes at `addr` runs past the end of a buffer of
    /// length `len`.
    OutOfBounds { addr: u64, width: usize, len: usize },
}

impl AsStr for BytecodeError {
    fn as_str(&self) -> &'static str {
        match self {
            BytecodeError::OutOfBounds { .. } => "read past end of bytecode",
        }
    }
}

impl fmt::Display for BytecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BytecodeError::OutOfBounds { addr, width, len } => {
                write!(f, "{}: {width} byte(s) at {addr:#x}, length {len}", self.as_str())
            }
        }
    }
}

impl std::error::Error for BytecodeError {}

/// Growable opcode stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Bytecode {
    bytes: Vec<u8>,
}

impl Bytecode {
    pub const fn new() -> Self {
        Bytecode { bytes: Vec::new() }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Bytecode { bytes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn push_byte(&mut self, value: u8) {
        self.append(&[value]);
    }

    pub fn push_word(&mut self, value: u16) {
        self.append(&value.to_le_bytes());
    }

    pub fn push_dword(&mut self, value: u32) {
        self.append(&value.to_le_bytes());
    }

    pub fn push_qword(&mut self, value: u64) {
        self.append(&value.to_le_bytes());
    }

    pub fn get_byte(&self, addr: u64) -> Result<u8, BytecodeError> {
        self.read::<1>(addr).map(|[b]| b)
    }

    pub fn get_word(&self, addr: u64) -> Result<u16, BytecodeError> {
        self.read(addr).map(u16::from_le_bytes)
    }

    pub fn get_dword(&self, addr: u64) -> Result<u32, BytecodeError> {
        self.read(addr).map(u32::from_le_bytes)
    }

    pub fn get_qword(&self, addr: u64) -> Result<u64, BytecodeError> {
        self.read(addr).map(u64::from_le_bytes)
    }

    fn append(&mut self, data: &[u8]) {
        if self.bytes.len() + data.len() > self.bytes.capacity() {
            self.bytes.reserve_exact(GROW_BY.max(data.len()));
        }
        self.bytes.extend_from_slice(data);
    }

    fn read<const N: usize>(&self, addr: u64) -> Result<[u8; N], BytecodeError> {
        let oob = || BytecodeError::OutOfBounds { addr, width: N, len: self.bytes.len() };
        let start = usize::try_from(addr).map_err(|_| oob())?;
        let end = start.checked_add(N).ok_or_else(oob)?;
        let slice = self.bytes.get(start..end).ok_or_else(oob)?;
        // The slice is exactly N bytes long.
        let mut out = [0; N];
        out.copy_from_slice(slice);
        Ok(out)
    }
}

impl From<Vec<u8>> for Bytecode {
    fn from(bytes: Vec<u8>) -> Self {
        Bytecode { bytes }
    }
}

impl AsRef<[u8]> for Bytecode {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut code = Bytecode::new();
        code.push_byte(0xAB);
        code.push_word(0x1234);
        code.push_dword(0xDEAD_BEEF);
        code.push_qword(0x0102_0304_0506_0708);
        assert_eq!(
            code.as_bytes(),
            &[
                0xAB, 0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03,
                0x02, 0x01
            ]
        );
        assert_eq!(code.get_byte(0), Ok(0xAB));
        assert_eq!(code.get_word(1), Ok(0x1234));
        assert_eq!(code.get_dword(3), Ok(0xDEAD_BEEF));
        assert_eq!(code.get_qword(7), Ok(0x0102_0304_0506_0708));
    }

    #[test]
    fn test_grows_in_fixed_steps() {
        let mut code = Bytecode::new();
        code.push_byte(0);
        assert!(code.capacity() >= GROW_BY);
        for _ in 0..GROW_BY {
            code.push_byte(1);
        }
        assert_eq!(code.len(), GROW_BY + 1);
        assert!(code.capacity() >= GROW_BY + 1);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut code = Bytecode::new();
        code.push_word(7);
        assert_eq!(
            code.get_dword(0),
            Err(BytecodeError::OutOfBounds { addr: 0, width: 4, len: 2 })
        );
        assert!(code.get_byte(2).is_err());
        assert!(code.get_qword(u64::MAX).is_err());
    }
}
