//! The `.bvm` container: a shebang line so the file can be run directly,
//! a magic number, a format version and the raw opcode stream.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::diagnostics::AsStr;

use super::Bytecode;

pub const SHEBANG: &[u8] = b"#!/usr/bin/env bvm\n";
pub const MAGIC: &[u8; 4] = b"\0BVM";
pub const VERSION: u8 = 1;

#[derive(Debug)]
pub enum FileError {
    Io(io::Error),
    BadMagic,
    UnsupportedVersion(u8),
}

impl AsStr for FileError {
    fn as_str(&self) -> &'static str {
        match self {
            FileError::Io(_) => "cannot access bytecode file",
            FileError::BadMagic => "not a bytecode file",
            FileError::UnsupportedVersion(_) => "unsupported bytecode version",
        }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::Io(err) => write!(f, "{}: {err}", self.as_str()),
            FileError::BadMagic => f.write_str(self.as_str()),
            FileError::UnsupportedVersion(v) => {
                write!(f, "{} {v} (expected {VERSION})", self.as_str())
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FileError {
    fn from(err: io::Error) -> Self {
        FileError::Io(err)
    }
}

/// Serializes `code` into the container format.
pub fn encode(code: &Bytecode) -> Vec<u8> {
    let mut out = Vec::with_capacity(SHEBANG.len() + MAGIC.len() + 1 + code.len());
    out.extend_from_slice(SHEBANG);
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(code.as_bytes());
    out
}

/// Parses the container format back into an opcode stream.
pub fn decode(bytes: &[u8]) -> Result<Bytecode, FileError> {
    let rest = bytes.strip_prefix(SHEBANG).ok_or(FileError::BadMagic)?;
    let rest = rest.strip_prefix(MAGIC.as_slice()).ok_or(FileError::BadMagic)?;
    match rest.split_first() {
        Some((&VERSION, code)) => Ok(Bytecode::from_bytes(code.to_vec())),
        Some((&version, _)) => Err(FileError::UnsupportedVersion(version)),
        None => Err(FileError::BadMagic),
    }
}

/// Writes `code` to `path` and marks the file executable.
pub fn write_file(path: impl AsRef<Path>, code: &Bytecode) -> Result<(), FileError> {
    let path = path.as_ref();
    fs::write(path, encode(code))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

pub fn read_file(path: impl AsRef<Path>) -> Result<Bytecode, FileError> {
    decode(&fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let code = Bytecode::from_bytes(vec![0x01]);
        let bytes = encode(&code);
        assert!(bytes.starts_with(b"#!/usr/bin/env bvm\n\0BVM\x01"));
        assert_eq!(bytes.last(), Some(&0x01));
        assert_eq!(decode(&bytes).unwrap(), code);
    }

    #[test]
    fn test_rejects_foreign_files() {
        assert!(matches!(decode(b"\x7fELF"), Err(FileError::BadMagic)));
        assert!(matches!(decode(b"#!/usr/bin/env bvm\n\0BVM"), Err(FileError::BadMagic)));
        assert!(matches!(
            decode(b"#!/usr/bin/env bvm\n\0BVM\x02\x01"),
            Err(FileError::UnsupportedVersion(2))
        ));
    }
}
