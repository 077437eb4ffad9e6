use std::collections::HashMap;
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::asm::{AsmError, AsmErrorKind};
use crate::bytecode::Bytecode;
use crate::bytecode::opcode::{self, OperandMode, OperandSpec, OpcodeInfo};

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*):\s*(.*)$").unwrap())
}

fn register_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^%[rR]([0-9]+)$").unwrap())
}

fn immediate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$?(-)?(?:0[xX]([0-9A-Fa-f]+)|([0-9]+))$").unwrap())
}

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// One instruction found by the first pass.
struct Line<'src> {
    line: usize,
    info: &'static OpcodeInfo,
    operands: Vec<&'src str>,
}

/// Assembles `src` into an opcode stream.
///
/// The first pass collects instructions and assigns label offsets using the
/// sizes from the opcode table; the second pass encodes, so a label may be
/// used before it is defined.
pub fn assemble(src: &str) -> Result<Bytecode, AsmError> {
    let mut labels = HashMap::new();
    let mut lines = Vec::new();
    let mut offset = 0u64;

    for (idx, raw) in src.lines().enumerate() {
        let line = idx + 1;
        let err = |kind| AsmError { line, kind };

        let mut text = strip_comment(raw).trim();
        while let Some(caps) = label_re().captures(text) {
            let (name, rest) = match (caps.get(1), caps.get(2)) {
                (Some(name), Some(rest)) => (name.as_str(), rest.as_str()),
                _ => break,
            };
            if labels.insert(name.to_owned(), offset).is_some() {
                return Err(err(AsmErrorKind::DuplicateLabel(name.to_owned())));
            }
            text = rest.trim();
        }
        if text.is_empty() {
            continue;
        }

        let (mnemonic, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        let info = opcode::by_mnemonic(mnemonic)
            .ok_or_else(|| err(AsmErrorKind::UnknownMnemonic(mnemonic.to_owned())))?;
        let operands: Vec<&str> =
            rest.split(|c: char| c == ',' || c.is_whitespace()).filter(|s| !s.is_empty()).collect();
        if operands.len() != info.operands.len() {
            return Err(err(AsmErrorKind::OperandCount {
                mnemonic: info.mnemonic,
                expected: info.operands.len(),
                found: operands.len(),
            }));
        }

        offset += info.size() as u64;
        lines.push(Line { line, info, operands });
    }

    let mut code = Bytecode::new();
    for Line { line, info, operands } in lines {
        code.push_byte(info.opcode as u8);
        for (spec, text) in info.operands.iter().zip(operands) {
            encode_operand(&mut code, spec, text, &labels).map_err(|kind| AsmError { line, kind })?;
        }
    }
    Ok(code)
}

fn strip_comment(line: &str) -> &str {
    match line.find([';', '#']) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn encode_operand(
    code: &mut Bytecode,
    spec: &OperandSpec,
    text: &str,
    labels: &HashMap<String, u64>,
) -> Result<(), AsmErrorKind> {
    let value = match spec.mode {
        OperandMode::Register => parse_register(text)?,
        OperandMode::Immediate => parse_immediate(text, spec.size)?,
        OperandMode::Address if ident_re().is_match(text) => {
            let target = *labels.get(text).ok_or_else(|| AsmErrorKind::UndefinedLabel(text.to_owned()))?;
            check_width(target, spec.size, text)?
        }
        OperandMode::Address => parse_immediate(text, spec.size)?,
    };
    match spec.size {
        1 => code.push_byte(value as u8),
        2 => code.push_word(value as u16),
        4 => code.push_dword(value as u32),
        _ => code.push_qword(value),
    }
    Ok(())
}

fn parse_register(text: &str) -> Result<u64, AsmErrorKind> {
    if !text.starts_with('%') {
        return Err(AsmErrorKind::ExpectedRegister(text.to_owned()));
    }
    register_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|n| n.as_str().parse::<u64>().ok())
        .filter(|&n| n <= 9)
        .ok_or_else(|| AsmErrorKind::InvalidRegister(text.to_owned()))
}

/// Decimal or `0x` hex, with an optional `$` prefix and leading `-`.
/// Negative values are stored as two's complement of the operand width.
fn parse_immediate(text: &str, size: u8) -> Result<u64, AsmErrorKind> {
    let caps = immediate_re()
        .captures(text)
        .ok_or_else(|| AsmErrorKind::ExpectedImmediate(text.to_owned()))?;
    let out_of_range = || AsmErrorKind::ImmediateOutOfRange(text.to_owned());
    let magnitude = match (caps.get(2), caps.get(3)) {
        (Some(hex), _) => u64::from_str_radix(hex.as_str(), 16),
        (_, Some(dec)) => dec.as_str().parse::<u64>(),
        _ => return Err(AsmErrorKind::ExpectedImmediate(text.to_owned())),
    }
    .map_err(|_| out_of_range())?;

    if caps.get(1).is_none() {
        return check_width(magnitude, size, text);
    }
    let bits = u32::from(size) * 8;
    if magnitude > 1u64 << (bits - 1) {
        return Err(out_of_range());
    }
    Ok(magnitude.wrapping_neg() & mask(size))
}

fn check_width(value: u64, size: u8, text: &str) -> Result<u64, AsmErrorKind> {
    if value > mask(size) {
        return Err(AsmErrorKind::ImmediateOutOfRange(text.to_owned()));
    }
    Ok(value)
}

#[inline]
fn mask(size: u8) -> u64 {
    if size >= 8 { u64::MAX } else { (1u64 << (u32::from(size) * 8)) - 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(src: &str) -> AsmError {
        assemble(src).unwrap_err()
    }

    #[test]
    fn test_encodes_demo_program() {
        let code = assemble("mov_ir %r0, $3\nmov_ir %r1, 2\nadd_rr %r0, %r1\nhlt").unwrap();
        let mut expected = vec![0x02, 0x00, 3, 0, 0, 0, 0, 0, 0, 0];
        expected.extend([0x02, 0x01, 2, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend([0x04, 0x00, 0x01, 0x01]);
        assert_eq!(code.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_comments_blank_lines_and_case() {
        let code = assemble("; header\n\n  NOP   # trailing\n\tHlt ; done").unwrap();
        assert_eq!(code.as_bytes(), &[0x00, 0x01]);
    }

    #[test]
    fn test_immediates() {
        assert_eq!(parse_immediate("0x10", 8), Ok(16));
        assert_eq!(parse_immediate("$0XfF", 8), Ok(255));
        assert_eq!(parse_immediate("-1", 8), Ok(u64::MAX));
        assert_eq!(parse_immediate("-1", 4), Ok(0xFFFF_FFFF));
        assert!(matches!(parse_immediate("0x1_0000_0000", 4), Err(AsmErrorKind::ExpectedImmediate(_))));
        assert!(matches!(parse_immediate("4294967296", 4), Err(AsmErrorKind::ImmediateOutOfRange(_))));
        assert!(matches!(parse_immediate("99999999999999999999", 8), Err(AsmErrorKind::ImmediateOutOfRange(_))));
        assert!(matches!(parse_immediate("ten", 8), Err(AsmErrorKind::ExpectedImmediate(_))));
    }

    #[test]
    fn test_labels_resolve_forward_and_backward() {
        let code = assemble("jmp end\nloop: nop\nend:\n  jnz %r0, loop\n  hlt").unwrap();
        // jmp(5) nop(1) jnz(6) hlt(1)
        assert_eq!(&code.as_bytes()[1..5], &6u32.to_le_bytes());
        assert_eq!(&code.as_bytes()[8..12], &5u32.to_le_bytes());
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let e = err("nop\nfrobnicate %r0");
        assert_eq!(e, AsmError { line: 2, kind: AsmErrorKind::UnknownMnemonic("frobnicate".into()) });

        let e = err("add_rr %r0");
        assert_eq!(e.kind, AsmErrorKind::OperandCount { mnemonic: "add_rr", expected: 2, found: 1 });

        assert_eq!(err("mov_ir 3, 4").kind, AsmErrorKind::ExpectedRegister("3".into()));
        assert_eq!(err("mov_ir %r10, 4").kind, AsmErrorKind::InvalidRegister("%r10".into()));
        assert_eq!(err("mov_ir %ip, 4").kind, AsmErrorKind::InvalidRegister("%ip".into()));
        assert_eq!(err("mov_ir %r1, %r2").kind, AsmErrorKind::ExpectedImmediate("%r2".into()));
        assert_eq!(err("jmp nowhere").kind, AsmErrorKind::UndefinedLabel("nowhere".into()));
        assert_eq!(err("a: nop\na: nop").kind, AsmErrorKind::DuplicateLabel("a".into()));
        assert_eq!(err("a: nop\na: nop").line, 2);
    }
}
