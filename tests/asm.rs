use blang::asm::{AsmErrorKind, Operand, assemble, disassemble};
use blang::bytecode::Bytecode;
use blang::bytecode::opcode::Opcode;
use blang::vm::Register;

const PROGRAM: &str = "
; count r0 down from 5, keeping a running total in r1
        mov_ir %r0, 5
        mov_ir %r2, 1
top:    add_rr %r1, %r0
        sub_rr %r0, %r2
        jnz %r0, top
        regdump
        hlt
";

#[test]
fn test_disassembly_reassembles_to_the_same_bytes() {
    let code = assemble(PROGRAM).unwrap();
    let listing = disassemble(&code).unwrap();
    let again = assemble(&listing.to_source()).unwrap();
    assert_eq!(again, code);
}

#[test]
fn test_disassembly_resolves_labels_to_offsets() {
    let code = assemble(PROGRAM).unwrap();
    let listing = disassemble(&code).unwrap();
    let ops: Vec<_> = listing.instructions.iter().map(|d| d.opcode).collect();
    assert_eq!(
        ops,
        vec![
            Opcode::MovIr,
            Opcode::MovIr,
            Opcode::AddRr,
            Opcode::SubRr,
            Opcode::Jnz,
            Opcode::Regdump,
            Opcode::Hlt
        ]
    );
    let jnz = &listing.instructions[4];
    assert_eq!(jnz.operands, vec![Operand::Register(Register::R0), Operand::Address(20)]);
    assert_eq!(listing.instructions[2].offset, 20);
}

#[test]
fn test_listing_shows_offsets_and_bytes() {
    let code = assemble("nop\nhlt").unwrap();
    let text = disassemble(&code).unwrap().to_string();
    assert!(text.starts_with("00000000  00"), "{text}");
    assert!(text.lines().nth(1).is_some_and(|line| line.ends_with("hlt")), "{text}");
}

#[test]
fn test_assembler_error_reports_line() {
    let err = assemble("nop\n\nmov_ir %r0\n").unwrap_err();
    assert_eq!(err.line, 3);
    assert_eq!(err.kind, AsmErrorKind::OperandCount { mnemonic: "mov_ir", expected: 2, found: 1 });
    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.line_column("nop\n\nmov_ir %r0\n"), Some((3, 1)));
}

#[test]
fn test_disassembling_garbage_fails() {
    assert!(disassemble(&Bytecode::from_bytes(vec![0x02, 0x00, 0x01])).is_err());
    assert!(disassemble(&Bytecode::new()).is_ok_and(|listing| listing.instructions.is_empty()));
}
