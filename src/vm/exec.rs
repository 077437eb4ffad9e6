//! Instruction handlers, one per row of the opcode table.
//!
//! Every handler decodes its own operands relative to the current IP and
//! reports where execution continues.

use std::io::Write;

use crate::bytecode::Bytecode;
use crate::vm::{Flow, Register, Vm, VmErrorKind, VmResult};

impl Vm {
    /// Reads the operand byte `at` bytes past the current IP.
    fn operand_byte(&self, code: &Bytecode, at: u64) -> VmResult<u8> {
        let offset = self.operand_offset(at);
        code.get_byte(offset).map_err(|e| self.fault(VmErrorKind::OutOfBounds(e)))
    }

    fn operand_dword(&self, code: &Bytecode, at: u64) -> VmResult<u32> {
        let offset = self.operand_offset(at);
        code.get_dword(offset).map_err(|e| self.fault(VmErrorKind::OutOfBounds(e)))
    }

    fn operand_qword(&self, code: &Bytecode, at: u64) -> VmResult<u64> {
        let offset = self.operand_offset(at);
        code.get_qword(offset).map_err(|e| self.fault(VmErrorKind::OutOfBounds(e)))
    }

    fn operand_reg(&self, code: &Bytecode, at: u64) -> VmResult<Register> {
        let byte = self.operand_byte(code, at)?;
        Register::from_operand(byte).ok_or_else(|| self.fault(VmErrorKind::InvalidRegister(byte)))
    }

    /// Address operands are offsets from `IS`.
    fn operand_addr(&self, code: &Bytecode, at: u64) -> VmResult<u64> {
        let offset = self.operand_dword(code, at)?;
        Ok(self.registers()[Register::Is].wrapping_add(u64::from(offset)))
    }

    #[inline]
    fn operand_offset(&self, at: u64) -> u64 {
        (self.ip() - self.registers()[Register::Is]).wrapping_add(at)
    }

    /// `dst op= src` for the two register operands.
    fn binary_rr(&mut self, code: &Bytecode, op: fn(u64, u64) -> u64) -> VmResult<Flow> {
        let dst = self.operand_reg(code, 1)?;
        let src = self.operand_reg(code, 2)?;
        let regs = self.registers_mut();
        regs[dst] = op(regs[dst], regs[src]);
        Ok(Flow::Next)
    }
}

pub fn hlt(_vm: &mut Vm, _code: &Bytecode, _out: &mut dyn Write) -> VmResult<Flow> {
    Ok(Flow::Jump(0))
}

pub fn mov_ir(vm: &mut Vm, code: &Bytecode, _out: &mut dyn Write) -> VmResult<Flow> {
    let dst = vm.operand_reg(code, 1)?;
    let imm = vm.operand_qword(code, 2)?;
    vm.registers_mut()[dst] = imm;
    Ok(Flow::Next)
}

pub fn mov_rr(vm: &mut Vm, code: &Bytecode, _out: &mut dyn Write) -> VmResult<Flow> {
    vm.binary_rr(code, |_, src| src)
}

pub fn add_rr(vm: &mut Vm, code: &Bytecode, _out: &mut dyn Write) -> VmResult<Flow> {
    vm.binary_rr(code, u64::wrapping_add)
}

pub fn sub_rr(vm: &mut Vm, code: &Bytecode, _out: &mut dyn Write) -> VmResult<Flow> {
    vm.binary_rr(code, u64::wrapping_sub)
}

pub fn mul_rr(vm: &mut Vm, code: &Bytecode, _out: &mut dyn Write) -> VmResult<Flow> {
    vm.binary_rr(code, u64::wrapping_mul)
}

pub fn jmp(vm: &mut Vm, code: &Bytecode, _out: &mut dyn Write) -> VmResult<Flow> {
    let target = vm.operand_addr(code, 1)?;
    Ok(Flow::Jump(target))
}

pub fn jnz(vm: &mut Vm, code: &Bytecode, _out: &mut dyn Write) -> VmResult<Flow> {
    let reg = vm.operand_reg(code, 1)?;
    let target = vm.operand_addr(code, 2)?;
    if vm.registers()[reg] != 0 { Ok(Flow::Jump(target)) } else { Ok(Flow::Next) }
}

pub fn regdump(vm: &mut Vm, _code: &Bytecode, out: &mut dyn Write) -> VmResult<Flow> {
    write!(out, "{}", vm.registers()).map_err(|e| vm.fault(VmErrorKind::Io(e.to_string())))?;
    Ok(Flow::Next)
}

pub fn syscall(vm: &mut Vm, _code: &Bytecode, _out: &mut dyn Write) -> VmResult<Flow> {
    Err(vm.fault(VmErrorKind::SyscallUnimplemented))
}
