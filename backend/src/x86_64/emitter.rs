#![allow(non_upper_case_globals)]

use crate::code_buffer::CodeBuffer;
use crate::x86_64::regs::{Reg, Xmm};

// -- Prefix flags --

pub const P_EXT: u32 = 0x100; // 0x0F prefix
pub const P_EXT38: u32 = 0x200; // 0x0F 0x38 prefix (VEX map 2)
pub const P_DATA16: u32 = 0x400; // 0x66 prefix
pub const P_REXW: u32 = 0x1000; // REX.W = 1
pub const P_SIMDF2: u32 = 0x40000; // 0xF2 prefix

// -- Opcode constants (OPC_*) --

// Arithmetic
pub const OPC_ARITH_EvIb: u32 = 0x83;
pub const OPC_ARITH_EvIz: u32 = 0x81;
pub const OPC_ARITH_GvEv: u32 = 0x03;

// Shift
pub const OPC_SHIFT_1: u32 = 0xD1;
pub const OPC_SHIFT_Ib: u32 = 0xC1;

// Data movement
pub const OPC_MOVL_EvGv: u32 = 0x89;
pub const OPC_MOVL_GvEv: u32 = 0x8B;
pub const OPC_MOVL_EvIz: u32 = 0xC7;
pub const OPC_MOVL_Iv: u32 = 0xB8;

// Branch
pub const OPC_JCC_long: u32 = 0x80 | P_EXT;
pub const OPC_JMP_long: u32 = 0xE9;
pub const OPC_CALL_Jz: u32 = 0xE8;

// Group opcodes
pub const OPC_GRP3_Ev: u32 = 0xF7;
pub const OPC_GRP5: u32 = 0xFF;
pub const OPC_GRPBT: u32 = 0xBA | P_EXT;

// Misc
pub const OPC_LEA: u32 = 0x8D;
pub const OPC_TESTL: u32 = 0x85;
pub const OPC_PUSH_r32: u32 = 0x50;
pub const OPC_POP_r32: u32 = 0x58;
pub const OPC_RET: u32 = 0xC3;

// SSE2 scalar double
pub const OPC_MOVSD_XM: u32 = 0x10 | P_EXT | P_SIMDF2;
pub const OPC_MOVSD_MX: u32 = 0x11 | P_EXT | P_SIMDF2;
pub const OPC_CVTTSD2SI: u32 = 0x2C | P_EXT | P_SIMDF2;
pub const OPC_MOVQ_GvXm: u32 = 0x7E | P_EXT | P_DATA16 | P_REXW;

// BMI2 variable shifts (VEX map 2)
pub const OPC_SHLX: u32 = 0xF7 | P_EXT38 | P_DATA16;
pub const OPC_SHRX: u32 = 0xF7 | P_EXT38 | P_SIMDF2;

// -- Sub-operation enums --

/// Arithmetic sub-opcodes (used in /r field of 0x81/0x83 and shifted
/// into GvEv).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArithOp {
    Add = 0,
    And = 4,
    Sub = 5,
    Cmp = 7,
}

/// Shift sub-opcodes (used in /r field of 0xC1/0xD1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShiftOp {
    Shl = 4,
    Shr = 5,
}

/// Group 3 extension codes (used in /r field of 0xF7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Ext3Op {
    Neg = 3,
}

/// Group 5 extension codes (used in /r field of 0xFF).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Ext5Op {
    CallN = 2,
    PushN = 6,
}

/// Bit-test group extension codes (used in /r field of 0xBA).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GrpBtOp {
    Bts = 5,
}

/// x86 condition codes for Jcc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum X86Cond {
    Jo = 0x0,
    Jno = 0x1,
    Jb = 0x2,
    Jae = 0x3,
    Je = 0x4,
    Jne = 0x5,
    Jbe = 0x6,
    Ja = 0x7,
    Js = 0x8,
    Jns = 0x9,
    Jp = 0xA,
    Jnp = 0xB,
    Jl = 0xC,
    Jge = 0xD,
    Jle = 0xE,
    Jg = 0xF,
}

// -- Core encoding functions --

/// Helper: return P_REXW if `rexw` is true.
#[inline]
fn rexw_flag(rexw: bool) -> u32 {
    if rexw {
        P_REXW
    } else {
        0
    }
}

/// Emit prefixes + opcode byte. `r` is the reg field, `rm` is the r/m
/// field; both are raw register numbers (0-15). Pass 0 for unused
/// fields.
pub fn emit_opc(buf: &mut CodeBuffer, opc: u32, r: u8, rm: u8) {
    let mut rex: u8 = 0;
    if opc & P_REXW != 0 {
        rex |= 0x08; // REX.W
    }
    if r >= 8 {
        rex |= 0x04; // REX.R
    }
    if rm >= 8 {
        rex |= 0x01; // REX.B
    }

    // Mandatory prefixes come before REX.
    if opc & P_DATA16 != 0 {
        buf.emit_u8(0x66);
    }
    if opc & P_SIMDF2 != 0 {
        buf.emit_u8(0xF2);
    }

    if rex != 0 {
        buf.emit_u8(0x40 | rex);
    }

    if opc & P_EXT != 0 {
        buf.emit_u8(0x0F);
    }

    buf.emit_u8(opc as u8);
}

/// Emit opcode + ModR/M for a register-register operation. The fields
/// are raw register numbers so GP and SSE registers mix freely.
pub fn emit_modrm_raw(buf: &mut CodeBuffer, opc: u32, r: u8, rm: u8) {
    emit_opc(buf, opc, r, rm);
    buf.emit_u8(0xC0 | ((r & 0x7) << 3) | (rm & 0x7));
}

/// Emit opcode + ModR/M for a GP register-register operation.
pub fn emit_modrm(buf: &mut CodeBuffer, opc: u32, r: Reg, rm: Reg) {
    emit_modrm_raw(buf, opc, r as u8, rm as u8);
}

/// Emit opcode + ModR/M with /r extension (for group opcodes).
pub fn emit_modrm_ext(buf: &mut CodeBuffer, opc: u32, ext: u8, rm: Reg) {
    emit_modrm_raw(buf, opc, ext, rm as u8);
}

/// Emit opcode + ModR/M + displacement for memory [base + offset].
/// `r` is a raw reg-field value: a GP or SSE register number, or a
/// group extension code. Handles the special cases: RBP/R13 need an
/// explicit disp8, RSP/R12 need a SIB byte.
pub fn emit_modrm_mem(buf: &mut CodeBuffer, opc: u32, r: u8, base: Reg, offset: i32) {
    emit_opc(buf, opc, r, base as u8);

    let r3 = r & 0x7;
    let b3 = base.low3();

    if offset == 0 && b3 != 5 {
        // [base] — mod=00 (RBP/R13 always need disp8)
        if b3 == 4 {
            // RSP/R12 need SIB byte
            buf.emit_u8((r3 << 3) | 0x04);
            buf.emit_u8(0x24); // SIB: no index, base=RSP
        } else {
            buf.emit_u8((r3 << 3) | b3);
        }
    } else if (-128..=127).contains(&offset) {
        // [base + disp8] — mod=01
        if b3 == 4 {
            buf.emit_u8(0x44 | (r3 << 3));
            buf.emit_u8(0x24);
        } else {
            buf.emit_u8(0x40 | (r3 << 3) | b3);
        }
        buf.emit_u8(offset as u8);
    } else {
        // [base + disp32] — mod=10
        if b3 == 4 {
            buf.emit_u8(0x84 | (r3 << 3));
            buf.emit_u8(0x24);
        } else {
            buf.emit_u8(0x80 | (r3 << 3) | b3);
        }
        buf.emit_u32(offset as u32);
    }
}

/// Emit a three-byte VEX prefix + opcode + ModR/M (reg-reg), for the
/// BMI map-2 instructions. `v` is the extra VEX operand (the shift
/// count register for SHLX/SHRX).
fn emit_vex_modrm(buf: &mut CodeBuffer, opc: u32, r: Reg, v: Reg, rm: Reg) {
    assert!(opc & P_EXT38 != 0, "VEX encoding only used for map-2 opcodes");
    let r_bit: u8 = if r.needs_rex() { 0 } else { 0x80 };
    let x_bit: u8 = 0x40;
    let b_bit: u8 = if rm.needs_rex() { 0 } else { 0x20 };
    let mm: u8 = 2; // 0F 38
    let w: u8 = if opc & P_REXW != 0 { 0x80 } else { 0 };
    let pp: u8 = if opc & P_DATA16 != 0 {
        1
    } else if opc & P_SIMDF2 != 0 {
        3
    } else {
        0
    };
    let vvvv: u8 = (!(v as u8) & 0x0F) << 3;

    buf.emit_u8(0xC4);
    buf.emit_u8(r_bit | x_bit | b_bit | mm);
    buf.emit_u8(w | vvvv | pp);
    buf.emit_u8(opc as u8);
    buf.emit_u8(0xC0 | (r.low3() << 3) | rm.low3());
}

// -- Arithmetic instructions --

/// Emit arithmetic reg, reg (ADD/SUB/AND/CMP).
pub fn emit_arith_rr(buf: &mut CodeBuffer, op: ArithOp, rexw: bool, dst: Reg, src: Reg) {
    let opc = (OPC_ARITH_GvEv + ((op as u32) << 3)) | rexw_flag(rexw);
    emit_modrm(buf, opc, dst, src);
}

/// Emit arithmetic reg, imm (auto-selects imm8 vs imm32).
pub fn emit_arith_ri(buf: &mut CodeBuffer, op: ArithOp, rexw: bool, dst: Reg, imm: i32) {
    let w = rexw_flag(rexw);
    if (-128..=127).contains(&imm) {
        emit_modrm_ext(buf, OPC_ARITH_EvIb | w, op as u8, dst);
        buf.emit_u8(imm as u8);
    } else {
        emit_modrm_ext(buf, OPC_ARITH_EvIz | w, op as u8, dst);
        buf.emit_u32(imm as u32);
    }
}

/// Emit arithmetic reg, [base+offset] (load-op; CMP reg, [mem] here).
pub fn emit_arith_rm(
    buf: &mut CodeBuffer,
    op: ArithOp,
    rexw: bool,
    dst: Reg,
    base: Reg,
    offset: i32,
) {
    let opc = (OPC_ARITH_GvEv + ((op as u32) << 3)) | rexw_flag(rexw);
    emit_modrm_mem(buf, opc, dst as u8, base, offset);
}

/// Emit NEG reg.
pub fn emit_neg(buf: &mut CodeBuffer, rexw: bool, reg: Reg) {
    emit_modrm_ext(buf, OPC_GRP3_Ev | rexw_flag(rexw), Ext3Op::Neg as u8, reg);
}

/// Emit shift reg, imm8.
pub fn emit_shift_ri(buf: &mut CodeBuffer, op: ShiftOp, rexw: bool, dst: Reg, imm: u8) {
    let w = rexw_flag(rexw);
    if imm == 1 {
        emit_modrm_ext(buf, OPC_SHIFT_1 | w, op as u8, dst);
    } else {
        emit_modrm_ext(buf, OPC_SHIFT_Ib | w, op as u8, dst);
        buf.emit_u8(imm);
    }
}

/// Emit BTS reg, imm8 (bit test and set).
pub fn emit_bts_ri(buf: &mut CodeBuffer, rexw: bool, reg: Reg, bit: u8) {
    emit_modrm_ext(buf, OPC_GRPBT | rexw_flag(rexw), GrpBtOp::Bts as u8, reg);
    buf.emit_u8(bit);
}

/// Emit TEST reg, reg.
pub fn emit_test_rr(buf: &mut CodeBuffer, rexw: bool, r1: Reg, r2: Reg) {
    emit_modrm(buf, OPC_TESTL | rexw_flag(rexw), r1, r2);
}

/// Emit SHRX dst, src, count (BMI2: logical right shift, count register
/// free of the CL constraint).
pub fn emit_shrx(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg, count: Reg) {
    emit_vex_modrm(buf, OPC_SHRX | rexw_flag(rexw), dst, count, src);
}

/// Emit SHLX dst, src, count (BMI2 left shift).
pub fn emit_shlx(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg, count: Reg) {
    emit_vex_modrm(buf, OPC_SHLX | rexw_flag(rexw), dst, count, src);
}

// -- Data movement --

/// Emit MOV reg, reg (32-bit or 64-bit).
pub fn emit_mov_rr(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg) {
    emit_modrm(buf, OPC_MOVL_EvGv | rexw_flag(rexw), src, dst);
}

/// Emit MOV reg, imm (32-bit or 64-bit).
pub fn emit_mov_ri(buf: &mut CodeBuffer, rexw: bool, reg: Reg, val: u64) {
    if val == 0 {
        emit_modrm(buf, 0x31, reg, reg);
    } else if !rexw || val <= u32::MAX as u64 {
        emit_opc(buf, OPC_MOVL_Iv + (reg.low3() as u32), 0, reg as u8);
        buf.emit_u32(val as u32);
    } else if val as i64 >= i32::MIN as i64 && val as i64 <= i32::MAX as i64 {
        emit_modrm_ext(buf, OPC_MOVL_EvIz | P_REXW, 0, reg);
        buf.emit_u32(val as u32);
    } else {
        emit_opc(
            buf,
            (OPC_MOVL_Iv + (reg.low3() as u32)) | P_REXW,
            0,
            reg as u8,
        );
        buf.emit_u64(val);
    }
}

/// Emit MOV reg, [base+offset] (load).
pub fn emit_load(buf: &mut CodeBuffer, rexw: bool, dst: Reg, base: Reg, offset: i32) {
    emit_modrm_mem(buf, OPC_MOVL_GvEv | rexw_flag(rexw), dst as u8, base, offset);
}

/// Emit LEA dst, [base+offset].
pub fn emit_lea(buf: &mut CodeBuffer, rexw: bool, dst: Reg, base: Reg, offset: i32) {
    emit_modrm_mem(buf, OPC_LEA | rexw_flag(rexw), dst as u8, base, offset);
}

// -- SSE2 scalar double --

/// Emit MOVSD dst, [base+offset].
pub fn emit_movsd_load(buf: &mut CodeBuffer, dst: Xmm, base: Reg, offset: i32) {
    emit_modrm_mem(buf, OPC_MOVSD_XM, dst as u8, base, offset);
}

/// Emit MOVSD [base+offset], src.
pub fn emit_movsd_store(buf: &mut CodeBuffer, base: Reg, offset: i32, src: Xmm) {
    emit_modrm_mem(buf, OPC_MOVSD_MX, src as u8, base, offset);
}

/// Emit CVTTSD2SI dst32, src (truncating double-to-int32; produces the
/// 0x80000000 sentinel when the result does not fit).
pub fn emit_cvttsd2si(buf: &mut CodeBuffer, dst: Reg, src: Xmm) {
    emit_modrm_raw(buf, OPC_CVTTSD2SI, dst as u8, src as u8);
}

/// Emit MOVQ dst64, src (raw double bits out of an SSE register).
pub fn emit_movq_from_xmm(buf: &mut CodeBuffer, dst: Reg, src: Xmm) {
    emit_modrm_raw(buf, OPC_MOVQ_GvXm, src as u8, dst as u8);
}

// -- Branches and calls --

/// Emit Jcc rel32 with a zero displacement to be patched later.
/// Returns the offset of the displacement field.
pub fn emit_jcc_forward(buf: &mut CodeBuffer, cond: X86Cond) -> usize {
    emit_opc(buf, OPC_JCC_long + (cond as u32), 0, 0);
    let patch_at = buf.offset();
    buf.emit_u32(0);
    patch_at
}

/// Emit JMP rel32 with a zero displacement to be patched later.
/// Returns the offset of the displacement field.
pub fn emit_jmp_forward(buf: &mut CodeBuffer) -> usize {
    buf.emit_u8(OPC_JMP_long as u8);
    let patch_at = buf.offset();
    buf.emit_u32(0);
    patch_at
}

/// Resolve a forward jump: point the displacement at `patch_at` to
/// `target_offset`.
pub fn patch_jump_target(buf: &mut CodeBuffer, patch_at: usize, target_offset: usize) {
    let disp = target_offset as i64 - (patch_at as i64 + 4);
    assert!(
        (i32::MIN as i64..=i32::MAX as i64).contains(&disp),
        "jump displacement out of i32 range"
    );
    buf.patch_u32(patch_at, disp as u32);
}

/// Emit CALL rel32 to an absolute buffer offset.
pub fn emit_call(buf: &mut CodeBuffer, target_offset: usize) {
    buf.emit_u8(OPC_CALL_Jz as u8);
    let after = buf.offset() + 4;
    let disp = target_offset as i64 - after as i64;
    assert!(
        (i32::MIN as i64..=i32::MAX as i64).contains(&disp),
        "call displacement out of i32 range"
    );
    buf.emit_u32(disp as u32);
}

/// Emit indirect CALL through register.
pub fn emit_call_reg(buf: &mut CodeBuffer, reg: Reg) {
    emit_modrm_ext(buf, OPC_GRP5, Ext5Op::CallN as u8, reg);
}

// -- Stack operations --

/// Emit PUSH reg.
pub fn emit_push(buf: &mut CodeBuffer, reg: Reg) {
    emit_opc(buf, OPC_PUSH_r32 + (reg.low3() as u32), 0, reg as u8);
}

/// Emit POP reg.
pub fn emit_pop(buf: &mut CodeBuffer, reg: Reg) {
    emit_opc(buf, OPC_POP_r32 + (reg.low3() as u32), 0, reg as u8);
}

/// Emit PUSH qword [base+offset]. The address is computed before RSP
/// moves, per the ISA.
pub fn emit_push_mem(buf: &mut CodeBuffer, base: Reg, offset: i32) {
    emit_modrm_mem(buf, OPC_GRP5, Ext5Op::PushN as u8, base, offset);
}

/// Emit RET.
pub fn emit_ret(buf: &mut CodeBuffer) {
    buf.emit_u8(OPC_RET as u8);
}

/// Emit `n` bytes of NOP padding using recommended multi-byte NOPs.
pub fn emit_nops(buf: &mut CodeBuffer, mut n: usize) {
    while n > 0 {
        match n {
            1 => {
                buf.emit_u8(0x90);
                n -= 1;
            }
            2 => {
                buf.emit_u8(0x66);
                buf.emit_u8(0x90);
                n -= 2;
            }
            3 => {
                buf.emit_u8(0x0F);
                buf.emit_u8(0x1F);
                buf.emit_u8(0x00);
                n -= 3;
            }
            4 => {
                buf.emit_u8(0x0F);
                buf.emit_u8(0x1F);
                buf.emit_u8(0x40);
                buf.emit_u8(0x00);
                n -= 4;
            }
            5 => {
                buf.emit_u8(0x0F);
                buf.emit_u8(0x1F);
                buf.emit_u8(0x44);
                buf.emit_u8(0x00);
                buf.emit_u8(0x00);
                n -= 5;
            }
            6 => {
                buf.emit_u8(0x66);
                buf.emit_u8(0x0F);
                buf.emit_u8(0x1F);
                buf.emit_u8(0x44);
                buf.emit_u8(0x00);
                buf.emit_u8(0x00);
                n -= 6;
            }
            7 => {
                buf.emit_u8(0x0F);
                buf.emit_u8(0x1F);
                buf.emit_u8(0x80);
                buf.emit_u32(0);
                n -= 7;
            }
            _ => {
                buf.emit_u8(0x0F);
                buf.emit_u8(0x1F);
                buf.emit_u8(0x84);
                buf.emit_u8(0x00);
                buf.emit_u32(0);
                n -= 8;
            }
        }
    }
}
