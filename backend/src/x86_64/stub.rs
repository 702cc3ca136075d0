use crate::code_buffer::CodeBuffer;
use crate::x86_64::emitter::*;
use crate::x86_64::regs::{Reg, Xmm, RESERVED_REGS};

/// Emit a double-to-int32 conversion stub and return its entry offset.
///
/// Register contract:
/// - Input: if `source` is RSP, the double sits one word above the
///   return address (`[rsp + 8]` at entry); otherwise `source` holds a
///   tagged heap-number pointer and the payload is at
///   `[source + offset]`.
/// - Output: the truncated int32 in the low 32 bits of `destination`
///   (upper bits unspecified).
/// - Every other general-purpose register is preserved bit-exactly.
///
/// The conversion is modulo-2^32 truncation toward zero. The fast tier
/// is a single CVTTSD2SI, which is exact whenever the truncated value
/// fits in 31 bits; its 0x80000000 sentinel routes everything else
/// (wrap-around magnitudes, NaN, infinities, and -2^31 itself) to an
/// integer bit-manipulation tier.
pub fn emit_convert_stub(
    buf: &mut CodeBuffer,
    source: Reg,
    destination: Reg,
    offset: i32,
) -> usize {
    assert!(
        !RESERVED_REGS.contains(destination as u8),
        "destination must be an allocatable register"
    );
    let entry = buf.offset();
    let dst = destination;

    // Fast tier.
    if source == Reg::Rsp {
        emit_movsd_load(buf, Xmm::Xmm7, Reg::Rsp, 8);
    } else {
        emit_movsd_load(buf, Xmm::Xmm7, source, offset);
    }
    emit_cvttsd2si(buf, dst, Xmm::Xmm7);
    emit_arith_ri(buf, ArithOp::Cmp, false, dst, i32::MIN);
    let done = emit_jcc_forward(buf, X86Cond::Jne);

    // Slow tier. Two scratch registers, saved here and restored below;
    // the raw bits come out of XMM7 so the source register may already
    // have been overwritten when it doubles as the destination.
    let (s1, s2) = scratch_pair(source, destination);
    emit_push(buf, s1);
    emit_push(buf, s2);
    emit_movq_from_xmm(buf, s1, Xmm::Xmm7);

    // s2 = unbiased exponent; anything outside 0..=83 (checked unsigned,
    // so negatives wrap high) truncates to 0. That covers |x| < 1,
    // |x| >= 2^84, NaN and the infinities.
    emit_mov_rr(buf, true, s2, s1);
    emit_shift_ri(buf, ShiftOp::Shr, true, s2, 52);
    emit_arith_ri(buf, ArithOp::And, false, s2, 0x7FF);
    emit_arith_ri(buf, ArithOp::Sub, false, s2, 1023);
    emit_arith_ri(buf, ArithOp::Cmp, false, s2, 83);
    let zero = emit_jcc_forward(buf, X86Cond::Ja);

    // dst = mantissa with the implicit bit.
    emit_mov_rr(buf, true, dst, s1);
    emit_shift_ri(buf, ShiftOp::Shl, true, dst, 12);
    emit_shift_ri(buf, ShiftOp::Shr, true, dst, 12);
    emit_bts_ri(buf, true, dst, 52);

    // The value is mantissa * 2^(exp - 52): shift right to drop the
    // fraction, or left when the exponent is large. Bits pushed past
    // bit 63 are discarded; only the low 32 matter.
    emit_arith_ri(buf, ArithOp::Cmp, false, s2, 52);
    let big = emit_jcc_forward(buf, X86Cond::Jg);
    emit_neg(buf, false, s2);
    emit_arith_ri(buf, ArithOp::Add, false, s2, 52);
    emit_shrx(buf, true, dst, dst, s2);
    let sign = emit_jmp_forward(buf);
    patch_jump_target(buf, big, buf.offset());
    emit_arith_ri(buf, ArithOp::Sub, false, s2, 52);
    emit_shlx(buf, true, dst, dst, s2);
    patch_jump_target(buf, sign, buf.offset());

    // Negative input: the modulo result is the 32-bit two's complement.
    emit_test_rr(buf, true, s1, s1);
    let positive = emit_jcc_forward(buf, X86Cond::Jns);
    emit_neg(buf, false, dst);
    patch_jump_target(buf, positive, buf.offset());
    let out = emit_jmp_forward(buf);

    patch_jump_target(buf, zero, buf.offset());
    emit_mov_ri(buf, false, dst, 0);

    patch_jump_target(buf, out, buf.offset());
    emit_pop(buf, s2);
    emit_pop(buf, s1);

    patch_jump_target(buf, done, buf.offset());
    emit_ret(buf);
    entry
}

/// Pick two scratch registers distinct from the stub's source and
/// destination. Four candidates cover the worst case of two exclusions.
fn scratch_pair(source: Reg, destination: Reg) -> (Reg, Reg) {
    let mut picks = [Reg::Rax, Reg::Rcx, Reg::Rdx, Reg::Rbx]
        .into_iter()
        .filter(|&r| r != source && r != destination);
    (picks.next().unwrap(), picks.next().unwrap())
}
