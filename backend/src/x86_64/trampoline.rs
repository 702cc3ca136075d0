use crate::code_buffer::{CodeBuffer, MIN_BUFFER_SIZE};
use crate::x86_64::emitter::*;
use crate::x86_64::regs::{
    Reg, Xmm, ALLOCATABLE_REGS, CALLEE_SAVED, HEAP_NUMBER_VALUE_OFFSET, SOURCE_REGS,
};
use crate::x86_64::stub::emit_convert_stub;
use crate::{ConvertCode, StubHarness};
use dtoi_core::RegSet;

/// Synthesize a trampoline around a freshly generated conversion stub
/// for one (source, destination) register assignment.
///
/// The result is callable as `extern "C" fn(f64) -> i32`: the argument
/// arrives in XMM0 and the truncated value is returned in EAX. Between
/// the two, the trampoline arranges the input where the stub's register
/// contract wants it, saves every allocatable register except the
/// destination, calls the stub, and verifies each saved register came
/// back bit-exact. A clobber aborts the process naming the register.
pub fn build_trampoline(source: Reg, destination: Reg) -> ConvertCode {
    assert!(
        SOURCE_REGS.contains(source as u8),
        "{} is not a valid stub source",
        source.name()
    );
    assert!(
        ALLOCATABLE_REGS.contains(destination as u8),
        "{} is not a valid stub destination",
        destination.name()
    );

    // One page per register pair; allocation failure is harness-fatal.
    let mut buf =
        CodeBuffer::new(MIN_BUFFER_SIZE).expect("failed to allocate executable code buffer");

    // The stub goes into the same buffer so the trampoline can reach it
    // with a direct rel32 call without burning a register on an
    // absolute target.
    let offset = if source == Reg::Rsp {
        0
    } else {
        HEAP_NUMBER_VALUE_OFFSET
    };
    let stub_entry = emit_convert_stub(&mut buf, source, destination, offset);

    let misalign = buf.offset() & 15;
    if misalign != 0 {
        emit_nops(&mut buf, 16 - misalign);
    }
    let entry = buf.offset();

    // Preserve the native caller's callee-saved registers; the
    // destination under test may be one of them.
    for &reg in CALLEE_SAVED {
        emit_push(&mut buf, reg);
    }

    // Spill the XMM0 argument into a stack slot, the in-memory home
    // every source mode reads from.
    emit_arith_ri(&mut buf, ArithOp::Sub, true, Reg::Rsp, 8);
    emit_movsd_store(&mut buf, Reg::Rsp, 0, Xmm::Xmm0);
    if source != Reg::Rsp {
        // Fake a tagged heap-number pointer whose payload lands on the
        // spill slot. The register holds an absolute address, so the
        // pushes below do not disturb it.
        emit_lea(&mut buf, true, source, Reg::Rsp, -offset);
    }

    // Save every allocatable register except the destination, in
    // ascending code order, so the verify loop below can prove the stub
    // clobbered nothing else.
    let mut saved: Vec<Reg> = Vec::new();
    for code in ALLOCATABLE_REGS.iter() {
        let reg = Reg::from_u8(code);
        if reg != destination {
            emit_push(&mut buf, reg);
            saved.push(reg);
        }
    }

    // Duplicate the argument right below the call point so a
    // stack-source stub finds it at [rsp + 8] after the call.
    emit_push_mem(&mut buf, Reg::Rsp, (saved.len() as i32) * 8);
    emit_call(&mut buf, stub_entry);
    emit_arith_ri(&mut buf, ArithOp::Add, true, Reg::Rsp, 8);

    // Verify in reverse push order. On a match the register already
    // holds the right value, so the saved copy is just discarded. On a
    // mismatch, branch into an aborting handler with the register code;
    // the handler diverges, so clobbering RDI/RAX there is immaterial.
    for &reg in saved.iter().rev() {
        emit_arith_rm(&mut buf, ArithOp::Cmp, true, reg, Reg::Rsp, 0);
        let ok = emit_jcc_forward(&mut buf, X86Cond::Je);
        emit_mov_ri(&mut buf, false, Reg::Rdi, reg as u64);
        emit_mov_ri(&mut buf, true, Reg::Rax, register_clobbered as usize as u64);
        emit_arith_ri(&mut buf, ArithOp::And, true, Reg::Rsp, -16);
        emit_call_reg(&mut buf, Reg::Rax);
        let target = buf.offset();
        patch_jump_target(&mut buf, ok, target);
        emit_arith_ri(&mut buf, ArithOp::Add, true, Reg::Rsp, 8);
    }

    // Result into the fixed return register, then unwind: spill slot,
    // callee-saved registers, and back to the native caller. System V
    // passed the double in XMM0, so a plain RET pops nothing.
    emit_mov_rr(&mut buf, false, Reg::Rax, destination);
    emit_arith_ri(&mut buf, ArithOp::Add, true, Reg::Rsp, 8);
    for &reg in CALLEE_SAVED.iter().rev() {
        emit_pop(&mut buf, reg);
    }
    emit_ret(&mut buf);

    ConvertCode::finalize(buf, entry)
}

/// Landing point for the generated verify loop. A clobbered register
/// means the stub's generated code is corrupting state, which would
/// invalidate every later comparison; abort rather than report.
extern "C" fn register_clobbered(code: u64) -> ! {
    eprintln!(
        "fatal: register {} was clobbered by the conversion stub",
        Reg::from_u8(code as u8).name()
    );
    std::process::abort();
}

/// The x86-64 instance of the harness interface.
pub struct X86_64Harness;

impl StubHarness for X86_64Harness {
    fn allocatable_regs(&self) -> RegSet {
        ALLOCATABLE_REGS
    }

    fn source_regs(&self) -> RegSet {
        SOURCE_REGS
    }

    fn build_trampoline(&self, source: u8, destination: u8) -> ConvertCode {
        build_trampoline(Reg::from_u8(source), Reg::from_u8(destination))
    }
}
