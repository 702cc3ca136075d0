pub mod code_buffer;
pub mod x86_64;

pub use code_buffer::{CodeBuffer, MIN_BUFFER_SIZE};
pub use x86_64::X86_64Harness;

use dtoi_core::RegSet;

/// Native signature of a synthesized conversion code block: one 8-byte
/// floating-point argument in, a 4-byte integer back in the platform's
/// return register.
pub type ConvertFn = unsafe extern "C" fn(f64) -> i32;

/// Interface every target architecture supplies to the harness.
///
/// The truncation driver and the test matrix only see register codes
/// and finished code blocks, so porting means implementing this trait
/// with a different emitter; the driver and the case table stay put.
pub trait StubHarness {
    /// General-purpose registers usable as stub destinations and as
    /// save/verify candidates. Excludes the stack and frame pointers.
    fn allocatable_regs(&self) -> RegSet;

    /// Registers usable as the stub input location. Includes the stack
    /// pointer, which denotes a stack-resident input.
    fn source_regs(&self) -> RegSet;

    /// Synthesize a trampoline around a freshly generated conversion
    /// stub for one (source, destination) assignment.
    fn build_trampoline(&self, source: u8, destination: u8) -> ConvertCode;
}

/// An executable conversion code block: one stub plus the trampoline
/// wrapped around it, in an exclusively owned mapping.
///
/// The mapping stays alive (and executable, and immutable) for the
/// lifetime of this value; dropping it unmaps the code, so the entry
/// pointer must not outlive it.
pub struct ConvertCode {
    buf: CodeBuffer,
    entry: ConvertFn,
}

impl ConvertCode {
    /// Seal a finished buffer: flip it to read-execute and reinterpret
    /// the entry offset as a callable function.
    pub(crate) fn finalize(buf: CodeBuffer, entry: usize) -> Self {
        buf.set_executable()
            .expect("failed to make code buffer executable");
        // SAFETY: `entry` is the offset of a complete trampoline
        // following the System V convention for fn(f64) -> i32, and the
        // buffer owning it lives as long as `self`.
        let entry =
            unsafe { std::mem::transmute::<*const u8, ConvertFn>(buf.ptr_at(entry)) };
        Self { buf, entry }
    }

    /// Invoke the code block.
    pub fn call(&self, value: f64) -> i32 {
        // SAFETY: the buffer is executable, immutable, and owned by
        // `self` for the duration of the call.
        unsafe { (self.entry)(value) }
    }

    /// The emitted machine code, stub and trampoline both.
    pub fn code(&self) -> &[u8] {
        self.buf.as_slice()
    }
}
