pub mod emitter;
pub mod regs;
pub mod stub;
pub mod trampoline;

pub use regs::{Reg, Xmm};
pub use trampoline::{build_trampoline, X86_64Harness};
