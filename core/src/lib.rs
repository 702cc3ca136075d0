pub mod cases;
pub mod driver;
pub mod reference;
pub mod regset;

pub use cases::{TruncationCase, TRUNCATION_CASES};
pub use driver::run_all_truncation_tests;
pub use reference::truncate_to_int32;
pub use regset::RegSet;
