use crate::cases::TRUNCATION_CASES;

/// Run every entry of the truncation table through `convert`, asserting
/// bit-exact i32 results.
///
/// `convert` is any callable with the conversion signature (the pure
/// reference function or a synthesized trampoline), so the same driver
/// checks both. The first mismatch panics with the input value, its raw
/// bits, and both results; later cases are not evaluated.
pub fn run_all_truncation_tests(mut convert: impl FnMut(f64) -> i32) {
    for case in TRUNCATION_CASES {
        let got = convert(case.input);
        assert!(
            got == case.expected,
            "truncating {:?} (bits {:#018x}): got {}, expected {}",
            case.input,
            case.input.to_bits(),
            got,
            case.expected
        );
    }
}
