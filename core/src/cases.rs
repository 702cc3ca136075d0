/// One truncation test case: an input double and the exact 32-bit
/// result the conversion must produce for it.
#[derive(Debug, Clone, Copy)]
pub struct TruncationCase {
    pub input: f64,
    pub expected: i32,
}

macro_rules! cases {
    ($(($input:expr, $expected:expr)),* $(,)?) => {
        &[$(TruncationCase { input: $input, expected: $expected }),*]
    };
}

/// The fixed truncation table, in evaluation order.
///
/// Covers zero in both signs, truncation toward zero for fractions,
/// the exact ±2^31 boundaries and their wrap-around neighbors, values
/// whose only interesting bits sit above 2^32 or 2^63, exponents past
/// the 2^84 cutoff, denormals, and the non-finite inputs.
pub const TRUNCATION_CASES: &[TruncationCase] = cases![
    (0.0, 0),
    (-0.0, 0),
    (0.25, 0),
    (-0.25, 0),
    (0.5, 0),
    (-0.999999, 0),
    (1.0, 1),
    (-1.0, -1),
    (1.5, 1),
    (-1.5, -1),
    (42.0, 42),
    (-42.0, -42),
    (123456.789, 123456),
    (-123456.789, -123456),
    // Around +2^31
    (2147483646.5, 2147483646),
    (2147483647.0, 2147483647),
    (2147483647.5, 2147483647),
    (2147483648.0, -2147483648),
    // Around -2^31
    (-2147483647.0, -2147483647),
    (-2147483648.0, -2147483648),
    (-2147483648.5, -2147483648),
    (-2147483649.0, 2147483647),
    // Around 2^32
    (4294967295.0, -1),
    (-4294967295.0, 1),
    (4294967296.0, 0),
    (4294967297.0, 1),
    (-4294967297.0, -1),
    // Only bits above 2^32 or 2^63 are interesting
    (8589934594.0, 2),
    (9007199254740991.0, -1),
    (-9007199254740991.0, 1),
    (9223372036854775808.0, 0),
    (9223372039002259456.0, -2147483648),
    // Exponent past the 2^84 cutoff
    (1.0e84, 0),
    // Denormal and non-finite inputs
    (5e-324, 0),
    (f64::NAN, 0),
    (f64::INFINITY, 0),
    (f64::NEG_INFINITY, 0),
];
