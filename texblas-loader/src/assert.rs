//! Approximate floating-point comparison for test harnesses.

/// Default relative tolerance.
pub const RTOL: f32 = 1e-5;
/// Default absolute tolerance.
pub const ATOL: f32 = 1e-7;

/// Elementwise approximate equality: a pair passes when
/// `|a - b| <= atol + rtol * |b|`.
///
/// `len` overrides how many leading elements are compared; both sequences
/// must be at least that long (or equal-length when `len` is `None`).
/// Returns the first offending index and values on failure.
pub fn allclose(
    actual: &[f32],
    expected: &[f32],
    len: Option<usize>,
    rtol: f32,
    atol: f32,
) -> Result<(), String> {
    let n = match len {
        Some(n) => {
            if actual.len() < n || expected.len() < n {
                return Err(format!(
                    "length override {} exceeds sequence lengths {} / {}",
                    n,
                    actual.len(),
                    expected.len()
                ));
            }
            n
        }
        None => {
            if actual.len() != expected.len() {
                return Err(format!(
                    "length mismatch: {} vs {}",
                    actual.len(),
                    expected.len()
                ));
            }
            actual.len()
        }
    };
    for i in 0..n {
        let (a, b) = (actual[i], expected[i]);
        if (a - b).abs() > atol + rtol * b.abs() {
            return Err(format!("mismatch at {i}: {a} vs {b} (rtol={rtol}, atol={atol})"));
        }
    }
    Ok(())
}

/// [`allclose`] with the default tolerances.
pub fn allclose_default(actual: &[f32], expected: &[f32]) -> Result<(), String> {
    allclose(actual, expected, None, RTOL, ATOL)
}
