// =============================================================================
// Exponential Weighted Mean — centre-of-mass form, no bias adjustment
// =============================================================================
//
// Smoothing used by the RSI averages.  For a look-back `window` the
// centre-of-mass is `window - 1`, which gives
//
//   alpha = 1 / window
//   y_0   = x_0
//   y_t   = (1 - alpha) * y_{t-1} + alpha * x_t
//
// i.e. Wilder's smoothing, but seeded with the first observation instead of an
// SMA so the output has exactly one value per input.
// =============================================================================

/// Compute the exponentially weighted mean of `values` for look-back `window`.
///
/// The output has the same length as the input.
///
/// # Edge cases
/// - `window == 0` => empty vec
/// - empty input => empty vec
/// - A non-finite intermediate value truncates the series at that point.
pub fn ewm_mean(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.is_empty() {
        return Vec::new();
    }

    let alpha = 1.0 / window as f64;

    let mut result = Vec::with_capacity(values.len());
    let mut prev = values[0];
    if !prev.is_finite() {
        return Vec::new();
    }
    result.push(prev);

    for &x in &values[1..] {
        let next = (1.0 - alpha) * prev + alpha * x;
        if !next.is_finite() {
            break;
        }
        result.push(next);
        prev = next;
    }

    result
}
