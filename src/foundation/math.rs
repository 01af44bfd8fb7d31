/// Clamp into the closed unit interval. NaN maps to 0.
pub(crate) fn clamp01(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Quantize a unit-interval value to 8 bits with round-half-away-from-zero.
pub(crate) fn quantize_u8(v: f32) -> u8 {
    (clamp01(v) * 255.0).round() as u8
}

/// Wrap `i + delta` into `[0, n)`.
pub(crate) fn wrap_index(i: usize, delta: isize, n: usize) -> usize {
    let n_i = n as isize;
    (((i as isize + delta) % n_i + n_i) % n_i) as usize
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
