/// Vertex of the parabola through three equally spaced samples, as an
/// offset from the middle one, clamped to +/- 0.5 pixel.
///
/// Returns 0 when the samples are collinear.
pub fn parabolic_offset(prev: f64, curr: f64, next: f64) -> f64 {
    let denom = prev - 2.0 * curr + next;
    if denom.abs() > 1e-12 {
        ((prev - next) / (2.0 * denom)).clamp(-0.5, 0.5)
    } else {
        0.0
    }
}

/// Map a circular index into the signed range `(-n/2, n/2]`.
pub fn wrap_signed(index: usize, n: usize) -> i64 {
    if index > n / 2 {
        index as i64 - n as i64
    } else {
        index as i64
    }
}

/// Signed circular distance from `from` to `to` on a ring of `n` samples.
pub fn circular_distance(from: usize, to: usize, n: usize) -> i64 {
    wrap_signed((to + n - from) % n, n)
}
