//! Small numeric helpers shared by the signal processing modules

/// `linear_interp(y0, y1, frac)` is linear interpolation of `y0` and `y1` with fraction `frac`
///
/// # Arguments:
///
/// * `y0`, `y1` - The two y-values, a straight line can be drawn through these with an x-distance of 1.0
///
/// * `frac` - The fractional x-distance, in `[0.0, 1.0]`
pub fn linear_interp(y0: f32, y1: f32, frac: f32) -> f32 {
    y0 + ((y1 - y0) * frac)
}

/// `map_range(v, in_start, in_end, out_start, out_end)` is `v` linearly mapped from the input range to the output range
///
/// Values outside of the input range are extrapolated, not clamped. The input range must not be empty.
pub fn map_range(val: f32, in_start: f32, in_end: f32, out_start: f32, out_end: f32) -> f32 {
    linear_interp(out_start, out_end, (val - in_start) / (in_end - in_start))
}

/// `map_range_round(v, in_start, in_end, out_start, out_end)` is `map_range` rounded to the nearest integer
///
/// Halfway cases round away from zero.
pub fn map_range_round(val: f32, in_start: f32, in_end: f32, out_start: i32, out_end: i32) -> i32 {
    round_to_i32(map_range(
        val,
        in_start,
        in_end,
        out_start as f32,
        out_end as f32,
    ))
}

/// `round_to_i32(v)` is `v` rounded to the nearest integer, halfway cases away from zero
///
/// NaN rounds to zero, out of range values saturate.
pub fn round_to_i32(val: f32) -> i32 {
    libm::roundf(val) as i32
}

/// `is_almost(v1, v2, e)` is true iff `v1` is within `e` of `v2`
pub fn is_almost(v1: f32, v2: f32, eps: f32) -> bool {
    fabs(v1 - v2) <= eps
}

/// `fabs(v)` is the absolute value of `v`
pub fn fabs(v: f32) -> f32 {
    if v < 0.0 {
        -v
    } else {
        v
    }
}
