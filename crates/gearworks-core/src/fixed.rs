use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// One full turn in radians (2π rounded to the nearest Q32.32 value).
pub const TAU: Fixed64 = Fixed64::from_bits(26_986_075_409);

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert an f64 to Fixed64, or `None` if it is NaN, infinite, or out of range.
#[inline]
pub fn checked_f64_to_fixed64(v: f64) -> Option<Fixed64> {
    Fixed64::checked_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display/FFI, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Wrap an angle in radians into `[0, TAU)`.
#[inline]
pub fn wrap_angle(angle: Fixed64) -> Fixed64 {
    let wrapped = angle % TAU;
    if wrapped < Fixed64::ZERO {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Clamp a value into `[-limit, limit]`. A negative limit is treated as zero.
#[inline]
pub fn clamp_symmetric(v: Fixed64, limit: Fixed64) -> Fixed64 {
    let limit = limit.max(Fixed64::ZERO);
    v.clamp(-limit, limit)
}

/// Checked division for Fixed64 that returns None on zero divisor.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}
