use crate::complex::Complex;

/// Sentinel pass count for a point whose orbit never escaped: a member of
/// the set as far as the budget can tell.
pub const IN_SET: i32 = -1;

/// Bailout radius squared. `|z| >= 2` guarantees divergence for `z² + c`.
pub const ESCAPE_RADIUS_SQ: f64 = 4.0;

/// Escape-time iteration for one point of the complex plane.
///
/// Designed for **static dispatch**: renderers are generic over
/// `F: EscapeTime` so the hot loop can be inlined.
pub trait EscapeTime {
    /// Iterate `point` for at most `max_passes` steps.
    ///
    /// Returns the number of steps taken when `|z|² >= 4` was first
    /// observed (always `>= 1`), or [`IN_SET`] when the budget ran out.
    fn escape(&self, point: Complex, max_passes: u32) -> i32;

    /// Short human-readable name used in logs and metadata.
    fn name(&self) -> &'static str;

    /// Whether the filled set is known to have no interior holes, which is
    /// what the no-holes tile fill relies on.
    fn supports_no_holes(&self) -> bool {
        false
    }
}

/// Shared quadratic loop: `z ← z² + c` starting from `z`.
#[inline]
pub(crate) fn iterate_quadratic(mut z: Complex, c: Complex, max_passes: u32) -> i32 {
    for pass in 1..=max_passes {
        z = z.square() + c;
        if z.norm_sq() >= ESCAPE_RADIUS_SQ {
            return pass.min(i32::MAX as u32) as i32;
        }
    }
    IN_SET
}

/// Returns `true` if `c` lies inside the main cardioid.
#[inline]
pub(crate) fn in_cardioid(c: Complex) -> bool {
    let im2 = c.im * c.im;
    let q = (c.re - 0.25) * (c.re - 0.25) + im2;
    q * (q + (c.re - 0.25)) <= 0.25 * im2
}

/// Returns `true` if `c` lies inside the period-2 bulb.
#[inline]
pub(crate) fn in_period2_bulb(c: Complex) -> bool {
    (c.re + 1.0) * (c.re + 1.0) + c.im * c.im <= 0.0625
}
