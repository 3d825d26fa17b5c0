use crate::complex::Complex;
use crate::escape::{in_cardioid, in_period2_bulb, iterate_quadratic, EscapeTime};

/// A Julia set: `z_{n+1} = z_n² + c`, where `c` is a fixed constant
/// and `z₀` is the point on the complex plane.
#[derive(Debug, Clone, Copy)]
pub struct Julia {
    /// The fixed constant `c` that defines this Julia set.
    c: Complex,
}

impl Julia {
    pub fn new(c: Complex) -> Self {
        Self { c }
    }

    /// A visually interesting default: `c = -0.7 + 0.27015i`.
    pub fn default_c() -> Complex {
        Complex::new(-0.7, 0.27015)
    }

    pub fn c(&self) -> Complex {
        self.c
    }
}

impl Default for Julia {
    fn default() -> Self {
        Self::new(Self::default_c())
    }
}

impl EscapeTime for Julia {
    #[inline]
    fn escape(&self, point: Complex, max_passes: u32) -> i32 {
        iterate_quadratic(point, self.c, max_passes)
    }

    fn name(&self) -> &'static str {
        "julia"
    }

    /// Only claimed where `c` is inside one of the two closed-form
    /// hyperbolic components: there the filled Julia set is a solid
    /// quasi-disc. Elsewhere (dendrites, dust) thin filaments break the
    /// pixel-level connectivity the fill depends on.
    fn supports_no_holes(&self) -> bool {
        in_cardioid(self.c) || in_period2_bulb(self.c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::IN_SET;

    #[test]
    fn c_zero_is_the_unit_disc() {
        let j = Julia::new(Complex::ZERO);
        assert_eq!(j.escape(Complex::new(0.5, 0.5), 200), IN_SET);
        assert!(j.escape(Complex::new(1.5, 0.0), 200) > 0);
    }

    #[test]
    fn far_point_escapes() {
        assert_eq!(Julia::default().escape(Complex::new(10.0, 0.0), 100), 1);
    }

    #[test]
    fn deterministic_results() {
        let j = Julia::default();
        let points = [
            Complex::new(0.0, 0.0),
            Complex::new(0.5, 0.5),
            Complex::new(-1.0, 0.3),
        ];
        let run1: Vec<_> = points.iter().map(|&p| j.escape(p, 300)).collect();
        let run2: Vec<_> = points.iter().map(|&p| j.escape(p, 300)).collect();
        assert_eq!(run1, run2);
    }

    #[test]
    fn no_holes_support_follows_c() {
        assert!(Julia::new(Complex::ZERO).supports_no_holes());
        assert!(Julia::new(Complex::new(-1.0, 0.1)).supports_no_holes());
        // Douady rabbit parameter lies in a period-3 bulb.
        assert!(!Julia::new(Complex::new(-0.123, 0.745)).supports_no_holes());
    }
}
