use tracing::debug;

use crate::complex::Complex;
use crate::error::CoreError;
use crate::view::ViewParameters;

/// Turns a zoom request into the next [`ViewParameters`].
///
/// The iteration budget follows a sub-linear growth law so that deep zooms
/// gain detail without per-frame cost exploding:
///
/// ```text
/// growth        = ((1 / factor − 1) / K) + 1
/// new_max_passes = round(old_max_passes × growth)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomTransform {
    /// `K` in the growth law. Larger values slow the budget growth.
    pub growth_constant: f64,
}

impl ZoomTransform {
    pub const DEFAULT_GROWTH_CONSTANT: f64 = 40.0;

    pub fn new(growth_constant: f64) -> crate::Result<Self> {
        if growth_constant <= 0.0 || !growth_constant.is_finite() {
            return Err(CoreError::invalid(format!(
                "growth constant must be positive and finite, got {growth_constant}"
            )));
        }
        Ok(Self { growth_constant })
    }

    /// Zoom around the clicked pixel of a `width × height` canvas.
    ///
    /// `factor = 1` recenters on the pixel, `factor < 1` zooms in and
    /// `factor > 1` zooms out.
    pub fn zoom(
        &self,
        params: &ViewParameters,
        width: u32,
        height: u32,
        pixel_x: f64,
        pixel_y: f64,
        factor: f64,
    ) -> crate::Result<ViewParameters> {
        if width == 0 || height == 0 {
            return Err(CoreError::invalid(format!(
                "canvas must be non-empty, got {width}×{height}"
            )));
        }
        let center = params.pixel_to_complex(width, height, pixel_x, pixel_y);
        self.apply(params, center, factor)
    }

    /// Zoom keeping the current center.
    pub fn zoom_center(
        &self,
        params: &ViewParameters,
        factor: f64,
    ) -> crate::Result<ViewParameters> {
        self.apply(params, params.center(), factor)
    }

    /// The pass budget after zooming by `factor`.
    pub fn scaled_passes(&self, max_passes: u32, factor: f64) -> u32 {
        let growth = ((1.0 / factor - 1.0) / self.growth_constant) + 1.0;
        let scaled = (max_passes as f64 * growth).round();
        // The `as` cast saturates, so only the lower bound needs care.
        (scaled as u32).max(1)
    }

    fn apply(
        &self,
        params: &ViewParameters,
        center: Complex,
        factor: f64,
    ) -> crate::Result<ViewParameters> {
        if factor <= 0.0 || !factor.is_finite() {
            return Err(CoreError::invalid(format!(
                "zoom factor must be positive and finite, got {factor}"
            )));
        }
        let half_width = factor * params.real_span() / 2.0;
        let half_height = factor * params.imag_span() / 2.0;
        let max_passes = self.scaled_passes(params.max_passes(), factor);

        debug!(
            factor,
            center_re = center.re,
            center_im = center.im,
            max_passes,
            "Zoom"
        );

        ViewParameters::from_center(
            center,
            half_width,
            half_height,
            max_passes,
            params.super_sampling_factor(),
        )
    }
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self {
            growth_constant: Self::DEFAULT_GROWTH_CONSTANT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    fn view() -> ViewParameters {
        ViewParameters::new(-2.0, 1.0, -1.5, 1.5, 100, 1).unwrap()
    }

    #[test]
    fn unit_factor_recenters_without_scaling() {
        let v = view();
        let z = ZoomTransform::default()
            .zoom(&v, 300, 300, 200.0, 100.0, 1.0)
            .unwrap();
        assert!((z.real_span() - v.real_span()).abs() < EPSILON);
        assert!((z.imag_span() - v.imag_span()).abs() < EPSILON);
        assert_eq!(z.max_passes(), 100);

        let expected = v.pixel_to_complex(300, 300, 200.0, 100.0);
        assert!((z.center().re - expected.re).abs() < EPSILON);
        assert!((z.center().im - expected.im).abs() < EPSILON);
    }

    #[test]
    fn recentering_then_inverse_recovers_center() {
        let v = view();
        let zt = ZoomTransform::default();
        let original = v.center();

        let moved = zt.zoom(&v, 400, 400, 310.0, 57.0, 1.0).unwrap();
        // Click where the original center now sits.
        let (px, py) = moved.complex_to_pixel(400, 400, original);
        let back = zt.zoom(&moved, 400, 400, px, py, 1.0).unwrap();

        assert!((back.center().re - original.re).abs() < 1e-9);
        assert!((back.center().im - original.im).abs() < 1e-9);
    }

    #[test]
    fn clicking_the_canvas_center_is_a_no_op() {
        let v = view();
        let z = ZoomTransform::default()
            .zoom(&v, 200, 100, 100.0, 50.0, 1.0)
            .unwrap();
        assert!((z.min_real() - v.min_real()).abs() < EPSILON);
        assert!((z.max_imag() - v.max_imag()).abs() < EPSILON);
    }

    #[test]
    fn zoom_in_shrinks_and_grows_budget() {
        let v = view();
        let z = ZoomTransform::default().zoom_center(&v, 0.8).unwrap();
        assert!((z.real_span() - 2.4).abs() < EPSILON);
        assert!((z.imag_span() - 2.4).abs() < EPSILON);
        assert!((z.center().re - v.center().re).abs() < EPSILON);
        // growth = ((1.25 - 1) / 40) + 1 = 1.00625
        assert_eq!(z.max_passes(), 101);
    }

    #[test]
    fn zoom_out_shrinks_budget() {
        let zt = ZoomTransform::default();
        let v = ViewParameters::new(-2.0, 1.0, -1.5, 1.5, 40, 1).unwrap();
        let z = zt.zoom_center(&v, 1000.0).unwrap();
        assert_eq!(z.max_passes(), 39);
        assert!(z.real_span() > v.real_span());
        assert_eq!(zt.scaled_passes(1, 1000.0), 1);
    }

    #[test]
    fn inverted_y_axis() {
        let v = view();
        // Top row of the canvas maps to the top of the imaginary range.
        let z = ZoomTransform::default()
            .zoom(&v, 300, 300, 150.0, 0.0, 1.0)
            .unwrap();
        assert!((z.center().im - 1.5).abs() < EPSILON);
        assert!((z.center().re - Complex::new(-0.5, 0.0).re).abs() < EPSILON);
    }

    #[test]
    fn rejects_bad_factors() {
        let zt = ZoomTransform::default();
        let v = view();
        assert!(zt.zoom_center(&v, 0.0).is_err());
        assert!(zt.zoom_center(&v, -1.0).is_err());
        assert!(zt.zoom_center(&v, f64::NAN).is_err());
        assert!(zt.zoom(&v, 0, 10, 0.0, 0.0, 0.5).is_err());
        assert!(ZoomTransform::new(0.0).is_err());
    }

    #[test]
    fn keeps_sampling_factor() {
        let v = view().with_super_sampling(3).unwrap();
        let z = ZoomTransform::default().zoom_center(&v, 0.9).unwrap();
        assert_eq!(z.super_sampling_factor(), 3);
    }
}
