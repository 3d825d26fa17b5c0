use serde::Serialize;

use crate::complex::Complex;
use crate::error::CoreError;

/// The region of the complex plane being looked at, plus the iteration
/// budget and supersampling factor used to render it.
///
/// This is a value type: every constructor validates, and every change
/// produces a new value. Invariants:
///
/// * all bounds finite, `max_real > min_real`, `max_imag > min_imag`
/// * `max_passes >= 1`
/// * `super_sampling_factor >= 1`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewParameters {
    min_real: f64,
    max_real: f64,
    min_imag: f64,
    max_imag: f64,
    max_passes: u32,
    super_sampling_factor: u8,
}

/// Re-validates on load so a hand-edited file cannot smuggle in an
/// inverted rectangle.
impl<'de> serde::Deserialize<'de> for ViewParameters {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        struct Raw {
            min_real: f64,
            max_real: f64,
            min_imag: f64,
            max_imag: f64,
            #[serde(default = "default_max_passes")]
            max_passes: u32,
            #[serde(default = "default_super_sampling")]
            super_sampling_factor: u8,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(
            raw.min_real,
            raw.max_real,
            raw.min_imag,
            raw.max_imag,
            raw.max_passes,
            raw.super_sampling_factor,
        )
        .map_err(serde::de::Error::custom)
    }
}

fn default_max_passes() -> u32 {
    ViewParameters::DEFAULT_MAX_PASSES
}

fn default_super_sampling() -> u8 {
    1
}

impl ViewParameters {
    pub const DEFAULT_MAX_PASSES: u32 = 256;

    pub fn new(
        min_real: f64,
        max_real: f64,
        min_imag: f64,
        max_imag: f64,
        max_passes: u32,
        super_sampling_factor: u8,
    ) -> crate::Result<Self> {
        let params = Self {
            min_real,
            max_real,
            min_imag,
            max_imag,
            max_passes,
            super_sampling_factor,
        };
        params.validate()?;
        Ok(params)
    }

    /// Build a view from its center and half extents.
    pub fn from_center(
        center: Complex,
        half_width: f64,
        half_height: f64,
        max_passes: u32,
        super_sampling_factor: u8,
    ) -> crate::Result<Self> {
        Self::new(
            center.re - half_width,
            center.re + half_width,
            center.im - half_height,
            center.im + half_height,
            max_passes,
            super_sampling_factor,
        )
    }

    /// The whole Mandelbrot set: `[-2, 1] × [-1.5, 1.5]`.
    pub fn default_mandelbrot() -> Self {
        Self {
            min_real: -2.0,
            max_real: 1.0,
            min_imag: -1.5,
            max_imag: 1.5,
            max_passes: Self::DEFAULT_MAX_PASSES,
            super_sampling_factor: 1,
        }
    }

    /// Julia sets for the usual parameters fit inside `|z| < 2`.
    pub fn default_julia() -> Self {
        Self {
            min_real: -2.0,
            max_real: 2.0,
            min_imag: -2.0,
            max_imag: 2.0,
            max_passes: Self::DEFAULT_MAX_PASSES,
            super_sampling_factor: 1,
        }
    }

    /// Check every invariant listed on the type.
    pub fn validate(&self) -> crate::Result<()> {
        let bounds = [self.min_real, self.max_real, self.min_imag, self.max_imag];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(CoreError::invalid(format!(
                "bounds must be finite, got re [{}, {}] im [{}, {}]",
                self.min_real, self.max_real, self.min_imag, self.max_imag
            )));
        }
        if self.max_real <= self.min_real {
            return Err(CoreError::invalid(format!(
                "real bounds inverted: min {} >= max {}",
                self.min_real, self.max_real
            )));
        }
        if self.max_imag <= self.min_imag {
            return Err(CoreError::invalid(format!(
                "imaginary bounds inverted: min {} >= max {}",
                self.min_imag, self.max_imag
            )));
        }
        if self.max_passes < 1 {
            return Err(CoreError::invalid("max passes must be >= 1"));
        }
        if self.super_sampling_factor < 1 {
            return Err(CoreError::invalid("super sampling factor must be >= 1"));
        }
        Ok(())
    }

    #[inline]
    pub fn min_real(&self) -> f64 {
        self.min_real
    }

    #[inline]
    pub fn max_real(&self) -> f64 {
        self.max_real
    }

    #[inline]
    pub fn min_imag(&self) -> f64 {
        self.min_imag
    }

    #[inline]
    pub fn max_imag(&self) -> f64 {
        self.max_imag
    }

    #[inline]
    pub fn max_passes(&self) -> u32 {
        self.max_passes
    }

    #[inline]
    pub fn super_sampling_factor(&self) -> u8 {
        self.super_sampling_factor
    }

    pub fn real_span(&self) -> f64 {
        self.max_real - self.min_real
    }

    pub fn imag_span(&self) -> f64 {
        self.max_imag - self.min_imag
    }

    pub fn center(&self) -> Complex {
        Complex::new(
            (self.min_real + self.max_real) / 2.0,
            (self.min_imag + self.max_imag) / 2.0,
        )
    }

    /// Return a copy with a different pass budget.
    pub fn with_max_passes(self, max_passes: u32) -> crate::Result<Self> {
        Self::new(
            self.min_real,
            self.max_real,
            self.min_imag,
            self.max_imag,
            max_passes,
            self.super_sampling_factor,
        )
    }

    /// Return a copy with a different supersampling factor.
    pub fn with_super_sampling(self, super_sampling_factor: u8) -> crate::Result<Self> {
        Self::new(
            self.min_real,
            self.max_real,
            self.min_imag,
            self.max_imag,
            self.max_passes,
            super_sampling_factor,
        )
    }

    /// Complex-plane size of one pixel on a `width × height` canvas.
    #[inline]
    pub fn pixel_step(&self, width: u32, height: u32) -> (f64, f64) {
        (
            self.real_span() / width as f64,
            self.imag_span() / height as f64,
        )
    }

    /// Map (possibly fractional) pixel coordinates to the complex plane.
    ///
    /// `(0, 0)` is the top-left corner of the canvas and maps to
    /// `(min_real, max_imag)`: pixel y grows downward while the imaginary
    /// axis grows upward.
    #[inline]
    pub fn pixel_to_complex(&self, width: u32, height: u32, px: f64, py: f64) -> Complex {
        let (dx, dy) = self.pixel_step(width, height);
        Complex::new(self.min_real + px * dx, self.max_imag - py * dy)
    }

    /// Inverse of [`pixel_to_complex`](Self::pixel_to_complex).
    #[inline]
    pub fn complex_to_pixel(&self, width: u32, height: u32, point: Complex) -> (f64, f64) {
        let (dx, dy) = self.pixel_step(width, height);
        ((point.re - self.min_real) / dx, (self.max_imag - point.im) / dy)
    }

    /// Bounds of the pixel rectangle `(x, y, w, h)` of a `width × height`
    /// canvas, found by linear interpolation over this view.
    ///
    /// The result keeps the pass budget and sampling factor. `w` and `h`
    /// must be non-zero.
    pub fn sub_view(&self, width: u32, height: u32, x: u32, y: u32, w: u32, h: u32) -> Self {
        debug_assert!(w > 0 && h > 0, "sub view of an empty rectangle");
        let (dx, dy) = self.pixel_step(width, height);
        Self {
            min_real: self.min_real + x as f64 * dx,
            max_real: self.min_real + (x + w) as f64 * dx,
            min_imag: self.max_imag - (y + h) as f64 * dy,
            max_imag: self.max_imag - y as f64 * dy,
            max_passes: self.max_passes,
            super_sampling_factor: self.super_sampling_factor,
        }
    }
}

impl Default for ViewParameters {
    fn default() -> Self {
        Self::default_mandelbrot()
    }
}
