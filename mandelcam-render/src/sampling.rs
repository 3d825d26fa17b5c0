//! Supersampled evaluation of a single pixel.

use tracing::warn;

use mandelcam_core::{Complex, EscapeTime, IN_SET};

use crate::error::RenderError;
use crate::palette::{Color, ColorPalette, FastStorage};
use crate::tile::Tile;

/// Color of one pixel plus its classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub color: Color,
    /// Every sub-sample exhausted the pass budget.
    pub interior: bool,
}

/// Evaluates pixels of one tile. Owned by a single tile task.
pub struct PixelSampler<'a, F: ?Sized> {
    fractal: &'a F,
    palette: &'a dyn ColorPalette,
    /// Top-left corner of the tile on the complex plane.
    origin: Complex,
    /// Size of a pixel on the complex plane.
    step: (f64, f64),
    max_passes: u32,
    factor: u32,
    /// Task-local fast storage built after a cache miss.
    rebuilt: Option<FastStorage>,
}

impl<'a, F: EscapeTime + ?Sized> PixelSampler<'a, F> {
    pub fn new(fractal: &'a F, palette: &'a dyn ColorPalette, tile: &Tile) -> Self {
        let view = &tile.view;
        Self {
            fractal,
            palette,
            origin: Complex::new(view.min_real(), view.max_imag()),
            step: view.pixel_step(tile.width, tile.height),
            max_passes: view.max_passes(),
            factor: view.super_sampling_factor() as u32,
            rebuilt: None,
        }
    }

    /// Evaluate the tile-local pixel `(px, py)`.
    ///
    /// Samples an `s × s` grid centered in the sub-cells of the pixel and
    /// averages the sampled colors channel by channel. The divisor is the
    /// number of samples actually taken.
    pub fn sample(&mut self, px: u32, py: u32) -> crate::Result<Sample> {
        let (dx, dy) = self.step;
        let s = self.factor as f64;
        let left = self.origin.re + px as f64 * dx;
        let top = self.origin.im - py as f64 * dy;

        let mut sums = [0u32; 3];
        let mut count = 0u32;
        let mut interior = true;

        for sy in 0..self.factor {
            let im = top - (sy as f64 + 0.5) * dy / s;
            for sx in 0..self.factor {
                let re = left + (sx as f64 + 0.5) * dx / s;
                let passes = self.fractal.escape(Complex::new(re, im), self.max_passes);
                if passes != IN_SET {
                    interior = false;
                }
                let c = self.color(passes)?;
                sums[0] += c[0] as u32;
                sums[1] += c[1] as u32;
                sums[2] += c[2] as u32;
                count += 1;
            }
        }

        let average = |sum: u32| ((sum + count / 2) / count) as u8;
        Ok(Sample {
            color: [average(sums[0]), average(sums[1]), average(sums[2]), 255],
            interior,
        })
    }

    /// Color from the fast storage. A miss rebuilds a task-local copy once;
    /// a miss against the rebuilt copy is returned as an error.
    fn color(&mut self, passes: i32) -> crate::Result<Color> {
        if let Some(rebuilt) = &self.rebuilt {
            return self.lookup_rebuilt(rebuilt, passes);
        }
        match self.palette.lookup(passes) {
            Ok(color) => Ok(color),
            Err(RenderError::PaletteCacheMiss { len, .. }) => {
                warn!(
                    palette = %self.palette.name(),
                    passes,
                    cached = len,
                    "Palette cache miss, rebuilding locally"
                );
                let rebuilt = FastStorage::build(self.palette);
                let color = self.lookup_rebuilt(&rebuilt, passes);
                self.rebuilt = Some(rebuilt);
                color
            }
            Err(e) => Err(e),
        }
    }

    fn lookup_rebuilt(&self, storage: &FastStorage, passes: i32) -> crate::Result<Color> {
        if passes < 0 {
            return Ok(self.palette.in_set_color());
        }
        storage
            .get(passes as u32, self.palette.period())
            .ok_or_else(|| RenderError::PaletteCacheMiss {
                passes,
                len: storage.len(),
            })
    }
}
