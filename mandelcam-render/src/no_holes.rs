//! Boundary-walking tile fill for sets without interior holes.
//!
//! Starting from the tile border, the fill walks through exterior pixels
//! only. Interior pixels stop the walk, and whatever the walk never reaches
//! is painted with the in-set color without being evaluated.
//!
//! Connectivity is judged at pixel resolution through 4-neighbours. Near
//! filaments thinner than a pixel an exterior region can be cut off from
//! the border by sampled interior pixels; such a region is painted as
//! interior and differs from a full scan. Every pixel the walk evaluates
//! has exactly the scanned color.

use crate::palette::Color;
use crate::renderer::RenderCancel;
use crate::sampling::PixelSampler;
use crate::tile::Tile;

use mandelcam_core::EscapeTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelState {
    Unvisited,
    Interior,
    Exterior,
}

/// Neighbour offsets in walk order: up, right, left, down.
const NEIGHBOURS: [(i64, i64); 4] = [(0, -1), (1, 0), (-1, 0), (0, 1)];

struct Walk<'s, 'a, F: ?Sized> {
    sampler: &'s mut PixelSampler<'a, F>,
    width: u32,
    height: u32,
    states: Vec<PixelState>,
    evaluations: u64,
}

impl<F: EscapeTime + ?Sized> Walk<'_, '_, F> {
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn visited(&self, x: u32, y: u32) -> bool {
        self.states[self.index(x, y)] != PixelState::Unvisited
    }

    /// Evaluate one pixel, record its class and color. Returns `true` when
    /// the pixel is exterior.
    fn visit(&mut self, x: u32, y: u32, pixels: &mut [Color]) -> crate::Result<bool> {
        let sample = self.sampler.sample(x, y)?;
        let i = self.index(x, y);
        pixels[i] = sample.color;
        self.states[i] = if sample.interior {
            PixelState::Interior
        } else {
            PixelState::Exterior
        };
        self.evaluations += 1;
        Ok(!sample.interior)
    }

    fn unvisited_neighbour(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        NEIGHBOURS.iter().find_map(|&(dx, dy)| {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
                return None;
            }
            let (nx, ny) = (nx as u32, ny as u32);
            (!self.visited(nx, ny)).then_some((nx, ny))
        })
    }
}

/// Border pixels of a `width × height` tile, each listed once.
fn border(width: u32, height: u32) -> Vec<(u32, u32)> {
    let mut points = Vec::with_capacity(2 * (width + height) as usize);
    for x in 0..width {
        points.push((x, 0));
        if height > 1 {
            points.push((x, height - 1));
        }
    }
    for y in 1..height.saturating_sub(1) {
        points.push((0, y));
        if width > 1 {
            points.push((width - 1, y));
        }
    }
    points
}

/// Fill `pixels` (row-major, tile-local) for `tile`.
///
/// Returns `Ok(false)` when cancelled. A cancelled fill skips the in-set
/// fill, so pixels the walk had not reached keep their previous content.
pub fn fill_tile<F: EscapeTime + ?Sized>(
    sampler: &mut PixelSampler<'_, F>,
    tile: &Tile,
    in_set: Color,
    cancel: &RenderCancel,
    pixels: &mut [Color],
) -> crate::Result<bool> {
    debug_assert_eq!(pixels.len(), tile.pixel_count());
    let check_every = u64::from(tile.width.max(1));

    let mut walk = Walk {
        sampler,
        width: tile.width,
        height: tile.height,
        states: vec![PixelState::Unvisited; tile.pixel_count()],
        evaluations: 0,
    };
    let mut frontier = border(tile.width, tile.height);
    let mut backtrack: Vec<(u32, u32)> = Vec::new();
    let mut next_check = 0;

    let mut cancelled = |evaluations: u64| {
        if evaluations < next_check {
            return false;
        }
        next_check = evaluations + check_every;
        cancel.is_cancelled()
    };

    while let Some((x, y)) = frontier.pop() {
        if cancelled(walk.evaluations) {
            return Ok(false);
        }
        if walk.visited(x, y) {
            continue;
        }
        if !walk.visit(x, y, pixels)? {
            continue;
        }

        let mut current = (x, y);
        loop {
            if cancelled(walk.evaluations) {
                return Ok(false);
            }
            match walk.unvisited_neighbour(current.0, current.1) {
                Some(next) => {
                    if walk.visit(next.0, next.1, pixels)? {
                        backtrack.push(current);
                        current = next;
                    }
                }
                None => match backtrack.pop() {
                    Some(previous) => current = previous,
                    None => break,
                },
            }
        }
    }

    for (state, pixel) in walk.states.iter().zip(pixels.iter_mut()) {
        if *state == PixelState::Unvisited {
            *pixel = in_set;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{ColorPalette, LinearGradient, BLACK};
    use mandelcam_core::{Complex, Julia, Mandelbrot, ViewParameters, IN_SET};

    fn scan<F: EscapeTime>(fractal: &F, palette: &dyn ColorPalette, tile: &Tile) -> Vec<Color> {
        let mut sampler = PixelSampler::new(fractal, palette, tile);
        let mut out = Vec::with_capacity(tile.pixel_count());
        for y in 0..tile.height {
            for x in 0..tile.width {
                out.push(sampler.sample(x, y).unwrap().color);
            }
        }
        out
    }

    fn no_holes<F: EscapeTime>(
        fractal: &F,
        palette: &dyn ColorPalette,
        tile: &Tile,
    ) -> (Vec<Color>, bool) {
        let mut sampler = PixelSampler::new(fractal, palette, tile);
        let mut out = vec![BLACK; tile.pixel_count()];
        let cancel = RenderCancel::new();
        let done = fill_tile(&mut sampler, tile, palette.in_set_color(), &cancel, &mut out).unwrap();
        (out, done)
    }

    fn whole(view: ViewParameters, width: u32, height: u32) -> Tile {
        Tile {
            x: 0,
            y: 0,
            width,
            height,
            view,
        }
    }

    #[test]
    fn border_lists_each_pixel_once() {
        let b = border(5, 4);
        assert_eq!(b.len(), 14);
        let mut sorted = b.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), b.len());

        assert_eq!(border(1, 1), vec![(0, 0)]);
        assert_eq!(border(3, 1).len(), 3);
        assert_eq!(border(1, 3).len(), 3);
    }

    #[test]
    fn matches_scan_for_julia_disk() {
        // c = 0: the filled Julia set is the closed unit disk.
        let julia = Julia::new(Complex::ZERO);
        let view = ViewParameters::new(-1.5, 1.5, -1.5, 1.5, 40, 1).unwrap();
        let tile = whole(view, 48, 48);
        let palette = LinearGradient::default();

        let (filled, done) = no_holes(&julia, &palette, &tile);
        assert!(done);
        assert_eq!(filled, scan(&julia, &palette, &tile));
    }

    #[test]
    fn matches_scan_for_mandelbrot() {
        let view = ViewParameters::new(-2.0, 1.0, -1.5, 1.5, 32, 1).unwrap();
        let tile = whole(view, 64, 64);
        let palette = LinearGradient::default();

        let (filled, done) = no_holes(&Mandelbrot, &palette, &tile);
        assert!(done);
        assert_eq!(filled, scan(&Mandelbrot, &palette, &tile));
    }

    #[test]
    fn deep_view_only_differs_by_unreached_pixels() {
        let view =
            ViewParameters::from_center(Complex::new(-0.7436, 0.1318), 0.01, 0.01, 500, 1).unwrap();
        let tile = whole(view, 100, 100);
        let palette = LinearGradient::default();

        let (filled, done) = no_holes(&Mandelbrot, &palette, &tile);
        assert!(done);
        let scanned = scan(&Mandelbrot, &palette, &tile);
        for (i, (got, want)) in filled.iter().zip(&scanned).enumerate() {
            assert!(
                got == want || *got == palette.in_set_color(),
                "pixel {i}: {got:?} is neither the scanned color nor the in-set color"
            );
        }
    }

    /// Counts evaluations so the saving can be observed.
    struct Counting<'a> {
        inner: Mandelbrot,
        calls: &'a std::sync::atomic::AtomicUsize,
    }

    impl EscapeTime for Counting<'_> {
        fn escape(&self, point: Complex, max_passes: u32) -> i32 {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.inner.escape(point, max_passes)
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn interior_is_filled_without_evaluation() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        // Entirely inside the main cardioid.
        let view = ViewParameters::new(-0.4, 0.1, -0.25, 0.25, 100, 1).unwrap();
        let tile = whole(view, 50, 50);
        let palette = LinearGradient::default();
        let calls = AtomicUsize::new(0);
        let fractal = Counting {
            inner: Mandelbrot,
            calls: &calls,
        };

        let (filled, done) = no_holes(&fractal, &palette, &tile);
        assert!(done);
        assert!(calls.load(Ordering::Relaxed) < tile.pixel_count());
        assert!(filled.iter().all(|&c| c == palette.in_set_color()));
        assert_eq!(Mandelbrot.escape(view.center(), 100), IN_SET);
    }

    #[test]
    fn cancelled_fill_skips_in_set_fill() {
        let view = ViewParameters::new(-2.0, 1.0, -1.5, 1.5, 32, 1).unwrap();
        let tile = whole(view, 32, 32);
        let palette = LinearGradient::new(
            crate::palette::rgb(200, 0, 0),
            crate::palette::rgb(200, 0, 0),
            1,
            crate::palette::rgb(0, 0, 200),
        )
        .unwrap();
        let cancel = RenderCancel::new();
        cancel.cancel();

        let mut sampler = PixelSampler::new(&Mandelbrot, &palette, &tile);
        let mut out = vec![BLACK; tile.pixel_count()];
        let done = fill_tile(&mut sampler, &tile, palette.in_set_color(), &cancel, &mut out).unwrap();
        assert!(!done);
        let untouched = out.iter().filter(|&&c| c == BLACK).count();
        assert_eq!(untouched, tile.pixel_count());
    }
}
