use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use mandelcam_core::{EscapeTime, ViewParameters};

use crate::buffer::RenderBuffer;
use crate::error::RenderError;
use crate::no_holes;
use crate::palette::{Color, ColorPalette, BLACK};
use crate::sampling::PixelSampler;
use crate::tile::{partition, Tile};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How each tile is filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillStrategy {
    /// Evaluate every pixel.
    #[default]
    Scan,
    /// Walk the exterior from the tile border and fill the rest with the
    /// in-set color. Only honoured for fractals without interior holes.
    NoHoles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererOptions {
    /// Worker threads; `0` uses the available parallelism.
    pub threads: usize,
    /// Tiles scheduled per worker thread.
    pub oversubscription: usize,
    pub fill: FillStrategy,
}

impl RendererOptions {
    pub const DEFAULT_OVERSUBSCRIPTION: usize = 4;

    /// Thread count with `0` resolved.
    pub fn resolved_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        }
    }
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            oversubscription: Self::DEFAULT_OVERSUBSCRIPTION,
            fill: FillStrategy::Scan,
        }
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag plus tile progress for one render.
///
/// Once cancelled, a token stays cancelled; start a new render with a new
/// token.
#[derive(Debug)]
pub struct RenderCancel {
    cancelled: AtomicBool,
    progress_done: AtomicUsize,
    progress_total: AtomicUsize,
}

impl RenderCancel {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            progress_done: AtomicUsize::new(0),
            progress_total: AtomicUsize::new(0),
        }
    }

    /// Ask every in-flight tile to stop early.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Reset progress for a new render with `total` tiles.
    pub fn reset_progress(&self, total: usize) {
        self.progress_total.store(total, Ordering::Relaxed);
        self.progress_done.store(0, Ordering::Relaxed);
    }

    /// Increment completed tiles by one.
    pub fn inc_progress(&self) {
        self.progress_done.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the current progress as `(done, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.progress_done.load(Ordering::Relaxed),
            self.progress_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for RenderCancel {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Result and job handle
// ---------------------------------------------------------------------------

/// The result of a full-frame render.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub buffer: RenderBuffer,
    pub params: ViewParameters,
    pub elapsed: Duration,
    pub cancelled: bool,
    pub tiles_completed: usize,
    /// Tiles whose task failed; their pixels stay black.
    pub tiles_failed: usize,
    /// Completed tiles that used the no-holes fill.
    pub tiles_no_holes: usize,
}

/// Handle to a render running on the renderer's pool.
#[derive(Debug)]
pub struct RenderJob {
    cancel: Arc<RenderCancel>,
    rx: mpsc::Receiver<RenderResult>,
}

impl RenderJob {
    /// Block until every tile has finished (or stopped) and the buffer is
    /// composited.
    pub fn wait(self) -> crate::Result<RenderResult> {
        self.rx.recv().map_err(|_| RenderError::WorkerLost)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> Arc<RenderCancel> {
        Arc::clone(&self.cancel)
    }

    /// `(done, total)` tiles.
    pub fn progress(&self) -> (usize, usize) {
        self.cancel.progress()
    }
}

// ---------------------------------------------------------------------------
// Per-tile work
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileStatus {
    Complete,
    Cancelled,
    Failed,
}

struct TileOutcome {
    pixels: Vec<Color>,
    status: TileStatus,
}

/// Row-major scan; the cancellation flag is polled once per row.
fn scan_tile<F: EscapeTime + ?Sized>(
    sampler: &mut PixelSampler<'_, F>,
    tile: &Tile,
    cancel: &RenderCancel,
    pixels: &mut [Color],
) -> crate::Result<bool> {
    let width = tile.width as usize;
    for (py, row) in pixels.chunks_exact_mut(width).enumerate() {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        for (px, pixel) in row.iter_mut().enumerate() {
            *pixel = sampler.sample(px as u32, py as u32)?.color;
        }
    }
    Ok(true)
}

fn render_tile<F: EscapeTime + ?Sized>(
    fractal: &F,
    palette: &dyn ColorPalette,
    tile: &Tile,
    fill: FillStrategy,
    cancel: &RenderCancel,
) -> TileOutcome {
    let mut pixels = vec![BLACK; tile.pixel_count()];
    if cancel.is_cancelled() {
        return TileOutcome {
            pixels,
            status: TileStatus::Cancelled,
        };
    }

    let mut sampler = PixelSampler::new(fractal, palette, tile);
    let filled = match fill {
        FillStrategy::Scan => scan_tile(&mut sampler, tile, cancel, &mut pixels),
        FillStrategy::NoHoles => no_holes::fill_tile(
            &mut sampler,
            tile,
            palette.in_set_color(),
            cancel,
            &mut pixels,
        ),
    };

    let status = match filled {
        Ok(true) => {
            cancel.inc_progress();
            TileStatus::Complete
        }
        Ok(false) => TileStatus::Cancelled,
        Err(e) => {
            warn!(x = tile.x, y = tile.y, error = %e, "Tile failed, leaving it black");
            pixels.fill(BLACK);
            TileStatus::Failed
        }
    };
    TileOutcome { pixels, status }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Multithreaded tiled renderer.
///
/// Generic over the fractal for static dispatch in the per-pixel loop.
/// Every renderer owns its Rayon pool, so concurrent renderers do not
/// compete for the global pool.
pub struct TiledRenderer<F> {
    fractal: Arc<F>,
    palette: Arc<dyn ColorPalette>,
    pool: Arc<rayon::ThreadPool>,
    options: RendererOptions,
}

impl<F: EscapeTime + Send + Sync + 'static> TiledRenderer<F> {
    pub fn new(
        fractal: F,
        palette: Arc<dyn ColorPalette>,
        options: RendererOptions,
    ) -> crate::Result<Self> {
        let threads = options.resolved_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mandelcam-tile-{i}"))
            .panic_handler(|_| error!("Render job panicked; its result is lost"))
            .build()
            .map_err(|e| RenderError::ThreadPool(e.to_string()))?;
        debug!(
            threads,
            oversubscription = options.oversubscription,
            fill = ?options.fill,
            fractal = fractal.name(),
            "Renderer ready"
        );
        Ok(Self {
            fractal: Arc::new(fractal),
            palette,
            pool: Arc::new(pool),
            options,
        })
    }

    pub fn fractal(&self) -> &F {
        &self.fractal
    }

    pub fn palette(&self) -> &Arc<dyn ColorPalette> {
        &self.palette
    }

    /// Swap the palette for subsequent renders. Jobs already running keep
    /// the palette they started with.
    pub fn set_palette(&mut self, palette: Arc<dyn ColorPalette>) {
        self.palette = palette;
    }

    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Start rendering `params` into a `width × height` buffer.
    ///
    /// Invalid input is reported here, before anything is scheduled; the
    /// returned job runs in the background.
    pub fn render(
        &self,
        params: ViewParameters,
        width: u32,
        height: u32,
    ) -> crate::Result<RenderJob> {
        self.render_with_cancel(params, width, height, Arc::new(RenderCancel::new()))
    }

    /// Like [`render`](Self::render) with a caller-supplied cancellation
    /// token.
    pub fn render_with_cancel(
        &self,
        params: ViewParameters,
        width: u32,
        height: u32,
        cancel: Arc<RenderCancel>,
    ) -> crate::Result<RenderJob> {
        params.validate()?;
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }

        let fill = self.effective_fill();
        let target = self.threads() * self.options.oversubscription.max(1);
        let tiles = partition(&params, width, height, target);
        cancel.reset_progress(tiles.len());
        debug!(
            tile_count = tiles.len(),
            width,
            height,
            max_passes = params.max_passes(),
            "Scheduling tiled render"
        );

        let (tx, rx) = mpsc::channel();
        let fractal = Arc::clone(&self.fractal);
        let palette = Arc::clone(&self.palette);
        let job_cancel = Arc::clone(&cancel);
        self.pool.spawn(move || {
            let result = run_job(
                &*fractal,
                &*palette,
                params,
                width,
                height,
                &tiles,
                fill,
                &job_cancel,
            );
            // The receiver may have been dropped by a caller that lost
            // interest; nothing to do then.
            let _ = tx.send(result);
        });

        Ok(RenderJob { cancel, rx })
    }

    fn effective_fill(&self) -> FillStrategy {
        match self.options.fill {
            FillStrategy::NoHoles if !self.fractal.supports_no_holes() => {
                warn!(
                    fractal = self.fractal.name(),
                    "No-holes fill is not valid for this fractal, scanning every pixel"
                );
                FillStrategy::Scan
            }
            fill => fill,
        }
    }
}

/// Render every tile on the current pool and composite the results.
#[allow(clippy::too_many_arguments)]
fn run_job<F: EscapeTime + Sync + ?Sized>(
    fractal: &F,
    palette: &dyn ColorPalette,
    params: ViewParameters,
    width: u32,
    height: u32,
    tiles: &[Tile],
    fill: FillStrategy,
    cancel: &RenderCancel,
) -> RenderResult {
    let start = Instant::now();

    let outcomes: Vec<TileOutcome> = tiles
        .par_iter()
        .map(|tile| {
            panic::catch_unwind(AssertUnwindSafe(|| {
                render_tile(fractal, palette, tile, fill, cancel)
            }))
            .unwrap_or_else(|_| {
                warn!(x = tile.x, y = tile.y, "Tile task panicked, leaving it black");
                TileOutcome {
                    pixels: vec![BLACK; tile.pixel_count()],
                    status: TileStatus::Failed,
                }
            })
        })
        .collect();

    let mut buffer = RenderBuffer::new(width, height);
    let mut tiles_completed = 0;
    let mut tiles_failed = 0;
    let mut any_cancelled = false;
    for (tile, outcome) in tiles.iter().zip(&outcomes) {
        buffer.blit_tile(tile, &outcome.pixels);
        match outcome.status {
            TileStatus::Complete => tiles_completed += 1,
            TileStatus::Failed => tiles_failed += 1,
            TileStatus::Cancelled => any_cancelled = true,
        }
    }
    let tiles_no_holes = if fill == FillStrategy::NoHoles {
        tiles_completed
    } else {
        0
    };
    let cancelled = any_cancelled || cancel.is_cancelled();

    let elapsed = start.elapsed();
    info!(
        elapsed_ms = elapsed.as_millis(),
        tiles_completed, tiles_failed, tiles_no_holes, cancelled, "Render complete"
    );

    RenderResult {
        buffer,
        params,
        elapsed,
        cancelled,
        tiles_completed,
        tiles_failed,
        tiles_no_holes,
    }
}
