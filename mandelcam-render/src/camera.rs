//! Zoom films: a producer thread renders successive frames, a consumer
//! thread hands them to every output, and a monitor thread collects the
//! outcome.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use mandelcam_core::{CoreError, EscapeTime, ViewParameters, ZoomTransform};

use crate::buffer::RenderBuffer;
use crate::error::RenderError;
use crate::output::Output;
use crate::renderer::{RenderCancel, TiledRenderer};

/// One rendered frame of a film.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the film, starting at 0.
    pub index: u64,
    pub params: ViewParameters,
    pub image: RenderBuffer,
}

/// Number of frames needed to zoom by `target_zoom_factor` when each frame
/// zooms by `per_frame_factor`.
///
/// Factors above 1 zoom in, below 1 zoom out. Both must point the same way.
pub fn frame_count(target_zoom_factor: f64, per_frame_factor: f64) -> crate::Result<u64> {
    for (what, f) in [("target", target_zoom_factor), ("per-frame", per_frame_factor)] {
        if !f.is_finite() || f <= 0.0 || f == 1.0 {
            return Err(CoreError::InvalidParameters {
                reason: format!("{what} zoom factor must be finite, positive and not 1, got {f}"),
            }
            .into());
        }
    }
    if (target_zoom_factor > 1.0) != (per_frame_factor > 1.0) {
        return Err(CoreError::InvalidParameters {
            reason: format!(
                "zoom factors point in opposite directions: target {target_zoom_factor}, per frame {per_frame_factor}"
            ),
        }
        .into());
    }
    let exact = target_zoom_factor.ln() / per_frame_factor.ln();
    // Absorb rounding noise so exact powers do not gain a frame.
    Ok(((exact - 1e-9).ceil() as u64).max(1))
}

/// Summary of a finished film.
#[derive(Debug)]
pub struct FilmReport {
    pub frames_planned: u64,
    pub frames_produced: u64,
    pub frames_delivered: u64,
    pub write_failures: u64,
    pub cancelled: bool,
    /// Why production stopped early, if it failed.
    pub failure: Option<RenderError>,
}

impl FilmReport {
    /// Every planned frame reached every output.
    pub fn is_complete(&self) -> bool {
        !self.cancelled
            && self.failure.is_none()
            && self.write_failures == 0
            && self.frames_delivered == self.frames_planned
    }
}

#[derive(Debug)]
struct FilmState {
    cancel: Arc<RenderCancel>,
    remaining: AtomicU64,
    production_finished: AtomicBool,
    finished: AtomicBool,
}

/// Handle to a film in progress.
pub struct FilmHandle {
    state: Arc<FilmState>,
    report_rx: mpsc::Receiver<FilmReport>,
    monitor: JoinHandle<()>,
}

impl FilmHandle {
    /// Stop producing frames. The frame being rendered is cut short and
    /// still delivered, as are frames already queued.
    pub fn cancel(&self) {
        self.state.cancel.cancel();
    }

    /// Frames not yet produced.
    pub fn frames_remaining(&self) -> u64 {
        self.state.remaining.load(Ordering::Relaxed)
    }

    pub fn is_production_finished(&self) -> bool {
        self.state.production_finished.load(Ordering::Acquire)
    }

    /// All frames have been delivered (or the film was cancelled) and the
    /// report is ready.
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }

    /// Block until the film is done.
    pub fn wait(self) -> crate::Result<FilmReport> {
        let report = self.report_rx.recv().map_err(|_| RenderError::WorkerLost)?;
        self.monitor.join().map_err(|_| RenderError::WorkerLost)?;
        Ok(report)
    }
}

/// Drives a renderer through a zoom sequence.
pub struct CameraPipeline<F> {
    renderer: Arc<TiledRenderer<F>>,
    width: u32,
    height: u32,
    zoom: ZoomTransform,
    queue_capacity: usize,
}

impl<F: EscapeTime + Send + Sync + 'static> CameraPipeline<F> {
    pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

    pub fn new(renderer: Arc<TiledRenderer<F>>, width: u32, height: u32) -> crate::Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        Ok(Self {
            renderer,
            width,
            height,
            zoom: ZoomTransform::default(),
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
        })
    }

    pub fn with_zoom(mut self, zoom: ZoomTransform) -> Self {
        self.zoom = zoom;
        self
    }

    /// Frames buffered between rendering and writing; at least 1.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Start filming from `start` until the view has been zoomed by
    /// `target_zoom_factor`, `per_frame_factor` per frame.
    ///
    /// Returns as soon as the worker threads are running.
    pub fn film(
        &self,
        start: ViewParameters,
        target_zoom_factor: f64,
        per_frame_factor: f64,
        mut outputs: Vec<Box<dyn Output>>,
    ) -> crate::Result<FilmHandle> {
        start.validate()?;
        let total = frame_count(target_zoom_factor, per_frame_factor)?;
        let step = 1.0 / per_frame_factor;

        for output in outputs.iter_mut() {
            output.begin(total);
        }
        info!(
            frames = total,
            width = self.width,
            height = self.height,
            outputs = outputs.len(),
            "Starting film"
        );

        let state = Arc::new(FilmState {
            cancel: Arc::new(RenderCancel::new()),
            remaining: AtomicU64::new(total),
            production_finished: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        });
        let (frame_tx, frame_rx) = mpsc::sync_channel::<Frame>(self.queue_capacity);

        let consumer = spawn("consumer", move || deliver(frame_rx, outputs))?;

        let producer = Producer {
            renderer: Arc::clone(&self.renderer),
            state: Arc::clone(&state),
            zoom: self.zoom,
            step,
            total,
            width: self.width,
            height: self.height,
            frames: frame_tx,
        };
        let producer = spawn("producer", move || producer.run(start))?;

        let (report_tx, report_rx) = mpsc::channel();
        let monitor = {
            let state = Arc::clone(&state);
            spawn("monitor", move || {
                let started = Instant::now();
                let production = producer.join().unwrap_or_else(|_| Production {
                    produced: 0,
                    failure: Some(RenderError::WorkerLost),
                });
                state.production_finished.store(true, Ordering::Release);
                debug!(produced = production.produced, "Production finished");

                let delivery = consumer.join().unwrap_or(Delivery {
                    delivered: 0,
                    write_failures: 0,
                });

                let report = FilmReport {
                    frames_planned: total,
                    frames_produced: production.produced,
                    frames_delivered: delivery.delivered,
                    write_failures: delivery.write_failures,
                    cancelled: state.cancel.is_cancelled(),
                    failure: production.failure,
                };
                info!(
                    elapsed_ms = started.elapsed().as_millis(),
                    frames = report.frames_delivered,
                    write_failures = report.write_failures,
                    cancelled = report.cancelled,
                    "Film complete"
                );
                state.finished.store(true, Ordering::Release);
                let _ = report_tx.send(report);
            })?
        };

        Ok(FilmHandle {
            state,
            report_rx,
            monitor,
        })
    }
}

fn spawn<T, G>(role: &'static str, body: G) -> crate::Result<JoinHandle<T>>
where
    T: Send + 'static,
    G: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(format!("mandelcam-{role}"))
        .spawn(body)
        .map_err(|source| RenderError::ThreadSpawn { role, source })
}

struct Production {
    produced: u64,
    failure: Option<RenderError>,
}

/// State owned by the producer thread.
struct Producer<F> {
    renderer: Arc<TiledRenderer<F>>,
    state: Arc<FilmState>,
    zoom: ZoomTransform,
    /// Zoom factor applied before each frame.
    step: f64,
    total: u64,
    width: u32,
    height: u32,
    frames: mpsc::SyncSender<Frame>,
}

impl<F: EscapeTime + Send + Sync + 'static> Producer<F> {
    fn run(self, start: ViewParameters) -> Production {
        let mut produced = 0;
        let failure = self.produce(start, &mut produced).err();
        if let Some(e) = &failure {
            error!(error = %e, produced, "Film production failed");
        }
        Production { produced, failure }
    }

    fn produce(&self, start: ViewParameters, produced: &mut u64) -> crate::Result<()> {
        let mut params = start;
        for index in 0..self.total {
            if self.state.cancel.is_cancelled() {
                break;
            }
            params = self.zoom.zoom_center(&params, self.step)?;
            let result = self
                .renderer
                .render_with_cancel(params, self.width, self.height, Arc::clone(&self.state.cancel))?
                .wait()?;
            let cancelled = result.cancelled;
            let frame = Frame {
                index,
                params,
                image: result.buffer,
            };
            if self.frames.send(frame).is_err() {
                warn!(index, "Frame consumer gone, stopping production");
                break;
            }
            *produced += 1;
            self.state.remaining.fetch_sub(1, Ordering::Relaxed);
            if cancelled {
                debug!(index, "Film cancelled after a partial frame");
                break;
            }
        }
        Ok(())
    }
}

struct Delivery {
    delivered: u64,
    write_failures: u64,
}

fn deliver(frames: mpsc::Receiver<Frame>, mut outputs: Vec<Box<dyn Output>>) -> Delivery {
    let mut delivered = 0;
    let mut write_failures = 0;

    while let Ok(frame) = frames.recv() {
        for output in outputs.iter_mut() {
            let sequence = output.next_sequence_number();
            if let Err(source) = output.write_frame(&frame.image, sequence) {
                let e = RenderError::OutputWriteFailed {
                    output: output.name(),
                    sequence,
                    source,
                };
                warn!(frame = frame.index, error = %e, "Frame write failed");
                write_failures += 1;
            }
        }
        delivered += 1;
    }

    for output in outputs.iter_mut() {
        if let Err(e) = output.finish() {
            warn!(output = %output.name(), error = %e, "Output failed to finish");
            write_failures += 1;
        }
    }
    Delivery {
        delivered,
        write_failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_for_hundredfold_zoom() {
        assert_eq!(frame_count(100.0, 1.1).unwrap(), 49);
        assert_eq!(frame_count(0.01, 1.0 / 1.1).unwrap(), 49);
    }

    #[test]
    fn exact_powers_do_not_gain_a_frame() {
        assert_eq!(frame_count(8.0, 2.0).unwrap(), 3);
        assert_eq!(frame_count(1.21, 1.1).unwrap(), 2);
    }

    #[test]
    fn invalid_factors_rejected() {
        for (target, per_frame) in [
            (1.0, 1.1),
            (100.0, 1.0),
            (100.0, 0.9),
            (0.5, 1.1),
            (-2.0, 1.1),
            (f64::NAN, 1.1),
            (100.0, f64::INFINITY),
        ] {
            assert!(
                matches!(
                    frame_count(target, per_frame),
                    Err(RenderError::Core(CoreError::InvalidParameters { .. }))
                ),
                "({target}, {per_frame}) should be rejected"
            );
        }
    }

    #[test]
    fn report_completeness() {
        let report = FilmReport {
            frames_planned: 3,
            frames_produced: 3,
            frames_delivered: 3,
            write_failures: 0,
            cancelled: false,
            failure: None,
        };
        assert!(report.is_complete());
        let partial = FilmReport {
            write_failures: 1,
            ..report
        };
        assert!(!partial.is_complete());
    }
}
