mod config;
mod error;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use mandelcam_core::{EscapeTime, Julia, Mandelbrot};
use mandelcam_render::{CameraPipeline, ColorPalette, PaletteRegistry, TiledRenderer};

use config::{resolve_format, JobConfig};
use error::{AppError, Result};

/// Render escape-time fractals and zoom films.
#[derive(Parser, Debug)]
#[command(name = "mandelcam", version, about)]
struct Cli {
    /// Log filter, e.g. `debug` or `mandelcam_render=trace`. Overrides RUST_LOG.
    #[arg(long, global = true, value_name = "FILTER")]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one image.
    Render {
        /// JSON job config.
        config: PathBuf,
        /// Output image; the format follows the extension.
        out: PathBuf,
    },
    /// Render the zoom film described by the config's `film` section.
    Film {
        /// JSON job config.
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match &cli.log {
        Some(filter) => tracing_subscriber::EnvFilter::new(filter),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    // Frames may go to stdout, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                error!("  caused by: {cause}");
                source = std::error::Error::source(cause);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Render { config, out } => {
            let job = JobConfig::load(&config)?;
            match job.fractal.julia_c() {
                None => render_image(Mandelbrot, &job, &out),
                Some(c) => render_image(Julia::new(c), &job, &out),
            }
        }
        Command::Film { config } => {
            let job = JobConfig::load(&config)?;
            match job.fractal.julia_c() {
                None => film(Mandelbrot, &job),
                Some(c) => film(Julia::new(c), &job),
            }
        }
    }
}

fn build_renderer<F: EscapeTime + Send + Sync + 'static>(
    fractal: F,
    job: &JobConfig,
) -> Result<TiledRenderer<F>> {
    let registry = PaletteRegistry::with_builtins();
    let palette: Arc<dyn ColorPalette> = Arc::from(job.palette.build(&registry)?);
    Ok(TiledRenderer::new(fractal, palette, job.renderer)?)
}

fn render_image<F: EscapeTime + Send + Sync + 'static>(
    fractal: F,
    job: &JobConfig,
    out: &Path,
) -> Result<()> {
    let format = resolve_format(None, out)?;
    let renderer = build_renderer(fractal, job)?;
    let result = renderer.render(job.view(), job.width, job.height)?.wait()?;
    if result.tiles_failed > 0 {
        warn!(tiles_failed = result.tiles_failed, "Some tiles failed and were left black");
    }

    let text = job.text_chunks(&renderer.palette().name());
    let write_err = |source| AppError::Write {
        path: out.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(out).map_err(write_err)?);
    format
        .write(&result.buffer, &text, &mut writer)
        .map_err(write_err)?;
    writer.flush().map_err(write_err)?;

    info!(
        path = %out.display(),
        elapsed_ms = result.elapsed.as_millis(),
        "Image written"
    );
    Ok(())
}

fn film<F: EscapeTime + Send + Sync + 'static>(fractal: F, job: &JobConfig) -> Result<()> {
    let plan = job.film.as_ref().ok_or(AppError::MissingFilm)?;
    let renderer = build_renderer(fractal, job)?;
    let text = job.text_chunks(&renderer.palette().name());
    let outputs = plan
        .outputs
        .iter()
        .map(|o| o.build(&text))
        .collect::<Result<Vec<_>>>()?;
    if outputs.is_empty() {
        warn!("Film has no outputs; frames will be rendered and discarded");
    }

    let camera = CameraPipeline::new(Arc::new(renderer), job.width, job.height)?
        .with_zoom(job.zoom()?)
        .with_queue_capacity(plan.queue_capacity);
    let report = camera
        .film(job.view(), plan.target_zoom, plan.per_frame_factor, outputs)?
        .wait()?;

    if let Some(failure) = report.failure {
        return Err(failure.into());
    }
    let short = !report.cancelled && report.frames_delivered < report.frames_planned;
    if report.write_failures > 0 || short {
        return Err(AppError::FilmIncomplete {
            planned: report.frames_planned,
            delivered: report.frames_delivered,
            write_failures: report.write_failures,
        });
    }
    Ok(())
}
