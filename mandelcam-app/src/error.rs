use std::path::PathBuf;

use thiserror::Error;

use mandelcam_core::CoreError;
use mandelcam_render::RenderError;

/// Errors surfaced by the command-line driver.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse job config {path}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot tell the image format of {0}; use .png, .jpg, .argb or .bgr")]
    UnknownFormat(PathBuf),

    #[error("config has no `film` section")]
    MissingFilm,

    #[error("film incomplete: {delivered} of {planned} frames delivered, {write_failures} write failures")]
    FilmIncomplete {
        planned: u64,
        delivered: u64,
        write_failures: u64,
    },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, AppError>;
