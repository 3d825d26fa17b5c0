use thiserror::Error;

/// Errors originating from the rendering pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid image dimensions: {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("invalid palette: {0}")]
    InvalidPalette(String),

    #[error("unknown palette '{0}'")]
    UnknownPalette(String),

    #[error("palette cache miss for {passes} passes (cache holds {len} entries)")]
    PaletteCacheMiss { passes: i32, len: usize },

    #[error("output '{output}' failed to write frame {sequence}: {source}")]
    OutputWriteFailed {
        output: String,
        sequence: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("failed to spawn {role} thread")]
    ThreadSpawn {
        role: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("frame format {0} cannot be streamed")]
    UnsupportedStreamFormat(String),

    #[error("render worker exited without reporting a result")]
    WorkerLost,

    #[error(transparent)]
    Core(#[from] mandelcam_core::CoreError),
}
