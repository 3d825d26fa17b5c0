pub mod buffer;
pub mod camera;
pub mod encode;
pub mod error;
pub mod no_holes;
pub mod output;
pub mod palette;
pub mod registry;
pub mod renderer;
pub mod sampling;
pub mod tile;

pub use buffer::RenderBuffer;
pub use camera::{frame_count, CameraPipeline, FilmHandle, FilmReport, Frame};
pub use encode::{FrameFormat, TextChunks};
pub use error::RenderError;
pub use output::{MultiFileOutput, Numbering, Output, SingleFileOutput, StreamOutput};
pub use palette::{
    hsb_to_rgb, rgb, Color, ColorPalette, FastStorage, GradientChain, GradientNode, HsbRotation,
    HsbStretch, LinearGradient, BLACK,
};
pub use registry::{PaletteConfig, PaletteRegistry};
pub use renderer::{
    FillStrategy, RenderCancel, RenderJob, RenderResult, RendererOptions, TiledRenderer,
};
pub use tile::Tile;

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
