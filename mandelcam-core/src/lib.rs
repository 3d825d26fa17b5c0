pub mod complex;
pub mod error;
pub mod escape;
pub mod history;
pub mod julia;
pub mod mandelbrot;
pub mod view;
pub mod zoom;

// Re-export primary types for convenience.
pub use complex::Complex;
pub use error::CoreError;
pub use escape::{EscapeTime, ESCAPE_RADIUS_SQ, IN_SET};
pub use history::ViewHistory;
pub use julia::Julia;
pub use mandelbrot::Mandelbrot;
pub use view::ViewParameters;
pub use zoom::ZoomTransform;

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
