use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mandelcam_core::{Complex, ViewParameters, ZoomTransform};
use mandelcam_render::{
    FrameFormat, MultiFileOutput, Numbering, Output, PaletteConfig, RendererOptions,
    SingleFileOutput, StreamOutput, TextChunks,
};

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Fractal selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FractalConfig {
    #[default]
    Mandelbrot,
    Julia {
        c_re: f64,
        c_im: f64,
    },
}

impl FractalConfig {
    pub fn default_view(&self) -> ViewParameters {
        match self {
            Self::Mandelbrot => ViewParameters::default_mandelbrot(),
            Self::Julia { .. } => ViewParameters::default_julia(),
        }
    }

    pub fn julia_c(&self) -> Option<Complex> {
        match *self {
            Self::Mandelbrot => None,
            Self::Julia { c_re, c_im } => Some(Complex::new(c_re, c_im)),
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OutputConfig {
    /// One file, overwritten by each frame.
    SingleFile {
        path: PathBuf,
        #[serde(default)]
        format: Option<FrameFormat>,
    },
    /// One file per frame; see [`MultiFileOutput`] for the pattern syntax.
    MultiFile {
        pattern: PathBuf,
        #[serde(default)]
        format: Option<FrameFormat>,
        #[serde(default)]
        numbering: Numbering,
    },
    /// Raw frames concatenated on standard output.
    Stdout {
        #[serde(default = "default_stream_format")]
        format: FrameFormat,
    },
}

fn default_stream_format() -> FrameFormat {
    FrameFormat::RawBgr
}

/// The explicit format, or the one implied by the file extension.
pub fn resolve_format(format: Option<FrameFormat>, path: &Path) -> Result<FrameFormat> {
    format
        .or_else(|| FrameFormat::from_path(path))
        .ok_or_else(|| AppError::UnknownFormat(path.to_path_buf()))
}

impl OutputConfig {
    pub fn build(&self, text: &TextChunks) -> Result<Box<dyn Output>> {
        Ok(match self {
            Self::SingleFile { path, format } => Box::new(
                SingleFileOutput::new(path, resolve_format(*format, path)?).with_text(text.clone()),
            ),
            Self::MultiFile {
                pattern,
                format,
                numbering,
            } => Box::new(
                MultiFileOutput::new(pattern, resolve_format(*format, pattern)?, *numbering)
                    .with_text(text.clone()),
            ),
            Self::Stdout { format } => {
                Box::new(StreamOutput::new("stdout", std::io::stdout(), *format)?)
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Film
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmConfig {
    /// Total zoom; above 1 zooms in.
    pub target_zoom: f64,
    #[serde(default = "default_per_frame_factor")]
    pub per_frame_factor: f64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
}

fn default_per_frame_factor() -> f64 {
    1.1
}

fn default_queue_capacity() -> usize {
    8
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Everything needed to render an image or film, read from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub fractal: FractalConfig,
    /// Defaults to the fractal's standard view.
    #[serde(default)]
    pub view: Option<ViewParameters>,
    #[serde(default)]
    pub palette: PaletteConfig,
    #[serde(flatten)]
    pub renderer: RendererOptions,
    #[serde(default = "default_growth_constant")]
    pub growth_constant: f64,
    #[serde(default)]
    pub film: Option<FilmConfig>,
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn default_growth_constant() -> f64 {
    ZoomTransform::DEFAULT_GROWTH_CONSTANT
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fractal: FractalConfig::default(),
            view: None,
            palette: PaletteConfig::default(),
            renderer: RendererOptions::default(),
            growth_constant: default_growth_constant(),
            film: None,
        }
    }
}

impl JobConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|source| AppError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| AppError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded job config from {}", path.display());
        debug!(?config, "Job config");
        Ok(config)
    }

    pub fn view(&self) -> ViewParameters {
        self.view.unwrap_or_else(|| self.fractal.default_view())
    }

    pub fn zoom(&self) -> Result<ZoomTransform> {
        Ok(ZoomTransform::new(self.growth_constant)?)
    }

    /// Metadata embedded in PNG frames.
    pub fn text_chunks(&self, palette_name: &str) -> TextChunks {
        let view = self.view();
        let center = view.center();
        let mut chunks = vec![
            ("mandelcam.Fractal".to_string(), fractal_name(&self.fractal).to_string()),
            ("mandelcam.CenterRe".to_string(), center.re.to_string()),
            ("mandelcam.CenterIm".to_string(), center.im.to_string()),
            ("mandelcam.RealSpan".to_string(), view.real_span().to_string()),
            ("mandelcam.MaxPasses".to_string(), view.max_passes().to_string()),
            (
                "mandelcam.SuperSampling".to_string(),
                view.super_sampling_factor().to_string(),
            ),
            ("mandelcam.Palette".to_string(), palette_name.to_string()),
            (
                "mandelcam.Resolution".to_string(),
                format!("{}x{}", self.width, self.height),
            ),
        ];
        if let Some(c) = self.fractal.julia_c() {
            chunks.push(("mandelcam.JuliaC_Re".to_string(), c.re.to_string()));
            chunks.push(("mandelcam.JuliaC_Im".to_string(), c.im.to_string()));
        }
        chunks
    }
}

fn fractal_name(fractal: &FractalConfig) -> &'static str {
    match fractal {
        FractalConfig::Mandelbrot => "mandelbrot",
        FractalConfig::Julia { .. } => "julia",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mandelcam_render::FillStrategy;

    #[test]
    fn empty_config_uses_defaults() {
        let config: JobConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, JobConfig::default());
        assert_eq!(config.view(), ViewParameters::default_mandelbrot());
        assert_eq!(config.renderer.oversubscription, 4);
    }

    #[test]
    fn full_config_parses() {
        let json = r##"{
            "width": 320,
            "height": 200,
            "fractal": { "kind": "julia", "c_re": -0.4, "c_im": 0.6 },
            "view": {
                "min_real": -1.5, "max_real": 1.5,
                "min_imag": -1.0, "max_imag": 1.0,
                "max_passes": 500
            },
            "palette": { "kind": "builtin", "name": "fire" },
            "fill": "no-holes",
            "threads": 2,
            "film": {
                "target_zoom": 1000.0,
                "outputs": [
                    { "kind": "multi-file", "pattern": "out/frame_####.png", "numbering": "countdown" },
                    { "kind": "stdout" }
                ]
            }
        }"##;
        let config: JobConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.width, 320);
        assert_eq!(config.fractal.julia_c(), Some(Complex::new(-0.4, 0.6)));
        assert_eq!(config.view().max_passes(), 500);
        assert_eq!(config.view().super_sampling_factor(), 1);
        assert_eq!(config.renderer.fill, FillStrategy::NoHoles);
        assert_eq!(config.renderer.threads, 2);

        let film = config.film.unwrap();
        assert_eq!(film.per_frame_factor, 1.1);
        assert_eq!(film.queue_capacity, 8);
        assert_eq!(
            film.outputs[0],
            OutputConfig::MultiFile {
                pattern: "out/frame_####.png".into(),
                format: None,
                numbering: Numbering::Countdown,
            }
        );
        assert_eq!(
            film.outputs[1],
            OutputConfig::Stdout {
                format: FrameFormat::RawBgr
            }
        );
    }

    #[test]
    fn invalid_view_is_rejected_on_load() {
        let json = r#"{ "view": { "min_real": 1.0, "max_real": -1.0, "min_imag": -1.0, "max_imag": 1.0 } }"#;
        assert!(serde_json::from_str::<JobConfig>(json).is_err());
    }

    #[test]
    fn format_comes_from_extension_when_omitted() {
        assert_eq!(
            resolve_format(None, Path::new("a.png")).unwrap(),
            FrameFormat::Png
        );
        assert_eq!(
            resolve_format(Some(FrameFormat::RawArgb), Path::new("a.png")).unwrap(),
            FrameFormat::RawArgb
        );
        assert!(matches!(
            resolve_format(None, Path::new("a.gif")),
            Err(AppError::UnknownFormat(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = JobConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, AppError::Read { .. }));
    }

    #[test]
    fn text_chunks_describe_the_view() {
        let config = JobConfig {
            fractal: FractalConfig::Julia {
                c_re: 0.1,
                c_im: 0.2,
            },
            ..Default::default()
        };
        let chunks = config.text_chunks("ocean");
        assert!(chunks.contains(&("mandelcam.Fractal".into(), "julia".into())));
        assert!(chunks.contains(&("mandelcam.Palette".into(), "ocean".into())));
        assert!(chunks.iter().any(|(k, _)| k == "mandelcam.JuliaC_Re"));
    }
}
