//! Frame encodings: raw pixel dumps, PNG with tEXt metadata, and JPEG.

use std::io::{self, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::RenderBuffer;

/// Keyword/value pairs written as PNG tEXt chunks.
pub type TextChunks = Vec<(String, String)>;

/// How a frame is turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FrameFormat {
    /// 4 bytes per pixel: alpha, red, green, blue.
    RawArgb,
    /// 3 bytes per pixel: blue, green, red.
    RawBgr,
    Png,
    Jpeg {
        #[serde(default = "default_quality")]
        quality: u8,
    },
}

fn default_quality() -> u8 {
    90
}

impl FrameFormat {
    /// Headerless formats that can be concatenated into a stream.
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::RawArgb | Self::RawBgr)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::RawArgb => "argb",
            Self::RawBgr => "bgr",
            Self::Png => "png",
            Self::Jpeg { .. } => "jpg",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "argb" => Some(Self::RawArgb),
            "bgr" => Some(Self::RawBgr),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg {
                quality: default_quality(),
            }),
            _ => None,
        }
    }

    /// Encode `image` into `out`. `text` is only used by PNG.
    pub fn write<W: Write>(&self, image: &RenderBuffer, text: &[(String, String)], out: W) -> io::Result<()> {
        match self {
            Self::RawArgb => write_raw_argb(image, out),
            Self::RawBgr => write_raw_bgr(image, out),
            Self::Png => write_png(image, text, out),
            Self::Jpeg { quality } => write_jpeg(image, *quality, out),
        }
    }

    pub fn encode(&self, image: &RenderBuffer, text: &[(String, String)]) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write(image, text, &mut bytes)?;
        Ok(bytes)
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RawArgb => write!(f, "raw-argb"),
            Self::RawBgr => write!(f, "raw-bgr"),
            Self::Png => write!(f, "png"),
            Self::Jpeg { quality } => write!(f, "jpeg (quality {quality})"),
        }
    }
}

fn write_raw_argb<W: Write>(image: &RenderBuffer, mut out: W) -> io::Result<()> {
    let mut row = Vec::with_capacity(image.width as usize * 4);
    for src in image.pixels.chunks_exact(image.width as usize * 4) {
        row.clear();
        for p in src.chunks_exact(4) {
            row.extend_from_slice(&[p[3], p[0], p[1], p[2]]);
        }
        out.write_all(&row)?;
    }
    Ok(())
}

fn write_raw_bgr<W: Write>(image: &RenderBuffer, mut out: W) -> io::Result<()> {
    let mut row = Vec::with_capacity(image.width as usize * 3);
    for src in image.pixels.chunks_exact(image.width as usize * 4) {
        row.clear();
        for p in src.chunks_exact(4) {
            row.extend_from_slice(&[p[2], p[1], p[0]]);
        }
        out.write_all(&row)?;
    }
    Ok(())
}

/// PNG through the `png` crate directly so custom tEXt chunks can be added.
fn write_png<W: Write>(image: &RenderBuffer, text: &[(String, String)], out: W) -> io::Result<()> {
    let mut encoder = png::Encoder::new(out, image.width, image.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    encoder
        .add_text_chunk("Software".to_string(), "mandelcam".to_string())
        .map_err(io::Error::other)?;
    for (key, value) in text {
        encoder
            .add_text_chunk(key.clone(), value.clone())
            .map_err(io::Error::other)?;
    }

    let mut writer = encoder.write_header().map_err(io::Error::other)?;
    writer
        .write_image_data(&image.pixels)
        .map_err(io::Error::other)?;
    writer.finish().map_err(io::Error::other)?;

    debug!(width = image.width, height = image.height, chunks = text.len() + 1, "Encoded PNG");
    Ok(())
}

fn write_jpeg<W: Write>(image: &RenderBuffer, quality: u8, mut out: W) -> io::Result<()> {
    let rgb: Vec<u8> = image
        .pixels
        .chunks_exact(4)
        .flat_map(|p| [p[0], p[1], p[2]])
        .collect();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode(&rgb, image.width, image.height, ExtendedColorType::Rgb8)
        .map_err(io::Error::other)?;
    debug!(width = image.width, height = image.height, quality, "Encoded JPEG");
    Ok(())
}
