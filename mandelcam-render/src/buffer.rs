use crate::palette::{Color, BLACK};
use crate::tile::Tile;

/// An RGBA pixel buffer representing a rendered image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderBuffer {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data, 4 bytes per pixel, row-major order.
    pub pixels: Vec<u8>,
}

impl RenderBuffer {
    /// Create a new buffer filled with opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: BLACK.repeat(width as usize * height as usize),
        }
    }

    /// Color of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Copy a tile's pixels into their place in the buffer.
    ///
    /// Tiles never overlap, so compositing order does not matter.
    pub fn blit_tile(&mut self, tile: &Tile, tile_pixels: &[Color]) {
        debug_assert_eq!(tile_pixels.len(), tile.pixel_count());
        let stride = self.width as usize * 4;
        let tw = tile.width as usize;
        for (row, src) in tile_pixels.chunks_exact(tw).enumerate() {
            let dst_start = (tile.y as usize + row) * stride + tile.x as usize * 4;
            self.pixels[dst_start..dst_start + tw * 4].copy_from_slice(src.as_flattened());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::rgb;
    use mandelcam_core::ViewParameters;

    fn tile(x: u32, y: u32, width: u32, height: u32) -> Tile {
        Tile {
            x,
            y,
            width,
            height,
            view: ViewParameters::default(),
        }
    }

    #[test]
    fn new_buffer_is_black_opaque() {
        let buf = RenderBuffer::new(4, 4);
        assert_eq!(buf.pixels.len(), 4 * 4 * 4);
        for chunk in buf.pixels.chunks_exact(4) {
            assert_eq!(chunk, &[0, 0, 0, 255]);
        }
    }

    #[test]
    fn blit_tile_writes_correct_region() {
        let mut buf = RenderBuffer::new(8, 8);
        let t = tile(2, 1, 3, 2);
        let red = vec![rgb(255, 0, 0); t.pixel_count()];
        buf.blit_tile(&t, &red);

        assert_eq!(buf.pixel(2, 1), rgb(255, 0, 0));
        assert_eq!(buf.pixel(4, 2), rgb(255, 0, 0));
        assert_eq!(buf.pixel(5, 1), BLACK);
        assert_eq!(buf.pixel(2, 3), BLACK);
        assert_eq!(buf.pixel(0, 0), BLACK);
    }
}
