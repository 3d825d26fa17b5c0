use mandelcam_core::ViewParameters;

/// A rectangular pixel region of the target raster together with the
/// complex-plane bounds it covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    /// Pixel x of the top-left corner.
    pub x: u32,
    /// Pixel y of the top-left corner.
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Bounds of exactly this rectangle, interpolated from the full view.
    pub view: ViewParameters,
}

impl Tile {
    /// Number of pixels in this tile.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Choose `(rows, cols)` so that `rows × cols ≈ target` with roughly square
/// tiles, never more columns than pixels wide or rows than pixels high.
pub fn grid_dimensions(width: u32, height: u32, target: usize) -> (u32, u32) {
    let max_cols = width.min(u32::try_from(target).unwrap_or(u32::MAX)).max(1);
    let target = target.max(1) as f64;
    let aspect = width as f64 / height as f64;
    let cols = ((target * aspect).sqrt().ceil() as u32).clamp(1, max_cols);
    let rows = ((target / cols as f64).ceil() as u32).clamp(1, height);
    (rows, cols)
}

/// Split a `width × height` raster into about `target` tiles.
///
/// Tiles are sized by integer division; the last row and column absorb
/// the remainder, so the tiles cover the raster exactly once.
pub fn partition(params: &ViewParameters, width: u32, height: u32, target: usize) -> Vec<Tile> {
    let (rows, cols) = grid_dimensions(width, height, target);
    let base_w = width / cols;
    let base_h = height / rows;

    let mut tiles = Vec::with_capacity((rows * cols) as usize);
    for row in 0..rows {
        let y = row * base_h;
        let th = if row + 1 == rows { height - y } else { base_h };
        for col in 0..cols {
            let x = col * base_w;
            let tw = if col + 1 == cols { width - x } else { base_w };
            tiles.push(Tile {
                x,
                y,
                width: tw,
                height: th,
                view: params.sub_view(width, height, x, y, tw, th),
            });
        }
    }
    tiles
}
