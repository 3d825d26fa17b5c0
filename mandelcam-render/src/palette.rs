use tracing::debug;

use crate::error::RenderError;

/// An opaque RGBA color, 4 bytes, alpha always 255.
pub type Color = [u8; 4];

pub const BLACK: Color = [0, 0, 0, 255];

/// Build an opaque color from its RGB channels.
#[inline]
pub const fn rgb(r: u8, g: u8, b: u8) -> Color {
    [r, g, b, 255]
}

// ---------------------------------------------------------------------------
// Fast storage
// ---------------------------------------------------------------------------

/// Precomputed colors for one palette cycle, indexed by `passes mod period`.
#[derive(Debug, Clone, Default)]
pub struct FastStorage {
    colors: Vec<Color>,
}

impl FastStorage {
    /// Evaluate every cycle position of `palette` once.
    pub fn build<P: ColorPalette + ?Sized>(palette: &P) -> Self {
        let period = palette.period();
        let colors: Vec<Color> = (0..period).map(|i| palette.cycle_color(i)).collect();
        debug!(palette = %palette.name(), period, "Built palette fast storage");
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Cached color for an escaped point, or `None` when the storage no
    /// longer matches `period` (the palette changed without a rebuild).
    #[inline]
    pub fn get(&self, passes: u32, period: u32) -> Option<Color> {
        if period == 0 || self.colors.len() != period as usize {
            return None;
        }
        self.colors.get((passes % period) as usize).copied()
    }
}

// ---------------------------------------------------------------------------
// Palette trait
// ---------------------------------------------------------------------------

/// Maps an escape pass count to a color.
///
/// `passes` is `-1` for points in the set, otherwise the number of passes
/// before escape. Escaped colors repeat every [`period`](Self::period)
/// passes and are served from a [`FastStorage`] cache that implementors
/// rebuild whenever their parameters change.
pub trait ColorPalette: Send + Sync {
    fn name(&self) -> String;

    /// Color of points that never escaped.
    fn in_set_color(&self) -> Color;

    /// Length of one color cycle, always `>= 1`.
    fn period(&self) -> u32;

    /// Uncached color for cycle position `index` in `0..period()`.
    fn cycle_color(&self, index: u32) -> Color;

    fn fast_storage(&self) -> &FastStorage;

    /// Recompute the fast storage from the current parameters.
    fn rebuild_cache(&mut self);

    /// Cache-only lookup.
    fn lookup(&self, passes: i32) -> crate::Result<Color> {
        if passes < 0 {
            return Ok(self.in_set_color());
        }
        let storage = self.fast_storage();
        storage
            .get(passes as u32, self.period())
            .ok_or_else(|| RenderError::PaletteCacheMiss {
                passes,
                len: storage.len(),
            })
    }

    /// Uncached color for an escaped point.
    fn escaped_color(&self, passes: u32) -> Color {
        self.cycle_color(passes % self.period().max(1))
    }

    /// Color for `passes`, falling back to direct evaluation when the cache
    /// is stale.
    fn color_for(&self, passes: i32) -> Color {
        match self.lookup(passes) {
            Ok(color) => color,
            Err(_) => self.escaped_color(passes as u32),
        }
    }
}

// ---------------------------------------------------------------------------
// Color math
// ---------------------------------------------------------------------------

fn lerp_color(a: Color, b: Color, t: f64) -> Color {
    let inv = 1.0 - t;
    [
        (a[0] as f64 * inv + b[0] as f64 * t).round() as u8,
        (a[1] as f64 * inv + b[1] as f64 * t).round() as u8,
        (a[2] as f64 * inv + b[2] as f64 * t).round() as u8,
        255,
    ]
}

/// HSB to RGB. `hue` is a fraction of a full turn and wraps; saturation and
/// brightness are in `[0, 1]`.
pub fn hsb_to_rgb(hue: f64, saturation: f64, brightness: f64) -> Color {
    let h = hue.rem_euclid(1.0) * 360.0;
    let c = brightness * saturation;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = brightness - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    [
        ((r + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((g + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((b + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        255,
    ]
}

fn check_period(period: u32) -> crate::Result<()> {
    if period == 0 {
        return Err(RenderError::InvalidPalette("period must be >= 1".into()));
    }
    Ok(())
}

fn check_unit(what: &str, value: f64) -> crate::Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(RenderError::InvalidPalette(format!(
            "{what} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Linear two-stop gradient
// ---------------------------------------------------------------------------

/// Sawtooth from `start` to `end` over `steps` passes, then back to `start`.
#[derive(Debug, Clone)]
pub struct LinearGradient {
    name: String,
    start: Color,
    end: Color,
    steps: u32,
    core: Color,
    cache: FastStorage,
}

impl LinearGradient {
    pub fn new(start: Color, end: Color, steps: u32, core: Color) -> crate::Result<Self> {
        check_period(steps)?;
        let mut palette = Self {
            name: "linear".into(),
            start,
            end,
            steps,
            core,
            cache: FastStorage::default(),
        };
        palette.rebuild_cache();
        Ok(palette)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_colors(&mut self, start: Color, end: Color) {
        self.start = start;
        self.end = end;
        self.rebuild_cache();
    }

    pub fn set_steps(&mut self, steps: u32) -> crate::Result<()> {
        check_period(steps)?;
        self.steps = steps;
        self.rebuild_cache();
        Ok(())
    }

    pub fn set_core(&mut self, core: Color) {
        self.core = core;
    }
}

impl Default for LinearGradient {
    fn default() -> Self {
        let mut palette = Self {
            name: "linear".into(),
            start: rgb(0, 7, 100),
            end: rgb(255, 255, 255),
            steps: 64,
            core: BLACK,
            cache: FastStorage::default(),
        };
        palette.rebuild_cache();
        palette
    }
}

impl ColorPalette for LinearGradient {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn in_set_color(&self) -> Color {
        self.core
    }

    fn period(&self) -> u32 {
        self.steps
    }

    fn cycle_color(&self, index: u32) -> Color {
        if self.steps <= 1 {
            return self.start;
        }
        let t = (index % self.steps) as f64 / (self.steps - 1) as f64;
        lerp_color(self.start, self.end, t)
    }

    fn fast_storage(&self) -> &FastStorage {
        &self.cache
    }

    fn rebuild_cache(&mut self) {
        self.cache = FastStorage::build(&*self);
    }
}

// ---------------------------------------------------------------------------
// Multi-node gradient chain
// ---------------------------------------------------------------------------

/// One stop of a [`GradientChain`]: the color at the start of a segment and
/// how many passes the blend towards the next stop takes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientNode {
    pub color: Color,
    pub length: u32,
}

impl GradientNode {
    pub fn new(color: Color, length: u32) -> Self {
        Self { color, length }
    }
}

/// Closed chain of gradient segments; the last node blends back into the
/// first so the cycle has no seam.
#[derive(Debug, Clone)]
pub struct GradientChain {
    name: String,
    nodes: Vec<GradientNode>,
    period: u32,
    core: Color,
    cache: FastStorage,
}

impl GradientChain {
    pub fn new(nodes: Vec<GradientNode>, core: Color) -> crate::Result<Self> {
        let period = Self::total_length(&nodes)?;
        let mut palette = Self {
            name: "gradient-chain".into(),
            nodes,
            period,
            core,
            cache: FastStorage::default(),
        };
        palette.rebuild_cache();
        Ok(palette)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn nodes(&self) -> &[GradientNode] {
        &self.nodes
    }

    pub fn set_nodes(&mut self, nodes: Vec<GradientNode>) -> crate::Result<()> {
        self.period = Self::total_length(&nodes)?;
        self.nodes = nodes;
        self.rebuild_cache();
        Ok(())
    }

    pub fn set_core(&mut self, core: Color) {
        self.core = core;
    }

    fn total_length(nodes: &[GradientNode]) -> crate::Result<u32> {
        if nodes.is_empty() {
            return Err(RenderError::InvalidPalette(
                "gradient chain needs at least one node".into(),
            ));
        }
        let mut total: u32 = 0;
        for node in nodes {
            check_period(node.length)?;
            total = total.checked_add(node.length).ok_or_else(|| {
                RenderError::InvalidPalette("gradient chain is too long".into())
            })?;
        }
        Ok(total)
    }
}

impl ColorPalette for GradientChain {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn in_set_color(&self) -> Color {
        self.core
    }

    fn period(&self) -> u32 {
        self.period
    }

    fn cycle_color(&self, index: u32) -> Color {
        let mut offset = index % self.period;
        for (k, node) in self.nodes.iter().enumerate() {
            if offset < node.length {
                let next = self.nodes[(k + 1) % self.nodes.len()];
                let t = offset as f64 / node.length as f64;
                return lerp_color(node.color, next.color, t);
            }
            offset -= node.length;
        }
        // `offset < period` and period is the sum of lengths.
        unreachable!("cycle index beyond gradient chain")
    }

    fn fast_storage(&self) -> &FastStorage {
        &self.cache
    }

    fn rebuild_cache(&mut self) {
        self.cache = FastStorage::build(&*self);
    }
}

// ---------------------------------------------------------------------------
// HSB hue rotation
// ---------------------------------------------------------------------------

/// Walks the full hue circle once per period at fixed saturation and
/// brightness.
#[derive(Debug, Clone)]
pub struct HsbRotation {
    name: String,
    period: u32,
    hue_offset: f64,
    saturation: f64,
    brightness: f64,
    core: Color,
    cache: FastStorage,
}

impl HsbRotation {
    pub fn new(
        period: u32,
        hue_offset: f64,
        saturation: f64,
        brightness: f64,
        core: Color,
    ) -> crate::Result<Self> {
        check_period(period)?;
        check_unit("saturation", saturation)?;
        check_unit("brightness", brightness)?;
        if !hue_offset.is_finite() {
            return Err(RenderError::InvalidPalette(format!(
                "hue offset must be finite, got {hue_offset}"
            )));
        }
        let mut palette = Self {
            name: "hsb-rotation".into(),
            period,
            hue_offset,
            saturation,
            brightness,
            core,
            cache: FastStorage::default(),
        };
        palette.rebuild_cache();
        Ok(palette)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_period(&mut self, period: u32) -> crate::Result<()> {
        check_period(period)?;
        self.period = period;
        self.rebuild_cache();
        Ok(())
    }

    pub fn set_hue_offset(&mut self, hue_offset: f64) {
        self.hue_offset = hue_offset;
        self.rebuild_cache();
    }
}

impl ColorPalette for HsbRotation {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn in_set_color(&self) -> Color {
        self.core
    }

    fn period(&self) -> u32 {
        self.period
    }

    fn cycle_color(&self, index: u32) -> Color {
        let hue = self.hue_offset + (index % self.period) as f64 / self.period as f64;
        hsb_to_rgb(hue, self.saturation, self.brightness)
    }

    fn fast_storage(&self) -> &FastStorage {
        &self.cache
    }

    fn rebuild_cache(&mut self) {
        self.cache = FastStorage::build(&*self);
    }
}

// ---------------------------------------------------------------------------
// HSB hue stretch
// ---------------------------------------------------------------------------

/// Stretches the hue arc `hue_start..hue_end` across one period, with
/// brightness ramping from `min_brightness` to `max_brightness` along it.
#[derive(Debug, Clone)]
pub struct HsbStretch {
    name: String,
    period: u32,
    hue_start: f64,
    hue_end: f64,
    saturation: f64,
    min_brightness: f64,
    max_brightness: f64,
    core: Color,
    cache: FastStorage,
}

impl HsbStretch {
    pub fn new(
        period: u32,
        hue_start: f64,
        hue_end: f64,
        saturation: f64,
        brightness: (f64, f64),
        core: Color,
    ) -> crate::Result<Self> {
        check_period(period)?;
        check_unit("saturation", saturation)?;
        check_unit("min brightness", brightness.0)?;
        check_unit("max brightness", brightness.1)?;
        if !hue_start.is_finite() || !hue_end.is_finite() {
            return Err(RenderError::InvalidPalette("hue bounds must be finite".into()));
        }
        let mut palette = Self {
            name: "hsb-stretch".into(),
            period,
            hue_start,
            hue_end,
            saturation,
            min_brightness: brightness.0,
            max_brightness: brightness.1,
            core,
            cache: FastStorage::default(),
        };
        palette.rebuild_cache();
        Ok(palette)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_hue_range(&mut self, hue_start: f64, hue_end: f64) {
        self.hue_start = hue_start;
        self.hue_end = hue_end;
        self.rebuild_cache();
    }
}

impl ColorPalette for HsbStretch {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn in_set_color(&self) -> Color {
        self.core
    }

    fn period(&self) -> u32 {
        self.period
    }

    fn cycle_color(&self, index: u32) -> Color {
        let t = if self.period <= 1 {
            0.0
        } else {
            (index % self.period) as f64 / (self.period - 1) as f64
        };
        let hue = self.hue_start + (self.hue_end - self.hue_start) * t;
        let brightness = self.min_brightness + (self.max_brightness - self.min_brightness) * t;
        hsb_to_rgb(hue, self.saturation, brightness)
    }

    fn fast_storage(&self) -> &FastStorage {
        &self.cache
    }

    fn rebuild_cache(&mut self) {
        self.cache = FastStorage::build(&*self);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<Box<dyn ColorPalette>> {
        vec![
            Box::new(LinearGradient::new(rgb(0, 0, 0), rgb(255, 0, 0), 16, rgb(1, 2, 3)).unwrap()),
            Box::new(
                GradientChain::new(
                    vec![
                        GradientNode::new(rgb(255, 0, 0), 5),
                        GradientNode::new(rgb(0, 255, 0), 7),
                        GradientNode::new(rgb(0, 0, 255), 3),
                    ],
                    rgb(1, 2, 3),
                )
                .unwrap(),
            ),
            Box::new(HsbRotation::new(30, 0.25, 0.8, 0.9, rgb(1, 2, 3)).unwrap()),
            Box::new(HsbStretch::new(40, 0.0, 0.5, 1.0, (0.3, 1.0), rgb(1, 2, 3)).unwrap()),
        ]
    }

    #[test]
    fn in_set_is_core_color_for_every_variant() {
        for p in all_variants() {
            assert_eq!(p.color_for(-1), rgb(1, 2, 3), "palette {}", p.name());
            assert_eq!(p.lookup(-1).unwrap(), rgb(1, 2, 3));
        }
    }

    #[test]
    fn cached_colors_repeat_every_period() {
        for p in all_variants() {
            let period = p.period() as i32;
            for k in [0, 1, 7, period - 1, 1000] {
                assert_eq!(
                    p.color_for(k),
                    p.color_for(k + period),
                    "palette {} at {k}",
                    p.name()
                );
            }
        }
    }

    #[test]
    fn cache_matches_direct_evaluation() {
        for p in all_variants() {
            assert_eq!(p.fast_storage().len(), p.period() as usize);
            for k in 0..p.period() {
                assert_eq!(p.lookup(k as i32).unwrap(), p.cycle_color(k));
            }
        }
    }

    #[test]
    fn setters_rebuild_the_cache() {
        let mut p = LinearGradient::default();
        p.set_steps(10).unwrap();
        assert_eq!(p.fast_storage().len(), 10);
        assert!(p.lookup(25).is_ok());

        let mut h = HsbRotation::new(12, 0.0, 1.0, 1.0, BLACK).unwrap();
        let before = h.color_for(3);
        h.set_hue_offset(0.5);
        assert_ne!(before, h.color_for(3));
    }

    #[test]
    fn linear_gradient_endpoints() {
        let p = LinearGradient::new(rgb(0, 0, 0), rgb(200, 100, 50), 5, BLACK).unwrap();
        assert_eq!(p.color_for(0), rgb(0, 0, 0));
        assert_eq!(p.color_for(4), rgb(200, 100, 50));
        assert_eq!(p.color_for(2), rgb(100, 50, 25));
    }

    #[test]
    fn gradient_chain_starts_each_segment_on_its_node() {
        let p = GradientChain::new(
            vec![
                GradientNode::new(rgb(255, 0, 0), 4),
                GradientNode::new(rgb(0, 0, 255), 4),
            ],
            BLACK,
        )
        .unwrap();
        assert_eq!(p.period(), 8);
        assert_eq!(p.color_for(0), rgb(255, 0, 0));
        assert_eq!(p.color_for(4), rgb(0, 0, 255));
        // Halfway through the second segment, blending back to red.
        assert_eq!(p.color_for(6), rgb(128, 0, 128));
    }

    #[test]
    fn hsb_primaries() {
        assert_eq!(hsb_to_rgb(0.0, 1.0, 1.0), rgb(255, 0, 0));
        assert_eq!(hsb_to_rgb(1.0 / 3.0, 1.0, 1.0), rgb(0, 255, 0));
        assert_eq!(hsb_to_rgb(2.0 / 3.0, 1.0, 1.0), rgb(0, 0, 255));
        assert_eq!(hsb_to_rgb(1.0, 1.0, 1.0), rgb(255, 0, 0));
        assert_eq!(hsb_to_rgb(0.3, 0.0, 0.5), rgb(128, 128, 128));
    }

    #[test]
    fn invalid_configurations_rejected() {
        assert!(LinearGradient::new(BLACK, BLACK, 0, BLACK).is_err());
        assert!(GradientChain::new(vec![], BLACK).is_err());
        assert!(GradientChain::new(vec![GradientNode::new(BLACK, 0)], BLACK).is_err());
        assert!(HsbRotation::new(10, 0.0, 1.5, 1.0, BLACK).is_err());
        assert!(HsbStretch::new(10, 0.0, f64::NAN, 1.0, (0.0, 1.0), BLACK).is_err());
    }

    /// A palette whose period changed without rebuilding its cache.
    struct Stale {
        cache: FastStorage,
    }

    impl ColorPalette for Stale {
        fn name(&self) -> String {
            "stale".into()
        }
        fn in_set_color(&self) -> Color {
            BLACK
        }
        fn period(&self) -> u32 {
            4
        }
        fn cycle_color(&self, index: u32) -> Color {
            rgb(index as u8, 0, 0)
        }
        fn fast_storage(&self) -> &FastStorage {
            &self.cache
        }
        fn rebuild_cache(&mut self) {
            self.cache = FastStorage::build(&*self);
        }
    }

    #[test]
    fn stale_cache_reports_miss_and_falls_back() {
        let mut p = Stale {
            cache: FastStorage {
                colors: vec![BLACK; 2],
            },
        };
        assert!(matches!(
            p.lookup(3),
            Err(RenderError::PaletteCacheMiss { passes: 3, len: 2 })
        ));
        assert_eq!(p.color_for(7), rgb(3, 0, 0));

        p.rebuild_cache();
        assert_eq!(p.lookup(7).unwrap(), rgb(3, 0, 0));
    }
}
