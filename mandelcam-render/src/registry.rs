//! String-keyed palette factories and the serialisable palette description.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::palette::{
    rgb, Color, ColorPalette, GradientChain, GradientNode, HsbRotation, HsbStretch,
    LinearGradient, BLACK,
};

/// Builds a palette with its default parameters.
pub type PaletteFactory = fn() -> crate::Result<Box<dyn ColorPalette>>;

/// Maps stable keys to palette factories.
///
/// Keys are resolved once at startup; nothing is looked up per pixel.
#[derive(Clone)]
pub struct PaletteRegistry {
    factories: BTreeMap<String, PaletteFactory>,
}

impl PaletteRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding the four palette kinds plus the named presets.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("linear", || Ok(Box::new(LinearGradient::default())));
        registry.register("gradient-chain", || Ok(Box::new(classic()?)));
        registry.register("hsb-rotation", || {
            Ok(Box::new(HsbRotation::new(96, 0.0, 0.85, 1.0, BLACK)?))
        });
        registry.register("hsb-stretch", || {
            Ok(Box::new(HsbStretch::new(128, 0.55, 1.05, 0.9, (0.35, 1.0), BLACK)?))
        });
        registry.register("classic", || Ok(Box::new(classic()?)));
        registry.register("fire", || Ok(Box::new(fire()?)));
        registry.register("ocean", || Ok(Box::new(ocean()?)));
        registry.register("grayscale", || {
            Ok(Box::new(
                LinearGradient::new(rgb(0, 0, 0), rgb(255, 255, 255), 128, BLACK)?
                    .named("grayscale"),
            ))
        });
        registry
    }

    /// Add or replace the factory for `key`.
    pub fn register(&mut self, key: impl Into<String>, factory: PaletteFactory) {
        self.factories.insert(key.into(), factory);
    }

    pub fn create(&self, key: &str) -> crate::Result<Box<dyn ColorPalette>> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| RenderError::UnknownPalette(key.to_string()))?;
        factory()
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }
}

impl Default for PaletteRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

fn classic() -> crate::Result<GradientChain> {
    let nodes = vec![
        GradientNode::new(rgb(0, 7, 100), 41),
        GradientNode::new(rgb(32, 107, 203), 67),
        GradientNode::new(rgb(237, 255, 255), 57),
        GradientNode::new(rgb(255, 170, 0), 55),
        GradientNode::new(rgb(0, 2, 0), 36),
    ];
    Ok(GradientChain::new(nodes, BLACK)?.named("classic"))
}

fn fire() -> crate::Result<GradientChain> {
    let nodes = vec![
        GradientNode::new(rgb(0, 0, 0), 64),
        GradientNode::new(rgb(128, 0, 0), 64),
        GradientNode::new(rgb(255, 128, 0), 64),
        GradientNode::new(rgb(255, 255, 0), 64),
        GradientNode::new(rgb(255, 255, 255), 32),
    ];
    Ok(GradientChain::new(nodes, BLACK)?.named("fire"))
}

fn ocean() -> crate::Result<GradientChain> {
    let nodes = vec![
        GradientNode::new(rgb(0, 0, 30), 77),
        GradientNode::new(rgb(0, 50, 120), 77),
        GradientNode::new(rgb(0, 150, 200), 51),
        GradientNode::new(rgb(100, 220, 255), 51),
        GradientNode::new(rgb(240, 255, 255), 32),
    ];
    Ok(GradientChain::new(nodes, BLACK)?.named("ocean"))
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Plain RGB triple as written in configuration files.
pub type Rgb = [u8; 3];

fn to_color(c: Rgb) -> Color {
    rgb(c[0], c[1], c[2])
}

fn default_core() -> Rgb {
    [0, 0, 0]
}

/// One node of a configured gradient chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub color: Rgb,
    pub length: u32,
}

/// Serialisable palette description, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PaletteConfig {
    /// A registry entry with its default parameters.
    Builtin { name: String },
    Linear {
        start: Rgb,
        end: Rgb,
        steps: u32,
        #[serde(default = "default_core")]
        core: Rgb,
    },
    GradientChain {
        nodes: Vec<NodeConfig>,
        #[serde(default = "default_core")]
        core: Rgb,
    },
    HsbRotation {
        period: u32,
        #[serde(default)]
        hue_offset: f64,
        saturation: f64,
        brightness: f64,
        #[serde(default = "default_core")]
        core: Rgb,
    },
    HsbStretch {
        period: u32,
        hue_start: f64,
        hue_end: f64,
        saturation: f64,
        min_brightness: f64,
        max_brightness: f64,
        #[serde(default = "default_core")]
        core: Rgb,
    },
}

impl PaletteConfig {
    /// Construct the described palette, resolving `Builtin` names through
    /// `registry`.
    pub fn build(&self, registry: &PaletteRegistry) -> crate::Result<Box<dyn ColorPalette>> {
        Ok(match self {
            Self::Builtin { name } => registry.create(name)?,
            Self::Linear {
                start,
                end,
                steps,
                core,
            } => Box::new(LinearGradient::new(
                to_color(*start),
                to_color(*end),
                *steps,
                to_color(*core),
            )?),
            Self::GradientChain { nodes, core } => Box::new(GradientChain::new(
                nodes
                    .iter()
                    .map(|n| GradientNode::new(to_color(n.color), n.length))
                    .collect(),
                to_color(*core),
            )?),
            Self::HsbRotation {
                period,
                hue_offset,
                saturation,
                brightness,
                core,
            } => Box::new(HsbRotation::new(
                *period,
                *hue_offset,
                *saturation,
                *brightness,
                to_color(*core),
            )?),
            Self::HsbStretch {
                period,
                hue_start,
                hue_end,
                saturation,
                min_brightness,
                max_brightness,
                core,
            } => Box::new(HsbStretch::new(
                *period,
                *hue_start,
                *hue_end,
                *saturation,
                (*min_brightness, *max_brightness),
                to_color(*core),
            )?),
        })
    }
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self::Builtin {
            name: "classic".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_all_construct() {
        let registry = PaletteRegistry::with_builtins();
        let keys: Vec<_> = registry.keys().collect();
        for key in ["linear", "gradient-chain", "hsb-rotation", "hsb-stretch"] {
            assert!(keys.contains(&key), "missing {key}");
        }
        for key in keys {
            let p = registry.create(key).unwrap();
            assert!(p.period() >= 1);
            assert_eq!(p.fast_storage().len(), p.period() as usize);
        }
    }

    #[test]
    fn presets_carry_their_key_as_name() {
        let registry = PaletteRegistry::default();
        assert_eq!(registry.create("fire").unwrap().name(), "fire");
        assert_eq!(registry.create("classic").unwrap().period(), 256);
    }

    #[test]
    fn unknown_key_is_an_error() {
        let registry = PaletteRegistry::default();
        assert!(matches!(
            registry.create("nope"),
            Err(RenderError::UnknownPalette(k)) if k == "nope"
        ));
    }

    #[test]
    fn custom_factories_can_be_registered() {
        let mut registry = PaletteRegistry::empty();
        assert!(!registry.contains("mine"));
        registry.register("mine", || {
            Ok(Box::new(LinearGradient::default().named("mine")))
        });
        assert_eq!(registry.create("mine").unwrap().name(), "mine");
    }

    #[test]
    fn config_from_json() {
        let json = r#"{
            "kind": "gradient-chain",
            "nodes": [
                { "color": [255, 0, 0], "length": 10 },
                { "color": [0, 0, 255], "length": 20 }
            ],
            "core": [9, 9, 9]
        }"#;
        let config: PaletteConfig = serde_json::from_str(json).unwrap();
        let p = config.build(&PaletteRegistry::default()).unwrap();
        assert_eq!(p.period(), 30);
        assert_eq!(p.color_for(-1), rgb(9, 9, 9));
        assert_eq!(p.color_for(0), rgb(255, 0, 0));
    }

    #[test]
    fn config_defaults_core_to_black() {
        let json = r#"{ "kind": "hsb-rotation", "period": 12, "saturation": 1.0, "brightness": 1.0 }"#;
        let config: PaletteConfig = serde_json::from_str(json).unwrap();
        let p = config.build(&PaletteRegistry::default()).unwrap();
        assert_eq!(p.color_for(-1), BLACK);
        assert_eq!(p.color_for(0), rgb(255, 0, 0));
    }

    #[test]
    fn builtin_config_resolves_through_registry() {
        let config = PaletteConfig::default();
        let p = config.build(&PaletteRegistry::default()).unwrap();
        assert_eq!(p.name(), "classic");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PaletteConfig::Linear {
            start: [0, 0, 0],
            end: [1, 1, 1],
            steps: 0,
            core: [0, 0, 0],
        };
        assert!(config.build(&PaletteRegistry::default()).is_err());
    }
}
