//! Engine configuration.
//!
//! Every section has working defaults; a TOML file only needs to name the
//! values it changes.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub logging: LoggingConfig,
    pub packer: PackerConfig,
    pub registry: RegistryConfig,
}

/// Mesh packer tuning. These are throughput knobs, not correctness inputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PackerConfig {
    /// Triangles the backing arrays can hold before the first growth.
    pub initial_capacity: usize,
    /// Capacity multiplier applied to the requested triangle count on growth.
    pub growth_factor: f32,
    /// Triangles processed per inner loop.
    pub chunk_size: usize,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self { initial_capacity: 1024, growth_factor: 1.5, chunk_size: 256 }
    }
}

impl PackerConfig {
    /// Growth factor clamped so growth never shrinks below the request.
    #[inline]
    pub fn effective_growth_factor(&self) -> f32 {
        if self.growth_factor.is_finite() { self.growth_factor.max(1.0) } else { 1.5 }
    }

    #[inline]
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

/// Shader-set registry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Technique variants the default set must supply, in draw order.
    pub techniques: Vec<String>,
    /// Sets that sample the alternate (PBR) texture array.
    pub alternate_texture_sets: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            techniques: vec!["standard".into(), "lines".into()],
            alternate_texture_sets: vec!["pbr".into()],
        }
    }
}

impl RegistryConfig {
    /// Technique layout for scenes with terrain, characters and shadows.
    pub fn scene_techniques() -> Self {
        Self {
            techniques: ["terrain", "character", "lines", "shadow"].map(String::from).to_vec(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn uses_alternate_textures(&self, set: &str) -> bool {
        self.alternate_texture_sets.iter().any(|s| s == set)
    }
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("invalid engine configuration")
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("in {}", path.display()))
    }

    /// Loads `path`, falling back to defaults when it is missing or invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load_from_file(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("using default engine configuration: {e:#}");
                Self::default()
            }
        }
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            "[packer]\nchunk_size = 64\n\n[registry]\nalternate_texture_sets = [\"pbr\", \"gloss\"]\n",
        )
        .unwrap();
        assert_eq!(config.packer.chunk_size, 64);
        assert_eq!(config.packer.initial_capacity, 1024);
        assert_eq!(config.registry.techniques, ["standard", "lines"]);
        assert!(config.registry.uses_alternate_textures("gloss"));
        assert!(!config.registry.uses_alternate_textures("default"));
    }

    #[test]
    fn tuning_values_are_clamped() {
        let packer = PackerConfig { growth_factor: 0.5, chunk_size: 0, ..Default::default() };
        assert_eq!(packer.effective_growth_factor(), 1.0);
        assert_eq!(packer.effective_chunk_size(), 1);
        let packer = PackerConfig { growth_factor: f32::NAN, ..Default::default() };
        assert_eq!(packer.effective_growth_factor(), 1.5);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");

        let mut config = EngineConfig::default();
        config.registry = RegistryConfig::scene_techniques();
        config.packer.growth_factor = 2.0;
        config.save_to_file(&path).unwrap();

        assert_eq!(EngineConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_or_default(dir.path().join("absent.toml"));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(EngineConfig::from_toml_str("[packer\nchunk_size = 1").is_err());
    }
}
