//! On-disk description of shader sets.
//!
//! ```toml
//! [sets.default.standard]
//! vertex = "default/standard.vert"
//! fragment = "default/standard.frag"
//!
//! [sets.pbr.standard]
//! vertex = "pbr/standard.vert"
//! fragment = "pbr/standard.frag"
//! ```
//!
//! Relative paths resolve against the manifest's directory. Set and technique
//! order follow the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::gpu::GpuDevice;

use super::registry::{ShaderRegistry, StageSources, TechniqueSources, DEFAULT_SET};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StagePaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    sets: IndexMap<String, IndexMap<String, StagePaths>>,
}

/// Parsed manifest with paths already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderManifest {
    sets: IndexMap<String, IndexMap<String, StagePaths>>,
}

impl ShaderManifest {
    /// Parses manifest text; relative paths are joined onto `base_dir`.
    pub fn parse(contents: &str, base_dir: &Path) -> Result<Self> {
        let raw: RawManifest = toml::from_str(contents).context("invalid shader manifest")?;
        if !raw.sets.contains_key(DEFAULT_SET) {
            bail!("shader manifest has no `{DEFAULT_SET}` set");
        }

        let sets = raw
            .sets
            .into_iter()
            .map(|(set, techniques)| {
                let techniques = techniques
                    .into_iter()
                    .map(|(technique, paths)| {
                        let resolved = StagePaths {
                            vertex: base_dir.join(paths.vertex),
                            fragment: base_dir.join(paths.fragment),
                        };
                        (technique, resolved)
                    })
                    .collect();
                (set, techniques)
            })
            .collect();
        Ok(Self { sets })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read shader manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&contents, base).with_context(|| format!("in {}", path.display()))
    }

    /// Set names in file order.
    pub fn set_names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn stage_paths(&self, set: &str, technique: &str) -> Option<&StagePaths> {
        self.sets.get(set)?.get(technique)
    }

    /// Reads every stage file. The default set always comes first.
    pub fn read_sources(&self) -> Result<Vec<(String, TechniqueSources)>> {
        let mut out = Vec::with_capacity(self.sets.len());
        for (set, techniques) in &self.sets {
            let mut sources = TechniqueSources::new();
            for (technique, paths) in techniques {
                let stages = StageSources {
                    vertex: read_stage(&paths.vertex, set, technique)?,
                    fragment: read_stage(&paths.fragment, set, technique)?,
                };
                sources.insert(technique.clone(), stages);
            }
            if set == DEFAULT_SET {
                out.insert(0, (set.clone(), sources));
            } else {
                out.push((set.clone(), sources));
            }
        }
        Ok(out)
    }
}

fn read_stage(path: &Path, set: &str, technique: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| {
        format!("failed to read `{set}/{technique}` shader {}", path.display())
    })
}

impl<D: GpuDevice> ShaderRegistry<D> {
    /// Registers the default set and then every other set of `manifest`.
    ///
    /// Unreadable files and default-set build failures are errors; failures in
    /// other sets follow [`ShaderRegistry::register_set`]'s fallback policy.
    pub fn register_manifest(&mut self, device: &D, manifest: &ShaderManifest) -> Result<()> {
        let mut sets = manifest.read_sources()?.into_iter();
        if let Some((_, default)) = sets.next() {
            self.register_default_set(device, &default)
                .context("default shader set failed to build")?;
        }
        for (name, sources) in sets {
            self.register_set(device, &name, &sources);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::gpu::HeadlessDevice;

    const VS: &str = "in vec3 aPosition;\nvoid main() { gl_Position = vec4(aPosition, 1.0); }\n";
    const FS: &str = "out vec4 c;\nvoid main() { c = vec4(1.0); }\n";

    const MANIFEST: &str = r#"
[sets.pbr.standard]
vertex = "pbr/standard.vert"
fragment = "pbr/standard.frag"

[sets.default.standard]
vertex = "default/standard.vert"
fragment = "default/standard.frag"

[sets.default.lines]
vertex = "default/lines.vert"
fragment = "default/lines.frag"
"#;

    fn write_tree(root: &Path) {
        for dir in ["default", "pbr"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        for file in ["default/standard", "default/lines", "pbr/standard"] {
            fs::write(root.join(format!("{file}.vert")), VS).unwrap();
            fs::write(root.join(format!("{file}.frag")), FS).unwrap();
        }
        fs::write(root.join("shaders.toml"), MANIFEST).unwrap();
    }

    #[test]
    fn parse_resolves_relative_paths() {
        let manifest = ShaderManifest::parse(MANIFEST, Path::new("/assets")).unwrap();
        assert_eq!(manifest.set_names().collect::<Vec<_>>(), ["pbr", "default"]);
        assert_eq!(
            manifest.stage_paths("default", "lines").unwrap().vertex,
            Path::new("/assets/default/lines.vert")
        );
    }

    #[test]
    fn manifest_without_default_is_rejected() {
        let text = "[sets.pbr.standard]\nvertex = \"a\"\nfragment = \"b\"\n";
        assert!(ShaderManifest::parse(text, Path::new(".")).is_err());
    }

    #[test]
    fn default_is_read_first() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        let manifest = ShaderManifest::load(dir.path().join("shaders.toml")).unwrap();
        let sources = manifest.read_sources().unwrap();

        assert_eq!(sources[0].0, "default");
        assert_eq!(sources[0].1.len(), 2);
        assert_eq!(sources[1].0, "pbr");
        assert_eq!(sources[1].1.get("standard").unwrap().vertex, VS);
    }

    #[test]
    fn missing_stage_file_names_the_technique() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        fs::remove_file(dir.path().join("pbr/standard.frag")).unwrap();

        let manifest = ShaderManifest::load(dir.path().join("shaders.toml")).unwrap();
        let err = manifest.read_sources().unwrap_err();
        assert!(format!("{err:#}").contains("pbr/standard"));
    }

    #[test]
    fn registers_whole_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        let manifest = ShaderManifest::load(dir.path().join("shaders.toml")).unwrap();

        let device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::new(RegistryConfig::default());
        registry.register_manifest(&device, &manifest).unwrap();

        assert_eq!(registry.set_names().collect::<Vec<_>>(), ["default", "pbr"]);
        assert!(registry.get_set("pbr").unwrap().is_inherited("lines"));
        assert_eq!(device.stats().programs_created, 3);
    }
}
