//! Named shader sets with fallback to the default set.
//!
//! The default set is registered first and supplies every technique. Later
//! sets compile only the techniques they provide; every other technique (and
//! any technique whose sources fail to build) points at the default set's
//! variant through a shared `Rc`, so no program is compiled or resolved twice.
//!
//! The registry is single-threaded (`Rc`), matching the rendering thread that
//! owns the GL context.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::config::RegistryConfig;
use crate::gpu::GpuDevice;

use super::compiler::{build_program, ShaderProgram};
use super::error::{violated, PreconditionViolation, ShaderError};
use super::locations::{resolve, LocationTable};

/// Name of the set every other set falls back to.
pub const DEFAULT_SET: &str = "default";

/// Vertex and fragment source for one technique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageSources {
    pub vertex: String,
    pub fragment: String,
}

/// Per-technique sources supplied when registering a set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TechniqueSources {
    techniques: IndexMap<String, StageSources>,
}

impl TechniqueSources {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(
        mut self,
        technique: impl Into<String>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        self.insert(technique, StageSources { vertex: vertex.into(), fragment: fragment.into() });
        self
    }

    pub fn insert(&mut self, technique: impl Into<String>, sources: StageSources) {
        self.techniques.insert(technique.into(), sources);
    }

    pub fn get(&self, technique: &str) -> Option<&StageSources> {
        self.techniques.get(technique)
    }

    pub fn techniques(&self) -> impl Iterator<Item = &str> {
        self.techniques.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }
}

/// A linked program and its resolved locations.
#[derive(Debug)]
pub struct TechniqueVariant<D: GpuDevice> {
    program: ShaderProgram<D>,
    locations: LocationTable<D::UniformLocation>,
}

impl<D: GpuDevice> TechniqueVariant<D> {
    #[inline]
    pub fn program(&self) -> &ShaderProgram<D> {
        &self.program
    }

    #[inline]
    pub fn locations(&self) -> &LocationTable<D::UniformLocation> {
        &self.locations
    }
}

#[derive(Debug)]
struct Slot<D: GpuDevice> {
    variant: Rc<TechniqueVariant<D>>,
    inherited: bool,
}

/// One visual style: a bundle of technique variants.
#[derive(Debug)]
pub struct ShaderSet<D: GpuDevice> {
    name: String,
    slots: IndexMap<String, Slot<D>>,
}

impl<D: GpuDevice> ShaderSet<D> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self, technique: &str) -> Option<&TechniqueVariant<D>> {
        self.slots.get(technique).map(|s| &*s.variant)
    }

    /// True when both sets use the very same variant for `technique`.
    pub fn shares_variant(&self, other: &ShaderSet<D>, technique: &str) -> bool {
        match (self.slots.get(technique), other.slots.get(technique)) {
            (Some(a), Some(b)) => Rc::ptr_eq(&a.variant, &b.variant),
            _ => false,
        }
    }

    /// Program handle for `technique`, for binding before a draw.
    pub fn program(&self, technique: &str) -> Option<D::Program> {
        self.variant(technique).map(|v| v.program.handle())
    }

    /// True when `technique` is the default set's variant rather than one
    /// compiled for this set.
    pub fn is_inherited(&self, technique: &str) -> bool {
        self.slots.get(technique).is_some_and(|s| s.inherited)
    }

    pub fn techniques(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn compiled_count(&self) -> usize {
        self.slots.values().filter(|s| !s.inherited).count()
    }
}

/// Store of shader sets keyed by style name, in registration order.
#[derive(Debug)]
pub struct ShaderRegistry<D: GpuDevice> {
    config: RegistryConfig,
    sets: IndexMap<String, ShaderSet<D>>,
    cursor: usize,
}

impl<D: GpuDevice> ShaderRegistry<D> {
    pub fn new(config: RegistryConfig) -> Self {
        Self { config, sets: IndexMap::new(), cursor: 0 }
    }

    #[inline]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Registers the default set. Must be called exactly once, before any
    /// other registration, with sources for every configured technique.
    ///
    /// Build failures propagate: there is nothing to fall back to yet. Any
    /// program already built for the set is released before returning.
    pub fn register_default_set(
        &mut self,
        device: &D,
        sources: &TechniqueSources,
    ) -> Result<&ShaderSet<D>, ShaderError> {
        if self.sets.contains_key(DEFAULT_SET) {
            violated(PreconditionViolation::DefaultSetAlreadyRegistered);
        }
        for technique in &self.config.techniques {
            if sources.get(technique).is_none() {
                violated(PreconditionViolation::MissingDefaultTechnique {
                    technique: technique.clone(),
                });
            }
        }
        self.check_known_techniques(DEFAULT_SET, sources);

        let alternate = self.config.uses_alternate_textures(DEFAULT_SET);
        let mut slots = IndexMap::new();
        for technique in &self.config.techniques {
            let Some(stages) = sources.get(technique) else { continue };
            match build_variant(device, DEFAULT_SET, technique, stages, alternate) {
                Ok(variant) => {
                    slots.insert(technique.clone(), Slot { variant: Rc::new(variant), inherited: false });
                }
                Err(e) => {
                    release_owned(device, slots.into_values());
                    return Err(e);
                }
            }
        }

        log::info!("registered shader set `{DEFAULT_SET}` ({} techniques)", slots.len());
        Ok(self.insert(ShaderSet { name: DEFAULT_SET.to_owned(), slots }))
    }

    /// Registers a named set that overrides some of the default techniques.
    ///
    /// Techniques missing from `sources`, and techniques whose sources fail to
    /// compile or link, share the default set's variant. Failures are logged
    /// per technique and never abort the rest of the set.
    pub fn register_set(
        &mut self,
        device: &D,
        name: &str,
        sources: &TechniqueSources,
    ) -> &ShaderSet<D> {
        let Some(default) = self.sets.get(DEFAULT_SET) else {
            violated(PreconditionViolation::DefaultSetMissing { set: name.to_owned() });
        };
        if self.sets.contains_key(name) {
            violated(PreconditionViolation::DuplicateSet { set: name.to_owned() });
        }
        self.check_known_techniques(name, sources);

        let alternate = self.config.uses_alternate_textures(name);
        let mut slots = IndexMap::with_capacity(default.slots.len());
        for (technique, fallback) in &default.slots {
            let built = sources.get(technique).and_then(|stages| {
                build_variant(device, name, technique, stages, alternate)
                    .map_err(|e| {
                        log::warn!(
                            "shader set `{name}`: technique `{technique}` failed ({}); using the default variant",
                            failure_kind(&e)
                        );
                    })
                    .ok()
            });

            let slot = match built {
                Some(variant) => Slot { variant: Rc::new(variant), inherited: false },
                None => Slot { variant: Rc::clone(&fallback.variant), inherited: true },
            };
            slots.insert(technique.clone(), slot);
        }

        let set = ShaderSet { name: name.to_owned(), slots };
        log::info!(
            "registered shader set `{name}` ({} compiled, {} inherited)",
            set.compiled_count(),
            set.slots.len() - set.compiled_count()
        );
        self.insert(set)
    }

    pub fn get_set(&self, name: &str) -> Option<&ShaderSet<D>> {
        self.sets.get(name)
    }

    pub fn default_set(&self) -> Option<&ShaderSet<D>> {
        self.sets.get(DEFAULT_SET)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Set names in registration order.
    pub fn set_names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// Advances to the next set (wrapping) and returns its name.
    pub fn cycle(&mut self) -> &str {
        if self.sets.is_empty() {
            violated(PreconditionViolation::NoSetsRegistered);
        }
        self.cursor = (self.cursor + 1) % self.sets.len();
        self.active_name().unwrap_or(DEFAULT_SET)
    }

    pub fn active_name(&self) -> Option<&str> {
        self.sets.get_index(self.cursor).map(|(name, _)| name.as_str())
    }

    pub fn active_set(&self) -> Option<&ShaderSet<D>> {
        self.sets.get_index(self.cursor).map(|(_, set)| set)
    }

    /// Makes `name` the active set. Returns `false` if it is not registered.
    pub fn select(&mut self, name: &str) -> bool {
        match self.sets.get_index_of(name) {
            Some(index) => {
                self.cursor = index;
                true
            }
            None => false,
        }
    }

    /// Removes a non-default set, deleting only programs no other set uses.
    /// Returns `false` if no such set exists.
    pub fn remove_set(&mut self, device: &D, name: &str) -> bool {
        if name == DEFAULT_SET {
            violated(PreconditionViolation::DefaultSetRemoval);
        }
        let Some((index, _, set)) = self.sets.shift_remove_full(name) else {
            return false;
        };

        if index < self.cursor {
            self.cursor -= 1;
        }
        if self.cursor >= self.sets.len() {
            self.cursor = 0;
        }

        release_owned(device, set.slots.into_values());
        log::info!("removed shader set `{name}`");
        true
    }

    /// Deletes every program exactly once.
    pub fn destroy(mut self, device: &D) {
        // Non-default sets go first so the default variants they borrowed are
        // uniquely owned by the time the default set is released.
        while let Some((_, set)) = self.sets.pop() {
            release_owned(device, set.slots.into_values());
        }
    }

    fn insert(&mut self, set: ShaderSet<D>) -> &ShaderSet<D> {
        let (index, _) = self.sets.insert_full(set.name.clone(), set);
        &self.sets[index]
    }

    fn check_known_techniques(&self, set: &str, sources: &TechniqueSources) {
        for technique in sources.techniques() {
            if !self.config.techniques.iter().any(|t| t == technique) {
                violated(PreconditionViolation::UnknownTechnique {
                    set: set.to_owned(),
                    technique: technique.to_owned(),
                });
            }
        }
    }
}

fn build_variant<D: GpuDevice>(
    device: &D,
    set: &str,
    technique: &str,
    stages: &StageSources,
    alternate: bool,
) -> Result<TechniqueVariant<D>, ShaderError> {
    let label = format!("{set}/{technique}");
    let program = build_program(device, &label, &stages.vertex, &stages.fragment)?;
    let locations = resolve(device, program.handle(), alternate);
    Ok(TechniqueVariant { program, locations })
}

/// Deletes the programs of `slots` that nothing else references.
fn release_owned<D: GpuDevice>(device: &D, slots: impl Iterator<Item = Slot<D>>) {
    for slot in slots {
        let inherited = slot.inherited;
        match Rc::try_unwrap(slot.variant) {
            Ok(variant) => {
                log::debug!("deleting program `{}`", variant.program.label());
                device.delete_program(variant.program.handle());
            }
            Err(variant) if !inherited => log::warn!(
                "program `{}` is still referenced elsewhere; not deleted",
                variant.program.label()
            ),
            Err(_) => {}
        }
    }
}

fn failure_kind(e: &ShaderError) -> String {
    match e {
        ShaderError::Compile(c) => format!("{} stage did not compile", c.stage),
        ShaderError::Link(_) => "link failed".to_owned(),
        ShaderError::Device(msg) => format!("device error: {msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessDevice;
    use crate::shader::locations::{TextureUnit, Uniform};

    fn vs(tag: &str) -> String {
        format!(
            "// {tag}\nin vec3 aPosition;\nin vec3 aColor;\nuniform mat4 uProjectionMatrix;\n\
             void main() {{\n    gl_Position = uProjectionMatrix * vec4(aPosition, 1.0);\n}}\n"
        )
    }

    fn fs(tag: &str) -> String {
        format!(
            "// {tag}\nuniform sampler2DArray uTextureArray;\nuniform sampler2DArray uPBRTextureArray;\n\
             out vec4 c;\nvoid main() {{ c = vec4(1.0); }}\n"
        )
    }

    const BROKEN_FS: &str = "out vec4 c;\nvoid main() {\n#error nope\n}\n";

    fn default_sources() -> TechniqueSources {
        TechniqueSources::new()
            .with("standard", vs("std"), fs("std"))
            .with("lines", vs("lines"), fs("lines"))
    }

    fn registry_with_default(device: &HeadlessDevice) -> ShaderRegistry<HeadlessDevice> {
        let mut registry = ShaderRegistry::new(RegistryConfig::default());
        registry.register_default_set(device, &default_sources()).unwrap();
        registry
    }

    #[test]
    #[should_panic(expected = "registered before the default shader set")]
    fn named_set_before_default_panics() {
        let device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::<HeadlessDevice>::new(RegistryConfig::default());
        let sources = TechniqueSources::new().with("standard", vs("pbr"), fs("pbr"));
        registry.register_set(&device, "pbr", &sources);
    }

    #[test]
    #[should_panic(expected = "must supply technique `lines`")]
    fn default_set_must_be_complete() {
        let device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::<HeadlessDevice>::new(RegistryConfig::default());
        let sources = TechniqueSources::new().with("standard", vs("a"), fs("a"));
        let _ = registry.register_default_set(&device, &sources);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn default_set_registers_once() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        let _ = registry.register_default_set(&device, &default_sources());
    }

    #[test]
    #[should_panic(expected = "does not define")]
    fn unknown_technique_panics() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        let sources = TechniqueSources::new().with("shadow", vs("s"), fs("s"));
        registry.register_set(&device, "pbr", &sources);
    }

    #[test]
    #[should_panic(expected = "`pbr` is already registered")]
    fn duplicate_set_panics() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        registry.register_set(&device, "pbr", &TechniqueSources::new());
        registry.register_set(&device, "pbr", &TechniqueSources::new());
    }

    #[test]
    fn omitted_technique_shares_default_variant() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        let sources = TechniqueSources::new().with("standard", vs("pbr"), fs("pbr"));
        registry.register_set(&device, "pbr", &sources);

        let default = registry.default_set().unwrap();
        let pbr = registry.get_set("pbr").unwrap();

        assert!(pbr.shares_variant(default, "lines"));
        assert!(std::ptr::eq(pbr.variant("lines").unwrap(), default.variant("lines").unwrap()));
        assert_eq!(pbr.program("lines"), default.program("lines"));
        assert!(pbr.is_inherited("lines"));

        assert!(!pbr.shares_variant(default, "standard"));
        assert!(!pbr.is_inherited("standard"));
        assert_eq!(device.stats().programs_created, 3);
    }

    #[test]
    fn broken_technique_falls_back_without_aborting_set() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        let sources = TechniqueSources::new()
            .with("standard", vs("vb"), fs("vb"))
            .with("lines", vs("vb-lines"), BROKEN_FS);
        registry.register_set(&device, "virtualboy", &sources);

        let default = registry.default_set().unwrap();
        let set = registry.get_set("virtualboy").unwrap();

        let standard = set.variant("standard").unwrap();
        assert!(!set.shares_variant(default, "standard"));
        assert_ne!(set.program("standard"), default.program("standard"));
        assert!(device.is_program_live(standard.program().handle()));

        assert!(set.shares_variant(default, "lines"));
        assert!(set.is_inherited("lines"));
        // The broken attempt left nothing behind.
        assert_eq!(device.live_programs(), 3);
        assert_eq!(device.live_shaders(), 0);
    }

    #[test]
    fn link_failure_falls_back_to_default_variant() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        let no_position = "in vec3 aPosition;\nvoid main() {}\n";
        let sources = TechniqueSources::new()
            .with("standard", vs("retro"), fs("retro"))
            .with("lines", no_position, fs("retro-lines"));
        registry.register_set(&device, "retro", &sources);

        let default = registry.default_set().unwrap();
        let set = registry.get_set("retro").unwrap();

        assert!(set.is_inherited("lines"));
        assert!(set.shares_variant(default, "lines"));
        assert!(!set.is_inherited("standard"));
        assert!(!set.shares_variant(default, "standard"));
        assert_eq!(device.live_programs(), 3);
        assert_eq!(device.live_shaders(), 0);
        assert_eq!(device.stats().programs_created, 4);
    }

    #[test]
    fn broken_vertex_stage_falls_back_to_default_variant() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        let broken_vs = "in vec3 aPosition;\n#error no position\nvoid main() {}\n";
        let sources = TechniqueSources::new()
            .with("standard", broken_vs, fs("retro"))
            .with("lines", vs("retro-lines"), fs("retro-lines"));
        registry.register_set(&device, "retro", &sources);

        let default = registry.default_set().unwrap();
        let set = registry.get_set("retro").unwrap();

        assert!(set.is_inherited("standard"));
        assert!(set.shares_variant(default, "standard"));
        assert!(!set.is_inherited("lines"));
        assert_eq!(device.live_programs(), 3);
        assert_eq!(device.live_shaders(), 0);
    }

    #[test]
    fn removing_set_deletes_only_its_own_programs() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        let sources = TechniqueSources::new().with("lines", vs("retro"), fs("retro"));
        registry.register_set(&device, "retro", &sources);
        let own = registry.get_set("retro").unwrap().program("lines").unwrap();
        let shared = registry.get_set("retro").unwrap().program("standard").unwrap();

        registry.remove_set(&device, "retro");

        assert!(!device.is_program_live(own));
        assert!(device.is_program_live(shared));
        assert_eq!(device.stats().programs_deleted, 1);
    }

    #[test]
    fn default_failure_propagates_and_releases() {
        let device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::<HeadlessDevice>::new(RegistryConfig::default());
        let sources = TechniqueSources::new()
            .with("standard", vs("std"), fs("std"))
            .with("lines", vs("lines"), BROKEN_FS);

        let err = registry.register_default_set(&device, &sources).unwrap_err();
        assert!(matches!(err, ShaderError::Compile(_)));
        assert!(registry.is_empty());
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn alternate_sets_resolve_alternate_sampler() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        let sources = TechniqueSources::new().with("standard", vs("pbr"), fs("pbr"));
        let pbr = registry.register_set(&device, "pbr", &sources);

        let standard = pbr.variant("standard").unwrap().locations();
        assert_eq!(standard.texture_unit(), TextureUnit::ALTERNATE);
        assert!(standard.uniform(Uniform::TextureArray).is_some());

        // The inherited variant keeps the default set's resolution.
        let lines = pbr.variant("lines").unwrap().locations();
        assert_eq!(lines.texture_unit(), TextureUnit::STANDARD);
    }

    #[test]
    fn cycle_wraps_in_registration_order() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        registry.register_set(&device, "pbr", &TechniqueSources::new());
        registry.register_set(&device, "virtualboy", &TechniqueSources::new());

        assert_eq!(registry.active_name(), Some("default"));
        assert_eq!(registry.cycle(), "pbr");
        assert_eq!(registry.cycle(), "virtualboy");
        assert_eq!(registry.cycle(), "default");
        assert_eq!(registry.set_names().collect::<Vec<_>>(), ["default", "pbr", "virtualboy"]);
    }

    #[test]
    fn select_moves_cursor() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        registry.register_set(&device, "pbr", &TechniqueSources::new());

        assert!(registry.select("pbr"));
        assert_eq!(registry.active_set().unwrap().name(), "pbr");
        assert!(!registry.select("missing"));
        assert_eq!(registry.cycle(), "default");
    }

    #[test]
    #[should_panic(expected = "no shader sets")]
    fn cycle_on_empty_registry_panics() {
        let mut registry = ShaderRegistry::<HeadlessDevice>::new(RegistryConfig::default());
        registry.cycle();
    }

    #[test]
    fn removing_set_keeps_shared_programs() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        let sources = TechniqueSources::new().with("standard", vs("pbr"), fs("pbr"));
        registry.register_set(&device, "pbr", &sources);
        registry.register_set(&device, "virtualboy", &TechniqueSources::new());
        registry.select("virtualboy");

        let own = registry.get_set("pbr").unwrap().program("standard").unwrap();
        assert!(registry.remove_set(&device, "pbr"));

        assert!(!device.is_program_live(own));
        assert_eq!(device.live_programs(), 2);
        let default = registry.default_set().unwrap();
        assert!(device.is_program_live(default.program("lines").unwrap()));
        assert_eq!(registry.active_name(), Some("virtualboy"));
        assert!(!registry.remove_set(&device, "pbr"));
    }

    #[test]
    #[should_panic(expected = "cannot be removed")]
    fn default_set_cannot_be_removed() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        registry.remove_set(&device, DEFAULT_SET);
    }

    #[test]
    fn destroy_deletes_each_program_once() {
        let device = HeadlessDevice::new();
        let mut registry = registry_with_default(&device);
        let sources = TechniqueSources::new().with("standard", vs("pbr"), fs("pbr"));
        registry.register_set(&device, "pbr", &sources);
        registry.register_set(&device, "virtualboy", &TechniqueSources::new());

        registry.destroy(&device);

        assert_eq!(device.live_programs(), 0);
        assert_eq!(device.stats().programs_deleted, 3);
        assert!(device.errors().is_empty());
    }

    #[test]
    fn scene_technique_layout() {
        let device = HeadlessDevice::new();
        let mut registry = ShaderRegistry::new(RegistryConfig::scene_techniques());
        let mut sources = TechniqueSources::new();
        for t in ["terrain", "character", "lines", "shadow"] {
            sources = sources.with(t, vs(t), fs(t));
        }
        let set = registry.register_default_set(&device, &sources).unwrap();
        assert_eq!(set.techniques().collect::<Vec<_>>(), ["terrain", "character", "lines", "shadow"]);
    }
}
