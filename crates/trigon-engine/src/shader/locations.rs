//! Semantic attribute/uniform vocabulary and per-program location tables.
//!
//! The identifier tables and texture-unit assignments are `const` data: they
//! are fixed for the process and shared by every program. Resolution looks up
//! every name regardless of whether a given shader declares it; undeclared
//! names resolve to `None`.

use crate::gpu::GpuDevice;

/// Per-vertex inputs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Attribute {
    Position,
    Normal,
    Color,
    TexCoord,
    TextureIndex,
    UseTexture,
}

impl Attribute {
    pub const ALL: [Attribute; 6] = [
        Attribute::Position,
        Attribute::Normal,
        Attribute::Color,
        Attribute::TexCoord,
        Attribute::TextureIndex,
        Attribute::UseTexture,
    ];

    /// Shader-language identifier.
    pub const fn identifier(self) -> &'static str {
        match self {
            Attribute::Position => "aPosition",
            Attribute::Normal => "aNormal",
            Attribute::Color => "aColor",
            Attribute::TexCoord => "aTexCoord",
            Attribute::TextureIndex => "aTextureIndex",
            Attribute::UseTexture => "aUseTexture",
        }
    }

    #[inline]
    const fn slot(self) -> usize {
        self as usize
    }
}

/// Program-wide inputs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Uniform {
    ProjectionMatrix,
    ViewMatrix,
    ModelMatrix,
    LightPos,
    LightDir,
    LightIntensity,
    Roughness,
    Metallic,
    BaseReflectivity,
    CameraPos,
    Time,
    LightSpaceMatrix,
    ShadowMap,
    ShadowsEnabled,
    TextureArray,
}

impl Uniform {
    pub const ALL: [Uniform; 15] = [
        Uniform::ProjectionMatrix,
        Uniform::ViewMatrix,
        Uniform::ModelMatrix,
        Uniform::LightPos,
        Uniform::LightDir,
        Uniform::LightIntensity,
        Uniform::Roughness,
        Uniform::Metallic,
        Uniform::BaseReflectivity,
        Uniform::CameraPos,
        Uniform::Time,
        Uniform::LightSpaceMatrix,
        Uniform::ShadowMap,
        Uniform::ShadowsEnabled,
        Uniform::TextureArray,
    ];

    /// Shader-language identifier. Only the texture-array sampler differs
    /// between texture techniques.
    pub const fn identifier(self, technique: TextureTechnique) -> &'static str {
        match self {
            Uniform::ProjectionMatrix => "uProjectionMatrix",
            Uniform::ViewMatrix => "uViewMatrix",
            Uniform::ModelMatrix => "uModelMatrix",
            Uniform::LightPos => "uLightPos",
            Uniform::LightDir => "uLightDir",
            Uniform::LightIntensity => "uLightIntensity",
            Uniform::Roughness => "uRoughness",
            Uniform::Metallic => "uMetallic",
            Uniform::BaseReflectivity => "uBaseReflectivity",
            Uniform::CameraPos => "uCameraPos",
            Uniform::Time => "uTime",
            Uniform::LightSpaceMatrix => "uLightSpaceMatrix",
            Uniform::ShadowMap => "uShadowMap",
            Uniform::ShadowsEnabled => "uShadowsEnabled",
            Uniform::TextureArray => match technique {
                TextureTechnique::Standard => "uTextureArray",
                TextureTechnique::Alternate => "uPBRTextureArray",
            },
        }
    }

    #[inline]
    const fn slot(self) -> usize {
        self as usize
    }
}

/// Which texture array a program samples.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum TextureTechnique {
    #[default]
    Standard,
    /// The alternate (PBR) texture array.
    Alternate,
}

impl TextureTechnique {
    pub const fn from_alternate(is_alternate: bool) -> Self {
        if is_alternate { TextureTechnique::Alternate } else { TextureTechnique::Standard }
    }

    /// Texture unit the technique's texture array is bound to.
    pub const fn texture_unit(self) -> TextureUnit {
        match self {
            TextureTechnique::Standard => TextureUnit::STANDARD,
            TextureTechnique::Alternate => TextureUnit::ALTERNATE,
        }
    }
}

/// A GPU texture unit index.
///
/// Assignments are fixed so textures bound at the same time never collide.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureUnit(pub u32);

impl TextureUnit {
    pub const STANDARD: TextureUnit = TextureUnit(0);
    pub const ALTERNATE: TextureUnit = TextureUnit(1);
    pub const SHADOW_MAP: TextureUnit = TextureUnit(7);
}

/// Resolved locations for one linked program. Immutable after resolution.
#[derive(Debug, Clone)]
pub struct LocationTable<L> {
    technique: TextureTechnique,
    attributes: [Option<u32>; Attribute::ALL.len()],
    uniforms: [Option<L>; Uniform::ALL.len()],
}

impl<L> LocationTable<L> {
    #[inline]
    pub fn attribute(&self, attribute: Attribute) -> Option<u32> {
        self.attributes[attribute.slot()]
    }

    #[inline]
    pub fn uniform(&self, uniform: Uniform) -> Option<&L> {
        self.uniforms[uniform.slot()].as_ref()
    }

    #[inline]
    pub fn texture_technique(&self) -> TextureTechnique {
        self.technique
    }

    #[inline]
    pub fn texture_unit(&self) -> TextureUnit {
        self.technique.texture_unit()
    }

    #[inline]
    pub fn shadow_map_unit(&self) -> TextureUnit {
        TextureUnit::SHADOW_MAP
    }

    /// Number of vocabulary names present in the program.
    pub fn resolved_count(&self) -> usize {
        self.attributes.iter().filter(|a| a.is_some()).count()
            + self.uniforms.iter().filter(|u| u.is_some()).count()
    }

    /// Points the sampler uniforms at their fixed texture units.
    ///
    /// `program` must be the program this table was resolved from. Samplers
    /// the program does not declare are skipped.
    pub fn bind_samplers<D>(&self, device: &D, program: D::Program)
    where
        D: GpuDevice<UniformLocation = L>,
    {
        device.use_program(Some(program));
        if let Some(loc) = self.uniform(Uniform::TextureArray) {
            device.set_uniform_i32(loc, self.texture_unit().0 as i32);
        }
        if let Some(loc) = self.uniform(Uniform::ShadowMap) {
            device.set_uniform_i32(loc, self.shadow_map_unit().0 as i32);
        }
    }
}

/// Resolves the whole vocabulary against `program`.
pub fn resolve<D: GpuDevice>(
    device: &D,
    program: D::Program,
    is_alternate_texture_technique: bool,
) -> LocationTable<D::UniformLocation> {
    let technique = TextureTechnique::from_alternate(is_alternate_texture_technique);
    let attributes = Attribute::ALL.map(|a| device.attribute_location(program, a.identifier()));
    let uniforms =
        Uniform::ALL.map(|u| device.uniform_location(program, u.identifier(technique)));

    let table = LocationTable { technique, attributes, uniforms };
    log::trace!(
        "resolved {} of {} locations for {program:?}",
        table.resolved_count(),
        Attribute::ALL.len() + Uniform::ALL.len()
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessDevice;
    use crate::shader::compiler::build_program;

    const VS: &str = "in vec3 aPosition;\n\
        in vec3 aNormal;\n\
        in vec3 aColor;\n\
        uniform mat4 uProjectionMatrix;\n\
        uniform mat4 uViewMatrix;\n\
        void main() { gl_Position = uProjectionMatrix * uViewMatrix * vec4(aPosition, 1.0); }\n";

    const FS: &str = "uniform sampler2DArray uTextureArray;\n\
        uniform sampler2DArray uPBRTextureArray;\n\
        uniform float uTime;\n\
        out vec4 c;\n\
        void main() { c = vec4(uTime); }\n";

    #[test]
    fn slots_match_vocabulary_order() {
        for (i, a) in Attribute::ALL.iter().enumerate() {
            assert_eq!(a.slot(), i);
        }
        for (i, u) in Uniform::ALL.iter().enumerate() {
            assert_eq!(u.slot(), i);
        }
    }

    #[test]
    fn absent_names_resolve_to_none() {
        let device = HeadlessDevice::new();
        let program = build_program(&device, "t", VS, FS).unwrap();
        let table = resolve(&device, program.handle(), false);

        assert_eq!(table.attribute(Attribute::Position), Some(0));
        assert_eq!(table.attribute(Attribute::Color), Some(2));
        assert_eq!(table.attribute(Attribute::TexCoord), None);
        assert!(table.uniform(Uniform::ProjectionMatrix).is_some());
        assert!(table.uniform(Uniform::ShadowMap).is_none());
        assert!(table.uniform(Uniform::LightSpaceMatrix).is_none());
        assert_eq!(table.resolved_count(), 3 + 2 + 2);
        assert!(device.errors().is_empty());
    }

    #[test]
    fn alternate_technique_picks_alternate_sampler() {
        let device = HeadlessDevice::new();
        let program = build_program(&device, "t", VS, FS).unwrap();

        let standard = resolve(&device, program.handle(), false);
        let alternate = resolve(&device, program.handle(), true);

        assert_eq!(standard.texture_unit(), TextureUnit::STANDARD);
        assert_eq!(alternate.texture_unit(), TextureUnit::ALTERNATE);
        assert_ne!(
            standard.uniform(Uniform::TextureArray),
            alternate.uniform(Uniform::TextureArray)
        );
        assert_eq!(standard.uniform(Uniform::Time), alternate.uniform(Uniform::Time));
    }

    #[test]
    fn bind_samplers_skips_absent_shadow_map() {
        let device = HeadlessDevice::new();
        let program = build_program(&device, "t", VS, FS).unwrap();
        let table = resolve(&device, program.handle(), true);

        table.bind_samplers(&device, program.handle());

        assert_eq!(device.uniform_value(program.handle(), "uPBRTextureArray"), Some(1));
        assert_eq!(device.uniform_value(program.handle(), "uTextureArray"), None);
        assert!(device.errors().is_empty());
    }

    #[test]
    fn unit_assignments_do_not_collide() {
        let units = [TextureUnit::STANDARD, TextureUnit::ALTERNATE, TextureUnit::SHADOW_MAP];
        for (i, a) in units.iter().enumerate() {
            for b in &units[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
