use crate::config::PackerConfig;
use crate::shader::Attribute;

use super::color::ColorCache;
use super::triangle::Triangle;

/// Per-vertex float streams written for every triangle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexStream {
    Positions,
    Normals,
    Colors,
    TexCoords,
    TextureIndices,
    UseTexture,
}

impl VertexStream {
    pub const ALL: [VertexStream; 6] = [
        VertexStream::Positions,
        VertexStream::Normals,
        VertexStream::Colors,
        VertexStream::TexCoords,
        VertexStream::TextureIndices,
        VertexStream::UseTexture,
    ];

    /// Floats per vertex.
    pub const fn components(self) -> usize {
        match self {
            VertexStream::Positions | VertexStream::Normals | VertexStream::Colors => 3,
            VertexStream::TexCoords => 2,
            VertexStream::TextureIndices | VertexStream::UseTexture => 1,
        }
    }

    /// Floats per triangle.
    #[inline]
    pub const fn stride(self) -> usize {
        self.components() * 3
    }

    /// Shader input fed by this stream.
    pub const fn attribute(self) -> Attribute {
        match self {
            VertexStream::Positions => Attribute::Position,
            VertexStream::Normals => Attribute::Normal,
            VertexStream::Colors => Attribute::Color,
            VertexStream::TexCoords => Attribute::TexCoord,
            VertexStream::TextureIndices => Attribute::TextureIndex,
            VertexStream::UseTexture => Attribute::UseTexture,
        }
    }

    #[inline]
    const fn slot(self) -> usize {
        self as usize
    }
}

/// Indices per triangle.
pub const INDEX_STRIDE: usize = 3;

/// Flat backing arrays sized for `capacity` triangles.
///
/// Only the prefix covering the live triangles is meaningful; the rest is
/// stale or zero.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedGeometry {
    vertex: [Vec<f32>; VertexStream::ALL.len()],
    indices: Vec<u32>,
}

impl PackedGeometry {
    fn with_capacity(triangles: usize) -> Self {
        Self {
            vertex: VertexStream::ALL.map(|s| vec![0.0; s.stride() * triangles]),
            indices: vec![0; INDEX_STRIDE * triangles],
        }
    }

    /// Capacity in triangles.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.indices.len() / INDEX_STRIDE
    }

    #[inline]
    pub fn stream(&self, stream: VertexStream) -> &[f32] {
        &self.vertex[stream.slot()]
    }

    #[inline]
    pub fn positions(&self) -> &[f32] {
        self.stream(VertexStream::Positions)
    }

    #[inline]
    pub fn normals(&self) -> &[f32] {
        self.stream(VertexStream::Normals)
    }

    #[inline]
    pub fn colors(&self) -> &[f32] {
        self.stream(VertexStream::Colors)
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

/// Result of one [`MeshPacker::pack`] call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PackStats {
    /// Indices to draw (3 × live triangles).
    pub live_index_count: usize,
    /// The backing arrays were reallocated.
    pub grew: bool,
    /// The index array was rewritten.
    pub indices_rewritten: bool,
}

/// Packs triangle lists into flat vertex/index arrays, reusing storage.
///
/// Growth reallocates without copying, which is only sound because `pack`
/// rewrites the whole live prefix right after growing. Growth is therefore
/// private to `pack`.
#[derive(Debug)]
pub struct MeshPacker {
    config: PackerConfig,
    buffers: PackedGeometry,
    colors: ColorCache,
    live_triangles: usize,
    /// Triangle count the index prefix currently covers.
    indexed_triangles: usize,
    index_generation: u64,
}

impl MeshPacker {
    pub fn new(config: PackerConfig) -> Self {
        Self {
            buffers: PackedGeometry::with_capacity(config.initial_capacity),
            config,
            colors: ColorCache::new(),
            live_triangles: 0,
            indexed_triangles: 0,
            index_generation: 0,
        }
    }

    /// Repacks `triangles` from scratch into the live prefix.
    pub fn pack(&mut self, triangles: &[Triangle]) -> PackStats {
        let count = triangles.len();
        let grew = self.ensure_capacity(count);

        let chunk_size = self.config.effective_chunk_size();
        for (chunk_index, chunk) in triangles.chunks(chunk_size).enumerate() {
            let base = chunk_index * chunk_size;
            for (offset, triangle) in chunk.iter().enumerate() {
                let rgb = self.colors.rgb(&triangle.color);
                write_triangle(&mut self.buffers, base + offset, triangle, rgb);
            }
        }
        self.live_triangles = count;

        // A fresh allocation has no index prefix at all, so growth forces a rewrite.
        let indices_rewritten = grew || count != self.indexed_triangles;
        if indices_rewritten {
            for (i, index) in self.buffers.indices[..count * INDEX_STRIDE].iter_mut().enumerate() {
                *index = i as u32;
            }
            self.indexed_triangles = count;
            self.index_generation += 1;
        }

        PackStats { live_index_count: self.live_index_count(), grew, indices_rewritten }
    }

    /// Reallocates (without copying) when `triangles` exceeds capacity.
    fn ensure_capacity(&mut self, triangles: usize) -> bool {
        let required = VertexStream::Positions.stride() * triangles;
        if required <= self.buffers.positions().len() {
            return false;
        }

        let grown = (triangles as f64 * f64::from(self.config.effective_growth_factor())).ceil();
        let capacity = (grown as usize).max(triangles);
        log::debug!(
            "mesh packer growing from {} to {capacity} triangles ({triangles} requested)",
            self.buffers.capacity()
        );
        self.buffers = PackedGeometry::with_capacity(capacity);
        true
    }

    #[inline]
    pub fn buffers(&self) -> &PackedGeometry {
        &self.buffers
    }

    /// Capacity in triangles.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffers.capacity()
    }

    #[inline]
    pub fn live_triangles(&self) -> usize {
        self.live_triangles
    }

    #[inline]
    pub fn live_index_count(&self) -> usize {
        self.live_triangles * INDEX_STRIDE
    }

    /// Meaningful prefix of `stream`.
    #[inline]
    pub fn live_stream(&self, stream: VertexStream) -> &[f32] {
        &self.buffers.stream(stream)[..self.live_triangles * stream.stride()]
    }

    #[inline]
    pub fn live_indices(&self) -> &[u32] {
        &self.buffers.indices[..self.live_index_count()]
    }

    /// Bumped each time the index array is rewritten.
    #[inline]
    pub fn index_generation(&self) -> u64 {
        self.index_generation
    }

    #[inline]
    pub fn color_cache(&self) -> &ColorCache {
        &self.colors
    }
}

#[inline]
fn write_triangle(buffers: &mut PackedGeometry, t: usize, triangle: &Triangle, rgb: [f32; 3]) {
    let [v0, v1, v2] = &triangle.vertices;
    let [positions, normals, colors, tex_coords, texture_indices, use_texture] = &mut buffers.vertex;

    let p = &mut positions[t * 9..t * 9 + 9];
    p[0..3].copy_from_slice(v0);
    p[3..6].copy_from_slice(v1);
    p[6..9].copy_from_slice(v2);

    let n = &mut normals[t * 9..t * 9 + 9];
    n[0..3].copy_from_slice(&triangle.normal);
    n[3..6].copy_from_slice(&triangle.normal);
    n[6..9].copy_from_slice(&triangle.normal);

    let c = &mut colors[t * 9..t * 9 + 9];
    c[0..3].copy_from_slice(&rgb);
    c[3..6].copy_from_slice(&rgb);
    c[6..9].copy_from_slice(&rgb);

    let uv = &mut tex_coords[t * 6..t * 6 + 6];
    let layer = &mut texture_indices[t * 3..t * 3 + 3];
    let flag = &mut use_texture[t * 3..t * 3 + 3];
    match &triangle.texture {
        Some(texture) => {
            let [uv0, uv1, uv2] = &texture.uvs;
            uv[0..2].copy_from_slice(uv0);
            uv[2..4].copy_from_slice(uv1);
            uv[4..6].copy_from_slice(uv2);
            layer.fill(texture.layer);
            flag.fill(1.0);
        }
        None => {
            uv.fill(0.0);
            layer.fill(0.0);
            flag.fill(0.0);
        }
    }
}
