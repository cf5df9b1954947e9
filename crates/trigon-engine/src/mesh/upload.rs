use std::mem::size_of;

use anyhow::{anyhow, Result};

use crate::gpu::{AttributeLayout, BufferTarget, GpuDevice};
use crate::shader::LocationTable;

use super::packer::{MeshPacker, VertexStream, INDEX_STRIDE};
use super::triangle::Triangle;

/// GPU copy of a [`MeshPacker`]'s arrays.
///
/// Buffers are declared at the packer's full capacity and re-declared only
/// when the packer grows; between growths each upload writes the live prefix
/// in place.
#[derive(Debug)]
pub struct GpuMesh<D: GpuDevice> {
    vertex: [D::Buffer; VertexStream::ALL.len()],
    indices: D::Buffer,
    /// Triangles the GPU stores were declared for.
    declared_capacity: usize,
    /// Packer index generation last written to `indices`.
    uploaded_indices: Option<u64>,
    live_index_count: usize,
}

impl<D: GpuDevice> GpuMesh<D> {
    pub fn new(device: &D) -> Result<Self> {
        let mut created = Vec::with_capacity(VertexStream::ALL.len() + 1);
        for _ in 0..=VertexStream::ALL.len() {
            match device.create_buffer() {
                Ok(buffer) => created.push(buffer),
                Err(e) => {
                    for buffer in created {
                        device.delete_buffer(buffer);
                    }
                    return Err(anyhow!("failed to create mesh buffer: {e}"));
                }
            }
        }

        Ok(Self {
            vertex: std::array::from_fn(|i| created[i]),
            indices: created[VertexStream::ALL.len()],
            declared_capacity: 0,
            uploaded_indices: None,
            live_index_count: 0,
        })
    }

    /// Mirrors the packer's live data onto the GPU and returns the index count
    /// to draw.
    pub fn upload(&mut self, device: &D, packer: &MeshPacker) -> usize {
        let capacity = packer.capacity();
        if capacity != self.declared_capacity {
            for stream in VertexStream::ALL {
                device.declare_buffer(
                    BufferTarget::Vertex,
                    self.vertex_buffer(stream),
                    capacity * stream.stride() * size_of::<f32>(),
                );
            }
            device.declare_buffer(
                BufferTarget::Index,
                self.indices,
                capacity * INDEX_STRIDE * size_of::<u32>(),
            );
            log::debug!(
                "mesh buffers re-declared for {capacity} triangles (was {})",
                self.declared_capacity
            );
            self.declared_capacity = capacity;
            self.uploaded_indices = None;
        }

        if packer.live_triangles() > 0 {
            for stream in VertexStream::ALL {
                let data = packer.live_stream(stream);
                device.update_buffer(
                    BufferTarget::Vertex,
                    self.vertex_buffer(stream),
                    bytemuck::cast_slice(data),
                );
            }

            let generation = packer.index_generation();
            if self.uploaded_indices != Some(generation) {
                device.update_buffer(
                    BufferTarget::Index,
                    self.indices,
                    bytemuck::cast_slice(packer.live_indices()),
                );
                self.uploaded_indices = Some(generation);
            }
        }

        self.live_index_count = packer.live_index_count();
        log::trace!("mesh upload: {} indices live", self.live_index_count);
        self.live_index_count
    }

    /// Packs `triangles` and uploads the result in one step.
    pub fn pack_and_upload(
        &mut self,
        device: &D,
        packer: &mut MeshPacker,
        triangles: &[Triangle],
    ) -> usize {
        packer.pack(triangles);
        self.upload(device, packer)
    }

    /// Points every attribute the program declares at its stream.
    pub fn bind_attributes(&self, device: &D, locations: &LocationTable<D::UniformLocation>) {
        for stream in VertexStream::ALL {
            if let Some(location) = locations.attribute(stream.attribute()) {
                device.bind_attribute(
                    self.vertex_buffer(stream),
                    AttributeLayout { location, components: stream.components() as i32 },
                );
            }
        }
    }

    /// Draws the live triangles from the last upload.
    pub fn draw(&self, device: &D) {
        if self.live_index_count > 0 {
            device.draw_indexed_triangles(self.indices, self.live_index_count);
        }
    }

    #[inline]
    pub fn live_index_count(&self) -> usize {
        self.live_index_count
    }

    #[inline]
    pub fn declared_capacity(&self) -> usize {
        self.declared_capacity
    }

    #[inline]
    pub fn vertex_buffer(&self, stream: VertexStream) -> D::Buffer {
        self.vertex[stream as usize]
    }

    #[inline]
    pub fn index_buffer(&self) -> D::Buffer {
        self.indices
    }

    pub fn destroy(self, device: &D) {
        for buffer in self.vertex {
            device.delete_buffer(buffer);
        }
        device.delete_buffer(self.indices);
    }
}
