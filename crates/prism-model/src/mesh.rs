// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A mesh resident on the GPU: one interleaved vertex buffer, one index buffer, and
//! the layout variants generated for it so far.

use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::Pod;
use prism_core::math::{Mat4, UVec4, Vec3, Vec4};
use prism_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, IndexFormat, PrimitiveTopology,
    RenderPass, ResourceError, VertexBufferLayoutDescriptor,
};
use prism_core::scene::{PrimitiveKind, SceneMesh, MAX_TEX_COORD_SETS};
use prism_lanes::asset_lane::post_process;

use crate::error::ModelError;
use crate::material::MaterialData;
use crate::vertex::{VertexAttrib, VertexAttribData, VertexLayout};

/// Bone influences stored per vertex.
pub const MAX_VERTEX_BONES: usize = 4;

/// The channels a scene mesh can provide.
pub fn scene_mesh_channels(mesh: &SceneMesh) -> VertexAttribData {
    let mut channels = VertexAttribData::POSITION;
    channels.set(VertexAttribData::NORMAL, mesh.has_normals());
    for set in 0..MAX_TEX_COORD_SETS {
        if let Some(attrib) = VertexAttrib::tex_coord(set) {
            channels.set(attrib.flag(), mesh.has_tex_coords(set));
        }
    }
    channels.set(VertexAttribData::COLOR, mesh.has_colors());
    channels.set(VertexAttribData::BONES, mesh.has_bones());
    channels.set(VertexAttribData::TANGENT, mesh.tangents.is_some());
    channels.set(VertexAttribData::BITANGENT, mesh.bitangents.is_some());
    channels
}

/// Keeps the `MAX_VERTEX_BONES` heaviest `(bone, weight)` pairs, heaviest first.
///
/// Returns `None` when there is no influence at all.
pub(crate) fn strongest_influences(mut influences: Vec<(usize, f32)>) -> Option<(UVec4, Vec4)> {
    if influences.is_empty() {
        return None;
    }
    influences.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut indices = [0u32; MAX_VERTEX_BONES];
    let mut weights = [0f32; MAX_VERTEX_BONES];
    for (slot, (bone, weight)) in influences.into_iter().take(MAX_VERTEX_BONES).enumerate() {
        indices[slot] = bone as u32;
        weights[slot] = weight;
    }
    Some((UVec4::from_array(indices), Vec4::from_array(weights)))
}

fn per_vertex_bones(mesh: &SceneMesh) -> (Vec<UVec4>, Vec<Vec4>) {
    let mut influences: Vec<Vec<(usize, f32)>> = vec![Vec::new(); mesh.vertex_count()];
    for (bone_index, bone) in mesh.bones.iter().enumerate() {
        for weight in &bone.weights {
            match influences.get_mut(weight.vertex_id as usize) {
                Some(list) => list.push((bone_index, weight.weight)),
                None => log::warn!(
                    "Bone '{}' of mesh '{}' weights missing vertex {}",
                    bone.name,
                    mesh.name,
                    weight.vertex_id
                ),
            }
        }
    }
    influences
        .into_iter()
        .map(|list| strongest_influences(list).unwrap_or((UVec4::ZERO, Vec4::ZERO)))
        .unzip()
}

/// Writes one value per vertex at `offset` inside each `stride`-sized vertex.
fn write_channel<T: Pod>(bytes: &mut [u8], stride: usize, offset: usize, values: &[T]) {
    let size = std::mem::size_of::<T>();
    for (vertex, value) in bytes.chunks_exact_mut(stride).zip(values) {
        vertex[offset..offset + size].copy_from_slice(bytemuck::bytes_of(value));
    }
}

/// CPU side of a mesh: the packed vertices and indices, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Name of the source mesh.
    pub name: String,
    /// Layout of `vertex_data`.
    pub layout: VertexLayout,
    /// How the indices are assembled.
    pub topology: PrimitiveTopology,
    /// Interleaved vertices, `layout.stride()` bytes each.
    pub vertex_data: Vec<u8>,
    /// Vertex indices.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Packs the `channels` of `mesh` that it actually provides.
    ///
    /// Triangle fans are turned into lists since the GPU cannot draw them.
    pub fn from_scene_mesh(mesh: &SceneMesh, channels: VertexAttribData) -> Self {
        let present = channels & scene_mesh_channels(mesh);
        let layout = VertexLayout::new(present);
        let stride = layout.stride() as usize;
        let mut vertex_data = vec![0u8; stride * mesh.vertex_count()];

        let bones = present
            .intersects(VertexAttribData::BONES)
            .then(|| per_vertex_bones(mesh));
        for attrib in layout.available().attribs() {
            let Some(slot) = layout.slot(attrib) else {
                continue;
            };
            let offset = slot.offset as usize;
            let bytes = vertex_data.as_mut_slice();
            match attrib {
                VertexAttrib::Position => write_channel(bytes, stride, offset, &mesh.positions),
                VertexAttrib::Normal => {
                    if let Some(normals) = &mesh.normals {
                        write_channel(bytes, stride, offset, normals);
                    }
                }
                VertexAttrib::TexCoord0 | VertexAttrib::TexCoord1 | VertexAttrib::TexCoord2 => {
                    let set = attrib as usize - VertexAttrib::TexCoord0 as usize;
                    if let Some(uvs) = &mesh.tex_coords[set] {
                        write_channel(bytes, stride, offset, uvs);
                    }
                }
                VertexAttrib::Color => {
                    if let Some(colors) = &mesh.colors {
                        write_channel(bytes, stride, offset, colors);
                    }
                }
                VertexAttrib::BoneIndices => {
                    if let Some((indices, _)) = &bones {
                        write_channel(bytes, stride, offset, indices);
                    }
                }
                VertexAttrib::BoneWeights => {
                    if let Some((_, weights)) = &bones {
                        write_channel(bytes, stride, offset, weights);
                    }
                }
                VertexAttrib::Tangent => {
                    if let Some(tangents) = &mesh.tangents {
                        write_channel(bytes, stride, offset, tangents);
                    }
                }
                VertexAttrib::Bitangent => {
                    if let Some(bitangents) = &mesh.bitangents {
                        write_channel(bytes, stride, offset, bitangents);
                    }
                }
            }
        }

        let (topology, indices) = match mesh.primitive {
            PrimitiveKind::Points => (PrimitiveTopology::PointList, mesh.indices.clone()),
            PrimitiveKind::Lines => (PrimitiveTopology::LineList, mesh.indices.clone()),
            PrimitiveKind::LineStrip => (PrimitiveTopology::LineStrip, mesh.indices.clone()),
            PrimitiveKind::Triangles => (PrimitiveTopology::TriangleList, mesh.indices.clone()),
            PrimitiveKind::TriangleStrip => {
                (PrimitiveTopology::TriangleStrip, mesh.indices.clone())
            }
            PrimitiveKind::TriangleFan => {
                let mut fan = SceneMesh {
                    primitive: PrimitiveKind::TriangleFan,
                    indices: mesh.indices.clone(),
                    ..Default::default()
                };
                post_process::triangulate(&mut fan);
                (PrimitiveTopology::TriangleList, fan.indices)
            }
        };

        Self {
            name: mesh.name.clone(),
            layout,
            topology,
            vertex_data,
            indices,
        }
    }

    /// Number of packed vertices.
    pub fn vertex_count(&self) -> usize {
        match self.layout.stride() {
            0 => 0,
            stride => self.vertex_data.len() / stride as usize,
        }
    }

    fn read<T: Pod>(&self, attrib: VertexAttrib, vertex: usize) -> Option<T> {
        let slot = self.layout.slot(attrib)?;
        if vertex >= self.vertex_count() {
            return None;
        }
        let start = vertex * self.layout.stride() as usize + slot.offset as usize;
        let bytes = self
            .vertex_data
            .get(start..start + std::mem::size_of::<T>())?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }
}

/// A mesh whose buffers live on a [`GraphicsDevice`].
///
/// The buffers are destroyed when the mesh is dropped.
#[derive(Debug)]
pub struct Mesh {
    data: MeshData,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    vertex_layouts: HashMap<VertexAttribData, VertexBufferLayoutDescriptor<'static>>,
    scene_transformation: Mat4,
    material_index: Option<usize>,
    material: MaterialData,
    device: Arc<dyn GraphicsDevice>,
}

impl Mesh {
    /// Uploads `data` into a new vertex buffer and a new index buffer.
    pub fn upload(
        device: Arc<dyn GraphicsDevice>,
        data: MeshData,
        material_index: Option<usize>,
    ) -> Result<Self, ResourceError> {
        let vertex_buffer = device.create_buffer_with_data(
            &BufferDescriptor {
                label: Some(Cow::Owned(format!("{} vertices", data.name))),
                size: data.vertex_data.len() as u64,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            },
            &data.vertex_data,
        )?;
        let index_bytes: &[u8] = bytemuck::cast_slice(&data.indices);
        let index_buffer = match device.create_buffer_with_data(
            &BufferDescriptor {
                label: Some(Cow::Owned(format!("{} indices", data.name))),
                size: index_bytes.len() as u64,
                usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
            },
            index_bytes,
        ) {
            Ok(id) => id,
            Err(e) => {
                if let Err(destroy_error) = device.destroy_buffer(vertex_buffer) {
                    log::warn!("Failed to release vertex buffer of '{}': {destroy_error}", data.name);
                }
                return Err(e);
            }
        };

        log::debug!(
            "Mesh '{}': uploaded {} vertices ({} bytes each) and {} indices",
            data.name,
            data.vertex_count(),
            data.layout.stride(),
            data.indices.len()
        );

        Ok(Self {
            data,
            vertex_buffer,
            index_buffer,
            vertex_layouts: HashMap::new(),
            scene_transformation: Mat4::IDENTITY,
            material_index,
            material: MaterialData::default(),
            device,
        })
    }

    /// Name of the source mesh.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The CPU copy of the packed data.
    pub fn data(&self) -> &MeshData {
        &self.data
    }

    /// Layout of the vertex buffer.
    pub fn layout(&self) -> &VertexLayout {
        &self.data.layout
    }

    /// Channels stored in the vertex buffer.
    pub fn available_attributes(&self) -> VertexAttribData {
        self.data.layout.available()
    }

    /// Primitive topology of the index buffer.
    pub fn topology(&self) -> PrimitiveTopology {
        self.data.topology
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.data.vertex_count()
    }

    /// Number of indices.
    pub fn index_count(&self) -> usize {
        self.data.indices.len()
    }

    /// The vertex buffer.
    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffer
    }

    /// The index buffer (`u32` indices).
    pub fn index_buffer(&self) -> BufferId {
        self.index_buffer
    }

    /// Accumulated transform of the node holding this mesh.
    pub fn scene_transformation(&self) -> Mat4 {
        self.scene_transformation
    }

    pub(crate) fn set_scene_transformation(&mut self, transform: Mat4) {
        self.scene_transformation = transform;
    }

    /// Index of the scene material used by this mesh.
    pub fn material_index(&self) -> Option<usize> {
        self.material_index
    }

    /// Resolved material values.
    pub fn material(&self) -> &MaterialData {
        &self.material
    }

    pub(crate) fn set_material(&mut self, material: MaterialData) {
        self.material = material;
    }

    /// Generates the layout variant for `config` unless it already exists.
    ///
    /// Fails when the mesh does not store every channel of `config`.
    pub fn generate_vertex_layout(
        &mut self,
        config: VertexAttribData,
    ) -> Result<&VertexBufferLayoutDescriptor<'static>, ModelError> {
        match self.vertex_layouts.entry(config) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let layout = self.data.layout.buffer_layout(config).ok_or_else(|| {
                    ModelError::MissingVertexAttributes {
                        mesh: self.data.name.clone(),
                        missing: self.data.layout.missing(config),
                    }
                })?;
                log::debug!("Mesh '{}': generated vertex layout {config:?}", self.data.name);
                Ok(entry.insert(layout))
            }
        }
    }

    /// The layout variant for `config`, if it has been generated.
    pub fn vertex_layout(&self, config: VertexAttribData) -> Option<&VertexBufferLayoutDescriptor<'static>> {
        self.vertex_layouts.get(&config)
    }

    /// Number of layout variants generated so far.
    pub fn vertex_layout_count(&self) -> usize {
        self.vertex_layouts.len()
    }

    /// Binds the buffers and draws every index once.
    pub fn draw<'pass>(&'pass self, pass: &mut dyn RenderPass<'pass>) {
        pass.set_vertex_buffer(0, &self.vertex_buffer, 0);
        pass.set_index_buffer(&self.index_buffer, 0, IndexFormat::Uint32);
        pass.draw_indexed(0..self.data.indices.len() as u32, 0, 0..1);
    }

    /// Position of `vertex`, read back from the packed data.
    pub fn vertex_position(&self, vertex: usize) -> Option<Vec3> {
        self.data
            .read::<[f32; 3]>(VertexAttrib::Position, vertex)
            .map(Vec3::from_array)
    }

    /// Normal of `vertex`, if the mesh stores normals.
    pub fn vertex_normal(&self, vertex: usize) -> Option<Vec3> {
        self.data
            .read::<[f32; 3]>(VertexAttrib::Normal, vertex)
            .map(Vec3::from_array)
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        for buffer in [self.vertex_buffer, self.index_buffer] {
            if let Err(e) = self.device.destroy_buffer(buffer) {
                log::warn!("Mesh '{}': failed to destroy buffer {buffer:?}: {e}", self.data.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::math::Vec2;
    use prism_core::renderer::testing::{PassCommand, RecordingDevice, RecordingPass};
    use prism_core::scene::{Bone, VertexWeight};

    fn triangle() -> SceneMesh {
        SceneMesh {
            name: "tri".into(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: Some(vec![Vec3::Z; 3]),
            tex_coords: [Some(vec![Vec2::ZERO, Vec2::X, Vec2::Y]), None, None],
            indices: vec![0, 1, 2],
            ..Default::default()
        }
    }

    #[test]
    fn packs_only_requested_and_present_channels() {
        let data = MeshData::from_scene_mesh(
            &triangle(),
            VertexAttribData::NORMAL | VertexAttribData::COLOR,
        );
        assert_eq!(data.layout.available(), VertexAttribData::POSITION_NORMAL);
        assert_eq!(data.vertex_data.len(), 3 * 24);
        assert_eq!(data.read::<[f32; 3]>(VertexAttrib::Position, 1), Some([1.0, 0.0, 0.0]));
        assert_eq!(data.read::<[f32; 3]>(VertexAttrib::Normal, 2), Some([0.0, 0.0, 1.0]));
        assert_eq!(data.read::<[f32; 2]>(VertexAttrib::TexCoord0, 0), None);
        assert_eq!(data.read::<[f32; 3]>(VertexAttrib::Position, 3), None);
    }

    #[test]
    fn bones_pack_heaviest_four() {
        let mut mesh = triangle();
        mesh.bones = [0.1f32, 0.5, 0.2, 0.15, 0.05]
            .iter()
            .enumerate()
            .map(|(i, &weight)| Bone {
                name: format!("b{i}"),
                offset_matrix: Mat4::IDENTITY,
                weights: vec![VertexWeight { vertex_id: 1, weight }],
            })
            .collect();
        let data = MeshData::from_scene_mesh(&mesh, VertexAttribData::BONES);

        assert_eq!(
            data.read::<[u32; 4]>(VertexAttrib::BoneIndices, 1),
            Some([1, 2, 3, 0])
        );
        assert_eq!(
            data.read::<[f32; 4]>(VertexAttrib::BoneWeights, 1),
            Some([0.5, 0.2, 0.15, 0.1])
        );
        assert_eq!(data.read::<[f32; 4]>(VertexAttrib::BoneWeights, 0), Some([0.0; 4]));
    }

    #[test]
    fn fans_become_lists() {
        let mut mesh = triangle();
        mesh.positions.push(Vec3::ONE);
        mesh.normals = None;
        mesh.tex_coords = Default::default();
        mesh.primitive = PrimitiveKind::TriangleFan;
        mesh.indices = vec![0, 1, 2, 3];
        let data = MeshData::from_scene_mesh(&mesh, VertexAttribData::EMPTY);
        assert_eq!(data.topology, PrimitiveTopology::TriangleList);
        assert_eq!(data.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn layout_variants_are_created_once() {
        let device = Arc::new(RecordingDevice::new());
        let data = MeshData::from_scene_mesh(&triangle(), VertexAttribData::NORMAL);
        let mut mesh = Mesh::upload(device, data, None).unwrap();

        let first = mesh
            .generate_vertex_layout(VertexAttribData::POSITION_NORMAL)
            .unwrap()
            .clone();
        let second = mesh
            .generate_vertex_layout(VertexAttribData::POSITION_NORMAL)
            .unwrap()
            .clone();
        assert_eq!(first, second);
        assert_eq!(mesh.vertex_layout_count(), 1);
        assert!(matches!(
            mesh.generate_vertex_layout(VertexAttribData::POSITION | VertexAttribData::TEX2D),
            Err(ModelError::MissingVertexAttributes { missing, .. }) if missing == VertexAttribData::TEX2D
        ));
        assert_eq!(mesh.vertex_layout_count(), 1);
    }

    #[test]
    fn draw_binds_buffers_then_draws_indices() {
        let device = Arc::new(RecordingDevice::new());
        let data = MeshData::from_scene_mesh(&triangle(), VertexAttribData::EMPTY);
        let mesh = Mesh::upload(device.clone(), data, None).unwrap();
        assert_eq!(
            device.buffer_data(mesh.index_buffer()).unwrap(),
            bytemuck::cast_slice::<u32, u8>(&[0, 1, 2]).to_vec()
        );

        let mut pass = RecordingPass::default();
        mesh.draw(&mut pass);
        assert_eq!(
            pass.commands,
            vec![
                PassCommand::SetVertexBuffer {
                    slot: 0,
                    buffer: mesh.vertex_buffer(),
                    offset: 0
                },
                PassCommand::SetIndexBuffer {
                    buffer: mesh.index_buffer(),
                    offset: 0,
                    format: IndexFormat::Uint32
                },
                PassCommand::DrawIndexed {
                    indices: 0..3,
                    base_vertex: 0,
                    instances: 0..1
                },
            ]
        );
    }

    #[test]
    fn dropping_mesh_releases_buffers() {
        let device = Arc::new(RecordingDevice::new());
        let data = MeshData::from_scene_mesh(&triangle(), VertexAttribData::EMPTY);
        let mesh = Mesh::upload(device.clone(), data, None).unwrap();
        let buffers = vec![mesh.vertex_buffer(), mesh.index_buffer()];
        assert_eq!(device.live_buffer_count(), 2);
        drop(mesh);
        assert_eq!(device.live_buffer_count(), 0);
        assert_eq!(device.destroyed_buffers(), buffers);
    }

    #[test]
    fn failed_upload_leaves_no_buffers() {
        let device = Arc::new(RecordingDevice::new());
        let data = MeshData::from_scene_mesh(&triangle(), VertexAttribData::EMPTY);
        device.fail_buffer_creation(true);
        assert!(Mesh::upload(device.clone(), data, None).is_err());
        assert_eq!(device.live_buffer_count(), 0);
    }
}
