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

use crate::math::{Mat4, Vec2, Vec3, Vec4};

/// Number of texture coordinate sets a mesh can carry.
pub const MAX_TEX_COORD_SETS: usize = 3;

/// How the index list of a [`SceneMesh`] is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveKind {
    /// One index per point.
    Points,
    /// Two indices per line.
    Lines,
    /// A connected line through all indices.
    LineStrip,
    /// Three indices per triangle.
    #[default]
    Triangles,
    /// A triangle strip.
    TriangleStrip,
    /// A triangle fan around the first index.
    TriangleFan,
}

/// The influence of a bone on one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    /// Index of the influenced vertex within the mesh.
    pub vertex_id: u32,
    /// Strength of the influence, in `[0, 1]`.
    pub weight: f32,
}

/// A bone of a skinned mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    /// Name of the node driving the bone.
    pub name: String,
    /// Transforms from mesh space to bone space in bind pose.
    pub offset_matrix: Mat4,
    /// Vertices influenced by the bone.
    pub weights: Vec<VertexWeight>,
}

/// A single mesh as produced by an import lane.
///
/// Every per-vertex channel that is present has exactly `positions.len()` entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneMesh {
    /// Name of the mesh (may be empty).
    pub name: String,
    /// Primitive interpretation of `indices`.
    pub primitive: PrimitiveKind,
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Vertex normals.
    pub normals: Option<Vec<Vec3>>,
    /// Up to three texture coordinate sets.
    pub tex_coords: [Option<Vec<Vec2>>; MAX_TEX_COORD_SETS],
    /// Vertex colors (first color set).
    pub colors: Option<Vec<Vec4>>,
    /// Vertex tangents.
    pub tangents: Option<Vec<Vec3>>,
    /// Vertex bitangents.
    pub bitangents: Option<Vec<Vec3>>,
    /// Bones of a skinned mesh.
    pub bones: Vec<Bone>,
    /// Vertex indices.
    pub indices: Vec<u32>,
    /// Index into [`super::ImportedScene::materials`].
    pub material_index: Option<usize>,
}

impl SceneMesh {
    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if the mesh has vertex normals.
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Returns `true` if texture coordinate set `set` is present.
    pub fn has_tex_coords(&self, set: usize) -> bool {
        self.tex_coords.get(set).is_some_and(Option::is_some)
    }

    /// Returns `true` if the mesh has vertex colors.
    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    /// Returns `true` if the mesh has both tangents and bitangents.
    pub fn has_tangents_and_bitangents(&self) -> bool {
        self.tangents.is_some() && self.bitangents.is_some()
    }

    /// Returns `true` if the mesh is skinned.
    pub fn has_bones(&self) -> bool {
        !self.bones.is_empty()
    }

    /// Number of faces implied by the index list and primitive kind.
    pub fn face_count(&self) -> usize {
        let n = self.indices.len();
        match self.primitive {
            PrimitiveKind::Points => n,
            PrimitiveKind::Lines => n / 2,
            PrimitiveKind::LineStrip => n.saturating_sub(1),
            PrimitiveKind::Triangles => n / 3,
            PrimitiveKind::TriangleStrip | PrimitiveKind::TriangleFan => n.saturating_sub(2),
        }
    }

    /// Drops every per-vertex channel whose length is not the vertex count,
    /// and bone weights pointing past the last vertex.
    ///
    /// Returns the names of the dropped channels.
    pub fn drop_incomplete_channels(&mut self) -> Vec<&'static str> {
        const TEX_COORD_NAMES: [&str; MAX_TEX_COORD_SETS] = ["uv0", "uv1", "uv2"];

        let vertex_count = self.positions.len();
        let mut dropped = Vec::new();
        drop_if_incomplete(&mut self.normals, vertex_count, "normals", &mut dropped);
        for (set, name) in self.tex_coords.iter_mut().zip(TEX_COORD_NAMES) {
            drop_if_incomplete(set, vertex_count, name, &mut dropped);
        }
        drop_if_incomplete(&mut self.colors, vertex_count, "colors", &mut dropped);
        drop_if_incomplete(&mut self.tangents, vertex_count, "tangents", &mut dropped);
        drop_if_incomplete(&mut self.bitangents, vertex_count, "bitangents", &mut dropped);

        for bone in &mut self.bones {
            let before = bone.weights.len();
            bone.weights.retain(|w| (w.vertex_id as usize) < vertex_count);
            if bone.weights.len() != before {
                log::warn!(
                    "Bone '{}' of mesh '{}' weights vertices past {vertex_count}; ignoring them",
                    bone.name,
                    self.name
                );
            }
        }

        for name in &dropped {
            log::warn!(
                "Mesh '{}' has {name} for only part of its {vertex_count} vertices; dropping them",
                self.name
            );
        }
        dropped
    }
}

fn drop_if_incomplete<T>(
    channel: &mut Option<Vec<T>>,
    vertex_count: usize,
    name: &'static str,
    dropped: &mut Vec<&'static str>,
) {
    if channel.as_ref().is_some_and(|values| values.len() != vertex_count) {
        *channel = None;
        dropped.push(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> SceneMesh {
        SceneMesh {
            name: "tri".to_string(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: Some(vec![Vec3::Z; 3]),
            indices: vec![0, 1, 2],
            ..Default::default()
        }
    }

    #[test]
    fn complete_channels_are_kept() {
        let mut mesh = triangle();
        mesh.tex_coords[0] = Some(vec![Vec2::ZERO; 3]);
        assert!(mesh.drop_incomplete_channels().is_empty());
        assert!(mesh.has_normals());
        assert!(mesh.has_tex_coords(0));
    }

    #[test]
    fn short_and_long_channels_are_dropped() {
        let mut mesh = triangle();
        mesh.tex_coords[1] = Some(vec![Vec2::ZERO; 2]);
        mesh.colors = Some(vec![Vec4::ONE; 4]);
        mesh.bones.push(Bone {
            name: "arm".to_string(),
            offset_matrix: Mat4::IDENTITY,
            weights: vec![
                VertexWeight { vertex_id: 2, weight: 1.0 },
                VertexWeight { vertex_id: 7, weight: 1.0 },
            ],
        });

        assert_eq!(mesh.drop_incomplete_channels(), vec!["uv1", "colors"]);
        assert!(mesh.has_normals());
        assert!(!mesh.has_tex_coords(1));
        assert!(!mesh.has_colors());
        assert_eq!(mesh.bones[0].weights, vec![VertexWeight { vertex_id: 2, weight: 1.0 }]);
    }
}
