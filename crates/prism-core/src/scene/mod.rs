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

//! The imported scene: a node hierarchy referencing meshes, materials and animations.
//!
//! This is the format-neutral output of every import lane. Meshes, materials and
//! nodes refer to each other by index into the vectors of [`ImportedScene`].

mod animation;
mod material;
mod mesh;

pub use animation::*;
pub use material::*;
pub use mesh::*;

use crate::asset::Asset;
use crate::math::Mat4;

/// A node of the scene hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// Node name (may be empty).
    pub name: String,
    /// Transform relative to the parent node.
    pub transform: Mat4,
    /// Indices of child nodes.
    pub children: Vec<usize>,
    /// Indices of the meshes attached to this node.
    pub meshes: Vec<usize>,
}

impl SceneNode {
    /// Creates a node with an identity transform and no children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            children: Vec::new(),
            meshes: Vec::new(),
        }
    }
}

/// Index of the root node in [`ImportedScene::nodes`].
pub const ROOT_NODE: usize = 0;

/// A fully imported model file.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedScene {
    /// The path the scene was read from.
    pub source_path: String,
    /// All nodes; `nodes[ROOT_NODE]` is the root.
    pub nodes: Vec<SceneNode>,
    /// All meshes.
    pub meshes: Vec<SceneMesh>,
    /// All materials.
    pub materials: Vec<SceneMaterial>,
    /// All animations.
    pub animations: Vec<SceneAnimation>,
}

impl Asset for ImportedScene {}

impl ImportedScene {
    /// Creates a scene holding only a root node.
    pub fn new(source_path: impl Into<String>, root_name: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            nodes: vec![SceneNode::new(root_name)],
            meshes: Vec::new(),
            materials: Vec::new(),
            animations: Vec::new(),
        }
    }

    /// The root node, if the scene has any node at all.
    pub fn root(&self) -> Option<&SceneNode> {
        self.nodes.get(ROOT_NODE)
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Appends a node under `parent` and returns its index.
    pub fn add_child_node(&mut self, parent: usize, node: SceneNode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(index);
        }
        index
    }

    /// Visits every node reachable from the root, parents before children.
    ///
    /// The callback receives the node, its accumulated transform (`parent * local`)
    /// and its depth, the root being at depth 0.
    pub fn visit_nodes<'a, F>(&'a self, mut visitor: F)
    where
        F: FnMut(&'a SceneNode, &Mat4, usize),
    {
        let mut stack = vec![(ROOT_NODE, Mat4::IDENTITY, 0usize)];
        let mut visited = vec![false; self.nodes.len()];
        while let Some((index, parent_transform, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(index) else {
                log::warn!("Scene '{}' references missing node {index}", self.source_path);
                continue;
            };
            if std::mem::replace(&mut visited[index], true) {
                log::warn!("Scene '{}' visits node {index} twice, skipping", self.source_path);
                continue;
            }
            let accumulated = parent_transform * node.transform;
            visitor(node, &accumulated, depth);
            // Reversed so that children are visited in declaration order.
            for &child in node.children.iter().rev() {
                stack.push((child, accumulated, depth + 1));
            }
        }
    }

    /// Name of the mesh at `mesh_index`.
    pub fn mesh_name(&self, mesh_index: usize) -> Option<&str> {
        self.meshes.get(mesh_index).map(|mesh| mesh.name.as_str())
    }

    /// Index of the first mesh named `name`.
    pub fn index_of_mesh_with_name(&self, name: &str) -> Option<usize> {
        self.meshes.iter().position(|mesh| mesh.name == name)
    }

    /// The material used by the mesh at `mesh_index`.
    pub fn material_for_mesh(&self, mesh_index: usize) -> Option<&SceneMaterial> {
        self.meshes
            .get(mesh_index)
            .and_then(|mesh| mesh.material_index)
            .and_then(|material| self.materials.get(material))
    }

    /// Name of the first texture of `texture_type` used by a mesh's material.
    ///
    /// Returns an empty string if the mesh, its material or the texture is missing.
    pub fn texture_name(&self, mesh_index: usize, texture_type: TextureType) -> String {
        self.material_for_mesh(mesh_index)
            .and_then(|material| material.texture(texture_type))
            .unwrap_or_default()
            .to_string()
    }

    /// Shorthand for [`Self::texture_name`] with [`TextureType::Diffuse`].
    pub fn diffuse_texture_name(&self, mesh_index: usize) -> String {
        self.texture_name(mesh_index, TextureType::Diffuse)
    }

    /// Shorthand for [`Self::texture_name`] with [`TextureType::Specular`].
    pub fn specular_texture_name(&self, mesh_index: usize) -> String {
        self.texture_name(mesh_index, TextureType::Specular)
    }

    /// Shorthand for [`Self::texture_name`] with [`TextureType::Ambient`].
    pub fn ambient_texture_name(&self, mesh_index: usize) -> String {
        self.texture_name(mesh_index, TextureType::Ambient)
    }

    /// Shorthand for [`Self::texture_name`] with [`TextureType::Emissive`].
    pub fn emissive_texture_name(&self, mesh_index: usize) -> String {
        self.texture_name(mesh_index, TextureType::Emissive)
    }

    /// Shorthand for [`Self::texture_name`] with [`TextureType::Height`].
    pub fn height_texture_name(&self, mesh_index: usize) -> String {
        self.texture_name(mesh_index, TextureType::Height)
    }

    /// Shorthand for [`Self::texture_name`] with [`TextureType::Normals`].
    pub fn normals_texture_name(&self, mesh_index: usize) -> String {
        self.texture_name(mesh_index, TextureType::Normals)
    }

    /// Shorthand for [`Self::texture_name`] with [`TextureType::Shininess`].
    pub fn shininess_texture_name(&self, mesh_index: usize) -> String {
        self.texture_name(mesh_index, TextureType::Shininess)
    }

    /// Shorthand for [`Self::texture_name`] with [`TextureType::Opacity`].
    pub fn opacity_texture_name(&self, mesh_index: usize) -> String {
        self.texture_name(mesh_index, TextureType::Opacity)
    }

    /// Shorthand for [`Self::texture_name`] with [`TextureType::Displacement`].
    pub fn displacement_texture_name(&self, mesh_index: usize) -> String {
        self.texture_name(mesh_index, TextureType::Displacement)
    }

    /// Shorthand for [`Self::texture_name`] with [`TextureType::Reflection`].
    pub fn reflection_texture_name(&self, mesh_index: usize) -> String {
        self.texture_name(mesh_index, TextureType::Reflection)
    }

    /// Shorthand for [`Self::texture_name`] with [`TextureType::Lightmap`].
    pub fn lightmap_texture_name(&self, mesh_index: usize) -> String {
        self.texture_name(mesh_index, TextureType::Lightmap)
    }

    /// Every `(bone index, weight)` pair influencing a vertex, in bone order.
    pub fn vertex_weights_for(&self, mesh_index: usize, vertex_id: u32) -> Vec<(usize, f32)> {
        let Some(mesh) = self.meshes.get(mesh_index) else {
            return Vec::new();
        };
        mesh.bones
            .iter()
            .enumerate()
            .flat_map(|(bone_index, bone)| {
                bone.weights
                    .iter()
                    .filter(move |w| w.vertex_id == vertex_id)
                    .map(move |w| (bone_index, w.weight))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    fn two_level_scene() -> ImportedScene {
        let mut scene = ImportedScene::new("models/crate.obj", "root");
        scene.nodes[ROOT_NODE].transform = Mat4::from_translation(Vec3::X);
        let mut arm = SceneNode::new("arm");
        arm.transform = Mat4::from_translation(Vec3::Y);
        let arm = scene.add_child_node(ROOT_NODE, arm);
        scene.add_child_node(arm, SceneNode::new("hand"));
        scene.add_child_node(ROOT_NODE, SceneNode::new("leg"));
        scene
    }

    #[test]
    fn visit_accumulates_parent_first() {
        let scene = two_level_scene();
        let mut visited = Vec::new();
        scene.visit_nodes(|node, transform, depth| {
            visited.push((node.name.clone(), transform.w_axis.truncate(), depth));
        });
        assert_eq!(
            visited,
            vec![
                ("root".to_string(), Vec3::X, 0),
                ("arm".to_string(), Vec3::new(1.0, 1.0, 0.0), 1),
                ("hand".to_string(), Vec3::new(1.0, 1.0, 0.0), 2),
                ("leg".to_string(), Vec3::X, 1),
            ]
        );
    }

    #[test]
    fn texture_name_returns_first_or_empty() {
        let mut scene = two_level_scene();
        let mut material = SceneMaterial::default();
        material.add_texture(TextureType::Diffuse, "wood.png");
        material.add_texture(TextureType::Diffuse, "wood_detail.png");
        scene.materials.push(material);
        scene.meshes.push(SceneMesh {
            name: "lid".into(),
            material_index: Some(0),
            ..Default::default()
        });
        scene.meshes.push(SceneMesh::default());

        assert_eq!(scene.diffuse_texture_name(0), "wood.png");
        assert_eq!(scene.normals_texture_name(0), "");
        assert_eq!(scene.diffuse_texture_name(1), "");
        assert_eq!(scene.diffuse_texture_name(9), "");
        assert_eq!(scene.index_of_mesh_with_name("lid"), Some(0));
        assert_eq!(scene.index_of_mesh_with_name("box"), None);
    }

    #[test]
    fn vertex_weights_follow_bone_order() {
        let mut scene = ImportedScene::new("skin.gltf", "root");
        let bone = |name: &str, weights: &[(u32, f32)]| Bone {
            name: name.into(),
            offset_matrix: Mat4::IDENTITY,
            weights: weights
                .iter()
                .map(|&(vertex_id, weight)| VertexWeight { vertex_id, weight })
                .collect(),
        };
        scene.meshes.push(SceneMesh {
            bones: vec![bone("hip", &[(0, 0.25), (1, 1.0)]), bone("knee", &[(0, 0.75)])],
            ..Default::default()
        });
        assert_eq!(scene.vertex_weights_for(0, 0), vec![(0, 0.25), (1, 0.75)]);
        assert_eq!(scene.vertex_weights_for(0, 2), vec![]);
    }
}
