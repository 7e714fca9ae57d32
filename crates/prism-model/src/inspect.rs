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

//! Human-readable dumps of an imported scene.

use std::io::{self, Write};

use prism_core::math::Mat4;
use prism_core::ImportedScene;

use crate::mesh::scene_mesh_channels;

const INDENT: &str = "  ";

fn format_matrix(matrix: &Mat4) -> String {
    let rows: Vec<String> = (0..4)
        .map(|row| {
            let r = matrix.row(row);
            format!("[{:.3} {:.3} {:.3} {:.3}]", r.x, r.y, r.z, r.w)
        })
        .collect();
    rows.join(" ")
}

/// Writes the node hierarchy, one node per line, children indented under their
/// parent. Each node shows its accumulated transform and the meshes it places.
pub fn print_node_tree(scene: &ImportedScene, out: &mut dyn Write) -> io::Result<()> {
    let mut nodes = Vec::new();
    scene.visit_nodes(|node, accumulated, depth| nodes.push((node, *accumulated, depth)));
    for (node, accumulated, depth) in nodes {
        let pad = INDENT.repeat(depth);
        writeln!(out, "{pad}{} {}", node.name, format_matrix(&accumulated))?;
        for &mesh in &node.meshes {
            let name = scene.mesh_name(mesh).unwrap_or("<missing>");
            writeln!(out, "{pad}{INDENT}mesh {mesh}: {name}")?;
        }
    }
    Ok(())
}

/// Writes every mesh with its counts, vertex channels and bones.
pub fn print_meshes(scene: &ImportedScene, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{} meshes", scene.meshes.len())?;
    for (index, mesh) in scene.meshes.iter().enumerate() {
        writeln!(
            out,
            "mesh {index} '{}': {:?}, {} vertices, {} faces, {} indices",
            mesh.name,
            mesh.primitive,
            mesh.vertex_count(),
            mesh.face_count(),
            mesh.indices.len()
        )?;
        writeln!(out, "{INDENT}channels: {:?}", scene_mesh_channels(mesh))?;
        match scene.material_for_mesh(index) {
            Some(material) => writeln!(out, "{INDENT}material: {}", material.name)?,
            None => writeln!(out, "{INDENT}material: <default>")?,
        }
        for bone in &mesh.bones {
            writeln!(
                out,
                "{INDENT}bone '{}' ({} weights) offset {}",
                bone.name,
                bone.weights.len(),
                format_matrix(&bone.offset_matrix)
            )?;
            for weight in &bone.weights {
                writeln!(out, "{INDENT}{INDENT}{} -> {:.3}", weight.vertex_id, weight.weight)?;
            }
        }
    }
    Ok(())
}

/// Writes every animation clip with its channels and keyframes.
pub fn print_animation_tree(scene: &ImportedScene, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{} animations", scene.animations.len())?;
    for animation in &scene.animations {
        writeln!(
            out,
            "animation '{}': {} ticks at {} ticks/s, {} channels",
            animation.name,
            animation.duration_ticks,
            animation.ticks_per_second,
            animation.channels.len()
        )?;
        for channel in &animation.channels {
            writeln!(out, "{INDENT}node '{}'", channel.node_name)?;
            for key in &channel.position_keys {
                writeln!(out, "{INDENT}{INDENT}position {:.3}: {:?}", key.time, key.value.to_array())?;
            }
            for key in &channel.rotation_keys {
                writeln!(out, "{INDENT}{INDENT}rotation {:.3}: {:?}", key.time, key.value.to_array())?;
            }
            for key in &channel.scaling_keys {
                writeln!(out, "{INDENT}{INDENT}scaling {:.3}: {:?}", key.time, key.value.to_array())?;
            }
            for key in &channel.morph_weight_keys {
                writeln!(out, "{INDENT}{INDENT}weights {:.3}: {:?}", key.time, key.weights)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::math::Vec3;
    use prism_core::scene::{
        NodeAnimationChannel, SceneAnimation, SceneMesh, SceneNode, VectorKey, ROOT_NODE,
    };

    fn scene() -> ImportedScene {
        let mut scene = ImportedScene::new("cube.gltf", "root");
        scene.meshes.push(SceneMesh {
            name: "cube".into(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            indices: vec![0, 1, 2],
            ..Default::default()
        });
        let mut child = SceneNode::new("body");
        child.transform = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        child.meshes.push(0);
        scene.add_child_node(ROOT_NODE, child);
        scene.animations.push(SceneAnimation {
            name: "bob".into(),
            duration_ticks: 10.0,
            ticks_per_second: 25.0,
            channels: vec![NodeAnimationChannel {
                node_name: "body".into(),
                position_keys: vec![VectorKey { time: 0.0, value: Vec3::ZERO }],
                ..Default::default()
            }],
        });
        scene
    }

    fn dump(print: fn(&ImportedScene, &mut dyn Write) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        print(&scene(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn node_tree_indents_children() {
        let text = dump(print_node_tree);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("root [1.000 0.000 0.000 0.000]"));
        assert!(lines[1].starts_with("  body [1.000 0.000 0.000 1.000]"));
        assert_eq!(lines[2], "    mesh 0: cube");
    }

    #[test]
    fn meshes_list_counts_and_channels() {
        let text = dump(print_meshes);
        assert!(text.starts_with("1 meshes\n"));
        assert!(text.contains("mesh 0 'cube': Triangles, 3 vertices, 1 faces, 3 indices"));
        assert!(text.contains("channels: VertexAttribData { POSITION }"));
        assert!(text.contains("material: <default>"));
    }

    #[test]
    fn animation_tree_lists_keys() {
        let text = dump(print_animation_tree);
        assert!(text.contains("animation 'bob': 10 ticks at 25 ticks/s, 1 channels"));
        assert!(text.contains("  node 'body'"));
        assert!(text.contains("    position 0.000: [0.0, 0.0, 0.0]"));
    }
}
