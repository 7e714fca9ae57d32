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

use std::sync::Arc;

use anyhow::Result;
use approx::assert_relative_eq;
use base64::Engine;
use prism_core::math::{Mat4, Vec2, Vec3, Vec4};
use prism_core::scene::{PrimitiveKind, TextureType, ROOT_NODE};
use prism_lanes::asset_lane::{
    AssetLoaderLane, GltfSceneLane, ImportError, ModelLoaderFlags, NoExternalResources,
    SceneFormat, SceneImporter,
};
use tempfile::tempdir;

// --- Fixtures ---

/// A triangle (positions + u16 indices) followed by a two-key translation track.
fn triangle_buffer() -> Vec<u8> {
    let mut bytes = Vec::new();
    for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    for i in [0u16, 1, 2] {
        bytes.extend_from_slice(&i.to_le_bytes());
    }
    bytes.extend_from_slice(&[0, 0]);
    for v in [0.0f32, 1.0, 0.0, 0.0, 0.0, 0.0, 3.0, 0.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    assert_eq!(bytes.len(), 76);
    bytes
}

fn triangle_gltf(buffer_uri: &str) -> String {
    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "name": "Scene", "nodes": [0] }}],
  "nodes": [{{ "name": "tri", "mesh": 0, "translation": [0.0, 0.0, -2.0] }}],
  "meshes": [{{
    "name": "triangle",
    "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0 }}]
  }}],
  "materials": [{{
    "name": "red",
    "pbrMetallicRoughness": {{ "baseColorFactor": [1.0, 0.0, 0.0, 1.0] }}
  }}],
  "buffers": [{{ "byteLength": 76, "uri": "{buffer_uri}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }},
    {{ "buffer": 0, "byteOffset": 44, "byteLength": 8 }},
    {{ "buffer": 0, "byteOffset": 52, "byteLength": 24 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR",
       "min": [0.0], "max": [1.0] }},
    {{ "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3" }}
  ],
  "animations": [{{
    "name": "slide",
    "channels": [{{ "sampler": 0, "target": {{ "node": 0, "path": "translation" }} }}],
    "samplers": [{{ "input": 2, "output": 3 }}]
  }}]
}}"#
    )
}

fn embedded_triangle_gltf() -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(triangle_buffer());
    triangle_gltf(&format!("data:application/octet-stream;base64,{encoded}"))
}

fn push_f32s(bytes: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
}

/// Byte ranges of the skinned triangle buffer, one per buffer view.
const SKINNED_VIEWS: [(usize, usize); 10] = [
    (0, 36),   // POSITION
    (36, 36),  // NORMAL
    (72, 48),  // TANGENT
    (120, 24), // TEXCOORD_0
    (144, 24), // TEXCOORD_1
    (168, 48), // COLOR_0
    (216, 24), // JOINTS_0
    (240, 48), // WEIGHTS_0
    (288, 6),  // indices
    (296, 192), // inverse bind matrices
];

/// A triangle skinned to joints `[hip, unused, knee]`; `unused` weights no vertex.
fn skinned_triangle_buffer() -> Vec<u8> {
    let mut bytes = Vec::new();
    push_f32s(&mut bytes, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    push_f32s(&mut bytes, &[0.0, 0.0, 1.0].repeat(3));
    push_f32s(&mut bytes, &[1.0, 0.0, 0.0, -1.0].repeat(3));
    push_f32s(&mut bytes, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    push_f32s(&mut bytes, &[0.5, 0.5, 0.25, 0.5, 0.5, 0.75]);
    push_f32s(
        &mut bytes,
        &[1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0],
    );
    for joint in [0u16, 0, 0, 0, 0, 2, 0, 0, 2, 0, 0, 0] {
        bytes.extend_from_slice(&joint.to_le_bytes());
    }
    push_f32s(
        &mut bytes,
        &[1.0, 0.0, 0.0, 0.0, 0.25, 0.75, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
    );
    for i in [0u16, 1, 2] {
        bytes.extend_from_slice(&i.to_le_bytes());
    }
    bytes.extend_from_slice(&[0, 0]);
    for m in [
        Mat4::IDENTITY,
        Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)),
        Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0)),
    ] {
        push_f32s(&mut bytes, &m.to_cols_array());
    }
    assert_eq!(bytes.len(), 488);
    bytes
}

fn skinned_triangle_gltf() -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(skinned_triangle_buffer());
    let views: Vec<String> = SKINNED_VIEWS
        .iter()
        .map(|(offset, length)| {
            format!(r#"{{ "buffer": 0, "byteOffset": {offset}, "byteLength": {length} }}"#)
        })
        .collect();
    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0, 1, 3] }}],
  "nodes": [
    {{ "name": "body", "mesh": 0, "skin": 0 }},
    {{ "name": "hip", "children": [2] }},
    {{ "name": "knee", "translation": [1.0, 0.0, 0.0] }},
    {{ "name": "unused" }}
  ],
  "skins": [{{ "joints": [1, 3, 2], "inverseBindMatrices": 9 }}],
  "meshes": [{{
    "name": "leg",
    "primitives": [{{
      "attributes": {{
        "POSITION": 0, "NORMAL": 1, "TANGENT": 2, "TEXCOORD_0": 3, "TEXCOORD_1": 4,
        "COLOR_0": 5, "JOINTS_0": 6, "WEIGHTS_0": 7
      }},
      "indices": 8
    }}]
  }}],
  "buffers": [{{ "byteLength": 488, "uri": "data:application/octet-stream;base64,{encoded}" }}],
  "bufferViews": [{views}],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" }},
    {{ "bufferView": 3, "componentType": 5126, "count": 3, "type": "VEC2" }},
    {{ "bufferView": 4, "componentType": 5126, "count": 3, "type": "VEC2" }},
    {{ "bufferView": 5, "componentType": 5126, "count": 3, "type": "VEC4" }},
    {{ "bufferView": 6, "componentType": 5123, "count": 3, "type": "VEC4" }},
    {{ "bufferView": 7, "componentType": 5126, "count": 3, "type": "VEC4" }},
    {{ "bufferView": 8, "componentType": 5123, "count": 3, "type": "SCALAR" }},
    {{ "bufferView": 9, "componentType": 5126, "count": 3, "type": "MAT4" }}
  ]
}}"#,
        views = views.join(",\n    ")
    )
}

const QUAD_OBJ: &str = "\
mtllib quad.mtl
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
usemtl wood
f 1/1 2/2 3/3 4/4
";

const QUAD_MTL: &str = "\
newmtl wood
Kd 0.8 0.6 0.4
Ks 0.1 0.1 0.1
Ns 10
d 0.5
map_Kd textures/wood.png
map_Bump -bm 0.5 wood_bump.png
norm wood_n.png
";

/// Two faces, one with `v/vt/vn` corners and one with `v//vn` corners.
const MIXED_UV_OBJ: &str = "\
o mixed
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
v 2 1 0
vt 0 0
vt 1 0
vt 1 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
f 3//1 4//1 5//1
";

const MIXED_UV_NO_NORMALS_OBJ: &str = "\
o mixed
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
v 2 1 0
vt 0 0
vt 1 0
vt 1 1
f 1/1 2/2 3/3
f 3 4 5
";

// --- glTF ---

#[test]
fn test_gltf_with_embedded_buffer() -> Result<()> {
    let lane = GltfSceneLane::new(Arc::new(NoExternalResources));
    let scene = lane.load(embedded_triangle_gltf().as_bytes()).map_err(anyhow::Error::msg)?;

    assert_eq!(scene.nodes[ROOT_NODE].name, "Scene");
    assert_eq!(scene.nodes.len(), 2);
    assert_eq!(scene.nodes[1].name, "tri");
    assert_eq!(scene.nodes[1].meshes, vec![0]);
    assert_relative_eq!(scene.nodes[1].transform.w_axis.truncate(), Vec3::new(0.0, 0.0, -2.0));

    let mesh = &scene.meshes[0];
    assert_eq!(mesh.name, "triangle");
    assert_eq!(mesh.primitive, PrimitiveKind::Triangles);
    assert_eq!(mesh.positions[1], Vec3::X);
    assert_eq!(mesh.indices, vec![0, 1, 2]);
    assert!(!mesh.has_normals());

    let material = scene.material_for_mesh(0).expect("material");
    assert_eq!(material.name, "red");
    assert_eq!(material.diffuse_color, Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));

    let animation = &scene.animations[0];
    assert_eq!(animation.name, "slide");
    assert_relative_eq!(animation.duration_ticks, 1000.0);
    assert_eq!(animation.channels[0].node_name, "tri");
    assert_eq!(animation.channels[0].position_keys.len(), 2);
    assert_eq!(animation.channels[0].position_keys[1].value, Vec3::new(3.0, 0.0, 0.0));
    Ok(())
}

#[test]
fn test_gltf_external_buffer_resolved_next_to_file() -> Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("tri.bin"), triangle_buffer())?;
    let path = dir.path().join("tri.gltf");
    std::fs::write(&path, triangle_gltf("tri.bin"))?;

    let scene = SceneImporter::default().import_file(&path)?;

    assert_eq!(scene.source_path, path.display().to_string());
    // Default flags generate smooth normals.
    let normals = scene.meshes[0].normals.as_ref().expect("normals");
    for n in normals {
        assert_relative_eq!(*n, Vec3::Z);
    }
    Ok(())
}

#[test]
fn test_gltf_skin_becomes_dense_bones() -> Result<()> {
    let lane = GltfSceneLane::new(Arc::new(NoExternalResources));
    let scene = lane.import_bytes(skinned_triangle_gltf().as_bytes())?;
    let mesh = &scene.meshes[0];

    // The unweighted joint is dropped; `knee` moves from joint 2 to bone 1.
    let names: Vec<&str> = mesh.bones.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["hip", "knee"]);
    assert_eq!(mesh.bones[0].offset_matrix, Mat4::IDENTITY);
    assert_eq!(
        mesh.bones[1].offset_matrix,
        Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0))
    );

    let hip_vertices: Vec<u32> = mesh.bones[0].weights.iter().map(|w| w.vertex_id).collect();
    assert_eq!(hip_vertices, vec![0, 1]);
    assert_eq!(scene.vertex_weights_for(0, 1), vec![(0, 0.25), (1, 0.75)]);
    assert_eq!(scene.vertex_weights_for(0, 2), vec![(1, 1.0)]);
    Ok(())
}

#[test]
fn test_gltf_tangents_uv_sets_and_colors() -> Result<()> {
    let lane = GltfSceneLane::new(Arc::new(NoExternalResources));
    let scene = lane.import_bytes(skinned_triangle_gltf().as_bytes())?;
    let mesh = &scene.meshes[0];

    assert!(mesh.has_tex_coords(0));
    assert!(mesh.has_tex_coords(1));
    assert!(!mesh.has_tex_coords(2));
    assert_eq!(mesh.tex_coords[1].as_ref().expect("uv1")[2], Vec2::new(0.5, 0.75));
    assert_eq!(mesh.colors.as_ref().expect("colors")[1], Vec4::new(0.0, 1.0, 0.0, 1.0));

    // Tangent w of -1 flips the bitangent to -Y for a +Z normal.
    let tangents = mesh.tangents.as_ref().expect("tangents");
    let bitangents = mesh.bitangents.as_ref().expect("bitangents");
    assert_eq!(tangents.len(), 3);
    for (t, b) in tangents.iter().zip(bitangents) {
        assert_relative_eq!(*t, Vec3::X);
        assert_relative_eq!(*b, Vec3::NEG_Y);
    }
    Ok(())
}

#[test]
fn test_gltf_missing_external_buffer_fails() {
    let importer = SceneImporter::default();
    let result = importer.import_bytes(
        triangle_gltf("tri.bin").as_bytes(),
        SceneFormat::Gltf,
        Arc::new(NoExternalResources),
    );
    assert!(matches!(result, Err(ImportError::Resolve { .. })));
}

#[test]
fn test_gltf_garbage_is_parse_error() {
    let importer = SceneImporter::default();
    let result = importer.import_bytes(b"not a model", SceneFormat::Gltf, Arc::new(NoExternalResources));
    assert!(matches!(result, Err(ImportError::Parse { .. })));
}

// --- OBJ ---

#[test]
fn test_obj_with_material_library() -> Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("quad.mtl"), QUAD_MTL)?;
    let path = dir.path().join("quad.obj");
    std::fs::write(&path, QUAD_OBJ)?;

    let flags = ModelLoaderFlags::DEFAULT | ModelLoaderFlags::FLIP_UVS;
    let scene = SceneImporter::new(flags).import_file(&path)?;

    assert_eq!(scene.meshes.len(), 1);
    let mesh = &scene.meshes[0];
    assert_eq!(mesh.indices.len(), 6);
    assert_eq!(mesh.tex_coords[0].as_ref().expect("uvs")[0], Vec2::new(0.0, 1.0));

    let material = scene.material_for_mesh(0).expect("material");
    assert_eq!(material.name, "wood");
    assert_eq!(material.shininess, Some(10.0));
    assert_eq!(material.opacity, Some(0.5));
    assert_eq!(scene.diffuse_texture_name(0), "textures/wood.png");
    assert_eq!(scene.height_texture_name(0), "wood_bump.png");
    assert_eq!(scene.texture_name(0, TextureType::Normals), "wood_n.png");
    assert_eq!(scene.specular_texture_name(0), "");
    Ok(())
}

#[test]
fn test_conflicting_normal_flags_rejected() {
    let flags = ModelLoaderFlags::SMOOTH_NORMALS | ModelLoaderFlags::FACE_NORMALS;
    let result = SceneImporter::new(flags).import_bytes(
        QUAD_OBJ.as_bytes(),
        SceneFormat::Obj,
        Arc::new(NoExternalResources),
    );
    assert!(matches!(result, Err(ImportError::IncompatibleFlags(_))));
}

// --- Incomplete channels ---

#[test]
fn test_obj_partial_uvs_are_dropped_before_tangent_space() -> Result<()> {
    let flags = ModelLoaderFlags::DEFAULT | ModelLoaderFlags::CALC_TANGENT_SPACE;
    let scene = SceneImporter::new(flags).import_bytes(
        MIXED_UV_OBJ.as_bytes(),
        SceneFormat::Obj,
        Arc::new(NoExternalResources),
    )?;

    let mesh = &scene.meshes[0];
    assert!(!mesh.has_tex_coords(0));
    assert_eq!(mesh.normals.as_ref().expect("normals").len(), mesh.vertex_count());
    assert!(mesh.tangents.is_none());
    assert_eq!(mesh.indices.len(), 6);
    Ok(())
}

#[test]
fn test_obj_partial_uvs_with_face_normals() -> Result<()> {
    let flags = ModelLoaderFlags::TRIANGULATE | ModelLoaderFlags::FACE_NORMALS;
    let scene = SceneImporter::new(flags).import_bytes(
        MIXED_UV_NO_NORMALS_OBJ.as_bytes(),
        SceneFormat::Obj,
        Arc::new(NoExternalResources),
    )?;

    let mesh = &scene.meshes[0];
    assert!(!mesh.has_tex_coords(0));
    assert_eq!(mesh.vertex_count(), 6);
    assert_eq!(mesh.normals.as_ref().expect("normals").len(), 6);
    Ok(())
}
