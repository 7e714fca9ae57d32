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
use prism_core::math::{Mat4, Vec3};
use prism_core::renderer::testing::{PassCommand, RecordingDevice, RecordingPass};
use prism_core::renderer::{GraphicsDevice, TextureFormat};
use prism_core::scene::TextureType;
use prism_lanes::asset_lane::{ImportError, ModelLoaderFlags};
use prism_model::{inspect, Model, ModelError, ShaderProgram, VertexAttribData};
use tempfile::tempdir;

const SCENE_OBJ: &str = "\
mtllib scene.mtl
o floor
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
o marker
v 0 0 1
v 1 0 1
v 0 1 1
f 5 6 7
";

const SCENE_MTL: &str = "\
newmtl wood
Kd 0.8 0.6 0.4
map_Kd textures/wood.png
";

fn write_scene(dir: &std::path::Path) -> Result<std::path::PathBuf> {
    std::fs::write(dir.join("scene.mtl"), SCENE_MTL)?;
    let path = dir.join("scene.obj");
    std::fs::write(&path, SCENE_OBJ)?;
    Ok(path)
}

#[test]
fn test_load_obj_and_draw_with_lit_shader() -> Result<()> {
    let dir = tempdir()?;
    let path = write_scene(dir.path())?;
    let device = Arc::new(RecordingDevice::new());

    let mut model = Model::load_from_file(
        &path,
        Mat4::from_scale(Vec3::splat(0.5)),
        ModelLoaderFlags::DEFAULT,
        device.clone(),
    )?;

    assert_eq!(model.num_meshes(), 2);
    assert_eq!(model.mesh_name(0)?, "floor");
    assert_eq!(model.num_vertices(0)?, 4);
    assert_eq!(model.indices_length(0)?, 6);
    assert_eq!(model.indices_length(1)?, 3);
    // Normals are generated on import.
    assert_relative_eq!(model.vertex_normal(1, 0)?, Vec3::Z);
    assert_relative_eq!(
        model.mesh_transformation_matrix(1)?,
        Mat4::from_scale(Vec3::splat(0.5))
    );

    let floor = model.material_data(0)?;
    assert_eq!(floor.name, "wood");
    let texture = floor.texture_path(TextureType::Diffuse).expect("diffuse texture");
    assert!(texture.starts_with(&dir.path().display().to_string()));
    assert!(texture.ends_with("textures/wood.png"));

    let mut shader = ShaderProgram::model_lit(
        device.clone() as Arc<dyn GraphicsDevice>,
        TextureFormat::Rgba8UnormSrgb,
        Some(TextureFormat::Depth32Float),
    )?;
    let mut pass = RecordingPass::default();
    model.render_with_shader_generate_missing(&mut shader, &mut pass)?;

    assert_eq!(pass.indexed_draw_counts(), vec![6, 3]);
    let pipelines = pass
        .commands
        .iter()
        .filter(|command| matches!(command, PassCommand::SetPipeline(_)))
        .count();
    assert_eq!(pipelines, 2);
    // The floor also stores UVs, so its stride differs from the marker's.
    assert_eq!(device.pipeline_count(), 2);
    Ok(())
}

#[test]
fn test_load_flags_drop_unrequested_channels() -> Result<()> {
    let dir = tempdir()?;
    let path = write_scene(dir.path())?;
    let device = Arc::new(RecordingDevice::new());

    let flags = ModelLoaderFlags::DEFAULT | ModelLoaderFlags::LOAD_NORMALS;
    let mut model = Model::load_from_file(&path, Mat4::IDENTITY, flags, device)?;

    let floor = model.mesh_at(0)?;
    assert_eq!(floor.available_attributes(), VertexAttribData::POSITION_NORMAL);
    assert_eq!(floor.layout().stride(), 24);

    let result = model.generate_vertex_layout_for_mesh(0, VertexAttribData::TEX2D);
    assert!(matches!(result, Err(ModelError::MissingVertexAttributes { .. })));
    Ok(())
}

#[test]
fn test_unsupported_file_is_import_error() {
    let device = Arc::new(RecordingDevice::new());
    let result = Model::load_from_file(
        "scene.fbx",
        Mat4::IDENTITY,
        ModelLoaderFlags::DEFAULT,
        device,
    );
    assert!(matches!(
        result,
        Err(ModelError::Import(ImportError::UnsupportedFormat(_)))
    ));
}

#[test]
fn test_inspect_dumps_loaded_scene() -> Result<()> {
    let dir = tempdir()?;
    let path = write_scene(dir.path())?;
    let device = Arc::new(RecordingDevice::new());
    let model = Model::load_from_file(&path, Mat4::IDENTITY, ModelLoaderFlags::DEFAULT, device)?;

    let mut out = Vec::new();
    inspect::print_node_tree(model.scene(), &mut out)?;
    inspect::print_meshes(model.scene(), &mut out)?;
    let text = String::from_utf8(out)?;
    assert!(text.contains("  floor "));
    assert!(text.contains("    mesh 1: marker"));
    assert!(text.contains("material: wood"));
    Ok(())
}
