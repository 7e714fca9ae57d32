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

//! Offscreen rendering of a [`Model`] with the built-in lit shader.

use std::borrow::Cow;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use prism_core::math::{Aabb, Mat4, Vec3};
use prism_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BufferDescriptor, BufferId, BufferUsage, Color,
    GraphicsDevice, LoadOp, Operations, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, StoreOp, TextureDescriptor,
    TextureFormat, TextureUsage,
};
use prism_infra::WgpuDevice;
use prism_model::{Model, ModelLitUniforms, Shader, ShaderProgram, VertexAttribData};

const COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
const FIELD_OF_VIEW_Y: f32 = std::f32::consts::FRAC_PI_4;

#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub clear_color: Color,
    pub camera_margin: f32,
    /// Layout variant generated for every mesh before the shader's own.
    pub vertex_config: VertexAttribData,
}

impl RenderSettings {
    /// Rejects settings no offscreen target can be created for.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!(
                "render size must be at least 1x1, got {}x{}",
                self.width,
                self.height
            ));
        }
        Ok(())
    }
}

/// The box enclosing every mesh, placed by its node and the load transformation.
pub fn model_bounds(model: &Model) -> Option<Aabb> {
    let scene = model.scene();
    (0..model.num_meshes())
        .filter_map(|mesh_index| {
            let points = Aabb::from_points(&scene.meshes.get(mesh_index)?.positions)?;
            let transform = model.mesh_transformation_matrix(mesh_index).ok()?;
            Some(points.transform(&transform))
        })
        .reduce(|a, b| a.merge(&b))
}

/// View-projection matrix looking at the center of `bounds` from the front,
/// slightly above and to the right, far enough for the whole box to fit.
pub fn frame_camera(bounds: Aabb, aspect: f32, margin: f32) -> Mat4 {
    let center = bounds.center();
    let radius = (bounds.size().length() * 0.5).max(1e-3) * margin.max(1.0);

    let half_fov_x = ((FIELD_OF_VIEW_Y * 0.5).tan() * aspect).atan();
    let half_fov = half_fov_x.min(FIELD_OF_VIEW_Y * 0.5);
    let distance = radius / half_fov.sin();

    let eye = center + Vec3::new(0.4, 0.3, 1.0).normalize() * distance;
    let near = (distance - radius).max(distance * 1e-3);
    let far = distance + radius;

    let view = Mat4::look_at_rh(eye, center, Vec3::Y);
    let projection = Mat4::perspective_rh(FIELD_OF_VIEW_Y, aspect, near, far);
    projection * view
}

/// Renders `model` into an RGBA image.
pub fn render_model(
    device: &Arc<WgpuDevice>,
    model: &mut Model,
    settings: &RenderSettings,
) -> Result<RgbaImage> {
    let gpu: Arc<dyn GraphicsDevice> = device.clone();
    settings.validate()?;
    let RenderSettings { width, height, .. } = *settings;

    let mut shader = ShaderProgram::model_lit(Arc::clone(&gpu), COLOR_FORMAT, Some(DEPTH_FORMAT))
        .context("Failed to create the lit shader")?;
    if !settings.vertex_config.contains(shader.vertex_attrib_config()) {
        return Err(anyhow!(
            "vertex config {:?} lacks channels read by '{}' ({:?})",
            settings.vertex_config,
            shader.label(),
            shader.vertex_attrib_config()
        ));
    }
    model.generate_vertex_layouts(settings.vertex_config)?;
    for mesh_index in 0..model.num_meshes() {
        let mesh = model.mesh_at(mesh_index)?;
        if let Some(layout) = mesh.vertex_layout(settings.vertex_config) {
            log::debug!(
                "Mesh '{}': {:?} layout stride {} bytes",
                mesh.name(),
                settings.vertex_config,
                layout.array_stride
            );
        }
    }

    let bounds = model_bounds(model).ok_or_else(|| anyhow!("the model has no vertices"))?;
    let view_projection = frame_camera(bounds, width as f32 / height as f32, settings.camera_margin);
    let uniform_buffers = upload_mesh_uniforms(&gpu, model, &mut shader, view_projection)?;

    model.prepare_for_shader(&mut shader)?;

    let color_texture = gpu.create_texture(&TextureDescriptor {
        label: Some(Cow::Borrowed("viewer_color")),
        width,
        height,
        format: COLOR_FORMAT,
        usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
    })?;
    let depth_texture = gpu.create_texture(&TextureDescriptor {
        label: Some(Cow::Borrowed("viewer_depth")),
        width,
        height,
        format: DEPTH_FORMAT,
        usage: TextureUsage::RENDER_ATTACHMENT,
    })?;
    let color_view = gpu.create_texture_view(color_texture)?;
    let depth_view = gpu.create_texture_view(depth_texture)?;

    let color_attachments = [RenderPassColorAttachment {
        view: color_view,
        ops: Operations {
            load: LoadOp::Clear(settings.clear_color),
            store: StoreOp::Store,
        },
    }];
    let mut encoder = gpu.create_command_encoder(Some("viewer"));
    {
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("viewer pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: StoreOp::Discard,
                }),
            }),
        });
        model.render_with_shader(&shader, pass.as_mut())?;
    }
    gpu.submit_command_buffer(encoder.finish());
    device.check_errors("viewer render pass")?;

    let pixels = device.read_texture_rgba8(color_texture)?;
    let image = RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("readback size does not match {width}x{height}"))?;

    for view in [color_view, depth_view] {
        gpu.destroy_texture_view(view)?;
    }
    for texture in [color_texture, depth_texture] {
        gpu.destroy_texture(texture)?;
    }
    drop(shader);
    for buffer in uniform_buffers {
        gpu.destroy_buffer(buffer)?;
    }
    Ok(image)
}

/// One uniform buffer and bind group per mesh, handed over to `shader`.
fn upload_mesh_uniforms(
    gpu: &Arc<dyn GraphicsDevice>,
    model: &Model,
    shader: &mut ShaderProgram,
    view_projection: Mat4,
) -> Result<Vec<BufferId>> {
    let layout = shader
        .bind_group_layout(0)
        .ok_or_else(|| anyhow!("'{}' has no bind group layout", shader.label()))?;

    let mut buffers = Vec::with_capacity(model.num_meshes());
    for mesh_index in 0..model.num_meshes() {
        let uniforms = ModelLitUniforms::new(
            view_projection,
            model.mesh_transformation_matrix(mesh_index)?,
            model.material_data(mesh_index)?.diffuse_color,
        );
        let size = std::mem::size_of::<ModelLitUniforms>() as u64;
        let buffer = gpu.create_buffer_with_data(
            &BufferDescriptor {
                label: Some(Cow::Owned(format!("mesh_{mesh_index}_uniforms"))),
                size,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            },
            bytemuck::bytes_of(&uniforms),
        )?;
        buffers.push(buffer);

        let bind_group = gpu.create_bind_group(&BindGroupDescriptor {
            label: Some("mesh_uniforms"),
            layout,
            entries: &[BindGroupEntry {
                binding: 0,
                buffer,
                offset: 0,
                size: Some(size),
            }],
        })?;
        shader.set_mesh_bind_groups(mesh_index, vec![bind_group]);
    }
    Ok(buffers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn to_ndc(matrix: Mat4, point: Vec3) -> Vec3 {
        let clip = matrix * point.extend(1.0);
        clip.truncate() / clip.w
    }

    fn corners(bounds: &Aabb) -> impl Iterator<Item = Vec3> + '_ {
        (0..8).map(move |i| {
            Vec3::new(
                if i & 1 == 0 { bounds.min.x } else { bounds.max.x },
                if i & 2 == 0 { bounds.min.y } else { bounds.max.y },
                if i & 4 == 0 { bounds.min.z } else { bounds.max.z },
            )
        })
    }

    fn settings(width: u32, height: u32) -> RenderSettings {
        RenderSettings {
            width,
            height,
            clear_color: Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 },
            camera_margin: 1.2,
            vertex_config: VertexAttribData::POSITION | VertexAttribData::NORMAL,
        }
    }

    #[test]
    fn zero_sized_targets_are_rejected() {
        assert!(settings(64, 48).validate().is_ok());
        assert!(settings(0, 48).validate().is_err());
        assert!(settings(64, 0).validate().is_err());
    }

    #[test]
    fn camera_centers_the_box() {
        let bounds = Aabb::from_min_max(Vec3::new(2.0, -1.0, 0.0), Vec3::new(4.0, 3.0, 1.0));
        let view_projection = frame_camera(bounds, 16.0 / 9.0, 1.2);
        let center = to_ndc(view_projection, bounds.center());
        assert_relative_eq!(center.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(center.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn every_corner_is_visible() {
        let bounds = Aabb::from_min_max(Vec3::new(-1.0, 0.0, -3.0), Vec3::new(1.0, 10.0, 3.0));
        for aspect in [0.5, 1.0, 2.0] {
            let view_projection = frame_camera(bounds, aspect, 1.05);
            for corner in corners(&bounds) {
                let ndc = to_ndc(view_projection, corner);
                assert!(ndc.x.abs() < 1.0 && ndc.y.abs() < 1.0, "{corner} -> {ndc} at {aspect}");
                assert!((0.0..=1.0).contains(&ndc.z), "{corner} depth {}", ndc.z);
            }
        }
    }

    #[test]
    fn flat_model_still_gets_a_camera() {
        let point = Aabb::from_min_max(Vec3::ONE, Vec3::ONE);
        let view_projection = frame_camera(point, 1.0, 1.2);
        assert!(view_projection.is_finite());
        assert_relative_eq!(to_ndc(view_projection, Vec3::ONE).x, 0.0, epsilon = 1e-4);
    }

    const QUAD_OBJ: &str = "\
o face
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vn 0 0 1
f 1//1 2//1 3//1 4//1
";

    #[test]
    fn renders_model_over_background() {
        let context = match prism_infra::WgpuGraphicsContext::new_headless_blocking() {
            Ok(context) => context,
            Err(e) => {
                eprintln!("skipping GPU test: {e}");
                return;
            }
        };
        let device = Arc::new(WgpuDevice::new(context));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.obj");
        std::fs::write(&path, QUAD_OBJ).unwrap();
        let mut model = Model::load_from_file(
            &path,
            Mat4::IDENTITY,
            prism_lanes::ModelLoaderFlags::DEFAULT,
            device.clone(),
        )
        .unwrap();

        let settings = RenderSettings {
            width: 32,
            height: 24,
            clear_color: Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 1.0,
            },
            camera_margin: 1.2,
            vertex_config: VertexAttribData::POSITION_NORMAL,
        };
        let image = render_model(&device, &mut model, &settings).unwrap();

        assert_eq!(image.dimensions(), (32, 24));
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
        let center = image.get_pixel(16, 12).0;
        assert!(center[0] > 0 && center[0] == center[1], "{center:?}");
    }

    #[test]
    fn vertex_config_must_cover_the_shader() {
        let Ok(context) = prism_infra::WgpuGraphicsContext::new_headless_blocking() else {
            return;
        };
        let device = Arc::new(WgpuDevice::new(context));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.obj");
        std::fs::write(&path, QUAD_OBJ).unwrap();
        let mut model = Model::load_from_file(
            &path,
            Mat4::IDENTITY,
            prism_lanes::ModelLoaderFlags::DEFAULT,
            device.clone(),
        )
        .unwrap();

        let settings = RenderSettings {
            width: 8,
            height: 8,
            clear_color: Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 1.0,
            },
            camera_margin: 1.0,
            vertex_config: VertexAttribData::POSITION,
        };
        let error = render_model(&device, &mut model, &settings).unwrap_err();
        assert!(error.to_string().contains("model_lit"), "{error}");
    }
}
