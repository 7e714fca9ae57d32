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

//! Per-mesh material data with defaults applied and texture paths resolved.

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use prism_core::math::{Vec3, Vec4};
use prism_core::scene::{SceneMaterial, TextureType};
use prism_core::utils::{combine_paths, extract_base_path};

/// Material values of one mesh, every property resolved to a concrete value.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialData {
    /// Name of the source material, empty for meshes without one.
    pub name: String,
    /// Diffuse color.
    pub diffuse_color: Vec4,
    /// Specular color.
    pub specular_color: Vec4,
    /// Ambient color.
    pub ambient_color: Vec3,
    /// Emissive color.
    pub emissive_color: Vec3,
    /// Transparent color.
    pub transparent_color: Vec4,
    /// Specular exponent.
    pub specular_power: f32,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Bump map scaling.
    pub bump_scaling: f32,
    /// Index of refraction.
    pub refraction: f32,
    /// Reflectivity.
    pub reflectivity: f32,
    /// Path of the first texture of each type, relative to the working directory.
    pub texture_paths: BTreeMap<TextureType, String>,
}

impl MaterialData {
    /// Default diffuse color.
    pub const DEFAULT_DIFFUSE_COLOR: Vec4 = Vec4::ONE;
    /// Default specular color.
    pub const DEFAULT_SPECULAR_COLOR: Vec4 = Vec4::ONE;
    /// Default ambient color.
    pub const DEFAULT_AMBIENT_COLOR: Vec3 = Vec3::splat(0.1);
    /// Default emissive color.
    pub const DEFAULT_EMISSIVE_COLOR: Vec3 = Vec3::ZERO;
    /// Default transparent color.
    pub const DEFAULT_TRANSPARENT_COLOR: Vec4 = Vec4::ONE;
    /// Default specular exponent.
    pub const DEFAULT_SPECULAR_POWER: f32 = 32.0;
    /// Default opacity.
    pub const DEFAULT_OPACITY: f32 = 1.0;
    /// Default bump scaling.
    pub const DEFAULT_BUMP_SCALING: f32 = 1.0;
    /// Default index of refraction.
    pub const DEFAULT_REFRACTION: f32 = 1.0;
    /// Default reflectivity.
    pub const DEFAULT_REFLECTIVITY: f32 = 0.0;

    /// Resolves a scene material, falling back to the defaults for every property
    /// the file does not set.
    ///
    /// Texture names are resolved against the directory of `model_path`. Embedded
    /// texture references (`*<index>`) are kept verbatim.
    pub fn from_scene_material(material: Option<&SceneMaterial>, model_path: &str) -> Self {
        let Some(material) = material else {
            return Self::default();
        };

        let base_path = extract_base_path(model_path);
        let texture_paths = TextureType::ALL
            .into_iter()
            .filter_map(|texture_type| {
                material.texture(texture_type).map(|name| {
                    let path = if name.starts_with('*') {
                        name.to_string()
                    } else {
                        combine_paths(&base_path, name)
                    };
                    (texture_type, path)
                })
            })
            .collect();

        Self {
            name: material.name.clone(),
            diffuse_color: material.diffuse_color.unwrap_or(Self::DEFAULT_DIFFUSE_COLOR),
            specular_color: material.specular_color.unwrap_or(Self::DEFAULT_SPECULAR_COLOR),
            ambient_color: material.ambient_color.unwrap_or(Self::DEFAULT_AMBIENT_COLOR),
            emissive_color: material.emissive_color.unwrap_or(Self::DEFAULT_EMISSIVE_COLOR),
            transparent_color: material
                .transparent_color
                .unwrap_or(Self::DEFAULT_TRANSPARENT_COLOR),
            specular_power: material.shininess.unwrap_or(Self::DEFAULT_SPECULAR_POWER),
            opacity: material.opacity.unwrap_or(Self::DEFAULT_OPACITY),
            bump_scaling: material.bump_scaling.unwrap_or(Self::DEFAULT_BUMP_SCALING),
            refraction: material.refraction.unwrap_or(Self::DEFAULT_REFRACTION),
            reflectivity: material.reflectivity.unwrap_or(Self::DEFAULT_REFLECTIVITY),
            texture_paths,
        }
    }

    /// The resolved path of the texture of `texture_type`.
    pub fn texture_path(&self, texture_type: TextureType) -> Option<&str> {
        self.texture_paths.get(&texture_type).map(String::as_str)
    }

    /// Packs the values for a uniform buffer.
    pub fn uniforms(&self) -> MaterialUniforms {
        MaterialUniforms {
            diffuse_color: self.diffuse_color.to_array(),
            specular_color: self.specular_color.to_array(),
            ambient_color: self.ambient_color.extend(1.0).to_array(),
            emissive_color: self.emissive_color.extend(1.0).to_array(),
            transparent_color: self.transparent_color.to_array(),
            factors: [
                self.specular_power,
                self.opacity,
                self.bump_scaling,
                self.refraction,
            ],
            reflectivity: [self.reflectivity, 0.0, 0.0, 0.0],
        }
    }
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse_color: Self::DEFAULT_DIFFUSE_COLOR,
            specular_color: Self::DEFAULT_SPECULAR_COLOR,
            ambient_color: Self::DEFAULT_AMBIENT_COLOR,
            emissive_color: Self::DEFAULT_EMISSIVE_COLOR,
            transparent_color: Self::DEFAULT_TRANSPARENT_COLOR,
            specular_power: Self::DEFAULT_SPECULAR_POWER,
            opacity: Self::DEFAULT_OPACITY,
            bump_scaling: Self::DEFAULT_BUMP_SCALING,
            refraction: Self::DEFAULT_REFRACTION,
            reflectivity: Self::DEFAULT_REFLECTIVITY,
            texture_paths: BTreeMap::new(),
        }
    }
}

/// GPU-side material block, laid out for a WGSL uniform buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialUniforms {
    /// Diffuse color.
    pub diffuse_color: [f32; 4],
    /// Specular color.
    pub specular_color: [f32; 4],
    /// Ambient color.
    pub ambient_color: [f32; 4],
    /// Emissive color.
    pub emissive_color: [f32; 4],
    /// Transparent color.
    pub transparent_color: [f32; 4],
    /// Specular power, opacity, bump scaling and refraction.
    pub factors: [f32; 4],
    /// Reflectivity in `x`.
    pub reflectivity: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_material_uses_defaults() {
        let data = MaterialData::from_scene_material(None, "models/crate.obj");
        assert_eq!(data, MaterialData::default());
        assert_eq!(data.ambient_color, Vec3::splat(0.1));
        assert_eq!(data.specular_power, 32.0);
    }

    #[test]
    fn set_properties_override_defaults() {
        let material = SceneMaterial {
            name: "wood".into(),
            diffuse_color: Some(Vec4::new(0.8, 0.6, 0.4, 1.0)),
            shininess: Some(10.0),
            ..Default::default()
        };
        let data = MaterialData::from_scene_material(Some(&material), "crate.obj");
        assert_eq!(data.name, "wood");
        assert_eq!(data.diffuse_color, Vec4::new(0.8, 0.6, 0.4, 1.0));
        assert_eq!(data.specular_power, 10.0);
        assert_eq!(data.opacity, 1.0);
        assert_eq!(data.uniforms().factors[0], 10.0);
    }

    #[test]
    fn texture_paths_resolve_against_model_directory() {
        let mut material = SceneMaterial::default();
        material.add_texture(TextureType::Diffuse, "textures\\wood.png");
        material.add_texture(TextureType::Normals, "*2");
        let data = MaterialData::from_scene_material(Some(&material), "assets/crate/crate.obj");
        assert_eq!(
            data.texture_path(TextureType::Diffuse),
            Some("assets/crate/textures/wood.png")
        );
        assert_eq!(data.texture_path(TextureType::Normals), Some("*2"));
        assert_eq!(data.texture_path(TextureType::Specular), None);
    }

    #[test]
    fn uniforms_are_std140_sized() {
        assert_eq!(std::mem::size_of::<MaterialUniforms>(), 112);
    }
}
