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

use std::collections::HashMap;
use std::fmt;

use crate::math::{Vec3, Vec4};

/// The semantic slot a texture is bound to in a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureType {
    /// Base color.
    Diffuse,
    /// Specular color or intensity.
    Specular,
    /// Ambient occlusion or ambient color.
    Ambient,
    /// Self-illumination.
    Emissive,
    /// Height (bump) map.
    Height,
    /// Tangent-space normal map.
    Normals,
    /// Specular exponent map.
    Shininess,
    /// Opacity map.
    Opacity,
    /// Displacement map.
    Displacement,
    /// Reflection map.
    Reflection,
    /// Precomputed lighting.
    Lightmap,
}

impl TextureType {
    /// Every texture type, in declaration order.
    pub const ALL: [TextureType; 11] = [
        TextureType::Diffuse,
        TextureType::Specular,
        TextureType::Ambient,
        TextureType::Emissive,
        TextureType::Height,
        TextureType::Normals,
        TextureType::Shininess,
        TextureType::Opacity,
        TextureType::Displacement,
        TextureType::Reflection,
        TextureType::Lightmap,
    ];

    /// Lower-case name used in dumps and configuration.
    pub const fn name(&self) -> &'static str {
        match self {
            TextureType::Diffuse => "diffuse",
            TextureType::Specular => "specular",
            TextureType::Ambient => "ambient",
            TextureType::Emissive => "emissive",
            TextureType::Height => "height",
            TextureType::Normals => "normals",
            TextureType::Shininess => "shininess",
            TextureType::Opacity => "opacity",
            TextureType::Displacement => "displacement",
            TextureType::Reflection => "reflection",
            TextureType::Lightmap => "lightmap",
        }
    }
}

impl fmt::Display for TextureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A material as read from the model file. Absent properties stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneMaterial {
    /// Material name.
    pub name: String,
    /// Diffuse color.
    pub diffuse_color: Option<Vec4>,
    /// Specular color.
    pub specular_color: Option<Vec4>,
    /// Ambient color.
    pub ambient_color: Option<Vec3>,
    /// Emissive color.
    pub emissive_color: Option<Vec3>,
    /// Transparent color.
    pub transparent_color: Option<Vec4>,
    /// Specular exponent.
    pub shininess: Option<f32>,
    /// Opacity in `[0, 1]`.
    pub opacity: Option<f32>,
    /// Bump map scaling.
    pub bump_scaling: Option<f32>,
    /// Index of refraction.
    pub refraction: Option<f32>,
    /// Reflectivity.
    pub reflectivity: Option<f32>,
    /// Texture names per slot, in file order.
    pub textures: HashMap<TextureType, Vec<String>>,
}

impl SceneMaterial {
    /// Returns the first texture name of the given type.
    pub fn texture(&self, texture_type: TextureType) -> Option<&str> {
        self.textures
            .get(&texture_type)
            .and_then(|names| names.first())
            .map(String::as_str)
    }

    /// Appends a texture name to a slot.
    pub fn add_texture(&mut self, texture_type: TextureType, name: impl Into<String>) {
        self.textures
            .entry(texture_type)
            .or_default()
            .push(name.into());
    }
}
