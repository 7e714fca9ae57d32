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

use prism_core::prism_bitflags;

prism_bitflags! {
    /// Options controlling how a model file is imported.
    ///
    /// The low bits select post-processing steps. The `LOAD_*` bits restrict which
    /// optional vertex channels end up in the GPU vertex buffer; when none of them is
    /// set, every channel the file provides is kept.
    pub struct ModelLoaderFlags: u32 {
        /// Split polygons, strips and fans into plain triangles.
        const TRIANGULATE = 0x000001;
        /// Generate smooth normals for meshes that have none.
        const SMOOTH_NORMALS = 0x000002;
        /// Generate flat per-face normals for meshes that have none.
        const FACE_NORMALS = 0x000004;
        /// Flip the V texture coordinate.
        const FLIP_UVS = 0x000008;
        /// Keep at most four bone influences per vertex.
        const LIMIT_BONE_WEIGHTS = 0x000010;
        /// Generate tangents and bitangents from the first UV set.
        const CALC_TANGENT_SPACE = 0x000020;

        /// Keep vertex normals.
        const LOAD_NORMALS = 0x010000;
        /// Keep vertex colors.
        const LOAD_COLORS = 0x020000;
        /// Keep the first texture coordinate set.
        const LOAD_TEX_COORDS = 0x040000;
        /// Keep the second texture coordinate set.
        const LOAD_TEX_COORDS2 = 0x080000;
        /// Keep the third texture coordinate set.
        const LOAD_TEX_COORDS3 = 0x100000;
        /// Keep bone indices and weights.
        const LOAD_BONES = 0x200000;
    }
}

impl ModelLoaderFlags {
    /// Triangulation, smooth normals and bone weight limiting.
    pub const DEFAULT: Self = Self::TRIANGULATE
        .with(Self::SMOOTH_NORMALS)
        .with(Self::LIMIT_BONE_WEIGHTS);

    /// Every `LOAD_*` bit.
    pub const VERTEX_DATA: Self = Self::LOAD_NORMALS
        .with(Self::LOAD_COLORS)
        .with(Self::LOAD_TEX_COORDS)
        .with(Self::LOAD_TEX_COORDS2)
        .with(Self::LOAD_TEX_COORDS3)
        .with(Self::LOAD_BONES);

    /// The `LOAD_*` flag for texture coordinate set `set`.
    pub const fn load_tex_coords(set: usize) -> Self {
        match set {
            0 => Self::LOAD_TEX_COORDS,
            1 => Self::LOAD_TEX_COORDS2,
            _ => Self::LOAD_TEX_COORDS3,
        }
    }

    /// Returns `true` if the vertex channel behind `load_flag` should be kept.
    ///
    /// With no `LOAD_*` bit set every channel is kept.
    pub const fn wants(&self, load_flag: Self) -> bool {
        !self.intersects(Self::VERTEX_DATA) || self.contains(load_flag)
    }

    /// Parses a list of flag names (case-insensitive, `DEFAULT` allowed).
    ///
    /// Returns the first unknown name as an error.
    pub fn from_flag_names<'a, I>(names: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut flags = Self::EMPTY;
        for name in names {
            let name = name.trim();
            let flag = if name.eq_ignore_ascii_case("default") {
                Self::DEFAULT
            } else {
                Self::from_name(name).ok_or_else(|| name.to_string())?
            };
            flags.insert(flag);
        }
        Ok(flags)
    }
}
