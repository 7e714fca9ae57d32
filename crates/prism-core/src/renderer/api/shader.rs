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

//! Shader module handles and descriptors.

use std::borrow::Cow;

use crate::prism_bitflags;

/// An opaque handle to a compiled shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderModuleId(pub usize);

/// The source code of a shader module.
#[derive(Debug, Clone)]
pub enum ShaderSourceData<'a> {
    /// WGSL source text.
    Wgsl(Cow<'a, str>),
}

/// Describes a shader module to compile.
#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
    /// The source of the module.
    pub source: ShaderSourceData<'a>,
}

prism_bitflags! {
    /// Shader stages a binding is visible to.
    pub struct ShaderStageFlags: u32 {
        /// The vertex stage.
        const VERTEX = 1 << 0;
        /// The fragment stage.
        const FRAGMENT = 1 << 1;
        /// Both raster stages.
        const VERTEX_FRAGMENT = (1 << 0) | (1 << 1);
    }
}
