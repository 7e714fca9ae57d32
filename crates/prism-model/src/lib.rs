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

//! # Prism Model
//!
//! Turns an [`prism_core::ImportedScene`] into GPU-resident meshes: one interleaved
//! vertex buffer and one index buffer per mesh, plus lazily generated vertex layout
//! variants keyed by the attribute subset a shader consumes.

#![warn(missing_docs)]

mod error;
pub mod inspect;
pub mod material;
pub mod mesh;
pub mod model;
pub mod shader;
pub mod vertex;

pub use error::ModelError;
pub use material::{MaterialData, MaterialUniforms};
pub use mesh::{Mesh, MeshData};
pub use model::{vertex_channels_for, Model};
pub use shader::{
    ModelLitUniforms, PipelineKey, Shader, ShaderProgram, ShaderProgramDescriptor, MODEL_LIT_WGSL,
};
pub use vertex::{AttributeSlot, VertexAttrib, VertexAttribData, VertexLayout};
