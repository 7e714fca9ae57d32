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

use prism_core::renderer::ResourceError;
use prism_lanes::asset_lane::ImportError;
use thiserror::Error;

use crate::vertex::{VertexAttrib, VertexAttribData};

/// Errors raised while building, querying or drawing a [`crate::Model`].
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model file could not be imported.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// The graphics device rejected a request.
    #[error("graphics resource error: {0}")]
    Resource(#[from] ResourceError),

    /// The imported scene contains no mesh at all.
    #[error("scene '{0}' contains no meshes")]
    EmptyScene(String),

    /// A mesh index past the end of the model.
    #[error("mesh index {index} out of range (model has {count} meshes)")]
    MeshIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of meshes in the model.
        count: usize,
    },

    /// A vertex index past the end of a mesh.
    #[error("vertex index {vertex} out of range for mesh {mesh} ({count} vertices)")]
    VertexIndexOutOfRange {
        /// Mesh index.
        mesh: usize,
        /// The requested vertex.
        vertex: usize,
        /// Number of vertices of the mesh.
        count: usize,
    },

    /// A layout variant asks for channels the mesh does not carry.
    #[error("mesh '{mesh}' lacks vertex attributes {missing:?}")]
    MissingVertexAttributes {
        /// Name of the mesh.
        mesh: String,
        /// The requested channels the mesh does not have.
        missing: VertexAttribData,
    },

    /// No layout variant was generated for the requested config.
    #[error("mesh '{mesh}' has no vertex layout for {config:?}")]
    MissingVertexLayout {
        /// Name of the mesh.
        mesh: String,
        /// The requested config.
        config: VertexAttribData,
    },

    /// Layout generation failed for some meshes of a model.
    #[error("could not generate vertex layout {config:?} for meshes {meshes:?}")]
    LayoutGenerationFailed {
        /// Names of the meshes lacking attributes.
        meshes: Vec<String>,
        /// The requested config.
        config: VertexAttribData,
    },

    /// A single attribute was read from a mesh that does not store it.
    #[error("mesh {mesh} has no {attribute:?} attribute")]
    MissingAttribute {
        /// Mesh index.
        mesh: usize,
        /// The missing attribute.
        attribute: VertexAttrib,
    },

    /// A shader has no pipeline for a mesh's layout yet.
    #[error("shader '{shader}' has no pipeline for mesh '{mesh}'")]
    MissingPipeline {
        /// Shader label.
        shader: String,
        /// Name of the mesh.
        mesh: String,
    },
}
