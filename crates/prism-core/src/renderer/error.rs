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

//! Errors raised by graphics devices.
//!
//! [`ResourceError`] is what every [`crate::renderer::GraphicsDevice`] call returns.
//! Shader and pipeline failures carry their own enums so callers can tell a bad
//! WGSL file apart from a bad handle.

use std::fmt;

use crate::renderer::api::command::BindGroupLayoutId;
use crate::renderer::api::pipeline::RenderPipelineId;
use crate::renderer::api::shader::ShaderModuleId;

fn label_or_unnamed(label: &Option<String>) -> &str {
    label.as_deref().unwrap_or("<unnamed>")
}

/// A shader module could not be compiled or looked up.
#[derive(Debug)]
pub enum ShaderError {
    /// The backend rejected the source.
    CompilationError {
        /// Label of the module.
        label: String,
        /// Compiler output.
        details: String,
    },
    /// No module is registered under `id`.
    NotFound {
        /// The unknown handle.
        id: ShaderModuleId,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompilationError { label, details } => {
                write!(f, "shader '{label}' does not compile: {details}")
            }
            Self::NotFound { id } => write!(f, "no shader module {id:?}"),
        }
    }
}

impl std::error::Error for ShaderError {}

/// A render pipeline could not be built or looked up.
#[derive(Debug)]
pub enum PipelineError {
    /// The backend rejected the pipeline description.
    CompilationFailed {
        /// Label of the pipeline.
        label: Option<String>,
        /// Backend output.
        details: String,
    },
    /// The pipeline names a shader module that does not exist.
    InvalidShaderModuleForPipeline {
        /// The unknown module.
        id: ShaderModuleId,
        /// Label of the pipeline.
        pipeline_label: Option<String>,
    },
    /// The pipeline names a bind group layout that does not exist.
    InvalidBindGroupLayout {
        /// The unknown layout.
        id: BindGroupLayoutId,
    },
    /// No pipeline is registered under `id`.
    InvalidRenderPipeline {
        /// The unknown handle.
        id: RenderPipelineId,
    },
    /// A fragment module was given without a fragment entry point.
    MissingEntryPointForFragmentShader {
        /// Label of the pipeline.
        pipeline_label: Option<String>,
        /// The fragment module.
        shader_id: ShaderModuleId,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompilationFailed { label, details } => {
                write!(f, "pipeline '{}' is invalid: {details}", label_or_unnamed(label))
            }
            Self::InvalidShaderModuleForPipeline { id, pipeline_label } => write!(
                f,
                "pipeline '{}' uses unknown shader module {id:?}",
                label_or_unnamed(pipeline_label)
            ),
            Self::InvalidBindGroupLayout { id } => write!(f, "no bind group layout {id:?}"),
            Self::InvalidRenderPipeline { id } => write!(f, "no render pipeline {id:?}"),
            Self::MissingEntryPointForFragmentShader {
                pipeline_label,
                shader_id,
            } => write!(
                f,
                "pipeline '{}' has fragment module {shader_id:?} but no fragment entry point",
                label_or_unnamed(pipeline_label)
            ),
        }
    }
}

impl std::error::Error for PipelineError {}

/// The error type of every [`crate::renderer::GraphicsDevice`] operation.
#[derive(Debug)]
pub enum ResourceError {
    /// See [`ShaderError`].
    Shader(ShaderError),
    /// See [`PipelineError`].
    Pipeline(PipelineError),
    /// The handle does not name a live resource.
    NotFound,
    /// The handle names a resource of the wrong kind or state.
    InvalidHandle,
    /// Any other failure reported by the backend.
    BackendError(String),
    /// A write or read past the end of a buffer.
    OutOfBounds,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shader(err) => err.fmt(f),
            Self::Pipeline(err) => err.fmt(f),
            Self::NotFound => f.write_str("resource handle not found"),
            Self::InvalidHandle => f.write_str("resource handle is invalid"),
            Self::BackendError(msg) => write!(f, "graphics backend: {msg}"),
            Self::OutOfBounds => f.write_str("access outside of the resource"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Shader(err) => Some(err),
            Self::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        Self::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(err)
    }
}
