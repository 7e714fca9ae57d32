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

//! Resolution of external resources referenced from inside a model file.

use std::path::{Path, PathBuf};

use crate::asset_lane::ImportError;

/// Resolves URIs found inside a model file (glTF buffers, OBJ material libraries)
/// to their bytes.
pub trait ResourceResolver: Send + Sync {
    /// Resolves an external binary buffer.
    fn resolve_buffer(&self, uri: &str) -> Result<Vec<u8>, ImportError>;

    /// Resolves a material library (`.mtl`) referenced by an OBJ file.
    fn resolve_material_library(&self, uri: &str) -> Result<Vec<u8>, ImportError>;
}

/// Resolves resources from the local filesystem relative to a base directory.
#[derive(Debug, Clone)]
pub struct FileSystemResolver {
    base_path: PathBuf,
}

impl FileSystemResolver {
    /// Creates a resolver rooted at `base_path`.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn read(&self, uri: &str) -> Result<Vec<u8>, ImportError> {
        let decoded = uri.replace("%20", " ");
        let path = self.base_path.join(&decoded);
        std::fs::read(&path).map_err(|e| ImportError::Resolve {
            uri: uri.to_string(),
            message: format!("{}: {e}", path.display()),
        })
    }
}

impl ResourceResolver for FileSystemResolver {
    fn resolve_buffer(&self, uri: &str) -> Result<Vec<u8>, ImportError> {
        self.read(uri)
    }

    fn resolve_material_library(&self, uri: &str) -> Result<Vec<u8>, ImportError> {
        self.read(uri)
    }
}

/// A resolver that refuses every request, for self-contained files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalResources;

impl ResourceResolver for NoExternalResources {
    fn resolve_buffer(&self, uri: &str) -> Result<Vec<u8>, ImportError> {
        Err(ImportError::Resolve {
            uri: uri.to_string(),
            message: "external resources are not available".to_string(),
        })
    }

    fn resolve_material_library(&self, uri: &str) -> Result<Vec<u8>, ImportError> {
        self.resolve_buffer(uri)
    }
}
