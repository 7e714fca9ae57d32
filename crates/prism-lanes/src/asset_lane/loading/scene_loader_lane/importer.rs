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

use std::path::Path;
use std::sync::Arc;

use prism_core::ImportedScene;

use super::{
    post_process, FileSystemResolver, GltfSceneLane, ModelLoaderFlags, ObjSceneLane,
    ResourceResolver,
};
use crate::asset_lane::ImportError;

/// The model file formats the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFormat {
    /// glTF 2.0, JSON (`.gltf`) or binary (`.glb`).
    Gltf,
    /// Wavefront OBJ with optional MTL library.
    Obj,
}

impl SceneFormat {
    /// Picks the format from a file extension, ignoring case.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "gltf" | "glb" => Some(Self::Gltf),
            "obj" => Some(Self::Obj),
            _ => None,
        }
    }

    /// Picks the format from the extension of `path`.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Reads model files into [`ImportedScene`]s and runs the post-processing
/// steps selected by its flags.
#[derive(Debug, Clone, Copy)]
pub struct SceneImporter {
    flags: ModelLoaderFlags,
}

impl Default for SceneImporter {
    fn default() -> Self {
        Self::new(ModelLoaderFlags::DEFAULT)
    }
}

impl SceneImporter {
    /// Creates an importer using `flags`.
    pub fn new(flags: ModelLoaderFlags) -> Self {
        Self { flags }
    }

    /// The flags this importer was created with.
    pub fn flags(&self) -> ModelLoaderFlags {
        self.flags
    }

    /// Imports a model file. External resources are looked up next to it.
    pub fn import_file(&self, path: impl AsRef<Path>) -> Result<ImportedScene, ImportError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let format = SceneFormat::from_path(path)
            .ok_or_else(|| ImportError::UnsupportedFormat(display.clone()))?;
        let bytes = std::fs::read(path).map_err(|source| ImportError::Io {
            path: display.clone(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let resolver = Arc::new(FileSystemResolver::new(base));

        let mut scene = self.import_bytes(&bytes, format, resolver)?;
        scene.source_path = display;
        log::info!(
            "Imported '{}': {} meshes, {} materials, {} nodes",
            scene.source_path,
            scene.meshes.len(),
            scene.materials.len(),
            scene.nodes.len()
        );
        Ok(scene)
    }

    /// Imports a model held in memory.
    pub fn import_bytes(
        &self,
        bytes: &[u8],
        format: SceneFormat,
        resolver: Arc<dyn ResourceResolver>,
    ) -> Result<ImportedScene, ImportError> {
        let mut scene = match format {
            SceneFormat::Gltf => GltfSceneLane::new(resolver).import_bytes(bytes)?,
            SceneFormat::Obj => ObjSceneLane::new(resolver).import_bytes(bytes)?,
        };
        post_process::apply(&mut scene, self.flags)?;
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(SceneFormat::from_extension("GLB"), Some(SceneFormat::Gltf));
        assert_eq!(SceneFormat::from_extension("obj"), Some(SceneFormat::Obj));
        assert_eq!(SceneFormat::from_extension("fbx"), None);
        assert_eq!(SceneFormat::from_path(Path::new("models/cube")), None);
    }

    #[test]
    fn unknown_extension_is_rejected_before_reading() {
        let result = SceneImporter::default().import_file("does/not/exist.fbx");
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let result = SceneImporter::default().import_file("does/not/exist.obj");
        assert!(matches!(result, Err(ImportError::Io { .. })));
    }
}
