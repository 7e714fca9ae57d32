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

//! Lanes that import whole scenes (node hierarchy, meshes, materials, animations).

mod flags;
mod gltf_scene_lane;
mod importer;
mod obj_scene_lane;
pub mod post_process;
mod resource_resolver;

pub use flags::*;
pub use gltf_scene_lane::*;
pub use importer::*;
pub use obj_scene_lane::*;
pub use resource_resolver::*;

use crate::asset_lane::AssetLoaderLane;
use prism_core::ImportedScene;

/// Common trait for all scene loaders.
pub trait SceneLoaderLane: AssetLoaderLane<ImportedScene> + Send + Sync + 'static {}

impl<T> SceneLoaderLane for T where T: AssetLoaderLane<ImportedScene> + Send + Sync + 'static {}
