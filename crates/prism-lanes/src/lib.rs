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

//! # Prism Lanes
//!
//! Hot-path loaders that turn model files into an [`prism_core::ImportedScene`].
//!
//! Each file format is handled by a lane implementing [`asset_lane::AssetLoaderLane`];
//! [`asset_lane::SceneImporter`] picks the lane from the file extension and runs the
//! post-processing steps requested through [`asset_lane::ModelLoaderFlags`].

pub mod asset_lane;

pub use asset_lane::*;
