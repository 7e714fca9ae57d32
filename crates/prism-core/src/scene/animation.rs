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

//! Keyframe data. It is imported so it can be inspected; nothing here plays it back.

use crate::math::{Quat, Vec3};

/// A keyed 3D vector (translation or scale).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorKey {
    /// Time of the key, in ticks.
    pub time: f64,
    /// Value at that time.
    pub value: Vec3,
}

/// A keyed rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationKey {
    /// Time of the key, in ticks.
    pub time: f64,
    /// Value at that time.
    pub value: Quat,
}

/// A keyed set of morph target weights.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphWeightKey {
    /// Time of the key, in ticks.
    pub time: f64,
    /// One weight per morph target.
    pub weights: Vec<f32>,
}

/// The keys animating one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeAnimationChannel {
    /// Name of the animated node.
    pub node_name: String,
    /// Translation keys.
    pub position_keys: Vec<VectorKey>,
    /// Rotation keys.
    pub rotation_keys: Vec<RotationKey>,
    /// Scale keys.
    pub scaling_keys: Vec<VectorKey>,
    /// Morph weight keys.
    pub morph_weight_keys: Vec<MorphWeightKey>,
}

/// A named animation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneAnimation {
    /// Animation name (may be empty).
    pub name: String,
    /// Length of the animation, in ticks.
    pub duration_ticks: f64,
    /// Playback rate; `0.0` when the file does not say.
    pub ticks_per_second: f64,
    /// Per-node channels.
    pub channels: Vec<NodeAnimationChannel>,
}
