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

//! Math types used throughout the workspace.
//!
//! Vector and matrix types are re-exported from `glam` (built with its `bytemuck`
//! feature so they can be written straight into GPU buffers).

mod geometry;

pub use geometry::Aabb;
pub use glam::{Mat3, Mat4, Quat, UVec4, Vec2, Vec3, Vec4};

/// A small tolerance for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;
