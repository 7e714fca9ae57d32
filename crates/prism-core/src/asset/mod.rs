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

//! The asset marker trait.
//!
//! Loader lanes in `prism-lanes` produce values implementing [`Asset`]; this crate
//! knows nothing about how they are loaded.

/// A marker trait for types that can be produced by an asset loader.
///
/// `Send + Sync + 'static` lets loaded assets move to whichever thread uploads them.
pub trait Asset: Send + Sync + 'static {}
