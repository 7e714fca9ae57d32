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

//! String-level path helpers used to resolve texture names relative to a model file.
//!
//! Texture names coming out of model files are arbitrary strings (`..\\tex\\a.png`,
//! `textures//b.jpg`), so these helpers operate on strings and always emit `/`.

/// The separator every cleaned path uses.
pub const SEPARATOR: char = '/';
const FOREIGN_SEPARATOR: char = '\\';

/// Returns the directory part of `path`, including the trailing separator.
///
/// Returns an empty string when `path` contains no separator.
///
/// # Examples
///
/// ```
/// use prism_core::utils::extract_base_path;
///
/// assert_eq!(extract_base_path("assets/models/duck.gltf"), "assets/models/");
/// assert_eq!(extract_base_path("duck.gltf"), "");
/// ```
pub fn extract_base_path(path: &str) -> String {
    let cleaned = clean_up_path(path);
    match cleaned.rfind(SEPARATOR) {
        Some(index) => cleaned[..=index].to_string(),
        None => String::new(),
    }
}

/// Normalizes separators to `/`, collapses repeated separators and trims whitespace.
pub fn clean_up_path(path: &str) -> String {
    let mut cleaned = String::with_capacity(path.len());
    let mut previous_was_separator = false;
    for c in path.trim().chars() {
        let c = if c == FOREIGN_SEPARATOR { SEPARATOR } else { c };
        if c == SEPARATOR {
            if previous_was_separator {
                continue;
            }
            previous_was_separator = true;
        } else {
            previous_was_separator = false;
        }
        cleaned.push(c);
    }
    cleaned
}

/// Joins two path fragments with exactly one separator between them.
///
/// When either fragment is empty, the other one is returned cleaned.
pub fn combine_paths(first: &str, second: &str) -> String {
    let first = clean_up_path(first);
    let second = clean_up_path(second);
    if first.is_empty() {
        return second;
    }
    if second.is_empty() {
        return first;
    }

    let head = first.strip_suffix(SEPARATOR).unwrap_or(&first);
    let tail = second.strip_prefix(SEPARATOR).unwrap_or(&second);
    format!("{head}{SEPARATOR}{tail}")
}
