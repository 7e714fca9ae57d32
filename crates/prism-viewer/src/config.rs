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

//! Viewer settings, read from a RON file.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use prism_core::renderer::Color;
use prism_lanes::ModelLoaderFlags;
use prism_model::VertexAttribData;
use serde::{Deserialize, Serialize};

/// Settings shared by the viewer commands. Missing fields take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Names of the [`ModelLoaderFlags`] used to import models.
    pub loader_flags: Vec<String>,
    /// Names of the [`VertexAttribData`] channels of the layout variant generated
    /// before rendering. Must include what the lit shader reads.
    pub vertex_config: Vec<String>,
    pub width: u32,
    pub height: u32,
    /// Linear RGBA background color.
    pub clear_color: [f64; 4],
    /// Scale applied to the bounding sphere when framing the model.
    pub camera_margin: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            loader_flags: vec!["DEFAULT".to_string()],
            vertex_config: vec!["POSITION".to_string(), "NORMAL".to_string()],
            width: 800,
            height: 600,
            clear_color: [0.1, 0.1, 0.12, 1.0],
            camera_margin: 1.2,
        }
    }
}

impl ViewerConfig {
    /// Reads the configuration at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        let config = Self::from_ron(&bytes)
            .with_context(|| format!("Failed to parse config '{}'", path.display()))?;
        log::info!("Loaded viewer config from '{}'", path.display());
        Ok(config)
    }

    pub fn from_ron(bytes: &[u8]) -> Result<Self> {
        let config: Self = ron::de::from_bytes(bytes)?;
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "output size must not be empty, got {}x{}",
                config.width,
                config.height
            ));
        }
        Ok(config)
    }

    pub fn to_ron(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    pub fn loader_flags(&self) -> Result<ModelLoaderFlags> {
        ModelLoaderFlags::from_flag_names(self.loader_flags.iter().map(String::as_str))
            .map_err(|name| anyhow!("Unknown loader flag '{name}'"))
    }

    pub fn vertex_config(&self) -> Result<VertexAttribData> {
        self.vertex_config
            .iter()
            .try_fold(VertexAttribData::EMPTY, |config, name| {
                VertexAttribData::from_name(name.trim())
                    .map(|attrib| config | attrib)
                    .ok_or_else(|| anyhow!("Unknown vertex attribute '{name}'"))
            })
    }

    pub fn clear_color(&self) -> Color {
        let [r, g, b, a] = self.clear_color;
        Color { r, g, b, a }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ViewerConfig::from_ron(b"(width: 320, loader_flags: [\"triangulate\", \"flip_uvs\"])")
            .unwrap();
        assert_eq!(config.width, 320);
        assert_eq!(config.height, 600);
        assert_eq!(
            config.loader_flags().unwrap(),
            ModelLoaderFlags::TRIANGULATE | ModelLoaderFlags::FLIP_UVS
        );
        assert_eq!(config.vertex_config().unwrap(), VertexAttribData::POSITION_NORMAL);
    }

    #[test]
    fn written_config_reads_back() {
        let config = ViewerConfig {
            clear_color: [1.0, 0.5, 0.0, 1.0],
            camera_margin: 2.0,
            ..Default::default()
        };
        let text = config.to_ron().unwrap();
        assert_eq!(ViewerConfig::from_ron(text.as_bytes()).unwrap(), config);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(ViewerConfig::from_ron(b"(width: 0)").is_err());
        assert!(ViewerConfig::from_ron(b"(widht: 10)").is_err());

        let config = ViewerConfig {
            loader_flags: vec!["wobble".into()],
            vertex_config: vec!["position".into(), "sparkle".into()],
            ..Default::default()
        };
        let flags_error = config.loader_flags().unwrap_err().to_string();
        assert!(flags_error.contains("wobble"), "{flags_error}");
        assert!(config.vertex_config().is_err());
    }

    #[test]
    fn load_without_path_uses_defaults() {
        assert_eq!(ViewerConfig::load(None).unwrap(), ViewerConfig::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.ron");
        std::fs::write(&path, "(height: 90)").unwrap();
        assert_eq!(ViewerConfig::load(Some(&path)).unwrap().height, 90);
    }
}
