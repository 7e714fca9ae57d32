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

//! `prism-viewer`: prints what a model file contains and renders it to a PNG.

mod config;
mod render;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prism_core::math::Mat4;
use prism_lanes::{ModelLoaderFlags, SceneImporter};
use prism_model::{inspect, Model};
use prism_infra::{WgpuDevice, WgpuGraphicsContext};

use crate::config::ViewerConfig;
use crate::render::RenderSettings;

#[derive(Parser)]
#[command(name = "prism-viewer", version, about = "Inspect and render 3D model files")]
struct Cli {
    /// RON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Loader flags, overriding the configuration (e.g. `default,flip_uvs`)
    #[arg(short, long, global = true, value_delimiter = ',')]
    flags: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the node tree, the meshes and the animations of a model
    Inspect {
        /// Model file (.gltf, .glb or .obj)
        model: PathBuf,
    },
    /// Render a model offscreen with the lit shader and save it as PNG
    Render {
        /// Model file (.gltf, .glb or .obj)
        model: PathBuf,

        /// Output image
        #[arg(short, long, default_value = "render.png")]
        out: PathBuf,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,
    },
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .init();

    let cli = Cli::parse();
    let mut config = ViewerConfig::load(cli.config.as_deref())?;
    if !cli.flags.is_empty() {
        config.loader_flags = cli.flags;
    }
    let flags = config.loader_flags()?;

    match cli.command {
        Commands::Inspect { model } => inspect_model(&model, flags),
        Commands::Render {
            model,
            out,
            width,
            height,
        } => {
            config.width = width.unwrap_or(config.width);
            config.height = height.unwrap_or(config.height);
            render_model(&model, &out, flags, &config)
        }
    }
}

fn inspect_model(path: &Path, flags: ModelLoaderFlags) -> Result<()> {
    let scene = SceneImporter::new(flags)
        .import_file(path)
        .with_context(|| format!("Failed to import '{}'", path.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    inspect::print_node_tree(&scene, &mut out)?;
    writeln!(out)?;
    inspect::print_meshes(&scene, &mut out)?;
    writeln!(out)?;
    inspect::print_animation_tree(&scene, &mut out)?;
    Ok(())
}

fn render_model(path: &Path, out: &Path, flags: ModelLoaderFlags, config: &ViewerConfig) -> Result<()> {
    let settings = RenderSettings {
        width: config.width,
        height: config.height,
        clear_color: config.clear_color(),
        camera_margin: config.camera_margin,
        vertex_config: config.vertex_config()?,
    };
    settings.validate()?;

    let context = WgpuGraphicsContext::new_headless_blocking()?;
    let device = Arc::new(WgpuDevice::new(context));
    log::info!("Rendering on {}", device.adapter_description());

    let mut model = Model::load_from_file(path, Mat4::IDENTITY, flags, device.clone())
        .with_context(|| format!("Failed to load '{}'", path.display()))?;
    let image = render::render_model(&device, &mut model, &settings)?;
    image
        .save(out)
        .with_context(|| format!("Failed to write '{}'", out.display()))?;
    log::info!(
        "Wrote {}x{} render of '{}' to '{}'",
        settings.width,
        settings.height,
        path.display(),
        out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn render_arguments_parse() {
        let cli = Cli::try_parse_from([
            "prism-viewer",
            "render",
            "robot.gltf",
            "--out",
            "robot.png",
            "--width",
            "64",
            "--flags",
            "default,flip_uvs",
        ])
        .unwrap();
        assert_eq!(cli.flags, ["default", "flip_uvs"]);
        match cli.command {
            Commands::Render {
                model, out, width, height,
            } => {
                assert_eq!(model, PathBuf::from("robot.gltf"));
                assert_eq!(out, PathBuf::from("robot.png"));
                assert_eq!(width, Some(64));
                assert_eq!(height, None);
            }
            Commands::Inspect { .. } => panic!("parsed the wrong command"),
        }
    }
}
