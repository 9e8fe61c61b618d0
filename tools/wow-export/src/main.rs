//! wow-export - WoW zone export tool
//!
//! Converts OBJ scenes into WMO root/group files and M2 doodads

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use wow_export::convert::{DEFAULT_FIRST_GROUP_ID, DEFAULT_WMO_ID};
use wow_export::obj::ObjSource;
use wow_export::{DirectorySink, ExportIds, ExportOptions, PartitionStrategy, SceneSource};
use wow_export::{export_scene, inspect, manifest};

#[derive(Parser)]
#[command(name = "wow-export")]
#[command(about = "WoW zone export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a single OBJ scene
    Zone {
        /// Input .obj file
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "out")]
        output: PathBuf,

        /// Zone name (default: input file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Partitioning strategy
        #[arg(short, long, value_enum, default_value_t = PartitionStrategy::default())]
        strategy: PartitionStrategy,

        /// Maximum triangles per group
        #[arg(long)]
        max_triangles: Option<usize>,

        /// Maximum vertices per group
        #[arg(long)]
        max_vertices: Option<usize>,

        /// Uniform scale applied to the scene
        #[arg(long, default_value_t = 1.0)]
        scale: f32,

        /// First WMO id
        #[arg(long, default_value_t = DEFAULT_WMO_ID)]
        wmo_id: u32,

        /// First group id
        #[arg(long, default_value_t = DEFAULT_FIRST_GROUP_ID)]
        first_group_id: u32,
    },

    /// Build a zone from a manifest file
    Build {
        /// Path to zone.toml manifest
        #[arg(default_value = "zone.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Partitioning strategy (overrides manifest)
        #[arg(short, long, value_enum)]
        strategy: Option<PartitionStrategy>,

        /// Maximum triangles per group (overrides manifest)
        #[arg(long)]
        max_triangles: Option<usize>,
    },

    /// Validate manifest without building
    Check {
        /// Path to zone.toml manifest
        #[arg(default_value = "zone.toml")]
        manifest: PathBuf,
    },

    /// Print the chunk tree of a WMO file or the header of an M2/skin file
    Inspect {
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Zone {
            input,
            output,
            name,
            strategy,
            max_triangles,
            max_vertices,
            scale,
            wmo_id,
            first_group_id,
        } => {
            let name = match name {
                Some(name) => name,
                None => input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .with_context(|| format!("Cannot derive a zone name from {:?}", input))?,
            };
            let mut options = ExportOptions::new(name);
            options.strategy = strategy;
            if let Some(max) = max_triangles {
                options.limits.max_triangles = max;
            }
            if let Some(max) = max_vertices {
                options.limits.max_vertices = max;
            }

            let scene = ObjSource::new(&input).with_scale(scale).load()?;
            let ids = ExportIds::new(wmo_id, first_group_id);
            export_scene(&scene, &options, &ids, &mut DirectorySink::new(&output))?;
            tracing::info!("Wrote {:?}", output);
        }

        Commands::Build {
            manifest,
            output,
            strategy,
            max_triangles,
        } => {
            let mut config = manifest::load_manifest(&manifest)?;
            if let Some(strategy) = strategy {
                config.zone.strategy = strategy;
            }
            if let Some(max) = max_triangles {
                config.zone.max_triangles = max;
            }
            let converted = manifest::build(&config, output.as_deref())?;
            tracing::info!(
                "Build complete! {} groups, {} diagnostics",
                converted.group_count(),
                converted.diagnostics.len()
            );
        }

        Commands::Check { manifest } => {
            let config = manifest::load_manifest(&manifest)?;
            manifest::validate(&config)?;
            tracing::info!("Manifest is valid: {:?}", manifest);
        }

        Commands::Inspect { file } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("Failed to read {:?}", file))?;
            for line in inspect::describe(&bytes)? {
                println!("{}", line);
            }
        }
    }

    Ok(())
}
