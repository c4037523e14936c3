//! scene-forge command line
//!
//! Builds and edits scene documents headlessly, prints the generated preview
//! code and writes the standalone game archive.

use clap::{Parser, Subcommand};
use glam::DVec3;
use scene_forge::app::{EditorConfig, EditorSession};
use scene_forge::assets;
use scene_forge::render::HeadlessBackend;
use scene_forge::scene::{EntityId, LightKind, PrimitiveKind, SceneRegistry};
use scene_forge::ui::{Axis, FieldPath};
use scene_forge::SessionError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "scene-forge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Scene editor core and three.js game exporter", long_about = None)]
struct Cli {
    /// Editor settings (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a scene document holding only the ground
    New {
        scene: PathBuf,

        /// Add a red cube and a green sphere
        #[arg(long)]
        demo: bool,
    },

    /// Print the three.js preview code for a scene
    Code {
        scene: PathBuf,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the standalone game archive
    Export {
        scene: PathBuf,

        /// Output directory (defaults to the configured export_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Add a primitive (cube, sphere, cone, cylinder, plane) or a light
    /// (ambient, directional, point)
    Add {
        scene: PathBuf,

        kind: String,

        /// Position as x,y,z
        #[arg(long, value_parser = parse_vec3)]
        at: Option<DVec3>,
    },

    /// Import a glTF/GLB model
    Import { scene: PathBuf, model: PathBuf },

    /// Displace a plane from an image or procedural noise
    Terrain {
        scene: PathBuf,

        /// Entity id of the plane
        #[arg(long)]
        plane: u64,

        #[arg(long, conflicts_with = "seed", required_unless_present = "seed")]
        image: Option<PathBuf>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, default_value_t = 1.0)]
        scale: f64,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("unknown object kind '{0}'")]
    UnknownKind(String),
    #[error("failed to write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn parse_vec3(raw: &str) -> Result<DVec3, String> {
    let parts = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| err.to_string())?;
    match parts[..] {
        [x, y, z] if parts.iter().all(|v| v.is_finite()) => Ok(DVec3::new(x, y, z)),
        _ => Err(format!("expected x,y,z but got '{raw}'")),
    }
}

fn open(config: &EditorConfig, scene: &Path) -> Result<EditorSession, CliError> {
    Ok(EditorSession::open(config.clone(), HeadlessBackend::new(), scene)?)
}

fn run(cli: Cli, mut config: EditorConfig) -> Result<(), CliError> {
    match cli.command {
        Commands::New { scene, demo } => {
            let mut session =
                EditorSession::from_registry(config, HeadlessBackend::new(), SceneRegistry::new());
            if demo {
                session.add_primitive(PrimitiveKind::Cube, Some(DVec3::new(0.0, 1.0, 0.0)));
                session.apply_field_edit(FieldPath::MaterialColor, "#ff0000")?;
                session.add_primitive(PrimitiveKind::Sphere, Some(DVec3::new(3.0, 1.0, 0.0)));
                session.apply_field_edit(FieldPath::MaterialColor, "#00ff00")?;
            }
            session.save(&scene)?;
        }
        Commands::Code { scene, output } => {
            let code = open(&config, &scene)?.generate_preview_code();
            match output {
                Some(path) => std::fs::write(&path, code).map_err(|source| CliError::Write {
                    path: path.display().to_string(),
                    source,
                })?,
                None => print!("{code}"),
            }
        }
        Commands::Export { scene, output } => {
            if let Some(dir) = output {
                config.export_dir = dir;
            }
            let mut session = open(&config, &scene)?;
            let report = session.export_standalone_game()?;
            println!("{} ({:.2} MB)", report.path.display(), report.size_mb());
        }
        Commands::Add { scene, kind, at } => {
            let mut session = open(&config, &scene)?;
            let id = if let Some(primitive) = PrimitiveKind::from_name(&kind) {
                session.add_primitive(primitive, at)
            } else if let Some(light) = LightKind::from_name(&kind) {
                let id = session.add_light(light);
                if let Some(position) = at {
                    let axes = [Axis::X, Axis::Y, Axis::Z];
                    for (axis, value) in axes.into_iter().zip(position.to_array()) {
                        session.apply_field_edit(FieldPath::Position(axis), &value.to_string())?;
                    }
                }
                id
            } else {
                return Err(CliError::UnknownKind(kind));
            };
            session.save(&scene)?;
            println!("{id}");
        }
        Commands::Import { scene, model } => {
            let mut session = open(&config, &scene)?;
            let file_name = model
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| model.display().to_string());
            let bytes = assets::read_file(&model).map_err(SessionError::from)?;
            let id = session.import_model(bytes, &file_name)?;
            session.save(&scene)?;
            println!("{id}");
        }
        Commands::Terrain {
            scene,
            plane,
            image,
            seed,
            scale,
        } => {
            let mut session = open(&config, &scene)?;
            let id = EntityId(plane);
            session.set_height_scale(scale)?;
            match image {
                Some(path) => {
                    let bytes = assets::read_file(&path).map_err(SessionError::from)?;
                    let file_name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    session.apply_image_heightmap(id, &file_name, &bytes)?;
                }
                None => session.generate_procedural_heightmap(id, seed)?,
            }
            session.save(&scene)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EditorConfig::load(path),
        None => Ok(EditorConfig::default()),
    };
    let filter = config
        .as_ref()
        .map(|config| config.log_filter.clone())
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .init();

    let result = match config {
        Ok(config) => run(cli, config),
        Err(err) => Err(CliError::Session(err.into())),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
