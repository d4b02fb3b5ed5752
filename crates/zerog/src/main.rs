//! # ZEROG Scene Runner
//!
//! Loads a scene, installs the demo systems and steps the game headlessly.
//!
//! ## Usage
//!
//! ```bash
//! zerog --scene crates/zerog/scenes/arena.toml --steps 120 --delta 0.016
//! RUST_LOG=zerog_core=trace zerog --scene my_scene.toml
//! ```

mod scene;
mod systems;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use zerog_core::{EcsError, EcsResult, Game, GameConfig};

use crate::scene::Scene;

/// Headless ZEROG scene runner
#[derive(Parser, Debug)]
#[command(name = "zerog")]
#[command(about = "Run a ZEROG scene for a fixed number of steps")]
struct Args {
    /// Scene file (TOML manifest plus [[entities]])
    #[arg(long, short = 's')]
    scene: PathBuf,

    /// Number of steps to run
    #[arg(long, default_value_t = 60)]
    steps: u32,

    /// Delta passed to every step
    #[arg(long, default_value_t = 1.0 / 60.0)]
    delta: f64,

    /// Skip the movement system
    #[arg(long)]
    no_movement: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "zerog=info,zerog_core=info")]
    log: String,
}

fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(args: &Args) -> EcsResult<()> {
    let scene = Scene::load(&args.scene)?;
    info!(
        scene = %args.scene.display(),
        components = scene.world.components.len(),
        population = scene.population(),
        "scene loaded"
    );

    let mut config = GameConfig::from_manifest(scene.world.clone());
    if !args.no_movement {
        config = config.with_system(systems::movement);
    }
    let has_lifetime = scene.world.components.iter().any(|c| c.name == "Lifetime");
    if has_lifetime {
        config = config.with_system(systems::lifetime);
    }
    config = config.with_system(systems::report);

    let mut game = Game::new(config)?;
    scene.seed(&mut game)?;

    let mut failed_steps = 0u32;
    for _ in 0..args.steps {
        match game.step(args.delta) {
            Ok(()) => {}
            Err(EcsError::Flush { failures }) => {
                failed_steps += 1;
                warn!(frame = game.frame(), failures = failures.len(), "step had failed operations");
            }
            Err(other) => return Err(other),
        }
    }

    info!(
        steps = game.frame(),
        time = game.time(),
        live = game.live_entities(),
        archetypes = game.archetypes().archetype_count(),
        failed_steps,
        "run finished"
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = ?err.kind(), "{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["zerog", "--scene", "arena.toml"]);
        assert_eq!(args.steps, 60);
        assert!((args.delta - 1.0 / 60.0).abs() < 1e-12);
        assert!(!args.no_movement);
    }

    #[test]
    fn test_bundled_scene_runs() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenes/arena.toml");
        let path = path.to_string_lossy().into_owned();
        let args = Args::parse_from(["zerog", "--scene", path.as_str(), "--steps", "90"]);
        assert!(run(&args).is_ok());
    }
}
