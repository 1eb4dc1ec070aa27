//! Headless scene runner.
//!
//! ```text
//! sizzle_headless [scene.toml]
//! ```
//!
//! Runs the scene's configured tick count without a rigid-body engine and
//! prints frame statistics. Without an argument the bundled fountain scene
//! is used. Set `RUST_LOG` to adjust verbosity.

use std::process::ExitCode;

use sizzle::core::NoRigidBodies;
use sizzle::{SceneConfig, SimulationLoop};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const FOUNTAIN: &str = include_str!("../../data/scenes/fountain.toml");

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sizzle=info,sizzle_core=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let scene = match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "loading scene");
            SceneConfig::load(&path).map_err(|e| e.to_string())
        }
        None => {
            info!("loading bundled fountain scene");
            SceneConfig::from_toml_str(FOUNTAIN).map_err(|e| e.to_string())
        }
    };
    let scene = match scene {
        Ok(scene) => scene,
        Err(e) => {
            error!(error = %e, "invalid scene");
            return ExitCode::FAILURE;
        }
    };

    let mut sim = match SimulationLoop::from_scene(&scene) {
        Ok(sim) => sim,
        Err(e) => {
            error!(error = %e, "cannot build system");
            return ExitCode::FAILURE;
        }
    };

    let timestep = scene.simulation.timestep;
    let mut engine = NoRigidBodies;
    for _ in 0..scene.simulation.ticks {
        if !sim.system().is_active() {
            info!(elapsed = sim.system().elapsed(), "lifetime reached");
            break;
        }
        if let Err(e) = sim.run_frame(timestep, &mut engine) {
            error!(error = %e, frame = sim.frame_count(), "tick failed");
            return ExitCode::FAILURE;
        }
    }

    info!(
        frames = sim.frame_count(),
        alive = sim.system().alive_count(),
        elapsed = sim.system().elapsed(),
        "simulation finished"
    );
    sim.stats().print_summary();
    ExitCode::SUCCESS
}
