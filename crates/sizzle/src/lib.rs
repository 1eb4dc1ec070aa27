//! # SIZZLE
//!
//! Scene loading, contact plumbing and the frame loop around the
//! `sizzle_core` particle runtime.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────────────┐
//! │ scene.toml   │────>│ SceneConfig      │────>│ ParticleSystem       │
//! └──────────────┘     │  build_system()  │     │  store + allocator   │
//!                      └──────────────────┘     │  composer + sampler  │
//!                                               └──────────┬───────────┘
//! ┌──────────────┐     ┌──────────────────┐                │
//! │ body engine  │────>│ ContactChannel   │────> JustHit ──┤
//! └──────────────┘     └──────────────────┘                │
//!                      ┌──────────────────┐                │
//!                      │ SimulationLoop   │<───────────────┘
//!                      │  fixed timestep  │
//!                      │  frame stats     │
//!                      └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: TOML scene description
//! - `events`: Contact events from the rigid-body engine
//! - `game_loop`: Frame orchestration and timing

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod events;
pub mod game_loop;

pub use sizzle_core as core;

pub use config::{GeneratorConfig, SceneConfig, SceneError, SimulationConfig, SpawnConfig};
pub use events::{clear_hits, ContactChannel, ContactEvent, ContactSender, DrainReport, JustHit};
pub use game_loop::{FrameStats, FrameStatsAccumulator, LoopConfig, SimulationLoop};
