//! # Particle Physics
//!
//! Spawn sampling, force generators, integration and the composer that
//! ties them into a tick.

mod body;
mod composer;
pub mod forces;
mod integrator;
mod particle;
mod spawn;

pub use body::{BodyHandle, BodyState, NoRigidBodies, RigidBodyEngine, RigidBodyProxy};
pub use composer::{ForceComposer, StepReport};
pub use forces::{ForceGenerator, ForceReport};
pub use integrator::Integrator;
pub use particle::{MassParticle, PointParticle, Projectile};
pub use spawn::{Distribution, SpawnSample, SpawnSampler, SpawnVolume};
