//! # SIZZLE Core
//!
//! Particle runtime: columnar attribute storage, AND-queries, force
//! generators and explicit integrators.
//!
//! ## Architecture Rules
//!
//! 1. **Attributes, not structs** - a particle is an id plus any subset of
//!    attribute columns
//! 2. **Generators only accumulate** - positions and velocities change in
//!    the integration phase alone
//! 3. **Finite or nothing** - NaN/Inf never reaches an attribute or the
//!    rigid-body engine
//!
//! ## Example
//!
//! ```rust,ignore
//! use sizzle_core::{GravityGenerator, MassParticle, ParticleSystem, PointParticle, SystemConfig};
//!
//! let mut system = ParticleSystem::new(SystemConfig::default())?;
//! system.add_generator(GravityGenerator::earth(Vec3::ZERO, Vec3::Y));
//! system.spawn(MassParticle::new(PointParticle::at_rest(Vec3::Y), 0.2));
//! system.tick(1.0 / 60.0)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod ecs;
pub mod error;
pub mod physics;
pub mod system;

pub use ecs::{
    Attribute, BodyRadius, ComponentStore, Composite, Force, GravityScale, InverseMass,
    ParticleAllocator, ParticleHandle, ParticleId, ParticleMeta, Position, PreviousPosition,
    RenderHandle, Torque, Velocity,
};
pub use error::{SimError, SimResult};
pub use physics::forces::{
    BuoyancyGenerator, DynamicSpringGenerator, ExplosionGenerator, GravityGenerator,
    StaticSpringGenerator, Submersion, VortexGenerator, WindApplication, WindGenerator,
};
pub use physics::{
    BodyHandle, BodyState, Distribution, ForceComposer, ForceGenerator, ForceReport, Integrator,
    MassParticle, NoRigidBodies, PointParticle, Projectile, RigidBodyEngine, RigidBodyProxy,
    SpawnSample, SpawnSampler, SpawnVolume, StepReport,
};
pub use system::{ParticleSystem, SystemConfig, TickStats};

pub use sizzle_shared::{Aabb, Vec3};
