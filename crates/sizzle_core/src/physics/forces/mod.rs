//! # Force Generators
//!
//! A generator reads particle state through store queries and adds into
//! the `Force` (or `Torque`) accumulator. It never writes position or
//! velocity. Particles lacking a generator's attributes are skipped by the
//! query itself.
//!
//! Contributions that are NaN/Inf, or that would make the accumulator
//! non-finite, are dropped for that particle and counted as suppressed.

mod buoyancy;
mod explosion;
mod gravity;
mod spring;
mod vortex;
mod wind;

pub use buoyancy::{BuoyancyGenerator, Submersion};
pub use explosion::{BlastExposure, ExplosionGenerator};
pub use gravity::GravityGenerator;
pub use spring::{
    spring_force, DynamicAnchor, DynamicAnchors, DynamicSpringGenerator, StaticAnchor,
    StaticAnchors, StaticSpringGenerator, MAX_ANCHORS,
};
pub use vortex::VortexGenerator;
pub use wind::{WindApplication, WindGenerator};

use sizzle_shared::Vec3;
use tracing::warn;

use crate::ecs::{ComponentStore, ParticleId};

/// Per-tick contributor to the force/torque accumulators.
pub trait ForceGenerator {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Adds this generator's contribution for one tick of `dt` seconds.
    ///
    /// Must not spawn or despawn particles.
    fn apply_to_particles(&mut self, store: &mut ComponentStore, dt: f32) -> ForceReport;
}

/// What one generator did during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForceReport {
    /// Particles the generator's query visited.
    pub matched: usize,
    /// Contributions dropped as non-finite.
    pub suppressed: usize,
}

impl ForceReport {
    /// Adds `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        self.matched += other.matched;
        self.suppressed += other.suppressed;
    }
}

/// Adds `contribution` into `accumulator` unless the result would be
/// non-finite.
///
/// Returns `false` when the contribution was dropped.
pub(crate) fn accumulate(
    accumulator: &mut Vec3,
    contribution: Vec3,
    generator: &str,
    particle: ParticleId,
) -> bool {
    let sum = *accumulator + contribution;
    if sum.is_finite() {
        *accumulator = sum;
        true
    } else {
        warn!(
            generator,
            particle = particle.raw(),
            ?contribution,
            "dropped non-finite contribution"
        );
        false
    }
}
