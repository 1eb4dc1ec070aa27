//! Inverse-square attraction toward a fixed point mass.

use sizzle_shared::{Vec3, EARTH_MASS, EARTH_RADIUS, GRAVITATIONAL_CONSTANT, MIN_DISTANCE_SQUARED};

use super::{accumulate, ForceGenerator, ForceReport};
use crate::ecs::{ComponentStore, Force, GravityScale, InverseMass, Position};

/// `F = G · M · m / r² · r̂`, scaled by the particle's [`GravityScale`].
///
/// Immovable particles (inverse mass 0) and particles closer than
/// [`MIN_DISTANCE_SQUARED`] to the source receive nothing.
#[derive(Clone, Debug, PartialEq)]
pub struct GravityGenerator {
    /// Position of the attracting mass.
    pub source_position: Vec3,
    /// Attracting mass (kg).
    pub source_mass: f32,
    /// `G`, overridable for stylised worlds.
    pub gravitational_constant: f32,
}

impl GravityGenerator {
    /// Point mass at `source_position`.
    #[must_use]
    pub fn new(source_position: Vec3, source_mass: f32) -> Self {
        Self {
            source_position,
            source_mass,
            gravitational_constant: GRAVITATIONAL_CONSTANT,
        }
    }

    /// The Earth, placed so that `surface` lies on its surface with `up`
    /// pointing away from its center. Gives roughly 9.8 m/s² near `surface`.
    #[must_use]
    pub fn earth(surface: Vec3, up: Vec3) -> Self {
        Self::new(surface - up.normalized() * EARTH_RADIUS, EARTH_MASS)
    }

    /// Overrides `G`.
    #[must_use]
    pub fn with_constant(mut self, gravitational_constant: f32) -> Self {
        self.gravitational_constant = gravitational_constant;
        self
    }

    /// Force on a particle at `position`.
    #[must_use]
    pub fn force_on(&self, position: Vec3, inverse_mass: f32, scale: f32) -> Vec3 {
        if inverse_mass <= 0.0 {
            return Vec3::ZERO;
        }
        let offset = self.source_position - position;
        let distance_squared = offset.length_squared();
        if distance_squared <= MIN_DISTANCE_SQUARED {
            return Vec3::ZERO;
        }
        let magnitude =
            self.gravitational_constant * self.source_mass / (inverse_mass * distance_squared);
        offset.normalized() * (magnitude * scale)
    }
}

impl ForceGenerator for GravityGenerator {
    fn name(&self) -> &str {
        "gravity"
    }

    fn apply_to_particles(&mut self, store: &mut ComponentStore, _dt: f32) -> ForceReport {
        let mut suppressed = 0;
        let matched = store.query::<(&Position, &InverseMass, Option<&GravityScale>, &mut Force), _>(
            |id, (position, inverse_mass, scale, force)| {
                let scale = scale.map_or(1.0, |s| s.0);
                let contribution = self.force_on(position.0, inverse_mass.0, scale);
                if !accumulate(&mut force.0, contribution, "gravity", id) {
                    suppressed += 1;
                }
            },
        );
        ForceReport {
            matched,
            suppressed,
        }
    }
}
