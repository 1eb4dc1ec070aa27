//! # Particle Composites
//!
//! Value types handed to `spawn`. Each one is stored as separate
//! attribute columns, so a generator that only needs `Position` sees
//! point particles, mass particles and projectiles alike.

use sizzle_shared::Vec3;

use super::integrator::Integrator;
use crate::ecs::{Composite, GravityScale, InverseMass, Position, PreviousPosition, Velocity};

/// Kinematic state of a point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointParticle {
    /// Position before the last step.
    pub previous_position: Vec3,
    /// Current position.
    pub position: Vec3,
    /// Current velocity.
    pub velocity: Vec3,
}

impl PointParticle {
    /// Point at `position` moving with `velocity`.
    ///
    /// The position history starts flat, so Verlet integration sees zero
    /// velocity on the first step. Use [`with_history`](Self::with_history)
    /// when Verlet is selected.
    #[must_use]
    pub const fn new(position: Vec3, velocity: Vec3) -> Self {
        Self {
            previous_position: position,
            position,
            velocity,
        }
    }

    /// Point at rest.
    #[must_use]
    pub const fn at_rest(position: Vec3) -> Self {
        Self::new(position, Vec3::ZERO)
    }

    /// Point whose previous position is one step of `dt` behind.
    #[must_use]
    pub fn with_history(position: Vec3, velocity: Vec3, dt: f32) -> Self {
        Self {
            previous_position: position - velocity * dt,
            position,
            velocity,
        }
    }
}

impl Composite for PointParticle {
    type Fields = (PreviousPosition, Position, Velocity);

    fn to_fields(self) -> Self::Fields {
        (
            PreviousPosition(self.previous_position),
            Position(self.position),
            Velocity(self.velocity),
        )
    }

    fn from_fields((previous, position, velocity): Self::Fields) -> Self {
        Self {
            previous_position: previous.0,
            position: position.0,
            velocity: velocity.0,
        }
    }
}

/// Point with mass; the shape the composer integrates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MassParticle {
    /// Kinematic state.
    pub particle: PointParticle,
    /// `1 / mass`, zero for immovable.
    pub inverse_mass: f32,
}

impl Default for MassParticle {
    fn default() -> Self {
        Self {
            particle: PointParticle::default(),
            inverse_mass: 1.0,
        }
    }
}

impl MassParticle {
    /// Particle of `mass` kg.
    #[must_use]
    pub fn new(particle: PointParticle, mass: f32) -> Self {
        Self {
            particle,
            inverse_mass: InverseMass::from_mass(mass).0,
        }
    }

    /// Applies an instantaneous impulse: `v += I / m`.
    pub fn add_impulse(&mut self, impulse: Vec3) {
        self.particle.velocity += impulse * self.inverse_mass;
    }

    /// Adds `velocity` regardless of mass.
    pub fn add_velocity(&mut self, velocity: Vec3) {
        self.particle.velocity += velocity;
    }

    /// Advances under `acceleration` with the chosen scheme.
    pub fn integrate(&mut self, acceleration: Vec3, damping: f32, dt: f32, integrator: Integrator) -> Vec3 {
        integrator.step(&mut self.particle, acceleration, damping, dt);
        self.particle.position
    }

    /// Scales speed by `speed_factor` while keeping kinetic energy.
    ///
    /// `0.5·m·v² = 0.5·m'·(v·s)²` gives `m' = m / s²`. Returns the scaled
    /// particle and the factor gravity must be scaled by (`s²`) for the
    /// trajectory to keep its shape.
    #[must_use]
    pub fn scale_preserving_kinetic_energy(&self, speed_factor: f32) -> (Self, f32) {
        let squared = speed_factor * speed_factor;
        let mut scaled = *self;
        scaled.particle.velocity *= speed_factor;
        scaled.inverse_mass *= squared;
        (scaled, squared)
    }
}

impl Composite for MassParticle {
    type Fields = (PreviousPosition, Position, Velocity, InverseMass);

    fn to_fields(self) -> Self::Fields {
        let (previous, position, velocity) = self.particle.to_fields();
        (previous, position, velocity, InverseMass(self.inverse_mass))
    }

    fn from_fields((previous, position, velocity, inverse_mass): Self::Fields) -> Self {
        Self {
            particle: PointParticle::from_fields((previous, position, velocity)),
            inverse_mass: inverse_mass.0,
        }
    }
}

/// Mass particle slowed down for display, with gravity rescaled so it
/// still follows the same arc.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projectile {
    /// Scaled particle.
    pub particle: MassParticle,
    /// Multiplier applied by gravity generators.
    pub gravity_scale: f32,
}

impl Projectile {
    /// Projectile launched at `velocity`, simulated at
    /// `velocity * speed_factor`.
    #[must_use]
    pub fn new(mass: f32, position: Vec3, velocity: Vec3, speed_factor: f32) -> Self {
        let real = MassParticle::new(PointParticle::new(position, velocity), mass);
        let (particle, gravity_scale) = real.scale_preserving_kinetic_energy(speed_factor);
        Self {
            particle,
            gravity_scale,
        }
    }
}

impl Composite for Projectile {
    type Fields = (PreviousPosition, Position, Velocity, InverseMass, GravityScale);

    fn to_fields(self) -> Self::Fields {
        let (previous, position, velocity, inverse_mass) = self.particle.to_fields();
        (
            previous,
            position,
            velocity,
            inverse_mass,
            GravityScale(self.gravity_scale),
        )
    }

    fn from_fields((previous, position, velocity, inverse_mass, scale): Self::Fields) -> Self {
        Self {
            particle: MassParticle::from_fields((previous, position, velocity, inverse_mass)),
            gravity_scale: scale.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{ComponentStore, ParticleId};

    #[test]
    fn test_impulse_divides_by_mass() {
        let mut p = MassParticle::new(PointParticle::at_rest(Vec3::ZERO), 4.0);
        p.add_impulse(Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(p.particle.velocity, Vec3::new(0.5, 0.0, 0.0));
        p.add_velocity(Vec3::Y);
        assert_eq!(p.particle.velocity, Vec3::new(0.5, 1.0, 0.0));
    }

    #[test]
    fn test_scaling_preserves_kinetic_energy() {
        let p = MassParticle::new(PointParticle::new(Vec3::ZERO, Vec3::new(3.0, 4.0, 0.0)), 2.0);
        let (scaled, gravity_scale) = p.scale_preserving_kinetic_energy(0.5);
        let energy = |q: &MassParticle| 0.5 * q.particle.velocity.length_squared() / q.inverse_mass;
        assert!((energy(&p) - energy(&scaled)).abs() < 1e-4);
        assert_eq!(gravity_scale, 0.25);
        assert_eq!(scaled.particle.velocity, Vec3::new(1.5, 2.0, 0.0));
    }

    #[test]
    fn test_projectile_stores_gravity_scale() {
        let mut store = ComponentStore::new();
        let id = ParticleId::new(0);
        store.set_from(id, Projectile::new(1.0, Vec3::ZERO, Vec3::X * 100.0, 0.1));
        assert!((store.get::<GravityScale>(id).0 - 0.01).abs() < 1e-6);
        let back = store.get_as::<MassParticle>(id);
        assert!((back.particle.velocity.x - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_history_is_one_step_behind() {
        let p = PointParticle::with_history(Vec3::X, Vec3::new(2.0, 0.0, 0.0), 0.5);
        assert_eq!(p.previous_position, Vec3::ZERO);
    }
}
