//! # Integrators
//!
//! Explicit single-step integrators for point masses. Each one leaves
//! `previous_position` at the pre-step position and `position`/`velocity`
//! at the post-step values.
//!
//! Damping `d` is a per-second retention factor: a step of `dt` scales
//! velocity by `d^dt`, so results do not depend on the frame rate.

use serde::{Deserialize, Serialize};
use sizzle_shared::Vec3;

use super::particle::PointParticle;

/// Integration scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integrator {
    /// Position from the old velocity, then velocity.
    Euler,
    /// Velocity first, position from the new velocity.
    SemiImplicitEuler,
    /// Half velocity update, full position update, second half.
    #[default]
    Midpoint,
    /// Position from the last two positions; velocity derived.
    Verlet,
}

impl Integrator {
    /// Advances `particle` by `dt` under constant `acceleration`.
    ///
    /// `dt` must be positive; callers validate it once per tick.
    #[inline]
    pub fn step(self, particle: &mut PointParticle, acceleration: Vec3, damping: f32, dt: f32) {
        debug_assert!(dt > 0.0, "integrator step with dt = {dt}");
        match self {
            Self::Euler => {
                let retain = damping.powf(dt);
                particle.previous_position = particle.position;
                particle.position += particle.velocity * dt;
                particle.velocity = particle.velocity * retain + acceleration * dt;
            }
            Self::SemiImplicitEuler => {
                let retain = damping.powf(dt);
                particle.velocity = particle.velocity * retain + acceleration * dt;
                particle.previous_position = particle.position;
                particle.position += particle.velocity * dt;
            }
            Self::Midpoint => {
                let half_dt = dt * 0.5;
                let half_retain = damping.powf(half_dt);
                particle.velocity = particle.velocity * half_retain + acceleration * half_dt;
                particle.previous_position = particle.position;
                particle.position += particle.velocity * dt;
                particle.velocity = particle.velocity * half_retain + acceleration * half_dt;
            }
            Self::Verlet => {
                let retain = damping.powf(dt);
                let current = particle.position;
                let next =
                    current + (current - particle.previous_position) * retain + acceleration * (dt * dt);
                particle.velocity = (next - current) / dt;
                particle.previous_position = current;
                particle.position = next;
            }
        }
    }

    /// All schemes, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Euler,
        Self::SemiImplicitEuler,
        Self::Midpoint,
        Self::Verlet,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving() -> PointParticle {
        PointParticle {
            previous_position: Vec3::new(-0.5, -1.0, 0.0),
            position: Vec3::ZERO,
            velocity: Vec3::new(1.0, 2.0, 0.0),
        }
    }

    #[test]
    fn test_zero_acceleration_is_exact() {
        for integrator in [
            Integrator::Euler,
            Integrator::SemiImplicitEuler,
            Integrator::Midpoint,
        ] {
            let mut p = moving();
            integrator.step(&mut p, Vec3::ZERO, 1.0, 0.5);
            assert_eq!(p.position, Vec3::new(0.5, 1.0, 0.0), "{integrator:?}");
            assert_eq!(p.previous_position, Vec3::ZERO, "{integrator:?}");
            assert_eq!(p.velocity, Vec3::new(1.0, 2.0, 0.0), "{integrator:?}");
        }
    }

    #[test]
    fn test_verlet_constant_velocity() {
        let mut p = moving();
        for step in 1..=4 {
            Integrator::Verlet.step(&mut p, Vec3::ZERO, 1.0, 0.5);
            let expected = Vec3::new(0.5, 1.0, 0.0) * step as f32;
            assert_eq!(p.position, expected);
            assert_eq!(p.velocity, Vec3::new(1.0, 2.0, 0.0));
        }
    }

    #[test]
    fn test_euler_uses_old_velocity() {
        let mut p = PointParticle::at_rest(Vec3::ZERO);
        Integrator::Euler.step(&mut p, Vec3::new(0.0, -2.0, 0.0), 1.0, 0.5);
        assert_eq!(p.position, Vec3::ZERO);
        assert_eq!(p.velocity, Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_semi_implicit_uses_new_velocity() {
        let mut p = PointParticle::at_rest(Vec3::ZERO);
        Integrator::SemiImplicitEuler.step(&mut p, Vec3::new(0.0, -2.0, 0.0), 1.0, 0.5);
        assert_eq!(p.velocity, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(p.position, Vec3::new(0.0, -0.5, 0.0));
    }

    #[test]
    fn test_midpoint_splits_acceleration() {
        let mut p = PointParticle::at_rest(Vec3::ZERO);
        Integrator::Midpoint.step(&mut p, Vec3::new(0.0, -2.0, 0.0), 1.0, 0.5);
        assert_eq!(p.position, Vec3::new(0.0, -0.25, 0.0));
        assert_eq!(p.velocity, Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_verlet_acceleration_term() {
        let mut p = PointParticle::at_rest(Vec3::ZERO);
        Integrator::Verlet.step(&mut p, Vec3::new(0.0, -2.0, 0.0), 1.0, 0.5);
        assert_eq!(p.position, Vec3::new(0.0, -0.5, 0.0));
        assert_eq!(p.velocity, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(p.previous_position, Vec3::ZERO);
    }

    #[test]
    fn test_damping_is_per_second() {
        let mut coarse = PointParticle::new(Vec3::ZERO, Vec3::X);
        let mut fine = coarse;
        Integrator::SemiImplicitEuler.step(&mut coarse, Vec3::ZERO, 0.5, 1.0);
        for _ in 0..4 {
            Integrator::SemiImplicitEuler.step(&mut fine, Vec3::ZERO, 0.5, 0.25);
        }
        assert!((coarse.velocity.x - 0.5).abs() < 1e-6);
        assert!((fine.velocity.x - 0.5).abs() < 1e-6);
    }
}
