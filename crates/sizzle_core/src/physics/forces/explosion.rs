//! Radial blast with exponential fade.

use sizzle_shared::{Vec3, MIN_DISTANCE_SQUARED};

use super::{accumulate, ForceGenerator, ForceReport};
use crate::ecs::{Attribute, ComponentStore, Force, Position};

/// Seconds a particle has spent inside the blast radius.
///
/// Reset to zero the first tick the particle is found outside.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlastExposure {
    /// Accumulated seconds inside.
    pub elapsed: f32,
}

impl Attribute for BlastExposure {}

/// `F = K / r² · r̂ · exp(-elapsed / fade_time)` inside a sphere.
///
/// Exposure is tracked per particle in [`BlastExposure`], which the
/// generator attaches on first contact. Two explosions share that
/// attribute, so only one explosion should be active at a time.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplosionGenerator {
    /// Blast origin.
    pub center: Vec3,
    /// Blast radius (m).
    pub radius: f32,
    /// Strength `K`.
    pub strength: f32,
    /// Fade time constant (s). Non-positive means the blast has no force.
    pub fade_time: f32,
}

impl ExplosionGenerator {
    /// Explosion at `center`.
    #[must_use]
    pub fn new(center: Vec3, radius: f32, strength: f32, fade_time: f32) -> Self {
        Self {
            center,
            radius,
            strength,
            fade_time,
        }
    }

    /// True when `position` lies inside the blast sphere (boundary included).
    #[inline]
    #[must_use]
    pub fn contains(&self, position: Vec3) -> bool {
        position.distance_squared(self.center) <= self.radius * self.radius
    }

    /// Force at `position` after `elapsed` seconds of exposure.
    #[must_use]
    pub fn force_at(&self, position: Vec3, elapsed: f32) -> Vec3 {
        let offset = position - self.center;
        let distance_squared = offset.length_squared();
        if distance_squared <= MIN_DISTANCE_SQUARED || self.fade_time <= 0.0 {
            return Vec3::ZERO;
        }
        let fade = (-elapsed / self.fade_time).exp();
        offset.normalized() * (self.strength / distance_squared * fade)
    }
}

impl ForceGenerator for ExplosionGenerator {
    fn name(&self) -> &str {
        "explosion"
    }

    fn apply_to_particles(&mut self, store: &mut ComponentStore, dt: f32) -> ForceReport {
        // exposure is attached lazily, outside the iteration below
        for id in store.query_ids::<(&Position, &Force)>() {
            if !store.has::<BlastExposure>(id) {
                store.set(id, BlastExposure::default());
            }
        }

        let mut suppressed = 0;
        let matched = store.query::<(&Position, &mut BlastExposure, &mut Force), _>(
            |id, (position, exposure, force)| {
                if !self.contains(position.0) {
                    exposure.elapsed = 0.0;
                    return;
                }
                exposure.elapsed += dt;
                let contribution = self.force_at(position.0, exposure.elapsed);
                if !accumulate(&mut force.0, contribution, "explosion", id) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::ParticleId;

    fn particle(store: &mut ComponentStore, index: u32, position: Vec3) -> ParticleId {
        let id = ParticleId::new(index);
        store.set(id, Position(position));
        store.set(id, Force(Vec3::ZERO));
        id
    }

    #[test]
    fn test_force_points_outwards_and_fades() {
        let blast = ExplosionGenerator::new(Vec3::ZERO, 10.0, 8.0, 1.0);
        let fresh = blast.force_at(Vec3::new(2.0, 0.0, 0.0), 0.0);
        assert_eq!(fresh, Vec3::new(2.0, 0.0, 0.0));
        let faded = blast.force_at(Vec3::new(2.0, 0.0, 0.0), 1.0);
        assert!((faded.x - 2.0 * (-1.0f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_singularity_and_zero_fade_are_zero() {
        let blast = ExplosionGenerator::new(Vec3::ZERO, 10.0, 8.0, 1.0);
        assert_eq!(blast.force_at(Vec3::ZERO, 0.0), Vec3::ZERO);
        let instant = ExplosionGenerator::new(Vec3::ZERO, 10.0, 8.0, 0.0);
        assert_eq!(instant.force_at(Vec3::X, 0.0), Vec3::ZERO);
    }

    #[test]
    fn test_boundary_exposure_grows_then_resets() {
        let mut blast = ExplosionGenerator::new(Vec3::ZERO, 2.0, 1.0, 5.0);
        let mut store = ComponentStore::new();
        let id = particle(&mut store, 0, Vec3::new(2.0, 0.0, 0.0));

        let mut last = 0.0;
        for _ in 0..3 {
            blast.apply_to_particles(&mut store, 0.25);
            let elapsed = store.get::<BlastExposure>(id).elapsed;
            assert!(elapsed >= last);
            last = elapsed;
        }
        assert_eq!(last, 0.75);
        assert!(store.get::<Force>(id).0.x > 0.0);

        store.get_mut::<Position>(id).0 = Vec3::new(2.001, 0.0, 0.0);
        store.get_mut::<Force>(id).0 = Vec3::ZERO;
        blast.apply_to_particles(&mut store, 0.25);
        assert_eq!(store.get::<BlastExposure>(id).elapsed, 0.0);
        assert_eq!(store.get::<Force>(id).0, Vec3::ZERO);
    }

    #[test]
    fn test_particles_without_force_are_untouched() {
        let mut blast = ExplosionGenerator::new(Vec3::ZERO, 5.0, 1.0, 1.0);
        let mut store = ComponentStore::new();
        let bare = ParticleId::new(1);
        store.set(bare, Position(Vec3::X));
        let report = blast.apply_to_particles(&mut store, 0.1);
        assert_eq!(report.matched, 0);
        assert!(!store.has::<BlastExposure>(bare));
    }
}
