//! Buoyancy in a liquid column.

use serde::{Deserialize, Serialize};
use sizzle_shared::Vec3;

use super::{accumulate, ForceGenerator, ForceReport};
use crate::ecs::{BodyRadius, ComponentStore, Force, Position};

/// How submersion is measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Submersion {
    /// The particle is a point: fully in or fully out.
    #[default]
    Point,
    /// Uses [`BodyRadius`] when present: linear between touching the
    /// surface from below and from above.
    RadiusAware,
}

/// Lifts particles below the surface `base + liquid_height`.
///
/// `F = density · factor · submersion · ĥ`, where `factor` is the volume or
/// gravity term and `ĥ` the unit liquid-height direction.
#[derive(Clone, Debug, PartialEq)]
pub struct BuoyancyGenerator {
    /// Bottom reference point of the liquid.
    pub base: Vec3,
    /// From `base` to the surface.
    pub liquid_height: Vec3,
    /// Liquid density.
    pub density: f32,
    /// Volume or gravity term.
    pub factor: f32,
    /// Submersion model.
    pub submersion: Submersion,
}

impl BuoyancyGenerator {
    /// Point-submersion buoyancy.
    #[must_use]
    pub fn new(base: Vec3, liquid_height: Vec3, density: f32, factor: f32) -> Self {
        Self {
            base,
            liquid_height,
            density,
            factor,
            submersion: Submersion::Point,
        }
    }

    /// Selects the submersion model.
    #[must_use]
    pub fn with_submersion(mut self, submersion: Submersion) -> Self {
        self.submersion = submersion;
        self
    }

    /// Submerged fraction in `[0, 1]` for a particle at `position`.
    #[must_use]
    pub fn submersion_at(&self, position: Vec3, radius: Option<f32>) -> f32 {
        let surface = self.liquid_height.length();
        let depth = (position - self.base).scalar_projection(self.liquid_height);
        match (self.submersion, radius) {
            (Submersion::RadiusAware, Some(r)) if r > 0.0 => {
                if depth + r <= surface {
                    1.0
                } else if depth - r >= surface {
                    0.0
                } else {
                    (surface - (depth - r)) / (2.0 * r)
                }
            }
            _ => {
                if depth <= surface {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Force for a given submersion.
    #[must_use]
    pub fn force_for(&self, submersion: f32) -> Vec3 {
        self.liquid_height.normalized() * (self.density * self.factor * submersion)
    }
}

impl ForceGenerator for BuoyancyGenerator {
    fn name(&self) -> &str {
        "buoyancy"
    }

    fn apply_to_particles(&mut self, store: &mut ComponentStore, _dt: f32) -> ForceReport {
        let mut suppressed = 0;
        let matched = store.query::<(&Position, Option<&BodyRadius>, &mut Force), _>(
            |id, (position, radius, force)| {
                let submersion = self.submersion_at(position.0, radius.map(|r| r.0));
                if submersion > 0.0 && !accumulate(&mut force.0, self.force_for(submersion), "buoyancy", id) {
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

    fn pool() -> BuoyancyGenerator {
        BuoyancyGenerator::new(Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0), 1000.0, 0.5)
    }

    #[test]
    fn test_surface_is_fully_submerged() {
        let pool = pool();
        let at_surface = pool.submersion_at(Vec3::new(3.0, 2.0, -1.0), None);
        assert_eq!(at_surface, 1.0);
        assert_eq!(pool.force_for(at_surface), Vec3::new(0.0, 500.0, 0.0));
        assert_eq!(pool.submersion_at(Vec3::new(0.0, 2.001, 0.0), None), 0.0);
        assert_eq!(pool.submersion_at(Vec3::new(0.0, -5.0, 0.0), None), 1.0);
    }

    #[test]
    fn test_radius_aware_is_linear() {
        let pool = pool().with_submersion(Submersion::RadiusAware);
        assert_eq!(pool.submersion_at(Vec3::new(0.0, 1.5, 0.0), Some(0.5)), 1.0);
        assert_eq!(pool.submersion_at(Vec3::new(0.0, 2.5, 0.0), Some(0.5)), 0.0);
        assert_eq!(pool.submersion_at(Vec3::new(0.0, 2.0, 0.0), Some(0.5)), 0.5);
        assert_eq!(pool.submersion_at(Vec3::new(0.0, 2.25, 0.0), Some(0.5)), 0.25);
        // no radius attribute: point rule
        assert_eq!(pool.submersion_at(Vec3::new(0.0, 2.0, 0.0), None), 1.0);
    }

    #[test]
    fn test_apply_skips_dry_particles() {
        let mut store = ComponentStore::new();
        let wet = ParticleId::new(0);
        let dry = ParticleId::new(1);
        store.set(wet, Position(Vec3::new(0.0, 1.0, 0.0)));
        store.set(dry, Position(Vec3::new(0.0, 3.0, 0.0)));
        for id in [wet, dry] {
            store.set(id, Force(Vec3::ZERO));
        }
        let report = pool().apply_to_particles(&mut store, 0.1);
        assert_eq!(report.matched, 2);
        assert_eq!(store.get::<Force>(wet).0, Vec3::new(0.0, 500.0, 0.0));
        assert_eq!(store.get::<Force>(dry).0, Vec3::ZERO);
    }
}
