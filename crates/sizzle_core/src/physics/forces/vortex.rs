//! Tangential swirl around a vertical column (tornado).

use sizzle_shared::Vec3;

use super::{accumulate, ForceGenerator, ForceReport};
use crate::ecs::{ComponentStore, Force, Position};

/// Swirl force around the column `base + t·axis`, `0 <= t <= height`.
///
/// Direction is `radial × axis` (unit), magnitude `k · d² / radius²`
/// where `d` is the distance from the axis. Zero outside the column.
///
/// The tangent is normalized before scaling, so the magnitude grows with
/// `d²`. Scaling the raw cross product instead would grow with `d³`.
#[derive(Clone, Debug, PartialEq)]
pub struct VortexGenerator {
    base: Vec3,
    axis: Vec3,
    height: f32,
    radius: f32,
    k: f32,
}

impl VortexGenerator {
    /// Column from `base` along `axis` (normalized here).
    #[must_use]
    pub fn new(base: Vec3, axis: Vec3, height: f32, radius: f32, k: f32) -> Self {
        Self {
            base,
            axis: axis.normalized(),
            height,
            radius,
            k,
        }
    }

    /// Contribution at `position`.
    #[must_use]
    pub fn force_on(&self, position: Vec3) -> Vec3 {
        let local = position - self.base;
        let altitude = local.dot(self.axis);
        if altitude < 0.0 || altitude > self.height {
            return Vec3::ZERO;
        }
        let radial = local - self.axis * altitude;
        let distance_squared = radial.length_squared();
        let radius_squared = self.radius * self.radius;
        if distance_squared > radius_squared || radius_squared <= 0.0 {
            return Vec3::ZERO;
        }
        radial.cross(self.axis).normalized() * (self.k * distance_squared / radius_squared)
    }
}

impl ForceGenerator for VortexGenerator {
    fn name(&self) -> &str {
        "vortex"
    }

    fn apply_to_particles(&mut self, store: &mut ComponentStore, _dt: f32) -> ForceReport {
        let mut suppressed = 0;
        let matched = store.query::<(&Position, &mut Force), _>(|id, (position, force)| {
            if !accumulate(&mut force.0, self.force_on(position.0), "vortex", id) {
                suppressed += 1;
            }
        });
        ForceReport {
            matched,
            suppressed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column() -> VortexGenerator {
        VortexGenerator::new(Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0), 10.0, 2.0, 8.0)
    }

    #[test]
    fn test_tangential_direction_and_magnitude() {
        let force = column().force_on(Vec3::new(1.0, 5.0, 0.0));
        // X × Y = Z, scaled by 8 * 1/4
        assert_eq!(force, Vec3::new(0.0, 0.0, 2.0));
        assert_eq!(force.dot(Vec3::X), 0.0);
    }

    #[test]
    fn test_magnitude_scales_with_distance_squared() {
        let vortex = column();
        let near = vortex.force_on(Vec3::new(0.0, 5.0, 1.0));
        let rim = vortex.force_on(Vec3::new(0.0, 5.0, 2.0));
        assert_eq!(near, Vec3::new(-2.0, 0.0, 0.0));
        // twice as far, four times the force
        assert_eq!(rim, Vec3::new(-8.0, 0.0, 0.0));
    }

    #[test]
    fn test_zero_outside_column() {
        let vortex = column();
        assert_eq!(vortex.force_on(Vec3::new(1.0, -0.1, 0.0)), Vec3::ZERO);
        assert_eq!(vortex.force_on(Vec3::new(1.0, 10.5, 0.0)), Vec3::ZERO);
        assert_eq!(vortex.force_on(Vec3::new(2.5, 5.0, 0.0)), Vec3::ZERO);
    }

    #[test]
    fn test_on_axis_is_zero() {
        assert_eq!(column().force_on(Vec3::new(0.0, 3.0, 0.0)), Vec3::ZERO);
    }
}
