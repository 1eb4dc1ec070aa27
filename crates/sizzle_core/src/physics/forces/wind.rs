//! Wind / drag inside a spherical area of effect.

use serde::{Deserialize, Serialize};
use sizzle_shared::Vec3;

use super::{accumulate, ForceGenerator, ForceReport};
use crate::ecs::{ComponentStore, Force, Position, Torque, Velocity};

/// Which accumulator the wind feeds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindApplication {
    /// Linear force on every particle with a velocity.
    #[default]
    Force,
    /// Torque on particles carrying a `Torque` accumulator (rigid bodies).
    Torque,
}

/// `F = k1·(v_wind − v) + k2·|v_wind − v|·(v_wind − v)` inside the area.
#[derive(Clone, Debug, PartialEq)]
pub struct WindGenerator {
    /// Center of the area of effect.
    pub area_center: Vec3,
    /// Radius of the area of effect.
    pub area_radius: f32,
    /// Air velocity inside the area.
    pub wind_velocity: Vec3,
    /// Laminar drag coefficient.
    pub k1: f32,
    /// Turbulent drag coefficient.
    pub k2: f32,
    /// Force or torque.
    pub application: WindApplication,
}

impl WindGenerator {
    /// Laminar wind (`k1 = 1`, `k2 = 0`) applied as force.
    #[must_use]
    pub fn new(area_center: Vec3, area_radius: f32, wind_velocity: Vec3) -> Self {
        Self {
            area_center,
            area_radius,
            wind_velocity,
            k1: 1.0,
            k2: 0.0,
            application: WindApplication::Force,
        }
    }

    /// Pure drag: still air everywhere inside the area.
    #[must_use]
    pub fn drag(area_center: Vec3, area_radius: f32, k1: f32, k2: f32) -> Self {
        Self::new(area_center, area_radius, Vec3::ZERO).with_coefficients(k1, k2)
    }

    /// Sets the drag coefficients.
    #[must_use]
    pub fn with_coefficients(mut self, k1: f32, k2: f32) -> Self {
        self.k1 = k1;
        self.k2 = k2;
        self
    }

    /// Selects force or torque output.
    #[must_use]
    pub fn with_application(mut self, application: WindApplication) -> Self {
        self.application = application;
        self
    }

    /// Contribution for a particle, zero outside the area.
    #[must_use]
    pub fn force_on(&self, position: Vec3, velocity: Vec3) -> Vec3 {
        if position.distance_squared(self.area_center) > self.area_radius * self.area_radius {
            return Vec3::ZERO;
        }
        let relative = self.wind_velocity - velocity;
        relative * self.k1 + relative * (self.k2 * relative.length())
    }
}

impl ForceGenerator for WindGenerator {
    fn name(&self) -> &str {
        "wind"
    }

    fn apply_to_particles(&mut self, store: &mut ComponentStore, _dt: f32) -> ForceReport {
        let mut suppressed = 0;
        let mut add = |id, position: &Position, velocity: &Velocity, target: &mut Vec3| {
            if !accumulate(target, self.force_on(position.0, velocity.0), "wind", id) {
                suppressed += 1;
            }
        };
        let matched = match self.application {
            WindApplication::Force => store
                .query::<(&Position, &Velocity, &mut Force), _>(|id, (p, v, f)| add(id, p, v, &mut f.0)),
            WindApplication::Torque => store
                .query::<(&Position, &Velocity, &mut Torque), _>(|id, (p, v, t)| add(id, p, v, &mut t.0)),
        };
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

    #[test]
    fn test_laminar_and_turbulent_terms() {
        let wind = WindGenerator::new(Vec3::ZERO, 10.0, Vec3::new(3.0, 0.0, 0.0))
            .with_coefficients(1.0, 0.5);
        let force = wind.force_on(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        // relative 2: 1*2 + 0.5*2*2
        assert_eq!(force, Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_outside_area_is_zero() {
        let wind = WindGenerator::new(Vec3::ZERO, 1.0, Vec3::X);
        assert_eq!(wind.force_on(Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO), Vec3::X);
        assert_eq!(wind.force_on(Vec3::new(0.0, 1.01, 0.0), Vec3::ZERO), Vec3::ZERO);
    }

    #[test]
    fn test_torque_application_targets_torque_only() {
        let mut store = ComponentStore::new();
        let point = ParticleId::new(0);
        let body = ParticleId::new(1);
        for id in [point, body] {
            store.set(id, Position(Vec3::ZERO));
            store.set(id, Velocity(Vec3::ZERO));
            store.set(id, Force(Vec3::ZERO));
        }
        store.set(body, Torque(Vec3::ZERO));

        let mut wind = WindGenerator::new(Vec3::ZERO, 5.0, Vec3::Z).with_application(WindApplication::Torque);
        let report = wind.apply_to_particles(&mut store, 0.1);
        assert_eq!(report.matched, 1);
        assert_eq!(store.get::<Torque>(body).0, Vec3::Z);
        assert_eq!(store.get::<Force>(body).0, Vec3::ZERO);
        assert_eq!(store.get::<Force>(point).0, Vec3::ZERO);
    }
}
