//! # Force Composer
//!
//! Drives one tick in two phases:
//!
//! ```text
//! apply_to_particles:  sync proxies from engine -> zero Force/Torque -> generators (in order)
//! compose_forces:      integrate point masses   -> forward Force/Torque to engine
//! ```
//!
//! Point masses are particles carrying `PreviousPosition`, `Position`,
//! `Velocity`, `InverseMass` and `Force`. Rigid-body proxies carry a
//! [`RigidBodyProxy`] and no `PreviousPosition`, so they never match the
//! integration query; the engine integrates them.

use sizzle_shared::{Vec3, DEFAULT_DAMPING};
use tracing::{debug, warn};

use super::body::{RigidBodyEngine, RigidBodyProxy};
use super::forces::{ForceGenerator, ForceReport};
use super::integrator::Integrator;
use super::particle::PointParticle;
use crate::ecs::{
    ComponentStore, Force, InverseMass, ParticleMeta, Position, PreviousPosition, Torque, Velocity,
};
use crate::error::{validate_timestep, SimError, SimResult};

/// Counters from one composer step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Sum over all generators.
    pub forces: ForceReport,
    /// Point masses advanced.
    pub integrated: usize,
    /// Point masses whose step produced non-finite state and was undone.
    pub reverted: usize,
    /// Proxies refreshed from the engine.
    pub bodies_synced: usize,
    /// Proxies whose force/torque reached the engine.
    pub bodies_forwarded: usize,
    /// Proxies skipped because their force or torque was non-finite.
    pub bodies_skipped: usize,
}

/// Ordered generator list plus integration settings.
pub struct ForceComposer {
    generators: Vec<Box<dyn ForceGenerator>>,
    integrator: Integrator,
    damping: f32,
}

impl Default for ForceComposer {
    fn default() -> Self {
        Self::new(Integrator::default(), DEFAULT_DAMPING)
    }
}

impl std::fmt::Debug for ForceComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForceComposer")
            .field("generators", &self.generator_names())
            .field("integrator", &self.integrator)
            .field("damping", &self.damping)
            .finish()
    }
}

impl ForceComposer {
    /// Composer with no generators.
    #[must_use]
    pub fn new(integrator: Integrator, damping: f32) -> Self {
        Self {
            generators: Vec::new(),
            integrator,
            damping,
        }
    }

    /// Appends a generator; generators run in insertion order.
    pub fn add_generator(&mut self, generator: impl ForceGenerator + 'static) -> &mut Self {
        self.generators.push(Box::new(generator));
        self
    }

    /// Appends an already boxed generator.
    pub fn push_boxed(&mut self, generator: Box<dyn ForceGenerator>) {
        self.generators.push(generator);
    }

    /// Removes every generator.
    pub fn clear_generators(&mut self) {
        self.generators.clear();
    }

    /// Generator names in run order.
    #[must_use]
    pub fn generator_names(&self) -> Vec<&str> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    /// Active integration scheme.
    #[inline]
    #[must_use]
    pub fn integrator(&self) -> Integrator {
        self.integrator
    }

    /// Switches integration scheme.
    pub fn set_integrator(&mut self, integrator: Integrator) {
        self.integrator = integrator;
    }

    /// Per-second velocity retention.
    #[inline]
    #[must_use]
    pub fn damping(&self) -> f32 {
        self.damping
    }

    /// Sets per-second velocity retention.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidConfig`] unless `0 < damping <= 1`.
    pub fn set_damping(&mut self, damping: f32) -> SimResult<()> {
        if damping > 0.0 && damping <= 1.0 {
            self.damping = damping;
            Ok(())
        } else {
            Err(SimError::InvalidConfig(format!(
                "damping must be in (0, 1], got {damping}"
            )))
        }
    }

    /// Runs both phases.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidTimestep`] for a zero, negative or non-finite
    /// `dt`, before anything is touched.
    pub fn step(
        &mut self,
        store: &mut ComponentStore,
        dt: f32,
        engine: &mut dyn RigidBodyEngine,
    ) -> SimResult<StepReport> {
        let dt = validate_timestep(dt)?;
        let mut report = self.apply_to_particles(store, dt, engine);
        let integrated = self.compose_forces(store, dt, engine);
        report.integrated = integrated.integrated;
        report.reverted = integrated.reverted;
        report.bodies_forwarded = integrated.bodies_forwarded;
        report.bodies_skipped = integrated.bodies_skipped;
        debug!(
            matched = report.forces.matched,
            suppressed = report.forces.suppressed,
            integrated = report.integrated,
            reverted = report.reverted,
            bodies = report.bodies_forwarded,
            "composer step"
        );
        Ok(report)
    }

    /// Phase one: refresh proxies, zero the accumulators, run every
    /// generator once.
    pub fn apply_to_particles(
        &mut self,
        store: &mut ComponentStore,
        dt: f32,
        engine: &dyn RigidBodyEngine,
    ) -> StepReport {
        let bodies_synced = sync_bodies(store, engine);
        zero_accumulators(store);

        let mut forces = ForceReport::default();
        for generator in &mut self.generators {
            let report = generator.apply_to_particles(store, dt);
            if report.suppressed > 0 {
                warn!(
                    generator = generator.name(),
                    suppressed = report.suppressed,
                    "generator produced non-finite contributions"
                );
            }
            forces.merge(report);
        }
        StepReport {
            forces,
            bodies_synced,
            ..StepReport::default()
        }
    }

    /// Phase two: integrate point masses, forward proxy force and torque.
    pub fn compose_forces(
        &self,
        store: &mut ComponentStore,
        dt: f32,
        engine: &mut dyn RigidBodyEngine,
    ) -> StepReport {
        let integrator = self.integrator;
        let damping = self.damping;
        let mut reverted = 0;
        let integrated = store.query::<(
            &ParticleMeta,
            &InverseMass,
            &Force,
            &mut PreviousPosition,
            &mut Position,
            &mut Velocity,
        ), _>(|id, (meta, inverse_mass, force, previous, position, velocity)| {
            if meta.prefab {
                return;
            }
            let mut particle = PointParticle {
                previous_position: previous.0,
                position: position.0,
                velocity: velocity.0,
            };
            integrator.step(&mut particle, force.0 * inverse_mass.0, damping, dt);
            if particle.position.is_finite() && particle.velocity.is_finite() {
                previous.0 = particle.previous_position;
                position.0 = particle.position;
                velocity.0 = particle.velocity;
            } else {
                warn!(particle = id.raw(), "integration produced non-finite state, step undone");
                reverted += 1;
            }
        });

        let (bodies_forwarded, bodies_skipped) = forward_to_bodies(store, engine);
        StepReport {
            integrated: integrated - reverted,
            reverted,
            bodies_forwarded,
            bodies_skipped,
            ..StepReport::default()
        }
    }
}

/// Copies engine state into proxies; returns how many were refreshed.
fn sync_bodies(store: &mut ComponentStore, engine: &dyn RigidBodyEngine) -> usize {
    let mut synced = 0;
    for id in store.query_ids::<(&RigidBodyProxy,)>() {
        let body = store.get::<RigidBodyProxy>(id).body;
        let Some(state) = engine.body_state(body) else {
            debug!(particle = id.raw(), body = body.0, "proxy body unknown to engine");
            continue;
        };
        store.set(id, Position(state.position));
        store.set(id, Velocity(state.linear_velocity));
        store.set(id, InverseMass(state.inverse_mass));
        synced += 1;
    }
    synced
}

/// Zeroes `Force` on every simulated particle and `Torque` on every proxy,
/// attaching them where missing.
fn zero_accumulators(store: &mut ComponentStore) {
    let missing_force: Vec<_> = store
        .query_ids::<(&ParticleMeta,)>()
        .into_iter()
        .filter(|&id| !store.get::<ParticleMeta>(id).prefab && !store.has::<Force>(id))
        .collect();
    for id in missing_force {
        store.set(id, Force::default());
    }
    let missing_torque: Vec<_> = store
        .query_ids::<(&RigidBodyProxy,)>()
        .into_iter()
        .filter(|&id| !store.has::<Torque>(id))
        .collect();
    for id in missing_torque {
        store.set(id, Torque::default());
    }

    store.query::<(&mut Force,), _>(|_, (force,)| force.0 = Vec3::ZERO);
    store.query::<(&RigidBodyProxy, &mut Torque), _>(|_, (_, torque)| torque.0 = Vec3::ZERO);
}

/// Hands accumulated force and torque to the engine.
///
/// Returns `(forwarded, skipped)`.
fn forward_to_bodies(store: &mut ComponentStore, engine: &mut dyn RigidBodyEngine) -> (usize, usize) {
    let mut forwarded = 0;
    let mut skipped = 0;
    store.query::<(&RigidBodyProxy, &Force, Option<&Torque>), _>(|id, (proxy, force, torque)| {
        let torque = torque.map_or(Vec3::ZERO, |t| t.0);
        if !force.0.is_finite() || !torque.is_finite() {
            warn!(
                particle = id.raw(),
                body = proxy.body.0,
                "non-finite force or torque not forwarded"
            );
            skipped += 1;
            return;
        }
        engine.add_force(proxy.body, force.0);
        engine.add_torque(proxy.body, torque);
        forwarded += 1;
    });
    (forwarded, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{ParticleAllocator, ParticleId};
    use crate::physics::body::{BodyHandle, BodyState};
    use crate::physics::forces::GravityGenerator;
    use crate::physics::particle::MassParticle;
    use std::collections::HashMap;

    #[derive(Default)]
    struct RecordingEngine {
        states: HashMap<BodyHandle, BodyState>,
        forces: Vec<(BodyHandle, Vec3)>,
        torques: Vec<(BodyHandle, Vec3)>,
    }

    impl RigidBodyEngine for RecordingEngine {
        fn body_state(&self, body: BodyHandle) -> Option<BodyState> {
            self.states.get(&body).copied()
        }

        fn add_force(&mut self, body: BodyHandle, force: Vec3) {
            self.forces.push((body, force));
        }

        fn add_torque(&mut self, body: BodyHandle, torque: Vec3) {
            self.torques.push((body, torque));
        }
    }

    /// Constant push along +x, optionally poisoned with NaN.
    struct Push {
        amount: f32,
    }

    impl ForceGenerator for Push {
        fn name(&self) -> &str {
            "push"
        }

        fn apply_to_particles(&mut self, store: &mut ComponentStore, _dt: f32) -> ForceReport {
            let matched = store.query::<(&mut Force,), _>(|_, (force,)| {
                force.0 += Vec3::new(self.amount, 0.0, 0.0);
            });
            ForceReport {
                matched,
                suppressed: 0,
            }
        }
    }

    fn mass_particle(store: &mut ComponentStore, allocator: &mut ParticleAllocator, mass: f32) -> ParticleId {
        let id = allocator.allocate(store);
        store.set_from(id, MassParticle::new(PointParticle::at_rest(Vec3::ZERO), mass));
        id
    }

    #[test]
    fn test_forces_are_zeroed_each_step() {
        let mut store = ComponentStore::new();
        let mut allocator = ParticleAllocator::new();
        let id = mass_particle(&mut store, &mut allocator, 2.0);
        let mut composer = ForceComposer::new(Integrator::SemiImplicitEuler, 1.0);
        composer.add_generator(Push { amount: 4.0 });

        for _ in 0..3 {
            composer.step(&mut store, 0.5, &mut crate::physics::NoRigidBodies).unwrap();
            assert_eq!(store.get::<Force>(id).0, Vec3::new(4.0, 0.0, 0.0));
        }
        // a = 2 per step of 0.5: v = 1, 2, 3
        assert_eq!(store.get::<Velocity>(id).0, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_invalid_timestep_leaves_state() {
        let mut store = ComponentStore::new();
        let mut allocator = ParticleAllocator::new();
        let id = mass_particle(&mut store, &mut allocator, 1.0);
        store.get_mut::<Velocity>(id).0 = Vec3::X;
        let mut composer = ForceComposer::default();
        composer.add_generator(Push { amount: 1.0 });

        for dt in [0.0, -0.1, f32::NAN] {
            assert!(matches!(
                composer.step(&mut store, dt, &mut crate::physics::NoRigidBodies),
                Err(SimError::InvalidTimestep(_))
            ));
        }
        assert_eq!(store.get::<Position>(id).0, Vec3::ZERO);
        assert_eq!(store.get::<Velocity>(id).0, Vec3::X);
        assert!(!store.has::<Force>(id));
    }

    #[test]
    fn test_prefabs_are_not_integrated() {
        let mut store = ComponentStore::new();
        let mut allocator = ParticleAllocator::new();
        let prefab = allocator.allocate_with(
            &mut store,
            ParticleMeta {
                alive: true,
                prefab: true,
            },
        );
        store.set_from(prefab, MassParticle::new(PointParticle::new(Vec3::ZERO, Vec3::X), 1.0));
        let mut composer = ForceComposer::default();
        let report = composer.step(&mut store, 0.1, &mut crate::physics::NoRigidBodies).unwrap();
        assert_eq!(report.integrated, 0);
        assert_eq!(store.get::<Position>(prefab).0, Vec3::ZERO);
    }

    #[test]
    fn test_non_finite_step_is_reverted() {
        let mut store = ComponentStore::new();
        let mut allocator = ParticleAllocator::new();
        let id = mass_particle(&mut store, &mut allocator, 1.0);
        store.get_mut::<Velocity>(id).0 = Vec3::new(f32::MAX, 0.0, 0.0);
        let mut composer = ForceComposer::new(Integrator::Euler, 1.0);
        composer.add_generator(Push { amount: f32::MAX });

        let report = composer.step(&mut store, 4.0, &mut crate::physics::NoRigidBodies).unwrap();
        assert_eq!(report.reverted, 1);
        assert_eq!(report.integrated, 0);
        assert_eq!(store.get::<Position>(id).0, Vec3::ZERO);
    }

    #[test]
    fn test_proxy_synced_and_forwarded() {
        let body = BodyHandle(9);
        let mut engine = RecordingEngine::default();
        engine.states.insert(
            body,
            BodyState {
                position: Vec3::new(0.0, 10.0, 0.0),
                linear_velocity: Vec3::ZERO,
                inverse_mass: 0.5,
            },
        );
        let mut store = ComponentStore::new();
        let mut allocator = ParticleAllocator::new();
        let id = allocator.allocate(&mut store);
        store.set(id, RigidBodyProxy { body });

        let mut composer = ForceComposer::default();
        composer.add_generator(GravityGenerator::new(Vec3::ZERO, 100.0).with_constant(1.0));
        let report = composer.step(&mut store, 0.1, &mut engine).unwrap();

        assert_eq!(report.bodies_synced, 1);
        assert_eq!(report.bodies_forwarded, 1);
        assert_eq!(report.integrated, 0);
        assert_eq!(store.get::<Position>(id).0, Vec3::new(0.0, 10.0, 0.0));
        // G·M·m / r² = 100 · 2 / 100
        assert_eq!(engine.forces, vec![(body, Vec3::new(0.0, -2.0, 0.0))]);
        assert_eq!(engine.torques, vec![(body, Vec3::ZERO)]);
    }

    #[test]
    fn test_non_finite_force_not_forwarded() {
        let body = BodyHandle(1);
        let mut engine = RecordingEngine::default();
        let mut store = ComponentStore::new();
        let id = ParticleId::new(0);
        store.set(id, RigidBodyProxy { body });
        store.set(id, Force(Vec3::new(f32::INFINITY, 0.0, 0.0)));

        let composer = ForceComposer::default();
        let report = composer.compose_forces(&mut store, 0.1, &mut engine);
        assert_eq!(report.bodies_skipped, 1);
        assert!(engine.forces.is_empty());
        assert!(engine.torques.is_empty());
    }

    #[test]
    fn test_damping_validation() {
        let mut composer = ForceComposer::default();
        assert_eq!(composer.damping(), DEFAULT_DAMPING);
        assert!(composer.set_damping(0.0).is_err());
        assert!(composer.set_damping(1.5).is_err());
        assert!(composer.set_damping(1.0).is_ok());
        assert_eq!(composer.damping(), 1.0);
    }
}
