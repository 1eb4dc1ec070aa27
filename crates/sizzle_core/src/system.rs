//! # Particle System
//!
//! Owned simulation context: one store, one allocator, one composer and an
//! optional spawn sampler. Gameplay code holds a `ParticleSystem` and calls
//! [`tick`](ParticleSystem::tick) once per frame.
//!
//! Structural changes are never made during iteration. Removal requested
//! mid-frame goes through [`queue_despawn`](ParticleSystem::queue_despawn)
//! and is applied at the end of the next tick.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sizzle_shared::{Aabb, Vec3, DEFAULT_DAMPING};
use tracing::{debug, trace};

use crate::ecs::{
    Attribute, ComponentStore, Composite, InverseMass, ParticleAllocator, ParticleHandle,
    ParticleId, ParticleMeta, Position, Query, Velocity,
};
use crate::error::{SimError, SimResult};
use crate::physics::forces::{DynamicSpringGenerator, StaticSpringGenerator, MAX_ANCHORS};
use crate::physics::{
    BodyHandle, BodyState, Distribution, ForceComposer, ForceGenerator, Integrator, NoRigidBodies,
    RigidBodyEngine, RigidBodyProxy, SpawnSample, SpawnSampler, SpawnVolume, StepReport,
};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Construction parameters for a [`ParticleSystem`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Expected particle count; sizes columns up front.
    pub capacity_hint: usize,
    /// Per-second velocity retention in `(0, 1]`.
    pub damping: f32,
    /// Integration scheme.
    pub integrator: Integrator,
    /// Seed for the spawn sampler.
    pub seed: u64,
    /// Simulated seconds after which the system reports inactive.
    pub lifetime: Option<f32>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            capacity_hint: 1024,
            damping: DEFAULT_DAMPING,
            integrator: Integrator::default(),
            seed: 0,
            lifetime: None,
        }
    }
}

impl SystemConfig {
    /// Checks parameter ranges.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> SimResult<()> {
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(SimError::InvalidConfig(format!(
                "damping must be in (0, 1], got {}",
                self.damping
            )));
        }
        if let Some(lifetime) = self.lifetime {
            if !(lifetime.is_finite() && lifetime > 0.0) {
                return Err(SimError::InvalidConfig(format!(
                    "lifetime must be finite and > 0, got {lifetime}"
                )));
            }
        }
        Ok(())
    }
}

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickStats {
    /// Composer counters.
    pub step: StepReport,
    /// Particles removed by the end-of-tick flush.
    pub despawned: usize,
    /// Live particles after the tick.
    pub alive: usize,
    /// Simulated seconds since creation.
    pub elapsed: f32,
}

// ============================================================================
// PARTICLE SYSTEM
// ============================================================================

/// A self-contained particle simulation.
///
/// # Example
///
/// ```rust,ignore
/// let mut system = ParticleSystem::new(SystemConfig::default())?;
/// system.add_generator(GravityGenerator::earth(Vec3::ZERO, Vec3::Y));
/// let id = system.spawn(MassParticle::new(PointParticle::at_rest(Vec3::Y), 1.0));
/// system.tick(1.0 / 60.0)?;
/// ```
#[derive(Debug)]
pub struct ParticleSystem {
    store: ComponentStore,
    allocator: ParticleAllocator,
    composer: ForceComposer,
    sampler: Option<SpawnSampler>,
    seed: u64,
    pending_despawn: Vec<ParticleId>,
    bodies: HashMap<BodyHandle, ParticleHandle>,
    elapsed: f32,
    lifetime: Option<f32>,
}

impl ParticleSystem {
    /// Creates an empty system.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: SystemConfig) -> SimResult<Self> {
        config.validate()?;
        Ok(Self {
            store: ComponentStore::with_capacity(config.capacity_hint),
            allocator: ParticleAllocator::new(),
            composer: ForceComposer::new(config.integrator, config.damping),
            sampler: None,
            seed: config.seed,
            pending_despawn: Vec::new(),
            bodies: HashMap::new(),
            elapsed: 0.0,
            lifetime: config.lifetime,
        })
    }

    /// Sets the volume used by [`spawn_random`](Self::spawn_random).
    ///
    /// # Errors
    ///
    /// Fails if the volume or distribution is invalid.
    pub fn set_spawn_volume(&mut self, volume: SpawnVolume, distribution: Distribution) -> SimResult<()> {
        self.sampler = Some(SpawnSampler::new(volume, distribution, self.seed)?);
        Ok(())
    }

    /// Appends a force generator.
    pub fn add_generator(&mut self, generator: impl ForceGenerator + 'static) -> &mut Self {
        self.composer.add_generator(generator);
        self
    }

    /// The composer, for integrator and generator changes.
    #[must_use]
    pub fn composer(&self) -> &ForceComposer {
        &self.composer
    }

    /// Mutable composer.
    pub fn composer_mut(&mut self) -> &mut ForceComposer {
        &mut self.composer
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    /// Direct store access; do not release ids through it.
    pub fn store_mut(&mut self) -> &mut ComponentStore {
        &mut self.store
    }

    // ========================================================================
    // Spawning
    // ========================================================================

    /// Allocates a particle and stores `value` on it.
    pub fn spawn<C: Composite>(&mut self, value: C) -> ParticleId {
        let id = self.allocator.allocate(&mut self.store);
        self.store.set_from(id, value);
        id
    }

    /// Allocates a particle with no attributes besides its metadata.
    pub fn spawn_empty(&mut self) -> ParticleId {
        self.allocator.allocate(&mut self.store)
    }

    /// Spawns at a sampled position; `build` turns the sample into the
    /// particle's value.
    ///
    /// # Errors
    ///
    /// [`SimError::NoSpawnVolume`] if no volume was set.
    pub fn spawn_random<C, F>(&mut self, build: F) -> SimResult<ParticleId>
    where
        C: Composite,
        F: FnOnce(SpawnSample) -> C,
    {
        let sample = self.sampler.as_mut().ok_or(SimError::NoSpawnVolume)?.sample();
        Ok(self.spawn(build(sample)))
    }

    /// Like [`spawn_random`](Self::spawn_random) restricted to a slice of
    /// the volume's axis.
    ///
    /// # Errors
    ///
    /// [`SimError::NoSpawnVolume`] or [`SimError::InvalidSlice`].
    pub fn spawn_random_slice<C, F>(&mut self, begin: f32, end: f32, build: F) -> SimResult<ParticleId>
    where
        C: Composite,
        F: FnOnce(SpawnSample) -> C,
    {
        let sample = self
            .sampler
            .as_mut()
            .ok_or(SimError::NoSpawnVolume)?
            .sample_slice(begin, end)?;
        Ok(self.spawn(build(sample)))
    }

    /// Spawns a proxy for an engine-owned body, seeded with `state`.
    ///
    /// The body's state is refreshed from the engine at every tick.
    pub fn spawn_rigid_body(&mut self, body: BodyHandle, state: BodyState) -> ParticleId {
        let id = self.allocator.allocate(&mut self.store);
        self.store.set(id, RigidBodyProxy { body });
        self.store.set(id, Position(state.position));
        self.store.set(id, Velocity(state.linear_velocity));
        self.store.set(id, InverseMass(state.inverse_mass));
        self.bodies.insert(body, self.allocator.handle(id));
        id
    }

    /// Stores `value` on a template particle that is never simulated.
    pub fn spawn_prefab<C: Composite>(&mut self, value: C) -> ParticleId {
        let id = self.allocator.allocate_with(
            &mut self.store,
            ParticleMeta {
                alive: true,
                prefab: true,
            },
        );
        self.store.set_from(id, value);
        id
    }

    /// Spawns a live copy of every attribute of `prefab`.
    ///
    /// A [`RigidBodyProxy`] is not copied: one engine body maps to one
    /// particle, registered through
    /// [`spawn_rigid_body`](Self::spawn_rigid_body).
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownParticle`] if `prefab` is not alive.
    pub fn instantiate(&mut self, prefab: ParticleId) -> SimResult<ParticleId> {
        self.ensure_alive(prefab)?;
        let id = self.allocator.allocate(&mut self.store);
        self.store.copy_replacing(id, prefab);
        self.store.set(id, ParticleMeta::ALIVE);
        if self.store.remove::<RigidBodyProxy>(id).is_some() {
            debug!(prefab = prefab.raw(), particle = id.raw(), "proxy not copied from prefab");
        }
        Ok(id)
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Removes `id` and every attribute it carries, now. Dynamic springs
    /// other particles hold to `id` are removed with it.
    ///
    /// Must not be called from inside a query callback; use
    /// [`queue_despawn`](Self::queue_despawn) there.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownParticle`] if `id` is not alive.
    pub fn despawn(&mut self, id: ParticleId) -> SimResult<()> {
        self.ensure_alive(id)?;
        if let Some(proxy) = self.store.try_get::<RigidBodyProxy>(id) {
            if self.bodies.get(&proxy.body).is_some_and(|handle| handle.id == id) {
                self.bodies.remove(&proxy.body);
            }
        }
        let dropped = DynamicSpringGenerator::forget_partner(&mut self.store, id);
        if dropped > 0 {
            trace!(particle = id.raw(), dropped, "dropped springs to despawned particle");
        }
        if self.allocator.release(&mut self.store, id) {
            Ok(())
        } else {
            Err(SimError::UnknownParticle(id))
        }
    }

    /// Schedules `id` for removal at the end of the next tick.
    pub fn queue_despawn(&mut self, id: ParticleId) {
        self.pending_despawn.push(id);
    }

    /// Number of queued removals.
    #[must_use]
    pub fn pending_despawns(&self) -> usize {
        self.pending_despawn.len()
    }

    /// Applies queued removals; ids already gone are ignored.
    ///
    /// Returns how many particles were removed.
    pub fn flush_despawns(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_despawn);
        let removed = pending.into_iter().filter(|&id| self.despawn(id).is_ok()).count();
        if removed > 0 {
            trace!(removed, "flushed despawns");
        }
        removed
    }

    /// Queues every non-prefab particle whose position lies outside `bounds`.
    ///
    /// Returns how many were queued.
    pub fn despawn_outside(&mut self, bounds: &Aabb) -> usize {
        let mut outside = Vec::new();
        self.store.query::<(&ParticleMeta, &Position), _>(|id, (meta, position)| {
            if !meta.prefab && !bounds.contains(position.0) {
                outside.push(id);
            }
        });
        let queued = outside.len();
        self.pending_despawn.extend(outside);
        queued
    }

    // ========================================================================
    // Attribute access
    // ========================================================================

    /// Attaches (or overwrites) an attribute on a live particle.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownParticle`] if `id` is not alive.
    pub fn attach<T: Attribute>(&mut self, id: ParticleId, value: T) -> SimResult<()> {
        self.ensure_alive(id)?;
        self.store.set(id, value);
        Ok(())
    }

    /// Removes an attribute, returning it.
    pub fn detach<T: Attribute>(&mut self, id: ParticleId) -> Option<T> {
        self.store.remove(id)
    }

    /// The attribute, if present.
    #[must_use]
    pub fn get<T: Attribute>(&self, id: ParticleId) -> Option<&T> {
        self.store.try_get(id)
    }

    /// Mutable attribute, if present.
    pub fn get_mut<T: Attribute>(&mut self, id: ParticleId) -> Option<&mut T> {
        self.store.try_get_mut(id)
    }

    /// True if `id` carries `T`.
    #[must_use]
    pub fn has<T: Attribute>(&self, id: ParticleId) -> bool {
        self.store.has::<T>(id)
    }

    /// Rebuilds a composite from `id`, if every field is present.
    #[must_use]
    pub fn get_as<C: Composite>(&self, id: ParticleId) -> Option<C> {
        self.store.try_get_as(id)
    }

    /// Runs a store query. See [`ComponentStore::query`].
    pub fn query<'s, Q, F>(&'s mut self, f: F) -> usize
    where
        Q: Query<'s>,
        F: FnMut(ParticleId, Q::Item),
    {
        self.store.query::<Q, F>(f)
    }

    // ========================================================================
    // Springs
    // ========================================================================

    /// Anchors `id` to a fixed point; rest length is the current distance.
    ///
    /// # Errors
    ///
    /// [`SimError::AnchorCapacity`] when full, or the errors of
    /// [`StaticSpringGenerator::add_anchor`].
    pub fn anchor_to_point(&mut self, id: ParticleId, point: Vec3) -> SimResult<usize> {
        self.ensure_alive(id)?;
        StaticSpringGenerator::add_anchor(&mut self.store, id, point)?
            .ok_or(SimError::AnchorCapacity { max: MAX_ANCHORS })
    }

    /// Anchors `id` to `other`; rest length is their current distance.
    ///
    /// # Errors
    ///
    /// [`SimError::AnchorCapacity`] when full, [`SimError::UnknownParticle`]
    /// if either particle is dead.
    pub fn anchor_to_particle(&mut self, id: ParticleId, other: ParticleId) -> SimResult<usize> {
        self.ensure_alive(id)?;
        self.ensure_alive(other)?;
        DynamicSpringGenerator::add_anchor(&mut self.store, id, other)?
            .ok_or(SimError::AnchorCapacity { max: MAX_ANCHORS })
    }

    // ========================================================================
    // Handles
    // ========================================================================

    /// Generation-counted handle for a live particle.
    #[must_use]
    pub fn handle(&self, id: ParticleId) -> ParticleHandle {
        self.allocator.handle(id)
    }

    /// The particle behind `handle`, or `None` once it was despawned.
    #[must_use]
    pub fn resolve(&self, handle: ParticleHandle) -> Option<ParticleId> {
        self.allocator.resolve(&self.store, handle)
    }

    /// Like [`resolve`](Self::resolve) as a result.
    ///
    /// # Errors
    ///
    /// [`SimError::StaleHandle`] once the particle was despawned.
    pub fn try_resolve(&self, handle: ParticleHandle) -> SimResult<ParticleId> {
        self.resolve(handle).ok_or(SimError::StaleHandle)
    }

    /// The live proxy for `body`, if any.
    #[must_use]
    pub fn particle_for_body(&self, body: BodyHandle) -> Option<ParticleId> {
        self.bodies.get(&body).and_then(|&handle| self.resolve(handle))
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Advances by `dt` seconds with no rigid-body engine.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidTimestep`]; nothing is modified in that case.
    pub fn tick(&mut self, dt: f32) -> SimResult<TickStats> {
        self.tick_with(dt, &mut NoRigidBodies)
    }

    /// Advances by `dt` seconds, exchanging state with `engine`.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidTimestep`]; nothing is modified in that case.
    pub fn tick_with(&mut self, dt: f32, engine: &mut dyn RigidBodyEngine) -> SimResult<TickStats> {
        let step = self.composer.step(&mut self.store, dt, engine)?;
        self.elapsed += dt;
        let despawned = self.flush_despawns();
        let stats = TickStats {
            step,
            despawned,
            alive: self.alive_count(),
            elapsed: self.elapsed,
        };
        debug!(
            alive = stats.alive,
            despawned,
            elapsed = self.elapsed,
            "tick"
        );
        Ok(stats)
    }

    /// Live particles, prefabs included.
    #[inline]
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// True if `id` is alive.
    #[must_use]
    pub fn is_alive(&self, id: ParticleId) -> bool {
        ParticleAllocator::is_alive(&self.store, id)
    }

    /// Simulated seconds so far.
    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// False once the configured lifetime has elapsed. Always true without
    /// a lifetime.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lifetime.map_or(true, |lifetime| self.elapsed < lifetime)
    }

    fn ensure_alive(&self, id: ParticleId) -> SimResult<()> {
        if self.is_alive(id) {
            Ok(())
        } else {
            Err(SimError::UnknownParticle(id))
        }
    }
}
