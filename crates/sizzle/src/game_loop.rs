//! # Simulation Loop
//!
//! ```text
//! Frame N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. CONTACTS                                                         │
//! │    └─ Drain engine contacts into JustHit markers                    │
//! │                                                                     │
//! │ 2. BOUNDS                                                           │
//! │    └─ Queue particles outside the scene box for removal             │
//! │                                                                     │
//! │ 3. TICKS (fixed timestep, 0..=MAX_SUBSTEPS per frame)               │
//! │    ├─ Zero accumulators, run generators                             │
//! │    ├─ Integrate point masses, forward forces to the engine          │
//! │    └─ Flush queued removals                                         │
//! │                                                                     │
//! │ 4. END FRAME                                                        │
//! │    └─ Record frame statistics                                       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::{Duration, Instant};

use sizzle_core::{ParticleSystem, RigidBodyEngine, SimError, SimResult, TickStats};
use sizzle_shared::Aabb;
use tracing::{debug, warn};

use crate::config::SceneConfig;
use crate::events::{ContactChannel, DEFAULT_CONTACT_CAPACITY};

/// Target frame time for 60 FPS.
pub const TARGET_FRAME_TIME: Duration = Duration::from_micros(16_666);

/// Longest frame delta accepted; longer pauses are clamped.
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// Upper bound on ticks run for one frame.
pub const MAX_SUBSTEPS: u32 = 8;

/// Loop settings.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopConfig {
    /// Seconds per tick.
    pub timestep: f32,
    /// Particles leaving this box are despawned.
    pub bounds: Option<Aabb>,
    /// Contact channel capacity.
    pub contact_capacity: usize,
    /// Warn about frames over budget.
    pub enable_timing_logs: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            bounds: None,
            contact_capacity: DEFAULT_CONTACT_CAPACITY,
            enable_timing_logs: false,
        }
    }
}

impl From<&SceneConfig> for LoopConfig {
    fn from(scene: &SceneConfig) -> Self {
        Self {
            timestep: scene.simulation.timestep,
            bounds: scene.simulation.bounds,
            ..Self::default()
        }
    }
}

/// Frame timing and counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Total frame time in microseconds.
    pub total_us: u64,
    /// Time spent in ticks in microseconds.
    pub tick_us: u64,
    /// Time spent draining contacts in microseconds.
    pub contacts_us: u64,
    /// Frame number.
    pub frame: u64,
    /// Ticks run this frame.
    pub ticks: u32,
    /// Live particles at frame end.
    pub particles: usize,
    /// Particles removed this frame.
    pub despawned: usize,
    /// Contacts turned into markers.
    pub contacts_applied: usize,
    /// Generator contributions dropped as non-finite.
    pub suppressed: usize,
}

/// Owns a particle system and drives it frame by frame.
#[derive(Debug)]
pub struct SimulationLoop {
    system: ParticleSystem,
    contacts: ContactChannel,
    config: LoopConfig,
    frame_count: u64,
    /// Simulated time not yet consumed by a tick.
    accumulator: f32,
    stats_accumulator: FrameStatsAccumulator,
}

impl SimulationLoop {
    /// Wraps `system`.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidTimestep`] if `config.timestep` is unusable.
    pub fn new(system: ParticleSystem, config: LoopConfig) -> SimResult<Self> {
        sizzle_core::error::validate_timestep(config.timestep)?;
        if config.contact_capacity == 0 {
            return Err(SimError::InvalidConfig(
                "contact capacity must be > 0".to_string(),
            ));
        }
        Ok(Self {
            contacts: ContactChannel::new(config.contact_capacity),
            system,
            config,
            frame_count: 0,
            accumulator: 0.0,
            stats_accumulator: FrameStatsAccumulator::new(),
        })
    }

    /// Builds the system described by `scene` and wraps it.
    ///
    /// # Errors
    ///
    /// Errors of [`SceneConfig::build_system`].
    pub fn from_scene(scene: &SceneConfig) -> SimResult<Self> {
        Self::new(scene.build_system()?, LoopConfig::from(scene))
    }

    /// Runs one frame covering `delta` seconds of wall time.
    ///
    /// Whole timesteps are simulated; the remainder carries over to the
    /// next frame.
    ///
    /// # Errors
    ///
    /// Propagates tick errors.
    pub fn run_frame(&mut self, delta: f32, engine: &mut dyn RigidBodyEngine) -> SimResult<FrameStats> {
        let frame_start = Instant::now();
        let delta = if delta.is_finite() { delta.clamp(0.0, MAX_FRAME_DELTA) } else { 0.0 };
        self.accumulator += delta;

        let contacts_start = Instant::now();
        let drained = self.contacts.drain_into(&mut self.system);
        let contacts_us = elapsed_us(contacts_start);

        if let Some(bounds) = &self.config.bounds {
            self.system.despawn_outside(bounds);
        }

        let tick_start = Instant::now();
        let mut ticks = 0;
        let mut despawned = 0;
        let mut suppressed = 0;
        while self.accumulator >= self.config.timestep && ticks < MAX_SUBSTEPS {
            let stats = self.system.tick_with(self.config.timestep, engine)?;
            self.accumulator -= self.config.timestep;
            despawned += stats.despawned;
            suppressed += stats.step.forces.suppressed;
            ticks += 1;
        }
        if ticks == MAX_SUBSTEPS && self.accumulator >= self.config.timestep {
            debug!(dropped = self.accumulator, "frame behind, dropping simulated time");
            self.accumulator = 0.0;
        }

        let stats = FrameStats {
            total_us: elapsed_us(frame_start),
            tick_us: elapsed_us(tick_start),
            contacts_us,
            frame: self.frame_count,
            ticks,
            particles: self.system.alive_count(),
            despawned,
            contacts_applied: drained.applied,
            suppressed,
        };
        self.end_frame(stats);
        Ok(stats)
    }

    /// Runs exactly one tick of the configured timestep, ignoring wall time.
    ///
    /// # Errors
    ///
    /// Propagates tick errors.
    pub fn step_once(&mut self, engine: &mut dyn RigidBodyEngine) -> SimResult<TickStats> {
        self.contacts.drain_into(&mut self.system);
        if let Some(bounds) = &self.config.bounds {
            self.system.despawn_outside(bounds);
        }
        let stats = self.system.tick_with(self.config.timestep, engine)?;
        self.frame_count += 1;
        Ok(stats)
    }

    fn end_frame(&mut self, stats: FrameStats) {
        self.frame_count += 1;
        self.stats_accumulator.record(stats);
        if self.config.enable_timing_logs && stats.total_us > TARGET_FRAME_TIME.as_micros() as u64 {
            warn!(
                frame = stats.frame,
                total_ms = stats.total_us as f64 / 1000.0,
                "frame exceeded budget"
            );
        }
    }

    /// Frames run so far.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// The simulated system.
    #[must_use]
    pub fn system(&self) -> &ParticleSystem {
        &self.system
    }

    /// Mutable system, for spawning between frames.
    pub fn system_mut(&mut self) -> &mut ParticleSystem {
        &mut self.system
    }

    /// Contact channel; hand [`ContactChannel::sender`] to the engine.
    #[must_use]
    pub fn contacts(&self) -> &ContactChannel {
        &self.contacts
    }

    /// Accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats_accumulator
    }
}

fn elapsed_us(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Ticks across all frames.
    pub ticks: u64,
    /// Sum of total frame times.
    pub total_us_sum: u64,
    /// Sum of tick times.
    pub tick_us_sum: u64,
    /// Min frame time.
    pub min_frame_us: u64,
    /// Max frame time.
    pub max_frame_us: u64,
    /// Frames that exceeded budget.
    pub frames_over_budget: u64,
    /// Particles removed.
    pub despawned: u64,
    /// Contributions suppressed.
    pub suppressed: u64,
    /// Highest live particle count seen.
    pub peak_particles: usize,
}

impl FrameStatsAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames_recorded: 0,
            ticks: 0,
            total_us_sum: 0,
            tick_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            despawned: 0,
            suppressed: 0,
            peak_particles: 0,
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.ticks += u64::from(stats.ticks);
        self.total_us_sum += stats.total_us;
        self.tick_us_sum += stats.tick_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        self.despawned += stats.despawned as u64;
        self.suppressed += stats.suppressed as u64;
        self.peak_particles = self.peak_particles.max(stats.particles);

        if stats.total_us > TARGET_FRAME_TIME.as_micros() as u64 {
            self.frames_over_budget += 1;
        }
    }

    /// Average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Average tick time in milliseconds.
    #[must_use]
    pub fn avg_tick_ms(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        (self.tick_us_sum as f64 / self.ticks as f64) / 1000.0
    }

    /// Fraction of frames over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Prints a summary of the statistics.
    pub fn print_summary(&self) {
        println!("┌─ FRAMES ─────────────────────────────────────────────────────────┐");
        println!("│ Frames Recorded:    {}", self.frames_recorded);
        println!("│ Ticks:              {}", self.ticks);
        println!("│ Average Frame:      {:.3} ms", self.avg_frame_ms());
        println!("│ Average Tick:       {:.3} ms", self.avg_tick_ms());
        if self.frames_recorded > 0 {
            println!("│ Min Frame:          {:.3} ms", self.min_frame_us as f64 / 1000.0);
            println!("│ Max Frame:          {:.3} ms", self.max_frame_us as f64 / 1000.0);
        }
        println!(
            "│ Over Budget:        {} frames ({:.1}%)",
            self.frames_over_budget,
            self.over_budget_ratio() * 100.0
        );
        println!("└──────────────────────────────────────────────────────────────────┘");
        println!("┌─ PARTICLES ──────────────────────────────────────────────────────┐");
        println!("│ Peak Alive:         {}", self.peak_particles);
        println!("│ Despawned:          {}", self.despawned);
        println!("│ Suppressed:         {}", self.suppressed);
        println!("└──────────────────────────────────────────────────────────────────┘");
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ContactEvent;
    use sizzle_core::{
        BodyHandle, BodyState, MassParticle, NoRigidBodies, PointParticle, SystemConfig,
    };
    use sizzle_shared::Vec3;

    fn empty_loop(config: LoopConfig) -> SimulationLoop {
        let system = ParticleSystem::new(SystemConfig::default()).unwrap();
        SimulationLoop::new(system, config).unwrap()
    }

    #[test]
    fn test_fixed_timestep_carries_remainder() {
        let mut sim = empty_loop(LoopConfig {
            timestep: 0.25,
            ..LoopConfig::default()
        });
        let stats = sim.run_frame(0.1, &mut NoRigidBodies).unwrap();
        assert_eq!(stats.ticks, 0);
        let stats = sim.run_frame(0.1, &mut NoRigidBodies).unwrap();
        assert_eq!(stats.ticks, 0);
        let stats = sim.run_frame(0.1, &mut NoRigidBodies).unwrap();
        assert_eq!(stats.ticks, 1);
        assert_eq!(sim.frame_count(), 3);
        assert!((sim.system().elapsed() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_long_pause_is_clamped() {
        let mut sim = empty_loop(LoopConfig {
            timestep: 0.031_25,
            ..LoopConfig::default()
        });
        let stats = sim.run_frame(5.0, &mut NoRigidBodies).unwrap();
        assert_eq!(stats.ticks, 3);
        let stats = sim.run_frame(f32::NAN, &mut NoRigidBodies).unwrap();
        assert_eq!(stats.ticks, 0);
    }

    #[test]
    fn test_bounds_despawn_through_frames() {
        let mut sim = empty_loop(LoopConfig {
            timestep: 0.05,
            bounds: Some(Aabb::from_center(Vec3::ZERO, Vec3::splat(1.0))),
            ..LoopConfig::default()
        });
        sim.system_mut()
            .spawn(MassParticle::new(PointParticle::at_rest(Vec3::ZERO), 1.0));
        sim.system_mut()
            .spawn(MassParticle::new(PointParticle::at_rest(Vec3::splat(3.0)), 1.0));
        let stats = sim.run_frame(0.05, &mut NoRigidBodies).unwrap();
        assert_eq!(stats.despawned, 1);
        assert_eq!(stats.particles, 1);
        assert_eq!(sim.stats().despawned, 1);
    }

    #[test]
    fn test_contacts_reach_particles() {
        let mut sim = empty_loop(LoopConfig::default());
        let body = BodyHandle(5);
        let id = sim.system_mut().spawn_rigid_body(body, BodyState::default());
        let sender = sim.contacts().sender();
        sender.try_post(ContactEvent {
            body,
            other: None,
            point: Vec3::Y,
            impulse: 1.0,
        });
        let stats = sim.run_frame(0.0, &mut NoRigidBodies).unwrap();
        assert_eq!(stats.contacts_applied, 1);
        assert!(sim.system().has::<crate::events::JustHit>(id));
    }

    #[test]
    fn test_invalid_loop_config() {
        let system = ParticleSystem::new(SystemConfig::default()).unwrap();
        let config = LoopConfig {
            timestep: 0.0,
            ..LoopConfig::default()
        };
        assert!(SimulationLoop::new(system, config).is_err());
    }

    #[test]
    fn test_stats_accumulator() {
        let mut acc = FrameStatsAccumulator::new();
        for i in 0..100 {
            acc.record(FrameStats {
                total_us: 10_000 + i * 100,
                tick_us: 5_000,
                ticks: 1,
                frame: i,
                particles: usize::try_from(i).unwrap(),
                ..FrameStats::default()
            });
        }
        assert_eq!(acc.frames_recorded, 100);
        assert_eq!(acc.ticks, 100);
        assert_eq!(acc.peak_particles, 99);
        assert!((acc.avg_tick_ms() - 5.0).abs() < 1e-9);
        assert!(acc.avg_frame_ms() > 10.0);
    }
}
