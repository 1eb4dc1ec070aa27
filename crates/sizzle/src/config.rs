//! # Scene Configuration
//!
//! Scenes are TOML files read once at startup:
//!
//! ```toml
//! [system]
//! integrator = "midpoint"
//! seed = 7
//!
//! [simulation]
//! timestep = 0.016
//! ticks = 600
//!
//! [spawn]
//! count = 256
//! initial_speed = 4.0
//! mass = 0.05
//! volume = { shape = "cone", base = { x = 0.0, y = 1.0, z = 0.0 }, vertex = { x = 0.0, y = 0.0, z = 0.0 }, radius_x = 0.3, radius_z = 0.3 }
//!
//! [[generators]]
//! kind = "earth_gravity"
//! surface = { x = 0.0, y = 0.0, z = 0.0 }
//! up = { x = 0.0, y = 1.0, z = 0.0 }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sizzle_core::error::validate_timestep;
use sizzle_core::{
    BuoyancyGenerator, Distribution, DynamicSpringGenerator,
    ExplosionGenerator, GravityGenerator, MassParticle, ParticleSystem, PointParticle, Projectile,
    SimError, SpawnSample, SpawnVolume, StaticSpringGenerator, Submersion, SystemConfig,
    VortexGenerator, WindApplication, WindGenerator,
};
use sizzle_shared::{Aabb, Vec3};
use thiserror::Error;
use tracing::debug;

/// Failure to load a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    /// The file could not be read.
    #[error("cannot read scene {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The scene is malformed or describes an invalid system.
    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Fixed-step settings for the loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds per tick.
    pub timestep: f32,
    /// Ticks the headless runner performs.
    pub ticks: u32,
    /// Particles leaving this box are despawned.
    pub bounds: Option<Aabb>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            ticks: 600,
            bounds: None,
        }
    }
}

/// Initial particle emission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnConfig {
    /// Particles spawned at startup.
    pub count: usize,
    /// Volume sampled for start positions.
    pub volume: SpawnVolume,
    /// Distribution over the volume.
    #[serde(default)]
    pub distribution: Distribution,
    /// Speed along the sample's outward direction.
    #[serde(default)]
    pub initial_speed: f32,
    /// Particle mass (kg).
    pub mass: f32,
    /// Slow-motion factor; spawns projectiles with rescaled gravity when set.
    #[serde(default)]
    pub speed_factor: Option<f32>,
}

impl SpawnConfig {
    fn velocity_for(&self, sample: &SpawnSample) -> Vec3 {
        sample.outwards.normalized() * self.initial_speed
    }
}

/// One force generator of the scene, in run order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratorConfig {
    /// Point mass attraction.
    Gravity {
        /// Attracting point.
        source_position: Vec3,
        /// Attracting mass (kg).
        source_mass: f32,
        /// Overrides the gravitational constant.
        #[serde(default)]
        gravitational_constant: Option<f32>,
    },
    /// Surface-like pull from a distant Earth.
    EarthGravity {
        /// Point on the surface.
        surface: Vec3,
        /// Away from the Earth's center.
        up: Vec3,
    },
    /// Wind or drag inside a sphere.
    Wind {
        /// Sphere center.
        center: Vec3,
        /// Sphere radius.
        radius: f32,
        /// Air velocity.
        velocity: Vec3,
        /// Linear coefficient.
        #[serde(default = "one")]
        k1: f32,
        /// Quadratic coefficient.
        #[serde(default)]
        k2: f32,
        /// Force or torque.
        #[serde(default)]
        application: WindApplication,
    },
    /// Swirl around a column.
    Vortex {
        /// Column base.
        base: Vec3,
        /// Column axis.
        axis: Vec3,
        /// Column height.
        height: f32,
        /// Column radius.
        radius: f32,
        /// Strength.
        strength: f32,
    },
    /// Lift below a liquid surface.
    Buoyancy {
        /// Liquid bottom.
        base: Vec3,
        /// Bottom to surface.
        liquid_height: Vec3,
        /// Liquid density.
        density: f32,
        /// Volume or gravity term.
        factor: f32,
        /// Submersion model.
        #[serde(default)]
        submersion: Submersion,
    },
    /// Fading radial blast.
    Explosion {
        /// Blast origin.
        center: Vec3,
        /// Blast radius.
        radius: f32,
        /// Strength.
        strength: f32,
        /// Fade time constant (s).
        fade_time: f32,
    },
    /// Springs to fixed anchors.
    StaticSpring {
        /// Spring constant.
        stiffness: f32,
    },
    /// Springs between particles.
    DynamicSpring {
        /// Spring constant.
        stiffness: f32,
    },
}

fn one() -> f32 {
    1.0
}

impl GeneratorConfig {
    /// Adds the described generator to `system`.
    pub fn install(&self, system: &mut ParticleSystem) {
        match *self {
            Self::Gravity {
                source_position,
                source_mass,
                gravitational_constant,
            } => {
                let mut gravity = GravityGenerator::new(source_position, source_mass);
                if let Some(constant) = gravitational_constant {
                    gravity = gravity.with_constant(constant);
                }
                system.add_generator(gravity);
            }
            Self::EarthGravity { surface, up } => {
                system.add_generator(GravityGenerator::earth(surface, up));
            }
            Self::Wind {
                center,
                radius,
                velocity,
                k1,
                k2,
                application,
            } => {
                system.add_generator(
                    WindGenerator::new(center, radius, velocity)
                        .with_coefficients(k1, k2)
                        .with_application(application),
                );
            }
            Self::Vortex {
                base,
                axis,
                height,
                radius,
                strength,
            } => {
                system.add_generator(VortexGenerator::new(base, axis, height, radius, strength));
            }
            Self::Buoyancy {
                base,
                liquid_height,
                density,
                factor,
                submersion,
            } => {
                system.add_generator(
                    BuoyancyGenerator::new(base, liquid_height, density, factor)
                        .with_submersion(submersion),
                );
            }
            Self::Explosion {
                center,
                radius,
                strength,
                fade_time,
            } => {
                system.add_generator(ExplosionGenerator::new(center, radius, strength, fade_time));
            }
            Self::StaticSpring { stiffness } => {
                system.add_generator(StaticSpringGenerator::new(stiffness));
            }
            Self::DynamicSpring { stiffness } => {
                system.add_generator(DynamicSpringGenerator::new(stiffness));
            }
        }
    }
}

/// A complete scene.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// System construction parameters.
    #[serde(default)]
    pub system: SystemConfig,
    /// Loop settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Initial emission; none when absent.
    #[serde(default)]
    pub spawn: Option<SpawnConfig>,
    /// Generators in run order.
    #[serde(default)]
    pub generators: Vec<GeneratorConfig>,
}

impl SceneConfig {
    /// Parses and validates a scene.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidConfig`] on malformed TOML or out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, SimError> {
        let scene: Self =
            toml::from_str(source).map_err(|e| SimError::InvalidConfig(e.to_string()))?;
        scene.validate()?;
        Ok(scene)
    }

    /// Reads, parses and validates a scene file.
    ///
    /// # Errors
    ///
    /// [`SceneError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scene = Self::from_toml_str(&source)?;
        debug!(path = %path.display(), generators = scene.generators.len(), "scene loaded");
        Ok(scene)
    }

    /// Checks values serde cannot.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidConfig`] or [`SimError::InvalidVolume`].
    pub fn validate(&self) -> Result<(), SimError> {
        self.system.validate()?;
        validate_timestep(self.simulation.timestep)?;
        if let Some(spawn) = &self.spawn {
            spawn.volume.validate()?;
            if !(spawn.mass.is_finite() && spawn.mass > 0.0) {
                return Err(SimError::InvalidConfig(format!(
                    "spawn mass must be finite and > 0, got {}",
                    spawn.mass
                )));
            }
            if let Some(factor) = spawn.speed_factor {
                if !(factor.is_finite() && factor > 0.0) {
                    return Err(SimError::InvalidConfig(format!(
                        "speed factor must be finite and > 0, got {factor}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Builds the system: generators installed, initial particles spawned.
    ///
    /// # Errors
    ///
    /// Fails if the system config or spawn volume is invalid.
    pub fn build_system(&self) -> Result<ParticleSystem, SimError> {
        let mut system = ParticleSystem::new(self.system.clone())?;
        for generator in &self.generators {
            generator.install(&mut system);
        }
        if let Some(spawn) = &self.spawn {
            system.set_spawn_volume(spawn.volume, spawn.distribution)?;
            for _ in 0..spawn.count {
                match spawn.speed_factor {
                    Some(factor) => system.spawn_random(|sample| {
                        let velocity = spawn.velocity_for(&sample);
                        Projectile::new(spawn.mass, sample.position, velocity, factor)
                    })?,
                    None => system.spawn_random(|sample| {
                        let velocity = spawn.velocity_for(&sample);
                        MassParticle::new(PointParticle::new(sample.position, velocity), spawn.mass)
                    })?,
                };
            }
        }
        Ok(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sizzle_core::{GravityScale, Integrator};

    const SCENE: &str = r#"
[system]
integrator = "verlet"
seed = 3
damping = 1.0

[simulation]
timestep = 0.01
ticks = 20
bounds = { min = { x = -5.0, y = -5.0, z = -5.0 }, max = { x = 5.0, y = 5.0, z = 5.0 } }

[spawn]
count = 10
mass = 0.5
initial_speed = 2.0
volume = { shape = "box", center = { x = 0.0, y = 0.0, z = 0.0 }, half_extents = { x = 1.0, y = 1.0, z = 1.0 } }
distribution = { kind = "normal", standard_deviation = 0.3 }

[[generators]]
kind = "earth_gravity"
surface = { x = 0.0, y = 0.0, z = 0.0 }
up = { x = 0.0, y = 1.0, z = 0.0 }

[[generators]]
kind = "wind"
center = { x = 0.0, y = 0.0, z = 0.0 }
radius = 10.0
velocity = { x = 1.0, y = 0.0, z = 0.0 }
application = "torque"
"#;

    #[test]
    fn test_parse_scene() {
        let scene = SceneConfig::from_toml_str(SCENE).unwrap();
        assert_eq!(scene.system.integrator, Integrator::Verlet);
        assert_eq!(scene.system.seed, 3);
        assert_eq!(scene.simulation.ticks, 20);
        assert_eq!(scene.generators.len(), 2);
        assert!(matches!(
            scene.generators[1],
            GeneratorConfig::Wind {
                k1,
                application: WindApplication::Torque,
                ..
            } if k1 == 1.0
        ));
        let spawn = scene.spawn.as_ref().unwrap();
        assert_eq!(
            spawn.distribution,
            Distribution::Normal {
                standard_deviation: 0.3
            }
        );
    }

    #[test]
    fn test_build_spawns_and_installs() {
        let scene = SceneConfig::from_toml_str(SCENE).unwrap();
        let system = scene.build_system().unwrap();
        assert_eq!(system.alive_count(), 10);
        assert_eq!(system.composer().generator_names(), vec!["gravity", "wind"]);
    }

    #[test]
    fn test_speed_factor_spawns_projectiles() {
        let source = SCENE.replace("initial_speed = 2.0", "initial_speed = 2.0\nspeed_factor = 0.5");
        let scene = SceneConfig::from_toml_str(&source).unwrap();
        let mut system = scene.build_system().unwrap();
        let mut scales = Vec::new();
        system.query::<(&GravityScale,), _>(|_, (scale,)| scales.push(scale.0));
        assert_eq!(scales, vec![0.25; 10]);
    }

    #[test]
    fn test_invalid_scenes_rejected() {
        assert!(matches!(
            SceneConfig::from_toml_str("[simulation]\ntimestep = -1.0\n"),
            Err(SimError::InvalidTimestep(_))
        ));
        assert!(matches!(
            SceneConfig::from_toml_str("[[generators]]\nkind = \"antigravity\"\n"),
            Err(SimError::InvalidConfig(_))
        ));
        let bad_mass = SCENE.replace("mass = 0.5", "mass = 0.0");
        assert!(matches!(
            SceneConfig::from_toml_str(&bad_mass),
            Err(SimError::InvalidConfig(_))
        ));
        let bad_volume = SCENE.replace("half_extents = { x = 1.0", "half_extents = { x = -1.0");
        assert!(matches!(
            SceneConfig::from_toml_str(&bad_volume),
            Err(SimError::InvalidVolume(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SceneConfig::load("/nonexistent/scene.toml").unwrap_err();
        assert!(matches!(err, SceneError::Io { .. }));
    }

    #[test]
    fn test_empty_scene_uses_defaults() {
        let scene = SceneConfig::from_toml_str("").unwrap();
        assert_eq!(scene, SceneConfig::default());
        assert_eq!(scene.build_system().unwrap().alive_count(), 0);
    }
}
