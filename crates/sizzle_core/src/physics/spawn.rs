//! # Spawn Sampling
//!
//! Draws spawn positions inside a volume together with an "outwards"
//! vector from the volume's reference point, which callers turn into an
//! initial velocity.
//!
//! Uniform sampling is uniform by volume: the radial coordinate uses
//! `sqrt` on disks and `cbrt` in balls, and the cone's axial coordinate is
//! weighted by cross-section area. Normal sampling replaces the radial
//! draw with `|N(0, σ)|` in units of the volume's radius, so samples
//! cluster toward the axis or center and are not clamped to the volume.
//!
//! | Volume | Reference point | Slice axis |
//! |---|---|---|
//! | Box | center | none |
//! | Ellipsoid | center | none |
//! | Cylinder | base | base → top |
//! | Cone | vertex | base → vertex |

use std::f32::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sizzle_shared::Vec3;

use crate::error::{SimError, SimResult};

/// Region particles are spawned in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum SpawnVolume {
    /// Axis-aligned box.
    Box {
        /// Center.
        center: Vec3,
        /// Half size along each axis.
        half_extents: Vec3,
    },
    /// Axis-aligned ellipsoid.
    Ellipsoid {
        /// Center.
        center: Vec3,
        /// Radius along each axis.
        radii: Vec3,
    },
    /// Elliptic cylinder between two cap centers.
    Cylinder {
        /// Center of the bottom cap.
        base: Vec3,
        /// Center of the top cap.
        top: Vec3,
        /// Radius along the first tangent.
        radius_x: f32,
        /// Radius along the second tangent.
        radius_z: f32,
    },
    /// Elliptic cone from a base disk to a vertex.
    Cone {
        /// Center of the base disk.
        base: Vec3,
        /// Apex.
        vertex: Vec3,
        /// Base radius along the first tangent.
        radius_x: f32,
        /// Base radius along the second tangent.
        radius_z: f32,
    },
}

impl SpawnVolume {
    /// Checks that every parameter is finite and non-degenerate.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidVolume`] naming the offending parameter.
    pub fn validate(&self) -> SimResult<()> {
        fn non_negative(v: Vec3) -> bool {
            v.is_finite() && v.x >= 0.0 && v.y >= 0.0 && v.z >= 0.0
        }
        fn radius(r: f32) -> bool {
            r.is_finite() && r >= 0.0
        }

        match *self {
            Self::Box {
                center,
                half_extents,
            } => {
                if !center.is_finite() {
                    return Err(SimError::InvalidVolume("box center is not finite"));
                }
                if !non_negative(half_extents) {
                    return Err(SimError::InvalidVolume("box half extents must be finite and >= 0"));
                }
            }
            Self::Ellipsoid { center, radii } => {
                if !center.is_finite() {
                    return Err(SimError::InvalidVolume("ellipsoid center is not finite"));
                }
                if !non_negative(radii) {
                    return Err(SimError::InvalidVolume("ellipsoid radii must be finite and >= 0"));
                }
            }
            Self::Cylinder {
                base: start,
                top: end,
                radius_x,
                radius_z,
            }
            | Self::Cone {
                base: start,
                vertex: end,
                radius_x,
                radius_z,
            } => {
                if !start.is_finite() || !end.is_finite() {
                    return Err(SimError::InvalidVolume("axis end points are not finite"));
                }
                if (end - start).normalized() == Vec3::ZERO {
                    return Err(SimError::InvalidVolume("axis has zero length"));
                }
                if !radius(radius_x) || !radius(radius_z) {
                    return Err(SimError::InvalidVolume("radii must be finite and >= 0"));
                }
            }
        }
        Ok(())
    }

    /// Point the outwards vector is measured from.
    #[must_use]
    pub fn reference_point(&self) -> Vec3 {
        match *self {
            Self::Box { center, .. } | Self::Ellipsoid { center, .. } => center,
            Self::Cylinder { base, .. } => base,
            Self::Cone { vertex, .. } => vertex,
        }
    }
}

/// How samples spread within the volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    /// Uniform by volume.
    #[default]
    Uniform,
    /// Gaussian around the center or axis.
    Normal {
        /// Standard deviation relative to the volume's extent.
        standard_deviation: f32,
    },
}

/// A sampled spawn position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnSample {
    /// Where to spawn.
    pub position: Vec3,
    /// `position - reference_point`; not normalized.
    pub outwards: Vec3,
}

/// Seeded sampler over one volume.
#[derive(Clone, Debug)]
pub struct SpawnSampler {
    volume: SpawnVolume,
    distribution: Distribution,
    rng: ChaCha8Rng,
}

impl SpawnSampler {
    /// Creates a sampler; the same seed yields the same sample sequence.
    ///
    /// # Errors
    ///
    /// Fails if the volume is degenerate or the standard deviation is not
    /// finite and positive.
    pub fn new(volume: SpawnVolume, distribution: Distribution, seed: u64) -> SimResult<Self> {
        volume.validate()?;
        if let Distribution::Normal { standard_deviation } = distribution {
            if !(standard_deviation.is_finite() && standard_deviation > 0.0) {
                return Err(SimError::InvalidVolume(
                    "standard deviation must be finite and > 0",
                ));
            }
        }
        Ok(Self {
            volume,
            distribution,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Volume sampled from.
    #[must_use]
    pub fn volume(&self) -> &SpawnVolume {
        &self.volume
    }

    /// Distribution in use.
    #[must_use]
    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    /// Sample over the whole volume.
    pub fn sample(&mut self) -> SpawnSample {
        self.draw(0.0, 1.0)
    }

    /// Sample restricted to `begin..=end` along the cylinder or cone axis
    /// (fractions from the base). Boxes and ellipsoids ignore the slice.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidSlice`] unless `0 <= begin <= end <= 1`.
    pub fn sample_slice(&mut self, begin: f32, end: f32) -> SimResult<SpawnSample> {
        if !(0.0..=1.0).contains(&begin) || !(0.0..=1.0).contains(&end) || begin > end {
            return Err(SimError::InvalidSlice { begin, end });
        }
        Ok(self.draw(begin, end))
    }

    fn draw(&mut self, begin: f32, end: f32) -> SpawnSample {
        let position = match self.volume {
            SpawnVolume::Box {
                center,
                half_extents,
            } => center + self.box_offset().component_mul(half_extents),
            SpawnVolume::Ellipsoid { center, radii } => {
                let direction = self.unit_direction();
                let r = self.ball_radius();
                center + (direction * r).component_mul(radii)
            }
            SpawnVolume::Cylinder {
                base,
                top,
                radius_x,
                radius_z,
            } => {
                let disk = self.disk_offset(top - base, radius_x, radius_z);
                let t = self.uniform(begin, end);
                base.lerp(top, t) + disk
            }
            SpawnVolume::Cone {
                base,
                vertex,
                radius_x,
                radius_z,
            } => {
                let disk = self.disk_offset(vertex - base, radius_x, radius_z);
                // Cross-section shrinks as s = 1 - t; weight the axial draw by s^2.
                let lo = 1.0 - end;
                let hi = 1.0 - begin;
                let cubed = self.uniform(lo * lo * lo, hi * hi * hi);
                let s = cubed.cbrt();
                base.lerp(vertex, 1.0 - s) + disk * s
            }
        };
        SpawnSample {
            position,
            outwards: position - self.volume.reference_point(),
        }
    }

    /// Offset in `[-1, 1]^3` (uniform) or `N(0, σ)` per axis (normal).
    fn box_offset(&mut self) -> Vec3 {
        match self.distribution {
            Distribution::Uniform => Vec3::new(
                self.uniform(-1.0, 1.0),
                self.uniform(-1.0, 1.0),
                self.uniform(-1.0, 1.0),
            ),
            Distribution::Normal { standard_deviation } => Vec3::new(
                self.standard_normal(),
                self.standard_normal(),
                self.standard_normal(),
            ) * standard_deviation,
        }
    }

    /// Radius in a unit ball.
    fn ball_radius(&mut self) -> f32 {
        match self.distribution {
            Distribution::Uniform => self.rng.gen::<f32>().cbrt(),
            Distribution::Normal { standard_deviation } => {
                self.standard_normal().abs() * standard_deviation
            }
        }
    }

    /// Radius in a unit disk.
    fn disk_radius(&mut self) -> f32 {
        match self.distribution {
            Distribution::Uniform => self.rng.gen::<f32>().sqrt(),
            Distribution::Normal { standard_deviation } => {
                self.standard_normal().abs() * standard_deviation
            }
        }
    }

    /// Point on the elliptic disk orthogonal to `axis`.
    fn disk_offset(&mut self, axis: Vec3, radius_x: f32, radius_z: f32) -> Vec3 {
        let axis = axis.normalized();
        let tangent = axis.any_orthogonal();
        let bitangent = tangent.cross(axis).normalized();
        let theta = self.uniform(0.0, TAU);
        let r = self.disk_radius();
        tangent * (r * theta.cos() * radius_x) + bitangent * (r * theta.sin() * radius_z)
    }

    /// Direction uniform on the unit sphere.
    fn unit_direction(&mut self) -> Vec3 {
        let theta = self.uniform(0.0, TAU);
        let phi = self.uniform(-1.0, 1.0).clamp(-1.0, 1.0).acos();
        let (sin_theta, cos_theta) = theta.sin_cos();
        let (sin_phi, cos_phi) = phi.sin_cos();
        Vec3::new(sin_phi * cos_theta, sin_phi * sin_theta, cos_phi)
    }

    #[inline]
    fn uniform(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.rng.gen::<f32>()
    }

    /// Box–Muller; `1 - u` keeps the log argument in `(0, 1]`.
    fn standard_normal(&mut self) -> f32 {
        let u1 = 1.0 - self.rng.gen::<f32>();
        let u2 = self.rng.gen::<f32>();
        (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
    }
}
