//! # Simulation Error Types
//!
//! Recoverable failures of the particle runtime. Contract violations such
//! as reading an absent attribute are panics, not errors.

use crate::ecs::ParticleId;
use thiserror::Error;

/// Errors that can occur while building or stepping a particle system.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Timestep was zero, negative or not finite.
    #[error("invalid timestep: {0} (must be finite and > 0)")]
    InvalidTimestep(f32),

    /// A spawn volume had degenerate or non-finite parameters.
    #[error("invalid spawn volume: {0}")]
    InvalidVolume(&'static str),

    /// Requested sub-slice of a spawn volume is outside `0 <= begin <= end <= 1`.
    #[error("invalid spawn slice: begin {begin}, end {end}")]
    InvalidSlice {
        /// Start fraction along the primary axis.
        begin: f32,
        /// End fraction along the primary axis.
        end: f32,
    },

    /// Random spawn requested on a system without a sampler.
    #[error("particle system has no spawn volume")]
    NoSpawnVolume,

    /// Particle id is not currently alive.
    #[error("unknown particle: {0}")]
    UnknownParticle(ParticleId),

    /// Handle refers to a particle that has since been despawned.
    #[error("stale particle handle")]
    StaleHandle,

    /// Particle is missing an attribute the operation needs.
    #[error("particle {particle} has no {attribute} attribute")]
    MissingAttribute {
        /// The particle.
        particle: ParticleId,
        /// Type name of the missing attribute.
        attribute: &'static str,
    },

    /// Anchor list is full.
    #[error("anchor capacity exceeded: max {max}")]
    AnchorCapacity {
        /// Fixed capacity of the anchor list.
        max: usize,
    },

    /// Invalid configuration (scene file or parameter struct).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;

/// Rejects timesteps that are zero, negative or non-finite.
///
/// # Errors
///
/// Returns [`SimError::InvalidTimestep`] for such values.
pub fn validate_timestep(dt: f32) -> SimResult<f32> {
    if dt.is_finite() && dt > 0.0 {
        Ok(dt)
    } else {
        Err(SimError::InvalidTimestep(dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestep_validation() {
        assert_eq!(validate_timestep(0.016), Ok(0.016));
        assert!(validate_timestep(0.0).is_err());
        assert!(validate_timestep(-1.0).is_err());
        assert!(validate_timestep(f32::NAN).is_err());
        assert!(validate_timestep(f32::INFINITY).is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = SimError::MissingAttribute {
            particle: ParticleId::new(7),
            attribute: "Position",
        };
        assert_eq!(err.to_string(), "particle #7 has no Position attribute");
    }
}
