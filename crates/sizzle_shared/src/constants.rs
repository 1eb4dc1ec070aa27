//! Physical constants and solver defaults.
//!
//! SI units throughout: metres, kilograms, seconds.

/// Per-second velocity retention applied by every integrator.
///
/// A tick of length `dt` scales velocity by `DEFAULT_DAMPING.powf(dt)`.
pub const DEFAULT_DAMPING: f32 = 0.9875;

/// Newtonian gravitational constant (m^3 kg^-1 s^-2).
pub const GRAVITATIONAL_CONSTANT: f32 = 6.6743e-11;

/// Mass of the Earth (kg).
pub const EARTH_MASS: f32 = 5.972e24;

/// Mean radius of the Earth (m).
pub const EARTH_RADIUS: f32 = 6_371_000.0;

/// Surface gravity used by the flat-world presets (m/s^2).
pub const STANDARD_GRAVITY: f32 = 9.81;

/// Squared distance under which inverse-square forces are skipped.
pub const MIN_DISTANCE_SQUARED: f32 = 1e-3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_earth_surface_gravity_matches_standard() {
        let g = GRAVITATIONAL_CONSTANT * EARTH_MASS / (EARTH_RADIUS * EARTH_RADIUS);
        assert!((g - STANDARD_GRAVITY).abs() < 0.05, "g = {g}");
    }
}
