//! # SIZZLE Shared
//!
//! Math types and physical constants used by the particle core and by
//! the host application.
//!
//! ## RULE
//!
//! This crate holds data only. Storage, forces and integration live in
//! `sizzle_core`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod math;

pub use constants::{
    DEFAULT_DAMPING, EARTH_MASS, EARTH_RADIUS, GRAVITATIONAL_CONSTANT, MIN_DISTANCE_SQUARED,
    STANDARD_GRAVITY,
};
pub use math::{Aabb, Vec3};
