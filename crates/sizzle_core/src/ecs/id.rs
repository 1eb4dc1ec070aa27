//! # Particle Identifiers
//!
//! A particle is only an index into attribute columns. Ids are dense and
//! reused after release; a [`ParticleHandle`] adds a generation counter so
//! code that outlives a tick can detect reuse.

use std::fmt;

/// Dense particle index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ParticleId(u32);

impl ParticleId {
    /// Creates an id from a raw index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw index.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Index into column storage.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Id for a column slot.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in `u32`.
    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).expect("particle index exceeds u32::MAX"))
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Generation-counted particle reference.
///
/// Safe to keep in maps keyed by external objects: once the particle is
/// released its slot generation moves on and the handle stops resolving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParticleHandle {
    /// Slot index.
    pub id: ParticleId,
    /// Slot generation at the time the handle was issued.
    pub generation: u32,
}

impl ParticleHandle {
    /// Creates a new handle.
    #[inline]
    #[must_use]
    pub const fn new(id: ParticleId, generation: u32) -> Self {
        Self { id, generation }
    }
}
