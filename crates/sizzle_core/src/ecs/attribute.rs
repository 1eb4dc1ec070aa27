//! # Attributes
//!
//! Attributes are plain values attached to particles one column per type.
//! A particle carries any subset of them; absence is a normal, queryable
//! state.

use bytemuck::{Pod, Zeroable};
use sizzle_shared::Vec3;

/// Marker trait for values storable in a column.
///
/// The column is keyed by the attribute's `TypeId`, so every distinct
/// meaning needs its own type (hence the newtypes below rather than raw
/// `Vec3`).
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Debug)]
/// struct Doneness(f32);
///
/// impl Attribute for Doneness {}
/// ```
pub trait Attribute: Clone + 'static {}

macro_rules! vector_attribute {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
        #[repr(transparent)]
        pub struct $name(pub Vec3);

        impl Attribute for $name {}

        impl From<Vec3> for $name {
            #[inline]
            fn from(v: Vec3) -> Self {
                Self(v)
            }
        }
    };
}

vector_attribute!(
    /// World-space position (m).
    Position
);
vector_attribute!(
    /// Position before the most recent integration step.
    PreviousPosition
);
vector_attribute!(
    /// Linear velocity (m/s).
    Velocity
);
vector_attribute!(
    /// Force accumulated during the current tick (N).
    Force
);
vector_attribute!(
    /// Torque accumulated during the current tick (N·m). Rigid bodies only.
    Torque
);

/// Reciprocal mass (1/kg). Zero means infinitely heavy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(transparent)]
pub struct InverseMass(pub f32);

impl Attribute for InverseMass {}

impl InverseMass {
    /// Inverse of `mass`; non-positive or non-finite masses become immovable.
    #[must_use]
    pub fn from_mass(mass: f32) -> Self {
        if mass > 0.0 && mass.is_finite() {
            Self(1.0 / mass)
        } else {
            Self(0.0)
        }
    }

    /// Mass in kg, `None` for immovable particles.
    #[must_use]
    pub fn mass(self) -> Option<f32> {
        (self.0 > 0.0).then(|| 1.0 / self.0)
    }
}

/// Liveness record. Every allocated particle carries one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParticleMeta {
    /// Allocated and not yet released.
    pub alive: bool,
    /// Template particle: copied from, never simulated on its own.
    pub prefab: bool,
}

impl Attribute for ParticleMeta {}

impl ParticleMeta {
    /// Metadata for a freshly allocated particle.
    pub const ALIVE: Self = Self {
        alive: true,
        prefab: false,
    };
}

/// Collision radius (m), used by radius-aware buoyancy.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyRadius(pub f32);

impl Attribute for BodyRadius {}

/// Multiplier on gravitational pull, set by
/// [`MassParticle::scale_preserving_kinetic_energy`](crate::physics::MassParticle::scale_preserving_kinetic_energy).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GravityScale(pub f32);

impl Default for GravityScale {
    fn default() -> Self {
        Self(1.0)
    }
}

impl Attribute for GravityScale {}

/// Opaque renderer-side handle. The core never interprets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderHandle(pub u32);

impl Attribute for RenderHandle {}

/// Fixed-capacity anchor list with swap-remove.
///
/// Order is not preserved: removing slot `i` moves the last anchor into `i`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorSet<A: Copy, const N: usize> {
    slots: [Option<A>; N],
    count: usize,
}

impl<A: Copy, const N: usize> Default for AnchorSet<A, N> {
    fn default() -> Self {
        Self {
            slots: [None; N],
            count: 0,
        }
    }
}

impl<A: Copy, const N: usize> AnchorSet<A, N> {
    /// Maximum number of anchors.
    pub const CAPACITY: usize = N;

    /// Empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of anchors.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when no anchors are set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True when at capacity.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Appends an anchor, returning its slot, or `None` when full.
    pub fn push(&mut self, anchor: A) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        let slot = self.count;
        self.slots[slot] = Some(anchor);
        self.count += 1;
        Some(slot)
    }

    /// Removes the first anchor matching `pred` and returns the slot it
    /// occupied.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&A) -> bool) -> Option<usize> {
        let slot = self.iter().position(|a| pred(a))?;
        self.swap_remove(slot);
        Some(slot)
    }

    /// Removes slot `index`, moving the last anchor into it.
    pub fn swap_remove(&mut self, index: usize) -> Option<A> {
        if index >= self.count {
            return None;
        }
        let last = self.count - 1;
        self.slots.swap(index, last);
        self.count = last;
        self.slots[last].take()
    }

    /// Anchors in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &A> + '_ {
        self.slots[..self.count].iter().flatten()
    }
}

impl<A: Copy + 'static, const N: usize> Attribute for AnchorSet<A, N> {}
