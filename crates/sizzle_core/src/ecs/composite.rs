//! # Composite Values
//!
//! A composite is a higher-level value (a mass particle, a projectile)
//! stored as several primitive attributes. Each composite names its field
//! tuple explicitly, so the mapping is visible in one place and a mismatch
//! is a compile error.

use std::any::type_name;

use super::attribute::Attribute;
use super::id::ParticleId;
use super::store::ComponentStore;

/// A tuple of attributes written and read as a unit.
pub trait AttributeSet: Sized {
    /// Stores every field on `id`.
    fn insert_into(self, store: &mut ComponentStore, id: ParticleId);

    /// Reads every field of `id`.
    ///
    /// # Errors
    ///
    /// Returns the type name of the first missing attribute.
    fn fetch_from(store: &ComponentStore, id: ParticleId) -> Result<Self, &'static str>;
}

/// A value that decomposes into an [`AttributeSet`].
///
/// # Example
///
/// ```rust,ignore
/// impl Composite for PointParticle {
///     type Fields = (PreviousPosition, Position, Velocity);
///
///     fn to_fields(self) -> Self::Fields {
///         (PreviousPosition(self.previous_position), Position(self.position), Velocity(self.velocity))
///     }
///
///     fn from_fields((prev, pos, vel): Self::Fields) -> Self {
///         Self { previous_position: prev.0, position: pos.0, velocity: vel.0 }
///     }
/// }
/// ```
pub trait Composite: Sized {
    /// Primitive attributes this composite is stored as.
    type Fields: AttributeSet;

    /// Splits into primitive attributes.
    fn to_fields(self) -> Self::Fields;

    /// Rebuilds from primitive attributes.
    fn from_fields(fields: Self::Fields) -> Self;
}

macro_rules! impl_attribute_set {
    ($($T:ident),+) => {
        impl<$($T: Attribute),+> AttributeSet for ($($T,)+) {
            #[allow(non_snake_case)]
            fn insert_into(self, store: &mut ComponentStore, id: ParticleId) {
                let ($($T,)+) = self;
                $( store.set(id, $T); )+
            }

            fn fetch_from(store: &ComponentStore, id: ParticleId) -> Result<Self, &'static str> {
                Ok(($(
                    store.try_get::<$T>(id).cloned().ok_or_else(type_name::<$T>)?,
                )+))
            }
        }

        impl<$($T: Attribute),+> Composite for ($($T,)+) {
            type Fields = Self;

            fn to_fields(self) -> Self {
                self
            }

            fn from_fields(fields: Self) -> Self {
                fields
            }
        }
    };
}

impl_attribute_set!(A);
impl_attribute_set!(A, B);
impl_attribute_set!(A, B, C);
impl_attribute_set!(A, B, C, D);
impl_attribute_set!(A, B, C, D, E);
impl_attribute_set!(A, B, C, D, E, F);
