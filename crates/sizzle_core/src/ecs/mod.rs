//! # Particle Storage
//!
//! Columnar attribute storage for particles.
//!
//! ## Design
//!
//! - A particle is a dense id; all data lives in per-type columns
//! - Columns are type-erased behind [`ErasedColumn`] and recovered by
//!   `TypeId` downcast
//! - Queries are AND-joins over presence bitsets, visited in id order
//! - Composites map a value type onto a fixed tuple of attributes

mod allocator;
mod attribute;
mod column;
mod composite;
mod id;
mod query;
mod store;

pub use allocator::ParticleAllocator;
pub use attribute::{
    AnchorSet, Attribute, BodyRadius, Force, GravityScale, InverseMass, ParticleMeta, Position,
    PreviousPosition, RenderHandle, Torque, Velocity,
};
pub use column::{
    AttributeColumn, ColumnCursor, ColumnCursorMut, ColumnLayout, ErasedColumn, PresenceBits,
};
pub use composite::{AttributeSet, Composite};
pub use id::{ParticleHandle, ParticleId};
pub use query::{Query, QueryParam};
pub use store::ComponentStore;
