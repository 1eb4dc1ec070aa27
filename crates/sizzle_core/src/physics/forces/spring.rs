//! Hookean springs to fixed points and to other particles.
//!
//! Each particle holds at most [`MAX_ANCHORS`] anchors. The rest length of
//! an anchor is the distance at the moment it was added.

use std::any::type_name;

use sizzle_shared::Vec3;

use super::{accumulate, ForceGenerator, ForceReport};
use crate::ecs::{AnchorSet, ComponentStore, Force, ParticleId, Position};
use crate::error::{SimError, SimResult};

/// Anchors per particle.
pub const MAX_ANCHORS: usize = 8;

/// Spring to a fixed world point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaticAnchor {
    /// Anchor point.
    pub point: Vec3,
    /// Distance at which the spring is relaxed.
    pub rest_length: f32,
}

/// Spring to another particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DynamicAnchor {
    /// The other end.
    pub other: ParticleId,
    /// Distance at which the spring is relaxed.
    pub rest_length: f32,
}

/// Static anchors of one particle.
pub type StaticAnchors = AnchorSet<StaticAnchor, MAX_ANCHORS>;

/// Dynamic anchors of one particle.
pub type DynamicAnchors = AnchorSet<DynamicAnchor, MAX_ANCHORS>;

/// `F = -k · (|Δ| - rest) · Δ̂` with `Δ = position - anchor`.
///
/// Zero when the two points coincide.
#[inline]
#[must_use]
pub fn spring_force(position: Vec3, anchor: Vec3, stiffness: f32, rest_length: f32) -> Vec3 {
    let delta = position - anchor;
    let length = delta.length();
    delta.normalized() * (-stiffness * (length - rest_length))
}

fn position_of(store: &ComponentStore, id: ParticleId) -> SimResult<Vec3> {
    store
        .try_get::<Position>(id)
        .map(|p| p.0)
        .ok_or(SimError::MissingAttribute {
            particle: id,
            attribute: type_name::<Position>(),
        })
}

/// Pulls particles toward their [`StaticAnchors`].
#[derive(Clone, Debug, PartialEq)]
pub struct StaticSpringGenerator {
    /// Spring constant `k` (N/m).
    pub stiffness: f32,
}

impl StaticSpringGenerator {
    /// Springs of stiffness `k`.
    #[must_use]
    pub fn new(stiffness: f32) -> Self {
        Self { stiffness }
    }

    /// Anchors `id` to `point`, relaxed at the current distance.
    ///
    /// Returns the slot used, or `None` when the particle already has
    /// [`MAX_ANCHORS`] anchors.
    ///
    /// # Errors
    ///
    /// [`SimError::MissingAttribute`] if `id` has no position.
    pub fn add_anchor(store: &mut ComponentStore, id: ParticleId, point: Vec3) -> SimResult<Option<usize>> {
        let rest_length = position_of(store, id)?.distance(point);
        if !store.has::<StaticAnchors>(id) {
            store.set(id, StaticAnchors::new());
        }
        let anchors = store.get_mut::<StaticAnchors>(id);
        Ok(anchors.push(StaticAnchor { point, rest_length }))
    }

    /// Removes the anchor at `point`; returns the slot it occupied.
    pub fn remove_anchor(store: &mut ComponentStore, id: ParticleId, point: Vec3) -> Option<usize> {
        store
            .try_get_mut::<StaticAnchors>(id)?
            .remove_where(|anchor| anchor.point == point)
    }
}

impl ForceGenerator for StaticSpringGenerator {
    fn name(&self) -> &str {
        "static_spring"
    }

    fn apply_to_particles(&mut self, store: &mut ComponentStore, _dt: f32) -> ForceReport {
        let mut suppressed = 0;
        let matched = store.query::<(&Position, &StaticAnchors, &mut Force), _>(
            |id, (position, anchors, force)| {
                for anchor in anchors.iter() {
                    let contribution =
                        spring_force(position.0, anchor.point, self.stiffness, anchor.rest_length);
                    if !accumulate(&mut force.0, contribution, "static_spring", id) {
                        suppressed += 1;
                    }
                }
            },
        );
        ForceReport {
            matched,
            suppressed,
        }
    }
}

/// Pulls particles toward the particles named in their [`DynamicAnchors`].
///
/// Springs are one-sided: to make a pair pull on each other, anchor each
/// to the other. Anchors to particles without a position are skipped;
/// despawning through `ParticleSystem` removes anchors to the despawned
/// particle (see [`forget_partner`](Self::forget_partner)).
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicSpringGenerator {
    /// Spring constant `k` (N/m).
    pub stiffness: f32,
}

impl DynamicSpringGenerator {
    /// Springs of stiffness `k`.
    #[must_use]
    pub fn new(stiffness: f32) -> Self {
        Self { stiffness }
    }

    /// Anchors `id` to `other`, relaxed at their current distance.
    ///
    /// # Errors
    ///
    /// [`SimError::MissingAttribute`] if either particle has no position.
    pub fn add_anchor(
        store: &mut ComponentStore,
        id: ParticleId,
        other: ParticleId,
    ) -> SimResult<Option<usize>> {
        let rest_length = position_of(store, id)?.distance(position_of(store, other)?);
        if !store.has::<DynamicAnchors>(id) {
            store.set(id, DynamicAnchors::new());
        }
        let anchors = store.get_mut::<DynamicAnchors>(id);
        Ok(anchors.push(DynamicAnchor { other, rest_length }))
    }

    /// Removes the anchor to `other`; returns the slot it occupied.
    pub fn remove_anchor(store: &mut ComponentStore, id: ParticleId, other: ParticleId) -> Option<usize> {
        store
            .try_get_mut::<DynamicAnchors>(id)?
            .remove_where(|anchor| anchor.other == other)
    }

    /// Drops every anchor, on any particle, whose other end is `other`.
    ///
    /// Must run before `other` is released: ids are reused, and an anchor
    /// left behind would pull toward whichever particle gets the id next.
    /// Returns how many anchors were dropped.
    pub fn forget_partner(store: &mut ComponentStore, other: ParticleId) -> usize {
        let mut dropped = 0;
        store.query::<(&mut DynamicAnchors,), _>(|_, (anchors,)| {
            while anchors.remove_where(|anchor| anchor.other == other).is_some() {
                dropped += 1;
            }
        });
        dropped
    }
}

impl ForceGenerator for DynamicSpringGenerator {
    fn name(&self) -> &str {
        "dynamic_spring"
    }

    fn apply_to_particles(&mut self, store: &mut ComponentStore, _dt: f32) -> ForceReport {
        // other ends are read from the store, so forces are computed first
        // and written in a second pass
        let ids = store.query_ids::<(&Position, &DynamicAnchors, &Force)>();
        let mut pending = Vec::with_capacity(ids.len());
        for &id in &ids {
            let position = store.get::<Position>(id).0;
            for anchor in store.get::<DynamicAnchors>(id).iter() {
                if let Some(other) = store.try_get::<Position>(anchor.other) {
                    let contribution =
                        spring_force(position, other.0, self.stiffness, anchor.rest_length);
                    pending.push((id, contribution));
                }
            }
        }

        let mut suppressed = 0;
        for (id, contribution) in pending {
            if let Some(force) = store.try_get_mut::<Force>(id) {
                if !accumulate(&mut force.0, contribution, "dynamic_spring", id) {
                    suppressed += 1;
                }
            }
        }
        ForceReport {
            matched: ids.len(),
            suppressed,
        }
    }
}
