//! # External Rigid Bodies
//!
//! Some particles are proxies for bodies owned by an external rigid-body
//! engine. The engine stays the source of truth for their motion: the
//! composer copies body state into the particle before the generators run
//! and forwards the accumulated force and torque afterwards. Proxies are
//! never integrated here.

use sizzle_shared::Vec3;

use crate::ecs::Attribute;

/// Opaque id of a body inside the external engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u64);

/// Marks a particle as a proxy for `body`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RigidBodyProxy {
    /// The backing body.
    pub body: BodyHandle,
}

impl Attribute for RigidBodyProxy {}

/// Snapshot of a body read at the start of a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyState {
    /// Center of mass.
    pub position: Vec3,
    /// Linear velocity.
    pub linear_velocity: Vec3,
    /// `1 / mass`, zero for static bodies.
    pub inverse_mass: f32,
}

/// The rigid-body engine as seen from the particle runtime.
pub trait RigidBodyEngine {
    /// Current state of `body`, `None` once the engine has dropped it.
    fn body_state(&self, body: BodyHandle) -> Option<BodyState>;

    /// Adds `force` to the body's accumulator for its next step.
    fn add_force(&mut self, body: BodyHandle, force: Vec3);

    /// Adds `torque` to the body's accumulator for its next step.
    fn add_torque(&mut self, body: BodyHandle, torque: Vec3);
}

/// Engine with no bodies; used when none is attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRigidBodies;

impl RigidBodyEngine for NoRigidBodies {
    fn body_state(&self, _body: BodyHandle) -> Option<BodyState> {
        None
    }

    fn add_force(&mut self, _body: BodyHandle, _force: Vec3) {}

    fn add_torque(&mut self, _body: BodyHandle, _torque: Vec3) {}
}
