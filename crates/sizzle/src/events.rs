//! # Contact Events
//!
//! The rigid-body engine reports contacts from its own callbacks, which may
//! fire while the particle store is mid-iteration. Callbacks therefore only
//! post into a bounded channel; the loop drains it between ticks and turns
//! each contact into a [`JustHit`] marker on the particle.
//!
//! ```text
//! engine callback ──try_post──> [bounded channel] ──drain──> JustHit on particle
//! ```

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use sizzle_core::{Attribute, BodyHandle, ParticleSystem};
use sizzle_shared::Vec3;
use tracing::{trace, warn};

/// Default number of contacts buffered between two drains.
pub const DEFAULT_CONTACT_CAPACITY: usize = 1024;

/// A contact reported by the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactEvent {
    /// The body that was hit.
    pub body: BodyHandle,
    /// The body it hit, if the engine knows it.
    pub other: Option<BodyHandle>,
    /// World-space contact point.
    pub point: Vec3,
    /// Impulse magnitude (N·s).
    pub impulse: f32,
}

/// Marker attached to a particle whose body was hit since the last drain.
///
/// Lives for one frame: the next drain clears it before applying new
/// contacts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JustHit {
    /// Contact point.
    pub point: Vec3,
    /// Largest impulse among this frame's contacts.
    pub impulse: f32,
}

impl Attribute for JustHit {}

/// Result of one drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Contacts turned into markers.
    pub applied: usize,
    /// Contacts for bodies with no live particle.
    pub stale: usize,
    /// Markers from the previous frame removed.
    pub cleared: usize,
}

/// Sending half, cloned into engine callbacks.
#[derive(Clone, Debug)]
pub struct ContactSender {
    sender: Sender<ContactEvent>,
}

impl ContactSender {
    /// Posts a contact without blocking.
    ///
    /// Returns `false` if the channel is full or closed; the contact is
    /// dropped.
    pub fn try_post(&self, event: ContactEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(body = event.body.0, "contact channel full, contact dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Bounded contact queue owned by the loop.
#[derive(Debug)]
pub struct ContactChannel {
    sender: Sender<ContactEvent>,
    receiver: Receiver<ContactEvent>,
}

impl Default for ContactChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CONTACT_CAPACITY)
    }
}

impl ContactChannel {
    /// Channel holding at most `capacity` undrained contacts.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// A sender for an engine callback.
    #[must_use]
    pub fn sender(&self) -> ContactSender {
        ContactSender {
            sender: self.sender.clone(),
        }
    }

    /// Contacts waiting to be drained.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Replaces last frame's [`JustHit`] markers with this frame's contacts.
    ///
    /// Must be called outside any query over `system`.
    pub fn drain_into(&self, system: &mut ParticleSystem) -> DrainReport {
        let mut report = DrainReport {
            cleared: clear_hits(system),
            ..DrainReport::default()
        };
        for event in self.receiver.try_iter() {
            let Some(id) = system.particle_for_body(event.body) else {
                trace!(body = event.body.0, "contact for unknown body");
                report.stale += 1;
                continue;
            };
            let hit = match system.get::<JustHit>(id) {
                Some(previous) if previous.impulse >= event.impulse => *previous,
                _ => JustHit {
                    point: event.point,
                    impulse: event.impulse,
                },
            };
            if system.attach(id, hit).is_ok() {
                report.applied += 1;
            } else {
                report.stale += 1;
            }
        }
        report
    }
}

/// Removes every [`JustHit`] marker; returns how many there were.
pub fn clear_hits(system: &mut ParticleSystem) -> usize {
    let mut hit = Vec::new();
    system.query::<(&JustHit,), _>(|id, _| hit.push(id));
    for &id in &hit {
        system.detach::<JustHit>(id);
    }
    hit.len()
}
