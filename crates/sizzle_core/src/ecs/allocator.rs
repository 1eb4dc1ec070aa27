//! # Particle Allocation
//!
//! Dense id allocation with a FIFO free list. Liveness lives in the store
//! as the [`ParticleMeta`] attribute, so a released id carries no data at
//! all until it is handed out again.

use std::collections::VecDeque;

use tracing::trace;

use super::attribute::ParticleMeta;
use super::id::{ParticleHandle, ParticleId};
use super::store::ComponentStore;

/// Hands out particle ids and recycles released ones.
///
/// # Example
///
/// ```rust,ignore
/// let mut store = ComponentStore::new();
/// let mut allocator = ParticleAllocator::new();
///
/// let id = allocator.allocate(&mut store);
/// store.set(id, Position(Vec3::ZERO));
/// allocator.release(&mut store, id); // every attribute is gone
/// ```
#[derive(Debug, Default)]
pub struct ParticleAllocator {
    /// Next never-used index.
    next: u32,
    /// Released ids, oldest first.
    free: VecDeque<ParticleId>,
    /// Bumped on every release of the slot.
    generations: Vec<u32>,
}

impl ParticleAllocator {
    /// Creates an allocator with no ids handed out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a live id, reusing the oldest released one if any.
    pub fn allocate(&mut self, store: &mut ComponentStore) -> ParticleId {
        self.allocate_with(store, ParticleMeta::ALIVE)
    }

    /// Like [`allocate`](Self::allocate) with explicit metadata.
    ///
    /// # Panics
    ///
    /// Panics once `u32::MAX` ids are live at the same time.
    pub fn allocate_with(&mut self, store: &mut ComponentStore, meta: ParticleMeta) -> ParticleId {
        let id = if let Some(id) = self.free.pop_front() {
            id
        } else {
            assert!(self.next < u32::MAX, "particle id space exhausted");
            let id = ParticleId::new(self.next);
            self.next += 1;
            self.generations.push(0);
            id
        };
        debug_assert!(
            store.attribute_names(id).is_empty(),
            "reused particle {id} still carries attributes"
        );
        store.set(id, ParticleMeta { alive: true, ..meta });
        trace!(particle = id.raw(), "allocated");
        id
    }

    /// Clears every attribute of `id` and queues it for reuse.
    ///
    /// Returns `false` if `id` is not alive.
    pub fn release(&mut self, store: &mut ComponentStore, id: ParticleId) -> bool {
        if !Self::is_alive(store, id) {
            return false;
        }
        store.clear_all_attributes(id);
        if let Some(generation) = self.generations.get_mut(id.index()) {
            *generation = generation.wrapping_add(1);
        }
        self.free.push_back(id);
        trace!(particle = id.raw(), "released");
        true
    }

    /// True if `id` is currently allocated.
    #[inline]
    #[must_use]
    pub fn is_alive(store: &ComponentStore, id: ParticleId) -> bool {
        store.try_get::<ParticleMeta>(id).is_some_and(|meta| meta.alive)
    }

    /// Ids handed out minus ids waiting for reuse.
    #[inline]
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.next as usize - self.free.len()
    }

    /// Number of released ids waiting for reuse.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Generation-counted handle for `id`.
    #[must_use]
    pub fn handle(&self, id: ParticleId) -> ParticleHandle {
        let generation = self.generations.get(id.index()).copied().unwrap_or(0);
        ParticleHandle::new(id, generation)
    }

    /// The id behind `handle`, or `None` once it has been released.
    #[must_use]
    pub fn resolve(&self, store: &ComponentStore, handle: ParticleHandle) -> Option<ParticleId> {
        let current = self.generations.get(handle.id.index()).copied()?;
        (current == handle.generation && Self::is_alive(store, handle.id)).then_some(handle.id)
    }
}
