//! # Attribute Columns
//!
//! One column stores one attribute type for every particle. Each column
//! keeps a presence bitset next to its payload so queries can intersect
//! presence word by word before touching any data.
//!
//! ## Layouts
//!
//! - `PerParticle`: one slot per id, grown on demand, never shrunk
//! - `PresenceOnly`: a tag; only the bit matters, and any value read back
//!   is the last one written for any particle
//! - `Shared`: a single physical slot broadcast to every id flagged present
//!
//! Shared and presence-only columns are read-only inside queries: a
//! mutable borrow of a broadcast value would alias across particles.

use std::any::{type_name, Any};

use super::attribute::Attribute;
use super::id::ParticleId;

// ============================================================================
// PRESENCE BITSET
// ============================================================================

/// Growable bitset, one bit per particle id.
///
/// ## Performance
///
/// - Set / clear / test: O(1)
/// - Intersect: O(n/64)
/// - Iterate: O(n/64 + set bits)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PresenceBits {
    /// 1 = present. 64 ids per word.
    words: Vec<u64>,
    /// Cached number of set bits.
    count: usize,
}

impl PresenceBits {
    /// Creates an empty bitset with room for `capacity` ids.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0u64; capacity.div_ceil(64)],
            count: 0,
        }
    }

    /// Bitset with ids `0..len` all set.
    #[must_use]
    pub fn filled(len: usize) -> Self {
        let mut bits = Self::with_capacity(len);
        let full_words = len / 64;
        for word in bits.words.iter_mut().take(full_words) {
            *word = u64::MAX;
        }
        let remaining = len % 64;
        if remaining > 0 {
            bits.words[full_words] = (1u64 << remaining) - 1;
        }
        bits.count = len;
        bits
    }

    /// Sets bit `index`, growing as needed. Returns `true` if it was clear.
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        let word = index / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let mask = 1u64 << (index % 64);
        let was_clear = self.words[word] & mask == 0;
        self.words[word] |= mask;
        if was_clear {
            self.count += 1;
        }
        was_clear
    }

    /// Clears bit `index`. Returns `true` if it was set.
    #[inline]
    pub fn remove(&mut self, index: usize) -> bool {
        let word = index / 64;
        let Some(bits) = self.words.get_mut(word) else {
            return false;
        };
        let mask = 1u64 << (index % 64);
        let was_set = *bits & mask != 0;
        *bits &= !mask;
        if was_set {
            self.count -= 1;
        }
        was_set
    }

    /// Tests bit `index`. Out-of-range ids are simply absent.
    #[inline]
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        let word = index / 64;
        (self.words.get(word).copied().unwrap_or(0) >> (index % 64)) & 1 == 1
    }

    /// Number of set bits.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// True when no bit is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Keeps only the bits also set in `other`.
    pub fn intersect_with(&mut self, other: &Self) {
        self.words.truncate(other.words.len());
        let mut count = 0;
        for (word, rhs) in self.words.iter_mut().zip(&other.words) {
            *word &= *rhs;
            count += word.count_ones() as usize;
        }
        self.count = count;
    }

    /// Set indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .filter(|(_, word)| **word != 0)
            .flat_map(|(word_idx, &word)| {
                let base = word_idx * 64;
                let mut remaining = word;
                std::iter::from_fn(move || {
                    if remaining == 0 {
                        return None;
                    }
                    let bit = remaining.trailing_zeros() as usize;
                    remaining &= remaining - 1;
                    Some(base + bit)
                })
            })
    }
}

// ============================================================================
// TYPED COLUMN
// ============================================================================

/// Storage layout, fixed when the column is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnLayout {
    /// One value per particle.
    PerParticle,
    /// Presence bit only. Every present particle reads back the last
    /// value written, so values are not per particle.
    PresenceOnly,
    /// One value shared by every particle flagged present.
    Shared,
}

#[derive(Debug)]
enum Payload<T> {
    PerParticle(Vec<Option<T>>),
    /// The last value written, kept so `get` can hand out a reference.
    PresenceOnly(Option<T>),
    Shared(Option<T>),
}

/// All particles' values for one attribute type.
#[derive(Debug)]
pub struct AttributeColumn<T: Attribute> {
    presence: PresenceBits,
    payload: Payload<T>,
}

impl<T: Attribute> AttributeColumn<T> {
    /// Creates an empty column.
    ///
    /// `capacity_hint` sizes presence tracking and, for per-particle
    /// columns, the slot vector. Shared columns always hold one slot.
    #[must_use]
    pub fn new(layout: ColumnLayout, capacity_hint: usize) -> Self {
        let payload = match layout {
            ColumnLayout::PerParticle => Payload::PerParticle(Vec::with_capacity(capacity_hint)),
            ColumnLayout::PresenceOnly => Payload::PresenceOnly(None),
            ColumnLayout::Shared => Payload::Shared(None),
        };
        Self {
            presence: PresenceBits::with_capacity(capacity_hint),
            payload,
        }
    }

    /// Layout chosen at creation.
    #[must_use]
    pub fn layout(&self) -> ColumnLayout {
        match self.payload {
            Payload::PerParticle(_) => ColumnLayout::PerParticle,
            Payload::PresenceOnly(_) => ColumnLayout::PresenceOnly,
            Payload::Shared(_) => ColumnLayout::Shared,
        }
    }

    /// Number of physical value slots currently allocated.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        match &self.payload {
            Payload::PerParticle(slots) => slots.len(),
            Payload::PresenceOnly(v) | Payload::Shared(v) => usize::from(v.is_some()),
        }
    }

    /// Presence flags.
    #[inline]
    #[must_use]
    pub fn presence(&self) -> &PresenceBits {
        &self.presence
    }

    /// Number of particles carrying this attribute.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.presence.count()
    }

    /// True when no particle carries this attribute.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.presence.is_empty()
    }

    /// True if `id` carries this attribute.
    #[inline]
    #[must_use]
    pub fn has(&self, id: ParticleId) -> bool {
        self.presence.contains(id.index())
    }

    /// Value for `id`, or `None` when absent.
    #[must_use]
    pub fn try_get(&self, id: ParticleId) -> Option<&T> {
        if !self.has(id) {
            return None;
        }
        match &self.payload {
            Payload::PerParticle(slots) => slots.get(id.index()).and_then(Option::as_ref),
            Payload::PresenceOnly(v) | Payload::Shared(v) => v.as_ref(),
        }
    }

    /// Mutable value for `id`, or `None` when absent.
    ///
    /// For a shared column this is the single broadcast slot.
    pub fn try_get_mut(&mut self, id: ParticleId) -> Option<&mut T> {
        if !self.has(id) {
            return None;
        }
        match &mut self.payload {
            Payload::PerParticle(slots) => slots.get_mut(id.index()).and_then(Option::as_mut),
            Payload::PresenceOnly(v) | Payload::Shared(v) => v.as_mut(),
        }
    }

    /// Value for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not carry this attribute. Check with
    /// [`has`](Self::has) or use [`try_get`](Self::try_get).
    #[must_use]
    pub fn get(&self, id: ParticleId) -> &T {
        match self.try_get(id) {
            Some(v) => v,
            None => absent::<T>(id),
        }
    }

    /// Mutable value for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not carry this attribute.
    pub fn get_mut(&mut self, id: ParticleId) -> &mut T {
        match self.try_get_mut(id) {
            Some(v) => v,
            None => absent::<T>(id),
        }
    }

    /// Attaches `value` to `id` and returns a reference to the stored value.
    ///
    /// Per-particle storage grows to cover `id`. Shared and presence-only
    /// columns overwrite their single slot.
    pub fn set(&mut self, id: ParticleId, value: T) -> &mut T {
        let index = id.index();
        self.presence.insert(index);
        match &mut self.payload {
            Payload::PerParticle(slots) => {
                if index >= slots.len() {
                    slots.resize_with(index + 1, || None);
                }
                slots[index].insert(value)
            }
            Payload::PresenceOnly(v) | Payload::Shared(v) => v.insert(value),
        }
    }

    /// Detaches the attribute from `id`.
    ///
    /// Returns the prior per-particle value, the shared value for a shared
    /// column, and `None` for presence-only columns or when absent.
    pub fn remove(&mut self, id: ParticleId) -> Option<T> {
        let index = id.index();
        if !self.presence.remove(index) {
            return None;
        }
        let last_holder = self.presence.is_empty();
        match &mut self.payload {
            Payload::PerParticle(slots) => slots.get_mut(index).and_then(Option::take),
            Payload::PresenceOnly(v) => {
                if last_holder {
                    *v = None;
                }
                None
            }
            Payload::Shared(v) => {
                if last_holder {
                    v.take()
                } else {
                    v.clone()
                }
            }
        }
    }

    /// Read cursor for lockstep query iteration.
    #[must_use]
    pub fn cursor(&self) -> ColumnCursor<'_, T> {
        let source = match &self.payload {
            Payload::PerParticle(slots) => CursorSource::Slots(slots.iter()),
            Payload::PresenceOnly(v) | Payload::Shared(v) => CursorSource::Broadcast {
                presence: &self.presence,
                value: v.as_ref(),
            },
        };
        ColumnCursor { source, next: 0 }
    }

    /// Write cursor for lockstep query iteration.
    ///
    /// # Panics
    ///
    /// Panics for shared and presence-only columns.
    pub fn cursor_mut(&mut self) -> ColumnCursorMut<'_, T> {
        match &mut self.payload {
            Payload::PerParticle(slots) => ColumnCursorMut {
                slots: slots.iter_mut(),
                next: 0,
            },
            Payload::PresenceOnly(_) | Payload::Shared(_) => panic!(
                "{} is a broadcast column and cannot be borrowed mutably in a query",
                type_name::<T>()
            ),
        }
    }
}

/// Contract-violation panic for reading an absent attribute.
#[cold]
#[inline(never)]
pub(crate) fn absent<T>(id: ParticleId) -> ! {
    panic!("particle {id} has no {} attribute", type_name::<T>())
}

// ============================================================================
// CURSORS
// ============================================================================

enum CursorSource<'s, T> {
    Slots(std::slice::Iter<'s, Option<T>>),
    Broadcast {
        presence: &'s PresenceBits,
        value: Option<&'s T>,
    },
}

/// Forward-only read cursor over a column.
///
/// `seek` must be called with strictly increasing ids.
pub struct ColumnCursor<'s, T> {
    source: CursorSource<'s, T>,
    next: usize,
}

impl<'s, T> ColumnCursor<'s, T> {
    /// Value at `index`, skipping any slots in between.
    #[inline]
    pub fn seek(&mut self, index: usize) -> Option<&'s T> {
        debug_assert!(index >= self.next, "column cursor moved backwards");
        let skip = index - self.next;
        self.next = index + 1;
        match &mut self.source {
            CursorSource::Slots(slots) => slots.nth(skip).and_then(Option::as_ref),
            CursorSource::Broadcast { presence, value } => {
                if presence.contains(index) {
                    *value
                } else {
                    None
                }
            }
        }
    }
}

/// Forward-only write cursor over a per-particle column.
pub struct ColumnCursorMut<'s, T> {
    slots: std::slice::IterMut<'s, Option<T>>,
    next: usize,
}

impl<'s, T> ColumnCursorMut<'s, T> {
    /// Value at `index`, skipping any slots in between.
    #[inline]
    pub fn seek(&mut self, index: usize) -> Option<&'s mut T> {
        debug_assert!(index >= self.next, "column cursor moved backwards");
        let skip = index - self.next;
        self.next = index + 1;
        self.slots.nth(skip).and_then(Option::as_mut)
    }
}

// ============================================================================
// TYPE-ERASED INTERFACE
// ============================================================================

/// Column operations that do not need the attribute type.
///
/// The store keeps `Box<dyn ErasedColumn>` keyed by `TypeId` and recovers
/// the typed column with [`as_any`](Self::as_any) downcasts.
pub trait ErasedColumn: Any {
    /// For downcasting to `AttributeColumn<T>`.
    fn as_any(&self) -> &dyn Any;
    /// For downcasting to `AttributeColumn<T>`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Attribute type name, for diagnostics.
    fn attribute_name(&self) -> &'static str;
    /// Storage layout.
    fn layout(&self) -> ColumnLayout;
    /// Presence flags.
    fn presence(&self) -> &PresenceBits;
    /// True if `id` carries this attribute.
    fn has(&self, id: ParticleId) -> bool;
    /// Detaches the attribute from `id`. Returns `true` if it was present.
    fn clear(&mut self, id: ParticleId) -> bool;
    /// Copies `src`'s value onto `dest`. Returns `false`, leaving `dest`
    /// untouched, when `src` lacks the attribute.
    fn copy_slot(&mut self, dest: ParticleId, src: ParticleId) -> bool;
}

impl<T: Attribute> ErasedColumn for AttributeColumn<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn attribute_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn layout(&self) -> ColumnLayout {
        AttributeColumn::layout(self)
    }

    fn presence(&self) -> &PresenceBits {
        &self.presence
    }

    fn has(&self, id: ParticleId) -> bool {
        AttributeColumn::has(self, id)
    }

    fn clear(&mut self, id: ParticleId) -> bool {
        let was_present = AttributeColumn::has(self, id);
        self.remove(id);
        was_present
    }

    fn copy_slot(&mut self, dest: ParticleId, src: ParticleId) -> bool {
        let Some(value) = self.try_get(src).cloned() else {
            return false;
        };
        self.set(dest, value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::attribute::{ParticleMeta, Position};
    use sizzle_shared::Vec3;

    fn id(i: u32) -> ParticleId {
        ParticleId::new(i)
    }

    #[test]
    fn test_presence_bits_basics() {
        let mut bits = PresenceBits::with_capacity(10);
        assert!(bits.insert(3));
        assert!(!bits.insert(3));
        assert!(bits.insert(130));
        assert_eq!(bits.count(), 2);
        assert!(bits.contains(130));
        assert!(!bits.contains(10_000));
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![3, 130]);
        assert!(bits.remove(3));
        assert!(!bits.remove(3));
        assert_eq!(bits.count(), 1);
    }

    #[test]
    fn test_presence_bits_intersect() {
        let mut a = PresenceBits::filled(70);
        let mut b = PresenceBits::default();
        for i in [1, 5, 69, 200] {
            b.insert(i);
        }
        a.intersect_with(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 5, 69]);
        assert_eq!(a.count(), 3);
    }

    #[test]
    fn test_per_particle_grows_without_shrinking() {
        let mut column = AttributeColumn::<Position>::new(ColumnLayout::PerParticle, 2);
        column.set(id(9), Position(Vec3::X));
        assert_eq!(column.slot_count(), 10);
        assert!(column.has(id(9)));
        assert!(!column.has(id(3)));
        assert!(!column.has(id(4_000)));

        assert_eq!(column.remove(id(9)), Some(Position(Vec3::X)));
        assert_eq!(column.slot_count(), 10);
        assert_eq!(column.remove(id(9)), None);
    }

    #[test]
    fn test_shared_has_one_slot() {
        let mut column = AttributeColumn::<Position>::new(ColumnLayout::Shared, 1_000);
        for i in 0..100 {
            column.set(id(i), Position(Vec3::Y));
        }
        assert_eq!(column.slot_count(), 1);
        assert_eq!(column.len(), 100);
        assert_eq!(column.get(id(42)), &Position(Vec3::Y));

        column.set(id(0), Position(Vec3::Z));
        assert_eq!(column.get(id(99)), &Position(Vec3::Z));

        assert_eq!(column.remove(id(5)), Some(Position(Vec3::Z)));
        assert!(!column.has(id(5)));
        assert!(column.has(id(6)));
    }

    #[test]
    fn test_presence_only_remove_returns_nothing() {
        let mut column = AttributeColumn::<ParticleMeta>::new(ColumnLayout::PresenceOnly, 4);
        column.set(id(1), ParticleMeta::ALIVE);
        assert!(column.has(id(1)));
        assert_eq!(column.remove(id(1)), None);
        assert!(!column.has(id(1)));
        assert_eq!(column.slot_count(), 0);
    }

    #[test]
    #[should_panic(expected = "has no")]
    fn test_get_absent_panics() {
        let column = AttributeColumn::<Position>::new(ColumnLayout::PerParticle, 4);
        let _ = column.get(id(0));
    }

    #[test]
    fn test_cursor_skips_forward() {
        let mut column = AttributeColumn::<Position>::new(ColumnLayout::PerParticle, 8);
        column.set(id(1), Position(Vec3::X));
        column.set(id(4), Position(Vec3::Y));
        let mut cursor = column.cursor();
        assert_eq!(cursor.seek(1), Some(&Position(Vec3::X)));
        assert_eq!(cursor.seek(3), None);
        assert_eq!(cursor.seek(4), Some(&Position(Vec3::Y)));
        assert_eq!(cursor.seek(50), None);
    }

    #[test]
    fn test_erased_copy_slot() {
        let mut column = AttributeColumn::<Position>::new(ColumnLayout::PerParticle, 4);
        column.set(id(0), Position(Vec3::X));
        let erased: &mut dyn ErasedColumn = &mut column;
        assert!(erased.copy_slot(id(2), id(0)));
        assert!(!erased.copy_slot(id(3), id(1)));
        assert!(erased.has(id(2)));
        assert!(!erased.has(id(3)));
        assert!(erased.attribute_name().ends_with("Position"));
    }
}
