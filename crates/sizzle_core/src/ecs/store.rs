//! # Component Store
//!
//! Registry of attribute columns keyed by attribute type. Columns are
//! created lazily on first `set`, as per-particle columns unless a layout
//! was registered beforehand.
//!
//! Columns grow independently; an id past a column's end is simply absent
//! there. The store tracks the highest id ever written so optional-only
//! queries know where to stop.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use super::attribute::Attribute;
use super::column::{absent, AttributeColumn, ColumnLayout, ErasedColumn, PresenceBits};
use super::composite::{AttributeSet, Composite};
use super::id::ParticleId;
use super::query::Query;

/// Default number of particle slots reserved per new column.
const DEFAULT_CAPACITY_HINT: usize = 1024;

/// Type-indexed set of attribute columns.
///
/// # Example
///
/// ```rust,ignore
/// let mut store = ComponentStore::new();
/// store.set(id, Position(Vec3::ZERO));
/// store.set(id, Velocity(Vec3::X));
///
/// store.query::<(&Velocity, &mut Position), _>(|_, (v, p)| p.0 += v.0 * dt);
/// ```
pub struct ComponentStore {
    columns: HashMap<TypeId, Box<dyn ErasedColumn>>,
    capacity_hint: usize,
    /// One past the highest id ever written.
    bound: usize,
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.columns.values().map(|c| c.attribute_name()).collect();
        names.sort_unstable();
        f.debug_struct("ComponentStore")
            .field("columns", &names)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

impl ComponentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY_HINT)
    }

    /// Creates an empty store whose columns reserve `capacity_hint` slots.
    #[must_use]
    pub fn with_capacity(capacity_hint: usize) -> Self {
        Self {
            columns: HashMap::new(),
            capacity_hint,
            bound: 0,
        }
    }

    /// One past the highest particle id ever written.
    #[inline]
    #[must_use]
    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Number of columns created so far.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    // =========================================================================
    // Column registry
    // =========================================================================

    /// Creates the column for `T` with `layout` unless it already exists.
    ///
    /// Returns the layout actually in effect.
    pub fn register<T: Attribute>(&mut self, layout: ColumnLayout) -> ColumnLayout {
        let hint = self.capacity_hint;
        self.columns
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(AttributeColumn::<T>::new(layout, hint)))
            .layout()
    }

    /// Registers `T` as a presence-only tag column.
    ///
    /// Only the presence bit is per particle. The column keeps a single
    /// value, the last one written, and every present particle reads that
    /// value back: `set(i, a); set(j, b)` leaves `get(i) == b`. Use it for
    /// markers whose value carries no information.
    pub fn register_presence<T: Attribute>(&mut self) -> ColumnLayout {
        self.register::<T>(ColumnLayout::PresenceOnly)
    }

    /// Registers `T` as a single value shared by every particle flagged
    /// present.
    pub fn register_shared<T: Attribute>(&mut self) -> ColumnLayout {
        self.register::<T>(ColumnLayout::Shared)
    }

    /// Typed column for `T`, if created.
    #[must_use]
    pub fn column<T: Attribute>(&self) -> Option<&AttributeColumn<T>> {
        self.columns
            .get(&TypeId::of::<T>())
            .and_then(|column| column.as_any().downcast_ref())
    }

    /// Mutable typed column for `T`, if created.
    pub fn column_mut<T: Attribute>(&mut self) -> Option<&mut AttributeColumn<T>> {
        self.columns
            .get_mut(&TypeId::of::<T>())
            .and_then(|column| column.as_any_mut().downcast_mut())
    }

    fn column_or_insert<T: Attribute>(&mut self) -> &mut AttributeColumn<T> {
        let hint = self.capacity_hint;
        let column = self.columns.entry(TypeId::of::<T>()).or_insert_with(|| {
            Box::new(AttributeColumn::<T>::new(ColumnLayout::PerParticle, hint))
        });
        match column.as_any_mut().downcast_mut() {
            Some(typed) => typed,
            None => unreachable!("column keyed by {} holds another type", type_name::<T>()),
        }
    }

    // =========================================================================
    // Per-attribute access
    // =========================================================================

    /// True if `id` carries `T`. Never faults.
    #[inline]
    #[must_use]
    pub fn has<T: Attribute>(&self, id: ParticleId) -> bool {
        self.column::<T>().is_some_and(|column| column.has(id))
    }

    /// `T` for `id`, or `None` when absent.
    #[must_use]
    pub fn try_get<T: Attribute>(&self, id: ParticleId) -> Option<&T> {
        self.column::<T>().and_then(|column| column.try_get(id))
    }

    /// Mutable `T` for `id`, or `None` when absent.
    pub fn try_get_mut<T: Attribute>(&mut self, id: ParticleId) -> Option<&mut T> {
        self.column_mut::<T>().and_then(|column| column.try_get_mut(id))
    }

    /// `T` for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not carry `T`.
    #[must_use]
    pub fn get<T: Attribute>(&self, id: ParticleId) -> &T {
        match self.try_get(id) {
            Some(value) => value,
            None => absent::<T>(id),
        }
    }

    /// Mutable `T` for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not carry `T`.
    pub fn get_mut<T: Attribute>(&mut self, id: ParticleId) -> &mut T {
        match self.try_get_mut(id) {
            Some(value) => value,
            None => absent::<T>(id),
        }
    }

    /// Attaches `value` to `id`, creating the column if needed.
    pub fn set<T: Attribute>(&mut self, id: ParticleId, value: T) -> &mut T {
        self.bound = self.bound.max(id.index() + 1);
        self.column_or_insert::<T>().set(id, value)
    }

    /// Detaches `T` from `id`. See [`AttributeColumn::remove`].
    pub fn remove<T: Attribute>(&mut self, id: ParticleId) -> Option<T> {
        self.column_mut::<T>().and_then(|column| column.remove(id))
    }

    // =========================================================================
    // Whole-particle operations
    // =========================================================================

    /// Removes every attribute `id` carries. Returns how many were removed.
    pub fn clear_all_attributes(&mut self, id: ParticleId) -> usize {
        self.columns
            .values_mut()
            .map(|column| usize::from(column.clear(id)))
            .sum()
    }

    /// Copies every attribute of `src` onto `dest`. Attributes `src` lacks
    /// are left as they are on `dest`.
    pub fn copy_onto(&mut self, dest: ParticleId, src: ParticleId) {
        if dest == src {
            return;
        }
        let mut copied = false;
        for column in self.columns.values_mut() {
            copied |= column.copy_slot(dest, src);
        }
        if copied {
            self.bound = self.bound.max(dest.index() + 1);
        }
    }

    /// Makes `dest` carry exactly the attributes of `src`, with equal values.
    pub fn copy_replacing(&mut self, dest: ParticleId, src: ParticleId) {
        if dest == src {
            return;
        }
        let mut copied = false;
        for column in self.columns.values_mut() {
            if column.copy_slot(dest, src) {
                copied = true;
            } else {
                column.clear(dest);
            }
        }
        if copied {
            self.bound = self.bound.max(dest.index() + 1);
        }
    }

    /// Type names of every attribute `id` carries, for diagnostics.
    #[must_use]
    pub fn attribute_names(&self, id: ParticleId) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .columns
            .values()
            .filter(|column| column.has(id))
            .map(|column| column.attribute_name())
            .collect();
        names.sort_unstable();
        names
    }

    // =========================================================================
    // Composites
    // =========================================================================

    /// Stores `value` as its primitive attributes.
    pub fn set_from<C: Composite>(&mut self, id: ParticleId, value: C) {
        value.to_fields().insert_into(self, id);
    }

    /// Rebuilds a composite from its primitive attributes.
    ///
    /// # Panics
    ///
    /// Panics naming the first missing attribute if any is absent.
    #[must_use]
    pub fn get_as<C: Composite>(&self, id: ParticleId) -> C {
        match C::Fields::fetch_from(self, id) {
            Ok(fields) => C::from_fields(fields),
            Err(missing) => panic!(
                "particle {id} cannot be read as {}: no {missing} attribute",
                type_name::<C>()
            ),
        }
    }

    /// Rebuilds a composite, or `None` if any attribute is absent.
    #[must_use]
    pub fn try_get_as<C: Composite>(&self, id: ParticleId) -> Option<C> {
        C::Fields::fetch_from(self, id).ok().map(C::from_fields)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Calls `f` for every particle carrying all required attributes of `Q`,
    /// in ascending id order. Returns the number of particles visited.
    ///
    /// `Q` is a tuple of `&T`, `&mut T`, `Option<&T>` or `Option<&mut T>`.
    /// Optional entries never exclude a particle; a query made only of
    /// optional entries visits every id below [`bound`](Self::bound).
    ///
    /// The store is mutably borrowed for the whole call, so `f` cannot
    /// spawn or despawn. Collect ids and apply structural changes after.
    ///
    /// # Panics
    ///
    /// Panics if `Q` names the same attribute twice, or borrows a shared or
    /// presence-only column mutably.
    pub fn query<'s, Q, F>(&'s mut self, mut f: F) -> usize
    where
        Q: Query<'s>,
        F: FnMut(ParticleId, Q::Item),
    {
        self.check_mutable_layouts(&Q::mutable_types());
        let Some(matches) = self.matching(&Q::required_types()) else {
            return 0;
        };
        let mut cursors = Q::cursors(self);
        let mut visited = 0;
        for index in matches.iter() {
            if let Some(item) = Q::fetch(&mut cursors, index) {
                f(ParticleId::from_index(index), item);
                visited += 1;
            }
        }
        visited
    }

    /// Ids `query::<Q>` would visit, without borrowing any column.
    #[must_use]
    pub fn query_ids<'s, Q: Query<'s>>(&self) -> Vec<ParticleId> {
        self.matching(&Q::required_types())
            .map(|matches| matches.iter().map(ParticleId::from_index).collect())
            .unwrap_or_default()
    }

    /// Rejects `&mut` entries over broadcast columns before any column is
    /// borrowed, whether or not the query would match anything.
    fn check_mutable_layouts(&self, mutable: &[(TypeId, &'static str)]) {
        for (type_id, name) in mutable {
            if let Some(column) = self.columns.get(type_id) {
                let layout = column.layout();
                assert!(
                    layout == ColumnLayout::PerParticle,
                    "query borrows {name} mutably, but it is a broadcast column ({layout:?}); \
                     read it with `&{name}` or `Option<&{name}>`"
                );
            }
        }
    }

    /// Intersection of the presence sets of `required`, or `None` when one
    /// of them has no column at all.
    fn matching(&self, required: &[TypeId]) -> Option<PresenceBits> {
        let mut required = required.iter();
        let Some(first) = required.next() else {
            return Some(PresenceBits::filled(self.bound));
        };
        let mut matches = self.columns.get(first)?.presence().clone();
        for type_id in required {
            matches.intersect_with(self.columns.get(type_id)?.presence());
        }
        Some(matches)
    }

    /// Disjoint mutable borrows of up to `N` columns in one pass.
    ///
    /// # Panics
    ///
    /// Panics if a type appears twice in `wanted`.
    pub(crate) fn columns_disjoint_mut<const N: usize>(
        &mut self,
        wanted: [(TypeId, &'static str); N],
    ) -> [Option<&mut Box<dyn ErasedColumn>>; N] {
        for (i, (type_id, name)) in wanted.iter().enumerate() {
            assert!(
                wanted[i + 1..].iter().all(|(other, _)| other != type_id),
                "query requests {name} more than once"
            );
        }
        let mut out: [Option<&mut Box<dyn ErasedColumn>>; N] = std::array::from_fn(|_| None);
        for (type_id, column) in &mut self.columns {
            if let Some(slot) = wanted.iter().position(|(w, _)| w == type_id) {
                out[slot] = Some(column);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::attribute::{InverseMass, ParticleMeta, Position, Velocity};
    use sizzle_shared::Vec3;

    fn id(i: u32) -> ParticleId {
        ParticleId::new(i)
    }

    #[test]
    fn test_set_get_roundtrip() {
        let mut store = ComponentStore::new();
        assert!(!store.has::<Position>(id(3)));
        store.set(id(3), Position(Vec3::new(1.0, 2.0, 3.0)));
        assert!(store.has::<Position>(id(3)));
        assert_eq!(store.get::<Position>(id(3)).0, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(store.bound(), 4);

        store.get_mut::<Position>(id(3)).0.x = 9.0;
        assert_eq!(store.get::<Position>(id(3)).0.x, 9.0);

        assert!(store.remove::<Position>(id(3)).is_some());
        assert!(!store.has::<Position>(id(3)));
        assert!(store.try_get::<Position>(id(3)).is_none());
    }

    #[test]
    #[should_panic(expected = "Velocity")]
    fn test_get_absent_names_attribute() {
        let store = ComponentStore::new();
        let _ = store.get::<Velocity>(id(0));
    }

    #[test]
    fn test_clear_all_attributes() {
        let mut store = ComponentStore::new();
        store.set(id(0), Position(Vec3::X));
        store.set(id(0), Velocity(Vec3::Y));
        store.set(id(1), Velocity(Vec3::Z));
        assert_eq!(store.clear_all_attributes(id(0)), 2);
        assert!(store.attribute_names(id(0)).is_empty());
        assert!(store.has::<Velocity>(id(1)));
    }

    #[test]
    fn test_copy_onto_keeps_extra_attributes() {
        let mut store = ComponentStore::new();
        store.set(id(0), Position(Vec3::X));
        store.set(id(1), Position(Vec3::ZERO));
        store.set(id(1), Velocity(Vec3::Y));

        store.copy_onto(id(1), id(0));
        assert_eq!(store.get::<Position>(id(1)).0, Vec3::X);
        assert!(store.has::<Velocity>(id(1)));
    }

    #[test]
    fn test_copy_replacing_matches_source_exactly() {
        let mut store = ComponentStore::new();
        store.set(id(0), Position(Vec3::X));
        store.set(id(0), InverseMass(2.0));
        store.set(id(5), Velocity(Vec3::Y));

        store.copy_replacing(id(5), id(0));
        assert_eq!(store.attribute_names(id(5)), store.attribute_names(id(0)));
        assert_eq!(store.get::<InverseMass>(id(5)).0, 2.0);
        assert!(!store.has::<Velocity>(id(5)));
    }

    #[test]
    fn test_register_layout_sticks() {
        let mut store = ComponentStore::new();
        assert_eq!(store.register_shared::<InverseMass>(), ColumnLayout::Shared);
        assert_eq!(store.register_presence::<InverseMass>(), ColumnLayout::Shared);
        for i in 0..10 {
            store.set(id(i), InverseMass(0.5));
        }
        let column = store.column::<InverseMass>().map(AttributeColumn::slot_count);
        assert_eq!(column, Some(1));
    }

    #[test]
    fn test_query_reads_and_writes() {
        let mut store = ComponentStore::new();
        for i in 0..4 {
            store.set(id(i), Position(Vec3::ZERO));
            store.set(id(i), Velocity(Vec3::new(i as f32, 0.0, 0.0)));
        }
        store.remove::<Velocity>(id(2));

        let visited = store.query::<(&Velocity, &mut Position), _>(|_, (v, p)| {
            p.0 += v.0 * 2.0;
        });
        assert_eq!(visited, 3);
        assert_eq!(store.get::<Position>(id(3)).0.x, 6.0);
        assert_eq!(store.get::<Position>(id(2)).0, Vec3::ZERO);
    }

    #[test]
    fn test_query_missing_column_visits_nothing() {
        let mut store = ComponentStore::new();
        store.set(id(0), Position(Vec3::ZERO));
        let visited = store.query::<(&Position, &Velocity), _>(|_, _| {});
        assert_eq!(visited, 0);
    }

    #[test]
    fn test_query_optional_column() {
        let mut store = ComponentStore::new();
        store.set(id(0), Position(Vec3::ZERO));
        store.set(id(1), Position(Vec3::X));
        store.set(id(1), Velocity(Vec3::Y));

        let mut seen = Vec::new();
        store.query::<(&Position, Option<&Velocity>), _>(|id, (_, v)| {
            seen.push((id, v.is_some()));
        });
        assert_eq!(seen, vec![(id(0), false), (id(1), true)]);
    }

    #[test]
    fn test_query_over_shared_column() {
        let mut store = ComponentStore::new();
        store.register_shared::<ParticleMeta>();
        store.set(id(0), ParticleMeta::ALIVE);
        store.set(id(2), ParticleMeta::ALIVE);
        store.set(id(2), Position(Vec3::Z));

        let ids = store.query_ids::<(&ParticleMeta, &Position)>();
        assert_eq!(ids, vec![id(2)]);
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn test_query_duplicate_attribute_panics() {
        let mut store = ComponentStore::new();
        store.set(id(0), Position(Vec3::ZERO));
        store.query::<(&Position, &mut Position), _>(|_, _| {});
    }

    #[test]
    #[should_panic(expected = "broadcast column")]
    fn test_query_mut_shared_panics() {
        let mut store = ComponentStore::new();
        store.register_shared::<InverseMass>();
        store.set(id(0), InverseMass(1.0));
        store.query::<(&mut InverseMass,), _>(|_, _| {});
    }

    #[test]
    #[should_panic(expected = "broadcast column")]
    fn test_query_mut_presence_rejected_without_matches() {
        let mut store = ComponentStore::new();
        store.register_presence::<ParticleMeta>();
        store.set(id(0), ParticleMeta::ALIVE);
        // no particle carries Velocity, yet the borrow is still refused
        store.query::<(&Velocity, Option<&mut ParticleMeta>), _>(|_, _| {});
    }

    #[test]
    fn test_query_reads_broadcast_column() {
        let mut store = ComponentStore::new();
        store.register_shared::<InverseMass>();
        store.set(id(0), InverseMass(0.5));
        store.set(id(2), InverseMass(0.5));
        store.set(id(2), Position(Vec3::X));
        let mut seen = Vec::new();
        let visited = store.query::<(&InverseMass, Option<&mut Position>), _>(|i, (w, p)| {
            seen.push((i.raw(), w.0, p.is_some()));
        });
        assert_eq!(visited, 2);
        assert_eq!(seen, vec![(0, 0.5, false), (2, 0.5, true)]);
    }

    #[test]
    fn test_presence_only_values_are_shared() {
        let mut store = ComponentStore::new();
        store.register_presence::<InverseMass>();
        store.set(id(0), InverseMass(1.0));
        store.set(id(1), InverseMass(2.0));
        assert_eq!(store.get::<InverseMass>(id(0)).0, 2.0);
        assert_eq!(store.get::<InverseMass>(id(1)).0, 2.0);
        assert!(!store.has::<InverseMass>(id(2)));
    }
}
