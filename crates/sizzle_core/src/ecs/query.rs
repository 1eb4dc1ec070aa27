//! # Attribute Queries
//!
//! A query is a tuple of attribute references. The store intersects the
//! presence bitsets of every required entry, then walks the surviving ids
//! in ascending order, advancing one cursor per column in lockstep.
//!
//! | Entry | Requires presence | Yields |
//! |---|---|---|
//! | `&T` | yes | `&T` |
//! | `&mut T` | yes | `&mut T` |
//! | `Option<&T>` | no | `Option<&T>` |
//! | `Option<&mut T>` | no | `Option<&mut T>` |

use std::any::{type_name, TypeId};

use super::attribute::Attribute;
use super::column::{AttributeColumn, ColumnCursor, ColumnCursorMut, ErasedColumn};
use super::store::ComponentStore;

/// One entry of a query tuple.
pub trait QueryParam<'s> {
    /// Reference handed to the callback.
    type Item;
    /// Per-column iteration state.
    type Cursor;
    /// Whether a particle lacking the attribute is skipped.
    const REQUIRED: bool;
    /// Whether the entry hands out `&mut`.
    const MUTABLE: bool;

    /// Attribute type this entry reads.
    fn attribute_type() -> TypeId;
    /// Attribute type name, for diagnostics.
    fn attribute_name() -> &'static str;
    /// Builds the cursor; `column` is `None` when no column exists yet.
    fn cursor(column: Option<&'s mut Box<dyn ErasedColumn>>) -> Self::Cursor;
    /// Item for `index`, or `None` to skip this particle.
    fn fetch(cursor: &mut Self::Cursor, index: usize) -> Option<Self::Item>;
}

fn typed<'a, T: Attribute>(column: &'a (dyn ErasedColumn + 'static)) -> &'a AttributeColumn<T> {
    match column.as_any().downcast_ref() {
        Some(typed) => typed,
        None => unreachable!("column keyed by {} holds another type", type_name::<T>()),
    }
}

fn typed_mut<'a, T: Attribute>(column: &'a mut (dyn ErasedColumn + 'static)) -> &'a mut AttributeColumn<T> {
    match column.as_any_mut().downcast_mut() {
        Some(typed) => typed,
        None => unreachable!("column keyed by {} holds another type", type_name::<T>()),
    }
}

impl<'s, 'r, T: Attribute> QueryParam<'s> for &'r T {
    type Item = &'s T;
    type Cursor = Option<ColumnCursor<'s, T>>;
    const REQUIRED: bool = true;
    const MUTABLE: bool = false;

    fn attribute_type() -> TypeId {
        TypeId::of::<T>()
    }

    fn attribute_name() -> &'static str {
        type_name::<T>()
    }

    fn cursor(column: Option<&'s mut Box<dyn ErasedColumn>>) -> Self::Cursor {
        column.map(|column| {
            let column: &'s Box<dyn ErasedColumn> = column;
            typed::<T>(&**column).cursor()
        })
    }

    #[inline]
    fn fetch(cursor: &mut Self::Cursor, index: usize) -> Option<Self::Item> {
        cursor.as_mut()?.seek(index)
    }
}

impl<'s, 'r, T: Attribute> QueryParam<'s> for &'r mut T {
    type Item = &'s mut T;
    type Cursor = Option<ColumnCursorMut<'s, T>>;
    const REQUIRED: bool = true;
    const MUTABLE: bool = true;

    fn attribute_type() -> TypeId {
        TypeId::of::<T>()
    }

    fn attribute_name() -> &'static str {
        type_name::<T>()
    }

    fn cursor(column: Option<&'s mut Box<dyn ErasedColumn>>) -> Self::Cursor {
        column.map(|column| typed_mut::<T>(&mut **column).cursor_mut())
    }

    #[inline]
    fn fetch(cursor: &mut Self::Cursor, index: usize) -> Option<Self::Item> {
        cursor.as_mut()?.seek(index)
    }
}

impl<'s, 'r, T: Attribute> QueryParam<'s> for Option<&'r T> {
    type Item = Option<&'s T>;
    type Cursor = Option<ColumnCursor<'s, T>>;
    const REQUIRED: bool = false;
    const MUTABLE: bool = false;

    fn attribute_type() -> TypeId {
        TypeId::of::<T>()
    }

    fn attribute_name() -> &'static str {
        type_name::<T>()
    }

    fn cursor(column: Option<&'s mut Box<dyn ErasedColumn>>) -> Self::Cursor {
        <&'r T as QueryParam<'s>>::cursor(column)
    }

    #[inline]
    fn fetch(cursor: &mut Self::Cursor, index: usize) -> Option<Self::Item> {
        Some(cursor.as_mut().and_then(|c| c.seek(index)))
    }
}

impl<'s, 'r, T: Attribute> QueryParam<'s> for Option<&'r mut T> {
    type Item = Option<&'s mut T>;
    type Cursor = Option<ColumnCursorMut<'s, T>>;
    const REQUIRED: bool = false;
    const MUTABLE: bool = true;

    fn attribute_type() -> TypeId {
        TypeId::of::<T>()
    }

    fn attribute_name() -> &'static str {
        type_name::<T>()
    }

    fn cursor(column: Option<&'s mut Box<dyn ErasedColumn>>) -> Self::Cursor {
        <&'r mut T as QueryParam<'s>>::cursor(column)
    }

    #[inline]
    fn fetch(cursor: &mut Self::Cursor, index: usize) -> Option<Self::Item> {
        Some(cursor.as_mut().and_then(|c| c.seek(index)))
    }
}

/// A tuple of [`QueryParam`]s, run by [`ComponentStore::query`].
pub trait Query<'s> {
    /// Tuple of references handed to the callback.
    type Item;
    /// Tuple of cursors.
    type Cursors;

    /// Attribute types whose presence is required.
    fn required_types() -> Vec<TypeId>;
    /// Attribute types borrowed mutably, with their names.
    fn mutable_types() -> Vec<(TypeId, &'static str)>;
    /// Borrows every requested column from the store.
    fn cursors(store: &'s mut ComponentStore) -> Self::Cursors;
    /// Items for `index`, or `None` when a required attribute is absent.
    fn fetch(cursors: &mut Self::Cursors, index: usize) -> Option<Self::Item>;
}

macro_rules! impl_query {
    ($(($P:ident, $c:ident)),+) => {
        impl<'s, $($P: QueryParam<'s>),+> Query<'s> for ($($P,)+) {
            type Item = ($(<$P as QueryParam<'s>>::Item,)+);
            type Cursors = ($(<$P as QueryParam<'s>>::Cursor,)+);

            fn required_types() -> Vec<TypeId> {
                let mut required = Vec::new();
                $(
                    if <$P as QueryParam<'s>>::REQUIRED {
                        required.push(<$P as QueryParam<'s>>::attribute_type());
                    }
                )+
                required
            }

            fn mutable_types() -> Vec<(TypeId, &'static str)> {
                let mut mutable = Vec::new();
                $(
                    if <$P as QueryParam<'s>>::MUTABLE {
                        mutable.push((
                            <$P as QueryParam<'s>>::attribute_type(),
                            <$P as QueryParam<'s>>::attribute_name(),
                        ));
                    }
                )+
                mutable
            }

            fn cursors(store: &'s mut ComponentStore) -> Self::Cursors {
                let [$($c),+] = store.columns_disjoint_mut([$((
                    <$P as QueryParam<'s>>::attribute_type(),
                    <$P as QueryParam<'s>>::attribute_name(),
                )),+]);
                ($(<$P as QueryParam<'s>>::cursor($c),)+)
            }

            #[inline]
            fn fetch(cursors: &mut Self::Cursors, index: usize) -> Option<Self::Item> {
                let ($($c,)+) = cursors;
                Some(($(<$P as QueryParam<'s>>::fetch($c, index)?,)+))
            }
        }
    };
}

impl_query!((A, a));
impl_query!((A, a), (B, b));
impl_query!((A, a), (B, b), (C, c));
impl_query!((A, a), (B, b), (C, c), (D, d));
impl_query!((A, a), (B, b), (C, c), (D, d), (E, e));
impl_query!((A, a), (B, b), (C, c), (D, d), (E, e), (F, f));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::attribute::{Force, InverseMass, Position, Velocity};
    use crate::ecs::id::ParticleId;
    use sizzle_shared::Vec3;

    /// Five particles with overlapping attribute subsets:
    ///
    /// | id | Position | Velocity | InverseMass | Force |
    /// |----|----------|----------|-------------|-------|
    /// | 0  | x        | x        | x           |       |
    /// | 1  | x        |          | x           | x     |
    /// | 2  |          | x        | x           | x     |
    /// | 3  | x        | x        | x           | x     |
    /// | 4  | x        | x        |             | x     |
    fn fixture() -> ComponentStore {
        let mut store = ComponentStore::new();
        let rows: [(bool, bool, bool, bool); 5] = [
            (true, true, true, false),
            (true, false, true, true),
            (false, true, true, true),
            (true, true, true, true),
            (true, true, false, true),
        ];
        for (i, (pos, vel, mass, force)) in rows.into_iter().enumerate() {
            let id = ParticleId::from_index(i);
            if pos {
                store.set(id, Position(Vec3::ZERO));
            }
            if vel {
                store.set(id, Velocity(Vec3::X));
            }
            if mass {
                store.set(id, InverseMass(1.0));
            }
            if force {
                store.set(id, Force(Vec3::ZERO));
            }
        }
        store
    }

    fn visited<'s, Q: Query<'s>>(store: &'s mut ComponentStore) -> Vec<u32> {
        let mut ids = Vec::new();
        store.query::<Q, _>(|id, _| ids.push(id.raw()));
        ids
    }

    #[test]
    fn test_query_is_and_of_presence() {
        let mut store = fixture();
        assert_eq!(visited::<(&Position,)>(&mut store), vec![0, 1, 3, 4]);
        assert_eq!(visited::<(&Position, &Velocity)>(&mut store), vec![0, 3, 4]);
        assert_eq!(
            visited::<(&Position, &Velocity, &InverseMass)>(&mut store),
            vec![0, 3]
        );
        assert_eq!(
            visited::<(&Position, &mut Velocity, &InverseMass, &mut Force)>(&mut store),
            vec![3]
        );
        assert_eq!(visited::<(&Velocity, &mut Force)>(&mut store), vec![2, 3, 4]);
    }

    #[test]
    fn test_optional_entries_do_not_filter() {
        let mut store = fixture();
        assert_eq!(
            visited::<(&InverseMass, Option<&mut Force>)>(&mut store),
            vec![0, 1, 2, 3]
        );
        assert_eq!(
            visited::<(Option<&Position>, Option<&Force>)>(&mut store),
            vec![0, 1, 2, 3, 4]
        );
    }

    #[test]
    fn test_query_count_matches_ids() {
        let mut store = fixture();
        let ids = store.query_ids::<(&Velocity, &InverseMass)>();
        let count = store.query::<(&Velocity, &InverseMass), _>(|_, _| {});
        assert_eq!(ids.len(), count);
        assert_eq!(ids, vec![ParticleId::new(0), ParticleId::new(2), ParticleId::new(3)]);
    }

    #[test]
    fn test_six_way_query() {
        let mut store = fixture();
        let id = ParticleId::new(3);
        store.set(id, crate::ecs::attribute::Torque(Vec3::ZERO));
        store.set(id, crate::ecs::attribute::PreviousPosition(Vec3::ZERO));
        let count = store.query::<(
            &Position,
            &Velocity,
            &InverseMass,
            &mut Force,
            &crate::ecs::attribute::Torque,
            &mut crate::ecs::attribute::PreviousPosition,
        ), _>(|_, (p, v, w, f, _, prev)| {
            f.0 = v.0 * w.0;
            prev.0 = p.0;
        });
        assert_eq!(count, 1);
        assert_eq!(store.get::<Force>(id).0, Vec3::X);
    }
}
