// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Row Codecs
//!
//! Conversion between entities and table rows. Child sets are stored as a
//! JSON array of child names in the `packed_children` column; unpacking reads
//! each name back through the child layer's read-only store, in stored order.

use super::{EntityRef, ReadOnlyStore, StoreError, StoreResult};
use crate::db_interface::Row;
use crate::entity::{Composite, FieldError, Leaf, Record};

/// Entity/row conversion for one layer
pub trait RowCodec<E: Record>: Send + Sync {
    /// Encode an entity as a row
    fn pack(&self, entity: &E) -> StoreResult<Row>;

    /// Rebuild an entity from a row
    fn unpack(&self, row: &Row) -> StoreResult<E>;
}

/// Encode an ordered list of names
pub fn pack_names<'a>(names: impl IntoIterator<Item = &'a str>) -> StoreResult<String> {
    let names: Vec<&str> = names.into_iter().collect();
    Ok(serde_json::to_string(&names)?)
}

/// Decode an ordered list of names; an empty column decodes to no names
pub fn unpack_names(packed: &str) -> StoreResult<Vec<String>> {
    if packed.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(packed)?)
}

/// Row carrying the key, variant tag and scalar columns of an entity
fn base_row<E: Record>(entity: &E) -> Row {
    let mut row = Row::new(entity.name(), E::VARIANT);
    row.scalars = entity.scalars();
    row
}

/// Reject rows written for a different variant
fn check_variant<E: Record>(row: &Row) -> StoreResult<()> {
    if row.variant_tag != E::VARIANT {
        return Err(invalid_row::<E>(row, format!("variant tag {} does not match {}", row.variant_tag, E::VARIANT)));
    }
    Ok(())
}

fn invalid_row<E: Record>(row: &Row, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidRow {
        entity: EntityRef::new(E::TABLE, row.key.clone()),
        reason: reason.into(),
    }
}

fn field_error<E: Record>(row: &Row, err: FieldError) -> StoreError {
    invalid_row::<E>(row, err.to_string())
}

/// Codec for layers without children
#[derive(Debug, Clone, Copy, Default)]
pub struct LeafCodec;

impl<E: Leaf> RowCodec<E> for LeafCodec {
    fn pack(&self, entity: &E) -> StoreResult<Row> {
        Ok(base_row(entity))
    }

    fn unpack(&self, row: &Row) -> StoreResult<E> {
        check_variant::<E>(row)?;
        E::from_scalars(row.key.clone(), &row.scalars).map_err(|err| field_error::<E>(row, err))
    }
}

/// Codec for layers owning children, resolving them through the child layer
pub struct CompositeCodec<E: Composite> {
    children: ReadOnlyStore<E::Child>,
}

impl<E: Composite> CompositeCodec<E> {
    pub fn new(children: ReadOnlyStore<E::Child>) -> Self {
        Self { children }
    }
}

impl<E: Composite> RowCodec<E> for CompositeCodec<E> {
    fn pack(&self, entity: &E) -> StoreResult<Row> {
        let packed = pack_names(entity.children().iter().map(|child| child.name()))?;
        Ok(base_row(entity).with_packed_children(packed))
    }

    fn unpack(&self, row: &Row) -> StoreResult<E> {
        check_variant::<E>(row)?;
        let names = unpack_names(&row.packed_children).map_err(|err| invalid_row::<E>(row, format!("packed children: {err}")))?;

        // Missing children come back as the child layer's placeholder
        let children = names.iter().map(|name| self.children.read(name)).collect();

        E::from_parts(row.key.clone(), &row.scalars, children).map_err(|err| field_error::<E>(row, err))
    }
}
