//! Entity descriptors.
//!
//! Each entity is one small module: its table, labels, the fields its forms
//! show, and the `garde` shapes for create and update payloads. Handlers,
//! views, repositories and the client are generic over [`Entity`], so adding
//! an entity means adding a module here and a line in [`ALL`] and `routes`.

use garde::Validate;
use serde::{Serialize, de::DeserializeOwned};

pub mod channel;
pub mod message;
pub mod server;
pub mod user;

/// How a field is rendered in forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    LongText,
    Email,
}

/// A user-editable field of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self { name, label, kind, required: true }
    }

    pub const fn optional(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self { name, label, kind, required: false }
    }
}

/// A CRUD-managed, owner-scoped resource type.
pub trait Entity: Send + Sync + 'static {
    /// Table name, also the plural path segment (`/api/servers`).
    const TABLE: &'static str;
    /// Singular display name (`Server`).
    const LABEL: &'static str;
    /// Plural display name (`Servers`).
    const LABEL_PLURAL: &'static str;
    /// Field whose value titles a record in lists and detail pages.
    const TITLE_FIELD: &'static str;
    /// Editable fields, in form order.
    const FIELDS: &'static [FieldSpec];

    /// Create payload: required fields use garde's `required`.
    type Create: Validate<Context = ()> + DeserializeOwned + Serialize + Send + Sync + 'static;
    /// Update payload: the create shape with every field optional.
    type Update: Validate<Context = ()> + DeserializeOwned + Serialize + Send + Sync + 'static;
}

/// The non-generic face of an entity, for tables of entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub table: &'static str,
    pub label_plural: &'static str,
    pub fields: &'static [FieldSpec],
}

impl EntityDescriptor {
    pub const fn of<E: Entity>() -> Self {
        Self {
            table: E::TABLE,
            label_plural: E::LABEL_PLURAL,
            fields: E::FIELDS,
        }
    }

    /// Path of the entity's list page.
    pub fn href(&self) -> String {
        format!("/{}", self.table)
    }
}

/// Every entity served, in navigation order.
pub const ALL: [EntityDescriptor; 4] = [
    EntityDescriptor::of::<server::Server>(),
    EntityDescriptor::of::<channel::Channel>(),
    EntityDescriptor::of::<message::Message>(),
    EntityDescriptor::of::<user::UserProfile>(),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::RESERVED_COLUMNS;

    #[test]
    fn tables_are_unique_and_fields_are_not_reserved() {
        let mut tables: Vec<_> = ALL.iter().map(|e| e.table).collect();
        tables.sort();
        tables.dedup();
        assert_eq!(tables.len(), ALL.len());

        for entity in ALL {
            assert!(entity.fields.iter().any(|f| f.required), "{} has no required field", entity.table);
            for field in entity.fields {
                assert!(!RESERVED_COLUMNS.contains(&field.name), "{}.{}", entity.table, field.name);
            }
        }
    }
}
