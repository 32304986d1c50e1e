use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::baas::Document;
use crate::error::{AppError, Result};

/// Columns owned by the service, never taken from a request body.
pub const RESERVED_COLUMNS: [&str; 4] = ["id", "user_id", "created_at", "updated_at"];

/// An owner-scoped entity row.
///
/// The common columns are typed; entity-specific fields are kept as JSON so
/// one record type serves every entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The unique identifier for the row.
    pub id: Uuid,
    /// The ID of the user who owns the row.
    pub user_id: Uuid,
    /// The timestamp when the row was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the row was last updated.
    pub updated_at: DateTime<Utc>,
    /// Entity fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// A field rendered as display text, `None` when absent or null.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl TryFrom<Document> for Record {
    type Error = AppError;

    fn try_from(document: Document) -> Result<Self> {
        serde_json::from_value(Value::Object(document))
            .map_err(|e| AppError::Internal(format!("Malformed row from store: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_split_into_common_columns_and_fields() {
        let id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let row = json!({
            "id": id,
            "user_id": owner,
            "created_at": "2024-03-01T10:00:00.000001+00:00",
            "updated_at": "2024-03-01T10:00:00Z",
            "name": "Alpha",
            "description": null,
        });
        let Value::Object(document) = row else { unreachable!() };

        let record = Record::try_from(document).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.user_id, owner);
        assert_eq!(record.text("name").as_deref(), Some("Alpha"));
        assert_eq!(record.text("description"), None);
        assert_eq!(record.text("missing"), None);
        assert!(!record.fields.contains_key("id"));
    }

    #[test]
    fn rows_without_owner_are_rejected() {
        let Value::Object(document) = json!({ "id": Uuid::new_v4() }) else { unreachable!() };
        assert!(matches!(Record::try_from(document), Err(AppError::Internal(_))));
    }
}
