use garde::Validate;
use serde::{Deserialize, Serialize};

use super::{Entity, FieldKind, FieldSpec};

/// A server in the dashboard.
pub struct Server;

/// The request payload for creating a server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateServer {
    #[garde(required, length(chars, min = 1, max = 100))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[garde(length(chars, max = 500))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The request payload for updating a server. Absent fields stay untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateServer {
    #[garde(length(chars, min = 1, max = 100))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[garde(length(chars, max = 500))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity for Server {
    const TABLE: &'static str = "servers";
    const LABEL: &'static str = "Server";
    const LABEL_PLURAL: &'static str = "Servers";
    const TITLE_FIELD: &'static str = "name";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("name", "Name", FieldKind::Text),
        FieldSpec::optional("description", "Description", FieldKind::LongText),
    ];

    type Create = CreateServer;
    type Update = UpdateServer;
}
