use garde::Validate;
use serde::{Deserialize, Serialize};

use super::{Entity, FieldKind, FieldSpec};

pub struct Channel;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateChannel {
    #[garde(required, length(chars, min = 1, max = 100))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[garde(length(chars, max = 250))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateChannel {
    #[garde(length(chars, min = 1, max = 100))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[garde(length(chars, max = 250))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl Entity for Channel {
    const TABLE: &'static str = "channels";
    const LABEL: &'static str = "Channel";
    const LABEL_PLURAL: &'static str = "Channels";
    const TITLE_FIELD: &'static str = "name";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("name", "Name", FieldKind::Text),
        FieldSpec::optional("topic", "Topic", FieldKind::Text),
    ];

    type Create = CreateChannel;
    type Update = UpdateChannel;
}
