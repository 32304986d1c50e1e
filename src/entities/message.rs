use garde::Validate;
use serde::{Deserialize, Serialize};

use super::{Entity, FieldKind, FieldSpec};

pub struct Message;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateMessage {
    #[garde(length(chars, max = 200))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[garde(required, length(chars, min = 1, max = 4000))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateMessage {
    #[garde(length(chars, max = 200))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[garde(length(chars, min = 1, max = 4000))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Entity for Message {
    const TABLE: &'static str = "messages";
    const LABEL: &'static str = "Message";
    const LABEL_PLURAL: &'static str = "Messages";
    const TITLE_FIELD: &'static str = "subject";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::optional("subject", "Subject", FieldKind::Text),
        FieldSpec::required("content", "Content", FieldKind::LongText),
    ];

    type Create = CreateMessage;
    type Update = UpdateMessage;
}
