use garde::Validate;
use serde::{Deserialize, Serialize};

use super::{Entity, FieldKind, FieldSpec};

/// A user profile row managed by its owner.
///
/// Unrelated to the auth provider's accounts; the table just happens to be
/// called `users`.
pub struct UserProfile;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateUserProfile {
    #[garde(required, length(chars, min = 1, max = 100))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[garde(email)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[garde(length(chars, max = 1000))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateUserProfile {
    #[garde(length(chars, min = 1, max = 100))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[garde(custom(email_or_blank))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[garde(length(chars, max = 1000))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// An update may blank the address out; anything else must be an email.
fn email_or_blank(value: &Option<String>, _: &()) -> garde::Result {
    match value.as_deref() {
        None | Some("") => Ok(()),
        Some(email) => garde::rules::email::apply(&email, ()),
    }
}

impl Entity for UserProfile {
    const TABLE: &'static str = "users";
    const LABEL: &'static str = "User";
    const LABEL_PLURAL: &'static str = "Users";
    const TITLE_FIELD: &'static str = "display_name";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("display_name", "Display name", FieldKind::Text),
        FieldSpec::optional("email", "Email", FieldKind::Email),
        FieldSpec::optional("bio", "Bio", FieldKind::LongText),
    ];

    type Create = CreateUserProfile;
    type Update = UpdateUserProfile;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::payload::validate_value;
    use serde_json::json;

    #[test]
    fn email_is_checked_only_when_present() {
        assert!(validate_value::<CreateUserProfile>(json!({ "display_name": "Ada" })).is_ok());
        assert!(
            validate_value::<CreateUserProfile>(json!({ "display_name": "Ada", "email": "ada" }))
                .is_err()
        );
        assert!(validate_value::<UpdateUserProfile>(json!({ "email": "ada@example.com" })).is_ok());
    }

    #[test]
    fn updates_may_clear_the_email() {
        assert!(validate_value::<UpdateUserProfile>(json!({ "email": "" })).is_ok());
        assert!(validate_value::<UpdateUserProfile>(json!({ "email": "ada" })).is_err());
    }
}
