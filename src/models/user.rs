use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated principal as reported by the auth provider.
///
/// Provider payloads carry many more fields; only the ones this service
/// relies on are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// The provider's user id, stamped into `user_id` on every owned row.
    pub id: Uuid,
    /// The user's email address, if the provider exposes one.
    #[serde(default)]
    pub email: Option<String>,
}
