use garde::Validate;
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::baas::Credentials;

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Login payload. Only presence is checked; the provider judges the rest.
#[derive(Deserialize, Validate, Zeroize, ZeroizeOnDrop)]
pub struct SignInInput {
    #[garde(length(min = 1, max = 320))]
    #[serde(default)]
    pub email: String,
    #[garde(length(min = 1, max = 128))]
    #[serde(default)]
    pub password: String,
}

/// Sign-up payload.
#[derive(Deserialize, Validate, Zeroize, ZeroizeOnDrop)]
pub struct SignUpInput {
    #[garde(email)]
    #[serde(default)]
    pub email: String,
    #[garde(length(min = 6, max = 128))]
    #[serde(default)]
    pub password: String,
}

fn credentials(email: &str, password: &str) -> Credentials {
    Credentials {
        email: email.trim().to_string(),
        password: Zeroizing::new(password.to_string()),
    }
}

impl SignInInput {
    pub fn credentials(&self) -> Credentials {
        credentials(&self.email, &self.password)
    }
}

impl SignUpInput {
    pub fn credentials(&self) -> Credentials {
        credentials(&self.email, &self.password)
    }
}
