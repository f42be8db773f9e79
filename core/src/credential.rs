use std::fmt::{Debug, Formatter};

use crate::utils::Redact;

/// Credential pair for the crowdmap API.
///
/// The public key is embedded verbatim in every signature; the private key is
/// only ever used as the HMAC key and must never leave the process.
#[derive(Clone)]
pub struct Credential {
    /// Public key identifying the API consumer.
    pub public_key: String,
    /// Private key used to sign requests.
    pub private_key: String,
}

impl Credential {
    /// Create a new credential.
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
        }
    }

    /// Check if the credential is usable for signing.
    pub fn is_valid(&self) -> bool {
        !self.public_key.is_empty() && !self.private_key.is_empty()
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("public_key", &Redact::from(&self.public_key))
            .field("private_key", &Redact::from(&self.private_key))
            .finish()
    }
}
