//! Identity model.
//!
//! Exactly one [`Identity`] is active per process. The auth hydrator is its
//! only writer; every other component reads projections of it and must not
//! re-derive user or token state from storage on its own.

use serde::{Deserialize, Serialize};

use crate::types::email::Email;
use crate::types::id::CustomerId;
use crate::types::token::AuthToken;

/// Credentials for an authenticated customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Upstream customer ID.
    pub customer_id: CustomerId,
    /// Customer email; also the abandoned-cart recovery key.
    pub email: Email,
    /// Bearer token for customer API calls.
    pub token: AuthToken,
}

/// The resolved identity for this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    /// No customer session.
    Guest,
    /// A signed-in customer.
    Customer(Credentials),
}

impl Identity {
    /// Whether this identity is an authenticated customer.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Customer(_))
    }

    /// The customer credentials, if authenticated.
    #[must_use]
    pub const fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::Customer(credentials) => Some(credentials),
            Self::Guest => None,
        }
    }

    /// The bearer token, if authenticated.
    #[must_use]
    pub const fn token(&self) -> Option<&AuthToken> {
        match self {
            Self::Customer(credentials) => Some(&credentials.token),
            Self::Guest => None,
        }
    }

    /// The recovery key for this identity: the customer email when
    /// authenticated, `None` for guests (the engine substitutes an
    /// anonymous session key).
    #[must_use]
    pub fn recovery_key(&self) -> Option<&str> {
        self.credentials().map(|c| c.email.as_str())
    }
}
