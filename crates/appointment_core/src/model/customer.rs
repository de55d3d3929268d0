//! Customer record.

use serde::{Deserialize, Serialize};

/// A customer identified by email address.
///
/// `email` is the natural key. It must stay unchanged once the customer has
/// been stored; a different email addresses a different customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Customer {
    pub email: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

impl Customer {
    /// Creates a customer with no name attributes.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            firstname: None,
            lastname: None,
        }
    }

    /// Creates a customer with both name attributes set.
    pub fn with_name(
        email: impl Into<String>,
        firstname: impl Into<String>,
        lastname: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            firstname: Some(firstname.into()),
            lastname: Some(lastname.into()),
        }
    }

    /// Returns whether `email` can be used as a lookup key.
    pub fn has_key(&self) -> bool {
        !self.email.trim().is_empty()
    }
}
