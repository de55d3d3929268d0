//! Provider record and provider categories.
//!
//! # Invariants
//! - `id` is assigned by storage; `None` means the provider was never stored.
//! - Appointments point at their provider; the provider holds no list of them.

use serde::{Deserialize, Serialize};

/// Storage-assigned provider identifier.
pub type ProviderId = i64;

/// Fixed set of provider categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Doctor,
    Dentist,
    Hairdresser,
    Therapist,
}

impl ProviderType {
    /// All categories in declaration order.
    pub const ALL: [ProviderType; 4] = [
        ProviderType::Doctor,
        ProviderType::Dentist,
        ProviderType::Hairdresser,
        ProviderType::Therapist,
    ];

    /// Stable lowercase name used for persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Dentist => "dentist",
            Self::Hairdresser => "hairdresser",
            Self::Therapist => "therapist",
        }
    }

    /// Parses a persisted name back into a category.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

/// A service provider that owns appointments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: Option<ProviderId>,
    /// Serialized as `type` to match the stored column name.
    #[serde(rename = "type")]
    pub kind: ProviderType,
    pub address: String,
}

impl Provider {
    /// Creates a provider that has not been stored yet.
    pub fn new(kind: ProviderType, address: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            address: address.into(),
        }
    }

    /// Returns whether storage has assigned an id.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}
