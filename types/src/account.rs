//! Opaque account identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// An account identity: an opaque, comparable key.
///
/// Identities are not pre-registered; any well-formed key may hold credits.
/// The ledger never interprets the key beyond equality and ordering, so it can
/// carry an EVM-style hex address, a wallet public key, or an internal user id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Maximum identity length in characters.
    pub const MAX_LEN: usize = 128;

    /// Wrap a raw string without validation.
    ///
    /// Operations that accept an identity as an argument check it with
    /// [`AccountId::validate`] before touching any state.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Parse and validate an identity.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let id = Self(raw.to_string());
        id.validate()?;
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The null identity: an empty key, or a hex key made only of zeros
    /// (`0x0`, `0x0000…0000`). It can never own or receive credits.
    pub fn is_null(&self) -> bool {
        let body = self
            .0
            .strip_prefix("0x")
            .or_else(|| self.0.strip_prefix("0X"))
            .unwrap_or(&self.0);
        body.is_empty() || body.bytes().all(|b| b == b'0')
    }

    pub fn validate(&self) -> Result<(), TypesError> {
        if self.0.is_empty() {
            return Err(TypesError::EmptyAccountId);
        }
        if self.0.chars().count() > Self::MAX_LEN {
            return Err(TypesError::AccountIdTooLong { max: Self::MAX_LEN });
        }
        if let Some(c) = self.0.chars().find(|c| !c.is_ascii_graphic()) {
            return Err(TypesError::InvalidAccountChar(c));
        }
        if self.is_null() {
            return Err(TypesError::NullAccountId);
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
