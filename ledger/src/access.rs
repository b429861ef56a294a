//! Owner/verifier role set and the global halt switch.
//!
//! [`AccessControl`] is a plain value owned by the ledger. Every mutating
//! operation consults it explicitly, so authorization can be exercised in
//! isolation without building a whole ledger.

use std::collections::BTreeSet;

use carbon_types::AccountId;
use serde::{Deserialize, Serialize};

use crate::error::{InvalidArgument, LedgerError};

/// Role held by an identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The distinguished owner: full authority, implicit verifier capability.
    Owner,
    /// Registered verifier: may mint.
    Verifier,
    /// Any other identity: may hold, transfer and retire credits.
    Holder,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Verifier => "verifier",
            Self::Holder => "holder",
        }
    }

    pub fn can_mint(&self) -> bool {
        matches!(self, Self::Owner | Self::Verifier)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessControl {
    owner: AccountId,
    verifiers: BTreeSet<AccountId>,
    halted: bool,
}

impl AccessControl {
    /// A fresh role set: the given owner, no verifiers, not halted.
    pub fn new(owner: AccountId) -> Result<Self, LedgerError> {
        owner.validate().map_err(InvalidArgument::InvalidIdentity)?;
        Ok(Self {
            owner,
            verifiers: BTreeSet::new(),
            halted: false,
        })
    }

    pub(crate) fn from_parts(owner: AccountId, verifiers: BTreeSet<AccountId>, halted: bool) -> Self {
        Self {
            owner,
            verifiers,
            halted,
        }
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn verifiers(&self) -> &BTreeSet<AccountId> {
        &self.verifiers
    }

    pub fn is_owner(&self, who: &AccountId) -> bool {
        &self.owner == who
    }

    /// Explicit verifier registration. The owner is only reported here if it
    /// was registered explicitly; use [`AccessControl::can_mint`] for the
    /// effective capability.
    pub fn is_verifier(&self, who: &AccountId) -> bool {
        self.verifiers.contains(who)
    }

    pub fn can_mint(&self, who: &AccountId) -> bool {
        self.role_of(who).can_mint()
    }

    pub fn role_of(&self, who: &AccountId) -> Role {
        if self.is_owner(who) {
            Role::Owner
        } else if self.is_verifier(who) {
            Role::Verifier
        } else {
            Role::Holder
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Fails with [`LedgerError::Halted`] while the halt flag is set.
    pub fn ensure_active(&self) -> Result<(), LedgerError> {
        if self.halted {
            Err(LedgerError::Halted)
        } else {
            Ok(())
        }
    }

    pub fn require_owner(&self, caller: &AccountId, action: &'static str) -> Result<(), LedgerError> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized {
                caller: caller.clone(),
                action,
            })
        }
    }

    pub fn require_minter(&self, caller: &AccountId) -> Result<(), LedgerError> {
        if self.can_mint(caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized {
                caller: caller.clone(),
                action: "mint credits",
            })
        }
    }

    /// Preconditions of [`AccessControl::add_verifier`].
    pub fn check_add_verifier(&self, caller: &AccountId, who: &AccountId) -> Result<(), LedgerError> {
        self.require_owner(caller, "add verifiers")?;
        who.validate().map_err(InvalidArgument::InvalidIdentity)?;
        if self.verifiers.contains(who) {
            return Err(LedgerError::AlreadyInRole(who.clone()));
        }
        Ok(())
    }

    /// Preconditions of [`AccessControl::remove_verifier`].
    pub fn check_remove_verifier(&self, caller: &AccountId, who: &AccountId) -> Result<(), LedgerError> {
        self.require_owner(caller, "remove verifiers")?;
        if !self.verifiers.contains(who) {
            return Err(LedgerError::NotInRole(who.clone()));
        }
        Ok(())
    }

    /// Register a verifier. Adding an existing verifier is an error, not a no-op.
    pub fn add_verifier(&mut self, caller: &AccountId, who: &AccountId) -> Result<(), LedgerError> {
        self.check_add_verifier(caller, who)?;
        self.set_verifier(who, true);
        Ok(())
    }

    /// Deregister a verifier. Removing a non-verifier is an error.
    pub fn remove_verifier(&mut self, caller: &AccountId, who: &AccountId) -> Result<(), LedgerError> {
        self.check_remove_verifier(caller, who)?;
        self.set_verifier(who, false);
        Ok(())
    }

    pub(crate) fn set_verifier(&mut self, who: &AccountId, member: bool) {
        if member {
            self.verifiers.insert(who.clone());
        } else {
            self.verifiers.remove(who);
        }
    }

    pub(crate) fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    /// Active -> Halted.
    pub fn pause(&mut self, caller: &AccountId) -> Result<(), LedgerError> {
        self.require_owner(caller, "pause the ledger")?;
        self.ensure_active()?;
        self.halted = true;
        Ok(())
    }

    /// Halted -> Active.
    pub fn unpause(&mut self, caller: &AccountId) -> Result<(), LedgerError> {
        self.require_owner(caller, "unpause the ledger")?;
        if !self.halted {
            return Err(LedgerError::NotHalted);
        }
        self.halted = false;
        Ok(())
    }
}
