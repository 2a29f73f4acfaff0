// SPDX-License-Identifier: Apache-2.0

//! Facet contracts.
//!
//! A contract names the members a facet of a given role must expose. The
//! builder enforces the processor contract after facet initialization, so a
//! custom processor facet that forgets part of the dispatch surface fails the
//! build instead of failing the first message.

use thiserror::Error;

use crate::facet::Facet;
use crate::kinds;

/// Errors raised by contract enforcement.
#[derive(Debug, Error)]
pub enum ContractError {
    /// The facet lacks required callable members.
    #[error("contract '{contract}' violation on facet '{kind}': missing required methods: {missing}")]
    MissingMethods {
        /// Contract name.
        contract: String,
        /// Offending facet kind.
        kind: String,
        /// Comma-separated missing method names.
        missing: String,
    },
    /// The facet lacks required members.
    #[error("contract '{contract}' violation on facet '{kind}': missing required members: {missing}")]
    MissingMembers {
        /// Contract name.
        contract: String,
        /// Offending facet kind.
        kind: String,
        /// Comma-separated missing member names.
        missing: String,
    },
}

/// Required surface of a facet role.
#[derive(Debug, Clone, Default)]
pub struct FacetContract {
    /// Contract name, used in error messages.
    pub name: String,
    /// Callable members the facet must expose.
    pub required_methods: Vec<String>,
    /// Members (of any shape) the facet must expose.
    pub required_members: Vec<String>,
}

impl FacetContract {
    /// Creates an empty contract with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the required callable members.
    #[must_use]
    pub fn methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_methods = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the required members of any shape.
    #[must_use]
    pub fn members<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_members = names.into_iter().map(Into::into).collect();
        self
    }

    /// Checks `facet` against the contract.
    pub fn enforce(&self, facet: &Facet) -> Result<(), ContractError> {
        let missing_methods: Vec<&str> = self
            .required_methods
            .iter()
            .filter(|m| !facet.has_method(m))
            .map(String::as_str)
            .collect();
        if !missing_methods.is_empty() {
            return Err(ContractError::MissingMethods {
                contract: self.name.clone(),
                kind: facet.kind().to_owned(),
                missing: missing_methods.join(", "),
            });
        }

        let missing_members: Vec<&str> = self
            .required_members
            .iter()
            .filter(|m| !facet.has_member(m))
            .map(String::as_str)
            .collect();
        if !missing_members.is_empty() {
            return Err(ContractError::MissingMembers {
                contract: self.name.clone(),
                kind: facet.kind().to_owned(),
                missing: missing_members.join(", "),
            });
        }
        Ok(())
    }
}

/// The mandatory processor surface: accept, per-message, tick, immediate.
#[must_use]
pub fn processor_contract() -> FacetContract {
    FacetContract::new(kinds::PROCESSOR).methods([
        "accept",
        "processMessage",
        "processTick",
        "processImmediately",
    ])
}
