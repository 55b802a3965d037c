//! Fully-qualified resource identifiers
//!
//! Format: `scheme:partition:service:region:account:resource`. The
//! resource component may itself contain `:` and `/`.

use super::scope::format_scope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SECTIONS: usize = 6;

/// Reasons an identifier fails to parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier {input:?} has {found} sections, expected 6")]
    TooFewSections { input: String, found: usize },

    #[error("identifier {input:?} has an empty {section} section")]
    EmptySection { input: String, section: &'static str },
}

/// A parsed resource identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub scheme: String,
    pub partition: String,
    pub service: String,
    /// Empty for region-less resources
    pub region: String,
    /// Empty for account-less resources
    pub account_id: String,
    pub resource: String,
}

impl Identifier {
    /// Parse an identifier string.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        let parts: Vec<&str> = input.splitn(SECTIONS, ':').collect();
        if parts.len() < SECTIONS {
            return Err(IdentifierError::TooFewSections {
                input: input.to_string(),
                found: parts.len(),
            });
        }

        let required = [
            ("scheme", parts[0]),
            ("partition", parts[1]),
            ("service", parts[2]),
            ("resource", parts[5]),
        ];
        for (section, value) in required {
            if value.is_empty() {
                return Err(IdentifierError::EmptySection {
                    input: input.to_string(),
                    section,
                });
            }
        }

        Ok(Self {
            scheme: parts[0].to_string(),
            partition: parts[1].to_string(),
            service: parts[2].to_string(),
            region: parts[3].to_string(),
            account_id: parts[4].to_string(),
            resource: parts[5].to_string(),
        })
    }

    fn type_separator(&self) -> Option<usize> {
        self.resource.find(['/', ':'])
    }

    /// The resource with its leading type token removed.
    ///
    /// `task-definition/app:1` yields `app:1`; a resource without any
    /// separator is its own id.
    pub fn resource_id(&self) -> &str {
        match self.type_separator() {
            Some(idx) => &self.resource[idx + 1..],
            None => &self.resource,
        }
    }

    /// The leading type token of the resource, if there is one
    pub fn resource_type(&self) -> Option<&str> {
        self.type_separator().map(|idx| &self.resource[..idx])
    }

    /// Scope this identifier belongs to
    pub fn scope(&self) -> String {
        format_scope(&self.account_id, &self.region)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}",
            self.scheme, self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

/// Parse a fully-qualified identifier.
pub fn parse_identifier(input: &str) -> Result<Identifier, IdentifierError> {
    Identifier::parse(input)
}
