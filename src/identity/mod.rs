//! Identifier and scope utilities

mod identifier;
mod scope;

pub use identifier::{parse_identifier, Identifier, IdentifierError};
pub use scope::{format_scope, parse_scope, validate_scope, GLOBAL_SCOPE};
