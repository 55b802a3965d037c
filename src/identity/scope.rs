//! Scope strings
//!
//! A scope is the identity boundary an adapter answers for:
//! `{account}.{region}`, bare `{account}` for account-global resources,
//! or the literal `global` for provider-global ones.

use crate::error::QueryError;

/// Scope used by resources that are global across all accounts
pub const GLOBAL_SCOPE: &str = "global";

/// Format an account and region into a scope string.
pub fn format_scope(account_id: &str, region: &str) -> String {
    if region.is_empty() {
        account_id.to_string()
    } else {
        format!("{}.{}", account_id, region)
    }
}

/// Split a scope back into account and optional region.
///
/// Splits on the first `.` only; region names never contain dots.
pub fn parse_scope(scope: &str) -> (&str, Option<&str>) {
    match scope.split_once('.') {
        Some((account, region)) if !region.is_empty() => (account, Some(region)),
        Some((account, _)) => (account, None),
        None => (scope, None),
    }
}

/// Fail with `NOSCOPE` unless `requested` is exactly `actual`.
pub fn validate_scope(requested: &str, actual: &str) -> Result<(), QueryError> {
    if requested == actual {
        return Ok(());
    }
    Err(QueryError::no_scope(format!(
        "requested scope {} does not match adapter scope {}",
        requested, actual
    ))
    .with_scope(requested))
}
