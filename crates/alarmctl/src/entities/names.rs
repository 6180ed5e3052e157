//! Name rules shared by namespaces, clusters and secrets.

use crate::errors::{ConsoleError, ConsoleResult};

/// Separator between the parts of a check identity (`<type>__<namespace>__<cluster>`).
pub const IDENTITY_DELIMITER: &str = "__";

/// Validate a namespace, cluster or secret name.
///
/// Names become file stems and identity segments, so they are limited to
/// ASCII alphanumerics, `-` and `_`, and may not contain the identity delimiter.
pub fn validate_name(kind: &'static str, name: &str) -> ConsoleResult<()> {
    let invalid = |reason: &str| ConsoleError::InvalidName {
        kind,
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid("only ASCII letters, digits, '-' and '_' are allowed"));
    }
    if name.contains(IDENTITY_DELIMITER) {
        return Err(invalid("'__' is reserved as the check identity delimiter"));
    }
    Ok(())
}
