//! Id and name legality checks.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{TransformerError, TransformerResult};

/// Format: one or more digits, lowercase letters, hyphens, periods, or underscores.
const TRANSFORMER_ID_PATTERN: &str = r"^[0-9a-z\-._]+$";

static TRANSFORMER_ID_REGEX: OnceLock<Regex> = OnceLock::new();

fn transformer_id_regex() -> &'static Regex {
    TRANSFORMER_ID_REGEX
        .get_or_init(|| Regex::new(TRANSFORMER_ID_PATTERN).expect("invalid regex pattern"))
}

/// Validates a transformer id.
///
/// # Example
/// ```
/// use helios_transformers::identity::validate_id;
///
/// assert!(validate_id("dex2jar").is_ok());
/// assert!(validate_id("Dex2Jar").is_err());
/// ```
pub fn validate_id(id: &str) -> TransformerResult<()> {
    if id.is_empty() {
        return Err(TransformerError::invalid_identifier(id, "id must not be empty"));
    }
    if !transformer_id_regex().is_match(id) {
        return Err(TransformerError::invalid_identifier(
            id,
            "id must only contain lowercase letters, digits, '-', '.', or '_'",
        ));
    }
    Ok(())
}

/// Validates a transformer display name. Any non-empty string is accepted.
pub fn validate_name(name: &str) -> TransformerResult<()> {
    if name.is_empty() {
        return Err(TransformerError::invalid_identifier(name, "name must not be empty"));
    }
    Ok(())
}
