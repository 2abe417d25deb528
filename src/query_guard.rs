//! Pattern-based safety checks for caller-supplied SQL.
//!
//! This is a syntactic safeguard, not a SQL parser: it can over-block
//! (a keyword inside a string literal) and under-block (an obfuscated
//! keyword). Callers rely on the exact accept/reject behavior, so the
//! rules must not be tightened.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryRejected {
    #[error("query is required")]
    Empty,

    #[error("only SELECT/WITH queries are allowed")]
    NotReadOnly,

    #[error("semicolon is not allowed (multi-statement blocked)")]
    MultiStatement,

    #[error("sql comments are not allowed")]
    Comment,

    #[error("blocked keyword detected: \"{0}\"")]
    BlockedKeyword(String),

    #[error("param name is empty")]
    EmptyParamName,

    #[error("param {0:?} must start with letter/_")]
    ParamNameBadStart(String),

    #[error("param {0:?} has invalid char")]
    ParamNameBadChar(String),
}

/// Write/DDL/admin keywords that are never allowed in proxied SQL.
/// Trailing spaces keep e.g. `updated_at` from matching `update `.
const BLOCKED_KEYWORDS: &[&str] = &[
    "insert ",
    "update ",
    "delete ",
    "merge ",
    "truncate ",
    "drop ",
    "alter ",
    "create ",
    "grant ",
    "revoke ",
    "exec ",
    "execute ",
    "backup ",
    "restore ",
    "dbcc ",
    "xp_",
    "sp_",
    "openrowset",
    "opendatasource",
    "bulk ",
];

/// Check that a caller-supplied statement is a single read-only query.
pub fn validate_read_only(query: &str) -> Result<(), QueryRejected> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(QueryRejected::Empty);
    }

    let low = trimmed.to_lowercase();

    if !(low.starts_with("select") || low.starts_with("with")) {
        return Err(QueryRejected::NotReadOnly);
    }

    if low.contains(';') {
        return Err(QueryRejected::MultiStatement);
    }
    if low.contains("--") || low.contains("/*") || low.contains("*/") {
        return Err(QueryRejected::Comment);
    }

    for keyword in BLOCKED_KEYWORDS {
        if low.contains(keyword) {
            return Err(QueryRejected::BlockedKeyword(keyword.trim().to_string()));
        }
    }

    Ok(())
}

/// Validate a named-parameter identifier: `^[A-Za-z_][A-Za-z0-9_]*$`.
pub fn validate_param_name(name: &str) -> Result<(), QueryRejected> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(QueryRejected::EmptyParamName),
        Some(first) => {
            if !(first.is_ascii_alphabetic() || first == '_') {
                return Err(QueryRejected::ParamNameBadStart(name.to_string()));
            }
        }
    }
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return Err(QueryRejected::ParamNameBadChar(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_select_and_with() {
        assert!(validate_read_only("select 1 as x").is_ok());
        assert!(validate_read_only("  SELECT DocEntry FROM ORDR").is_ok());
        assert!(validate_read_only("WITH t AS (SELECT 1 AS n) SELECT n FROM t").is_ok());
    }

    #[test]
    fn rejects_empty_query() {
        assert_eq!(validate_read_only("   "), Err(QueryRejected::Empty));
    }

    #[test]
    fn rejects_non_read_only() {
        assert_eq!(
            validate_read_only("update t set x=1"),
            Err(QueryRejected::NotReadOnly)
        );
        assert_eq!(
            validate_read_only("DELETE FROM ORDR"),
            Err(QueryRejected::NotReadOnly)
        );
    }

    #[test]
    fn rejects_statement_chaining() {
        assert_eq!(
            validate_read_only("select 1; select 2"),
            Err(QueryRejected::MultiStatement)
        );
    }

    #[test]
    fn rejects_comments() {
        assert_eq!(
            validate_read_only("select 1 -- hidden"),
            Err(QueryRejected::Comment)
        );
        assert_eq!(
            validate_read_only("select /* x */ 1"),
            Err(QueryRejected::Comment)
        );
    }

    #[test]
    fn rejects_blocked_keywords_by_name() {
        assert_eq!(
            validate_read_only("select 1 union all select 2 from openrowset('x','y','z')"),
            Err(QueryRejected::BlockedKeyword("openrowset".to_string()))
        );
        assert_eq!(
            validate_read_only("select * from t where exec ('x') = 1"),
            Err(QueryRejected::BlockedKeyword("exec".to_string()))
        );
        assert_eq!(
            validate_read_only("select sp_help from t"),
            Err(QueryRejected::BlockedKeyword("sp_".to_string()))
        );
    }

    #[test]
    fn known_limitation_keyword_inside_literal_still_blocks() {
        // Pattern matching, not parsing: a keyword inside a string
        // literal is rejected too. This behavior is intentional.
        assert_eq!(
            validate_read_only("select 'please update me' as msg"),
            Err(QueryRejected::BlockedKeyword("update".to_string()))
        );
    }

    #[test]
    fn keyword_needs_trailing_space_to_match() {
        assert!(validate_read_only("select updated_at from t").is_ok());
    }

    #[test]
    fn param_names() {
        assert!(validate_param_name("dateFrom").is_ok());
        assert!(validate_param_name("_x9").is_ok());
        assert_eq!(
            validate_param_name(""),
            Err(QueryRejected::EmptyParamName)
        );
        assert_eq!(
            validate_param_name("9lives"),
            Err(QueryRejected::ParamNameBadStart("9lives".to_string()))
        );
        assert_eq!(
            validate_param_name("bad-name"),
            Err(QueryRejected::ParamNameBadChar("bad-name".to_string()))
        );
    }
}
