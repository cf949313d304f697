//! Partial-ID resolution and a small filter DSL for the beads system.
//!
//! The RPC surface and several `bd` commands accept a caller-supplied ID
//! that may be a prefix or unambiguous suffix of a full issue ID (e.g. `a1b2`
//! for `bd-a1b2c3`). [`resolve_partial_id`] is the single place that logic
//! lives; every accepting operation must route through it rather than
//! re-implement prefix matching.

pub mod filter;

use thiserror::Error;

/// Errors from partial-ID resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// No candidate matched the partial ID.
    #[error("no issue found matching '{0}'")]
    NotFound(String),

    /// More than one candidate matched; resolution requires an exact ID.
    #[error("'{partial}' is ambiguous: matches {candidates:?}")]
    Ambiguous {
        partial: String,
        candidates: Vec<String>,
    },
}

/// Resolve `partial` against the full set of known `ids`.
///
/// Matching order: exact match wins outright (even if other IDs share it as
/// a prefix); otherwise every ID that starts with `partial`, or ends with
/// `partial` as a suffix, is a candidate. Exactly one candidate resolves;
/// zero is [`QueryError::NotFound`]; more than one is
/// [`QueryError::Ambiguous`] -- no implicit disambiguation is performed, per
/// the external RPC contract.
pub fn resolve_partial_id<'a>(
    ids: impl IntoIterator<Item = &'a str>,
    partial: &str,
) -> Result<String, QueryError> {
    let ids: Vec<&str> = ids.into_iter().collect();

    if ids.iter().any(|id| *id == partial) {
        return Ok(partial.to_string());
    }

    let mut candidates: Vec<&str> = ids
        .iter()
        .copied()
        .filter(|id| id.starts_with(partial) || id.ends_with(partial))
        .collect();
    candidates.sort_unstable();
    candidates.dedup();

    match candidates.len() {
        0 => Err(QueryError::NotFound(partial.to_string())),
        1 => Ok(candidates[0].to_string()),
        _ => Err(QueryError::Ambiguous {
            partial: partial.to_string(),
            candidates: candidates.into_iter().map(str::to_string).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDS: &[&str] = &["bd-a1b2c3", "bd-a1b2d4", "bd-xyz999"];

    #[test]
    fn exact_match_wins() {
        assert_eq!(
            resolve_partial_id(IDS.iter().copied(), "bd-a1b2c3").unwrap(),
            "bd-a1b2c3"
        );
    }

    #[test]
    fn unique_prefix_resolves() {
        assert_eq!(
            resolve_partial_id(IDS.iter().copied(), "bd-xyz").unwrap(),
            "bd-xyz999"
        );
    }

    #[test]
    fn unique_suffix_resolves() {
        assert_eq!(
            resolve_partial_id(IDS.iter().copied(), "d4").unwrap(),
            "bd-a1b2d4"
        );
    }

    #[test]
    fn ambiguous_prefix_errors() {
        let err = resolve_partial_id(IDS.iter().copied(), "bd-a1b2").unwrap_err();
        match err {
            QueryError::Ambiguous { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("expected Ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn no_match_is_not_found() {
        let err = resolve_partial_id(IDS.iter().copied(), "zzz").unwrap_err();
        assert_eq!(err, QueryError::NotFound("zzz".to_string()));
    }
}
