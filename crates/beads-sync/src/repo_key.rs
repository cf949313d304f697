//! Repo-key sanitization for multi-repo metadata namespacing.
//!
//! Each repo gets its own `jsonl_content_hash:<repo_key>` metadata entry so
//! a single store can track integrity state across more than one journal.
//! The raw repo identifier (often a filesystem path or a `org/name` slug)
//! is lowercased and every character outside `[a-z0-9_.-]` is replaced with
//! `_`, not just colons, since paths on Windows or URLs can carry a wider
//! range of punctuation than the naive "escape the separator" approach
//! would catch.

/// Sanitizes a raw repo identifier into a safe metadata-key component.
pub fn sanitize_repo_key(raw: &str) -> String {
    raw.chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Builds a metadata key, optionally suffixed with a sanitized repo key.
///
/// With `repo = None` the bare key is used (single-repo stores, the common
/// case); with `repo = Some(r)` the key becomes `<base>:<sanitized(r)>` so a
/// store tracking more than one journal keeps them from colliding.
pub fn metadata_key(base: &str, repo: Option<&str>) -> String {
    match repo {
        Some(r) => format!("{base}:{}", sanitize_repo_key(r)),
        None => base.to_string(),
    }
}

/// Metadata key holding the journal's last-verified content hash.
pub const JSONL_CONTENT_HASH: &str = "jsonl_content_hash";
/// Metadata key holding the timestamp of the last successful import.
pub const LAST_IMPORT_TIME: &str = "last_import_time";
/// Metadata key holding the per-issue content hashes as of the last export.
pub const EXPORT_HASHES: &str = "export_hashes";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_replaces_punctuation() {
        assert_eq!(sanitize_repo_key("Org/Repo:Name"), "org_repo_name");
    }

    #[test]
    fn preserves_allowed_characters() {
        assert_eq!(sanitize_repo_key("my-repo_v1.2"), "my-repo_v1.2");
    }

    #[test]
    fn handles_windows_path_separators() {
        assert_eq!(sanitize_repo_key(r"C:\Users\me\repo"), "c__users_me_repo");
    }
}
