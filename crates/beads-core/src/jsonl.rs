//! JSONL (JSON Lines) read/write support -- the journal codec.
//!
//! Each line in a JSONL file is a complete JSON object representing one
//! Issue. The journal may contain merge markers and other debris left by
//! version-control tooling, so reads tolerate blank and unparseable lines
//! by skipping them rather than failing the whole read. Writes go through
//! [`write_jsonl_atomic`], which never leaves a concurrent reader observing
//! a partial file.

use std::io::{self, BufRead, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::issue::Issue;

/// Error type for JSONL operations.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error at line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
}

/// Result alias for JSONL operations.
pub type Result<T> = std::result::Result<T, JsonlError>;

/// Writes issues as JSONL to the given writer, one line per issue, in the
/// order given. Does not apply the ephemeral-exclusion or ordering
/// guarantees of [`write_jsonl_atomic`] -- use that for journal writes.
pub fn write_jsonl<W: Write>(writer: &mut W, issues: &[Issue]) -> Result<()> {
    for issue in issues {
        serde_json::to_writer(&mut *writer, issue)
            .map_err(|e| JsonlError::Json { line: 0, source: e })?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Returns an iterator that reads issues from a JSONL reader.
///
/// Each line is parsed as a JSON object. Blank lines and lines that fail to
/// parse (merge conflict markers, truncated records) are skipped silently --
/// the journal is shared with version-control tooling that can leave such
/// debris behind, and a single bad line must not abort the whole read.
pub fn read_jsonl<R: BufRead>(reader: R) -> JsonlIter<R> {
    JsonlIter {
        reader,
        line_number: 0,
    }
}

/// Iterator over JSONL-encoded issues. Never yields `Err` -- unparseable
/// lines are dropped rather than surfaced, per the journal codec's
/// tolerance contract.
pub struct JsonlIter<R> {
    reader: R,
    line_number: usize,
}

impl<R: BufRead> Iterator for JsonlIter<R> {
    type Item = Issue;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None, // EOF
                Ok(_) => {
                    self.line_number += 1;
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue; // skip empty lines
                    }
                    match serde_json::from_str::<Issue>(trimmed) {
                        Ok(mut issue) => {
                            issue.set_defaults();
                            return Some(issue);
                        }
                        Err(_) => continue, // skip unparseable lines silently
                    }
                }
                Err(_) => return None,
            }
        }
    }
}

/// Parses a complete in-memory journal, tolerating blank/unparseable lines.
pub fn parse_jsonl(content: &str) -> Vec<Issue> {
    read_jsonl(content.as_bytes()).collect()
}

/// The result of an atomic journal write: the IDs written (deterministic
/// order) and the SHA-256 hex digest of the final on-disk bytes.
#[derive(Debug, Clone)]
pub struct JournalWrite {
    pub ids: Vec<String>,
    pub content_hash: String,
}

/// Writes `issues` to `path` atomically: ephemeral issues are excluded,
/// remaining issues are encoded one JSON object per line ordered
/// deterministically by ID, the result is written to a temp file in the
/// same directory (mode 0600 on unix), fsynced, and renamed over `path`.
///
/// A concurrent reader of `path` observes either the previous content or
/// the complete new content -- never a partial file -- because the rename
/// is the only mutation of the visible path.
pub fn write_jsonl_atomic(path: &Path, issues: &[Issue]) -> Result<JournalWrite> {
    let mut kept: Vec<&Issue> = issues.iter().filter(|i| !i.ephemeral).collect();
    kept.sort_by(|a, b| a.id.cmp(&b.id));

    let mut bytes = Vec::new();
    for issue in &kept {
        serde_json::to_writer(&mut bytes, issue)
            .map_err(|e| JsonlError::Json { line: 0, source: e })?;
        bytes.push(b'\n');
    }

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(tmp.path(), perms)?;
    }

    tmp.persist(path).map_err(|e| e.error)?;

    // Best-effort fsync of the containing directory so the rename itself
    // is durable, not just the file contents.
    #[cfg(unix)]
    {
        if let Ok(dir_file) = std::fs::File::open(dir) {
            let _ = dir_file.sync_all();
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let content_hash = format!("{:x}", hasher.finalize());

    Ok(JournalWrite {
        ids: kept.iter().map(|i| i.id.clone()).collect(),
        content_hash,
    })
}

/// Computes the SHA-256 hex digest of the bytes currently on disk at
/// `path`. Used by integrity validation to compare against the stored
/// `jsonl_content_hash`.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueBuilder;
    use std::io::BufReader;

    #[test]
    fn write_and_read_roundtrip() {
        let issues = vec![
            IssueBuilder::new("Issue 1")
                .id("bd-001")
                .priority(1)
                .build(),
            IssueBuilder::new("Issue 2")
                .id("bd-002")
                .priority(2)
                .build(),
        ];

        let mut buf = Vec::new();
        write_jsonl(&mut buf, &issues).unwrap();

        let reader = BufReader::new(buf.as_slice());
        let read_back: Vec<Issue> = read_jsonl(reader).collect();

        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].title, "Issue 1");
        assert_eq!(read_back[1].title, "Issue 2");
    }

    #[test]
    fn read_skips_empty_lines() {
        let data = b"{\"title\":\"A\"}\n\n{\"title\":\"B\"}\n";
        let reader = BufReader::new(data.as_slice());
        let results: Vec<Issue> = read_jsonl(reader).collect();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn read_skips_unparseable_lines_silently() {
        let data = b"{\"title\":\"A\"}\n<<<<<<< HEAD\nnot-json\n{\"title\":\"B\"}\n";
        let reader = BufReader::new(data.as_slice());
        let results: Vec<Issue> = read_jsonl(reader).collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "A");
        assert_eq!(results[1].title, "B");
    }

    #[test]
    fn atomic_write_excludes_ephemeral_and_orders_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");

        let issues = vec![
            IssueBuilder::new("B").id("bd-002").build(),
            IssueBuilder::new("Ephemeral")
                .id("bd-003")
                .ephemeral(true)
                .build(),
            IssueBuilder::new("A").id("bd-001").build(),
        ];

        let result = write_jsonl_atomic(&path, &issues).unwrap();
        assert_eq!(result.ids, vec!["bd-001", "bd-002"]);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("bd-001"));
        assert!(lines[1].contains("bd-002"));

        let hash = hash_file(&path).unwrap();
        assert_eq!(hash, result.content_hash);
    }

    #[test]
    fn repeated_write_is_bytewise_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        let issues = vec![IssueBuilder::new("A").id("bd-001").build()];

        let r1 = write_jsonl_atomic(&path, &issues).unwrap();
        let r2 = write_jsonl_atomic(&path, &issues).unwrap();
        assert_eq!(r1.content_hash, r2.content_hash);
    }
}
