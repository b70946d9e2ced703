//! Canonical identifiers for external profile references
//!
//! Normalization is string-level on purpose: it trims whitespace, drops the
//! trailing path separator and lower-cases everything. Query parameters and
//! alternate host spellings (`www.` vs bare host, `http` vs `https`) are NOT
//! merged, so two such variants count as distinct profiles.

/// Canonicalize a raw profile identifier into the corpus key.
///
/// Total: malformed input produces a best-effort key instead of an error,
/// since the key only exists to suppress duplicates. A run of trailing
/// separators (`/in/a//`) is stripped as a whole so that normalizing an
/// already-canonical key is a no-op.
pub fn normalize(raw_identifier: &str) -> String {
  raw_identifier
    .trim()
    .trim_end_matches(|c: char| c == '/' || c.is_whitespace())
    .to_lowercase()
}
