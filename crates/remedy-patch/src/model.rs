//! Data model for parsed diffs and apply outcomes

use serde::{Deserialize, Serialize};

/// Which layer of the engine produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStrategy {
    /// Hunk-by-hunk application with exact context verification
    Structured,
    /// External `git apply` on a temporary checkout
    ExternalTool,
    /// Lenient hunk application with offset tracking and scored search
    ContextAware,
    /// Offset-free matching of removed blocks by similarity
    Fuzzy,
    /// Full replacement with the expected content, guarded by an
    /// edit-distance check
    ExpectedFallback,
    /// No original existed; the expected content is the new file
    NewFile,
    /// Every layer failed; the original is returned unchanged
    Failed,
}

impl ApplyStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::ExternalTool => "external_tool",
            Self::ContextAware => "context_aware",
            Self::Fuzzy => "fuzzy",
            Self::ExpectedFallback => "expected_fallback",
            Self::NewFile => "new_file",
            Self::Failed => "failed",
        }
    }
}

/// Result of one engine invocation
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub success: bool,
    pub content: String,
    pub strategy: ApplyStrategy,
}

/// One hunk of a unified diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    /// (start, count) in the original file, 1-based
    pub old_range: (usize, usize),
    /// (start, count) in the patched file, 1-based
    pub new_range: (usize, usize),
    /// Raw hunk lines including the @@ header
    pub content: String,
}

impl DiffHunk {
    /// Lines that must exist in the original: context plus removals,
    /// with their prefix characters stripped
    #[must_use]
    pub fn old_lines(&self) -> Vec<&str> {
        self.content
            .lines()
            .skip(1)
            .filter(|line| !line.starts_with('+') && !line.starts_with("@@"))
            .filter(|line| !line.starts_with("---"))
            .map(|line| {
                if line.starts_with(' ') || line.starts_with('-') {
                    &line[1..]
                } else {
                    line
                }
            })
            .collect()
    }

    /// Lines present after the hunk is applied: context plus additions
    #[must_use]
    pub fn new_lines(&self) -> Vec<&str> {
        self.content
            .lines()
            .skip(1)
            .filter(|line| !line.starts_with('-') && !line.starts_with("@@"))
            .filter(|line| !line.starts_with("+++"))
            .map(|line| {
                if line.starts_with(' ') || line.starts_with('+') {
                    &line[1..]
                } else {
                    line
                }
            })
            .collect()
    }
}

/// A parsed unified diff for one target file
#[derive(Debug, Clone)]
pub struct ParsedDiff {
    /// Target path with a/ b/ prefixes stripped
    pub target_file: String,
    /// The raw diff text
    pub diff_content: String,
    pub hunks: Vec<DiffHunk>,
}

impl ParsedDiff {
    /// Count of (+) and (-) lines across all hunks
    #[must_use]
    pub fn change_stats(&self) -> (usize, usize) {
        let mut added = 0;
        let mut removed = 0;
        for hunk in &self.hunks {
            for line in hunk.content.lines() {
                if line.starts_with('+') && !line.starts_with("+++") {
                    added += 1;
                } else if line.starts_with('-') && !line.starts_with("---") {
                    removed += 1;
                }
            }
        }
        (added, removed)
    }
}

/// Record of one file the engine wrote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedFile {
    pub path: String,
    /// First 8 hex chars of the blake3 hash of the new content
    pub blake3_first8: String,
    pub applied: bool,
    pub strategy: ApplyStrategy,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// blake3 content hash, truncated to the first 8 hex characters
#[must_use]
pub fn content_hash_first8(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunk(content: &str) -> DiffHunk {
        DiffHunk {
            old_range: (1, 1),
            new_range: (1, 1),
            content: content.to_string(),
        }
    }

    #[test]
    fn old_lines_exclude_additions() {
        let h = hunk("@@ -1,3 +1,3 @@\n ctx\n-removed\n+added\n ctx2");
        assert_eq!(h.old_lines(), vec!["ctx", "removed", "ctx2"]);
    }

    #[test]
    fn new_lines_exclude_removals() {
        let h = hunk("@@ -1,3 +1,3 @@\n ctx\n-removed\n+added\n ctx2");
        assert_eq!(h.new_lines(), vec!["ctx", "added", "ctx2"]);
    }

    #[test]
    fn hash_is_stable_and_short() {
        let a = content_hash_first8("hello\n");
        let b = content_hash_first8("hello\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_ne!(a, content_hash_first8("other\n"));
    }
}
