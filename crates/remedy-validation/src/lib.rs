//! Static patch validation
//!
//! Inspects a proposed patch before anything touches disk: path
//! hygiene, diff structure, and a scan for placeholder content that
//! betrays a templated rather than real change. Each check adjusts a
//! confidence score; any failure marks the file invalid.

use regex::Regex;
use remedy_model::{ProposedPatch, clamp_confidence};
use remedy_utils::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

/// Content patterns that indicate a generated template, not a fix
static PLACEHOLDER_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)example\.(com|org|net)", "example domain"),
        (r"/path/to/", "generic /path/to/ placeholder"),
        (r"\b(TODO|FIXME)\b", "unresolved TODO/FIXME marker"),
        (r"YOUR_[A-Z][A-Z0-9_]*", "templated YOUR_* token"),
        (r"<(insert|your|placeholder)[^>]*>", "angle-bracket placeholder"),
    ]
    .into_iter()
    .map(|(pattern, label)| {
        (
            Regex::new(pattern).unwrap_or_else(|e| panic!("placeholder pattern: {e}")),
            label,
        )
    })
    .collect()
});

const PASS_DELTA: i64 = 10;

/// Outcome of validating a single file entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub path: String,
    pub valid: bool,
    pub reasons: Vec<String>,
    pub confidence_delta: i64,
}

/// Aggregate outcome for a whole proposed patch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchAssessment {
    pub valid: bool,
    pub confidence: u8,
    pub reports: Vec<FileReport>,
}

impl PatchAssessment {
    /// Rejection reasons across all files, for escalation payloads
    #[must_use]
    pub fn rejection_reasons(&self) -> Vec<String> {
        self.reports
            .iter()
            .filter(|r| !r.valid)
            .flat_map(|r| r.reasons.iter().cloned())
            .collect()
    }
}

/// Static inspector for proposed patches
///
/// When constructed with a repository file listing, paths must refer
/// to a listed file unless the diff creates a new one.
#[derive(Debug, Clone, Default)]
pub struct PatchValidator {
    known_files: Option<BTreeSet<String>>,
}

impl PatchValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_known_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_files: Some(files.into_iter().map(Into::into).collect()),
        }
    }

    /// Validate one file path and its diff
    ///
    /// Checks run in order and stop at the first failure. Every passed
    /// check adds a small positive delta; a failure contributes a
    /// larger negative one and records the reason.
    #[must_use]
    pub fn validate(&self, file_path: &str, diff_text: &str) -> FileReport {
        let mut delta: i64 = 0;

        // Path hygiene
        if file_path.trim().is_empty() {
            return FileReport::rejected(file_path, ValidationError::EmptyPath, delta - 40);
        }
        delta += PASS_DELTA;

        if file_path.split(['/', '\\']).any(|part| part == "..") {
            return FileReport::rejected(
                file_path,
                ValidationError::PathTraversal {
                    path: file_path.to_string(),
                },
                delta - 40,
            );
        }
        delta += PASS_DELTA;

        if file_path.chars().any(char::is_control) {
            return FileReport::rejected(file_path, ValidationError::ControlCharacters, delta - 30);
        }
        delta += PASS_DELTA;

        if let Some(known) = &self.known_files
            && !known.contains(file_path)
            && !diff_creates_file(diff_text)
        {
            return FileReport::rejected(
                file_path,
                ValidationError::UnknownFile {
                    path: file_path.to_string(),
                },
                delta - 20,
            );
        }
        delta += PASS_DELTA;

        // Diff structure
        if diff_text.trim().is_empty() {
            return FileReport::rejected(file_path, ValidationError::EmptyDiff, delta - 30);
        }
        delta += PASS_DELTA;

        if !looks_like_diff(diff_text) {
            return FileReport::rejected(file_path, ValidationError::NotDiffLike, delta - 25);
        }
        delta += PASS_DELTA;

        // Placeholder scan over both path and content
        for (pattern, label) in PLACEHOLDER_PATTERNS.iter() {
            if pattern.is_match(file_path) || pattern.is_match(diff_text) {
                return FileReport::rejected(
                    file_path,
                    ValidationError::PlaceholderDetected {
                        pattern: (*label).to_string(),
                    },
                    delta - 40,
                );
            }
        }
        delta += PASS_DELTA;

        FileReport {
            path: file_path.to_string(),
            valid: true,
            reasons: Vec::new(),
            confidence_delta: delta,
        }
    }

    /// Validate every file entry of a proposed patch
    ///
    /// All files must pass for the patch to be valid. The resulting
    /// confidence is the patch's own score plus every file's delta,
    /// clamped to 0..=100. A patch with no file entries is invalid.
    #[must_use]
    pub fn assess(&self, patch: &ProposedPatch) -> PatchAssessment {
        let entries = patch.file_patches();
        if entries.is_empty() {
            return PatchAssessment {
                valid: false,
                confidence: 0,
                reports: vec![FileReport::invalid(
                    "",
                    vec!["patch contains no file entries".to_string()],
                    -40,
                )],
            };
        }

        let reports: Vec<FileReport> = entries
            .iter()
            .map(|entry| self.validate(&entry.file_path, &entry.diff))
            .collect();

        let valid = reports.iter().all(|r| r.valid);
        let total_delta: i64 = reports.iter().map(|r| r.confidence_delta).sum();
        let confidence = clamp_confidence(i64::from(patch.confidence_score) + total_delta);

        debug!(
            files = reports.len(),
            valid, confidence, "patch assessment complete"
        );
        PatchAssessment {
            valid,
            confidence,
            reports,
        }
    }
}

impl FileReport {
    fn invalid(path: &str, reasons: Vec<String>, confidence_delta: i64) -> Self {
        Self {
            path: path.to_string(),
            valid: false,
            reasons,
            confidence_delta,
        }
    }

    fn rejected(path: &str, err: ValidationError, confidence_delta: i64) -> Self {
        Self::invalid(path, vec![err.to_string()], confidence_delta)
    }
}

/// A diff must carry a hunk header or at least one +/- line
fn looks_like_diff(diff_text: &str) -> bool {
    diff_text.lines().any(|line| {
        line.starts_with("@@")
            || (line.starts_with('+') && !line.starts_with("+++"))
            || (line.starts_with('-') && !line.starts_with("---"))
    })
}

/// Whether the diff introduces a brand-new file
fn diff_creates_file(diff_text: &str) -> bool {
    diff_text.lines().any(|line| {
        line.starts_with("new file mode") || line.trim_end() == "--- /dev/null"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedy_model::{FilePatch, ProposedPatch};

    const GOOD_DIFF: &str = "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1,2 +1,2 @@\n fn f() {\n-    1\n+    2\n";

    fn patch(confidence: u8, entries: Vec<FilePatch>) -> ProposedPatch {
        ProposedPatch {
            confidence_score: confidence,
            patched_files: entries.iter().map(|e| e.file_path.clone()).collect(),
            patch_content: String::new(),
            patches: entries,
            commit_message: None,
        }
    }

    #[test]
    fn clean_patch_passes_all_checks() {
        let report = PatchValidator::new().validate("src/lib.rs", GOOD_DIFF);
        assert!(report.valid);
        assert!(report.reasons.is_empty());
        assert_eq!(report.confidence_delta, 70);
    }

    #[test]
    fn empty_path_short_circuits() {
        let report = PatchValidator::new().validate("  ", GOOD_DIFF);
        assert!(!report.valid);
        assert_eq!(report.reasons.len(), 1);
        assert_eq!(report.confidence_delta, -40);
    }

    #[test]
    fn traversal_and_control_chars_rejected() {
        let validator = PatchValidator::new();
        assert!(!validator.validate("../etc/passwd", GOOD_DIFF).valid);
        assert!(!validator.validate("src/\x07.rs", GOOD_DIFF).valid);
    }

    #[test]
    fn unknown_file_rejected_against_listing() {
        let validator = PatchValidator::with_known_files(["src/lib.rs"]);
        assert!(validator.validate("src/lib.rs", GOOD_DIFF).valid);
        let report = validator.validate("src/other.rs", GOOD_DIFF);
        assert!(!report.valid);
        assert!(report.reasons[0].contains("src/other.rs"));
    }

    #[test]
    fn new_file_diff_bypasses_listing_check() {
        let validator = PatchValidator::with_known_files(["src/lib.rs"]);
        let diff = "--- /dev/null\n+++ b/src/new.rs\n@@ -0,0 +1,1 @@\n+fn fresh() {}\n";
        assert!(validator.validate("src/new.rs", diff).valid);
    }

    #[test]
    fn prose_is_not_a_diff() {
        let report =
            PatchValidator::new().validate("src/lib.rs", "I think you should change the function");
        assert!(!report.valid);
        assert!(report.reasons[0].contains("not structured"));
    }

    #[test]
    fn placeholder_content_is_rejected() {
        let validator = PatchValidator::new();
        let diff = "@@ -1 +1 @@\n-old\n+curl https://example.com/fix\n";
        assert!(!validator.validate("src/lib.rs", diff).valid);

        let diff = "@@ -1 +1 @@\n-old\n+    key = \"YOUR_API_KEY\"\n";
        assert!(!validator.validate("src/config.rs", diff).valid);

        assert!(!validator.validate("/path/to/file.rs", GOOD_DIFF).valid);
    }

    #[test]
    fn assessment_aggregates_and_clamps() {
        let validator = PatchValidator::new();
        let good = patch(
            75,
            vec![FilePatch {
                file_path: "src/lib.rs".to_string(),
                diff: GOOD_DIFF.to_string(),
            }],
        );
        let assessment = validator.assess(&good);
        assert!(assessment.valid);
        assert_eq!(assessment.confidence, 100);

        let bad = patch(
            20,
            vec![
                FilePatch {
                    file_path: "src/lib.rs".to_string(),
                    diff: GOOD_DIFF.to_string(),
                },
                FilePatch {
                    file_path: "../escape.rs".to_string(),
                    diff: GOOD_DIFF.to_string(),
                },
            ],
        );
        let assessment = validator.assess(&bad);
        assert!(!assessment.valid);
        assert_eq!(assessment.confidence, clamp_confidence(20 + 70 - 40 + 10));
        assert_eq!(assessment.rejection_reasons().len(), 1);
    }

    #[test]
    fn empty_patch_is_invalid() {
        let empty = ProposedPatch {
            confidence_score: 90,
            patched_files: Vec::new(),
            patch_content: String::new(),
            patches: Vec::new(),
            commit_message: None,
        };
        let assessment = PatchValidator::new().assess(&empty);
        assert!(!assessment.valid);
        assert_eq!(assessment.confidence, 0);
    }
}
