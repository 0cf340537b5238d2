//! Layered diff application
//!
//! Strategies run strictly in order from most to least trusting of the
//! patch's own line numbers:
//!
//! 1. structured: exact context verification, small relocation window
//! 2. external tool: `git apply` against a temporary checkout
//! 3. context-aware: offset tracking plus ratio-scored window search
//! 4. fuzzy: offset-free block matching by char-level similarity
//! 5. expected fallback: whole-file replacement behind a guard
//!
//! A strategy that produces content differing from the caller-supplied
//! expected result is treated as a failure and the next layer runs.
//! The engine is deterministic: identical inputs always produce the
//! same outcome.

use camino::Utf8Path;
use remedy_utils::error::PatchError;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::matching::{
    block_similarity, context_matches_at, find_best_context_match, line_edit_distance,
};
use crate::model::{ApplyStrategy, AppliedFile, ParsedDiff, PatchOutcome, content_hash_first8};
use crate::parse::{normalize_line_endings, parse_diff};

/// Tunables for the strategy chain
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Exact-context relocation window for the structured strategy
    pub relocation_window: usize,
    /// Scored search window for the context-aware strategy
    pub fuzzy_window: usize,
    /// Minimum context ratio for scored and similarity matching
    pub min_context_ratio: f64,
    /// Minimum similarity ratio for the guarded expected fallback
    pub fallback_min_ratio: f64,
    /// Wall-clock budget for one external tool invocation
    pub tool_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            relocation_window: 20,
            fuzzy_window: 50,
            min_context_ratio: 0.7,
            fallback_min_ratio: 0.7,
            tool_timeout: Duration::from_secs(30),
        }
    }
}

/// Diff application engine
#[derive(Debug, Clone, Default)]
pub struct PatchEngine {
    config: EngineConfig,
}

impl PatchEngine {
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Apply `patch_text` to `original`, trying each strategy in order
    ///
    /// `original = None` with `expected = Some` denotes a new file and
    /// returns the expected content directly. When every strategy
    /// fails the original content comes back unchanged with strategy
    /// `Failed`.
    #[must_use]
    pub fn apply(
        &self,
        original: Option<&str>,
        patch_text: &str,
        expected: Option<&str>,
    ) -> PatchOutcome {
        let expected = expected.map(normalize_line_endings);

        if original.is_none()
            && let Some(content) = expected.as_deref()
        {
            return PatchOutcome {
                success: true,
                content: content.to_string(),
                strategy: ApplyStrategy::NewFile,
            };
        }

        let original = normalize_line_endings(original.unwrap_or_default());
        let parsed = match parse_diff(patch_text) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(error = %e, "diff did not parse, structural strategies skipped");
                None
            }
        };

        if let Some(parsed) = &parsed {
            const CHAIN: [ApplyStrategy; 4] = [
                ApplyStrategy::Structured,
                ApplyStrategy::ExternalTool,
                ApplyStrategy::ContextAware,
                ApplyStrategy::Fuzzy,
            ];

            for strategy in CHAIN {
                let result = self.run_strategy(strategy, &original, parsed);
                match result {
                    Ok(content) => {
                        if let Some(expected) = &expected
                            && !content_equals(&content, expected)
                        {
                            warn!(
                                strategy = strategy.as_str(),
                                "strategy result differs from expected content, skipping"
                            );
                            continue;
                        }
                        debug!(strategy = strategy.as_str(), "patch applied");
                        return PatchOutcome {
                            success: true,
                            content,
                            strategy,
                        };
                    }
                    Err(e) => {
                        debug!(strategy = strategy.as_str(), error = %e, "strategy failed");
                    }
                }
            }
        }

        if let Some(expected) = &expected {
            match self.apply_expected_fallback(&original, parsed.as_ref(), patch_text, expected) {
                Ok(content) => {
                    return PatchOutcome {
                        success: true,
                        content,
                        strategy: ApplyStrategy::ExpectedFallback,
                    };
                }
                Err(e) => {
                    debug!(error = %e, "expected fallback refused");
                }
            }
        }

        PatchOutcome {
            success: false,
            content: original,
            strategy: ApplyStrategy::Failed,
        }
    }

    /// Apply a diff to a file on disk, writing the result atomically
    pub fn apply_file(&self, path: &Utf8Path, diff_text: &str) -> Result<AppliedFile, PatchError> {
        let original = match std::fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(PatchError::ToolFailed {
                    reason: format!("failed to read {path}: {e}"),
                });
            }
        };

        let outcome = self.apply(original.as_deref(), diff_text, None);
        if !outcome.success {
            return Ok(AppliedFile {
                path: path.to_string(),
                blake3_first8: String::new(),
                applied: false,
                strategy: ApplyStrategy::Failed,
                warnings: vec!["no strategy could apply the diff".to_string()],
            });
        }

        remedy_utils::fs::atomic_write(path, outcome.content.as_bytes()).map_err(|e| {
            PatchError::ToolFailed {
                reason: format!("failed to write {path}: {e}"),
            }
        })?;

        Ok(AppliedFile {
            path: path.to_string(),
            blake3_first8: content_hash_first8(&outcome.content),
            applied: true,
            strategy: outcome.strategy,
            warnings: Vec::new(),
        })
    }

    fn run_strategy(
        &self,
        strategy: ApplyStrategy,
        original: &str,
        parsed: &ParsedDiff,
    ) -> Result<String, PatchError> {
        match strategy {
            ApplyStrategy::Structured => self.apply_structured(original, parsed),
            ApplyStrategy::ExternalTool => self.apply_external(original, parsed),
            ApplyStrategy::ContextAware => self.apply_context_aware(original, parsed),
            ApplyStrategy::Fuzzy => self.apply_fuzzy(original, parsed),
            _ => Err(PatchError::ParseFailed {
                reason: format!("'{}' is not a chained strategy", strategy.as_str()),
            }),
        }
    }

    /// Strategy 1: hunk application with exact context verification
    ///
    /// The hunk's own line numbers are trusted modulo the cumulative
    /// offset from earlier hunks; when the context does not match
    /// exactly there, an exact match is sought within a small window.
    fn apply_structured(&self, original: &str, diff: &ParsedDiff) -> Result<String, PatchError> {
        let mut lines: Vec<String> = original.lines().map(str::to_string).collect();
        let mut cumulative_offset: i64 = 0;

        for hunk in &diff.hunks {
            let (old_start, _) = hunk.old_range;
            let context = hunk.old_lines();
            let expected_pos = ((old_start as i64 - 1) + cumulative_offset).max(0) as usize;

            let actual = if context_matches_at(&lines, expected_pos, &context) {
                expected_pos
            } else {
                self.find_exact_relocation(&lines, expected_pos, &context)
                    .ok_or(PatchError::ContextNotFound {
                        expected_line: old_start,
                        window: self.config.relocation_window,
                    })?
            };

            let (additions, deletions) = apply_hunk_at(&mut lines, hunk, actual);
            cumulative_offset += additions - deletions;
        }

        Ok(join_lines(&lines))
    }

    fn find_exact_relocation(
        &self,
        lines: &[String],
        expected_pos: usize,
        context: &[&str],
    ) -> Option<usize> {
        if context.is_empty() {
            return Some(expected_pos);
        }
        // A hunk may cite a line past the end of the file; anchor the
        // search inside the file so the window never collapses empty.
        let anchor = expected_pos.min(lines.len());
        let window = self.config.relocation_window;
        let start = anchor.saturating_sub(window);
        let end = (anchor + window).min(lines.len());
        (start..=end).find(|&pos| context_matches_at(lines, pos, context))
    }

    /// Strategy 2: `git apply` against a temporary checkout
    ///
    /// Checked first, then applied for real; a whitespace-insensitive
    /// retry covers diffs with mangled indentation.
    fn apply_external(&self, original: &str, diff: &ParsedDiff) -> Result<String, PatchError> {
        let target = diff.target_file.as_str();
        if target.is_empty() || target.starts_with('/') || target.contains("..") {
            return Err(PatchError::ToolFailed {
                reason: format!("target path unsuitable for external tool: '{target}'"),
            });
        }

        let temp_dir = tempfile::TempDir::new().map_err(|e| PatchError::ToolFailed {
            reason: format!("failed to create temp dir: {e}"),
        })?;
        let file_path = temp_dir.path().join(target);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PatchError::ToolFailed {
                reason: format!("failed to create temp tree: {e}"),
            })?;
        }
        std::fs::write(&file_path, original).map_err(|e| PatchError::ToolFailed {
            reason: format!("failed to stage original: {e}"),
        })?;

        let diff_path = temp_dir.path().join(".remedy-change.diff");
        std::fs::write(&diff_path, &diff.diff_content).map_err(|e| PatchError::ToolFailed {
            reason: format!("failed to stage diff: {e}"),
        })?;

        let extra_args: &[&str] = if self.git_apply(temp_dir.path(), &diff_path, &["--check"])? {
            &[]
        } else if self.git_apply(
            temp_dir.path(),
            &diff_path,
            &["--check", "--ignore-whitespace"],
        )? {
            &["--ignore-whitespace"]
        } else {
            return Err(PatchError::ToolFailed {
                reason: "git apply --check rejected the diff".to_string(),
            });
        };

        if !self.git_apply(temp_dir.path(), &diff_path, extra_args)? {
            return Err(PatchError::ToolFailed {
                reason: "git apply failed after a successful check".to_string(),
            });
        }

        let patched = std::fs::read_to_string(&file_path).map_err(|e| PatchError::ToolFailed {
            reason: format!("failed to read tool output: {e}"),
        })?;
        Ok(normalize_line_endings(&patched))
    }

    fn git_apply(
        &self,
        cwd: &std::path::Path,
        diff_path: &std::path::Path,
        extra_args: &[&str],
    ) -> Result<bool, PatchError> {
        let mut cmd = Command::new("git");
        cmd.arg("apply")
            .args(extra_args)
            .arg(diff_path)
            .current_dir(cwd);
        let output = run_with_timeout(cmd, self.config.tool_timeout)?;
        Ok(output.status.success())
    }

    /// Strategy 3: lenient application with scored context search
    fn apply_context_aware(&self, original: &str, diff: &ParsedDiff) -> Result<String, PatchError> {
        let mut lines: Vec<String> = original.lines().map(str::to_string).collect();
        let mut cumulative_offset: i64 = 0;

        for hunk in &diff.hunks {
            let (old_start, _) = hunk.old_range;
            let context = hunk.old_lines();
            let expected_pos = ((old_start as i64 - 1) + cumulative_offset).max(0) as usize;

            let actual = if context_matches_at(&lines, expected_pos, &context) {
                expected_pos
            } else {
                match find_best_context_match(
                    &lines,
                    expected_pos,
                    &context,
                    self.config.fuzzy_window,
                    self.config.min_context_ratio,
                ) {
                    Some((pos, score)) => {
                        warn!(
                            file = %diff.target_file,
                            from_line = old_start,
                            to_line = pos + 1,
                            score,
                            "hunk relocated by scored context search"
                        );
                        pos
                    }
                    None => {
                        return Err(PatchError::ContextNotFound {
                            expected_line: old_start,
                            window: self.config.fuzzy_window,
                        });
                    }
                }
            };

            let (additions, deletions) = apply_hunk_at(&mut lines, hunk, actual);
            cumulative_offset += additions - deletions;
        }

        Ok(join_lines(&lines))
    }

    /// Strategy 4: offset-free block replacement by similarity
    ///
    /// Hunk line numbers are ignored entirely. Each hunk's old block is
    /// located anywhere in the file by average char-level similarity
    /// and replaced with the hunk's new block.
    fn apply_fuzzy(&self, original: &str, diff: &ParsedDiff) -> Result<String, PatchError> {
        let mut lines: Vec<String> = original.lines().map(str::to_string).collect();

        for hunk in &diff.hunks {
            let old_block = hunk.old_lines();
            let new_block = hunk.new_lines();
            if old_block.is_empty() {
                // Nothing to anchor on without offsets.
                return Err(PatchError::ContextNotFound {
                    expected_line: hunk.old_range.0,
                    window: 0,
                });
            }

            let last_start = lines.len().saturating_sub(old_block.len());
            let mut best: Option<(usize, f64)> = None;
            for pos in 0..=last_start {
                let score = block_similarity(&lines, pos, &old_block);
                if score >= self.config.min_context_ratio
                    && best.is_none_or(|(_, best_score)| score > best_score)
                {
                    best = Some((pos, score));
                }
            }

            let (pos, score) = best.ok_or(PatchError::ContextNotFound {
                expected_line: hunk.old_range.0,
                window: 0,
            })?;
            debug!(pos = pos + 1, score, "fuzzy block match");

            lines.splice(pos..pos + old_block.len(), new_block.iter().map(|s| (*s).to_string()));
        }

        Ok(join_lines(&lines))
    }

    /// Strategy 5: guarded replacement with the expected content
    ///
    /// Accepted only when the line-level edit distance from original to
    /// expected is commensurate with the change the patch claims to
    /// make. A wildly larger or smaller rewrite is refused.
    fn apply_expected_fallback(
        &self,
        original: &str,
        parsed: Option<&ParsedDiff>,
        patch_text: &str,
        expected: &str,
    ) -> Result<String, PatchError> {
        let implied = match parsed {
            Some(parsed) => {
                let (added, removed) = parsed.change_stats();
                added + removed
            }
            None => raw_change_count(patch_text),
        };
        let distance = line_edit_distance(original, expected);

        let ratio = if implied == 0 && distance == 0 {
            1.0
        } else {
            let (small, large) = if implied < distance {
                (implied, distance)
            } else {
                (distance, implied)
            };
            if large == 0 {
                1.0
            } else {
                (small as f64) / (large as f64)
            }
        };

        if ratio <= self.config.fallback_min_ratio {
            return Err(PatchError::FallbackRejected { ratio });
        }
        Ok(expected.to_string())
    }
}

/// Apply one hunk at a verified position, returning (additions, deletions)
fn apply_hunk_at(lines: &mut Vec<String>, hunk: &crate::model::DiffHunk, start: usize) -> (i64, i64) {
    let hunk_lines: Vec<&str> = hunk.content.lines().collect();
    let mut additions = 0i64;
    let mut deletions = 0i64;
    let mut file_idx = start;

    for line in hunk_lines.iter().skip(1) {
        if line.starts_with('+') && !line.starts_with("+++") {
            let new_line = line[1..].to_string();
            if file_idx <= lines.len() {
                lines.insert(file_idx, new_line);
            } else {
                lines.push(new_line);
            }
            file_idx += 1;
            additions += 1;
        } else if line.starts_with('-') && !line.starts_with("---") {
            if file_idx < lines.len() {
                lines.remove(file_idx);
                deletions += 1;
            }
        } else if !line.starts_with("@@") {
            file_idx += 1;
        }
    }

    (additions, deletions)
}

fn join_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        lines.join("\n") + "\n"
    }
}

/// Count +/- lines in raw patch text, ignoring file headers
fn raw_change_count(patch_text: &str) -> usize {
    patch_text
        .lines()
        .filter(|line| {
            (line.starts_with('+') && !line.starts_with("+++"))
                || (line.starts_with('-') && !line.starts_with("---"))
        })
        .count()
}

/// Content comparison tolerant of a trailing-newline difference
fn content_equals(a: &str, b: &str) -> bool {
    a.trim_end_matches('\n') == b.trim_end_matches('\n')
}

/// Run a command with a hard wall-clock budget
fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
) -> Result<std::process::Output, PatchError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| PatchError::ToolFailed {
        reason: format!("failed to spawn tool: {e}"),
    })?;

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PatchError::ToolTimeout {
                        timeout_secs: timeout.as_secs(),
                    });
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                return Err(PatchError::ToolFailed {
                    reason: format!("failed to poll tool: {e}"),
                });
            }
        }
    }

    child.wait_with_output().map_err(|e| PatchError::ToolFailed {
        reason: format!("failed to collect tool output: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn engine() -> PatchEngine {
        PatchEngine::default()
    }

    const RETURN_PATCH: &str = "--- a/calc.py\n+++ b/calc.py\n@@ -1,3 +1,3 @@\n def f():\n-    return 1\n+    return 2\n";

    #[test]
    fn structured_applies_well_formed_patch() {
        let original = "def f():\n    return 1\n";
        let outcome = engine().apply(Some(original), RETURN_PATCH, None);
        assert!(outcome.success);
        assert_eq!(outcome.strategy, ApplyStrategy::Structured);
        assert_eq!(outcome.content, "def f():\n    return 2\n");
    }

    #[test]
    fn misquoted_line_numbers_still_apply() {
        // Hunk claims line 10; the real code sits at line 3.
        let original = "# header\n# notes\ndef f():\n    return 1\n";
        let patch = "--- a/calc.py\n+++ b/calc.py\n@@ -10,2 +10,2 @@\n def f():\n-    return 1\n+    return 2\n";
        let outcome = engine().apply(Some(original), patch, None);
        assert!(outcome.success);
        assert_eq!(outcome.content, "# header\n# notes\ndef f():\n    return 2\n");
    }

    #[test]
    fn relocated_hunk_beyond_file_length_applies() {
        // Three-line file, hunk claims line 50. The relocation window
        // must clamp to the real file so structured still handles it.
        let original = "alpha\nbeta\ngamma\n";
        let patch = "--- a/t.txt\n+++ b/t.txt\n@@ -50,2 +50,2 @@\n beta\n-gamma\n+delta\n";
        let outcome = engine().apply(Some(original), patch, None);
        assert!(outcome.success);
        assert_eq!(outcome.strategy, ApplyStrategy::Structured);
        assert_eq!(outcome.content, "alpha\nbeta\ndelta\n");
    }

    #[test]
    fn line_citation_past_eof_in_tiny_file_uses_structured() {
        let original = "def f():\n    return 1\n";
        let patch = "--- a/calc.py\n+++ b/calc.py\n@@ -50,2 +50,2 @@\n def f():\n-    return 1\n+    return 2\n";
        let outcome = engine().apply(Some(original), patch, None);
        assert!(outcome.success);
        assert_eq!(outcome.strategy, ApplyStrategy::Structured);
        assert_eq!(outcome.content, "def f():\n    return 2\n");
    }

    #[test]
    fn structured_apply_is_deterministic() {
        let original = "def f():\n    return 1\n";
        let first = engine().apply(Some(original), RETURN_PATCH, None);
        let second = engine().apply(Some(original), RETURN_PATCH, None);
        assert_eq!(first.content, second.content);
        assert_eq!(first.strategy, second.strategy);
    }

    #[test]
    fn multi_hunk_offsets_accumulate() {
        let original = "one\ntwo\nthree\nfour\nfive\nsix\n";
        let patch = "--- a/t\n+++ b/t\n@@ -1,2 +1,3 @@\n one\n+inserted\n two\n@@ -5,2 +6,2 @@\n five\n-six\n+SIX\n";
        let outcome = engine().apply(Some(original), patch, None);
        assert!(outcome.success);
        assert_eq!(
            outcome.content,
            "one\ninserted\ntwo\nthree\nfour\nfive\nSIX\n"
        );
    }

    #[test]
    fn new_file_returns_expected_directly() {
        let outcome = engine().apply(None, "", Some("fresh content\n"));
        assert!(outcome.success);
        assert_eq!(outcome.strategy, ApplyStrategy::NewFile);
        assert_eq!(outcome.content, "fresh content\n");
    }

    #[test]
    fn unmatched_patch_fails_and_preserves_original() {
        let original = "completely\nunrelated\ncontent\n";
        let patch = "--- a/t\n+++ b/t\n@@ -1,2 +1,2 @@\n nothing here matches\n-gone\n+new\n";
        let outcome = engine().apply(Some(original), patch, None);
        assert!(!outcome.success);
        assert_eq!(outcome.strategy, ApplyStrategy::Failed);
        assert_eq!(outcome.content, original);
    }

    #[test]
    fn whitespace_mangled_context_uses_later_strategy() {
        let original = "def f():\n        return 1\n";
        // Context indentation does not match the file exactly.
        let patch = "--- a/calc.py\n+++ b/calc.py\n@@ -1,2 +1,2 @@\n def f():\n-    return 1\n+    return 2\n";
        let outcome = engine().apply(Some(original), patch, None);
        assert!(outcome.success);
        assert!(outcome.content.contains("return 2"));
    }

    #[test]
    fn fuzzy_strategy_is_reached_after_stricter_layers_fail() {
        // Context lines differ from the file by a typo on every edited
        // line, so exact and scored matching both miss while char-level
        // similarity stays high.
        let original = "def calculate():\n    resul = value + 1\n    return resul\n";
        let patch = "--- a/calc.py\n+++ b/calc.py\n@@ -1,3 +1,3 @@\n def calculate():\n-    result = value + 1\n+    result = value + 2\n     return result\n";
        let outcome = engine().apply(Some(original), patch, None);
        assert!(outcome.success);
        assert_eq!(outcome.strategy, ApplyStrategy::Fuzzy);
        assert_eq!(
            outcome.content,
            "def calculate():\n    result = value + 2\n    return result\n"
        );
    }

    #[test]
    fn expected_mismatch_skips_strategy() {
        let original = "def f():\n    return 1\n";
        // Expected disagrees with what the patch produces; the chain
        // must not accept the structured result.
        let outcome = engine().apply(Some(original), RETURN_PATCH, Some("def f():\n    return 3\n"));
        assert!(!outcome.success || outcome.strategy != ApplyStrategy::Structured);
    }

    #[test]
    fn fallback_accepts_commensurate_expected() {
        let original = "line a\nline b\nline c\n";
        // Garbage patch, but expected differs from original by about
        // as much as the patch claims.
        let patch = "@@ -99,2 +99,2 @@\n zzz\n-yyy\n+xxx\n";
        let expected = "line a\nCHANGED B\nCHANGED C\n";
        let outcome = engine().apply(Some(original), patch, Some(expected));
        assert!(outcome.success);
        assert_eq!(outcome.strategy, ApplyStrategy::ExpectedFallback);
        assert_eq!(outcome.content, expected);
    }

    #[test]
    fn fallback_refuses_disproportionate_rewrite() {
        let original = "line a\nline b\nline c\nline d\nline e\nline f\nline g\nline h\n";
        // Patch implies a one-line change; expected rewrites everything.
        let patch = "@@ -99 +99 @@\n-yyy\n+xxx\n";
        let expected = "totally\ndifferent\nfile\nnow\nwith\nother\ntext\nhere\n";
        let outcome = engine().apply(Some(original), patch, Some(expected));
        assert!(!outcome.success);
        assert_eq!(outcome.strategy, ApplyStrategy::Failed);
        assert_eq!(outcome.content, original);
    }

    #[test]
    fn crlf_input_is_normalized() {
        let original = "def f():\r\n    return 1\r\n";
        let outcome = engine().apply(Some(original), RETURN_PATCH, None);
        assert!(outcome.success);
        assert_eq!(outcome.content, "def f():\n    return 2\n");
    }

    #[test]
    fn raw_change_count_ignores_headers() {
        assert_eq!(raw_change_count("--- a/x\n+++ b/x\n-one\n+two\n+three\n"), 3);
    }

    #[test]
    fn apply_file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(tmp.path().join("calc.py")).unwrap();
        std::fs::write(&path, "def f():\n    return 1\n").unwrap();

        let applied = engine().apply_file(&path, RETURN_PATCH).unwrap();
        assert!(applied.applied);
        assert_eq!(applied.blake3_first8.len(), 8);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "def f():\n    return 2\n"
        );
    }

    proptest! {
        #[test]
        fn engine_never_panics_on_arbitrary_patch_text(patch in ".{0,200}") {
            let outcome = engine().apply(Some("a\nb\nc\n"), &patch, None);
            // Failure must preserve the original unchanged.
            if !outcome.success {
                prop_assert_eq!(outcome.content, "a\nb\nc\n".to_string());
            }
        }
    }
}
