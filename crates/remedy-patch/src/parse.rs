//! Unified diff parsing

use regex::Regex;
use remedy_utils::error::PatchError;
use std::sync::LazyLock;

use crate::model::{DiffHunk, ParsedDiff};

/// Hunk headers: @@ -old_start,old_count +new_start,new_count @@
static HUNK_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk regex"));

/// Parse a unified diff for a single target file
///
/// File headers (`---`/`+++`) are optional; when present, `a/` and `b/`
/// prefixes are stripped from the resolved target path. A diff with no
/// parseable hunks is an error.
pub fn parse_diff(diff_text: &str) -> Result<ParsedDiff, PatchError> {
    let lines: Vec<&str> = diff_text.lines().collect();
    if lines.is_empty() {
        return Err(PatchError::ParseFailed {
            reason: "empty diff".to_string(),
        });
    }

    let mut old_file = None;
    let mut new_file = None;
    let mut header_end = 0;

    for (i, line) in lines.iter().enumerate() {
        if HUNK_HEADER.is_match(line) {
            header_end = i;
            break;
        }
        if let Some(rest) = line.strip_prefix("--- ") {
            old_file = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            new_file = Some(rest.trim());
            header_end = i + 1;
        }
    }

    let target_file = new_file
        .or(old_file)
        .map(strip_git_prefix)
        .unwrap_or_default()
        .to_string();

    let hunks = parse_hunks(&lines[header_end..]);
    if hunks.is_empty() {
        return Err(PatchError::NoHunks);
    }

    Ok(ParsedDiff {
        target_file,
        diff_content: diff_text.to_string(),
        hunks,
    })
}

/// Strip the a/ or b/ prefix git puts on diff paths
fn strip_git_prefix(path: &str) -> &str {
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
}

fn parse_hunks(lines: &[&str]) -> Vec<DiffHunk> {
    let mut hunks = Vec::new();
    let mut current_header: Option<((usize, usize), (usize, usize))> = None;
    let mut current_lines: Vec<String> = Vec::new();

    for line in lines {
        if let Some(captures) = HUNK_HEADER.captures(line) {
            if let Some((old_range, new_range)) = current_header.take() {
                hunks.push(DiffHunk {
                    old_range,
                    new_range,
                    content: current_lines.join("\n"),
                });
            }

            let old_start = captures
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(1);
            let old_count = captures
                .get(2)
                .map_or(1, |m| m.as_str().parse().unwrap_or(1));
            let new_start = captures
                .get(3)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(1);
            let new_count = captures
                .get(4)
                .map_or(1, |m| m.as_str().parse().unwrap_or(1));

            current_header = Some(((old_start, old_count), (new_start, new_count)));
            current_lines = vec![(*line).to_string()];
        } else if current_header.is_some() {
            current_lines.push((*line).to_string());
        }
    }

    if let Some((old_range, new_range)) = current_header {
        hunks.push(DiffHunk {
            old_range,
            new_range,
            content: current_lines.join("\n"),
        });
    }

    hunks
}

/// Normalize all line endings (CRLF, CR) to LF
#[must_use]
pub fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}
