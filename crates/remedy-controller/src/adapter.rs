//! Normalization of developer patch payloads
//!
//! Patch generators emit several shapes: a bare diff string, an object
//! with a combined diff, an object with a per-file list, or any of
//! those nested under a `patch` key. This adapter turns all of them
//! into one [`ProposedPatch`] at the collaborator boundary so nothing
//! downstream has to sniff shapes again.

use remedy_model::{FilePatch, ProposedPatch, clamp_confidence};
use remedy_utils::error::ControllerError;
use serde_json::Value;

/// Normalize a loose developer payload into a [`ProposedPatch`]
///
/// `default_confidence` is used when the payload carries no score.
/// A payload with neither a combined diff nor per-file entries is an
/// error.
pub fn normalize_patch_payload(
    value: &Value,
    default_confidence: u8,
) -> Result<ProposedPatch, ControllerError> {
    match value {
        Value::String(diff) => from_combined_diff(diff, default_confidence),
        Value::Array(entries) => from_entries(entries, default_confidence, None, None),
        Value::Object(map) => {
            // One level of nesting: {"patch": <payload>} with the
            // interesting fields inside.
            if !map.contains_key("patch_content")
                && !map.contains_key("patches")
                && !map.contains_key("diff")
                && let Some(inner) = map.get("patch")
                && (inner.is_object() || inner.is_string() || inner.is_array())
            {
                return normalize_patch_payload(inner, default_confidence);
            }

            let confidence = read_confidence(value).unwrap_or(default_confidence);
            let commit_message = read_string(value, &["commit_message", "message"]);

            if let Some(Value::Array(entries)) = map.get("patches") {
                return from_entries(entries, default_confidence, Some(confidence), commit_message);
            }

            let patch_content = read_string(value, &["patch_content", "diff"]).ok_or_else(|| {
                malformed("payload has neither 'patches' nor a combined diff")
            })?;
            if patch_content.trim().is_empty() {
                return Err(malformed("combined diff is empty"));
            }

            let patched_files = match map.get("patched_files") {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => files_from_diff(&patch_content),
            };

            Ok(ProposedPatch {
                confidence_score: confidence,
                patched_files,
                patch_content,
                patches: Vec::new(),
                commit_message,
            })
        }
        _ => Err(malformed("payload is not a string, object, or array")),
    }
}

fn from_combined_diff(diff: &str, confidence: u8) -> Result<ProposedPatch, ControllerError> {
    if diff.trim().is_empty() {
        return Err(malformed("combined diff is empty"));
    }
    Ok(ProposedPatch {
        confidence_score: confidence,
        patched_files: files_from_diff(diff),
        patch_content: diff.to_string(),
        patches: Vec::new(),
        commit_message: None,
    })
}

fn from_entries(
    entries: &[Value],
    default_confidence: u8,
    confidence: Option<u8>,
    commit_message: Option<String>,
) -> Result<ProposedPatch, ControllerError> {
    let mut patches = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = read_string(entry, &["file_path", "path", "file"])
            .ok_or_else(|| malformed("patch entry has no file path"))?;
        let diff = read_string(entry, &["diff", "patch_content", "content"])
            .ok_or_else(|| malformed("patch entry has no diff"))?;
        patches.push(FilePatch {
            file_path: path,
            diff,
        });
    }
    if patches.is_empty() {
        return Err(malformed("patch list is empty"));
    }

    Ok(ProposedPatch {
        confidence_score: confidence.unwrap_or(default_confidence),
        patched_files: patches.iter().map(|p| p.file_path.clone()).collect(),
        patch_content: String::new(),
        patches,
        commit_message,
    })
}

fn read_confidence(value: &Value) -> Option<u8> {
    let raw = value
        .get("confidence_score")
        .or_else(|| value.get("confidence"))?;
    if let Some(n) = raw.as_i64() {
        return Some(clamp_confidence(n));
    }
    if let Some(f) = raw.as_f64() {
        return Some(clamp_confidence(f.round() as i64));
    }
    raw.as_str()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .map(clamp_confidence)
}

fn read_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Target paths named by `+++`/`---` headers of a combined diff
fn files_from_diff(diff: &str) -> Vec<String> {
    let mut files = Vec::new();
    for line in diff.lines() {
        let Some(rest) = line.strip_prefix("+++ ") else {
            continue;
        };
        let path = rest.trim();
        if path == "/dev/null" {
            continue;
        }
        let path = path.strip_prefix("b/").unwrap_or(path).to_string();
        if !files.contains(&path) {
            files.push(path);
        }
    }
    files
}

fn malformed(reason: &str) -> ControllerError {
    ControllerError::CollaboratorFailed {
        collaborator: "developer".to_string(),
        reason: reason.to_string(),
    }
}
