//! Context matching for hunk placement
//!
//! Exact matching tolerates whitespace differences within a line;
//! scored matching returns the fraction of context lines that match at
//! a candidate position.

/// Check whether every context line matches starting at `pos`
#[must_use]
pub fn context_matches_at(lines: &[String], pos: usize, context: &[&str]) -> bool {
    if context.is_empty() {
        return true;
    }
    if pos + context.len() > lines.len() {
        return false;
    }
    context
        .iter()
        .enumerate()
        .all(|(i, ctx)| lines_match(&lines[pos + i], ctx))
}

/// Find the best-scoring position for `context` within `window` lines
/// of `expected_pos`, requiring at least `min_ratio`
#[must_use]
pub fn find_best_context_match(
    lines: &[String],
    expected_pos: usize,
    context: &[&str],
    window: usize,
    min_ratio: f64,
) -> Option<(usize, f64)> {
    if context.is_empty() {
        return Some((expected_pos, 1.0));
    }

    let start = expected_pos.saturating_sub(window);
    let end = (expected_pos + window).min(lines.len());

    let mut best: Option<(usize, f64)> = None;
    for candidate in start..end {
        let score = context_match_score(lines, candidate, context);
        if score >= min_ratio && best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((candidate, score));
        }
    }
    best
}

/// Fraction of context lines matching at `pos`, in 0.0..=1.0
#[must_use]
pub fn context_match_score(lines: &[String], pos: usize, context: &[&str]) -> f64 {
    if context.is_empty() {
        return 1.0;
    }
    let mut matches = 0;
    for (i, ctx) in context.iter().enumerate() {
        let file_pos = pos + i;
        if file_pos >= lines.len() {
            break;
        }
        if lines_match(&lines[file_pos], ctx) {
            matches += 1;
        }
    }
    (matches as f64) / (context.len() as f64)
}

/// Compare two lines, tolerating whitespace differences
#[must_use]
pub fn lines_match(file_line: &str, context_line: &str) -> bool {
    if file_line == context_line {
        return true;
    }
    let normalize = |s: &str| -> String { s.split_whitespace().collect::<Vec<_>>().join(" ") };
    normalize(file_line) == normalize(context_line)
}

/// Char-level similarity between two lines, in 0.0..=1.0
///
/// Levenshtein-based: 1 - distance / max_len. Whitespace-equal lines
/// score 1.0 without running the DP.
#[must_use]
pub fn line_similarity(a: &str, b: &str) -> f64 {
    if lines_match(a, b) {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let max_len = a_chars.len().max(b_chars.len());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a_chars, &b_chars);
    1.0 - (distance as f64) / (max_len as f64)
}

/// Average char-level similarity of a block of lines at `pos`
#[must_use]
pub fn block_similarity(lines: &[String], pos: usize, block: &[&str]) -> f64 {
    if block.is_empty() {
        return 1.0;
    }
    if pos + block.len() > lines.len() {
        return 0.0;
    }
    let total: f64 = block
        .iter()
        .enumerate()
        .map(|(i, b)| line_similarity(&lines[pos + i], b))
        .sum();
    total / (block.len() as f64)
}

/// Line-level edit distance between two texts
#[must_use]
pub fn line_edit_distance(a: &str, b: &str) -> usize {
    let a_lines: Vec<&str> = a.lines().collect();
    let b_lines: Vec<&str> = b.lines().collect();
    levenshtein(&a_lines, &b_lines)
}

fn levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, a_item) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, b_item) in b.iter().enumerate() {
            let cost = usize::from(a_item != b_item);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn exact_context_match() {
        let file = lines(&["a", "b", "c"]);
        assert!(context_matches_at(&file, 1, &["b", "c"]));
        assert!(!context_matches_at(&file, 0, &["b", "c"]));
        assert!(!context_matches_at(&file, 2, &["c", "d"]));
    }

    #[test]
    fn whitespace_differences_still_match() {
        let file = lines(&["  let x =   1;"]);
        assert!(context_matches_at(&file, 0, &["let x = 1;"]));
    }

    #[test]
    fn empty_context_matches_anywhere() {
        let file = lines(&["a"]);
        assert!(context_matches_at(&file, 0, &[]));
        assert_eq!(find_best_context_match(&file, 5, &[], 10, 0.7), Some((5, 1.0)));
    }

    #[test]
    fn window_search_finds_shifted_context() {
        let mut items = vec!["filler"; 60];
        items[48] = "needle one";
        items[49] = "needle two";
        let file = lines(&items);

        let found = find_best_context_match(&file, 30, &["needle one", "needle two"], 20, 0.7);
        assert_eq!(found.map(|(pos, _)| pos), Some(48));
    }

    #[test]
    fn window_search_respects_bounds() {
        let mut items = vec!["filler"; 60];
        items[55] = "needle";
        let file = lines(&items);
        assert!(find_best_context_match(&file, 30, &["needle"], 20, 0.7).is_none());
    }

    #[test]
    fn score_is_fractional() {
        let file = lines(&["a", "x", "c"]);
        let score = context_match_score(&file, 0, &["a", "b", "c"]);
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn similarity_rewards_near_matches() {
        assert_eq!(line_similarity("return 1;", "return 1;"), 1.0);
        let near = line_similarity("return 1;", "return 2;");
        assert!(near > 0.8 && near < 1.0);
        assert!(line_similarity("return 1;", "completely different") < 0.5);
    }

    #[test]
    fn block_similarity_averages_lines() {
        let file = lines(&["fn a() {", "    return 1;", "}"]);
        let sim = block_similarity(&file, 0, &["fn a() {", "    return 9;", "}"]);
        assert!(sim > 0.9);
        assert_eq!(block_similarity(&file, 2, &["x", "y"]), 0.0);
    }

    #[test]
    fn line_edit_distance_counts_changed_lines() {
        assert_eq!(line_edit_distance("a\nb\nc", "a\nb\nc"), 0);
        assert_eq!(line_edit_distance("a\nb\nc", "a\nX\nc"), 1);
        assert_eq!(line_edit_distance("a", "a\nb\nc"), 2);
    }
}
