//! Bounded line diff for staged and worktree content.
//!
//! The uncommitted scan only needs the *inserted* side of a diff between
//! the HEAD blob and the current worktree file. This module computes it
//! with a common prefix/suffix trim followed by an LCS over the middle,
//! under an explicit cell budget. Inputs whose middle exceeds the budget
//! degrade conservatively: every middle line on the new side is treated
//! as inserted, which can only widen what the matcher sees, never narrow
//! it.
//!
//! The resulting content is a concatenation of inserted lines, each
//! newline-terminated. It is not line-accurate; line numbers derived from
//! it downstream are approximate.

/// LCS table budget in cells. At 4 bytes per cell this caps the table at
/// 16 MiB; typical staged files trim to a tiny middle and never get near
/// it.
const MAX_LCS_CELLS: usize = 1 << 22;

/// Lines present in `new` but not matched to `old`, in order.
#[must_use]
pub fn inserted_lines<'a>(old: &str, new: &'a str) -> Vec<&'a str> {
    inserted_lines_bounded(old, new, MAX_LCS_CELLS)
}

/// The inserted lines concatenated, each followed by a newline.
#[must_use]
pub fn inserted_text(old: &str, new: &str) -> String {
    let lines = inserted_lines(old, new);
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn inserted_lines_bounded<'a>(old: &str, new: &'a str, max_cells: usize) -> Vec<&'a str> {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&'a str> = new.lines().collect();

    let shared = old_lines.len().min(new_lines.len());
    let mut prefix = 0;
    while prefix < shared && old_lines[prefix] == new_lines[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < shared - prefix
        && old_lines[old_lines.len() - 1 - suffix] == new_lines[new_lines.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mid_old = &old_lines[prefix..old_lines.len() - suffix];
    let mid_new = &new_lines[prefix..new_lines.len() - suffix];

    if mid_new.is_empty() {
        return Vec::new();
    }
    if mid_old.is_empty() || mid_old.len().saturating_mul(mid_new.len()) > max_cells {
        return mid_new.to_vec();
    }
    lcs_insertions(mid_old, mid_new)
}

/// Classic LCS backtrack, keeping only the new-side lines that have no
/// match on the old side.
fn lcs_insertions<'a>(old: &[&str], new: &[&'a str]) -> Vec<&'a str> {
    let rows = old.len() + 1;
    let cols = new.len() + 1;
    let mut table = vec![0u32; rows * cols];
    for i in 1..rows {
        for j in 1..cols {
            table[i * cols + j] = if old[i - 1] == new[j - 1] {
                table[(i - 1) * cols + (j - 1)] + 1
            } else {
                table[(i - 1) * cols + j].max(table[i * cols + (j - 1)])
            };
        }
    }

    let mut inserted = Vec::new();
    let (mut i, mut j) = (old.len(), new.len());
    while i > 0 && j > 0 {
        if old[i - 1] == new[j - 1] {
            i -= 1;
            j -= 1;
        } else if table[i * cols + (j - 1)] >= table[(i - 1) * cols + j] {
            inserted.push(new[j - 1]);
            j -= 1;
        } else {
            i -= 1;
        }
    }
    while j > 0 {
        inserted.push(new[j - 1]);
        j -= 1;
    }
    inserted.reverse();
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_inputs_insert_nothing() {
        assert!(inserted_lines("a\nb\n", "a\nb\n").is_empty());
        assert_eq!(inserted_text("a\nb\n", "a\nb\n"), "");
    }

    #[test]
    fn single_inserted_line_between_context() {
        let lines = inserted_lines("a\nb\n", "a\nSECRET\nb\n");
        assert_eq!(lines, vec!["SECRET"]);
        assert_eq!(inserted_text("a\nb\n", "a\nSECRET\nb\n"), "SECRET\n");
    }

    #[test]
    fn empty_old_side_inserts_everything() {
        assert_eq!(inserted_lines("", "x\ny\n"), vec!["x", "y"]);
    }

    #[test]
    fn replacement_counts_as_insertion() {
        let lines = inserted_lines("a\nold\nc\n", "a\nnew\nc\n");
        assert_eq!(lines, vec!["new"]);
    }

    #[test]
    fn deletion_only_inserts_nothing() {
        assert!(inserted_lines("a\nb\nc\n", "a\nc\n").is_empty());
    }

    #[test]
    fn over_budget_middle_falls_back_to_all_new_lines() {
        // Middle of 2x2 with a 1-cell budget takes the conservative path.
        let lines = inserted_lines_bounded("p\na\nb\nq\n", "p\nb\na\nq\n", 1);
        assert_eq!(lines, vec!["b", "a"]);
    }

    proptest! {
        #[test]
        fn inserted_lines_come_from_the_new_side(
            old in proptest::collection::vec("[a-c]{0,3}", 0..12),
            new in proptest::collection::vec("[a-c]{0,3}", 0..12),
        ) {
            let old_text = old.join("\n");
            let new_text = new.join("\n");
            for line in inserted_lines(&old_text, &new_text) {
                prop_assert!(new.iter().any(|l| l == line));
            }
        }

        #[test]
        fn appended_lines_are_reported_exactly(
            base in proptest::collection::vec("[a-c]{1,3}", 1..8),
            tail in proptest::collection::vec("[x-z]{1,3}", 1..4),
        ) {
            let old_text = base.join("\n");
            let mut all = base.clone();
            all.extend(tail.iter().cloned());
            let new_text = all.join("\n");
            let expected: Vec<&str> = tail.iter().map(String::as_str).collect();
            prop_assert_eq!(inserted_lines(&old_text, &new_text), expected);
        }
    }
}
