use crate::ids::{CommitId, PageId};
use crate::line::Line;

/// Local mirror of a page's authoritative state: `{pageId, parentId,
/// created, lines}` (§3).
///
/// Owned exclusively by one Page Room; external callers never touch it
/// directly (§5, Shared-resource policy).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageMirror {
    pub page_id: PageId,
    /// The latest acknowledged or observed head-commit id.
    pub parent_id: CommitId,
    /// False iff the page has never been materialized server-side.
    pub created: bool,
    pub lines: Vec<Line>,
}

/// How many lines after the title make up the description snapshot: lines
/// 2..6 (indices 1..6).
pub const DESCRIPTION_LINE_COUNT: usize = 5;

impl PageMirror {
    pub fn new(page_id: PageId, parent_id: CommitId, created: bool, lines: Vec<Line>) -> Self {
        Self {
            page_id,
            parent_id,
            created,
            lines,
        }
    }

    /// Invariant I2: once `created`, at least one line (the title) exists.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.created && self.lines.is_empty() {
            return Err("invariant I2 violated: created page has no lines".into());
        }
        let mut seen = std::collections::HashSet::with_capacity(self.lines.len());
        for line in &self.lines {
            if !seen.insert(&line.id) {
                return Err(format!("invariant I1 violated: duplicate line id {}", line.id));
            }
        }
        Ok(())
    }

    pub fn title(&self) -> &str {
        self.lines.first().map(|l| l.text.as_str()).unwrap_or("")
    }

    pub fn description_texts(&self) -> Vec<String> {
        description_texts_of(&self.lines)
    }
}

/// Lines 2..6 (1-indexed) of an arbitrary line list, clamped to what exists.
/// Factored out of `PageMirror` so the push pipeline can apply the same
/// slicing rule to a trial (not-yet-committed) line list.
pub fn description_slice(lines: &[Line]) -> &[Line] {
    if lines.len() <= 1 {
        &[]
    } else {
        let end = (1 + DESCRIPTION_LINE_COUNT).min(lines.len());
        &lines[1..end]
    }
}

pub fn description_texts_of(lines: &[Line]) -> Vec<String> {
    description_slice(lines)
        .iter()
        .map(|l| l.text.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{LineId, UnixSeconds, UserId};

    fn line(id: &str, text: &str) -> Line {
        Line::new(
            LineId::new(id),
            text,
            UserId::new("u1"),
            UnixSeconds(1_700_000_000),
        )
    }

    #[test]
    fn description_lines_clamp_to_available() {
        let mirror = PageMirror::new(
            PageId::new("p1"),
            CommitId::new("c1"),
            true,
            vec![line("L1", "title"), line("L2", "a"), line("L3", "b")],
        );
        let desc = mirror.description_texts();
        assert_eq!(desc, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn empty_created_page_violates_i2() {
        let mirror = PageMirror::new(PageId::new("p1"), CommitId::new("c1"), true, vec![]);
        assert!(mirror.check_invariants().is_err());
    }
}
