//! Table parsing: loosely formatted pipe tables → [`Grid`].
//!
//! Model-generated tables are rarely clean. Surrounding prose, a missing
//! separator row, or a row with a stray extra cell are all common. The parser
//! keeps what is well-formed and silently drops the rest; `None` is the only
//! failure signal and means "render this as text instead".
//!
//! ## Rules
//!
//! 1. Only trimmed lines that start *and* end with `|` are candidates.
//! 2. Fewer than two candidates is not a table.
//! 3. The first separator line (`| --- | :-: |`) is skipped.
//! 4. The first remaining candidate is the header and fixes the column count.
//! 5. Later candidates with a different cell count are dropped.
//! 6. A header with no non-empty cell is not a table.

use crate::model::Grid;
use tracing::debug;

/// Parse pipe-delimited tabular text. Never panics.
pub fn parse_table(text: &str) -> Option<Grid> {
    // ── Rule 1 ──
    let candidates: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| is_candidate(l))
        .collect();

    // ── Rule 2 ──
    if candidates.len() < 2 {
        return None;
    }

    // ── Rule 3 ──
    let separator = candidates.iter().position(|l| is_separator(l));

    let mut grid: Option<Grid> = None;
    let mut dropped = 0usize;
    for (i, line) in candidates.iter().enumerate() {
        if Some(i) == separator {
            continue;
        }
        let cells = split_cells(line);
        match grid.as_mut() {
            // ── Rule 4 + 6 ──
            None => {
                if cells.iter().all(|c| c.is_empty()) {
                    debug!("table header has no content; not a table");
                    return None;
                }
                grid = Some(Grid::new(cells).ok()?);
            }
            // ── Rule 5 ──
            Some(g) => {
                if g.push_row(cells).is_err() {
                    dropped += 1;
                }
            }
        }
    }

    if dropped > 0 {
        debug!("dropped {} table row(s) with a mismatched cell count", dropped);
    }
    grid
}

fn is_candidate(trimmed: &str) -> bool {
    trimmed.starts_with('|') && trimmed.ends_with('|')
}

/// Split a candidate line into trimmed cells, dropping the outer pipes.
fn split_cells(trimmed: &str) -> Vec<String> {
    let inner = trimmed
        .strip_prefix('|')
        .and_then(|s| s.strip_suffix('|'))
        .unwrap_or("");
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

fn is_separator(trimmed: &str) -> bool {
    split_cells(trimmed)
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':'))
}
