//! Grid printing.

use std::fmt::Write;

/// Render `values` as `rows` lines of `cols` values, each `{:.6}` followed
/// by a space, with a trailing blank line.
pub fn format_grid(values: &[f64], cols: usize) -> String {
    let mut out = String::with_capacity(values.len() * 10 + values.len() / cols.max(1) + 1);
    for row in values.chunks(cols.max(1)) {
        for v in row {
            // Writing to a String cannot fail.
            let _ = write!(out, "{v:.6} ");
        }
        out.push('\n');
    }
    out.push('\n');
    out
}

/// The summary line printed before the final grid.
pub fn summary(iterations: usize) -> String {
    format!("Reached in {iterations} iterations.")
}
