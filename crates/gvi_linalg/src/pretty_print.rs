//! Box-drawing pretty-printers for vectors and matrices, used by the CLI
//! and by tests that want a human-readable dump of an iterate.

use crate::{Float, Matrix, Vector};

const TOP_LEFT: char = '┌';
const TOP_RIGHT: char = '┐';
const BOTTOM_LEFT: char = '└';
const BOTTOM_RIGHT: char = '┘';
const VERTICAL: char = '│';
const HORIZONTAL: char = '─';

/// Number of integral digits needed to print `x`, used to align columns.
///
/// ```
/// assert_eq!(gvi_linalg::pretty_print::num_of_integral_digits(9.0), 1);
/// assert_eq!(gvi_linalg::pretty_print::num_of_integral_digits(10.0), 2);
/// assert_eq!(gvi_linalg::pretty_print::num_of_integral_digits(-10.0), 2);
/// ```
#[must_use]
pub fn num_of_integral_digits(x: Float) -> usize {
    let x = x.abs().trunc();
    if x < 1.0 {
        1
    } else {
        (x.log10().floor() as usize) + 1
    }
}

fn column_width(values: impl Iterator<Item = Float>, decimals: usize) -> usize {
    values
        .map(|v| num_of_integral_digits(v) + decimals + 2)
        .max()
        .unwrap_or(1)
}

/// Renders a vector as a boxed, fixed-decimal column.
#[must_use]
pub fn pretty_format_vector(v: &Vector<Float>, decimals: usize) -> String {
    let width = column_width(v.iter().copied(), decimals);
    let mut out = String::new();
    out.push(TOP_LEFT);
    out.push_str(&HORIZONTAL.to_string().repeat(width));
    out.push(TOP_RIGHT);
    out.push('\n');
    for &value in v {
        out.push(VERTICAL);
        out.push_str(&format!("{value:>width$.decimals$}"));
        out.push(VERTICAL);
        out.push('\n');
    }
    out.push(BOTTOM_LEFT);
    out.push_str(&HORIZONTAL.to_string().repeat(width));
    out.push(BOTTOM_RIGHT);
    out
}

/// Renders a matrix as a boxed, fixed-decimal grid, one row per line.
#[must_use]
pub fn pretty_format_matrix(m: &Matrix<Float>, decimals: usize) -> String {
    let width = column_width(m.iter().copied(), decimals);
    let row_width = width * m.ncols();
    let mut out = String::new();
    out.push(TOP_LEFT);
    out.push_str(&HORIZONTAL.to_string().repeat(row_width));
    out.push(TOP_RIGHT);
    out.push('\n');
    for row in m.rows() {
        out.push(VERTICAL);
        for &value in row {
            out.push_str(&format!("{value:>width$.decimals$}"));
        }
        out.push(VERTICAL);
        out.push('\n');
    }
    out.push(BOTTOM_LEFT);
    out.push_str(&HORIZONTAL.to_string().repeat(row_width));
    out.push(BOTTOM_RIGHT);
    out
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn vector_printout_has_one_line_per_entry_plus_borders() {
        let v: Vector<Float> = array![1.0, 2.0, 3.0];
        let printed = pretty_format_vector(&v, 2);
        assert_eq!(printed.lines().count(), 5);
    }

    #[test]
    fn matrix_printout_has_one_line_per_row_plus_borders() {
        let m: Matrix<Float> = array![[1.0, 2.0], [3.0, 4.0]];
        let printed = pretty_format_matrix(&m, 4);
        assert_eq!(printed.lines().count(), 4);
    }
}
