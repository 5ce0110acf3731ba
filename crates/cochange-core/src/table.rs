//! Minimal comma-separated table helpers shared by the statistics readers
//! and writers.

use std::borrow::Cow;

/// Quote `field` if it contains a comma, quote, or line break.
///
/// # Examples
///
/// ```
/// use cochange_core::table::escape_field;
///
/// assert_eq!(escape_field("plain"), "plain");
/// assert_eq!(escape_field("a,b"), "\"a,b\"");
/// assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
/// ```
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Join already-formatted cells into one row, escaping each.
pub fn join_row<'a, I>(cells: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    cells
        .into_iter()
        .map(escape_field)
        .collect::<Vec<_>>()
        .join(",")
}

/// Split one comma-separated line into cells, honouring double-quoted cells.
///
/// Returns `None` when a quoted cell is not terminated.
///
/// # Examples
///
/// ```
/// use cochange_core::table::split_row;
///
/// assert_eq!(split_row("a,\"b,c\",d").unwrap(), vec!["a", "b,c", "d"]);
/// assert!(split_row("a,\"b").is_none());
/// ```
pub fn split_row(line: &str) -> Option<Vec<String>> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            ('"', false) if current.is_empty() => in_quotes = true,
            (',', false) => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return None;
    }
    cells.push(current);
    Some(cells)
}

/// Format a floating-point cell, writing undefined values as `0`.
///
/// # Examples
///
/// ```
/// use cochange_core::table::format_cell;
///
/// assert_eq!(format_cell(f64::NAN), "0");
/// assert_eq!(format_cell(2.5), "2.5");
/// ```
pub fn format_cell(value: f64) -> String {
    if value.is_nan() {
        "0".into()
    } else {
        value.to_string()
    }
}

/// Parse a numeric cell that may be written as an integer or a decimal
/// (`"12"`, `"12.0"`). Empty cells read as zero.
pub fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(0.0);
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a non-negative count cell, accepting decimal spellings of whole numbers.
pub fn parse_count(cell: &str) -> Option<u64> {
    let value = parse_number(cell)?;
    if value < 0.0 || value.fract() != 0.0 {
        return None;
    }
    Some(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handles_escaped_quotes() {
        let cells = split_row("\"a \"\"quoted\"\" name\",1,2").unwrap();
        assert_eq!(cells, vec!["a \"quoted\" name", "1", "2"]);
    }

    #[test]
    fn split_keeps_empty_cells() {
        assert_eq!(split_row("a,,b,").unwrap(), vec!["a", "", "b", ""]);
    }

    #[test]
    fn join_then_split_preserves_cells() {
        let row = join_row(["src/a,b.java", "3", "x\"y"]);
        assert_eq!(split_row(&row).unwrap(), vec!["src/a,b.java", "3", "x\"y"]);
    }

    #[test]
    fn counts_accept_decimal_whole_numbers() {
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count("12.0"), Some(12));
        assert_eq!(parse_count(""), Some(0));
        assert_eq!(parse_count("1.5"), None);
        assert_eq!(parse_count("-3"), None);
        assert_eq!(parse_count("abc"), None);
    }

    #[test]
    fn numbers_reject_non_finite() {
        assert_eq!(parse_number("3.25"), Some(3.25));
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
    }
}
