//! Canonical markdown rendering for tables: first row is the header,
//! separator row follows, cells are pipe-escaped and single-line.

/// Render rows of cells as canonical markdown. The first row becomes the
/// header; ragged rows are padded to the widest row.
pub fn rows_to_markdown(rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(1).max(1);

    let render = |row: &[String]| {
        let mut cells: Vec<String> = row.iter().map(|c| clean_cell(c)).collect();
        cells.resize(width, String::new());
        format!("| {} |", cells.join(" | "))
    };

    let mut out = render(&rows[0]);
    out.push('\n');
    out.push_str(&format!("|{}", " --- |".repeat(width)));
    for row in &rows[1..] {
        out.push('\n');
        out.push_str(&render(row));
    }
    out
}

fn clean_cell(cell: &str) -> String {
    cell.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn first_row_is_header() {
        let md = rows_to_markdown(&[row(&["id", "name"]), row(&["1", "alpha"])]);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "| id | name |");
        assert_eq!(lines[1], "| --- | --- |");
        assert_eq!(lines[2], "| 1 | alpha |");
    }

    #[test]
    fn ragged_rows_are_padded() {
        let md = rows_to_markdown(&[row(&["a", "b", "c"]), row(&["1"])]);
        assert!(md.lines().nth(2).unwrap().matches('|').count() == 4);
    }

    #[test]
    fn cells_are_flattened_and_escaped() {
        let md = rows_to_markdown(&[row(&["multi\nline", "pipe|cell"])]);
        assert!(md.contains("multi line"));
        assert!(md.contains("pipe\\|cell"));
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(rows_to_markdown(&[]), "");
    }
}
