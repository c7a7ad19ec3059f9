use super::{FormatParser, tables::rows_to_markdown};
use crate::application::ports::ParseError;
use crate::domain::entities::NewElement;

/// CSV/TSV as one canonical markdown table, first row as header. Quoted
/// fields keep embedded delimiters; splitting beyond that is the chunker's
/// job.
pub struct DelimitedParser {
    delimiter: char,
    mimes: &'static [&'static str],
}

impl DelimitedParser {
    pub fn comma() -> Self {
        Self {
            delimiter: ',',
            mimes: &["text/csv", "application/csv"],
        }
    }

    pub fn tab() -> Self {
        Self {
            delimiter: '\t',
            mimes: &["text/tab-separated-values"],
        }
    }
}

impl FormatParser for DelimitedParser {
    fn can_parse(&self, mime: &str) -> bool {
        self.mimes.contains(&mime)
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<NewElement>, ParseError> {
        let text = String::from_utf8_lossy(bytes);
        let rows: Vec<Vec<String>> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| split_record(line, self.delimiter))
            .collect();

        if rows.is_empty() {
            return Err(ParseError::Failed("empty delimited file".to_string()));
        }

        Ok(vec![NewElement::table(0, rows_to_markdown(&rows), None)])
    }
}

fn split_record(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            c if c == delimiter && !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            c => field.push(c),
        }
    }
    fields.push(field);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ElementKind;

    #[test]
    fn csv_becomes_single_table_element() {
        let parser = DelimitedParser::comma();
        let elements = parser.parse(b"id,name\n1,alpha\n2,beta").unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::Table);
        let md = elements[0].table_markdown.as_ref().unwrap();
        assert!(md.starts_with("| id | name |"));
        assert!(md.contains("| 2 | beta |"));
    }

    #[test]
    fn quoted_fields_keep_delimiters() {
        assert_eq!(
            split_record("1,\"alpha, beta\",3", ','),
            vec!["1", "alpha, beta", "3"]
        );
    }

    #[test]
    fn doubled_quotes_unescape() {
        assert_eq!(
            split_record("\"say \"\"hi\"\"\"", ','),
            vec!["say \"hi\""]
        );
    }

    #[test]
    fn tsv_splits_on_tabs() {
        let parser = DelimitedParser::tab();
        let elements = parser.parse(b"a\tb\n1\t2").unwrap();
        assert!(elements[0]
            .table_markdown
            .as_ref()
            .unwrap()
            .contains("| a | b |"));
    }

    #[test]
    fn empty_file_fails() {
        let parser = DelimitedParser::comma();
        assert!(parser.parse(b"  \n ").is_err());
    }
}
