//! Groups parsed elements into retrieval chunks. Pure and deterministic:
//! the same elements and config always produce the same chunks, which is what
//! makes re-ingest idempotent end to end.

use crate::application::services::token::{count_tokens, tail_tokens, take_tokens};
use crate::domain::entities::{Element, ElementKind, NewChunk};

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub min_tokens: usize,
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    /// A heading at this level or above forces a chunk boundary.
    pub header_break_level: i32,
    pub table_group_min_rows: usize,
    pub table_group_max_rows: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_tokens: 350,
            max_tokens: 700,
            overlap_tokens: 105,
            header_break_level: 2,
            table_group_min_rows: 20,
            table_group_max_rows: 60,
        }
    }
}

#[derive(Debug, Default)]
struct Buffer {
    text: String,
    page: Option<i32>,
    header_path: Vec<String>,
}

impl Buffer {
    fn push(&mut self, text: &str, page: Option<i32>, path: &[(i32, String)]) {
        if self.text.is_empty() {
            self.page = page;
            self.header_path = path.iter().map(|(_, h)| h.clone()).collect();
        } else {
            self.text.push_str("\n\n");
        }
        self.text.push_str(text);
    }

    fn tokens(&self) -> usize {
        count_tokens(&self.text)
    }

    fn take(&mut self) -> Buffer {
        std::mem::take(self)
    }
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        let mut config = config;
        // Overlap below max keeps the size-driven split making progress.
        config.overlap_tokens = config.overlap_tokens.min(config.max_tokens / 2);
        Self { config }
    }

    /// Build chunks from the document's elements in ordinal order.
    pub fn build(&self, elements: &[Element]) -> Vec<NewChunk> {
        let mut chunks: Vec<NewChunk> = Vec::new();
        let mut header_stack: Vec<(i32, String)> = Vec::new();
        let mut buf = Buffer::default();

        let mut ordered: Vec<&Element> = elements.iter().collect();
        ordered.sort_by_key(|e| e.ordinal);

        for element in ordered {
            match element.kind {
                ElementKind::Heading => {
                    let level = element.level.unwrap_or(1);
                    if level <= self.config.header_break_level
                        && buf.tokens() >= self.config.min_tokens
                    {
                        self.emit(buf.take(), &mut chunks);
                    }
                    while header_stack.last().is_some_and(|(l, _)| *l >= level) {
                        header_stack.pop();
                    }
                    header_stack.push((level, element.text.clone()));
                    if !element.text.is_empty() {
                        buf.push(&element.text, element.page, &header_stack);
                    }
                }
                ElementKind::Table => {
                    let markdown = element
                        .table_markdown
                        .as_deref()
                        .unwrap_or(element.text.as_str());
                    self.emit_table_groups(markdown, element.page, &header_stack, &mut chunks);
                }
                _ => {
                    if element.text.trim().is_empty() {
                        continue;
                    }
                    buf.push(&element.text, element.page, &header_stack);
                }
            }
            self.drain_oversize(&mut buf, &mut chunks);
        }

        if !buf.text.trim().is_empty() {
            self.emit(buf.take(), &mut chunks);
        }

        chunks
    }

    /// Split the buffer whenever it holds a full chunk plus at least the
    /// overlap, seeding each successor with the tail of its predecessor.
    fn drain_oversize(&self, buf: &mut Buffer, chunks: &mut Vec<NewChunk>) {
        while buf.tokens() > self.config.max_tokens {
            let full = buf.take();
            let (head, rest) = take_tokens(&full.text, self.config.max_tokens);
            let head = head.trim_end().to_string();
            let overlap = tail_tokens(&head, self.config.overlap_tokens).to_string();

            self.emit(
                Buffer {
                    text: head,
                    page: full.page,
                    header_path: full.header_path.clone(),
                },
                chunks,
            );

            let rest = rest.trim_start();
            if rest.is_empty() {
                // Nothing left beyond the emitted chunk; carrying the bare
                // overlap forward would re-emit its tail as its own chunk.
                *buf = Buffer::default();
                break;
            }
            let mut text = overlap;
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(rest);
            *buf = Buffer {
                text,
                page: full.page,
                header_path: full.header_path,
            };
        }
    }

    fn emit(&self, buf: Buffer, chunks: &mut Vec<NewChunk>) {
        let text = buf.text.trim().to_string();
        if text.is_empty() {
            return;
        }
        let token_count = count_tokens(&text) as i32;
        chunks.push(NewChunk {
            ordinal: chunks.len() as i32,
            page: buf.page,
            token_count,
            text,
            header_path: buf.header_path,
            is_table: false,
        });
    }

    /// Tables chunk independently: data rows are partitioned into balanced
    /// groups inside [min_rows, max_rows] with the header row repeated at the
    /// top of each group.
    fn emit_table_groups(
        &self,
        markdown: &str,
        page: Option<i32>,
        header_stack: &[(i32, String)],
        chunks: &mut Vec<NewChunk>,
    ) {
        let lines: Vec<&str> = markdown.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            return;
        }
        let header_path: Vec<String> = header_stack.iter().map(|(_, h)| h.clone()).collect();

        let (head, rows) = if lines.len() >= 2 && is_separator_row(lines[1]) {
            (vec![lines[0], lines[1]], &lines[2..])
        } else {
            (vec![lines[0]], &lines[1..])
        };

        if rows.is_empty() {
            let text = head.join("\n");
            chunks.push(NewChunk {
                ordinal: chunks.len() as i32,
                page,
                token_count: count_tokens(&text) as i32,
                text,
                header_path,
                is_table: true,
            });
            return;
        }

        let groups = partition_rows(
            rows.len(),
            self.config.table_group_min_rows,
            self.config.table_group_max_rows,
        );

        let mut offset = 0;
        for size in groups {
            let group = &rows[offset..offset + size];
            offset += size;
            let mut text = head.join("\n");
            for row in group {
                text.push('\n');
                text.push_str(row);
            }
            chunks.push(NewChunk {
                ordinal: chunks.len() as i32,
                page,
                token_count: count_tokens(&text) as i32,
                text,
                header_path: header_path.clone(),
                is_table: true,
            });
        }
    }
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
        && trimmed.contains('-')
}

/// Balanced partition of `n` rows into groups within [min, max]. A table
/// smaller than `min` stays whole.
fn partition_rows(n: usize, min: usize, max: usize) -> Vec<usize> {
    if n <= max {
        return vec![n];
    }
    let target = (min + max) / 2;
    let groups = n.div_ceil(target);
    let base = n / groups;
    let extra = n % groups;
    (0..groups)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(ordinal: i32, kind: ElementKind, text: &str, page: Option<i32>) -> Element {
        Element {
            id: ordinal as i64,
            document_id: 1,
            ordinal,
            kind,
            page,
            level: None,
            text: text.to_string(),
            table_markdown: if kind == ElementKind::Table {
                Some(text.to_string())
            } else {
                None
            },
        }
    }

    fn heading(ordinal: i32, level: i32, text: &str, page: Option<i32>) -> Element {
        let mut e = element(ordinal, ElementKind::Heading, text, page);
        e.level = Some(level);
        e
    }

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn small_config() -> ChunkerConfig {
        ChunkerConfig {
            min_tokens: 20,
            max_tokens: 50,
            overlap_tokens: 8,
            header_break_level: 2,
            table_group_min_rows: 3,
            table_group_max_rows: 6,
        }
    }

    #[test]
    fn all_but_last_chunk_respect_bounds() {
        let chunker = Chunker::new(small_config());
        let elements = vec![element(0, ElementKind::Paragraph, &words(180), Some(1))];
        let chunks = chunker.build(&elements);

        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.token_count >= 20 && chunk.token_count <= 50,
                "chunk of {} tokens outside bounds",
                chunk.token_count
            );
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let chunker = Chunker::new(small_config());
        let elements = vec![element(0, ElementKind::Paragraph, &words(120), Some(1))];
        let chunks = chunker.build(&elements);

        assert!(chunks.len() >= 2);
        let first_tail: Vec<&str> = chunks[0].text.split_whitespace().rev().take(3).collect();
        for word in first_tail {
            assert!(chunks[1].text.contains(word));
        }
    }

    #[test]
    fn heading_break_forces_boundary() {
        let chunker = Chunker::new(small_config());
        let elements = vec![
            heading(0, 1, "Intro", Some(1)),
            element(1, ElementKind::Paragraph, &words(30), Some(1)),
            heading(2, 1, "Details", Some(2)),
            element(3, ElementKind::Paragraph, &words(30), Some(2)),
        ];
        let chunks = chunker.build(&elements);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].header_path, vec!["Intro".to_string()]);
        assert_eq!(chunks[1].header_path, vec!["Details".to_string()]);
        assert_eq!(chunks[0].page, Some(1));
        assert_eq!(chunks[1].page, Some(2));
    }

    #[test]
    fn undersized_section_flows_into_next() {
        let chunker = Chunker::new(small_config());
        let elements = vec![
            heading(0, 1, "Tiny", Some(1)),
            element(1, ElementKind::Paragraph, "just a few words here", Some(1)),
            heading(2, 1, "Next", Some(1)),
            element(3, ElementKind::Paragraph, &words(30), Some(1)),
        ];
        let chunks = chunker.build(&elements);

        // The tiny section is below min_tokens, so the boundary is soft and
        // its text rides along with the next section.
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("just a few words"));
        assert!(chunks[0].text.contains("Next"));
    }

    #[test]
    fn header_path_tracks_nesting() {
        let mut config = small_config();
        config.header_break_level = 1;
        let chunker = Chunker::new(config);
        let elements = vec![
            heading(0, 1, "Guide", Some(1)),
            heading(1, 2, "Setup", Some(1)),
            element(2, ElementKind::Paragraph, &words(30), Some(1)),
        ];
        let chunks = chunker.build(&elements);

        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].header_path,
            vec!["Guide".to_string(), "Setup".to_string()]
        );
    }

    #[test]
    fn sibling_heading_replaces_stack_entry() {
        let chunker = Chunker::new(small_config());
        let elements = vec![
            heading(0, 1, "Doc", None),
            heading(1, 2, "First", None),
            element(2, ElementKind::Paragraph, &words(30), None),
            heading(3, 2, "Second", None),
            element(4, ElementKind::Paragraph, &words(30), None),
        ];
        let chunks = chunker.build(&elements);

        let last = chunks.last().unwrap();
        assert_eq!(
            last.header_path,
            vec!["Doc".to_string(), "Second".to_string()]
        );
        assert!(!last.header_path.contains(&"First".to_string()));
    }

    fn table_markdown(rows: usize) -> String {
        let mut md = String::from("| id | name |\n| --- | --- |");
        for i in 0..rows {
            md.push_str(&format!("\n| {} | row{} |", i, i));
        }
        md
    }

    #[test]
    fn small_table_is_one_chunk() {
        let chunker = Chunker::new(small_config());
        let elements = vec![element(0, ElementKind::Table, &table_markdown(4), Some(2))];
        let chunks = chunker.build(&elements);

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_table);
        assert_eq!(chunks[0].page, Some(2));
        assert!(chunks[0].text.starts_with("| id | name |"));
    }

    #[test]
    fn large_table_splits_with_repeated_header() {
        let chunker = Chunker::new(small_config());
        let elements = vec![element(0, ElementKind::Table, &table_markdown(14), Some(3))];
        let chunks = chunker.build(&elements);

        assert!(chunks.len() > 1);
        let mut seen_rows = 0;
        for chunk in &chunks {
            assert!(chunk.is_table);
            assert!(chunk.text.starts_with("| id | name |"));
            let rows = chunk.text.lines().count() - 2;
            assert!(rows >= 3 && rows <= 6, "group of {} rows", rows);
            seen_rows += rows;
        }
        assert_eq!(seen_rows, 14);
    }

    #[test]
    fn table_does_not_break_surrounding_text() {
        let chunker = Chunker::new(small_config());
        let elements = vec![
            element(0, ElementKind::Paragraph, "before the table", Some(1)),
            element(1, ElementKind::Table, &table_markdown(4), Some(1)),
            element(2, ElementKind::Paragraph, &words(30), Some(1)),
        ];
        let chunks = chunker.build(&elements);

        let text_chunks: Vec<_> = chunks.iter().filter(|c| !c.is_table).collect();
        assert_eq!(text_chunks.len(), 1);
        assert!(text_chunks[0].text.contains("before the table"));
        assert!(text_chunks[0].text.contains("word0"));
    }

    #[test]
    fn deterministic_across_runs() {
        let chunker = Chunker::new(small_config());
        let elements = vec![
            heading(0, 1, "Title", Some(1)),
            element(1, ElementKind::Paragraph, &words(90), Some(1)),
            element(2, ElementKind::Table, &table_markdown(10), Some(2)),
        ];
        let a = chunker.build(&elements);
        let b = chunker.build(&elements);
        assert_eq!(a, b);
    }

    #[test]
    fn ordinals_are_dense_and_ordered() {
        let chunker = Chunker::new(small_config());
        let elements = vec![
            element(0, ElementKind::Paragraph, &words(120), Some(1)),
            element(1, ElementKind::Table, &table_markdown(8), Some(2)),
        ];
        let chunks = chunker.build(&elements);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i as i32);
        }
    }

    #[test]
    fn partition_balances_groups() {
        assert_eq!(partition_rows(4, 20, 60), vec![4]);
        assert_eq!(partition_rows(61, 20, 60), vec![31, 30]);
        let sizes = partition_rows(200, 20, 60);
        assert_eq!(sizes.iter().sum::<usize>(), 200);
        for size in sizes {
            assert!((20..=60).contains(&size));
        }
    }
}
