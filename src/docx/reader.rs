//! Read the visible text of a DOCX body: paragraphs and tables.
//!
//! Parsing is docx-rs's `read_docx`; this module only walks the resulting
//! document model. Deleted revisions, field instructions and drawings carry
//! no visible run text and are skipped.

use crate::docx::package::DocxPackage;
use crate::error::DocxError;
use docx_rs::{
    read_docx, DocumentChild, InsertChild, Paragraph, ParagraphChild, Run, RunChild,
    StructuredDataTagChild, Table, TableCell, TableCellContent, TableChild, TableRowChild,
};

/// Text content of a DOCX body, in document order per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocxBody {
    /// One entry per body-level paragraph (empty paragraphs included).
    pub paragraphs: Vec<String>,
    /// Body-level tables.
    pub tables: Vec<TableText>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableText {
    /// Rows of cell texts. A cell's paragraphs are joined with `\n`.
    pub rows: Vec<Vec<String>>,
}

/// Open a DOCX archive and read its main document body.
pub fn read_body(bytes: &[u8]) -> Result<DocxBody, DocxError> {
    // Inflate once under our part caps before docx-rs reads anything.
    DocxPackage::from_bytes(bytes)?;
    let docx = read_docx(bytes).map_err(|e| DocxError::Read(e.to_string()))?;

    let mut out = DocxBody::default();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => out.paragraphs.push(paragraph_text(p)),
            DocumentChild::Table(t) => out.tables.push(table_text(t)),
            DocumentChild::StructuredDataTag(sdt) => collect_tagged(&sdt.children, &mut out),
            _ => {}
        }
    }
    Ok(out)
}

/// Block content inside a content control.
fn collect_tagged(children: &[StructuredDataTagChild], out: &mut DocxBody) {
    for child in children {
        match child {
            StructuredDataTagChild::Paragraph(p) => out.paragraphs.push(paragraph_text(p)),
            StructuredDataTagChild::Table(t) => out.tables.push(table_text(t)),
            StructuredDataTagChild::StructuredDataTag(sdt) => collect_tagged(&sdt.children, out),
            _ => {}
        }
    }
}

/// Concatenated run text of one paragraph. Tabs and breaks become `\t`/`\n`.
pub fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        push_paragraph_child(child, &mut text);
    }
    text
}

fn push_paragraph_child(child: &ParagraphChild, text: &mut String) {
    match child {
        ParagraphChild::Run(run) => push_run(run, text),
        ParagraphChild::Hyperlink(link) => {
            for c in &link.children {
                push_paragraph_child(c, text);
            }
        }
        ParagraphChild::Insert(insert) => {
            for c in &insert.children {
                if let InsertChild::Run(run) = c {
                    push_run(run, text);
                }
            }
        }
        _ => {}
    }
}

fn push_run(run: &Run, text: &mut String) {
    for child in &run.children {
        match child {
            RunChild::Text(t) => text.push_str(&t.text),
            RunChild::Tab(_) => text.push('\t'),
            RunChild::Break(_) => text.push('\n'),
            _ => {}
        }
    }
}

fn table_text(table: &Table) -> TableText {
    let rows = table
        .rows
        .iter()
        .map(|row| match row {
            TableChild::TableRow(row) => row
                .cells
                .iter()
                .map(|cell| match cell {
                    TableRowChild::TableCell(cell) => cell_text(cell),
                })
                .collect(),
        })
        .collect();
    TableText { rows }
}

fn cell_text(cell: &TableCell) -> String {
    cell.children
        .iter()
        .filter_map(|c| match c {
            TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{BreakType, Docx, Hyperlink, HyperlinkType, TableRow};
    use std::io::Cursor;

    fn pack(docx: Docx) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        docx.build().pack(&mut out).unwrap();
        out.into_inner()
    }

    fn text_paragraph(text: &str) -> Paragraph {
        Paragraph::new().add_run(Run::new().add_text(text))
    }

    #[test]
    fn paragraph_runs_are_concatenated() {
        let bytes = pack(Docx::new().add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text("Jane"))
                .add_run(Run::new().add_text(" Doe").bold()),
        ));
        assert_eq!(read_body(&bytes).unwrap().paragraphs, vec!["Jane Doe"]);
    }

    #[test]
    fn tabs_breaks_and_hyperlinks() {
        let bytes = pack(
            Docx::new().add_paragraph(
                Paragraph::new()
                    .add_run(
                        Run::new()
                            .add_text("a")
                            .add_tab()
                            .add_text("b")
                            .add_break(BreakType::TextWrapping)
                            .add_text("c"),
                    )
                    .add_hyperlink(
                        Hyperlink::new("https://example.com", HyperlinkType::External)
                            .add_run(Run::new().add_text("!")),
                    ),
            ),
        );
        assert_eq!(read_body(&bytes).unwrap().paragraphs, vec!["a\tb\nc!"]);
    }

    #[test]
    fn tables_rows_and_multi_paragraph_cells() {
        let table = Table::new(vec![TableRow::new(vec![
            TableCell::new().add_paragraph(text_paragraph("Acme")),
            TableCell::new()
                .add_paragraph(text_paragraph("2019"))
                .add_paragraph(text_paragraph("2020")),
        ])]);
        let bytes = pack(
            Docx::new()
                .add_paragraph(text_paragraph("Intro"))
                .add_table(table)
                .add_paragraph(Paragraph::new()),
        );
        let body = read_body(&bytes).unwrap();
        assert_eq!(body.paragraphs, vec!["Intro", ""]);
        assert_eq!(
            body.tables,
            vec![TableText {
                rows: vec![vec!["Acme".to_string(), "2019\n2020".to_string()]]
            }]
        );
    }

    #[test]
    fn not_a_docx_is_an_error() {
        assert!(read_body(b"not a zip").is_err());
    }
}
