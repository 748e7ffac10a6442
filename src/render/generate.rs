//! Full-generation layout: the capability document built from scratch.
//!
//! Page one opens with a header carrying the name and title in large type
//! (logo on the right); later pages repeat "Name – Title" in a small running
//! header. The body is, in order: a shaded box with Industries and
//! Qualifications, Summary, Experience and a Full Work History table. The
//! footer holds the logo and a PAGE field on every page.

use crate::docx::xml::sanitize_text;
use crate::error::{DocxError, RenderError};
use crate::profile::{ExperienceEntry, ProfileRecord};
use crate::render::logo::LogoImage;
use crate::render::ProfileRenderer;
use docx_rs::{
    AbstractNumbering, AlignmentType, BreakType, Docx, FieldCharType, Footer, Header, IndentLevel,
    InstrPAGE, InstrText, Level, LevelJc, LevelText, LineSpacing, NumberFormat, Numbering,
    NumberingId, PageMargin, Paragraph, Pic, Run, Shading, SpecialIndentType, Start, Table,
    TableCell, TableLayoutType, TableRow, WidthType,
};
use std::io::Cursor;
use std::path::PathBuf;
use tracing::debug;

pub const ACCENT: &str = "1F4E79";
pub const MUTED: &str = "595959";
pub const BOX_FILL: &str = "E6EEF5";

/// Company / Years / Role.
pub const WORK_HISTORY_WIDTHS: [usize; 3] = [3855, 2313, 3470];
pub const WORK_HISTORY_HEADERS: [&str; 3] = ["Company", "Years", "Role"];

// A4 in twentieths of a point, 2 cm margins.
const PAGE_WIDTH: u32 = 11_906;
const PAGE_HEIGHT: u32 = 16_838;
const MARGIN: i32 = 1_134;
const CONTENT_WIDTH: usize = 9_638;

const LOGO_COLUMN: usize = 3_000;
const HEADER_LOGO_CM: f64 = 1.5;
const FOOTER_LOGO_CM: f64 = 0.8;

/// numId 1 is taken by docx-rs's default numbering part.
const BULLETS: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct GeneratedLayout {
    logo_path: Option<PathBuf>,
}

impl GeneratedLayout {
    pub fn new(logo_path: Option<PathBuf>) -> Self {
        Self { logo_path }
    }
}

enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

impl ProfileRenderer for GeneratedLayout {
    fn name(&self) -> &'static str {
        "generate"
    }

    fn render(&self, record: &ProfileRecord) -> Result<Vec<u8>, RenderError> {
        let logo = LogoImage::load_optional(self.logo_path.as_deref())?;
        let logo_pic = |height_cm| logo.as_ref().map(|l| l.picture(height_cm)).transpose();

        let mut docx = Docx::new()
            .page_size(PAGE_WIDTH, PAGE_HEIGHT)
            .page_margin(
                PageMargin::new()
                    .top(MARGIN)
                    .bottom(MARGIN)
                    .left(MARGIN)
                    .right(MARGIN)
                    .header(567)
                    .footer(567),
            )
            .add_abstract_numbering(bullet_numbering())
            .add_numbering(Numbering::new(BULLETS, BULLETS))
            .first_header(first_page_header(record, logo_pic(HEADER_LOGO_CM)?))
            .header(running_header(record))
            .first_footer(footer(logo_pic(FOOTER_LOGO_CM)?))
            .footer(footer(logo_pic(FOOTER_LOGO_CM)?));

        let body = body_blocks(record);
        debug!(blocks = body.len(), "Generated profile layout");
        for block in body {
            docx = match block {
                Block::Paragraph(p) => docx.add_paragraph(p),
                Block::Table(t) => docx.add_table(t),
            };
        }

        let mut out = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut out)
            .map_err(|e| DocxError::Pack(e.to_string()))?;
        Ok(out.into_inner())
    }
}

/// A run for model-supplied text. Characters XML cannot carry are dropped;
/// `\n` and `\t` become breaks and tabs.
fn text_run(text: &str) -> Run {
    let clean = sanitize_text(text);
    let mut run = Run::new();
    for (i, line) in clean.split('\n').enumerate() {
        if i > 0 {
            run = run.add_break(BreakType::TextWrapping);
        }
        for (j, segment) in line.split('\t').enumerate() {
            if j > 0 {
                run = run.add_tab();
            }
            if !segment.is_empty() {
                run = run.add_text(segment);
            }
        }
    }
    run
}

fn text_paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(text_run(text))
}

fn spacing_after(paragraph: Paragraph, twips: u32) -> Paragraph {
    paragraph.line_spacing(LineSpacing::new().after(twips))
}

fn bullet(paragraph: Paragraph) -> Paragraph {
    paragraph.numbering(NumberingId::new(BULLETS), IndentLevel::new(0))
}

fn bullet_numbering() -> AbstractNumbering {
    AbstractNumbering::new(BULLETS).add_level(
        Level::new(
            0,
            Start::new(1),
            NumberFormat::new("bullet"),
            LevelText::new("•"),
            LevelJc::new("left"),
        )
        .indent(Some(360), Some(SpecialIndentType::Hanging(360)), None, None),
    )
}

fn cell(paragraphs: Vec<Paragraph>, width: usize) -> TableCell {
    let cell = TableCell::new().width(width, WidthType::Dxa);
    if paragraphs.is_empty() {
        return cell.add_paragraph(Paragraph::new());
    }
    paragraphs.into_iter().fold(cell, TableCell::add_paragraph)
}

fn fixed_table(rows: Vec<TableRow>, grid: Vec<usize>) -> Table {
    Table::new(rows)
        .set_grid(grid)
        .layout(TableLayoutType::Fixed)
        .width(CONTENT_WIDTH, WidthType::Dxa)
}

fn first_page_header(record: &ProfileRecord, logo: Option<Pic>) -> Header {
    let name = spacing_after(
        Paragraph::new().add_run(text_run(record.name.trim()).bold().color(ACCENT).size(56)),
        0,
    );
    let title = spacing_after(
        Paragraph::new().add_run(
            text_run(record.professional_title.trim())
                .color(MUTED)
                .size(32),
        ),
        0,
    );
    let mut logo_paragraph = spacing_after(Paragraph::new().align(AlignmentType::Right), 0);
    if let Some(pic) = logo {
        logo_paragraph = logo_paragraph.add_run(Run::new().add_image(pic));
    }

    let left = CONTENT_WIDTH - LOGO_COLUMN;
    let row = TableRow::new(vec![
        cell(vec![name, title], left),
        cell(vec![logo_paragraph], LOGO_COLUMN),
    ]);
    Header::new().add_table(fixed_table(vec![row], vec![left, LOGO_COLUMN]).clear_all_border())
}

/// "Name – Title", or whichever half is present.
pub fn running_header_text(record: &ProfileRecord) -> String {
    [record.name.trim(), record.professional_title.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" – ")
}

fn running_header(record: &ProfileRecord) -> Header {
    Header::new().add_paragraph(
        Paragraph::new()
            .align(AlignmentType::Right)
            .add_run(text_run(&running_header_text(record)).color(MUTED).size(18)),
    )
}

fn page_field() -> Run {
    Run::new()
        .add_field_char(FieldCharType::Begin, false)
        .add_instr_text(InstrText::PAGE(InstrPAGE::new()))
        .add_field_char(FieldCharType::Separate, false)
        .add_text("1")
        .add_field_char(FieldCharType::End, false)
        .color(MUTED)
        .size(18)
}

fn footer(logo: Option<Pic>) -> Footer {
    let mut left = spacing_after(Paragraph::new(), 0);
    if let Some(pic) = logo {
        left = left.add_run(Run::new().add_image(pic));
    }
    let right = spacing_after(
        Paragraph::new()
            .align(AlignmentType::Right)
            .add_run(Run::new().add_text("Page ").color(MUTED).size(18))
            .add_run(page_field()),
        0,
    );

    let first = CONTENT_WIDTH - LOGO_COLUMN;
    let row = TableRow::new(vec![cell(vec![left], first), cell(vec![right], LOGO_COLUMN)]);
    Footer::new().add_table(fixed_table(vec![row], vec![first, LOGO_COLUMN]).clear_all_border())
}

fn section_heading(text: &str) -> Block {
    Block::Paragraph(
        Paragraph::new()
            .add_run(Run::new().add_text(text).bold().color(ACCENT).size(26))
            .line_spacing(LineSpacing::new().before(240).after(80))
            .keep_next(true),
    )
}

fn body_blocks(record: &ProfileRecord) -> Vec<Block> {
    let mut body = Vec::new();

    if let Some(shaded) = capability_box(record) {
        body.push(Block::Table(shaded));
    }

    body.push(section_heading("Summary"));
    let summary = record.summary.trim();
    if !summary.is_empty() {
        body.push(Block::Paragraph(text_paragraph(summary)));
    }

    body.push(section_heading("Experience"));
    for entry in &record.experience {
        experience_blocks(entry, &mut body);
    }

    body.push(section_heading("Full Work History"));
    body.push(Block::Table(work_history_table(record)));
    body
}

fn box_heading(text: &str) -> Paragraph {
    spacing_after(
        Paragraph::new()
            .add_run(Run::new().add_text(text).bold().color(ACCENT).size(24))
            .keep_next(true),
        60,
    )
}

/// Industries then Qualifications in one shaded cell; `None` when both are empty.
fn capability_box(record: &ProfileRecord) -> Option<Table> {
    let mut paragraphs = Vec::new();

    if !record.industries.is_empty() {
        paragraphs.push(box_heading("Industries"));
        for group in record.industries.groups() {
            paragraphs.push(spacing_after(
                Paragraph::new()
                    .add_run(text_run(group.industry.trim()).bold())
                    .keep_next(true),
                40,
            ));
            for company in group.companies.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
                paragraphs.push(spacing_after(bullet(text_paragraph(company)), 20));
            }
        }
    }

    let qualification_lines = qualification_lines(record);
    if !qualification_lines.is_empty() {
        paragraphs.push(box_heading("Qualifications"));
        for line in qualification_lines {
            paragraphs.push(spacing_after(text_paragraph(&line), 40));
        }
    }

    if paragraphs.is_empty() {
        return None;
    }
    let shaded = cell(paragraphs, CONTENT_WIDTH).shading(Shading::new().fill(BOX_FILL));
    Some(fixed_table(vec![TableRow::new(vec![shaded])], vec![CONTENT_WIDTH]).clear_all_border())
}

/// One line per qualification; a "Certifications" entry expands into one
/// line per `;`-separated item.
pub fn qualification_lines(record: &ProfileRecord) -> Vec<String> {
    let mut lines = Vec::new();
    for q in &record.qualifications {
        if q.is_certification_list() {
            lines.extend(q.certification_items().into_iter().map(str::to_string));
            continue;
        }
        let degree = q.degree.trim();
        let institution = q.institution.trim();
        match (degree.is_empty(), institution.is_empty()) {
            (false, false) => lines.push(format!("{degree}: {institution}")),
            (false, true) => lines.push(degree.to_string()),
            (true, false) => lines.push(institution.to_string()),
            (true, true) => {}
        }
    }
    lines
}

/// "Company | Start – End", dropping whatever is missing.
pub fn experience_meta_line(entry: &ExperienceEntry) -> String {
    let dates = [entry.start_date.trim(), entry.end_date.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" – ");
    [entry.company.trim(), dates.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn experience_blocks(entry: &ExperienceEntry, body: &mut Vec<Block>) {
    let role = entry.role.trim();
    if !role.is_empty() {
        body.push(Block::Paragraph(spacing_after(
            Paragraph::new()
                .add_run(text_run(role).bold().color(ACCENT).size(24))
                .keep_next(true),
            20,
        )));
    }
    let meta = experience_meta_line(entry);
    if !meta.is_empty() {
        body.push(Block::Paragraph(
            Paragraph::new()
                .add_run(text_run(&meta).italic().color(MUTED))
                .keep_next(true),
        ));
    }
    let details = entry.details.trim();
    if !details.is_empty() {
        body.push(Block::Paragraph(text_paragraph(details)));
    }
    for highlight in entry
        .key_highlights
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
    {
        body.push(Block::Paragraph(spacing_after(
            bullet(text_paragraph(highlight)),
            40,
        )));
    }
}

fn work_history_table(record: &ProfileRecord) -> Table {
    let header = WORK_HISTORY_HEADERS
        .iter()
        .zip(WORK_HISTORY_WIDTHS)
        .map(|(h, width)| {
            let label = spacing_after(Paragraph::new().add_run(Run::new().add_text(*h).bold()), 0);
            cell(vec![label], width).shading(Shading::new().fill(BOX_FILL))
        })
        .collect();

    let mut rows = vec![TableRow::new(header)];
    for entry in &record.full_work_history {
        let values = [entry.company.trim(), entry.years.trim(), entry.role.trim()];
        rows.push(TableRow::new(
            values
                .iter()
                .zip(WORK_HISTORY_WIDTHS)
                .map(|(value, width)| cell(vec![text_paragraph(value)], width))
                .collect(),
        ));
    }
    fixed_table(rows, WORK_HISTORY_WIDTHS.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::package::{DocxPackage, DOCUMENT_XML};
    use crate::docx::{read_body, xml};
    use crate::profile::{IndustryGroup, Industries, Qualification, WorkHistoryEntry};

    fn sample() -> ProfileRecord {
        ProfileRecord {
            name: "Jordan Lee".into(),
            professional_title: "Data Engineer".into(),
            industries: Industries::new(vec![IndustryGroup {
                industry: "Banking".into(),
                companies: vec!["NAB".into(), "ANZ".into()],
            }]),
            qualifications: vec![
                Qualification {
                    degree: "BSc".into(),
                    institution: "UNSW".into(),
                },
                Qualification {
                    degree: "certifications".into(),
                    institution: "AWS SA; ; CKA".into(),
                },
            ],
            summary: "Builds pipelines.".into(),
            experience: vec![ExperienceEntry {
                role: "Lead".into(),
                company: "NAB".into(),
                start_date: "2020".into(),
                end_date: "Present".into(),
                details: "Owned the lake.".into(),
                key_highlights: vec!["Cut costs".into(), "  ".into()],
            }],
            full_work_history: vec![
                WorkHistoryEntry {
                    company: "NAB".into(),
                    years: "2020-Present".into(),
                    role: "Lead".into(),
                },
                WorkHistoryEntry {
                    company: "ANZ".into(),
                    years: String::new(),
                    role: "Engineer".into(),
                },
            ],
            ..Default::default()
        }
    }

    /// Contents of every part whose name starts with `prefix` and ends in `.xml`.
    fn parts_named(pkg: &DocxPackage, prefix: &str) -> Vec<String> {
        pkg.part_names()
            .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
            .map(|n| String::from_utf8_lossy(pkg.part(n).unwrap()).into_owned())
            .collect()
    }

    #[test]
    fn certifications_expand_to_one_line_each() {
        assert_eq!(
            qualification_lines(&sample()),
            vec!["BSc: UNSW", "AWS SA", "CKA"]
        );
    }

    #[test]
    fn meta_line_drops_missing_parts() {
        let mut e = sample().experience.remove(0);
        assert_eq!(experience_meta_line(&e), "NAB | 2020 – Present");
        e.start_date.clear();
        assert_eq!(experience_meta_line(&e), "NAB | Present");
        e.company.clear();
        e.end_date.clear();
        assert_eq!(experience_meta_line(&e), "");
    }

    #[test]
    fn running_header_uses_name_and_title() {
        let mut r = sample();
        assert_eq!(running_header_text(&r), "Jordan Lee – Data Engineer");
        r.professional_title.clear();
        assert_eq!(running_header_text(&r), "Jordan Lee");
    }

    #[test]
    fn renders_full_layout() {
        let bytes = GeneratedLayout::default().render(&sample()).unwrap();
        let body = read_body(&bytes).unwrap();

        assert!(body.paragraphs.contains(&"Builds pipelines.".to_string()));
        assert!(body.paragraphs.contains(&"NAB | 2020 – Present".to_string()));
        assert!(body.paragraphs.contains(&"Cut costs".to_string()));

        // Shaded box first, work history last.
        let shaded = &body.tables[0].rows[0][0];
        assert!(shaded.contains("Banking\nNAB\nANZ"), "{shaded}");
        assert!(shaded.contains("BSc: UNSW\nAWS SA\nCKA"), "{shaded}");

        let history = body.tables.last().unwrap();
        assert_eq!(
            history.rows,
            vec![
                vec!["Company", "Years", "Role"],
                vec!["NAB", "2020-Present", "Lead"],
                vec!["ANZ", "", "Engineer"],
            ]
        );

        let pkg = DocxPackage::from_bytes(&bytes).unwrap();
        let doc = pkg.xml_part(DOCUMENT_XML).unwrap();
        // Two companies + one non-blank highlight.
        assert_eq!(doc.root.descendants("w:numPr").len(), 3);
        assert_eq!(doc.root.descendants("w:titlePg").len(), 1);

        let headers = parts_named(&pkg, "word/header");
        assert_eq!(headers.len(), 2);
        assert!(headers.iter().all(|h| h.contains("Jordan Lee")));
        assert!(headers
            .iter()
            .any(|h| h.contains("Jordan Lee – Data Engineer")));

        let footers = parts_named(&pkg, "word/footer");
        assert!(!footers.is_empty());
        for f in &footers {
            let footer = xml::parse(f).unwrap();
            let instr = footer.root.descendants("w:instrText");
            assert_eq!(instr.len(), 1);
            assert!(matches!(&instr[0].children[..], [xml::Node::Text(t)] if t.contains("PAGE")));
        }
    }

    #[test]
    fn control_characters_are_kept_out_of_every_part() {
        let record = ProfileRecord {
            name: "Jordan\u{1} Lee".into(),
            summary: "Page one\u{0C}page two\u{0B}end".into(),
            ..sample()
        };
        let bytes = GeneratedLayout::default().render(&record).unwrap();

        let pkg = DocxPackage::from_bytes(&bytes).unwrap();
        for name in pkg.part_names().filter(|n| n.ends_with(".xml")) {
            let data = pkg.part(name).unwrap();
            let bad: Vec<u8> = data
                .iter()
                .copied()
                .filter(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r'))
                .collect();
            assert!(bad.is_empty(), "{name} contains {bad:?}");
        }

        let body = read_body(&bytes).unwrap();
        assert!(body
            .paragraphs
            .contains(&"Page one\npage two\nend".to_string()));
        assert!(parts_named(&pkg, "word/header")
            .iter()
            .any(|h| h.contains("Jordan Lee")));
    }

    #[test]
    fn empty_record_renders_without_items() {
        let record = ProfileRecord {
            name: "Jane Doe".into(),
            ..Default::default()
        };
        let bytes = GeneratedLayout::default().render(&record).unwrap();
        let pkg = DocxPackage::from_bytes(&bytes).unwrap();
        let doc = pkg.xml_part(DOCUMENT_XML).unwrap();
        assert!(doc.root.descendants("w:numPr").is_empty());

        let body = read_body(&bytes).unwrap();
        for heading in ["Summary", "Experience", "Full Work History"] {
            assert!(body.paragraphs.contains(&heading.to_string()), "{heading}");
        }
        // No shaded box, only the work-history header row.
        assert_eq!(body.tables.len(), 1);
        assert_eq!(body.tables[0].rows, vec![vec!["Company", "Years", "Role"]]);

        // Running header with only a name has no separator.
        let headers = parts_named(&pkg, "word/header");
        assert!(headers.iter().all(|h| h.contains("Jane Doe") && !h.contains(" – ")));
    }

    #[test]
    fn logo_lands_in_first_header_and_footer() {
        let dir = tempfile::tempdir().unwrap();
        let logo = dir.path().join("logo.png");
        std::fs::write(&logo, crate::render::logo::tests::sample_png()).unwrap();

        let bytes = GeneratedLayout::new(Some(logo)).render(&sample()).unwrap();
        let pkg = DocxPackage::from_bytes(&bytes).unwrap();
        assert!(pkg.part_names().any(|n| n.starts_with("word/media/")));

        let headers = parts_named(&pkg, "word/header");
        let (running, first): (Vec<_>, Vec<_>) = headers
            .iter()
            .partition(|h| h.contains("Jordan Lee – Data Engineer"));
        assert!(running.iter().all(|h| !h.contains("w:drawing")));
        assert!(first.iter().all(|h| h.contains("w:drawing")));
        assert!(parts_named(&pkg, "word/footer")
            .iter()
            .all(|f| f.contains("w:drawing")));
    }

    #[test]
    fn missing_logo_is_silently_skipped() {
        let bytes = GeneratedLayout::new(Some("/definitely/not/here.png".into()))
            .render(&sample())
            .unwrap();
        let pkg = DocxPackage::from_bytes(&bytes).unwrap();
        assert!(!pkg.part_names().any(|n| n.starts_with("word/media/")));
    }
}
