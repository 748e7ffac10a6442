//! Template-substitution layout.
//!
//! Every paragraph of the template's body, headers and footers is scanned
//! for `{{Field}}` tokens naming a top-level scalar field of the record
//! (`{{Name}}`, `{{Professional Title}}`, `{{Summary}}`, plus scalar extras).
//! Matching is exact; unknown tokens are left untouched. Word often splits a
//! token across several runs, so matching runs on the paragraph's joined
//! text and a changed paragraph is rewritten as a single run carrying the
//! formatting of its first run.
//!
//! The template is edited part by part rather than re-built through a
//! document model, so markup we do not understand passes through as-is.

use crate::docx::drawing::{extent_for_height, InlinePicture};
use crate::docx::package::{DocxPackage, DOCUMENT_RELS, DOCUMENT_XML};
use crate::docx::xml::{sanitize_text, Element, Node};
use crate::error::{DocxError, RenderError};
use crate::profile::ProfileRecord;
use crate::render::logo::LogoImage;
use crate::render::ProfileRenderer;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{([^{}]*)\}\}").unwrap());
static RE_FURNITURE_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^word/(header|footer)\d*\.xml$").unwrap());

/// Run children that carry the run's own text.
const RUN_TEXT: [&str; 4] = ["w:t", "w:tab", "w:br", "w:cr"];
/// Subtrees whose text is not part of the paragraph's own runs.
const NOT_RUN_TEXT: [&str; 7] = [
    "w:pPr",
    "w:rPr",
    "w:drawing",
    "w:pict",
    "w:object",
    "mc:AlternateContent",
    "w:instrText",
];

const LOGO_HEIGHT_CM: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct TemplateFill {
    template_path: PathBuf,
    logo_path: Option<PathBuf>,
}

impl TemplateFill {
    pub fn new(template_path: PathBuf, logo_path: Option<PathBuf>) -> Self {
        Self {
            template_path,
            logo_path,
        }
    }

    pub fn template_path(&self) -> &std::path::Path {
        &self.template_path
    }
}

impl ProfileRenderer for TemplateFill {
    fn name(&self) -> &'static str {
        "template"
    }

    fn render(&self, record: &ProfileRecord) -> Result<Vec<u8>, RenderError> {
        if !self.template_path.is_file() {
            return Err(RenderError::TemplateNotFound {
                path: self.template_path.clone(),
            });
        }
        let bytes = std::fs::read(&self.template_path).map_err(|source| RenderError::Io {
            path: self.template_path.clone(),
            source,
        })?;
        let mut package = DocxPackage::from_bytes(&bytes)?;
        let fields: HashMap<String, String> = record
            .scalar_fields()
            .into_iter()
            .map(|(k, v)| (k, sanitize_text(&v).into_owned()))
            .collect();

        let mut doc = package.xml_part(DOCUMENT_XML)?;
        let mut replaced = fill_placeholders(&mut doc.root, &fields);

        let furniture: Vec<String> = package
            .part_names()
            .filter(|n| RE_FURNITURE_PART.is_match(n))
            .map(str::to_string)
            .collect();
        for part in furniture {
            let mut part_doc = package.xml_part(&part)?;
            let n = fill_placeholders(&mut part_doc.root, &fields);
            if n > 0 {
                package.set_xml_part(&part, &part_doc)?;
                replaced += n;
            }
        }
        debug!(paragraphs = replaced, "Filled template placeholders");

        if let Some(logo) = LogoImage::load_optional(self.logo_path.as_deref())? {
            insert_logo(&mut package, &mut doc.root, &logo)?;
        }

        package.set_xml_part(DOCUMENT_XML, &doc)?;
        Ok(package.to_bytes()?)
    }
}

/// Replace `{{key}}` tokens whose key is in `fields`. Single pass: values
/// that themselves contain tokens are not expanded again.
pub fn substitute(text: &str, fields: &HashMap<String, String>) -> String {
    RE_PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| match fields.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Substitute in every paragraph under `root`. Returns how many paragraphs changed.
pub fn fill_placeholders(root: &mut Element, fields: &HashMap<String, String>) -> usize {
    let mut changed = 0;
    root.for_each_named_mut("w:p", &mut |p| {
        if fill_paragraph(p, fields) {
            changed += 1;
        }
    });
    changed
}

/// Concatenated run text of one paragraph. Tabs and breaks become `\t`/`\n`.
pub fn paragraph_text(paragraph: &Element) -> String {
    let mut text = String::new();
    push_run_text(paragraph, &mut text);
    text
}

fn push_run_text(element: &Element, text: &mut String) {
    for child in element.elements() {
        match child.name.as_str() {
            "w:t" => {
                for n in &child.children {
                    if let Node::Text(t) = n {
                        text.push_str(t);
                    }
                }
            }
            "w:tab" => text.push('\t'),
            "w:br" | "w:cr" => text.push('\n'),
            name if NOT_RUN_TEXT.contains(&name) => {}
            _ => push_run_text(child, text),
        }
    }
}

fn fill_paragraph(paragraph: &mut Element, fields: &HashMap<String, String>) -> bool {
    let text = paragraph_text(paragraph);
    if !RE_PLACEHOLDER.is_match(&text) {
        return false;
    }
    let filled = substitute(&text, fields);
    if filled == text {
        return false;
    }

    let run_props = paragraph
        .descendants("w:r")
        .into_iter()
        .find_map(|r| r.child("w:rPr"))
        .cloned();

    let mut new_run = Element::new("w:r");
    if let Some(rpr) = run_props {
        new_run.push(rpr);
    }
    push_run_content(&mut new_run, &filled);

    // All visible text now lives in the new run, placed where the first
    // text-bearing child was. Children without text (bookmarks, pPr) stay;
    // children carrying a picture stay with their text stripped.
    let old = std::mem::take(&mut paragraph.children);
    let mut new_run = Some(new_run);
    for node in old {
        match node {
            Node::Element(mut child) => {
                if child.name == "w:pPr" || paragraph_text(&child).is_empty() {
                    paragraph.children.push(Node::Element(child));
                    continue;
                }
                if let Some(run) = new_run.take() {
                    paragraph.push(run);
                }
                if carries_picture(&child) {
                    strip_run_text(&mut child);
                    paragraph.children.push(Node::Element(child));
                }
            }
            Node::Other(other) => paragraph.children.push(Node::Other(other)),
            Node::Text(_) => {}
        }
    }
    if let Some(run) = new_run {
        paragraph.push(run);
    }
    true
}

fn carries_picture(element: &Element) -> bool {
    !element.descendants("w:drawing").is_empty() || !element.descendants("w:pict").is_empty()
}

/// Drop text children from every run under `element`, leaving drawings alone.
fn strip_run_text(element: &mut Element) {
    if element.name == "w:r" {
        element.children.retain(|n| match n {
            Node::Element(e) => !RUN_TEXT.contains(&e.name.as_str()),
            _ => true,
        });
        return;
    }
    for child in element.elements_mut() {
        if !NOT_RUN_TEXT.contains(&child.name.as_str()) {
            strip_run_text(child);
        }
    }
}

fn push_run_content(run: &mut Element, text: &str) {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            run.push(Element::new("w:br"));
        }
        for (j, segment) in line.split('\t').enumerate() {
            if j > 0 {
                run.push(Element::new("w:tab"));
            }
            if !segment.is_empty() {
                let mut t = Element::new("w:t").with_attr("xml:space", "preserve");
                t.push_text(segment);
                run.push(t);
            }
        }
    }
}

/// Append the logo to the first body paragraph (one is created if the body
/// has none).
fn insert_logo(
    package: &mut DocxPackage,
    document: &mut Element,
    logo: &LogoImage,
) -> Result<(), RenderError> {
    let rel_id = package.add_image(
        DOCUMENT_RELS,
        &logo.media_name(),
        logo.extension,
        logo.content_type,
        &logo.bytes,
    )?;
    let doc_pr_id = document
        .descendants("wp:docPr")
        .iter()
        .filter_map(|e| e.attr("id"))
        .filter_map(|id| id.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    let (cx_emu, cy_emu) = extent_for_height(logo.width_px, logo.height_px, LOGO_HEIGHT_CM);
    let run = InlinePicture {
        rel_id: &rel_id,
        doc_pr_id,
        name: "Logo",
        cx_emu,
        cy_emu,
    }
    .run();

    let body = document
        .child_mut("w:body")
        .ok_or_else(|| DocxError::Xml {
            part: DOCUMENT_XML.to_string(),
            detail: "no <w:body> element".to_string(),
        })?;
    match body.child_mut("w:p") {
        Some(first) => first.push(run),
        None => body
            .children
            .insert(0, Node::Element(Element::new("w:p").with_child(run))),
    }
    debug!(rel_id = %rel_id, "Inserted logo into first paragraph");
    Ok(())
}
