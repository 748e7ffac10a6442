//! OOXML package I/O: a DOCX file is a ZIP archive of named parts.
//!
//! [`DocxPackage`] keeps every part in memory in archive order so a template
//! can be opened, have a few parts rewritten, and be written back with
//! everything else byte-for-byte untouched. Inputs are untrusted, so each
//! part is read through a size cap instead of trusting the sizes the
//! archive declares.

use crate::docx::xml::{self, Element, XmlDocument};
use crate::error::DocxError;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const CONTENT_TYPES: &str = "[Content_Types].xml";
pub const DOCUMENT_XML: &str = "word/document.xml";
pub const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";

pub const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Largest single part we inflate.
pub const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;
/// Largest total of inflated parts per package.
pub const MAX_PACKAGE_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    parts: Vec<(String, Vec<u8>)>,
}

impl DocxPackage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every part of a ZIP archive into memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::new();
        let mut total = 0u64;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::new();
            file.by_ref()
                .take(MAX_PART_BYTES + 1)
                .read_to_end(&mut data)?;
            if data.len() as u64 > MAX_PART_BYTES {
                return Err(DocxError::PartTooLarge {
                    part: name,
                    limit: MAX_PART_BYTES,
                });
            }
            total += data.len() as u64;
            if total > MAX_PACKAGE_BYTES {
                return Err(DocxError::PartTooLarge {
                    part: name,
                    limit: MAX_PACKAGE_BYTES,
                });
            }
            parts.push((name, data));
        }
        Ok(Self { parts })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    /// Insert a new part or replace an existing one in place.
    pub fn set_part(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let name = name.into();
        let data = data.into();
        match self.parts.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = data,
            None => self.parts.push((name, data)),
        }
    }

    /// Parse an XML part. A missing part is an error.
    pub fn xml_part(&self, name: &str) -> Result<XmlDocument, DocxError> {
        let data = self
            .part(name)
            .ok_or_else(|| DocxError::MissingPart(name.to_string()))?;
        let text = String::from_utf8_lossy(data);
        xml::parse(&text).map_err(|detail| DocxError::Xml {
            part: name.to_string(),
            detail,
        })
    }

    pub fn set_xml_part(&mut self, name: &str, doc: &XmlDocument) -> Result<(), DocxError> {
        let bytes = doc.to_bytes().map_err(|detail| DocxError::Xml {
            part: name.to_string(),
            detail,
        })?;
        self.set_part(name, bytes);
        Ok(())
    }

    /// Zip the parts back up. `[Content_Types].xml` is always written first.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let ordered = self
            .parts
            .iter()
            .filter(|(n, _)| n == CONTENT_TYPES)
            .chain(self.parts.iter().filter(|(n, _)| n != CONTENT_TYPES));
        for (name, data) in ordered {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    /// Register an image part and return its relationship id from `rels_part`.
    ///
    /// Adds the `Default` content type for the extension when missing and
    /// creates the relationships part when the source part has none yet.
    pub fn add_image(
        &mut self,
        rels_part: &str,
        media_name: &str,
        extension: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, DocxError> {
        self.set_part(format!("word/media/{media_name}"), data.to_vec());
        self.ensure_default_content_type(extension, content_type)?;

        let mut rels = if self.contains(rels_part) {
            self.xml_part(rels_part)?
        } else {
            XmlDocument {
                prolog: Vec::new(),
                root: Element::new("Relationships").with_attr("xmlns", RELATIONSHIPS_NS),
            }
        };
        let rel_id = next_relationship_id(&rels.root);
        rels.root.push(
            Element::new("Relationship")
                .with_attr("Id", rel_id.clone())
                .with_attr("Type", REL_IMAGE)
                .with_attr("Target", format!("media/{media_name}")),
        );
        self.set_xml_part(rels_part, &rels)?;
        Ok(rel_id)
    }

    fn ensure_default_content_type(
        &mut self,
        extension: &str,
        content_type: &str,
    ) -> Result<(), DocxError> {
        let mut types = self.xml_part(CONTENT_TYPES)?;
        let present = types.root.elements().any(|e| {
            e.name == "Default"
                && e
                    .attr("Extension")
                    .is_some_and(|x| x.eq_ignore_ascii_case(extension))
        });
        if !present {
            types.root.children.insert(
                0,
                xml::Node::Element(
                    Element::new("Default")
                        .with_attr("Extension", extension)
                        .with_attr("ContentType", content_type),
                ),
            );
            self.set_xml_part(CONTENT_TYPES, &types)?;
        }
        Ok(())
    }
}

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// `rId{n}` one above the highest numeric id already in use.
fn next_relationship_id(rels: &Element) -> String {
    let max = rels
        .elements()
        .filter_map(|e| e.attr("Id"))
        .filter_map(|id| id.strip_prefix("rId"))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_package() -> DocxPackage {
        let mut pkg = DocxPackage::new();
        pkg.set_part(
            DOCUMENT_XML,
            r#"<w:document xmlns:w="urn:w"><w:body/></w:document>"#,
        );
        pkg.set_part(
            CONTENT_TYPES,
            r#"<Types xmlns="urn:ct"><Default Extension="xml" ContentType="application/xml"/></Types>"#,
        );
        pkg.set_part(
            DOCUMENT_RELS,
            r#"<Relationships xmlns="urn:r"><Relationship Id="rId1" Type="t" Target="styles.xml"/><Relationship Id="rId7" Type="t" Target="x.xml"/></Relationships>"#,
        );
        pkg
    }

    #[test]
    fn zip_round_trip_keeps_parts() {
        let pkg = minimal_package();
        let bytes = pkg.to_bytes().unwrap();
        assert_eq!(&bytes[..2], b"PK");

        let back = DocxPackage::from_bytes(&bytes).unwrap();
        assert_eq!(back.part_names().next(), Some(CONTENT_TYPES));
        assert_eq!(back.part(DOCUMENT_XML), pkg.part(DOCUMENT_XML));
        assert!(back.contains(DOCUMENT_RELS));
    }

    #[test]
    fn add_image_registers_relationship_and_type() {
        let mut pkg = minimal_package();
        let rid = pkg
            .add_image(DOCUMENT_RELS, "logo.png", "png", "image/png", b"\x89PNG")
            .unwrap();
        assert_eq!(rid, "rId8");
        assert_eq!(pkg.part("word/media/logo.png"), Some(&b"\x89PNG"[..]));

        let types = pkg.xml_part(CONTENT_TYPES).unwrap();
        let png = |t: &XmlDocument| {
            t.root
                .elements()
                .filter(|e| e.attr("Extension") == Some("png"))
                .count()
        };
        assert_eq!(png(&types), 1);

        // A second image does not duplicate the content type.
        pkg.add_image(DOCUMENT_RELS, "b.png", "png", "image/png", b"x")
            .unwrap();
        assert_eq!(png(&pkg.xml_part(CONTENT_TYPES).unwrap()), 1);
    }

    #[test]
    fn add_image_creates_missing_rels_part() {
        let mut pkg = minimal_package();
        let rid = pkg
            .add_image("word/_rels/header1.xml.rels", "h.png", "png", "image/png", b"x")
            .unwrap();
        assert_eq!(rid, "rId1");
        let rels = pkg.xml_part("word/_rels/header1.xml.rels").unwrap();
        assert_eq!(rels.root.attr("xmlns"), Some(RELATIONSHIPS_NS));
        assert_eq!(rels.root.elements().count(), 1);
    }

    #[test]
    fn oversized_part_is_refused() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file("word/document.xml", options).unwrap();
        // Highly compressible, so the archive itself stays small.
        let chunk = vec![b' '; 1024 * 1024];
        for _ in 0..=MAX_PART_BYTES / chunk.len() as u64 {
            zip.write_all(&chunk).unwrap();
        }
        let bytes = zip.finish().unwrap().into_inner();

        assert!(matches!(
            DocxPackage::from_bytes(&bytes),
            Err(DocxError::PartTooLarge { limit: MAX_PART_BYTES, .. })
        ));
    }

    #[test]
    fn garbage_is_not_a_package() {
        assert!(matches!(
            DocxPackage::from_bytes(b"not a zip at all"),
            Err(DocxError::Zip(_))
        ));
    }

    #[test]
    fn missing_part_is_reported() {
        let pkg = DocxPackage::new();
        assert!(matches!(
            pkg.xml_part(DOCUMENT_XML),
            Err(DocxError::MissingPart(_))
        ));
    }
}
