//! Inline picture runs (`<w:drawing><wp:inline>`) for parts we edit in place.
//!
//! The run declares the DrawingML namespaces it uses on its own elements,
//! so it can be dropped into any part that already binds `w:`.

use crate::docx::xml::Element;

/// English Metric Units per centimetre.
pub const EMU_PER_CM: u64 = 360_000;

const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// A picture already registered in the package under `rel_id`.
#[derive(Debug, Clone)]
pub struct InlinePicture<'a> {
    pub rel_id: &'a str,
    /// `wp:docPr/@id`, unique within the document.
    pub doc_pr_id: u32,
    pub name: &'a str,
    pub cx_emu: u64,
    pub cy_emu: u64,
}

impl InlinePicture<'_> {
    /// A complete `<w:r>` containing the picture.
    pub fn run(&self) -> Element {
        let (cx, cy) = (self.cx_emu.to_string(), self.cy_emu.to_string());

        let pic = Element::new("pic:pic")
            .with_attr("xmlns:pic", NS_PIC)
            .with_child(
                Element::new("pic:nvPicPr")
                    .with_child(
                        Element::new("pic:cNvPr")
                            .with_attr("id", "0")
                            .with_attr("name", self.name),
                    )
                    .with_child(Element::new("pic:cNvPicPr")),
            )
            .with_child(
                Element::new("pic:blipFill")
                    .with_child(
                        Element::new("a:blip")
                            .with_attr("r:embed", self.rel_id)
                            .with_attr("xmlns:r", NS_R),
                    )
                    .with_child(Element::new("a:stretch").with_child(Element::new("a:fillRect"))),
            )
            .with_child(
                Element::new("pic:spPr")
                    .with_child(
                        Element::new("a:xfrm")
                            .with_child(Element::new("a:off").with_attr("x", "0").with_attr("y", "0"))
                            .with_child(
                                Element::new("a:ext")
                                    .with_attr("cx", cx.clone())
                                    .with_attr("cy", cy.clone()),
                            ),
                    )
                    .with_child(
                        Element::new("a:prstGeom")
                            .with_attr("prst", "rect")
                            .with_child(Element::new("a:avLst")),
                    ),
            );

        let inline = Element::new("wp:inline")
            .with_attr("distT", "0")
            .with_attr("distB", "0")
            .with_attr("distL", "0")
            .with_attr("distR", "0")
            .with_attr("xmlns:wp", NS_WP)
            .with_child(Element::new("wp:extent").with_attr("cx", cx).with_attr("cy", cy))
            .with_child(
                Element::new("wp:docPr")
                    .with_attr("id", self.doc_pr_id.to_string())
                    .with_attr("name", self.name),
            )
            .with_child(
                Element::new("wp:cNvGraphicFramePr").with_child(
                    Element::new("a:graphicFrameLocks")
                        .with_attr("xmlns:a", NS_A)
                        .with_attr("noChangeAspect", "1"),
                ),
            )
            .with_child(
                Element::new("a:graphic").with_attr("xmlns:a", NS_A).with_child(
                    Element::new("a:graphicData")
                        .with_attr("uri", NS_PIC)
                        .with_child(pic),
                ),
            );

        Element::new("w:r").with_child(Element::new("w:drawing").with_child(inline))
    }
}

/// Scale `(width_px, height_px)` to a fixed height in centimetres, keeping
/// the aspect ratio. Returns `(cx, cy)` in EMU.
pub fn extent_for_height(width_px: u32, height_px: u32, height_cm: f64) -> (u64, u64) {
    let cy = (height_cm * EMU_PER_CM as f64).round() as u64;
    if width_px == 0 || height_px == 0 {
        return (cy, cy);
    }
    let cx = (cy as f64 * width_px as f64 / height_px as f64).round() as u64;
    (cx, cy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml;

    #[test]
    fn run_serialises_to_wellformed_xml() {
        let pic = InlinePicture {
            rel_id: "rId9",
            doc_pr_id: 4,
            name: "Logo \"A\"",
            cx_emu: 720_000,
            cy_emu: 360_000,
        };
        let mut p = xml::Element::new("w:p").with_attr("xmlns:w", "urn:w");
        p.push(pic.run());
        let doc = xml::parse(&p.to_xml().unwrap()).unwrap();

        let blip = doc.root.descendants("a:blip");
        assert_eq!(blip[0].attr("r:embed"), Some("rId9"));
        let extent = doc.root.descendants("wp:extent");
        assert_eq!(extent[0].attr("cx"), Some("720000"));
        assert_eq!(doc.root.descendants("wp:docPr")[0].attr("name"), Some("Logo \"A\""));
    }

    #[test]
    fn extent_keeps_aspect_ratio() {
        assert_eq!(extent_for_height(400, 100, 1.0), (1_440_000, 360_000));
        assert_eq!(extent_for_height(0, 0, 2.0), (720_000, 720_000));
    }
}
