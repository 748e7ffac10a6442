//! WordprocessingML (DOCX) support.
//!
//! Reading and building whole documents is docx-rs's job; what lives here
//! is the part-level editing a template needs, where every byte we do not
//! touch must survive:
//!
//! - [`package`]: ZIP container of named parts, read under size caps
//! - [`xml`]: owned element tree over quick-xml, for rewriting parts
//! - [`reader`]: paragraph and table text of a document body
//! - [`drawing`]: inline picture runs

pub mod drawing;
pub mod package;
pub mod reader;
pub mod xml;

pub use package::DocxPackage;
pub use reader::{read_body, DocxBody, TableText};
