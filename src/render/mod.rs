//! Profile Renderer: turn a [`ProfileRecord`] into DOCX bytes.
//!
//! Layouts implement [`ProfileRenderer`]; the orchestrator only ever sees the
//! trait object chosen by [`renderer_for`], so another layout is one more
//! implementation and one more [`RenderMode`] variant.

pub mod generate;
pub mod logo;
pub mod template;

pub use generate::GeneratedLayout;
pub use logo::LogoImage;
pub use template::TemplateFill;

use crate::error::RenderError;
use crate::profile::ProfileRecord;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// A document layout. Implementations are stateless apart from their
/// configuration and safe to share across concurrent runs.
pub trait ProfileRenderer: Send + Sync {
    /// Short name used in logs and errors (`"generate"`, `"template"`).
    fn name(&self) -> &'static str;

    fn render(&self, record: &ProfileRecord) -> Result<Vec<u8>, RenderError>;
}

/// Which layout to render with. Chosen per deployment, not per record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Build the whole document programmatically.
    #[default]
    Generate,
    /// Fill `{{Field}}` placeholders in a pre-authored template.
    Template,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Generate => "generate",
            RenderMode::Template => "template",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generate" | "full" | "generated" => Ok(RenderMode::Generate),
            "template" | "fill" => Ok(RenderMode::Template),
            other => Err(format!(
                "unknown render mode '{other}' (expected 'generate' or 'template')"
            )),
        }
    }
}

/// Build the renderer for a mode.
///
/// Template mode without a template path falls back to an empty path, which
/// fails with `TemplateNotFound` at render time; `PipelineConfig::build`
/// rejects that combination earlier.
pub fn renderer_for(
    mode: RenderMode,
    template_path: Option<PathBuf>,
    logo_path: Option<PathBuf>,
) -> Arc<dyn ProfileRenderer> {
    match mode {
        RenderMode::Generate => Arc::new(GeneratedLayout::new(logo_path)),
        RenderMode::Template => Arc::new(TemplateFill::new(
            template_path.unwrap_or_default(),
            logo_path,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes() {
        assert_eq!("generate".parse::<RenderMode>(), Ok(RenderMode::Generate));
        assert_eq!(" Template ".parse::<RenderMode>(), Ok(RenderMode::Template));
        assert!("pdf".parse::<RenderMode>().is_err());
        assert_eq!(RenderMode::default().to_string(), "generate");
    }

    #[test]
    fn renderer_names_follow_mode() {
        assert_eq!(renderer_for(RenderMode::Generate, None, None).name(), "generate");
        assert_eq!(
            renderer_for(RenderMode::Template, Some("t.docx".into()), None).name(),
            "template"
        );
    }
}
