//! Result types for one pipeline run.

use crate::profile::ProfileRecord;
use serde::Serialize;

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct ProfileOutput {
    /// Sanitised basename shared by both output files.
    pub base_name: String,
    pub record: ProfileRecord,
    /// Canonical JSON encoding of `record`.
    pub record_json: Vec<u8>,
    /// Rendered DOCX bytes.
    pub document: Vec<u8>,
    /// Name of the layout that produced `document`.
    pub renderer: &'static str,
    pub stats: RunStats,
}

impl ProfileOutput {
    pub fn json_file_name(&self) -> String {
        format!("{}.json", self.base_name)
    }

    pub fn docx_file_name(&self) -> String {
        format!("{}.docx", self.base_name)
    }
}

/// Timings and counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Characters of extracted resume text.
    pub extracted_chars: usize,
    /// Model attempts used, including the successful one.
    pub model_attempts: u32,
    pub extraction_ms: u64,
    pub inference_ms: u64,
    pub serialization_ms: u64,
    pub rendering_ms: u64,
    pub total_ms: u64,
}
