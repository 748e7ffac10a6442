//! Pipeline stages for resume-to-profile conversion.
//!
//! Each submodule implements one step; the orchestrator in
//! [`crate::convert`] sequences them and wraps their errors.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm ──▶ repair ──▶ ProfileRecord
//! (bytes)   (pdfium/    (chat    (JSON
//!            docx)       model)   recovery)
//! ```
//!
//! 1. [`input`]   — format hint from the filename, output basenames
//! 2. [`extract`] — PDF/DOCX text; runs in `spawn_blocking` because pdfium
//!    and the DOCX parser are blocking
//! 3. [`llm`]     — the Model Invoker: retry/backoff around one chat call;
//!    the only stage with network I/O ([`client`] holds the transports)
//! 4. [`repair`]  — pull the JSON object out of a noisy reply

pub mod client;
pub mod extract;
pub mod input;
pub mod llm;
pub mod repair;
