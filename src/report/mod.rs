//! Report rendering.
//!
//! `format` frames the stage messages posted to the transcript;
//! `generator` renders the terminal state as Markdown or JSON.

pub mod format;
pub mod generator;

pub use format::{format_analysis_output, format_final_report, format_review_output};
pub use generator::{generate_json_report, generate_markdown_report, write_report, ReportOptions};
