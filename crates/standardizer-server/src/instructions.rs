//! Instruction document extraction.
//!
//! Turns the uploaded instructions (PDF, spreadsheet or plain text) into the
//! plain text embedded in the planner prompt. Extraction never fails the job:
//! problems come back as an `[INSTRUCTIONS_READ_ERROR]` line instead.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstructionsError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("Spreadsheet extraction failed: {0}")]
    Spreadsheet(String),
}

/// How an instructions document is decoded, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Spreadsheet,
    Text,
}

impl DocumentKind {
    pub fn from_file_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pdf") => DocumentKind::Pdf,
            Some("xlsx" | "xls" | "xlsm" | "xlsb" | "ods") => DocumentKind::Spreadsheet,
            _ => DocumentKind::Text,
        }
    }
}

/// Extract plain text, folding failures into the returned text.
pub fn extract_instructions(file_name: &str, bytes: &[u8]) -> String {
    let kind = DocumentKind::from_file_name(file_name);
    match read_document(kind, bytes) {
        Ok(text) => {
            tracing::debug!(file = file_name, kind = ?kind, chars = text.chars().count(), "Instructions extracted");
            text
        }
        Err(e) => {
            tracing::warn!(file = file_name, error = %e, "Failed to read instructions");
            format!("[INSTRUCTIONS_READ_ERROR] {}", e)
        }
    }
}

pub fn read_document(kind: DocumentKind, bytes: &[u8]) -> Result<String, InstructionsError> {
    match kind {
        DocumentKind::Pdf => pdf_text(bytes),
        DocumentKind::Spreadsheet => spreadsheet_text(bytes),
        DocumentKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn pdf_text(bytes: &[u8]) -> Result<String, InstructionsError> {
    // pdf-extract panics on some malformed documents
    let owned = bytes.to_vec();
    std::panic::catch_unwind(move || pdf_extract::extract_text_from_mem(&owned))
        .map_err(|_| InstructionsError::Pdf("document could not be parsed".to_string()))?
        .map_err(|e| InstructionsError::Pdf(e.to_string()))
}

/// Data cells of the first worksheet (header row excluded), one per line.
fn spreadsheet_text(bytes: &[u8]) -> Result<String, InstructionsError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| InstructionsError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| InstructionsError::Spreadsheet("workbook has no worksheets".to_string()))?
        .map_err(|e| InstructionsError::Spreadsheet(e.to_string()))?;

    let lines: Vec<String> = range
        .rows()
        .skip(1)
        .flat_map(|row| row.iter())
        .filter(|cell| !matches!(cell, Data::Empty))
        .map(|cell| cell.to_string().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();
    Ok(lines.join("\n"))
}

/// Keep at most `budget` characters, never splitting a character.
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
