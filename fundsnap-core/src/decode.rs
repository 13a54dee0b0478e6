//! Tabular decoding: raw download bytes → [`RawTable`].
//!
//! The advertised content type is a hint, not a contract. Payloads are sniffed:
//! anything that looks like delimited text is parsed with a fixed list of
//! candidate delimiters, everything else is opened as a workbook and its first
//! sheet is used.

use std::borrow::Cow;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveTime;
use thiserror::Error;
use tracing::debug;

use crate::domain::{Cell, RawTable};

/// Delimiters tried in order; the first giving more than one column wins.
pub const CANDIDATE_DELIMITERS: [u8; 3] = [b';', b',', b'\t'];

/// Delimiter used when no candidate yields more than one column.
pub const DEFAULT_DELIMITER: u8 = b',';

/// How many leading bytes the comma heuristic looks at.
const SNIFF_LEN: usize = 1024;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Decode failures. Fatal for one (fund, period) pair only.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is empty")]
    Empty,

    #[error("malformed delimited text: {0}")]
    Delimited(#[from] csv::Error),

    #[error("unreadable workbook: {0}")]
    Workbook(String),

    #[error("workbook has no sheets")]
    NoSheets,
}

/// Which decoder a payload was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Delimited,
    Workbook,
}

/// Content types that name delimited text outright.
fn is_delimited_type(ct: &str) -> bool {
    ct.contains("csv") || ct.contains("tab-separated-values") || ct.starts_with("text/plain")
}

/// Decide how to decode a payload.
///
/// A delimited-text content type is honoured as is. Any other type, `text/html`
/// included, loses to a workbook signature in the payload.
pub fn sniff(bytes: &[u8], content_type: Option<&str>) -> PayloadKind {
    let content_type = content_type.map(str::to_ascii_lowercase);
    let content_type = content_type.as_deref().map(str::trim);

    if content_type.is_some_and(is_delimited_type) {
        return PayloadKind::Delimited;
    }
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE2_MAGIC) {
        return PayloadKind::Workbook;
    }

    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if content_type.is_some_and(|ct| ct.starts_with("text/")) || head.contains(&b',') {
        PayloadKind::Delimited
    } else {
        PayloadKind::Workbook
    }
}

/// Decode a downloaded payload into a table.
pub fn decode(bytes: &[u8], content_type: Option<&str>) -> Result<RawTable, DecodeError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }

    match sniff(bytes, content_type) {
        PayloadKind::Delimited => decode_delimited(&decode_text(bytes)),
        PayloadKind::Workbook => decode_workbook(bytes),
    }
}

/// UTF-8 with the BOM stripped, or Windows-1250 for legacy exports.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            debug!("payload is not UTF-8, decoding as windows-1250");
            encoding_rs::WINDOWS_1250.decode_without_bom_handling(bytes).0
        }
    }
}

/// Try each candidate delimiter; fall back to the default one and return
/// whatever it produced, even a single column.
pub fn decode_delimited(text: &str) -> Result<RawTable, DecodeError> {
    let mut fallback = None;

    for delimiter in CANDIDATE_DELIMITERS {
        let table = read_delimited(text, delimiter)?;
        if table.width() > 1 {
            debug!(
                delimiter = %char::from(delimiter).escape_default(),
                columns = table.width(),
                rows = table.height(),
                "decoded delimited text"
            );
            return Ok(table);
        }
        if delimiter == DEFAULT_DELIMITER {
            fallback = Some(table);
        }
    }

    debug!("no candidate delimiter produced more than one column");
    match fallback {
        Some(table) => Ok(table),
        None => read_delimited(text, DEFAULT_DELIMITER),
    }
}

fn read_delimited(text: &str, delimiter: u8) -> Result<RawTable, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let header: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, name)| header_name(name, i))
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(text_cell).collect());
    }

    Ok(RawTable::from_rows(header, rows))
}

/// Open the payload as a workbook and read its first sheet.
pub fn decode_workbook(bytes: &[u8]) -> Result<RawTable, DecodeError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| DecodeError::Workbook(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(DecodeError::NoSheets)?
        .map_err(|e| DecodeError::Workbook(e.to_string()))?;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(first) => first
            .iter()
            .enumerate()
            .map(|(i, cell)| header_name(&workbook_cell(cell).as_text(), i))
            .collect(),
        None => return Ok(RawTable::default()),
    };
    let data: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(workbook_cell).collect())
        .collect();

    debug!(
        columns = header.len(),
        rows = data.len(),
        "decoded workbook first sheet"
    );
    Ok(RawTable::from_rows(header, data))
}

fn header_name(raw: &str, index: usize) -> String {
    let name = raw.trim();
    if name.is_empty() {
        format!("Unnamed: {index}")
    } else {
        name.to_string()
    }
}

fn text_cell(raw: &str) -> Cell {
    if raw.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(raw.to_string())
    }
}

fn workbook_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => text_cell(s),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) if dt.time() == NaiveTime::MIN => {
                Cell::Text(dt.format("%Y-%m-%d").to_string())
            }
            Some(dt) => Cell::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Cell::Number(dt.as_f64()),
        },
    }
}
