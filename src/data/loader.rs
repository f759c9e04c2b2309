use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};

use super::fetch::FetchError;
use super::model::Table;

/// Cell contents treated as missing.
const MISSING_MARKERS: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "None"];

// ---------------------------------------------------------------------------
// Body decoding
// ---------------------------------------------------------------------------

/// Decode a response body as UTF-8 (BOM stripped), falling back to `fallback`
/// when the bytes are not valid UTF-8.
pub fn decode_body<'a>(
    bytes: &'a [u8],
    fallback: &'static Encoding,
) -> Result<Cow<'a, str>, FetchError> {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return Ok(text);
    }

    log::warn!(
        "Body is not valid UTF-8, retrying as {}",
        fallback.name()
    );
    let (text, had_errors) = fallback.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(FetchError::Parse(format!(
            "body is neither UTF-8 nor {}",
            fallback.name()
        )));
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// CSV parsing
// ---------------------------------------------------------------------------

/// CSV layout: comma separated, header row first, one record per line.
/// Values stay untyped until [`Table::from_raw`] infers each column's type.
pub fn parse_csv(text: &str) -> Result<Table, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| FetchError::Parse(format!("reading CSV header: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(FetchError::Parse("CSV has no header row".into()));
    }

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| FetchError::Parse(format!("CSV row {}: {e}", row_no + 1)))?;

        if record.len() > headers.len() {
            return Err(FetchError::Parse(format!(
                "CSV row {}: expected {} fields, saw {}",
                row_no + 1,
                headers.len(),
                record.len()
            )));
        }

        rows.push(record.iter().map(cell).collect());
    }

    Ok(Table::from_raw(headers, rows))
}

fn cell(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() || MISSING_MARKERS.contains(&s) {
        None
    } else {
        Some(s.to_string())
    }
}
