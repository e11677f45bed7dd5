//! Minimal CSV record reader (RFC 4180 quoting) with legacy encoding fallback.
use crate::error::RustyDeckError;
use crate::error::ResultMessage;
use encoding_rs::UTF_8;
use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use std::path::Path;

const DELIMITER: char = ',';
const QUOTE: char = '"';

/// Decodes file bytes, stripping a UTF-8 BOM and falling back to Windows-1252.
pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return text;
    }
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    text
}

/// Splits text into records of fields. Blank lines are skipped.
pub fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    let mut finish_record = |record: &mut Vec<String>, field: &mut String, quoted: &mut bool| {
        let blank = record.is_empty() && field.is_empty() && !*quoted;
        record.push(std::mem::take(field));
        *quoted = false;
        let record = std::mem::take(record);
        if !blank {
            records.push(record);
        }
    };

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == QUOTE {
                if chars.peek() == Some(&QUOTE) {
                    field.push(QUOTE);
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }

        match ch {
            QUOTE if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            DELIMITER => {
                record.push(std::mem::take(&mut field));
                quoted = false;
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                finish_record(&mut record, &mut field, &mut quoted);
            }
            '\n' => finish_record(&mut record, &mut field, &mut quoted),
            _ => field.push(ch),
        }
    }

    if !record.is_empty() || !field.is_empty() || quoted {
        finish_record(&mut record, &mut field, &mut quoted);
    }
    records
}

/// Reads a CSV file into records.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<String>>, RustyDeckError> {
    let path = path.as_ref();
    let read = || -> Result<Vec<Vec<String>>, RustyDeckError> {
        let bytes = std::fs::read(path)?;
        Ok(parse_records(&decode(&bytes)))
    };
    read().with_prefix(&format!("Failed to read '{}'", path.display()))
}
