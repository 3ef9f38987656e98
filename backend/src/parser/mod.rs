//! CSV decoding with encoding and delimiter auto-detection.
//!
//! Turns CSV bytes into [`Record`]s keyed by the header row. Nothing here
//! knows about grouping; the output feeds [`crate::merge`].

use std::io::Read;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::Record;

const BOM: char = '\u{feff}';

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// One record per data row
    pub records: Vec<Record>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers, in file order
    pub headers: Vec<String>,
}

/// Guess the encoding of raw bytes, normalized to the labels `decode_content` knows.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _confidence, _language) = chardet::detect(bytes);

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding.
///
/// Invalid UTF-8 is decoded lossily; unknown encodings are looked up by
/// label and fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        // windows-1252 agrees with ISO-8859-1 on 0xA0..=0xFF; ISO-8859-15 does not.
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => {
                let (text, _, had_errors) = enc.decode(bytes);
                if had_errors {
                    return Err(CsvError::EncodingError {
                        encoding: other.to_string(),
                        message: "input contains malformed sequences".to_string(),
                    });
                }
                text.into_owned()
            }
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    if decoded.starts_with(BOM) {
        Ok(decoded[BOM.len_utf8()..].to_string())
    } else {
        Ok(decoded)
    }
}

/// Separators tried on the header line, in tie-break order.
const DELIMITERS: [char; 4] = [';', ',', '\t', '|'];

/// Pick the separator that occurs most often in the header line.
///
/// Ties keep the earlier candidate, so a line with none of them gives `;`.
pub fn detect_delimiter(content: &str) -> char {
    let header = content.lines().next().unwrap_or("");

    DELIMITERS
        .iter()
        .map(|&sep| (sep, header.matches(sep).count()))
        .fold((DELIMITERS[0], 0), |best, (sep, count)| {
            if count > best.1 {
                (sep, count)
            } else {
                best
            }
        })
        .0
}

/// Parse CSV from a reader.
///
/// The first row is the header. Short rows read missing columns as "",
/// extra cells are ignored, blank lines are skipped. Values are kept as
/// written; only header names are trimmed.
pub fn parse_reader<R: Read>(reader: R, delimiter: char) -> CsvResult<(Vec<String>, Vec<Record>)> {
    if !delimiter.is_ascii() {
        return Err(CsvError::ParseError {
            line: 1,
            message: format!("delimiter {:?} is not a single-byte character", delimiter),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().trim_start_matches(BOM).to_string())
        .collect();

    if headers.is_empty() {
        return Err(CsvError::EmptyFile);
    }
    if headers.iter().all(String::is_empty) {
        return Err(CsvError::NoHeaders);
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: Record = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), row.get(i).unwrap_or("").to_string()))
            .collect();
        records.push(record);
    }

    Ok((headers, records))
}

/// Parse CSV text with an explicit delimiter.
///
/// # Example
/// ```ignore
/// use unique_contact::parse_str;
///
/// let csv = "name,code\nfoo1,1\nbar1,2";
/// let rows = parse_str(csv, ',').unwrap();
///
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[0]["name"], "foo1");
/// ```
pub fn parse_str(content: &str, delimiter: char) -> CsvResult<Vec<Record>> {
    parse_reader(content.as_bytes(), delimiter).map(|(_, records)| records)
}

/// Parse CSV text with an explicit delimiter and return metadata.
pub fn parse_string_with_metadata(
    content: &str,
    delimiter: char,
    encoding: String,
) -> CsvResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let (headers, records) = parse_reader(content.as_bytes(), delimiter)?;

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);

    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse bytes with a caller-chosen delimiter, still detecting the encoding.
pub fn parse_bytes_with_delimiter(bytes: &[u8], delimiter: char) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;

    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let result = parse_file_auto("/path/to/contacts.csv")?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Records: {}", result.records.len());
/// ```
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}
