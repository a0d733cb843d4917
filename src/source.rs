//! Streaming reader over large JSON record files.
//!
//! Accepts either a single top-level JSON array (one record per element) or a
//! sequence of concatenated top-level JSON values. Only the bytes of the
//! record currently being decoded are held in memory.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::de::Error as _;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{IngestError, Result};

/// One loosely-typed record as it appears in the source file.
pub type RawRecord = Map<String, Value>;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Validate a source path before anything else touches it.
///
/// Existence is checked first, then the `.json` suffix.
pub fn check_source_path(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(IngestError::FileNotFound(path.to_path_buf()));
    }
    if !path.as_os_str().to_string_lossy().ends_with(".json") {
        return Err(IngestError::InvalidFormat(path.to_path_buf()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    TopLevel,
    ArrayFirst,
    ArrayNext,
    Done,
}

/// Lazy, non-restartable iterator of [`RawRecord`]s.
pub struct JsonRecordSource<R> {
    reader: R,
    framing: Framing,
    bom_checked: bool,
    buf: Vec<u8>,
    index: u64,
    skipped: u64,
}

impl JsonRecordSource<BufReader<File>> {
    /// Open a file after validating its path.
    pub fn open(path: &Path) -> Result<Self> {
        check_source_path(path)?;
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonRecordSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            framing: Framing::TopLevel,
            bom_checked: false,
            buf: Vec::with_capacity(4096),
            index: 0,
            skipped: 0,
        }
    }

    /// Number of values decoded so far, including skipped ones.
    pub fn values_read(&self) -> u64 {
        self.index
    }

    /// Values that parsed but were not JSON objects.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn peek(&mut self) -> std::io::Result<Option<u8>> {
        Ok(self.reader.fill_buf()?.first().copied())
    }

    fn bump(&mut self) {
        self.reader.consume(1);
    }

    fn skip_whitespace(&mut self) -> std::io::Result<Option<u8>> {
        loop {
            match self.peek()? {
                Some(b) if b.is_ascii_whitespace() => self.bump(),
                other => return Ok(other),
            }
        }
    }

    fn structural_error(&self, msg: impl std::fmt::Display) -> IngestError {
        IngestError::Parse {
            index: self.index + 1,
            source: serde_json::Error::custom(msg),
        }
    }

    /// Copy the bytes of exactly one JSON value into `self.buf`.
    ///
    /// Scalars end at the first delimiter; containers end at their matching
    /// close bracket. Brackets inside strings are ignored.
    fn read_value_bytes(&mut self) -> Result<()> {
        self.buf.clear();
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        loop {
            let Some(byte) = self.peek()? else {
                if in_string || depth > 0 || self.buf.is_empty() {
                    return Err(self.structural_error("unexpected end of input"));
                }
                return Ok(());
            };
            if in_string {
                self.bump();
                self.buf.push(byte);
                if escaped {
                    escaped = false;
                } else if byte == b'\\' {
                    escaped = true;
                } else if byte == b'"' {
                    in_string = false;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                continue;
            }
            match byte {
                b'"' => {
                    self.bump();
                    self.buf.push(byte);
                    in_string = true;
                }
                b'{' | b'[' => {
                    self.bump();
                    self.buf.push(byte);
                    depth += 1;
                }
                b'}' | b']' => {
                    if depth == 0 {
                        // closing bracket of the enclosing array
                        return Ok(());
                    }
                    self.bump();
                    self.buf.push(byte);
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                b',' if depth == 0 => return Ok(()),
                b if depth == 0 && b.is_ascii_whitespace() => return Ok(()),
                _ => {
                    self.bump();
                    self.buf.push(byte);
                }
            }
        }
    }

    fn decode_buffered(&mut self) -> Result<Value> {
        if self.buf.is_empty() {
            return Err(self.structural_error("expected a JSON value"));
        }
        self.index += 1;
        serde_json::from_slice(&self.buf).map_err(|source| IngestError::Parse {
            index: self.index,
            source,
        })
    }

    fn next_value(&mut self) -> Result<Option<Value>> {
        if !self.bom_checked {
            self.bom_checked = true;
            if self.reader.fill_buf()?.starts_with(&UTF8_BOM) {
                self.reader.consume(UTF8_BOM.len());
            }
        }
        loop {
            match self.framing {
                Framing::Done => return Ok(None),
                Framing::TopLevel => match self.skip_whitespace()? {
                    None => {
                        self.framing = Framing::Done;
                        return Ok(None);
                    }
                    Some(b'[') => {
                        self.bump();
                        self.framing = Framing::ArrayFirst;
                    }
                    Some(_) => {
                        self.read_value_bytes()?;
                        return self.decode_buffered().map(Some);
                    }
                },
                Framing::ArrayFirst => match self.skip_whitespace()? {
                    None => return Err(self.structural_error("unterminated array")),
                    Some(b']') => {
                        self.bump();
                        self.framing = Framing::TopLevel;
                    }
                    Some(_) => {
                        self.read_value_bytes()?;
                        self.framing = Framing::ArrayNext;
                        return self.decode_buffered().map(Some);
                    }
                },
                Framing::ArrayNext => match self.skip_whitespace()? {
                    None => return Err(self.structural_error("unterminated array")),
                    Some(b']') => {
                        self.bump();
                        self.framing = Framing::TopLevel;
                    }
                    Some(b',') => {
                        self.bump();
                        self.skip_whitespace()?;
                        self.read_value_bytes()?;
                        return self.decode_buffered().map(Some);
                    }
                    Some(other) => {
                        return Err(self.structural_error(format!(
                            "expected ',' or ']' between array elements, found '{}'",
                            other as char
                        )))
                    }
                },
            }
        }
    }
}

impl<R: BufRead> Iterator for JsonRecordSource<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_value() {
                Ok(None) => return None,
                Ok(Some(Value::Object(map))) => return Some(Ok(map)),
                Ok(Some(other)) => {
                    self.skipped += 1;
                    warn!(
                        target = "source",
                        index = self.index,
                        kind = crate::normalization::JsonKind::of(&other).as_str(),
                        "skipping non-object record"
                    );
                }
                Err(e) => {
                    self.framing = Framing::Done;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Cursor, Write};

    fn records(input: &str) -> Vec<Result<RawRecord>> {
        JsonRecordSource::from_reader(Cursor::new(input.as_bytes().to_vec())).collect()
    }

    fn ok_records(input: &str) -> Vec<Value> {
        records(input)
            .into_iter()
            .map(|r| Value::Object(r.unwrap()))
            .collect()
    }

    #[test]
    fn streams_array_elements() {
        let out = ok_records(r#"[ {"asin": "a"}, {"asin": "b"} ,{"asin":"c"} ]"#);
        assert_eq!(
            out,
            vec![json!({"asin": "a"}), json!({"asin": "b"}), json!({"asin": "c"})]
        );
    }

    #[test]
    fn streams_concatenated_values() {
        let out = ok_records("{\"n\": 1}\n{\"n\": 2}{\"n\": 3}\n");
        assert_eq!(out, vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
    }

    #[test]
    fn brackets_inside_strings_do_not_end_a_record() {
        let out = ok_records(r#"[{"title": "a ] b } [ \" c", "rank": ["1,2"]}]"#);
        assert_eq!(out, vec![json!({"title": "a ] b } [ \" c", "rank": ["1,2"]})]);
    }

    #[test]
    fn empty_inputs_yield_nothing() {
        assert!(records("").is_empty());
        assert!(records("  []  ").is_empty());
    }

    #[test]
    fn skips_bom_and_non_object_values() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(br#"[1, "x", {"ok": true}, null]"#);
        let mut source = JsonRecordSource::from_reader(Cursor::new(bytes));
        let out: Vec<_> = source.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("ok"), Some(&json!(true)));
        assert_eq!(source.skipped(), 3);
        assert_eq!(source.values_read(), 4);
    }

    #[test]
    fn truncated_input_is_a_parse_error() {
        let out = records(r#"[{"asin": "a"}, {"asin": "#);
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        match &out[1] {
            Err(IngestError::Parse { index, .. }) => assert_eq!(*index, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_separator_is_a_parse_error() {
        let out = records(r#"[{"a": 1} {"b": 2}]"#);
        assert!(matches!(out.last(), Some(Err(IngestError::Parse { .. }))));
    }

    #[test]
    fn open_rejects_missing_file_and_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("nope.json");
        assert!(matches!(
            check_source_path(&missing),
            Err(IngestError::FileNotFound(_))
        ));

        let wrong = dir.path().join("data.txt");
        std::fs::write(&wrong, "[]").unwrap();
        assert!(matches!(
            check_source_path(&wrong),
            Err(IngestError::InvalidFormat(_))
        ));

        let good = dir.path().join("data.json");
        let mut f = std::fs::File::create(&good).unwrap();
        write!(f, r#"[{{"asin": "0001"}}]"#).unwrap();
        drop(f);
        let out: Vec<_> = JsonRecordSource::open(&good).unwrap().collect();
        assert_eq!(out.len(), 1);
    }
}
