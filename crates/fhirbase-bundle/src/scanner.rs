//! A minimal streaming JSON structure scanner.
//!
//! Walks object keys and array elements of a large document without
//! materializing it. Values the caller is not interested in are skipped by
//! tracking nesting depth and string state only; values the caller wants are
//! captured as raw bytes and handed to `serde_json`.

use std::io::BufRead;

use crate::error::{BundleError, Result};

pub struct JsonScanner<R> {
    reader: R,
    first_item: bool,
}

impl<R: BufRead> JsonScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            first_item: true,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Returns the next non-whitespace byte without consuming it.
    pub fn peek(&mut self) -> Result<Option<u8>> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(None);
            }
            match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(pos) => {
                    let byte = buf[pos];
                    self.reader.consume(pos);
                    return Ok(Some(byte));
                }
                None => {
                    let len = buf.len();
                    self.reader.consume(len);
                }
            }
        }
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.peek()? {
            Some(b) if b == expected => {
                self.reader.consume(1);
                Ok(())
            }
            Some(b) => Err(BundleError::format(format!(
                "expected `{}`, found `{}`",
                expected as char, b as char
            ))),
            None => Err(unexpected_eof()),
        }
    }

    /// Consumes the `{` opening the current value.
    pub fn begin_object(&mut self) -> Result<()> {
        self.expect(b'{')?;
        self.first_item = true;
        Ok(())
    }

    /// Advances to the next key of the object opened by [`begin_object`],
    /// consuming the `:` after it. Returns `None` at the closing `}`.
    ///
    /// [`begin_object`]: Self::begin_object
    pub fn next_key(&mut self) -> Result<Option<String>> {
        if !self.advance_item(b'}')? {
            return Ok(None);
        }
        let key = match self.read_string()? {
            Some(key) => key,
            None => return Err(BundleError::format("object key is not a string")),
        };
        self.expect(b':')?;
        Ok(Some(key))
    }

    /// Consumes the `[` opening the current value.
    pub fn begin_array(&mut self) -> Result<()> {
        self.expect(b'[')?;
        self.first_item = true;
        Ok(())
    }

    /// Positions the scanner at the next element of the array opened by
    /// [`begin_array`]. Returns false at the closing `]`.
    ///
    /// [`begin_array`]: Self::begin_array
    pub fn next_element(&mut self) -> Result<bool> {
        self.advance_item(b']')
    }

    fn advance_item(&mut self, close: u8) -> Result<bool> {
        let Some(b) = self.peek()? else {
            return Err(unexpected_eof());
        };
        if b == close {
            self.reader.consume(1);
            return Ok(false);
        }
        if !self.first_item {
            if b != b',' {
                return Err(BundleError::format(format!(
                    "expected `,` or `{}`, found `{}`",
                    close as char, b as char
                )));
            }
            self.reader.consume(1);
        }
        self.first_item = false;
        Ok(true)
    }

    /// Reads a string value. Non-string values are skipped and yield `None`.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        match self.peek()? {
            Some(b'"') => {
                let raw = self.read_value_bytes()?;
                Ok(Some(serde_json::from_slice(&raw)?))
            }
            Some(_) => {
                self.skip_value()?;
                Ok(None)
            }
            None => Err(unexpected_eof()),
        }
    }

    pub fn skip_value(&mut self) -> Result<()> {
        self.scan_value(None)
    }

    /// Returns the raw bytes of the next value.
    pub fn read_value_bytes(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.scan_value(Some(&mut out))?;
        Ok(out)
    }

    fn scan_value(&mut self, mut sink: Option<&mut Vec<u8>>) -> Result<()> {
        match self.peek()? {
            None => Err(unexpected_eof()),
            Some(b'{' | b'[' | b'"') => self.scan_structured(&mut sink),
            Some(b'}' | b']' | b',' | b':') => Err(BundleError::format("expected a JSON value")),
            Some(_) => self.scan_scalar(&mut sink),
        }
    }

    fn scan_structured(&mut self, sink: &mut Option<&mut Vec<u8>>) -> Result<()> {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Err(unexpected_eof());
            }

            let mut end = None;
            for (i, &b) in buf.iter().enumerate() {
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if b == b'\\' {
                        escaped = true;
                    } else if b == b'"' {
                        in_string = false;
                        if depth == 0 {
                            end = Some(i);
                            break;
                        }
                    }
                    continue;
                }
                match b {
                    b'"' => in_string = true,
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            end = Some(i);
                            break;
                        }
                    }
                    _ => {}
                }
            }

            let n = end.map_or(buf.len(), |i| i + 1);
            if let Some(out) = sink.as_deref_mut() {
                out.extend_from_slice(&buf[..n]);
            }
            self.reader.consume(n);

            if end.is_some() {
                return Ok(());
            }
        }
    }

    fn scan_scalar(&mut self, sink: &mut Option<&mut Vec<u8>>) -> Result<()> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(());
            }
            let end = buf
                .iter()
                .position(|b| matches!(b, b',' | b'}' | b']') || b.is_ascii_whitespace());
            let n = end.unwrap_or(buf.len());
            if let Some(out) = sink.as_deref_mut() {
                out.extend_from_slice(&buf[..n]);
            }
            self.reader.consume(n);
            if end.is_some() {
                return Ok(());
            }
        }
    }
}

fn unexpected_eof() -> BundleError {
    BundleError::format("unexpected end of input")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    fn scanner(s: &str) -> JsonScanner<BufReader<Cursor<Vec<u8>>>> {
        // tiny buffer so values straddle refills
        JsonScanner::new(BufReader::with_capacity(4, Cursor::new(s.as_bytes().to_vec())))
    }

    #[test]
    fn test_walks_object_keys() {
        let mut s = scanner(r#" { "a": 1, "b": {"x": [1, "}"]}, "c": "str\"ing", "d": null } "#);
        s.begin_object().unwrap();

        assert_eq!(s.next_key().unwrap().as_deref(), Some("a"));
        s.skip_value().unwrap();
        assert_eq!(s.next_key().unwrap().as_deref(), Some("b"));
        assert_eq!(s.read_value_bytes().unwrap(), br#"{"x": [1, "}"]}"#);
        assert_eq!(s.next_key().unwrap().as_deref(), Some("c"));
        assert_eq!(s.read_string().unwrap().as_deref(), Some("str\"ing"));
        assert_eq!(s.next_key().unwrap().as_deref(), Some("d"));
        assert_eq!(s.read_string().unwrap(), None);
        assert_eq!(s.next_key().unwrap(), None);
    }

    #[test]
    fn test_walks_array_elements() {
        let mut s = scanner(r#"[ {"n": 1}, true, -2.5e3 , "x" ]"#);
        s.begin_array().unwrap();

        let mut items = Vec::new();
        while s.next_element().unwrap() {
            items.push(String::from_utf8(s.read_value_bytes().unwrap()).unwrap());
        }
        assert_eq!(items, vec![r#"{"n": 1}"#, "true", "-2.5e3", r#""x""#]);
    }

    #[test]
    fn test_empty_containers() {
        let mut s = scanner("{}");
        s.begin_object().unwrap();
        assert_eq!(s.next_key().unwrap(), None);

        let mut s = scanner("[ ]");
        s.begin_array().unwrap();
        assert!(!s.next_element().unwrap());
    }

    #[test]
    fn test_missing_comma_is_format_error() {
        let mut s = scanner(r#"[1 2]"#);
        s.begin_array().unwrap();
        assert!(s.next_element().unwrap());
        s.skip_value().unwrap();
        assert!(s.next_element().unwrap_err().is_format_error());
    }

    #[test]
    fn test_truncated_input() {
        let mut s = scanner(r#"{"a": {"b": 1"#);
        s.begin_object().unwrap();
        s.next_key().unwrap();
        assert!(s.skip_value().is_err());
    }

    #[test]
    fn test_escaped_key() {
        let mut s = scanner(r#"{"resourceType": "Bundle"}"#);
        s.begin_object().unwrap();
        assert_eq!(s.next_key().unwrap().as_deref(), Some("resourceType"));
    }
}
