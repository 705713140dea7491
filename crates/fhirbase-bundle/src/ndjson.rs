//! Newline-delimited JSON reader.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;

use fhirbase_core::Resource;
use serde_json::Value;
use tracing::warn;

use crate::detect::READ_AHEAD;
use crate::error::Result;
use crate::file::{BundleFile, Rewind};

pub struct NdjsonBundle {
    path: PathBuf,
    reader: Option<BufReader<BundleFile>>,
    count: usize,
    line_no: usize,
    line: Vec<u8>,
}

impl NdjsonBundle {
    /// Counts the lines of `file`, rewinds it and prepares for reading.
    pub fn new(mut file: BundleFile) -> Result<Self> {
        let count = count_lines(&mut file)?;
        file.rewind()?;

        Ok(Self {
            path: file.path().to_path_buf(),
            reader: Some(BufReader::with_capacity(READ_AHEAD, file)),
            count,
            line_no: 0,
            line: Vec::new(),
        })
    }

    pub fn next(&mut self) -> Result<Option<Resource>> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };

            self.line.clear();
            if reader.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            if self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match serde_json::from_slice::<Value>(&self.line) {
                Ok(Value::Object(resource)) => return Ok(Some(resource)),
                Ok(_) => {
                    warn!(
                        file = %self.path.display(),
                        line = self.line_no,
                        content = %String::from_utf8_lossy(self.line.trim_ascii()),
                        "expecting JSON object at the root of the resource, skipping rest of the file"
                    );
                }
                Err(e) => {
                    warn!(
                        file = %self.path.display(),
                        line = self.line_no,
                        error = %e,
                        "cannot parse line, skipping rest of the file"
                    );
                }
            }
            self.close();
            return Ok(None);
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn close(&mut self) {
        self.reader = None;
    }
}

/// Counts newline-terminated lines plus a trailing unterminated one.
fn count_lines<R: Read>(reader: &mut R) -> Result<usize> {
    let mut buf = vec![0u8; READ_AHEAD];
    let mut count = 0;
    let mut last = b'\n';

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        count += buf[..n].iter().filter(|&&b| b == b'\n').count();
        last = buf[n - 1];
    }

    if last != b'\n' {
        count += 1;
    }
    Ok(count)
}
