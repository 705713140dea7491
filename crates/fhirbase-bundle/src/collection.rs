//! FHIR collection/transaction Bundle reader.

use std::io::BufReader;
use std::path::PathBuf;

use fhirbase_core::Resource;
use serde_json::Value;
use tracing::warn;

use crate::detect::READ_AHEAD;
use crate::error::{BundleError, Result};
use crate::file::{BundleFile, Rewind};
use crate::scanner::JsonScanner;

type Scanner = JsonScanner<BufReader<BundleFile>>;

/// Streams `entry[*].resource` out of a FHIR Bundle without loading the
/// whole document.
pub struct FhirBundle {
    path: PathBuf,
    scanner: Option<Scanner>,
    count: usize,
    entry_no: usize,
}

impl FhirBundle {
    /// Locates and counts the `entry` array, then rewinds and positions the
    /// reader at its first element.
    pub fn new(file: BundleFile) -> Result<Self> {
        let path = file.path().to_path_buf();

        let mut scanner = JsonScanner::new(BufReader::with_capacity(READ_AHEAD, file));
        goto_entries(&mut scanner)?;
        let count = count_entries(&mut scanner)?;

        let mut file = scanner.into_inner().into_inner();
        file.rewind()?;
        let mut scanner = JsonScanner::new(BufReader::with_capacity(READ_AHEAD, file));
        goto_entries(&mut scanner)?;

        Ok(Self {
            path,
            scanner: Some(scanner),
            count,
            entry_no: 0,
        })
    }

    pub fn next(&mut self) -> Result<Option<Resource>> {
        let Some(scanner) = self.scanner.as_mut() else {
            return Ok(None);
        };

        let raw = match next_entry(scanner) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.close();
                return Ok(None);
            }
            Err(e) if e.is_format_error() => {
                return Ok(self.skip_rest(&format!("malformed bundle: {e}")));
            }
            Err(e) => return Err(e),
        };
        self.entry_no += 1;

        let mut entry = match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(entry)) => entry,
            Ok(_) => {
                return Ok(self.skip_rest("got non-object value in the entries array"));
            }
            Err(e) => return Ok(self.skip_rest(&format!("cannot parse entry: {e}"))),
        };

        match entry.remove("resource") {
            Some(Value::Object(resource)) => Ok(Some(resource)),
            Some(_) => Ok(self.skip_rest("got non-object value at entry.resource")),
            None => Ok(self.skip_rest("cannot get entry.resource attribute")),
        }
    }

    fn skip_rest(&mut self, reason: &str) -> Option<Resource> {
        warn!(
            file = %self.path.display(),
            entry = self.entry_no,
            "{reason}, skipping rest of the file"
        );
        self.close();
        None
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn close(&mut self) {
        self.scanner = None;
    }
}

fn next_entry(scanner: &mut Scanner) -> Result<Option<Vec<u8>>> {
    if !scanner.next_element()? {
        return Ok(None);
    }
    scanner.read_value_bytes().map(Some)
}

/// Walks top-level keys until the `entry` array and consumes its `[`.
fn goto_entries<R: std::io::BufRead>(scanner: &mut JsonScanner<R>) -> Result<()> {
    if scanner.peek()? != Some(b'{') {
        return Err(BundleError::format(
            "expecting JSON object at the root of the FHIR Bundle",
        ));
    }
    scanner.begin_object()?;

    while let Some(key) = scanner.next_key()? {
        if key == "entry" && scanner.peek()? == Some(b'[') {
            return scanner.begin_array();
        }
        scanner.skip_value()?;
    }

    Err(BundleError::MissingEntries)
}

fn count_entries<R: std::io::BufRead>(scanner: &mut JsonScanner<R>) -> Result<usize> {
    let mut count = 0;
    while scanner.next_element()? {
        scanner.skip_value()?;
        count += 1;
    }
    Ok(count)
}
