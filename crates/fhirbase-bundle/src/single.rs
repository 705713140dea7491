//! Reader for files holding exactly one resource.

use std::io::Read;

use fhirbase_core::Resource;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::file::BundleFile;

pub struct SingleResourceBundle {
    file: BundleFile,
    already_read: bool,
}

impl SingleResourceBundle {
    pub fn new(file: BundleFile) -> Self {
        Self {
            file,
            already_read: false,
        }
    }

    pub fn next(&mut self) -> Result<Option<Resource>> {
        if self.already_read || self.file.is_closed() {
            return Ok(None);
        }
        self.already_read = true;

        let mut content = Vec::new();
        self.file.read_to_end(&mut content)?;

        match serde_json::from_slice::<Value>(&content) {
            Ok(Value::Object(resource)) => Ok(Some(resource)),
            Ok(_) => {
                warn!(file = %self.file.path().display(), "expecting JSON object at the root, skipping file");
                Ok(None)
            }
            Err(e) => {
                warn!(file = %self.file.path().display(), error = %e, "cannot parse resource, skipping file");
                Ok(None)
            }
        }
    }

    pub fn count(&self) -> usize {
        1
    }

    pub fn close(&mut self) {
        self.file.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_returns_resource_once() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"{\n  \"resourceType\": \"Patient\",\n  \"id\": \"p1\"\n}\n")
            .unwrap();

        let mut b = SingleResourceBundle::new(BundleFile::open(tmp.path()).unwrap());
        assert_eq!(b.count(), 1);

        let r = b.next().unwrap().unwrap();
        assert_eq!(r["id"], "p1");
        assert!(b.next().unwrap().is_none());
    }

    #[test]
    fn test_trailing_garbage_skips_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"{\"resourceType\": \"Patient\"} trailing").unwrap();

        let mut b = SingleResourceBundle::new(BundleFile::open(tmp.path()).unwrap());
        assert!(b.next().unwrap().is_none());
    }
}
