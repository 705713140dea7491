use fhirbase_core::Resource;

use crate::error::Result;

/// A stream of resources read one at a time.
///
/// `next` returns `Ok(None)` once the input is exhausted; `count` is a
/// best-effort total known up front and is only used for progress display.
pub trait ResourceSource: Send {
    fn next(&mut self) -> Result<Option<Resource>>;

    fn count(&self) -> usize;

    fn close(&mut self);
}
