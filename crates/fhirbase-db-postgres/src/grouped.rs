//! Run-length grouping of a resource stream for COPY.

use std::time::{Duration, Instant};

use fhirbase_bundle::ResourceSource;
use fhirbase_core::{Resource, generate_id, resource_id, resource_type};
use fhirbase_transform::TransformEngine;
use tracing::{debug, warn};

use crate::error::Result;
use crate::target::{CopySource, LoadRow};

/// Splits a resource stream into runs of one resource type.
///
/// Holds at most one resource of look-ahead. [`GroupedSource::next_run`]
/// starts a run; [`CopySource::advance`] then yields its rows until the
/// type changes. Rows are transformed as they are pulled; a resource whose
/// transform fails is logged and skipped.
pub struct GroupedSource<'a, S: ?Sized, F: ?Sized> {
    source: &'a mut S,
    engine: &'a mut TransformEngine,
    version: &'a str,
    progress: &'a mut F,
    pending: Option<Resource>,
    current_type: Option<String>,
    row: Option<LoadRow>,
    exhausted: bool,
    last_tick: Instant,
    rows: usize,
    skipped: usize,
}

impl<'a, S, F> GroupedSource<'a, S, F>
where
    S: ResourceSource + ?Sized,
    F: FnMut(&str, Duration) + Send + ?Sized,
{
    pub fn new(
        source: &'a mut S,
        engine: &'a mut TransformEngine,
        version: &'a str,
        progress: &'a mut F,
    ) -> Self {
        Self {
            source,
            engine,
            version,
            progress,
            pending: None,
            current_type: None,
            row: None,
            exhausted: false,
            last_tick: Instant::now(),
            rows: 0,
            skipped: 0,
        }
    }

    /// Starts the next run and returns its resource type, or `None` once
    /// the input is exhausted.
    pub fn next_run(&mut self) -> Result<Option<String>> {
        if self.pending.is_none() && !self.exhausted {
            self.pending = self.pull()?;
        }

        self.current_type = self
            .pending
            .as_ref()
            .and_then(resource_type)
            .map(str::to_string);

        if let Some(rt) = &self.current_type {
            debug!(resource_type = %rt, "starting run");
        }
        Ok(self.current_type.clone())
    }

    /// Rows yielded so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Resources dropped because they had no type or failed to transform.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn pull(&mut self) -> Result<Option<Resource>> {
        loop {
            match self.source.next()? {
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
                Some(resource) if resource_type(&resource).is_some() => return Ok(Some(resource)),
                Some(_) => {
                    warn!("resource without resourceType, skipping");
                    self.skipped += 1;
                }
            }
        }
    }
}

impl<S, F> CopySource for GroupedSource<'_, S, F>
where
    S: ResourceSource + ?Sized,
    F: FnMut(&str, Duration) + Send + ?Sized,
{
    fn advance(&mut self) -> Result<bool> {
        let Some(current) = self.current_type.clone() else {
            return Ok(false);
        };

        loop {
            let resource = match self.pending.take() {
                Some(resource) => resource,
                None if self.exhausted => return Ok(false),
                None => match self.pull()? {
                    Some(resource) => resource,
                    None => return Ok(false),
                },
            };

            if resource_type(&resource) != Some(current.as_str()) {
                self.pending = Some(resource);
                return Ok(false);
            }

            let transformed = match self.engine.do_transform(resource, self.version) {
                Ok(transformed) => transformed,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(resource_type = %current, error = %e, "error during transform, skipping resource");
                    self.skipped += 1;
                    continue;
                }
            };

            let id = resource_id(&transformed)
                .map(str::to_string)
                .unwrap_or_else(generate_id);
            self.row = Some(LoadRow {
                id: Some(id),
                resource: serde_json::to_string(&transformed)?,
            });
            self.rows += 1;

            let now = Instant::now();
            (self.progress)(&current, now.duration_since(self.last_tick));
            self.last_tick = now;

            return Ok(true);
        }
    }

    fn current_type_name(&self) -> &str {
        self.current_type.as_deref().unwrap_or_default()
    }

    fn current_row_values(&mut self) -> Option<LoadRow> {
        self.row.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhirbase_bundle::BundleError;
    use serde_json::{Value, json};

    struct VecSource(std::vec::IntoIter<Resource>);

    impl VecSource {
        fn new(types: &[&str]) -> Self {
            let resources: Vec<Resource> = types
                .iter()
                .enumerate()
                .map(|(i, rt)| match json!({"resourceType": rt, "id": format!("r{i}")}) {
                    Value::Object(map) => map,
                    _ => unreachable!(),
                })
                .collect();
            Self(resources.into_iter())
        }
    }

    impl ResourceSource for VecSource {
        fn next(&mut self) -> std::result::Result<Option<Resource>, BundleError> {
            Ok(self.0.next())
        }

        fn count(&self) -> usize {
            self.0.len()
        }

        fn close(&mut self) {}
    }

    fn runs(types: &[&str]) -> Vec<(String, Vec<String>)> {
        let mut source = VecSource::new(types);
        let mut engine = TransformEngine::new();
        let mut progress = |_: &str, _: Duration| {};
        let mut grouped = GroupedSource::new(&mut source, &mut engine, "4.0.0", &mut progress);

        let mut out = Vec::new();
        while let Some(rt) = grouped.next_run().unwrap() {
            let mut ids = Vec::new();
            while grouped.advance().unwrap() {
                assert_eq!(grouped.current_type_name(), rt);
                ids.push(grouped.current_row_values().unwrap().id.unwrap());
            }
            out.push((rt, ids));
        }
        out
    }

    #[test]
    fn test_runs_follow_type_changes() {
        let out = runs(&["A", "A", "A", "B", "B", "A"]);
        assert_eq!(
            out,
            vec![
                ("A".to_string(), vec!["r0".into(), "r1".into(), "r2".into()]),
                ("B".to_string(), vec!["r3".into(), "r4".into()]),
                ("A".to_string(), vec!["r5".into()]),
            ]
        );
    }

    #[test]
    fn test_empty_input_has_no_runs() {
        assert!(runs(&[]).is_empty());
    }

    #[test]
    fn test_advance_without_run_is_false() {
        let mut source = VecSource::new(&["A"]);
        let mut engine = TransformEngine::new();
        let mut progress = |_: &str, _: Duration| {};
        let mut grouped = GroupedSource::new(&mut source, &mut engine, "4.0.0", &mut progress);
        assert!(!grouped.advance().unwrap());
    }
}
