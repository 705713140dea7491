use std::time::Duration;

use async_trait::async_trait;
use fhirbase_bundle::{BundleError, ResourceSource};
use fhirbase_core::Resource;
use fhirbase_db_postgres::{
    CopyLoader, CopySource, InsertLoader, LoadBatch, LoadTarget, Loader, LoaderError, Result,
};
use fhirbase_transform::TransformEngine;
use serde_json::{Value, json};

/// Records what would have been written.
#[derive(Default)]
struct RecordingTarget {
    copies: Vec<(String, Vec<String>)>,
    batches: Vec<Vec<(String, Option<String>)>>,
}

#[async_trait]
impl LoadTarget for RecordingTarget {
    async fn copy_rows(&mut self, table: &str, rows: &mut dyn CopySource) -> Result<u64> {
        let mut ids = Vec::new();
        while rows.advance()? {
            let row = rows.current_row_values().unwrap();
            let resource: Value = serde_json::from_str(&row.resource).unwrap();
            assert_eq!(
                resource["resourceType"].as_str().unwrap().to_lowercase(),
                table
            );
            ids.push(row.id.unwrap());
        }
        let count = ids.len() as u64;
        self.copies.push((table.to_string(), ids));
        Ok(count)
    }

    async fn send_batch(&mut self, batch: &LoadBatch) -> Result<()> {
        self.batches.push(
            batch
                .statements()
                .iter()
                .map(|s| (s.table.clone(), s.row.id.clone()))
                .collect(),
        );
        Ok(())
    }
}

struct VecSource(std::vec::IntoIter<Resource>);

impl VecSource {
    fn new(values: Vec<Value>) -> Self {
        let resources: Vec<Resource> = values
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => map,
                other => panic!("not an object: {other}"),
            })
            .collect();
        Self(resources.into_iter())
    }

    fn typed(types: &[&str]) -> Self {
        Self::new(
            types
                .iter()
                .enumerate()
                .map(|(i, rt)| json!({"resourceType": rt, "id": format!("{i}")}))
                .collect(),
        )
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

#[tokio::test]
async fn test_copy_groups_runs() {
    let mut target = RecordingTarget::default();
    let mut source = VecSource::typed(&[
        "Patient",
        "Patient",
        "Patient",
        "Observation",
        "Observation",
        "Patient",
    ]);
    let mut seen = Vec::new();
    let mut progress = |rt: &str, _: Duration| seen.push(rt.to_string());

    let mut loader = CopyLoader::new(TransformEngine::new(), "4.0.0");
    let outcome = loader
        .load(&mut target, &mut source, &mut progress)
        .await
        .unwrap();

    assert_eq!(outcome.loaded, 6);
    assert_eq!(outcome.writes, 3);
    assert_eq!(
        target.copies,
        vec![
            ("patient".to_string(), vec!["0".into(), "1".into(), "2".into()]),
            ("observation".to_string(), vec!["3".into(), "4".into()]),
            ("patient".to_string(), vec!["5".into()]),
        ]
    );
    assert_eq!(seen.len(), 6);
    assert_eq!(seen[3], "Observation");
}

#[tokio::test]
async fn test_copy_homogeneous_input_is_one_call() {
    let mut target = RecordingTarget::default();
    let types = vec!["Observation"; 5000];
    let mut source = VecSource::typed(&types);
    let mut calls = 0usize;
    let mut progress = |_: &str, _: Duration| calls += 1;

    let mut loader = CopyLoader::new(TransformEngine::new(), "4.0.0");
    loader
        .load(&mut target, &mut source, &mut progress)
        .await
        .unwrap();

    assert_eq!(target.copies.len(), 1);
    assert_eq!(target.copies[0].1.len(), 5000);
    assert_eq!(calls, 5000);
}

#[tokio::test]
async fn test_copy_generates_missing_ids_and_transforms() {
    let mut target = RecordingTarget::default();
    let mut source = VecSource::new(vec![
        json!({"resourceType": "Observation", "subject": {"reference": "Patient/p1"}}),
    ]);

    let mut loader = CopyLoader::new(TransformEngine::new(), "4.0.0");
    loader
        .load(&mut target, &mut source, &mut |_: &str, _: Duration| {})
        .await
        .unwrap();

    let id = &target.copies[0].1[0];
    assert_eq!(id.len(), 36);
}

#[tokio::test]
async fn test_insert_flushes_every_batch_size() {
    let mut target = RecordingTarget::default();
    let types = vec!["Patient"; 5000];
    let mut source = VecSource::typed(&types);
    let mut calls = 0usize;
    let mut progress = |_: &str, _: Duration| calls += 1;

    let mut loader = InsertLoader::new(TransformEngine::new(), "4.0.0");
    let outcome = loader
        .load(&mut target, &mut source, &mut progress)
        .await
        .unwrap();

    let sizes: Vec<_> = target.batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2000, 2000, 1000]);
    assert_eq!(outcome.writes, 3);
    assert_eq!(calls, 5000);
}

#[tokio::test]
async fn test_insert_skips_untransformable_and_keeps_missing_ids() {
    let mut target = RecordingTarget::default();
    let mut source = VecSource::new(vec![
        json!({"resourceType": "Patient", "id": "a"}),
        json!({"id": "no-type"}),
        json!({"resourceType": "Encounter"}),
    ]);

    let mut loader = InsertLoader::new(TransformEngine::new(), "4.0.0").with_batch_size(10);
    let outcome = loader
        .load(&mut target, &mut source, &mut |_: &str, _: Duration| {})
        .await
        .unwrap();

    assert_eq!(outcome.loaded, 2);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(
        target.batches,
        vec![vec![
            ("patient".to_string(), Some("a".to_string())),
            ("encounter".to_string(), None),
        ]]
    );
}

#[tokio::test]
async fn test_unknown_version_aborts_load() {
    let mut target = RecordingTarget::default();
    let mut source = VecSource::typed(&["Patient"]);

    let mut loader = InsertLoader::new(TransformEngine::new(), "0.0.0");
    let err = loader
        .load(&mut target, &mut source, &mut |_: &str, _: Duration| {})
        .await
        .unwrap_err();

    assert!(matches!(err, LoaderError::Transform(_)));
    assert!(target.batches.is_empty());
}

/// Engine whose `deep` ruleset rejects any Patient carrying a `link`.
fn shallow_engine(dir: &tempfile::TempDir) -> TransformEngine {
    std::fs::write(
        dir.path().join("fhirbase-import-deep.json"),
        r#"{"Patient": {"link": {"other": {"tr/act": "reference"}}}}"#,
    )
    .unwrap();
    TransformEngine::new()
        .with_rules_dir(dir.path())
        .with_max_depth(1)
}

#[tokio::test]
async fn test_copy_skips_untransformable_resource_within_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = RecordingTarget::default();
    let mut source = VecSource::new(vec![
        json!({"resourceType": "Patient", "id": "a"}),
        json!({"resourceType": "Patient", "id": "bad", "link": [{"other": {"reference": "Patient/a"}}]}),
        json!({"resourceType": "Patient", "id": "c"}),
    ]);
    let mut seen = Vec::new();
    let mut progress = |rt: &str, _: Duration| seen.push(rt.to_string());

    let mut loader = CopyLoader::new(shallow_engine(&dir), "deep");
    let outcome = loader
        .load(&mut target, &mut source, &mut progress)
        .await
        .unwrap();

    assert_eq!(outcome.loaded, 2);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.writes, 1);
    assert_eq!(
        target.copies,
        vec![("patient".to_string(), vec!["a".into(), "c".into()])]
    );
    assert_eq!(seen, vec!["Patient", "Patient"]);
}

#[tokio::test]
async fn test_copy_unknown_version_aborts_load() {
    let mut target = RecordingTarget::default();
    let mut source = VecSource::typed(&["Patient", "Patient"]);

    let mut loader = CopyLoader::new(TransformEngine::new(), "0.0.0");
    let err = loader
        .load(&mut target, &mut source, &mut |_: &str, _: Duration| {})
        .await
        .unwrap_err();

    assert!(matches!(err, LoaderError::Transform(_)));
}
