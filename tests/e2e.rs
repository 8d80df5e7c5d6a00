//! End-to-end conversion runs against in-memory storage
//!
//! Each test seeds a catalog manifest and source objects, runs the job through
//! the storage-backed job context, and inspects what landed in storage.

use bytes::Bytes;
use catalog2parquet::{ConversionJob, JobError, StorageJobContext};
use catalog2parquet_config::{RuntimeConfig, StorageBackend};
use catalog2parquet_core::StoredCatalog;
use opendal::Operator;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::HashMap;
use std::sync::Arc;

const MANIFEST: &str = r#"
[[tables]]
database = "etl_data_catalog"
name = "your_table"
location = "input/your_table/"
format = "json"

[[tables]]
database = "etl_data_catalog"
name = "events"
location = "input/events.csv"
format = "csv"

[[tables.columns]]
name = "id"
type = "int64"
nullable = false

[[tables.columns]]
name = "kind"
type = "string"
"#;

fn memory_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.storage.backend = StorageBackend::Memory;
    config.storage.fs = None;
    config
}

async fn seeded_storage(config: &RuntimeConfig) -> Operator {
    let op = catalog2parquet::init_storage(config).unwrap();
    op.write(&config.source.manifest, MANIFEST.as_bytes().to_vec())
        .await
        .unwrap();

    for (part, range) in [(0, 0..50), (1, 50..100)] {
        let body: String = range
            .map(|i| {
                format!(
                    "{{\"id\": {}, \"name\": \"user-{}\", \"score\": {}.5}}\n",
                    i, i, i
                )
            })
            .collect();
        op.write(&format!("input/your_table/part-{}.json", part), body.into_bytes())
            .await
            .unwrap();
    }
    op.write("input/your_table/_SUCCESS", Vec::<u8>::new())
        .await
        .unwrap();

    op
}

fn job_context(op: &Operator, job_name: Option<&str>) -> StorageJobContext {
    let mut args = HashMap::new();
    if let Some(name) = job_name {
        args.insert("JOB_NAME".to_string(), name.to_string());
    }
    StorageJobContext::new(args, op.clone(), "_job_runs/")
}

fn job(op: &Operator, config: &RuntimeConfig) -> ConversionJob {
    let catalog = Arc::new(StoredCatalog::new(op.clone(), config.source.manifest.clone()));
    ConversionJob::from_config(catalog, op.clone(), config).unwrap()
}

async fn list_files(op: &Operator, prefix: &str) -> Vec<String> {
    let mut paths: Vec<String> = op
        .list_with(prefix)
        .recursive(true)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.path().to_string())
        .filter(|p| !p.ends_with('/'))
        .collect();
    paths.sort();
    paths
}

async fn parquet_rows(op: &Operator, path: &str) -> usize {
    let bytes = Bytes::from(op.read(path).await.unwrap().to_vec());
    ParquetRecordBatchReaderBuilder::try_new(bytes)
        .unwrap()
        .build()
        .unwrap()
        .map(|batch| batch.unwrap().num_rows())
        .sum()
}

async fn run_records(op: &Operator) -> Vec<serde_json::Value> {
    let mut records = Vec::new();
    for path in list_files(op, "_job_runs/").await {
        let bytes = op.read(&path).await.unwrap().to_vec();
        records.push(serde_json::from_slice(&bytes).unwrap());
    }
    records
}

#[tokio::test]
async fn daily_etl_converts_table_and_commits_once() {
    let config = memory_config();
    let op = seeded_storage(&config).await;
    let context = job_context(&op, Some("daily-etl"));

    let summary = job(&op, &config).run(&context).await.unwrap();
    assert_eq!(summary.rows, 100);

    let outputs = list_files(&op, "output/").await;
    assert!(!outputs.is_empty());
    assert!(outputs
        .iter()
        .all(|p| p.starts_with("output/part-") && p.ends_with(".parquet")));

    let mut total = 0;
    for path in &outputs {
        total += parquet_rows(&op, path).await;
    }
    assert_eq!(total, 100);

    let records = run_records(&op).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "succeeded");
    assert_eq!(records[0]["job_name"], "daily-etl");
    assert_eq!(records[0]["rows"], 100);
}

#[tokio::test]
async fn declared_csv_table_converts_with_catalog_schema() {
    let mut config = memory_config();
    config.source.table = "events".to_string();
    config.sink.prefix = "converted/events".to_string();
    let op = seeded_storage(&config).await;
    op.write(
        "input/events.csv",
        b"id,kind\n1,click\n2,view\n3,click\n".to_vec(),
    )
    .await
    .unwrap();

    let summary = job(&op, &config)
        .run(&job_context(&op, Some("events-etl")))
        .await
        .unwrap();

    assert_eq!(summary.rows, 3);
    let outputs = list_files(&op, "converted/events/").await;
    assert_eq!(outputs.len(), 1);

    let bytes = Bytes::from(op.read(&outputs[0]).await.unwrap().to_vec());
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes).unwrap();
    let schema = builder.schema();
    assert_eq!(schema.fields().len(), 2);
    assert!(!schema.field(0).is_nullable());
}

#[tokio::test]
async fn rerun_adds_files_instead_of_overwriting() {
    let config = memory_config();
    let op = seeded_storage(&config).await;

    for _ in 0..2 {
        job(&op, &config)
            .run(&job_context(&op, Some("daily-etl")))
            .await
            .unwrap();
    }

    let outputs = list_files(&op, "output/").await;
    assert_eq!(outputs.len(), 2);
    assert_eq!(run_records(&op).await.len(), 2);
}

#[tokio::test]
async fn output_split_follows_max_rows_per_file() {
    let mut config = memory_config();
    config.sink.max_rows_per_file = 30;
    let op = seeded_storage(&config).await;

    job(&op, &config)
        .run(&job_context(&op, Some("daily-etl")))
        .await
        .unwrap();

    let outputs = list_files(&op, "output/").await;
    assert_eq!(outputs.len(), 4);

    let mut rows = Vec::new();
    for path in &outputs {
        rows.push(parquet_rows(&op, path).await);
    }
    assert_eq!(rows, vec![30, 30, 30, 10]);
}

#[tokio::test]
async fn missing_table_never_commits() {
    let mut config = memory_config();
    config.source.table = "missing".to_string();
    let op = seeded_storage(&config).await;

    let err = job(&op, &config)
        .run(&job_context(&op, Some("daily-etl")))
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::Catalog(_)));
    assert!(list_files(&op, "output/").await.is_empty());

    let records = run_records(&op).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "failed");
    assert!(records[0]["error"]
        .as_str()
        .unwrap()
        .contains("etl_data_catalog.missing"));
}

#[tokio::test]
async fn missing_job_name_touches_nothing() {
    let config = memory_config();
    let op = catalog2parquet::init_storage(&config).unwrap();

    // No manifest is seeded: reaching the catalog would surface a storage error
    let err = job(&op, &config)
        .run(&job_context(&op, None))
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::MissingArgument(_)));
    assert!(list_files(&op, "output/").await.is_empty());
    assert!(run_records(&op).await.is_empty());
}
